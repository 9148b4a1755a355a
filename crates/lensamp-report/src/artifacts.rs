//! Files written into a run's output directory.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use lensamp_core::{Aggregate, SampleResult, TableRow};

use crate::plot;
use crate::stats::StatsReport;

pub const RAW_DATA_FILE: &str = "raw_data.json";
pub const GLOBAL_STATS_FILE: &str = "global_stats.dat";
pub const PAIRS_FILE: &str = "image_pairs.csv";
pub const SAMPLES_FILE: &str = "image_stats.csv";
pub const IMAGES_FILE: &str = "image_list.csv";
pub const CDF_FILE: &str = "interference_cdf.csv";
pub const CDF_PLOT: &str = "interference_cdf.svg";
pub const HISTOGRAM_PLOT: &str = "delay_histogram.svg";
pub const SCATTER_PLOT: &str = "pair_scatter.svg";

/// Writes artifacts into one output directory.
pub struct Reporter {
    dir: PathBuf,
}

impl Reporter {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Solver tables of every sample, header row first.
    pub fn write_raw_samples(&self, samples: &[SampleResult]) -> Result<PathBuf> {
        let path = self.dir.join(RAW_DATA_FILE);
        let rows: Vec<Vec<TableRow>> = samples.iter().map(SampleResult::to_rows).collect();
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), &rows)
            .with_context(|| format!("writing {}", path.display()))?;
        debug!("wrote {} samples to {}", samples.len(), path.display());
        Ok(path)
    }

    pub fn write_global_stats(&self, report: &StatsReport) -> Result<PathBuf> {
        let path = self.dir.join(GLOBAL_STATS_FILE);
        fs::write(&path, report.render()).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Delimited tables for pairs, samples, images and the interference CDF.
    pub fn write_tables(&self, agg: &Aggregate) -> Result<()> {
        let mut wtr = self.csv_writer(PAIRS_FILE)?;
        wtr.write_record(["pair_delay", "mag_ratio"])?;
        for p in &agg.pairs {
            wtr.write_record(&[p.pair_delay.to_string(), p.mag_ratio.to_string()])?;
        }
        wtr.flush()?;

        let mut wtr = self.csv_writer(SAMPLES_FILE)?;
        wtr.write_record(["image_count", "total_magnification", "min_pair_delay"])?;
        for s in &agg.samples {
            wtr.write_record(&[
                s.image_count.to_string(),
                s.total_magnification.to_string(),
                s.min_pair_delay.map(|d| d.to_string()).unwrap_or_default(),
            ])?;
        }
        wtr.flush()?;

        let mut wtr = self.csv_writer(IMAGES_FILE)?;
        wtr.write_record(["time_delay", "magnification"])?;
        for i in &agg.images {
            wtr.write_record(&[i.time_delay.to_string(), i.magnification.to_string()])?;
        }
        wtr.flush()?;

        let mut wtr = self.csv_writer(CDF_FILE)?;
        wtr.write_record(["days", "fraction_below"])?;
        for point in &agg.summary.interference_cdf {
            wtr.write_record(&[point.days.to_string(), format!("{:.6}", point.fraction_below)])?;
        }
        wtr.flush()?;

        Ok(())
    }

    pub fn render_plots(&self, agg: &Aggregate) -> Result<()> {
        plot::interference_cdf(&self.dir.join(CDF_PLOT), &agg.summary.interference_cdf)?;
        plot::delay_histogram(
            &self.dir.join(HISTOGRAM_PLOT),
            &plot::log_delay_histogram(&agg.images, plot::MAX_HISTOGRAM_DELAY, plot::HISTOGRAM_BINS),
        )?;
        plot::pair_scatter(&self.dir.join(SCATTER_PLOT), &agg.pairs)?;
        Ok(())
    }

    /// Statistics, tables and plots for an aggregate.
    pub fn write_report(&self, agg: &Aggregate, report: &StatsReport) -> Result<()> {
        self.write_global_stats(report)?;
        self.write_tables(agg)?;
        self.render_plots(agg)?;
        info!("report written to {}", self.dir.display());
        Ok(())
    }

    fn csv_writer(&self, name: &str) -> Result<csv::Writer<File>> {
        let path = self.dir.join(name);
        csv::Writer::from_path(&path).with_context(|| format!("creating {}", path.display()))
    }
}

/// Load one raw-data file.
pub fn load_raw_samples(path: &Path) -> Result<Vec<SampleResult>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let rows: Vec<Vec<TableRow>> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(rows.iter().map(|r| SampleResult::from_rows(r)).collect())
}

/// Load and concatenate every `*.json` raw-data file in `dir`, in file-name
/// order.
pub fn load_raw_dir(dir: &Path) -> Result<Vec<SampleResult>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut samples = Vec::new();
    for path in &paths {
        let loaded = load_raw_samples(path)?;
        debug!("loaded {} samples from {}", loaded.len(), path.display());
        samples.extend(loaded);
    }
    info!("loaded {} samples from {} files", samples.len(), paths.len());
    Ok(samples)
}
