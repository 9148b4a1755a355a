//! Summary plots.
//!
//! Rendered with the SVG backend, which writes text as `<text>` elements and
//! needs no font files on the host.

use std::path::Path;

use anyhow::Result;
use plotters::prelude::*;

use lensamp_core::{CdfPoint, ImageStat, PairStat};

const SIZE: (u32, u32) = (1000, 700);

/// Upper bound (days) of image delays included in the histogram.
pub const MAX_HISTOGRAM_DELAY: f64 = 45.0;
pub const HISTOGRAM_BINS: usize = 50;

/// Equal-width histogram of `ln(time_delay)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub lower: f64,
    pub width: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn upper(&self) -> f64 {
        self.lower + self.width * self.counts.len() as f64
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Bin the natural log of every image delay in `(0, max_delay]` over the
/// span of the data. Delays of zero (the first image) are excluded.
pub fn log_delay_histogram(images: &[ImageStat], max_delay: f64, bins: usize) -> Histogram {
    let bins = bins.max(1);
    let logs: Vec<f64> = images
        .iter()
        .map(|i| i.time_delay)
        .filter(|&t| t > 0.0 && t <= max_delay)
        .map(f64::ln)
        .collect();

    let (lower, upper) = match logs.iter().copied().reduce(f64::min) {
        Some(lo) => {
            let hi = logs.iter().copied().fold(lo, f64::max);
            if hi > lo {
                (lo, hi)
            } else {
                (lo - 0.5, lo + 0.5)
            }
        }
        None => (0.0, max_delay.ln()),
    };
    let width = (upper - lower) / bins as f64;

    let mut counts = vec![0; bins];
    for v in logs {
        let idx = (((v - lower) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Histogram {
        lower,
        width,
        counts,
    }
}

pub fn interference_cdf(path: &Path, cdf: &[CdfPoint]) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let max_day = cdf.iter().map(|p| p.days).max().unwrap_or(30);
    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Likelihood of interference with n-day observation windows",
            ("sans-serif", 24),
        )
        .margin(10)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(0u32..max_day + 1, 0f64..1.0f64)?;

    chart
        .configure_mesh()
        .x_desc("Days")
        .y_desc("Fraction of systems with min delay below days")
        .y_label_formatter(&|y| format!("{y:.1}"))
        .draw()?;

    chart.draw_series(LineSeries::new(
        cdf.iter().map(|p| (p.days, p.fraction_below)),
        &RED,
    ))?;
    chart.draw_series(
        cdf.iter()
            .map(|p| Circle::new((p.days, p.fraction_below), 3, RED.filled())),
    )?;

    root.present()?;
    Ok(())
}

pub fn delay_histogram(path: &Path, hist: &Histogram) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let peak = hist.counts.iter().copied().max().unwrap_or(0).max(1) as f64;
    let mut chart = ChartBuilder::on(&root)
        .caption("Histogram of time delays", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(hist.lower..hist.upper(), 0f64..peak * 1.1)?;

    chart
        .configure_mesh()
        .x_desc("ln(time delay / days)")
        .y_desc("Number of images")
        .x_label_formatter(&|x| format!("{x:.2}"))
        .y_label_formatter(&|y| format!("{y:.0}"))
        .draw()?;

    chart.draw_series(hist.counts.iter().enumerate().map(|(i, &count)| {
        let x0 = hist.lower + i as f64 * hist.width;
        Rectangle::new(
            [(x0, 0.0), (x0 + hist.width, count as f64)],
            BLUE.mix(0.6).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

pub fn pair_scatter(path: &Path, pairs: &[PairStat]) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let points: Vec<(f64, f64)> = pairs
        .iter()
        .map(|p| (p.pair_delay, p.mag_ratio))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    let x_max = padded_max(points.iter().map(|p| p.0));
    let y_max = padded_max(points.iter().map(|p| p.1));

    let mut chart = ChartBuilder::on(&root)
        .caption("Image pair magnification ratio vs time delay", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..x_max, 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Time delay (days)")
        .y_desc("|mag leading| / |mag trailing|")
        .draw()?;

    chart.draw_series(
        points
            .iter()
            .map(|&(x, y)| Circle::new((x, y), 2, BLUE.mix(0.5).filled())),
    )?;

    root.present()?;
    Ok(())
}

fn padded_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.05
    } else {
        1.0
    }
}
