mod config;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;

use lensamp_core::{
    aggregate, catalog, LensSource, MalformedPolicy, ParameterGenerator, Range, SolverTemplate,
    TrialDriver,
};
use lensamp_report::{load_raw_dir, Reporter, StatsReport};
use lensamp_solver::ProcessSolver;

use config::Config;

#[derive(Parser)]
#[command(
    name = "lensamp",
    version,
    about = "Monte Carlo sampling of strongly lensed image time delays"
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample lens configurations through the solver and write statistics
    Run {
        /// Solver input template with **SIE**/**SHEAR**/**POINT** lines
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "lensamp-out")]
        output: PathBuf,

        /// Multiply imaged samples to collect
        #[arg(short = 'n', long)]
        samples: Option<usize>,

        /// Galaxy catalog of lens lines to use instead of sampled lenses
        #[arg(short, long)]
        lenses: Option<PathBuf>,

        /// Samples per catalog lens
        #[arg(long)]
        samples_per_lens: Option<usize>,

        /// Random seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Solver executable
        #[arg(long)]
        solver: Option<String>,

        /// Extra solver argument placed before the input file (repeatable)
        #[arg(long = "solver-arg", allow_hyphen_values = true)]
        solver_args: Vec<String>,

        /// Give up after this many solver invocations
        #[arg(long)]
        max_trials: Option<u64>,

        /// What to do with unparseable solver output: abort or reroll
        #[arg(long)]
        on_malformed: Option<MalformedPolicy>,
    },

    /// Write a galaxy catalog of sampled SIE lenses
    Generate {
        /// Number of lenses
        #[arg(short = 'n', long)]
        count: usize,

        /// Catalog file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Random seed
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Split a galaxy catalog into several files
    Split {
        /// Catalog file
        list: PathBuf,

        /// Number of output files
        parts: usize,
    },

    /// Aggregate raw-data files from earlier runs
    Analyze {
        /// Directory holding raw-data `*.json` files
        dir: PathBuf,

        /// Output directory (default: <dir>/analysis)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the active configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let mut config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            template,
            output,
            samples,
            lenses,
            samples_per_lens,
            seed,
            solver,
            solver_args,
            max_trials,
            on_malformed,
        } => {
            if let Some(t) = template {
                config.solver.template = Some(t);
            }
            if let Some(n) = samples {
                config.run.samples = n;
            }
            if let Some(n) = samples_per_lens {
                config.run.samples_per_lens = n;
            }
            if seed.is_some() {
                config.run.seed = seed;
            }
            if let Some(program) = solver {
                config.solver.program = program;
            }
            if !solver_args.is_empty() {
                config.solver.args = solver_args;
            }
            if max_trials.is_some() {
                config.run.max_trials = max_trials;
            }
            if let Some(policy) = on_malformed {
                config.run.on_malformed = policy;
            }
            cmd_run(&config, lenses.as_deref(), &output)
        }
        Commands::Generate {
            count,
            output,
            seed,
        } => cmd_generate(&config, count, &output, seed),
        Commands::Split { list, parts } => cmd_split(&list, parts),
        Commands::Analyze { dir, output } => {
            let output = output.unwrap_or_else(|| dir.join("analysis"));
            cmd_analyze(&dir, &output)
        }
        Commands::Config => cmd_config(&config, cli.config.as_deref()),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_run(config: &Config, lenses: Option<&Path>, output: &Path) -> Result<()> {
    let template_path = config
        .solver
        .template
        .as_deref()
        .context("no solver template: pass --template or set [solver] template")?;
    let text = fs::read_to_string(template_path)
        .with_context(|| format!("reading {}", template_path.display()))?;
    let template = SolverTemplate::new(text)?;
    if !template.has_shear() {
        warn!("template has no **SHEAR** line, external shear will not be applied");
    }

    let generator = ParameterGenerator::new(&config.sampling())?;
    let source = match lenses {
        Some(path) => {
            let text =
                fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let lenses = catalog::parse(&text);
            if lenses.is_empty() {
                bail!("catalog {} has no lenses", path.display());
            }
            info!("loaded {} lenses from {}", lenses.len(), path.display());
            LensSource::Catalog {
                lenses,
                samples_per_lens: config.run.samples_per_lens,
            }
        }
        None => LensSource::Sampled {
            samples: config.run.samples,
        },
    };

    let solver = ProcessSolver::new(&config.solver.program)
        .with_args(config.solver.args.clone())
        .with_output_file(&config.solver.output_file);
    solver
        .probe()
        .with_context(|| format!("cannot run solver {}", config.solver.program))?;

    // Fail on an unusable output path before any solver time is spent.
    let reporter = Reporter::create(output)?;

    let seed = config.run.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut driver = TrialDriver::new(solver, &template, &generator)
        .on_malformed(config.run.on_malformed)
        .max_trials(config.run.max_trials);
    let outcome = driver.run(&source, &mut rng, seed)?;

    let samples = outcome.sample_results();
    reporter.write_raw_samples(&samples)?;

    let agg = aggregate(&samples);
    let report = StatsReport::from_summary(&agg.summary)
        .with_run(&outcome.record)
        .with(
            "Sigma Range",
            Range::new(config.dispersion.sigma_min, config.dispersion.sigma_max),
        )
        .with("Lens Redshift Range", config.lens.redshift)
        .with("Source Redshift Range", config.source.redshift)
        .with("Sampling Radius", config.source.radius);
    reporter.write_report(&agg, &report)?;

    let record = &outcome.record;
    println!(
        "Run {}: {} samples from {} trials ({:.2}% good), seed {}",
        record.id,
        record.accepted,
        record.trials,
        record.success_percent(),
        record.seed
    );
    if record.malformed > 0 {
        println!("  {} malformed solver outputs rerolled", record.malformed);
    }
    println!(
        "  {} images, {} image pairs",
        agg.summary.total_images, agg.summary.total_pairs
    );
    println!("Output: {}", reporter.dir().display());
    Ok(())
}

fn cmd_generate(config: &Config, count: usize, output: &Path, seed: Option<u64>) -> Result<()> {
    let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let generator = ParameterGenerator::new(&config.sampling())?;
    let lenses = catalog::generate(&generator, &mut rng, count)?;

    let text: String = lenses.iter().map(|l| format!("{l}\n")).collect();
    fs::write(output, text).with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Wrote {} lenses to {} (seed {seed})",
        lenses.len(),
        output.display()
    );
    Ok(())
}

fn cmd_split(list: &Path, parts: usize) -> Result<()> {
    let files = write_split(list, parts)?;
    println!("Split {} into {} files:", list.display(), files.len());
    for f in &files {
        println!("  {}", f.display());
    }
    Ok(())
}

/// Write `<stem>-partNNN` files into `<stem>-split<parts>/` next to `list`.
fn write_split(list: &Path, parts: usize) -> Result<Vec<PathBuf>> {
    let text = fs::read_to_string(list).with_context(|| format!("reading {}", list.display()))?;
    let lenses = catalog::parse(&text);
    let chunks = catalog::split(&lenses, parts)?;

    let stem = list
        .file_stem()
        .and_then(|s| s.to_str())
        .context("catalog path has no file name")?;
    let dir = list
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{stem}-split{parts}"));
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut files = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let path = dir.join(format!("{stem}-part{i:03}"));
        let body: String = chunk.iter().map(|l| format!("{l}\n")).collect();
        fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
        files.push(path);
    }
    Ok(files)
}

fn cmd_analyze(dir: &Path, output: &Path) -> Result<()> {
    let samples = load_raw_dir(dir)?;
    if samples.is_empty() {
        warn!("no samples found in {}", dir.display());
    }

    let agg = aggregate(&samples);
    let report = StatsReport::from_summary(&agg.summary).with("Source Directory", dir.display());
    let reporter = Reporter::create(output)?;
    reporter.write_report(&agg, &report)?;

    println!(
        "Analyzed {} samples: {} images, {} image pairs",
        agg.summary.total_samples, agg.summary.total_images, agg.summary.total_pairs
    );
    println!("Output: {}", reporter.dir().display());
    Ok(())
}

fn cmd_config(config: &Config, explicit: Option<&Path>) -> Result<()> {
    println!("Config: {}", config::show_config_path(explicit));
    println!();
    print!(
        "{}",
        toml::to_string_pretty(config).context("serializing config")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_split() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("galaxies.txt");
        let lines: String = (0..7).map(|i| format!("lens sie {} 0 0 0.3 0 0 0.0\n", 100 + i)).collect();
        fs::write(&list, format!("{lines}\n\n")).unwrap();

        let files = write_split(&list, 3).unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(
            files[0],
            dir.path().join("galaxies-split3").join("galaxies-part000")
        );

        let counts: Vec<usize> = files
            .iter()
            .map(|f| fs::read_to_string(f).unwrap().lines().count())
            .collect();
        assert_eq!(counts, vec![2, 2, 3]);
        let last = fs::read_to_string(&files[2]).unwrap();
        assert!(last.ends_with("lens sie 106 0 0 0.3 0 0 0.0\n"));
    }

    #[test]
    fn test_write_split_rejects_too_many_parts() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("small.txt");
        fs::write(&list, "lens sie 200 0 0 0.2 0 0 0.0\n").unwrap();
        assert!(write_split(&list, 2).is_err());
        assert!(write_split(&list, 0).is_err());
    }

    #[cfg(unix)]
    const TEMPLATE: &str = "omega 0.3\n**ZLENS**\n**SIE**\n**SHEAR**\n**POINT**\nfindimg\n";

    /// Config for a run whose solver is a `sh -c` script.
    #[cfg(unix)]
    fn sh_config(dir: &Path, script: &str) -> Config {
        let template = dir.join("case.tmpl");
        fs::write(&template, TEMPLATE).unwrap();

        let mut config = Config::default();
        config.solver.program = "sh".into();
        config.solver.args = vec!["-c".into(), script.into()];
        config.solver.template = Some(template);
        config.run.samples = 2;
        config.run.seed = Some(7);
        config
    }

    #[cfg(unix)]
    #[test]
    fn test_run_and_analyze_through_shell_solver() {
        let dir = tempfile::tempdir().unwrap();
        let script = r#"grep -q '^lens sie ' "$0" && printf '2 3 0 0\n0.5 0.1 -2.0 5.0\n-0.4 0.0 0.5 12.0\n' > out_point.dat"#;
        let config = sh_config(dir.path(), script);
        let out = dir.path().join("run");

        cmd_run(&config, None, &out).unwrap();

        let samples = lensamp_report::load_raw_samples(&out.join("raw_data.json")).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].image_count(), 2);
        assert_eq!(samples[1].images[1].time_delay, 12.0);

        let stats = fs::read_to_string(out.join("global_stats.dat")).unwrap();
        assert!(stats.contains("Total Samples: 2\n"));
        assert!(stats.contains("Total Number of Image Pairs: 2\n"));
        assert!(stats.contains("Seed: 7\n"));
        assert!(stats.contains("Total Trials: 2\n"));
        assert!(stats.contains("Sampling Radius: 1\n"));
        assert!(out.join("interference_cdf.svg").exists());

        let analysis = out.join("analysis");
        cmd_analyze(&out, &analysis).unwrap();
        let stats = fs::read_to_string(analysis.join("global_stats.dat")).unwrap();
        assert!(stats.starts_with("Total Samples: 2\n"));
        let cdf = fs::read_to_string(analysis.join("interference_cdf.csv")).unwrap();
        assert!(cdf.lines().any(|l| l == "8,1.000000"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_checks_output_before_solving() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("solver-ran");
        let script = format!("touch '{}'", marker.display());
        let config = sh_config(dir.path(), &script);

        let blocked = dir.path().join("taken");
        fs::write(&blocked, "not a directory").unwrap();

        assert!(cmd_run(&config, None, &blocked).is_err());
        assert!(!marker.exists());
    }

    #[test]
    fn test_cli_parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "lensamp",
            "-vv",
            "run",
            "--template",
            "case.tmpl",
            "-n",
            "5",
            "--seed",
            "42",
            "--solver-arg",
            "-q",
            "--on-malformed",
            "reroll",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run {
                template,
                samples,
                seed,
                solver_args,
                on_malformed,
                ..
            } => {
                assert_eq!(template, Some(PathBuf::from("case.tmpl")));
                assert_eq!(samples, Some(5));
                assert_eq!(seed, Some(42));
                assert_eq!(solver_args, vec!["-q".to_string()]);
                assert_eq!(on_malformed, Some(MalformedPolicy::Reroll));
            }
            _ => panic!("expected run"),
        }
    }
}
