//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `--config <path>` flag
//! 2. `$LENSAMP_CONFIG` environment variable
//! 3. `~/.config/lensamp/config.toml`
//! 4. Built-in defaults (everything is optional)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lensamp_core::params::{
    DispersionConfig, EllipticityConfig, LensPlaneConfig, ShearConfig, SourceConfig,
};
use lensamp_core::{MalformedPolicy, SamplingConfig};
use lensamp_solver::DEFAULT_OUTPUT_FILE;

/// Top-level configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dispersion: DispersionConfig,
    pub ellipticity: EllipticityConfig,
    pub shear: ShearConfig,
    pub lens: LensPlaneConfig,
    pub source: SourceConfig,
    pub run: RunConfig,
    pub solver: SolverConfig,
}

/// Sampling run settings.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Accepted samples to collect when lenses are drawn.
    pub samples: usize,
    /// Accepted samples per catalog lens.
    pub samples_per_lens: usize,
    /// Fixed seed. A random one is drawn and recorded when unset.
    pub seed: Option<u64>,
    /// Cap on solver invocations per run.
    pub max_trials: Option<u64>,
    pub on_malformed: MalformedPolicy,
}

/// External lens solver settings.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub program: String,
    pub args: Vec<String>,
    /// File the solver writes its point table to, relative to its working
    /// directory.
    pub output_file: String,
    /// Input template containing the marker lines.
    pub template: Option<PathBuf>,
}

// --- Defaults ---

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            samples: 50,
            samples_per_lens: 10,
            seed: None,
            max_trials: None,
            on_malformed: MalformedPolicy::Abort,
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            program: "glafic".into(),
            args: Vec::new(),
            output_file: DEFAULT_OUTPUT_FILE.into(),
            template: None,
        }
    }
}

impl Config {
    /// Distribution settings for the parameter generator.
    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig {
            dispersion: self.dispersion.clone(),
            ellipticity: self.ellipticity.clone(),
            shear: self.shear.clone(),
            lens: self.lens.clone(),
            source: self.source.clone(),
        }
    }
}

/// Load config from disk. Returns defaults if no config file exists.
///
/// An explicit path must exist; the implicit locations are optional.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(p) = explicit {
        return read_config(p);
    }
    match config_path() {
        Some(p) if p.exists() => read_config(&p),
        _ => Ok(Config::default()),
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Resolve the implicit config file path.
fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("LENSAMP_CONFIG") {
        return Some(PathBuf::from(p));
    }

    directories::BaseDirs::new().map(|dirs| {
        dirs.home_dir()
            .join(".config")
            .join("lensamp")
            .join("config.toml")
    })
}

/// Show the active config path (for `lensamp config`).
pub fn show_config_path(explicit: Option<&Path>) -> String {
    if let Some(p) = explicit {
        return format!("{} (from --config)", p.display());
    }
    match config_path() {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "no config path resolved (using defaults)".into(),
    }
}
