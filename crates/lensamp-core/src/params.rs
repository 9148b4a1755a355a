//! Random draws for every lens, shear and source parameter of a trial.

use std::f64::consts::TAU;

use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{LensError, LensResult};
use crate::lens::{ExternalShear, LensModel, PointSource, SieLens, TrialParameters};
use crate::sampler::{DispersionBinTable, DispersionFunction};

/// Upper bound on draws for a single rejection-sampled value.
pub const MAX_REJECTIONS: usize = 100_000;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispersionConfig {
    /// km/s
    pub sigma_min: f64,
    pub sigma_max: f64,
    pub bins: usize,
    pub function: DispersionFunction,
}

/// Normal distribution truncated to the open interval `(0, max)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EllipticityConfig {
    pub mean: f64,
    pub std_dev: f64,
    pub max: f64,
}

/// `exp(Normal(mu, sigma))`, truncated to `(0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogNormalConfig {
    pub mu: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShearConfig {
    pub magnitude: LogNormalConfig,
    pub convergence: LogNormalConfig,
}

/// Closed interval for uniform draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn validate(&self, what: &str) -> LensResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(LensError::Config(format!(
                "invalid {what} range [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LensPlaneConfig {
    pub redshift: Range,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub redshift: Range,
    /// Half-width of the square the source position is drawn from, arcsec.
    pub radius: f64,
}

/// All distribution settings for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub dispersion: DispersionConfig,
    pub ellipticity: EllipticityConfig,
    pub shear: ShearConfig,
    pub lens: LensPlaneConfig,
    pub source: SourceConfig,
}

// --- Defaults ---

impl Default for DispersionConfig {
    fn default() -> Self {
        Self {
            sigma_min: 75.0,
            sigma_max: 375.0,
            bins: 15,
            function: DispersionFunction::default(),
        }
    }
}

impl Default for EllipticityConfig {
    fn default() -> Self {
        Self {
            mean: 0.3,
            std_dev: 0.16,
            max: 0.9,
        }
    }
}

impl Default for ShearConfig {
    fn default() -> Self {
        Self {
            magnitude: LogNormalConfig {
                mu: 0.025_f64.log10(),
                sigma: 0.5 * (0.06_f64.log10() - 0.01_f64.log10()),
            },
            // Typical 0.02, bracketed by 0.005..0.05, built like the magnitude.
            convergence: LogNormalConfig {
                mu: 0.02_f64.log10(),
                sigma: 0.5 * (0.05_f64.log10() - 0.005_f64.log10()),
            },
        }
    }
}

impl Default for LensPlaneConfig {
    fn default() -> Self {
        Self {
            redshift: Range::new(0.3, 0.8),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            redshift: Range::new(2.5, 4.0),
            radius: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// ParameterGenerator
// ---------------------------------------------------------------------------

/// Stateless draws over a shared random stream. The only precomputed state is
/// the dispersion table and the distribution objects.
#[derive(Debug, Clone)]
pub struct ParameterGenerator {
    table: DispersionBinTable,
    ellipticity: Normal<f64>,
    ellipticity_max: f64,
    shear_magnitude: LogNormal<f64>,
    shear_convergence: LogNormal<f64>,
    lens_redshift: Range,
    source_redshift: Range,
    radius: f64,
}

impl ParameterGenerator {
    pub fn new(config: &SamplingConfig) -> LensResult<Self> {
        let d = &config.dispersion;
        let table = DispersionBinTable::build(d.sigma_min, d.sigma_max, d.bins, &d.function)?;

        let e = &config.ellipticity;
        let ellipticity = Normal::new(e.mean, e.std_dev)
            .map_err(|err| LensError::Config(format!("ellipticity distribution: {err}")))?;
        if e.max.is_nan() || e.max <= 0.0 {
            return Err(LensError::Config(format!(
                "ellipticity max must be positive, got {}",
                e.max
            )));
        }

        let shear_magnitude = log_normal(&config.shear.magnitude, "shear magnitude")?;
        let shear_convergence = log_normal(&config.shear.convergence, "shear convergence")?;

        config.lens.redshift.validate("lens redshift")?;
        config.source.redshift.validate("source redshift")?;
        if !config.source.radius.is_finite() || config.source.radius < 0.0 {
            return Err(LensError::Config(format!(
                "source sampling radius must be non-negative, got {}",
                config.source.radius
            )));
        }

        Ok(Self {
            table,
            ellipticity,
            ellipticity_max: e.max,
            shear_magnitude,
            shear_convergence,
            lens_redshift: config.lens.redshift,
            source_redshift: config.source.redshift,
            radius: config.source.radius,
        })
    }

    pub fn dispersion_table(&self) -> &DispersionBinTable {
        &self.table
    }

    pub fn dispersion<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.table.sample(rng)
    }

    /// Strictly inside `(0, max)`.
    pub fn ellipticity<R: Rng + ?Sized>(&self, rng: &mut R) -> LensResult<f64> {
        reject_outside(rng, &self.ellipticity, self.ellipticity_max, "ellipticity")
    }

    /// Strictly inside `(0, 1)`.
    pub fn shear_magnitude<R: Rng + ?Sized>(&self, rng: &mut R) -> LensResult<f64> {
        reject_outside(rng, &self.shear_magnitude, 1.0, "shear magnitude")
    }

    /// Strictly inside `(0, 1)`.
    pub fn shear_convergence<R: Rng + ?Sized>(&self, rng: &mut R) -> LensResult<f64> {
        reject_outside(rng, &self.shear_convergence, 1.0, "shear convergence")
    }

    /// Radians in `[0, 2pi)`.
    pub fn shear_angle<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.gen_range(0.0..TAU)
    }

    pub fn lens_redshift<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        uniform(rng, self.lens_redshift)
    }

    pub fn source_redshift<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        uniform(rng, self.source_redshift)
    }

    pub fn source_position<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let square = Range::new(-self.radius, self.radius);
        (uniform(rng, square), uniform(rng, square))
    }

    pub fn sie_lens<R: Rng + ?Sized>(&self, rng: &mut R) -> LensResult<SieLens> {
        let sigma = self.dispersion(rng);
        let ellipticity = self.ellipticity(rng)?;
        Ok(SieLens::centered(sigma, ellipticity))
    }

    /// Draw a full parameter set. A catalog line, when given, replaces the
    /// sampled lens; everything else is still drawn.
    pub fn draw<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        catalog_lens: Option<&str>,
    ) -> LensResult<TrialParameters> {
        let lens = match catalog_lens {
            Some(line) => LensModel::Catalog {
                line: line.to_string(),
            },
            None => LensModel::Sampled(self.sie_lens(rng)?),
        };
        let lens_redshift = self.lens_redshift(rng);
        let source_redshift = self.source_redshift(rng);
        let shear = ExternalShear {
            redshift: source_redshift,
            magnitude: self.shear_magnitude(rng)?,
            angle: self.shear_angle(rng),
            convergence: self.shear_convergence(rng)?,
        };
        let (x, y) = self.source_position(rng);

        Ok(TrialParameters {
            lens,
            lens_redshift,
            shear,
            source: PointSource {
                redshift: source_redshift,
                x,
                y,
            },
        })
    }
}

fn log_normal(config: &LogNormalConfig, what: &str) -> LensResult<LogNormal<f64>> {
    LogNormal::new(config.mu, config.sigma)
        .map_err(|err| LensError::Config(format!("{what} distribution: {err}")))
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, range: Range) -> f64 {
    if range.min == range.max {
        range.min
    } else {
        rng.gen_range(range.min..=range.max)
    }
}

fn reject_outside<R, D>(rng: &mut R, dist: &D, max: f64, what: &str) -> LensResult<f64>
where
    R: Rng + ?Sized,
    D: Distribution<f64>,
{
    for _ in 0..MAX_REJECTIONS {
        let value = dist.sample(rng);
        if value > 0.0 && value < max {
            return Ok(value);
        }
    }
    Err(LensError::Sampling(format!(
        "no {what} inside (0, {max}) after {MAX_REJECTIONS} draws"
    )))
}
