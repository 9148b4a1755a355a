use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// SieLens
// ---------------------------------------------------------------------------

/// Singular isothermal ellipsoid lens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SieLens {
    /// Velocity dispersion, km/s.
    pub sigma: f64,
    pub x: f64,
    pub y: f64,
    pub ellipticity: f64,
    /// Position angle, degrees.
    pub theta: f64,
    /// Core radius, arcsec.
    pub rcore: f64,
}

impl SieLens {
    /// A lens centred on the origin with zero position angle and core, as
    /// used for single-galaxy trials.
    pub fn centered(sigma: f64, ellipticity: f64) -> Self {
        Self {
            sigma,
            x: 0.0,
            y: 0.0,
            ellipticity,
            theta: 0.0,
            rcore: 0.0,
        }
    }
}

/// Values use `{:?}` so whole numbers keep their decimal point (`0.0`, not
/// `0`), as solver input and catalog lines are written.
impl fmt::Display for SieLens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lens sie {:?} {:?} {:?} {:?} {:?} {:?} 0.0",
            self.sigma, self.x, self.y, self.ellipticity, self.theta, self.rcore
        )
    }
}

// ---------------------------------------------------------------------------
// ExternalShear
// ---------------------------------------------------------------------------

/// External shear perturbation with convergence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExternalShear {
    /// Redshift the perturbation is referenced to (the source redshift).
    pub redshift: f64,
    pub magnitude: f64,
    /// Radians in `[0, 2pi)`.
    pub angle: f64,
    pub convergence: f64,
}

impl fmt::Display for ExternalShear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lens pert {:?} 0.0 0.0 {:?} {:?} 0.0 {:?}",
            self.redshift, self.magnitude, self.angle, self.convergence
        )
    }
}

// ---------------------------------------------------------------------------
// PointSource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSource {
    pub redshift: f64,
    /// Arcsec.
    pub x: f64,
    pub y: f64,
}

impl fmt::Display for PointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "point {:?} {:?} {:?}", self.redshift, self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// TrialParameters
// ---------------------------------------------------------------------------

/// Where the lens line of an attempt comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LensModel {
    Sampled(SieLens),
    /// Verbatim line from a galaxy catalog.
    Catalog { line: String },
}

impl fmt::Display for LensModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sampled(lens) => write!(f, "{lens}"),
            Self::Catalog { line } => write!(f, "{line}"),
        }
    }
}

/// Everything drawn for one solver attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialParameters {
    pub lens: LensModel,
    pub lens_redshift: f64,
    pub shear: ExternalShear,
    pub source: PointSource,
}

impl TrialParameters {
    pub fn lens_redshift_line(&self) -> String {
        format!("zl {:?}", self.lens_redshift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sie_line() {
        let lens = SieLens::centered(210.5, 0.25);
        assert_eq!(lens.to_string(), "lens sie 210.5 0.0 0.0 0.25 0.0 0.0 0.0");
    }

    #[test]
    fn test_whole_numbers_keep_decimal_point() {
        let lens = SieLens::centered(200.0, 0.5);
        assert_eq!(lens.to_string(), "lens sie 200.0 0.0 0.0 0.5 0.0 0.0 0.0");

        let params = TrialParameters {
            lens: LensModel::Sampled(lens),
            lens_redshift: 1.0,
            shear: ExternalShear {
                redshift: 3.0,
                magnitude: 0.1,
                angle: 0.0,
                convergence: 0.0,
            },
            source: PointSource {
                redshift: 3.0,
                x: 0.0,
                y: 1.0,
            },
        };
        assert_eq!(params.lens_redshift_line(), "zl 1.0");
        assert_eq!(params.source.to_string(), "point 3.0 0.0 1.0");
    }

    #[test]
    fn test_shear_line() {
        let shear = ExternalShear {
            redshift: 3.0,
            magnitude: 0.05,
            angle: 1.5,
            convergence: 0.02,
        };
        assert_eq!(shear.to_string(), "lens pert 3.0 0.0 0.0 0.05 1.5 0.0 0.02");
    }

    #[test]
    fn test_point_line() {
        let src = PointSource {
            redshift: 2.5,
            x: -0.25,
            y: 0.5,
        };
        assert_eq!(src.to_string(), "point 2.5 -0.25 0.5");
    }

    #[test]
    fn test_catalog_lens_verbatim() {
        let lens = LensModel::Catalog {
            line: "lens sie 180 0.0 0.0 0.3 0.0 0.0 0.0".into(),
        };
        assert_eq!(lens.to_string(), "lens sie 180 0.0 0.0 0.3 0.0 0.0 0.0");
    }
}
