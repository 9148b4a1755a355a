//! Solver input templates.
//!
//! A template is an ordinary solver input file in which some lines carry a
//! marker. Each marked line is replaced wholesale by the generated line for
//! that marker; every other line is copied verbatim.

use crate::error::{LensError, LensResult};
use crate::lens::TrialParameters;

pub const LENS_MARKER: &str = "**SIE**";
pub const SHEAR_MARKER: &str = "**SHEAR**";
pub const POINT_MARKER: &str = "**POINT**";
pub const LENS_REDSHIFT_MARKER: &str = "**ZLENS**";

#[derive(Debug, Clone, PartialEq)]
pub struct SolverTemplate {
    text: String,
}

impl SolverTemplate {
    /// Fails when the lens or point marker is missing; the shear and lens
    /// redshift markers are optional.
    pub fn new(text: impl Into<String>) -> LensResult<Self> {
        let text = text.into();
        for marker in [LENS_MARKER, POINT_MARKER] {
            if !text.lines().any(|l| l.contains(marker)) {
                return Err(LensError::Config(format!(
                    "solver template has no {marker} line"
                )));
            }
        }
        Ok(Self { text })
    }

    pub fn has_shear(&self) -> bool {
        self.text.contains(SHEAR_MARKER)
    }

    pub fn render(&self, params: &TrialParameters) -> String {
        let mut out = String::with_capacity(self.text.len() + 128);
        for line in self.text.lines() {
            if line.contains(LENS_MARKER) {
                out.push_str(&params.lens.to_string());
            } else if line.contains(SHEAR_MARKER) {
                out.push_str(&params.shear.to_string());
            } else if line.contains(POINT_MARKER) {
                out.push_str(&params.source.to_string());
            } else if line.contains(LENS_REDSHIFT_MARKER) {
                out.push_str(&params.lens_redshift_line());
            } else {
                out.push_str(line);
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::{ExternalShear, LensModel, PointSource, SieLens};

    const TEMPLATE: &str = "\
omega 0.3
lambda 0.7
**ZLENS**
prefix out

startup 2 0 1
**SIE**
**SHEAR**
**POINT**
end_startup

start_command
findimg
quit
";

    fn params() -> TrialParameters {
        TrialParameters {
            lens: LensModel::Sampled(SieLens::centered(200.0, 0.3)),
            lens_redshift: 0.5,
            shear: ExternalShear {
                redshift: 3.0,
                magnitude: 0.05,
                angle: 1.0,
                convergence: 0.01,
            },
            source: PointSource {
                redshift: 3.0,
                x: 0.1,
                y: -0.2,
            },
        }
    }

    #[test]
    fn test_render_substitutes_markers() {
        let template = SolverTemplate::new(TEMPLATE).unwrap();
        assert!(template.has_shear());
        let out = template.render(&params());

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "omega 0.3");
        assert_eq!(lines[2], "zl 0.5");
        assert_eq!(lines[6], "lens sie 200.0 0.0 0.0 0.3 0.0 0.0 0.0");
        assert_eq!(lines[7], "lens pert 3.0 0.0 0.0 0.05 1.0 0.0 0.01");
        assert_eq!(lines[8], "point 3.0 0.1 -0.2");
        assert_eq!(lines[12], "findimg");
        assert!(!out.contains("**"));
    }

    #[test]
    fn test_missing_markers_rejected() {
        let err = SolverTemplate::new("**SIE**\nfindimg\n").unwrap_err();
        assert!(err.to_string().contains("**POINT**"));
        assert!(SolverTemplate::new("**POINT**\n").is_err());
    }

    #[test]
    fn test_shear_optional() {
        let template = SolverTemplate::new("**SIE**\n**POINT**\n").unwrap();
        assert!(!template.has_shear());
        assert_eq!(template.render(&params()).lines().count(), 2);
    }
}
