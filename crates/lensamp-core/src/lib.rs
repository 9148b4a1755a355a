pub mod aggregate;
pub mod catalog;
pub mod driver;
pub mod error;
pub mod image;
pub mod lens;
pub mod params;
pub mod sampler;
pub mod solver;
pub mod template;

pub use aggregate::{aggregate, Aggregate, CdfPoint, ImageStat, PairStat, SampleStat, TrialSummary};
pub use driver::{
    AcceptedSample, LensSource, MalformedPolicy, RunOutcome, RunRecord, TrialDriver, TrialState,
};
pub use error::{LensError, LensResult};
pub use image::{ImageRecord, SampleResult, SolverTable, TableRow};
pub use lens::{ExternalShear, LensModel, PointSource, SieLens, TrialParameters};
pub use params::{ParameterGenerator, Range, SamplingConfig};
pub use sampler::{DispersionBinTable, DispersionFunction};
pub use solver::LensSolver;
pub use template::SolverTemplate;
