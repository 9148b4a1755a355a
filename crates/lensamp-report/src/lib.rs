pub mod artifacts;
pub mod plot;
pub mod stats;

pub use artifacts::{load_raw_dir, load_raw_samples, Reporter};
pub use stats::StatsReport;
