pub mod process;

pub use process::{ProcessSolver, DEFAULT_INPUT_FILE, DEFAULT_OUTPUT_FILE};
