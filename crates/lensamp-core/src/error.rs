use thiserror::Error;

#[derive(Debug, Error)]
pub enum LensError {
    #[error("config error: {0}")]
    Config(String),

    #[error("sampling error: {0}")]
    Sampling(String),

    #[error("malformed solver output: {0}")]
    MalformedOutput(String),

    #[error("solver failed: {0}")]
    Solver(String),

    #[error("gave up after {trials} trials with {accepted} of {target} samples accepted")]
    Exhausted {
        trials: u64,
        accepted: usize,
        target: usize,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type LensResult<T> = Result<T, LensError>;
