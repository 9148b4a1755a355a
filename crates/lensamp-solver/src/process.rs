use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use lensamp_core::{LensError, LensResult, LensSolver};

pub const DEFAULT_INPUT_FILE: &str = "case.input";
pub const DEFAULT_OUTPUT_FILE: &str = "out_point.dat";

/// Runs the solver binary once per call inside a fresh temporary directory.
///
/// The input text is written to `input_file`, the solver is invoked as
/// `program [args...] input_file` with the temporary directory as working
/// directory, and `output_file` is read back. The directory and both files
/// are removed when the call returns, so concurrent solvers never share
/// paths.
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    program: PathBuf,
    args: Vec<String>,
    input_file: String,
    output_file: String,
}

impl ProcessSolver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            input_file: DEFAULT_INPUT_FILE.into(),
            output_file: DEFAULT_OUTPUT_FILE.into(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_input_file(mut self, name: impl Into<String>) -> Self {
        self.input_file = name.into();
        self
    }

    /// File name the solver writes its point table to, relative to its
    /// working directory.
    pub fn with_output_file(mut self, name: impl Into<String>) -> Self {
        self.output_file = name.into();
        self
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }

    /// Check the program can be spawned at all.
    pub fn probe(&self) -> LensResult<()> {
        Command::new(&self.program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .and_then(|mut child| {
                let _ = child.kill();
                child.wait()
            })
            .map(|_| ())
            .map_err(|e| {
                LensError::Solver(format!("cannot run {}: {e}", self.program.display()))
            })
    }
}

impl LensSolver for ProcessSolver {
    fn solve(&self, input: &str) -> LensResult<String> {
        let workdir = tempfile::Builder::new().prefix("lensamp-").tempdir()?;
        let input_path = workdir.path().join(&self.input_file);
        std::fs::write(&input_path, input)?;

        debug!(
            "running {} in {}",
            self.program.display(),
            workdir.path().display()
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.input_file)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                LensError::Solver(format!("cannot run {}: {e}", self.program.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LensError::Solver(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let output_path = workdir.path().join(&self.output_file);
        std::fs::read_to_string(&output_path).map_err(|e| {
            LensError::Solver(format!(
                "{} produced no readable {}: {e}",
                self.program.display(),
                self.output_file
            ))
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ProcessSolver {
        // `sh -c script case.input`: the input file name lands in $0
        ProcessSolver::new("sh").with_args(vec!["-c".into(), script.into()])
    }

    #[test]
    fn test_round_trip_through_files() {
        let solver = sh(r#"grep -c '^point' "$0" > count; printf '2 3 0 0\n0.1 0.2 -1.5 0\n-0.1 0 2.5 4.5\n' > out_point.dat"#);
        let out = solver.solve("lens sie 200 0 0 0.3 0 0 0.0\npoint 3 0.1 0.1\n").unwrap();
        assert!(out.starts_with("2 3 0 0\n"));
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn test_solver_sees_input() {
        let solver = sh(r#"cp "$0" out_point.dat"#);
        let out = solver.solve("point 2.5 0 0\n").unwrap();
        assert_eq!(out, "point 2.5 0 0\n");
    }

    #[test]
    fn test_custom_output_file() {
        let solver = sh("echo '0 3 0 0' > result.dat").with_output_file("result.dat");
        assert_eq!(solver.solve("x").unwrap().trim(), "0 3 0 0");
    }

    #[test]
    fn test_nonzero_exit_is_error() {
        let solver = sh("echo boom >&2; exit 3");
        let err = solver.solve("x").unwrap_err();
        match err {
            LensError::Solver(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_output_is_error() {
        let err = sh("true").solve("x").unwrap_err();
        assert!(matches!(err, LensError::Solver(_)));
    }

    #[test]
    fn test_missing_program() {
        let solver = ProcessSolver::new("/nonexistent/lens-solver");
        assert!(matches!(solver.solve("x"), Err(LensError::Solver(_))));
        assert!(solver.probe().is_err());
    }

    #[test]
    fn test_workdirs_not_reused() {
        let solver = sh(r#"pwd > out_point.dat"#);
        let a = solver.solve("x").unwrap();
        let b = solver.solve("x").unwrap();
        assert_ne!(a, b);
        assert!(!std::path::Path::new(a.trim()).exists());
    }
}
