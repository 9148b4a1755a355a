use crate::error::LensResult;

/// The external lens-equation solver, seen as a function from input-file
/// text to point-output text.
///
/// Implementations must fail with [`LensError::Solver`](crate::LensError)
/// when the solver itself fails; a well-formed run that found no images is
/// not an error.
pub trait LensSolver {
    fn solve(&self, input: &str) -> LensResult<String>;
}

impl<S: LensSolver + ?Sized> LensSolver for &S {
    fn solve(&self, input: &str) -> LensResult<String> {
        (**self).solve(input)
    }
}
