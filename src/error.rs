/// Error returned from [crate::fit] for input that can not be fitted at all
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum FitError {
    #[error("spot image must be a 2-D array, got {ndim}-D one")]
    NotAnImage { ndim: usize },

    #[error("spot image must be a single frame, got array of shape {shape:?}")]
    MultiFrame { shape: Vec<usize> },

    #[error("spot image is empty: {height}x{width} pixels")]
    EmptyImage { height: usize, width: usize },

    #[error("spot image has no finite pixels: {height}x{width} pixels")]
    NoFinitePixels { height: usize, width: usize },

    #[error("unknown fit mode {0:?}, expected one of \"full\", \"varsonly\", \"bkgndonly\"")]
    UnknownFitMode(String),
}

/// Error returned from [crate::nl_fit::CurveFitTrait]
///
/// Any of these switches the optimizer to the fallback solver, they never reach
/// [crate::fit] callers.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum SolverError {
    #[error("{solver} solver is unavailable: {reason}")]
    Unavailable {
        solver: &'static str,
        reason: &'static str,
    },

    #[error("{solver} solver failed: {message}")]
    Failed {
        solver: &'static str,
        message: String,
    },
}
