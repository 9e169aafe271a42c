use crate::somelinalg::gauss_elimination::LinearSystemError;
use std::fmt;

/// Error types for the nonlinear equation-system solvers
#[derive(Debug, Clone, PartialEq)]
pub enum NonlinearSolverError {
    /// number of functions, vector length or function arity disagree
    DimensionMismatch { expected: usize, found: usize },
    /// Gaussian elimination met a pivot below tolerance while solving J*d = -F
    SingularMatrix { column: usize, pivot: f64 },
    /// function with the given index returned NaN or infinity
    NonFiniteResidual { function: usize },
    InvalidParameter(String),
}

impl fmt::Display for NonlinearSolverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NonlinearSolverError::DimensionMismatch { expected, found } => write!(
                f,
                "Dimension mismatch: expected {} components, found {}",
                expected, found
            ),
            NonlinearSolverError::SingularMatrix { column, pivot } => write!(
                f,
                "Jacobian is singular: pivot {:e} in column {}",
                pivot, column
            ),
            NonlinearSolverError::NonFiniteResidual { function } => {
                write!(f, "Function {} returned a non-finite value", function)
            }
            NonlinearSolverError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for NonlinearSolverError {}

impl From<LinearSystemError> for NonlinearSolverError {
    fn from(err: LinearSystemError) -> Self {
        match err {
            LinearSystemError::SingularMatrix { column, pivot } => {
                NonlinearSolverError::SingularMatrix { column, pivot }
            }
            LinearSystemError::DimensionMismatch { rows, cols, rhs } => {
                NonlinearSolverError::DimensionMismatch {
                    expected: rows,
                    found: if cols != rows { cols } else { rhs },
                }
            }
        }
    }
}

impl NonlinearSolverError {
    /// errors after which a fresh random start may still succeed
    pub fn is_restartable(&self) -> bool {
        matches!(
            self,
            NonlinearSolverError::SingularMatrix { .. } | NonlinearSolverError::NonFiniteResidual { .. }
        )
    }
}
