//! Dense Gaussian elimination with partial pivoting, used to compute the
//! Newton correction J*d = -F at every iteration.
use crate::somelinalg::linear_sys_diagnostics::linear_system_diagnostics;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// default threshold below which a pivot is considered zero
pub const PIVOT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub enum LinearSystemError {
    /// matrix is not square or the right-hand side has wrong length
    DimensionMismatch { rows: usize, cols: usize, rhs: usize },
    /// the best available pivot of `column` is below tolerance
    SingularMatrix { column: usize, pivot: f64 },
}

impl fmt::Display for LinearSystemError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinearSystemError::DimensionMismatch { rows, cols, rhs } => write!(
                f,
                "Matrix {}x{} and right-hand side of length {} do not form a square system",
                rows, cols, rhs
            ),
            LinearSystemError::SingularMatrix { column, pivot } => write!(
                f,
                "Matrix is singular: largest pivot in column {} is {:e}",
                column, pivot
            ),
        }
    }
}

impl std::error::Error for LinearSystemError {}

/// Solve A*x = b by Gaussian elimination with partial pivoting and back substitution.
/// A and b are not modified, elimination runs on a copy of the augmented matrix [A|b].
pub fn gauss_solve(
    A: &DMatrix<f64>,
    b: &DVector<f64>,
    pivot_tolerance: f64,
) -> Result<DVector<f64>, LinearSystemError> {
    let (n, m) = A.shape();
    if n != m || b.len() != n {
        return Err(LinearSystemError::DimensionMismatch {
            rows: n,
            cols: m,
            rhs: b.len(),
        });
    }
    let mut Ab = DMatrix::<f64>::zeros(n, n + 1);
    Ab.view_mut((0, 0), (n, n)).copy_from(A);
    Ab.set_column(n, b);

    // forward elimination
    for col in 0..n {
        // row with the largest magnitude in the current column
        let (offset, pivot) = Ab
            .view_range(col.., col)
            .iter()
            .enumerate()
            .fold((0usize, 0.0f64), |(best_i, best), (i, v)| {
                if v.abs() > best.abs() { (i, *v) } else { (best_i, best) }
            });
        if !(pivot.abs() >= pivot_tolerance) {
            warn!(
                "Gaussian elimination: pivot {:e} in column {} below tolerance {:e}",
                pivot, col, pivot_tolerance
            );
            if log::log_enabled!(log::Level::Debug) {
                linear_system_diagnostics(A, b, 1e12);
            }
            return Err(LinearSystemError::SingularMatrix { column: col, pivot });
        }
        let pivot_row = col + offset;
        if pivot_row != col {
            Ab.swap_rows(col, pivot_row);
        }
        for row in col + 1..n {
            let factor = Ab[(row, col)] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..n + 1 {
                Ab[(row, k)] -= factor * Ab[(col, k)];
            }
        }
    }
    // back substitution
    let mut x = DVector::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut s = Ab[(i, n)];
        for k in i + 1..n {
            s -= Ab[(i, k)] * x[k];
        }
        x[i] = s / Ab[(i, i)];
    }
    debug!("Gaussian elimination solved {}x{} system", n, n);
    Ok(x)
}

/// same as gauss_solve but for row-major nested vectors
pub fn gauss_solve_vec(
    matrix: &[Vec<f64>],
    constants: &[f64],
    pivot_tolerance: f64,
) -> Result<Vec<f64>, LinearSystemError> {
    let n = matrix.len();
    if let Some(row) = matrix.iter().find(|row| row.len() != n) {
        return Err(LinearSystemError::DimensionMismatch {
            rows: n,
            cols: row.len(),
            rhs: constants.len(),
        });
    }
    let A: DMatrix<f64> = DMatrix::from_fn(n, n, |i, j| matrix[i][j]);
    let b: DVector<f64> = DVector::from_column_slice(constants);
    let x = gauss_solve(&A, &b, pivot_tolerance)?;
    Ok(x.data.into())
}
