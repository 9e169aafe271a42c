use log::{debug, warn};
use nalgebra::{DMatrix, DVector, stack};
/// Rouché–Capelli theorem: A*x = b has a solution if and only if rank(A) == rank([A b]).
pub fn Rouche_Capelli_theorem(A: &DMatrix<f64>, b: &DVector<f64>) -> bool {
    let Ab: DMatrix<f64> = stack![A, b];
    let eps = 1e3 * f64::EPSILON; // tolerance for rank calculation
    let rank_A = A.rank(eps);
    let rank_Ab = Ab.rank(eps);

    let result = rank_A == rank_Ab;
    if !result {
        warn!(
            "The system has no solution. rank(A) = {} != rank([A b]) = {}",
            rank_A, rank_Ab
        );
    }
    result
}
/// ratio of the largest to the smallest singular value; infinite for a singular matrix
pub fn condition_number(A: &DMatrix<f64>) -> f64 {
    if A.is_empty() || A.iter().any(|v| !v.is_finite()) {
        return f64::INFINITY;
    }
    let singular_values = A.singular_values();
    let max_sigma = singular_values.max();
    let min_sigma = singular_values.min();
    if min_sigma == 0.0 {
        f64::INFINITY
    } else {
        max_sigma / min_sigma
    }
}

pub fn poorly_conditioned(A: &DMatrix<f64>, threshold: f64) -> bool {
    let condition_number = condition_number(A);
    let poorly_conditioned = condition_number > threshold;
    if poorly_conditioned {
        warn!(
            "The system of linear equations is poorly conditioned. Condition number = {:.2e}",
            condition_number
        );
    }
    poorly_conditioned
}
/// Report why a Newton step could not be computed: consistency of the system and
/// conditioning of the Jacobian. Returns true if the system looks healthy.
pub fn linear_system_diagnostics(A: &DMatrix<f64>, b: &DVector<f64>, threshold: f64) -> bool {
    if A.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        warn!("The linear system contains NaN or infinite entries");
        return false;
    }
    let solvable = Rouche_Capelli_theorem(A, b);
    let ill = poorly_conditioned(A, threshold);
    debug!(
        "linear system diagnostics: solvable = {}, poorly conditioned = {}",
        solvable, ill
    );
    solvable && !ill
}

/// famous example of ill-conditioned matrix
#[cfg(test)]
fn hilbert_matrix(n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| 1.0 / (i as f64 + j as f64 + 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_Rouche_Capelli_theorem() {
        // example https://en.wikipedia.org/wiki/Rouché–Capelli_theorem
        let A = DMatrix::from_vec(3, 3, vec![1.0, 1.0, 2.0, 1.0, 1.0, 2.0, 2.0, 1.0, 2.0]);
        let b = DVector::from_vec(vec![3.0, 1.0, 5.0]);
        assert_eq!(Rouche_Capelli_theorem(&A, &b), false);
    }
    #[test]
    fn test_condition_number_identity() {
        let A = DMatrix::<f64>::identity(4, 4);
        assert!((condition_number(&A) - 1.0).abs() < 1e-12);
    }
    #[test]
    fn test_condition_number_singular() {
        let A = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 0.0]);
        assert!(condition_number(&A) > 1e15);
        let A = DMatrix::from_row_slice(2, 2, &[f64::NAN, 2.0, 0.0, 1.0]);
        assert_eq!(condition_number(&A), f64::INFINITY);
    }
    #[test]
    fn test_poorly_conditioned_hilbert() {
        let A = hilbert_matrix(6);
        assert_eq!(poorly_conditioned(&A, 1e5), true);
        assert_eq!(poorly_conditioned(&DMatrix::<f64>::identity(6, 6), 1e5), false);
    }
    #[test]
    fn test_linear_system_diagnostics() {
        let A = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 3.0]);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        assert!(linear_system_diagnostics(&A, &b, 1e8));
        let A = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(!linear_system_diagnostics(&A, &b, 1e8));
    }
}
