//! dense linear algebra used by the nonlinear solvers
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
/// Gaussian elimination with partial pivoting, the linear solver of every Newton step
pub mod gauss_elimination;
/// diagnostics for linear systems and matrices: if it is singular
/// or poorly conditioned
pub mod linear_sys_diagnostics;
