//! Solvers for systems of nonlinear algebraic equations F(x) = 0 where every
//! component is an opaque callable and derivatives are taken by finite differences.
/// callable functions of n variables and their finite-difference gradients
pub mod function;
/// error type shared by the nonlinear solvers
pub mod solver_error;
/// 1-D minimizers used to choose the step length along a Newton direction
pub mod line_search;
/// residual model, Newton step and the two iteration drivers
///  Example#1
/// ```
///  use RustedEquilibria::numerical::Nonlinear_systems::equation_system::{EquationSystem, Method};
///  use RustedEquilibria::numerical::Nonlinear_systems::function::{ClosureFunction, NonlinearFunction};
///  use rand::SeedableRng;
///  use rand::rngs::StdRng;
///  let functions: Vec<Box<dyn NonlinearFunction>> = vec![
///      Box::new(ClosureFunction::new(|x: &[f64]| x[0] * x[0] - 4.0, "x^2-4".to_string())),
///      Box::new(ClosureFunction::new(|x: &[f64]| x[0] * x[1] - 6.0, "xy-6".to_string())),
///  ];
///  let system = EquationSystem::new(functions).unwrap();
///  let mut rng = StdRng::seed_from_u64(7);
///  let report = system.solve(Method::Universal, 1e-12, 100, &mut rng).unwrap();
///  assert!(report.is_converged());
///  ```
pub mod equation_system;
/// timers and statistics of a solve
pub mod solver_utils;
#[cfg(test)]
mod equation_system_tests;
