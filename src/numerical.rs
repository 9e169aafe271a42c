///  Example#1
/// ```
///  use RustedEquilibria::numerical::Nonlinear_systems::equation_system::EquationSystem;
///  use RustedEquilibria::numerical::Nonlinear_systems::function::{ClosureFunction, NonlinearFunction};
///  use rand::SeedableRng;
///  use rand::rngs::StdRng;
///  // x^2 + y^2 = 10, x - y = 4
///  let functions: Vec<Box<dyn NonlinearFunction>> = vec![
///      Box::new(ClosureFunction::new(|x: &[f64]| x[0] * x[0] + x[1] * x[1] - 10.0, "circle".to_string())),
///      Box::new(ClosureFunction::new(|x: &[f64]| x[0] - x[1] - 4.0, "line".to_string())),
///  ];
///  let system = EquationSystem::new(functions).unwrap();
///  let mut rng = StdRng::seed_from_u64(42);
///  let x = system.universal_method(1e-12, 100, &mut rng).unwrap();
///  assert!(system.discrepancy(&x).unwrap() < 1e-10);
///  ```
pub mod Nonlinear_systems;
