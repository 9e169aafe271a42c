use crate::numerical::Nonlinear_systems::equation_system::{
    EquationSystem, Method, SolverConfig,
};
use crate::numerical::Nonlinear_systems::function::{ClosureFunction, NonlinearFunction};
use crate::numerical::Nonlinear_systems::line_search::LineSearchMethod;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// x^2 + y^2 + z^2 = 9, xy = 4, x + yz = 4
fn sphere_system() -> Vec<Box<dyn NonlinearFunction>> {
    vec![
        Box::new(
            ClosureFunction::new(
                |x: &[f64]| x[0] * x[0] + x[1] * x[1] + x[2] * x[2] - 9.0,
                "sphere".to_string(),
            )
            .with_arity(3),
        ),
        Box::new(
            ClosureFunction::new(|x: &[f64]| x[0] * x[1] - 4.0, "hyperbola".to_string())
                .with_arity(3),
        ),
        Box::new(
            ClosureFunction::new(|x: &[f64]| x[0] + x[1] * x[2] - 4.0, "saddle".to_string())
                .with_arity(3),
        ),
    ]
}

/// x^2 - y^2 = 0, x sin(y) - y cos(x) = 0
fn trigonometric_system() -> Vec<Box<dyn NonlinearFunction>> {
    vec![
        Box::new(ClosureFunction::new(
            |x: &[f64]| x[0] * x[0] - x[1] * x[1],
            "x^2 - y^2".to_string(),
        )),
        Box::new(ClosureFunction::new(
            |x: &[f64]| x[0] * x[1].sin() - x[1] * x[0].cos(),
            "x sin y - y cos x".to_string(),
        )),
    ]
}

pub fn nonlinear_examples(example: usize) {
    match example {
        0 => {
            // both drivers on the same system and the same random start
            let system = match EquationSystem::new(sphere_system()) {
                Ok(system) => system,
                Err(e) => {
                    println!("cannot build the system: {}", e);
                    return;
                }
            };
            for method in [Method::Newton, Method::Universal] {
                let mut rng = StdRng::seed_from_u64(1);
                match system.solve(method, 1e-12, 100, &mut rng) {
                    Ok(report) => {
                        println!(
                            "{}: x = {:?}, status {}, {} iterations",
                            method,
                            report.x.as_slice(),
                            report.status,
                            report.iterations
                        );
                        report.print_statistics();
                    }
                    Err(e) => println!("{}: {}", method, e),
                }
            }
        }
        1 => {
            let system = match EquationSystem::new(trigonometric_system()) {
                Ok(system) => system,
                Err(e) => {
                    println!("cannot build the system: {}", e);
                    return;
                }
            };
            let mut rng = StdRng::seed_from_u64(5);
            match system.universal_method(1e-12, 200, &mut rng) {
                Ok(x) => match system.discrepancy(&x) {
                    Ok(r) => println!("root {:?}, discrepancy {:e}", x.as_slice(), r),
                    Err(e) => println!("{}", e),
                },
                Err(e) => println!("{}", e),
            }
        }
        2 => {
            // the two line searches of the universal method
            for line_search in [LineSearchMethod::default(), LineSearchMethod::super_search()] {
                let mut config = SolverConfig::default();
                config.set_line_search(line_search);
                let system = match EquationSystem::with_config(sphere_system(), config) {
                    Ok(system) => system,
                    Err(e) => {
                        println!("cannot build the system: {}", e);
                        return;
                    }
                };
                let mut rng = StdRng::seed_from_u64(3);
                match system.solve(Method::Universal, 1e-12, 100, &mut rng) {
                    Ok(report) => println!(
                        "{:?}: {} iterations, {} restarts, {} function evaluations, residual {:e}",
                        line_search,
                        report.iterations,
                        report.restarts,
                        report.function_evaluations,
                        report.residual
                    ),
                    Err(e) => println!("{:?}: {}", line_search, e),
                }
            }
        }
        _ => println!("no example with number {}", example),
    }
}
