/////////////////////////////TESTS////////////////////////////////////////////////////
/*
end-to-end tests of the drivers:
sphere / hyperbola / plane system with both drivers and both line searches
trigonometric system with the trivial root
unique root of a contractive system
monotone residual of the universal method
dimension checks, restarts, stall and deadline
*/

#[cfg(test)]
mod tests {
    use crate::numerical::Nonlinear_systems::equation_system::{
        EquationSystem, Method, SolveStatus, SolverConfig, point_along,
    };
    use crate::numerical::Nonlinear_systems::function::{ClosureFunction, NonlinearFunction};
    use crate::numerical::Nonlinear_systems::line_search::LineSearchMethod;
    use crate::numerical::Nonlinear_systems::solver_error::NonlinearSolverError;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;
    use strum::IntoEnumIterator;

    fn sphere_functions() -> Vec<Box<dyn NonlinearFunction>> {
        vec![
            Box::new(ClosureFunction::new(
                |x: &[f64]| x[0] * x[0] + x[1] * x[1] + x[2] * x[2] - 9.0,
                "sphere".to_string(),
            )),
            Box::new(ClosureFunction::new(
                |x: &[f64]| x[0] * x[1] - 4.0,
                "hyperbola".to_string(),
            )),
            Box::new(ClosureFunction::new(
                |x: &[f64]| x[0] + x[1] * x[2] - 4.0,
                "saddle".to_string(),
            )),
        ]
    }

    fn sphere_system() -> EquationSystem {
        EquationSystem::new(sphere_functions()).unwrap()
    }

    fn trig_system() -> EquationSystem {
        let functions: Vec<Box<dyn NonlinearFunction>> = vec![
            Box::new(ClosureFunction::new(
                |x: &[f64]| x[0] * x[0] - x[1] * x[1],
                "x^2 - y^2".to_string(),
            )),
            Box::new(ClosureFunction::new(
                |x: &[f64]| x[0] * x[1].sin() - x[1] * x[0].cos(),
                "x sin(y) - y cos(x)".to_string(),
            )),
        ];
        EquationSystem::new(functions).unwrap()
    }

    // 3x = cos(y), 3y = sin(x)/2 + 1 is a contraction, so the root is unique
    fn contractive_system() -> EquationSystem {
        let functions: Vec<Box<dyn NonlinearFunction>> = vec![
            Box::new(ClosureFunction::new(
                |x: &[f64]| 3.0 * x[0] - x[1].cos(),
                "f0".to_string(),
            )),
            Box::new(ClosureFunction::new(
                |x: &[f64]| 3.0 * x[1] - 0.5 * x[0].sin() - 1.0,
                "f1".to_string(),
            )),
        ];
        EquationSystem::new(functions).unwrap()
    }

    fn assert_sphere_root(system: &EquationSystem, x: &DVector<f64>) {
        let functions = sphere_functions();
        for f in functions.iter() {
            assert!(f.evaluate(x.as_slice()).abs() <= 1e-6, "{} at {}", f.name(), x);
        }
        assert!(system.discrepancy(x).unwrap() < 1e-12);
    }

    #[test]
    fn test_universal_method_sphere() {
        let system = sphere_system();
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let report = system.solve(Method::Universal, 1e-12, 200, &mut rng).unwrap();
            assert!(report.is_converged(), "seed {}: {:?}", seed, report.status);
            assert_sphere_root(&system, &report.x);
            assert_eq!(report.residual, system.discrepancy(&report.x).unwrap());
        }
    }

    #[test]
    fn test_universal_method_sphere_super_search() {
        let mut config = SolverConfig::default();
        config.set_line_search(LineSearchMethod::super_search());
        let system = EquationSystem::with_config(sphere_functions(), config).unwrap();
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(100 + seed);
            let report = system.solve(Method::Universal, 1e-12, 200, &mut rng).unwrap();
            assert!(report.is_converged(), "seed {}: {:?}", seed, report.status);
            assert_sphere_root(&system, &report.x);
        }
    }

    #[test]
    fn test_newton_method_sphere() {
        let system = sphere_system();
        let mut converged = 0;
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let report = system.solve(Method::Newton, 1e-12, 100, &mut rng).unwrap();
            if report.is_converged() {
                converged += 1;
                assert_sphere_root(&system, &report.x);
            } else {
                assert_eq!(report.status, SolveStatus::Exhausted);
                assert_eq!(report.iterations, 100);
            }
        }
        assert!(converged >= 5, "only {} of 10 Newton runs converged", converged);
    }

    #[test]
    fn test_bare_methods_return_x() {
        let system = sphere_system();
        let mut rng = StdRng::seed_from_u64(3);
        let x = system.universal_method(1e-12, 200, &mut rng).unwrap();
        assert_sphere_root(&system, &x);
        // Newton returns its last iterate whether or not it converged
        let mut found = false;
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let x = system.newton_method(1e-12, 100, &mut rng).unwrap();
            assert_eq!(x.len(), 3);
            if system.discrepancy(&x).unwrap() < 1e-12 {
                assert_sphere_root(&system, &x);
                found = true;
                break;
            }
        }
        assert!(found);
    }

    #[test]
    fn test_trig_system() {
        let system = trig_system();
        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            let report = system.solve(Method::Universal, 1e-12, 100, &mut rng).unwrap();
            assert!(report.is_converged());
            assert!(system.discrepancy(&report.x).unwrap() < 1e-12);
        }
        let newton_converged = (0..5).any(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let report = system.solve(Method::Newton, 1e-12, 100, &mut rng).unwrap();
            report.is_converged()
        });
        assert!(newton_converged);
        // the trivial root is a root
        assert_eq!(system.discrepancy(&DVector::from_vec(vec![0.0, 0.0])).unwrap(), 0.0);
    }

    #[test]
    fn test_contractive_system_unique_root() {
        let system = contractive_system();
        let mut roots = Vec::new();
        for method in [Method::Newton, Method::Universal] {
            for seed in 0..10 {
                let mut rng = StdRng::seed_from_u64(seed);
                let report = system.solve(method, 1e-14, 50, &mut rng).unwrap();
                assert!(report.is_converged());
                assert!(report.iterations <= 10);
                assert_eq!(report.restarts, 0);
                roots.push(report.x);
            }
        }
        for x in &roots {
            assert_relative_eq!(x[0], roots[0][0], epsilon = 1e-6);
            assert_relative_eq!(x[1], roots[0][1], epsilon = 1e-6);
            assert_relative_eq!(3.0 * x[0], x[1].cos(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_universal_residual_is_monotone() {
        for (system, max_iterations) in [(sphere_system(), 200), (trig_system(), 100)] {
            for seed in 0..10 {
                let mut rng = StdRng::seed_from_u64(seed);
                let report = system
                    .solve(Method::Universal, 1e-12, max_iterations, &mut rng)
                    .unwrap();
                assert!(!report.residual_history.is_empty());
                for w in report.residual_history.windows(2) {
                    assert!(w[1] <= w[0], "residual grew from {} to {}", w[0], w[1]);
                }
            }
        }
    }

    #[test]
    fn test_linear_step_on_linear_system() {
        // F(x) = A x - b, the Newton correction lands on the solution
        let functions: Vec<Box<dyn NonlinearFunction>> = vec![
            Box::new(ClosureFunction::new(
                |x: &[f64]| 2.0 * x[0] + x[1] - 5.0,
                "row0".to_string(),
            )),
            Box::new(ClosureFunction::new(
                |x: &[f64]| x[0] - 3.0 * x[1] + 1.0,
                "row1".to_string(),
            )),
        ];
        let system = EquationSystem::new(functions).unwrap();
        let x = DVector::from_vec(vec![0.0, 0.0]);
        let (d, residual) = system.linear_step(&x).unwrap();
        assert_eq!(residual, 26.0);
        assert_relative_eq!(d[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(d[1], 1.0, epsilon = 1e-6);
        let A = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, -3.0]);
        let Ad = A * &d;
        assert_relative_eq!(Ad[0], 5.0, epsilon = 1e-6);
        assert_relative_eq!(Ad[1], -1.0, epsilon = 1e-6);
        let F = system.residuals(&x).unwrap();
        assert_eq!(F.as_slice(), &[-5.0, 1.0]);
    }

    #[test]
    fn test_discrepancy_along_and_local_minimum() {
        let system = sphere_system();
        let x = DVector::from_vec(vec![0.5, 0.25, 0.75]);
        let (d, residual) = system.linear_step(&x).unwrap();
        assert_eq!(residual, system.discrepancy(&x).unwrap());
        assert_eq!(system.discrepancy_along(&x, &d, 0.0).unwrap(), residual);
        assert_eq!(
            system.discrepancy_along(&x, &d, 0.3).unwrap(),
            system.discrepancy(&point_along(&x, &d, 0.3)).unwrap()
        );
        let k = system.local_minimum(&x, &d).unwrap();
        assert!(system.discrepancy_along(&x, &d, k).unwrap() <= residual);
        assert_eq!(system.try_discrepancy(&x), Ok(residual));
    }

    #[test]
    fn test_newton_linear_counts() {
        let system = EquationSystem::from_closures(vec![|x: &[f64]| x[0] - 1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let report = system
            .solve_from(Method::Newton, DVector::from_vec(vec![0.0]), 1e-12, 10, &mut rng)
            .unwrap();
        assert!(report.is_converged());
        assert_eq!(report.iterations, 2);
        assert_eq!(report.residual_history.len(), 2);
        assert_eq!(report.residual_history[0], 1.0);
        // one residual and two gradient evaluations per iteration
        assert_eq!(report.function_evaluations, 6);
        assert_relative_eq!(report.x[0], 1.0, epsilon = 1e-9);
        let stats = report.statistics();
        assert_eq!(stats["number of iterations"], "2");
        assert_eq!(stats["status"], "converged");
        assert_eq!(stats["method"], "Newton");
    }

    #[test]
    fn test_dimension_mismatch() {
        let functions: Vec<Box<dyn NonlinearFunction>> = vec![
            Box::new(ClosureFunction::new(|x: &[f64]| x[0], "f0".to_string()).with_arity(3)),
            Box::new(ClosureFunction::new(|x: &[f64]| x[1], "f1".to_string())),
        ];
        assert!(matches!(
            EquationSystem::new(functions),
            Err(NonlinearSolverError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        ));
        assert!(matches!(
            EquationSystem::new(Vec::new()),
            Err(NonlinearSolverError::InvalidParameter(_))
        ));
        let system = sphere_system();
        let short = DVector::from_vec(vec![1.0, 2.0]);
        assert_eq!(
            system.linear_step(&short).unwrap_err(),
            NonlinearSolverError::DimensionMismatch {
                expected: 3,
                found: 2
            }
        );
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            system.solve_from(Method::Universal, short, 1e-12, 10, &mut rng),
            Err(NonlinearSolverError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            system.solve(Method::Newton, -1.0, 10, &mut rng),
            Err(NonlinearSolverError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_singular_jacobian_propagates_after_restarts() {
        // neither equation depends on x[1], the second column of J is exactly zero
        let mut config = SolverConfig::default();
        config.set_max_restarts(3);
        let functions: Vec<Box<dyn NonlinearFunction>> = vec![
            Box::new(ClosureFunction::new(|x: &[f64]| x[0] - 1.0, "f0".to_string())),
            Box::new(ClosureFunction::new(|x: &[f64]| x[0] - 2.0, "f1".to_string())),
        ];
        let system = EquationSystem::with_config(functions, config).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for method in [Method::Newton, Method::Universal] {
            let res = system.solve(method, 1e-12, 100, &mut rng);
            assert!(matches!(res, Err(NonlinearSolverError::SingularMatrix { .. })));
        }
    }

    #[test]
    fn test_singular_jacobian_propagates_when_budget_is_short() {
        // more restarts allowed than iterations available
        let functions: Vec<Box<dyn NonlinearFunction>> = vec![
            Box::new(ClosureFunction::new(|x: &[f64]| x[0] - 1.0, "f0".to_string())),
            Box::new(ClosureFunction::new(|x: &[f64]| x[0] - 2.0, "f1".to_string())),
        ];
        let system = EquationSystem::new(functions).unwrap();
        assert_eq!(system.config().max_restarts, 10);
        let mut rng = StdRng::seed_from_u64(2);
        for method in [Method::Newton, Method::Universal] {
            for max_iterations in [1, 5] {
                assert!(matches!(
                    system.solve(method, 1e-12, max_iterations, &mut rng),
                    Err(NonlinearSolverError::SingularMatrix { .. })
                ));
                assert!(matches!(
                    system.newton_method(1e-12, max_iterations, &mut rng),
                    Err(NonlinearSolverError::SingularMatrix { .. })
                ));
            }
        }
    }

    #[test]
    fn test_non_finite_residual_restarts() {
        // undefined far from the unit box
        let system = EquationSystem::from_closures(vec![|x: &[f64]| {
            if x[0] > 5.0 { f64::NAN } else { x[0] - 0.5 }
        }])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let report = system
            .solve_from(Method::Newton, DVector::from_vec(vec![10.0]), 1e-12, 20, &mut rng)
            .unwrap();
        assert!(report.is_converged());
        assert_eq!(report.restarts, 1);
        assert_relative_eq!(report.x[0], 0.5, epsilon = 1e-9);

        let mut config = SolverConfig::default();
        config.set_max_restarts(0);
        let system = EquationSystem::with_config(
            vec![Box::new(ClosureFunction::new(
                |x: &[f64]| if x[0] > 5.0 { f64::INFINITY } else { x[0] },
                "f".to_string(),
            )) as Box<dyn NonlinearFunction>],
            config,
        )
        .unwrap();
        assert_eq!(
            system
                .solve_from(Method::Universal, DVector::from_vec(vec![7.0]), 1e-12, 20, &mut rng)
                .unwrap_err(),
            NonlinearSolverError::NonFiniteResidual { function: 0 }
        );
        assert!(system.try_discrepancy(&DVector::from_vec(vec![7.0])).is_err());
    }

    #[test]
    fn test_stall_without_root() {
        // x^2 + 1 has no real root; at x = 0 the Newton direction is useless
        let mut config = SolverConfig::default();
        config.set_max_restarts(0);
        let system = EquationSystem::with_config(
            vec![Box::new(ClosureFunction::new(
                |x: &[f64]| x[0] * x[0] + 1.0,
                "x^2 + 1".to_string(),
            )) as Box<dyn NonlinearFunction>],
            config,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let report = system
            .solve_from(Method::Universal, DVector::from_vec(vec![0.0]), 1e-12, 50, &mut rng)
            .unwrap();
        assert_eq!(report.status, SolveStatus::Stalled);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.residual, 1.0);
        assert_eq!(report.x[0], 0.0);
        assert!(!report.is_converged());
    }

    #[test]
    fn test_stall_on_last_iteration_keeps_iterate() {
        // restarts are allowed but the budget is spent, so x = 0 is reported as it is
        let system = EquationSystem::from_closures(vec![|x: &[f64]| x[0] * x[0] + 1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let report = system
            .solve_from(Method::Universal, DVector::from_vec(vec![0.0]), 1e-12, 1, &mut rng)
            .unwrap();
        assert_eq!(report.status, SolveStatus::Stalled);
        assert_eq!(report.restarts, 0);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.x[0], 0.0);
        assert_eq!(report.residual, 1.0);
    }

    #[test]
    fn test_residual_model_checks_lengths() {
        let closures: Vec<fn(&[f64]) -> f64> = vec![|x| x[0] + x[1] - 1.0, |x| x[0] - x[1]];
        let system = EquationSystem::from_closures(closures).unwrap();
        let short = DVector::from_vec(vec![1.0]);
        let x = DVector::from_vec(vec![1.0, 0.0]);
        let mismatch = NonlinearSolverError::DimensionMismatch {
            expected: 2,
            found: 1,
        };
        assert_eq!(system.discrepancy(&short), Err(mismatch.clone()));
        assert_eq!(system.residuals(&short), Err(mismatch.clone()));
        assert_eq!(system.discrepancy_along(&short, &x, 0.5), Err(mismatch.clone()));
        assert_eq!(system.discrepancy_along(&x, &short, 0.5), Err(mismatch.clone()));
        assert_eq!(system.local_minimum(&x, &short), Err(mismatch));
        // f = (0, 1) at (1, 0)
        assert_eq!(system.discrepancy(&x), Ok(1.0));
        assert_eq!(system.residuals(&x).unwrap().as_slice(), &[0.0, 1.0]);
    }

    #[test]
    fn test_function_step_is_validated() {
        let make = |eps: f64| -> Vec<Box<dyn NonlinearFunction>> {
            vec![Box::new(
                ClosureFunction::new(|x: &[f64]| x[0] - 1.0, "f".to_string()).with_fd_step(eps),
            )]
        };
        assert!(matches!(
            EquationSystem::new(make(0.0)),
            Err(NonlinearSolverError::InvalidParameter(_))
        ));
        assert!(matches!(
            EquationSystem::new(make(f64::NAN)),
            Err(NonlinearSolverError::InvalidParameter(_))
        ));
        // a configured step replaces the function's own
        let mut config = SolverConfig::default();
        config.set_fd_step(Some(1e-6));
        let mut system = EquationSystem::with_config(make(-1.0), config).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(system.solve(Method::Newton, 1e-12, 10, &mut rng).unwrap().is_converged());
        assert!(system.set_config(SolverConfig::default()).is_err());
    }

    #[test]
    fn test_solve_with_loglevel() {
        let mut config = SolverConfig::default();
        config.set_loglevel(Some("warn".to_string()));
        let functions: Vec<Box<dyn NonlinearFunction>> = vec![Box::new(ClosureFunction::new(
            |x: &[f64]| 2.0 * x[0] - 1.0,
            "2x - 1".to_string(),
        ))];
        let system = EquationSystem::with_config(functions, config).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let report = system.solve(Method::Universal, 1e-12, 10, &mut rng).unwrap();
        assert!(report.is_converged());
        assert_relative_eq!(report.x[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_exhausted_budget() {
        let system = sphere_system();
        let mut rng = StdRng::seed_from_u64(5);
        let report = system.solve(Method::Universal, 0.0, 3, &mut rng).unwrap();
        assert_eq!(report.status, SolveStatus::Exhausted);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.residual, system.discrepancy(&report.x).unwrap());
        let report = system.solve(Method::Newton, 1e-12, 0, &mut rng).unwrap();
        assert_eq!(report.iterations, 0);
        assert_eq!(report.residual_history.len(), 1);
    }

    #[test]
    fn test_deadline() {
        let mut config = SolverConfig::default();
        config.set_deadline(Some(Duration::ZERO));
        let system = EquationSystem::with_config(sphere_functions(), config).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let report = system.solve(Method::Universal, 1e-12, 100, &mut rng).unwrap();
        assert_eq!(report.status, SolveStatus::DeadlineReached);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SolverConfig::default();
        assert!(config.validate().is_ok());
        config.set_pivot_tolerance(-1.0);
        assert!(EquationSystem::with_config(sphere_functions(), config.clone()).is_err());
        let mut config = SolverConfig::default();
        config.set_fd_step(Some(0.0));
        assert!(config.validate().is_err());
        let mut config = SolverConfig::default();
        config.set_loglevel(Some("verbose".to_string()));
        assert!(config.validate().is_err());
        let mut system = sphere_system();
        let mut config = SolverConfig::default();
        config.set_fd_step(Some(1e-7));
        config.set_max_bracket_doublings(10);
        assert!(system.set_config(config).is_ok());
        assert_eq!(system.config().fd_step, Some(1e-7));
        assert_eq!(system.dimension(), 3);
    }

    #[test]
    fn test_method_names() {
        assert_eq!(Method::from_name("Newton").unwrap(), Method::Newton);
        assert_eq!(Method::from_name(" universal ").unwrap(), Method::Universal);
        assert!(Method::from_name("secant").is_err());
        assert_eq!(Method::Universal.to_string(), "Universal");
        for method in Method::iter() {
            assert_eq!(Method::from_name(&method.to_string()).unwrap(), method);
        }
        assert_eq!(SolveStatus::Exhausted.to_string(), "iteration budget exhausted");
        assert_eq!(SolveStatus::DeadlineReached.to_string(), "deadline reached");
    }

    #[test]
    fn test_system_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EquationSystem>();
    }
}
