//! System F(x) = 0 of n callables in n unknowns: the residual (discrepancy) model,
//! the linearised Newton step and the two iteration drivers.
//!
//! Newton: x <- x + d, where J(x) d = -F(x).
//! Universal method: x <- x + k d, where k minimises the residual along d.
//! Both start from a random point in [0, 1)^n drawn from the caller's generator.
use crate::numerical::Nonlinear_systems::function::{NonlinearFunction, boxed_functions};
use crate::numerical::Nonlinear_systems::line_search::{
    LineSearchMethod, MAX_BRACKET_DOUBLINGS, local_minimum,
};
use crate::numerical::Nonlinear_systems::solver_error::NonlinearSolverError;
use crate::numerical::Nonlinear_systems::solver_utils::{CustomTimer, Timings, log_statistics};
use crate::somelinalg::gauss_elimination::{PIVOT_TOLERANCE, gauss_solve};
use crate::Utils::logger::init_logger;
use log::{error, info, warn};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use strum_macros::{Display, EnumIter};

/// Enum to represent the iteration drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Method {
    /// full Newton step
    Newton,
    /// Newton direction scaled by a line search
    Universal,
}

impl Method {
    pub fn from_name(name: &str) -> Result<Self, NonlinearSolverError> {
        match name.trim().to_lowercase().as_str() {
            "newton" => Ok(Method::Newton),
            "universal" | "damped" => Ok(Method::Universal),
            _ => Err(NonlinearSolverError::InvalidParameter(format!(
                "unknown method '{}', expected newton or universal",
                name
            ))),
        }
    }
}

/// How a solve ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SolveStatus {
    /// residual below tolerance
    #[strum(serialize = "converged")]
    Converged,
    /// iteration budget used up
    #[strum(serialize = "iteration budget exhausted")]
    Exhausted,
    /// the line search found no decrease along the Newton direction and no restart
    /// (or no iteration for one) was left
    #[strum(serialize = "stalled")]
    Stalled,
    /// the wall-clock budget of the configuration ran out
    #[strum(serialize = "deadline reached")]
    DeadlineReached,
}

/// Configuration of the drivers
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// perturbation for every Jacobian row; None keeps the step of each function
    pub fd_step: Option<f64>,
    pub pivot_tolerance: f64,
    pub line_search: LineSearchMethod,
    /// random restarts allowed after a singular Jacobian, a non-finite residual or a stall
    pub max_restarts: usize,
    pub max_bracket_doublings: usize,
    /// wall-clock budget of one solve
    pub deadline: Option<Duration>,
    /// when set, every solve installs a terminal logger at this level
    pub loglevel: Option<String>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            fd_step: None,
            pivot_tolerance: PIVOT_TOLERANCE,
            line_search: LineSearchMethod::default(),
            max_restarts: 10,
            max_bracket_doublings: MAX_BRACKET_DOUBLINGS,
            deadline: None,
            loglevel: None,
        }
    }
}

impl SolverConfig {
    pub fn set_fd_step(&mut self, fd_step: Option<f64>) {
        self.fd_step = fd_step;
    }
    pub fn set_pivot_tolerance(&mut self, pivot_tolerance: f64) {
        self.pivot_tolerance = pivot_tolerance;
    }
    pub fn set_line_search(&mut self, line_search: LineSearchMethod) {
        self.line_search = line_search;
    }
    pub fn set_max_restarts(&mut self, max_restarts: usize) {
        self.max_restarts = max_restarts;
    }
    pub fn set_max_bracket_doublings(&mut self, max_bracket_doublings: usize) {
        self.max_bracket_doublings = max_bracket_doublings;
    }
    pub fn set_deadline(&mut self, deadline: Option<Duration>) {
        self.deadline = deadline;
    }
    pub fn set_loglevel(&mut self, loglevel: Option<String>) {
        self.loglevel = loglevel;
    }

    pub fn validate(&self) -> Result<(), NonlinearSolverError> {
        if let Some(eps) = self.fd_step {
            if !(eps > 0.0) || !eps.is_finite() {
                return Err(NonlinearSolverError::InvalidParameter(format!(
                    "finite difference step must be positive, got {}",
                    eps
                )));
            }
        }
        if !(self.pivot_tolerance >= 0.0) || !self.pivot_tolerance.is_finite() {
            return Err(NonlinearSolverError::InvalidParameter(format!(
                "pivot tolerance must be non-negative, got {}",
                self.pivot_tolerance
            )));
        }
        if let Some(level) = &self.loglevel {
            if !["debug", "info", "warn", "error", "off", "none"].contains(&level.as_str()) {
                return Err(NonlinearSolverError::InvalidParameter(format!(
                    "loglevel must be debug, info, warn, error, off or none, got {}",
                    level
                )));
            }
        }
        self.line_search.validate()
    }
}

/// Outcome of a solve
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub x: DVector<f64>,
    /// discrepancy at x
    pub residual: f64,
    pub method: Method,
    /// Newton linearisations performed, failed ones before a restart included
    pub iterations: usize,
    pub restarts: usize,
    pub status: SolveStatus,
    /// discrepancy of every iterate since the last restart
    pub residual_history: Vec<f64>,
    /// evaluations of single component functions
    pub function_evaluations: usize,
    pub timings: Timings,
}

impl SolveReport {
    pub fn is_converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }

    pub fn statistics(&self) -> HashMap<String, String> {
        let mut stats = self.timings.get_all();
        stats.insert("method".to_string(), self.method.to_string());
        stats.insert("status".to_string(), self.status.to_string());
        stats.insert("length of x vector".to_string(), self.x.len().to_string());
        stats.insert("number of iterations".to_string(), self.iterations.to_string());
        stats.insert("number of restarts".to_string(), self.restarts.to_string());
        stats.insert(
            "function evaluations".to_string(),
            self.function_evaluations.to_string(),
        );
        stats.insert("residual".to_string(), format!("{:e}", self.residual));
        stats
    }

    pub fn print_statistics(&self) {
        log_statistics("CALC STATISTICS", self.statistics());
    }
}

/// x0 + t*d, the points on which the line search is evaluated
pub fn point_along(x0: &DVector<f64>, d: &DVector<f64>, t: f64) -> DVector<f64> {
    x0 + d * t
}

/// System of n callables in n unknowns
pub struct EquationSystem {
    functions: Vec<Box<dyn NonlinearFunction>>,
    n: usize,
    config: SolverConfig,
}

impl EquationSystem {
    pub fn new(functions: Vec<Box<dyn NonlinearFunction>>) -> Result<Self, NonlinearSolverError> {
        Self::with_config(functions, SolverConfig::default())
    }

    pub fn with_config(
        functions: Vec<Box<dyn NonlinearFunction>>,
        config: SolverConfig,
    ) -> Result<Self, NonlinearSolverError> {
        let n = functions.len();
        if n == 0 {
            return Err(NonlinearSolverError::InvalidParameter(
                "system must contain at least one function".to_string(),
            ));
        }
        for f in &functions {
            if let Some(arity) = f.arity() {
                if arity != n {
                    error!(
                        "function {} takes {} variables but the system has {} equations",
                        f.name(),
                        arity,
                        n
                    );
                    return Err(NonlinearSolverError::DimensionMismatch {
                        expected: n,
                        found: arity,
                    });
                }
            }
        }
        config.validate()?;
        check_fd_steps(&functions, &config)?;
        Ok(Self {
            functions,
            n,
            config,
        })
    }

    /// build from plain closures, each tagged with the system dimension
    pub fn from_closures<F>(closures: Vec<F>) -> Result<Self, NonlinearSolverError>
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::new(boxed_functions(closures))
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SolverConfig) -> Result<(), NonlinearSolverError> {
        config.validate()?;
        check_fd_steps(&self.functions, &config)?;
        self.config = config;
        Ok(())
    }

    /// n independent draws from U[0, 1)
    pub fn random_start<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<f64> {
        DVector::from_fn(self.n, |_, _| rng.random::<f64>())
    }

    ////////////////////////////////////RESIDUAL MODEL////////////////////////////////////
    /// sum of f_i(x)^2
    pub fn discrepancy(&self, x: &DVector<f64>) -> Result<f64, NonlinearSolverError> {
        self.check_len(x)?;
        Ok(self.sum_of_squares(x.as_slice()))
    }

    /// F(x), component by component
    pub fn residuals(&self, x: &DVector<f64>) -> Result<DVector<f64>, NonlinearSolverError> {
        self.check_len(x)?;
        let xs = x.as_slice();
        Ok(DVector::from_iterator(
            self.n,
            self.functions.iter().map(|f| f.evaluate(xs)),
        ))
    }

    /// discrepancy(x0 + t*d)
    pub fn discrepancy_along(
        &self,
        x0: &DVector<f64>,
        d: &DVector<f64>,
        t: f64,
    ) -> Result<f64, NonlinearSolverError> {
        self.check_len(x0)?;
        self.check_len(d)?;
        Ok(self.sum_of_squares(point_along(x0, d, t).as_slice()))
    }

    // x must already have length n
    fn sum_of_squares(&self, x: &[f64]) -> f64 {
        self.functions
            .iter()
            .map(|f| {
                let q = f.evaluate(x);
                q * q
            })
            .sum()
    }

    /// discrepancy with the length of x checked and non-finite values reported
    pub fn try_discrepancy(&self, x: &DVector<f64>) -> Result<f64, NonlinearSolverError> {
        self.check_len(x)?;
        let b = self.minus_residuals(x.as_slice())?;
        Ok(b.iter().map(|v| v * v).sum())
    }

    fn check_len(&self, x: &DVector<f64>) -> Result<(), NonlinearSolverError> {
        if x.len() != self.n {
            return Err(NonlinearSolverError::DimensionMismatch {
                expected: self.n,
                found: x.len(),
            });
        }
        Ok(())
    }

    /// b_i = -f_i(x)
    fn minus_residuals(&self, x: &[f64]) -> Result<DVector<f64>, NonlinearSolverError> {
        let mut b = DVector::zeros(self.n);
        for (i, f) in self.functions.iter().enumerate() {
            let v = f.evaluate(x);
            if !v.is_finite() {
                warn!("function {} ({}) returned {}", i, f.name(), v);
                return Err(NonlinearSolverError::NonFiniteResidual { function: i });
            }
            b[i] = -v;
        }
        Ok(b)
    }

    ////////////////////////////////////LINEAR STEP////////////////////////////////////
    /// Newton correction d with J(x) d = -F(x), together with the discrepancy at x
    pub fn linear_step(&self, x: &DVector<f64>) -> Result<(DVector<f64>, f64), NonlinearSolverError> {
        self.linear_step_timed(x, &mut CustomTimer::new())
    }

    fn linear_step_timed(
        &self,
        x: &DVector<f64>,
        timer: &mut CustomTimer,
    ) -> Result<(DVector<f64>, f64), NonlinearSolverError> {
        self.check_len(x)?;
        let xs = x.as_slice();
        timer.fun_tic();
        let b = self.minus_residuals(xs);
        timer.fun_tac();
        let b = b?;
        let discrepancy: f64 = b.iter().map(|v| v * v).sum();

        timer.jac_tic();
        let mut jac = DMatrix::zeros(self.n, self.n);
        for (i, f) in self.functions.iter().enumerate() {
            let row = match self.config.fd_step {
                Some(eps) => f.gradient_with_step(xs, eps),
                None => f.gradient(xs),
            };
            if row.len() != self.n {
                timer.jac_tac();
                return Err(NonlinearSolverError::DimensionMismatch {
                    expected: self.n,
                    found: row.len(),
                });
            }
            if row.iter().any(|v| !v.is_finite()) {
                timer.jac_tac();
                warn!("gradient of function {} ({}) is not finite", i, f.name());
                return Err(NonlinearSolverError::NonFiniteResidual { function: i });
            }
            for (j, v) in row.into_iter().enumerate() {
                jac[(i, j)] = v;
            }
        }
        timer.jac_tac();

        timer.linear_system_tic();
        let d = gauss_solve(&jac, &b, self.config.pivot_tolerance);
        timer.linear_system_tac();
        let d = d?;
        if let Some(column) = d.iter().position(|v| !v.is_finite()) {
            warn!("Newton correction overflowed in component {}", column);
            return Err(NonlinearSolverError::SingularMatrix { column, pivot: 0.0 });
        }
        Ok((d, discrepancy))
    }

    ////////////////////////////////////LINE SEARCH////////////////////////////////////
    /// step factor t minimising discrepancy(x + t*d) with the configured strategy
    pub fn local_minimum(
        &self,
        x: &DVector<f64>,
        d: &DVector<f64>,
    ) -> Result<f64, NonlinearSolverError> {
        self.check_len(x)?;
        self.check_len(d)?;
        Ok(local_minimum(
            |t| self.sum_of_squares(point_along(x, d, t).as_slice()),
            &self.config.line_search,
            self.config.max_bracket_doublings,
        ))
    }

    ////////////////////////////////////DRIVERS////////////////////////////////////
    /// Plain Newton iteration from a random start; returns the final x, converged or not
    pub fn newton_method<R: Rng + ?Sized>(
        &self,
        tolerance: f64,
        max_iterations: usize,
        rng: &mut R,
    ) -> Result<DVector<f64>, NonlinearSolverError> {
        Ok(self.solve(Method::Newton, tolerance, max_iterations, rng)?.x)
    }

    /// Damped Newton iteration with a line search along every correction;
    /// returns the final x, converged or not
    pub fn universal_method<R: Rng + ?Sized>(
        &self,
        tolerance: f64,
        max_iterations: usize,
        rng: &mut R,
    ) -> Result<DVector<f64>, NonlinearSolverError> {
        Ok(self.solve(Method::Universal, tolerance, max_iterations, rng)?.x)
    }

    pub fn solve<R: Rng + ?Sized>(
        &self,
        method: Method,
        tolerance: f64,
        max_iterations: usize,
        rng: &mut R,
    ) -> Result<SolveReport, NonlinearSolverError> {
        let x0 = self.random_start(rng);
        self.solve_from(method, x0, tolerance, max_iterations, rng)
    }

    /// Run a driver from the given start. The generator is used for restarts only.
    /// The iteration budget is shared by all restarts.
    pub fn solve_from<R: Rng + ?Sized>(
        &self,
        method: Method,
        x0: DVector<f64>,
        tolerance: f64,
        max_iterations: usize,
        rng: &mut R,
    ) -> Result<SolveReport, NonlinearSolverError> {
        if !(tolerance >= 0.0) {
            return Err(NonlinearSolverError::InvalidParameter(format!(
                "tolerance must be non-negative, got {}",
                tolerance
            )));
        }
        self.check_len(&x0)?;
        if let Some(level) = self.config.loglevel.as_deref() {
            init_logger(Some(level), None)
                .map_err(|e| NonlinearSolverError::InvalidParameter(e.to_string()))?;
        }
        let n = self.n;
        let mut timer = CustomTimer::new();
        let deadline = self.config.deadline.map(|budget| Instant::now() + budget);

        let mut x = x0;
        let mut residual = f64::NAN;
        // residual belongs to the current x
        let mut fresh = false;
        let mut history: Vec<f64> = Vec::new();
        let mut iterations = 0;
        let mut restarts = 0;
        let mut evaluations = 0;
        let mut status = SolveStatus::Exhausted;

        while iterations < max_iterations {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!("{} method: deadline reached after {} iterations", method, iterations);
                    status = SolveStatus::DeadlineReached;
                    break;
                }
            }
            iterations += 1;
            // residuals plus (n + 1) evaluations per gradient row
            evaluations += n * (n + 2);
            let (d, r) = match self.linear_step_timed(&x, &mut timer) {
                Ok(step) => step,
                // a restart needs at least one iteration left to be of any use
                Err(err)
                    if err.is_restartable()
                        && restarts < self.config.max_restarts
                        && iterations < max_iterations =>
                {
                    restarts += 1;
                    warn!(
                        "{} method: {} at iteration {}, restart {} from a random point",
                        method, err, iterations, restarts
                    );
                    x = self.random_start(rng);
                    history.clear();
                    fresh = false;
                    continue;
                }
                Err(err) => {
                    error!("{} method failed at iteration {}: {}", method, iterations, err);
                    return Err(err);
                }
            };
            residual = r;
            fresh = true;
            history.push(r);
            info!("iteration = {}, residual = {:e}", iterations, r);
            if r < tolerance {
                status = SolveStatus::Converged;
                break;
            }
            match method {
                Method::Newton => {
                    x += d;
                    fresh = false;
                }
                Method::Universal => {
                    let calls = Cell::new(0usize);
                    timer.line_search_tic();
                    let k = local_minimum(
                        |t| {
                            calls.set(calls.get() + 1);
                            self.sum_of_squares(point_along(&x, &d, t).as_slice())
                        },
                        &self.config.line_search,
                        self.config.max_bracket_doublings,
                    );
                    timer.line_search_tac();
                    evaluations += calls.get() * n;
                    if k == 0.0 {
                        warn!(
                            "{} method: no decrease along the Newton direction at iteration {}",
                            method, iterations
                        );
                        if restarts < self.config.max_restarts && iterations < max_iterations {
                            restarts += 1;
                            x = self.random_start(rng);
                            history.clear();
                            fresh = false;
                            continue;
                        }
                        status = SolveStatus::Stalled;
                        break;
                    }
                    x = point_along(&x, &d, k);
                    fresh = false;
                }
            }
        }

        if !fresh {
            residual = self.sum_of_squares(x.as_slice());
            evaluations += n;
            history.push(residual);
        }
        match status {
            SolveStatus::Converged => info!(
                "{} method converged in {} iterations, residual = {:e}",
                method, iterations, residual
            ),
            SolveStatus::Exhausted => error!(
                "{} method: maximum number of iterations reached, residual = {:e}",
                method, residual
            ),
            _ => warn!("{} method {}, residual = {:e}", method, status, residual),
        }
        let report = SolveReport {
            x,
            residual,
            method,
            iterations,
            restarts,
            status,
            residual_history: history,
            function_evaluations: evaluations,
            timings: timer.get_timings(),
        };
        Ok(report)
    }
}

/// per-function steps only matter when the configuration does not override them
fn check_fd_steps(
    functions: &[Box<dyn NonlinearFunction>],
    config: &SolverConfig,
) -> Result<(), NonlinearSolverError> {
    if config.fd_step.is_some() {
        return Ok(());
    }
    for f in functions {
        let eps = f.fd_step();
        if !(eps > 0.0) || !eps.is_finite() {
            return Err(NonlinearSolverError::InvalidParameter(format!(
                "finite difference step of {} must be positive, got {}",
                f.name(),
                eps
            )));
        }
    }
    Ok(())
}

impl fmt::Debug for EquationSystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<&str> = self.functions.iter().map(|f| f.name()).collect();
        f.debug_struct("EquationSystem")
            .field("functions", &names)
            .field("config", &self.config)
            .finish()
    }
}
