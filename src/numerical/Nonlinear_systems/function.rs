use crate::numerical::Nonlinear_systems::solver_error::NonlinearSolverError;

/// default perturbation of the one-sided finite differences
pub const FD_STEP: f64 = 1e-6;

/// One-sided finite difference of a function of one variable: (f(x + eps) - f(x)) / eps
pub fn forward_difference<F>(f: F, x: f64, eps: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    (f(x + eps) - f(x)) / eps
}

//////////////////////////////////TRAITS AND IMPLEMENTATIONS/////////////////////////////////
/// Trait for representing one component f_i: R^n -> R of a system F(x) = 0
pub trait NonlinearFunction: Send + Sync {
    /// Evaluate the function at point x
    fn evaluate(&self, x: &[f64]) -> f64;

    /// perturbation used by the default gradient
    fn fd_step(&self) -> f64 {
        FD_STEP
    }

    /// number of variables the function expects, None if it does not say
    fn arity(&self) -> Option<usize> {
        None
    }

    /// Get function name for debugging/logging
    fn name(&self) -> &str {
        "unnamed_function"
    }

    /// Gradient by one-sided finite differences with the function's own step
    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        self.gradient_with_step(x, self.fd_step())
    }

    /// The i-th coordinate of a scratch copy of x is shifted by +eps, evaluated and
    /// restored; x itself is never touched.
    fn gradient_with_step(&self, x: &[f64], eps: f64) -> Vec<f64> {
        let y = self.evaluate(x);
        let mut xn = x.to_vec();
        let mut res = Vec::with_capacity(x.len());
        for i in 0..x.len() {
            xn[i] += eps;
            res.push((self.evaluate(&xn) - y) / eps);
            xn[i] = x[i];
        }
        res
    }

    /// evaluate with the length of x checked against arity()
    fn try_evaluate(&self, x: &[f64]) -> Result<f64, NonlinearSolverError> {
        self.check_arity(x)?;
        Ok(self.evaluate(x))
    }

    /// gradient with the length of x checked against arity()
    fn try_gradient(&self, x: &[f64]) -> Result<Vec<f64>, NonlinearSolverError> {
        self.check_arity(x)?;
        Ok(self.gradient(x))
    }

    fn check_arity(&self, x: &[f64]) -> Result<(), NonlinearSolverError> {
        match self.arity() {
            Some(n) if n != x.len() => Err(NonlinearSolverError::DimensionMismatch {
                expected: n,
                found: x.len(),
            }),
            _ => Ok(()),
        }
    }
}

/// Simple function wrapper for closures
pub struct ClosureFunction<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    func: F,
    name: String,
    arity: Option<usize>,
    fd_step: f64,
}

impl<F> ClosureFunction<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    pub fn new(func: F, name: String) -> Self {
        Self {
            func,
            name,
            arity: None,
            fd_step: FD_STEP,
        }
    }
    /// declare the number of variables, so that the solver can check it
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }

    /// the step is checked by EquationSystem, a non-positive one is rejected there
    pub fn with_fd_step(mut self, fd_step: f64) -> Self {
        self.fd_step = fd_step;
        self
    }
}

impl<F> NonlinearFunction for ClosureFunction<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn evaluate(&self, x: &[f64]) -> f64 {
        (self.func)(x)
    }

    fn fd_step(&self) -> f64 {
        self.fd_step
    }

    fn arity(&self) -> Option<usize> {
        self.arity
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Box a vector of closures into the function set expected by EquationSystem;
/// every closure is tagged with its index and the common arity
pub fn boxed_functions<F>(closures: Vec<F>) -> Vec<Box<dyn NonlinearFunction>>
where
    F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
{
    let n = closures.len();
    closures
        .into_iter()
        .enumerate()
        .map(|(i, f)| {
            Box::new(ClosureFunction::new(f, format!("f{}", i)).with_arity(n))
                as Box<dyn NonlinearFunction>
        })
        .collect()
}
