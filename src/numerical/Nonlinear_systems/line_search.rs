//! One-dimensional minimizers for the step length along a Newton direction.
//! The objective is the residual restricted to the line x + t*d, so it is cheap
//! to evaluate but may have several local minima.
use crate::numerical::Nonlinear_systems::function::{FD_STEP, forward_difference};
use crate::numerical::Nonlinear_systems::solver_error::NonlinearSolverError;
use log::{debug, trace};

pub const SEARCH_SEGMENT_DIVISION: usize = 10;
pub const SEARCH_ITERATIONS: usize = 10;
pub const GRADIENT_DESCENT_START: f64 = 1.0;
pub const GRADIENT_DESCENT_STEP: f64 = 0.5;
pub const GRADIENT_DESCENT_PRECISION: f64 = 1e-6;
/// bound on the doublings of the bracket endpoint, 2^60 is far beyond any useful step
pub const MAX_BRACKET_DOUBLINGS: usize = 60;

/// Enum to represent the line search strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineSearchMethod {
    /// descent along the sign of the one-sided derivative with step halving
    GradientDescent { initial_step: f64, precision: f64 },
    /// segment division plus ternary narrowing inside every segment
    SuperSearch { segments: usize, iterations: usize },
}

impl Default for LineSearchMethod {
    fn default() -> Self {
        LineSearchMethod::GradientDescent {
            initial_step: GRADIENT_DESCENT_STEP,
            precision: GRADIENT_DESCENT_PRECISION,
        }
    }
}

impl LineSearchMethod {
    pub fn super_search() -> Self {
        LineSearchMethod::SuperSearch {
            segments: SEARCH_SEGMENT_DIVISION,
            iterations: SEARCH_ITERATIONS,
        }
    }

    /// parse "gradient_descent" / "super_search" (case and separators ignored)
    pub fn from_name(name: &str) -> Result<Self, NonlinearSolverError> {
        let key: String = name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "gradientdescent" | "gd" => Ok(LineSearchMethod::default()),
            "supersearch" | "ternary" => Ok(LineSearchMethod::super_search()),
            _ => Err(NonlinearSolverError::InvalidParameter(format!(
                "unknown line search method '{}'",
                name
            ))),
        }
    }

    pub fn validate(&self) -> Result<(), NonlinearSolverError> {
        match *self {
            LineSearchMethod::GradientDescent {
                initial_step,
                precision,
            } => {
                if !(precision > 0.0) || !(initial_step > precision) {
                    return Err(NonlinearSolverError::InvalidParameter(format!(
                        "gradient descent needs initial_step > precision > 0, got {} and {}",
                        initial_step, precision
                    )));
                }
            }
            LineSearchMethod::SuperSearch { segments, .. } => {
                if segments == 0 {
                    return Err(NonlinearSolverError::InvalidParameter(
                        "super search needs at least one segment".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Rough minimum of g on [left, right].
/// The interval is split into m segments; both ends of every segment are evaluated, then
/// n ternary rounds move toward the lower third. The best argument seen is returned,
/// starting from t = 1 which is the full Newton step.
pub fn super_search<G>(g: G, left: f64, right: f64, m: usize, n: usize) -> f64
where
    G: Fn(f64) -> f64,
{
    let mut answer = 1.0;
    let mut min = g(answer);
    let mut consider = |t: f64, value: f64| {
        if value < min {
            min = value;
            answer = t;
        }
    };
    let width = (right - left) / m as f64;
    for i in 0..m {
        let mut l = left + i as f64 * width;
        let mut r = left + (i + 1) as f64 * width;
        consider(l, g(l));
        consider(r, g(r));
        for _ in 0..n {
            let p = (2.0 * l + r) / 3.0;
            let fp = g(p);
            consider(p, fp);
            let q = (l + 2.0 * r) / 3.0;
            let fq = g(q);
            consider(q, fq);
            if fp < fq {
                r = q;
            } else {
                l = p;
            }
        }
    }
    answer
}

/// Rough minimum of g by descent from t0.
/// At every accepted point the one-sided derivative picks the direction; a move that
/// lowers g is accepted, otherwise the step is halved, until it is not above precision.
pub fn gradient_descent<G>(g: G, t0: f64, initial_step: f64, precision: f64) -> f64
where
    G: Fn(f64) -> f64,
{
    let mut t = t0;
    let mut min = g(t);
    let mut derivative = forward_difference(&g, t, FD_STEP);
    let mut step = initial_step;
    while step > precision {
        let t1 = if derivative < 0.0 { t + step } else { t - step };
        let cur = g(t1);
        if cur < min {
            min = cur;
            t = t1;
            derivative = forward_difference(&g, t, FD_STEP);
        } else {
            step /= 2.0;
        }
    }
    trace!("gradient descent: t = {}, g(t) = {}", t, min);
    t
}

/// result of the bracketing phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    /// last trial endpoint, the search region is [0, right]
    pub right: f64,
    /// argument of the lowest value seen
    pub floor_arg: f64,
    /// lowest value seen, never above g(0)
    pub floor: f64,
}

/// Double a trial endpoint r, starting at 1, while g(r) does not rise above the running
/// minimum of g(0), g(1), g(2), ...
pub fn bracket<G>(g: G, max_doublings: usize) -> Bracket
where
    G: Fn(f64) -> f64,
{
    let mut floor = g(0.0);
    let mut floor_arg = 0.0;
    let g1 = g(1.0);
    if g1 < floor {
        floor = g1;
        floor_arg = 1.0;
    }
    let mut r = 1.0;
    for _ in 0..max_doublings {
        r *= 2.0;
        let dr = g(r);
        if dr <= floor {
            floor = dr;
            floor_arg = r;
        } else {
            break;
        }
    }
    Bracket {
        right: r,
        floor_arg,
        floor,
    }
}

/// Step length along a direction: bracket first, then refine with the chosen strategy.
/// The result never has a higher value than the bracket floor, hence g(result) <= g(0).
pub fn local_minimum<G>(g: G, method: &LineSearchMethod, max_doublings: usize) -> f64
where
    G: Fn(f64) -> f64,
{
    let bounds = bracket(&g, max_doublings);
    let t = match *method {
        LineSearchMethod::SuperSearch {
            segments,
            iterations,
        } => super_search(&g, 0.0, bounds.right, segments, iterations),
        LineSearchMethod::GradientDescent {
            initial_step,
            precision,
        } => gradient_descent(&g, GRADIENT_DESCENT_START, initial_step, precision),
    };
    let gt = g(t);
    if gt <= bounds.floor {
        debug!("line search: t = {}, g(t) = {}", t, gt);
        t
    } else {
        debug!(
            "line search: t = {} is worse than the bracket floor, using t = {}",
            t, bounds.floor_arg
        );
        bounds.floor_arg
    }
}
