//! Assembly of the equilibrium problems at the gas/solid interface.
//!
//! The unknowns are the equilibrium partial pressures Pe at the interface (and, for the
//! AlGaN solid solution, the fraction x of AlN). Mass-action laws tie Pe together through
//! the equilibrium constants; the flux balances tie Pe to the input pressures Pg through
//! the diffusion coefficients. Every coefficient is looked up when the problem is built,
//! so the closures only capture plain numbers.
use crate::chemistry::properties::{
    ATMOSPHERIC_PRESSURE, Reaction, diffusion_coefficient, equilibrium_constant,
};
use crate::chemistry::thermo_data::{ThermoData, ThermoDataError};
use crate::numerical::Nonlinear_systems::equation_system::{
    EquationSystem, Method, SolveReport, SolveStatus, SolverConfig,
};
use crate::numerical::Nonlinear_systems::function::{ClosureFunction, NonlinearFunction};
use crate::numerical::Nonlinear_systems::solver_error::NonlinearSolverError;
use log::{debug, info, warn};
use nalgebra::DVector;
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use strum_macros::{Display, EnumIter};

/// solutions with a pressure outside [-ALLOWED_DISCREPANCY, P_atm + ALLOWED_DISCREPANCY] are rejected
pub const ALLOWED_DISCREPANCY: f64 = 1000.0;
/// universal gas constant in J/(kmol K), as used in the flux formula
pub const FLUX_GAS_CONSTANT: f64 = 8314.0;
/// thickness of the diffusion boundary layer, m
pub const BOUNDARY_LAYER: f64 = 0.01;
/// converts the growth rate from m/s to nm/s
const NANO: f64 = 1e9;

#[derive(Debug, Clone, PartialEq)]
pub enum EquilibriumError {
    Data(ThermoDataError),
    Solver(NonlinearSolverError),
    MissingPressure(String),
    /// no attempt produced a solution inside the physical range
    RangeNotReached { attempts: usize },
    InvalidParameter(String),
}

impl fmt::Display for EquilibriumError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EquilibriumError::Data(e) => write!(f, "Data bank error: {}", e),
            EquilibriumError::Solver(e) => write!(f, "Solver error: {}", e),
            EquilibriumError::MissingPressure(s) => {
                write!(f, "No input pressure given for {}", s)
            }
            EquilibriumError::RangeNotReached { attempts } => write!(
                f,
                "No solution inside the physical range after {} attempts",
                attempts
            ),
            EquilibriumError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for EquilibriumError {}

impl From<ThermoDataError> for EquilibriumError {
    fn from(e: ThermoDataError) -> Self {
        EquilibriumError::Data(e)
    }
}

impl From<NonlinearSolverError> for EquilibriumError {
    fn from(e: NonlinearSolverError) -> Self {
        EquilibriumError::Solver(e)
    }
}

/// Input partial pressures Pg, Pa, keyed case-insensitively by species
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pressures {
    values: HashMap<String, f64>,
}

impl Pressures {
    pub fn new() -> Self {
        Self::default()
    }

    /// HCl diluted in nitrogen, no chlorides and no hydrogen
    pub fn chloride_defaults() -> Self {
        let mut p = Self::new();
        for (species, value) in [
            ("HCl", 10000.0),
            ("N2", 90000.0),
            ("AlCl", 0.0),
            ("AlCl2", 0.0),
            ("AlCl3", 0.0),
            ("GaCl", 0.0),
            ("GaCl2", 0.0),
            ("GaCl3", 0.0),
            ("H2", 0.0),
        ] {
            p.set(species, value);
        }
        p
    }

    pub fn set(&mut self, species: &str, value: f64) {
        self.values.insert(species.to_uppercase(), value);
    }

    pub fn with(mut self, species: &str, value: f64) -> Self {
        self.set(species, value);
        self
    }

    pub fn get(&self, species: &str) -> Result<f64, EquilibriumError> {
        self.values
            .get(&species.to_uppercase())
            .copied()
            .ok_or_else(|| EquilibriumError::MissingPressure(species.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum Metal {
    Al,
    Ga,
}

impl Metal {
    /// gaseous unknowns of the chloride system, in solver order
    pub fn species(&self) -> [&'static str; 5] {
        match self {
            Metal::Al => ["HCl", "AlCl", "AlCl2", "AlCl3", "H2"],
            Metal::Ga => ["HCl", "GaCl", "GaCl2", "GaCl3", "H2"],
        }
    }

    /// mono-, di- and trichloride formation
    pub fn reactions(&self) -> [Reaction; 3] {
        match self {
            Metal::Al => [Reaction::K1, Reaction::K2, Reaction::K3],
            Metal::Ga => [Reaction::K4, Reaction::K5, Reaction::K6],
        }
    }
}

/// Algebraic equilibrium problem ready to be solved
pub struct EquilibriumProblem {
    pub name: String,
    pub T: f64,
    /// gaseous unknowns, in solver order
    pub species: Vec<String>,
    /// input pressures Pg of the gaseous unknowns
    pub input: Vec<f64>,
    pub diffusion: Vec<f64>,
    /// (index of a flux, molar mass / density of the solid it deposits)
    growth_terms: Vec<(usize, f64)>,
    pub growth_label: String,
    /// the last unknown is the AlN fraction of the solid solution
    has_fraction: bool,
    system: EquationSystem,
}

fn equation<F>(name: &str, n: usize, f: F) -> Box<dyn NonlinearFunction>
where
    F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
{
    Box::new(ClosureFunction::new(f, name.to_string()).with_arity(n))
}

fn lookup(
    data: &ThermoData,
    pressures: &Pressures,
    species: &[&str],
    T: f64,
) -> Result<(Vec<f64>, Vec<f64>), EquilibriumError> {
    let mut p = Vec::with_capacity(species.len());
    let mut d = Vec::with_capacity(species.len());
    for s in species {
        p.push(pressures.get(s)?);
        d.push(diffusion_coefficient(data, s, T)?);
    }
    Ok((p, d))
}

/// molar mass over density of a condensed phase
fn molar_volume(data: &ThermoData, species: &str) -> Result<f64, ThermoDataError> {
    Ok(data.get_f64("mu", species)? / data.get_f64("density", species)?)
}

/// Etching of a metal by HCl: unknowns Pe(HCl, MCl, MCl2, MCl3, H2)
pub fn chloride_system(
    metal: Metal,
    data: &ThermoData,
    pressures: &Pressures,
    T: f64,
) -> Result<EquilibriumProblem, EquilibriumError> {
    let species = metal.species();
    let [r1, r2, r3] = metal.reactions();
    let k1 = equilibrium_constant(data, r1, T)?;
    let k2 = equilibrium_constant(data, r2, T)?;
    let k3 = equilibrium_constant(data, r3, T)?;
    debug!("{}Clx at T = {}: {} = {:e}, {} = {:e}, {} = {:e}", metal, T, r1, k1, r2, k2, r3, k3);
    let (p, d) = lookup(data, pressures, &species, T)?;
    let (p, d): ([f64; 5], [f64; 5]) = (to_array(&p), to_array(&d));
    let n = 5;
    let functions = vec![
        // Pe(HCl)^2 = K * Pe(MCl)^2 * Pe(H2)
        equation(r1.equation(), n, move |x| x[0] * x[0] - k1 * x[1] * x[1] * x[4]),
        // Pe(HCl)^2 = K * Pe(MCl2) * Pe(H2)
        equation(r2.equation(), n, move |x| x[0] * x[0] - k2 * x[2] * x[4]),
        // Pe(HCl)^6 = K * Pe(MCl3)^2 * Pe(H2)^3
        equation(r3.equation(), n, move |x| {
            x[0].powi(6) - k3 * x[3] * x[3] * x[4] * x[4] * x[4]
        }),
        equation("hydrogen flux balance", n, move |x| {
            d[0] * (p[0] - x[0]) + 2.0 * d[4] * (p[4] - x[4])
        }),
        equation("chlorine flux balance", n, move |x| {
            d[0] * (p[0] - x[0])
                + d[1] * (p[1] - x[1])
                + 2.0 * d[2] * (p[2] - x[2])
                + 3.0 * d[3] * (p[3] - x[3])
        }),
    ];
    let metal_volume = molar_volume(data, &metal.to_string())?;
    Ok(EquilibriumProblem {
        name: format!("{}Clx", metal),
        T,
        species: species.iter().map(|s| s.to_string()).collect(),
        input: p.to_vec(),
        diffusion: d.to_vec(),
        growth_terms: vec![(1, metal_volume), (2, metal_volume), (3, metal_volume)],
        growth_label: format!("Ve({})", metal),
        has_fraction: false,
        system: EquationSystem::new(functions)?,
    })
}

/// Deposition of the Al(x)Ga(1-x)N solid solution: unknowns Pe(HCl, GaCl, NH3, AlCl3, H2) and x
pub fn algan_system(
    data: &ThermoData,
    pressures: &Pressures,
    T: f64,
) -> Result<EquilibriumProblem, EquilibriumError> {
    let species = ["HCl", "GaCl", "NH3", "AlCl3", "H2"];
    let k9 = equilibrium_constant(data, Reaction::K9, T)?;
    let k10 = equilibrium_constant(data, Reaction::K10, T)?;
    debug!("AlGaN at T = {}: K9 = {:e}, K10 = {:e}", T, k9, k10);
    let (p, d) = lookup(data, pressures, &species, T)?;
    let (p, d): ([f64; 5], [f64; 5]) = (to_array(&p), to_array(&d));
    let n = 6;
    let functions = vec![
        // Pe(AlCl3) Pe(NH3) = K9 x Pe(HCl)^3
        equation(Reaction::K9.equation(), n, move |x| {
            x[3] * x[2] - k9 * x[5] * x[0] * x[0] * x[0]
        }),
        // Pe(GaCl) Pe(NH3) = K10 (1 - x) Pe(HCl) Pe(H2)
        equation(Reaction::K10.equation(), n, move |x| {
            x[1] * x[2] - k10 * (1.0 - x[5]) * x[0] * x[4]
        }),
        equation("hydrogen flux balance", n, move |x| {
            d[0] * (p[0] - x[0]) + 2.0 * d[4] * (p[4] - x[4]) + 3.0 * d[2] * (p[2] - x[2])
        }),
        equation("chlorine flux balance", n, move |x| {
            3.0 * d[3] * (p[3] - x[3]) + d[1] * (p[1] - x[1]) + d[0] * (p[0] - x[0])
        }),
        // metal and nitrogen arrive at the same rate
        equation("metal/nitrogen flux balance", n, move |x| {
            d[3] * (p[3] - x[3]) + d[1] * (p[1] - x[1]) - d[2] * (p[2] - x[2])
        }),
        equation("solid fraction", n, move |x| {
            d[3] * (p[3] - x[3]) - x[5] * (d[1] * (p[1] - x[1]) + d[3] * (p[3] - x[3]))
        }),
    ];
    Ok(EquilibriumProblem {
        name: "AlGaN".to_string(),
        T,
        species: species.iter().map(|s| s.to_string()).collect(),
        input: p.to_vec(),
        diffusion: d.to_vec(),
        growth_terms: vec![
            (3, molar_volume(data, "AlN")?),
            (1, molar_volume(data, "GaN")?),
        ],
        growth_label: "Vg(AlGaN)".to_string(),
        has_fraction: true,
        system: EquationSystem::new(functions)?,
    })
}

fn to_array(v: &[f64]) -> [f64; 5] {
    let mut a = [0.0; 5];
    a.copy_from_slice(&v[..5]);
    a
}

/// How each attempt of a range-checked solve is run
#[derive(Debug, Clone, PartialEq)]
pub struct SolveSettings {
    pub method: Method,
    pub tolerance: f64,
    pub max_iterations: usize,
    /// number of random starts before giving up
    pub max_attempts: usize,
}

impl Default for SolveSettings {
    fn default() -> Self {
        Self {
            method: Method::Universal,
            tolerance: 1e-12,
            max_iterations: 10000,
            max_attempts: 100,
        }
    }
}

/// Solve from fresh random starts until `range_check` accepts the result.
/// Returns the accepted report and the number of attempts it took.
pub fn solve_in_range<R, C>(
    system: &EquationSystem,
    settings: &SolveSettings,
    range_check: C,
    rng: &mut R,
) -> Result<(SolveReport, usize), EquilibriumError>
where
    R: Rng + ?Sized,
    C: Fn(&DVector<f64>) -> bool,
{
    if settings.max_attempts == 0 {
        return Err(EquilibriumError::InvalidParameter(
            "max_attempts must be at least 1".to_string(),
        ));
    }
    for attempt in 1..=settings.max_attempts {
        let report = match system.solve(
            settings.method,
            settings.tolerance,
            settings.max_iterations,
            rng,
        ) {
            Ok(report) => report,
            Err(e) if e.is_restartable() => {
                warn!("attempt {}: {}", attempt, e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if range_check(&report.x) {
            debug!("solution accepted at attempt {}", attempt);
            return Ok((report, attempt));
        }
        debug!(
            "attempt {}: solution outside the physical range ({})",
            attempt, report.status
        );
    }
    warn!(
        "no solution inside the physical range after {} attempts",
        settings.max_attempts
    );
    Err(EquilibriumError::RangeNotReached {
        attempts: settings.max_attempts,
    })
}

/// Post-processed solution of an equilibrium problem
#[derive(Debug, Clone, PartialEq)]
pub struct EquilibriumSolution {
    pub name: String,
    pub T: f64,
    pub species: Vec<String>,
    /// Pe, Pa
    pub equilibrium: Vec<f64>,
    pub fraction: Option<f64>,
    /// G, mol/(m^2 s)
    pub fluxes: Vec<f64>,
    pub growth_label: String,
    /// nm/s
    pub growth_rate: f64,
    pub status: SolveStatus,
    pub residual: f64,
    pub attempts: usize,
}

impl EquilibriumSolution {
    /// named values in output order: T, Pe(..), x, G(..), growth rate
    pub fn records(&self) -> Vec<(String, f64)> {
        let mut records = vec![("T".to_string(), self.T)];
        for (s, v) in self.species.iter().zip(&self.equilibrium) {
            records.push((format!("Pe({})", s), *v));
        }
        if let Some(x) = self.fraction {
            records.push(("x".to_string(), x));
        }
        for (s, g) in self.species.iter().zip(&self.fluxes) {
            records.push((format!("G({})", s), *g));
        }
        records.push((self.growth_label.clone(), self.growth_rate));
        records
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.records()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }
}

impl EquilibriumProblem {
    pub fn system(&self) -> &EquationSystem {
        &self.system
    }

    pub fn set_solver_config(&mut self, config: SolverConfig) -> Result<(), EquilibriumError> {
        self.system.set_config(config)?;
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.system.dimension()
    }

    /// pressures within the allowed band around [0, P_atm], fraction within [0, 1]
    pub fn in_range(&self, x: &DVector<f64>) -> bool {
        let pressures_ok = x
            .iter()
            .take(self.species.len())
            .all(|p| *p >= -ALLOWED_DISCREPANCY && *p <= ATMOSPHERIC_PRESSURE + ALLOWED_DISCREPANCY);
        let fraction_ok = !self.has_fraction
            || x
                .get(self.species.len())
                .is_some_and(|f| (0.0..=1.0).contains(f));
        pressures_ok && fraction_ok
    }

    /// G_i = D_i (Pg_i - Pe_i) / (R T delta)
    pub fn fluxes(&self, x: &DVector<f64>, delta: f64) -> Vec<f64> {
        self.input
            .iter()
            .zip(&self.diffusion)
            .zip(x.iter())
            .map(|((p, d), pe)| d * (p - pe) / (FLUX_GAS_CONSTANT * self.T * delta))
            .collect()
    }

    /// growth (positive) or etching rate of the solid, nm/s
    pub fn growth_rate(&self, fluxes: &[f64]) -> f64 {
        self.growth_terms
            .iter()
            .map(|(i, volume)| fluxes[*i] * volume)
            .sum::<f64>()
            * NANO
    }

    pub fn solution(&self, report: &SolveReport, attempts: usize, delta: f64) -> EquilibriumSolution {
        let n = self.species.len();
        let fluxes = self.fluxes(&report.x, delta);
        EquilibriumSolution {
            name: self.name.clone(),
            T: self.T,
            species: self.species.clone(),
            equilibrium: report.x.iter().take(n).copied().collect(),
            fraction: if self.has_fraction {
                report.x.get(n).copied()
            } else {
                None
            },
            growth_rate: self.growth_rate(&fluxes),
            fluxes,
            growth_label: self.growth_label.clone(),
            status: report.status,
            residual: report.residual,
            attempts,
        }
    }

    /// Range-checked solve followed by the flux and growth-rate post-processing
    pub fn solve<R: Rng + ?Sized>(
        &self,
        settings: &SolveSettings,
        delta: f64,
        rng: &mut R,
    ) -> Result<EquilibriumSolution, EquilibriumError> {
        if !(delta > 0.0) {
            return Err(EquilibriumError::InvalidParameter(format!(
                "boundary layer thickness must be positive, got {}",
                delta
            )));
        }
        let (report, attempts) = solve_in_range(&self.system, settings, |x| self.in_range(x), rng)?;
        let solution = self.solution(&report, attempts, delta);
        info!(
            "{} at T = {}: {} = {:e}, status {}, {} attempts",
            self.name, self.T, solution.growth_label, solution.growth_rate, solution.status, attempts
        );
        Ok(solution)
    }
}

impl fmt::Debug for EquilibriumProblem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EquilibriumProblem")
            .field("name", &self.name)
            .field("T", &self.T)
            .field("species", &self.species)
            .field("input", &self.input)
            .finish()
    }
}
