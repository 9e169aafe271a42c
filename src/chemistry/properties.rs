//! Thermodynamic and transport properties derived from the data bank:
//! Gibbs energy, diffusion coefficient in nitrogen and equilibrium constants.
use crate::chemistry::thermo_data::{ThermoData, ThermoDataError};
use strum_macros::{Display, EnumIter};

/// Pa
pub const ATMOSPHERIC_PRESSURE: f64 = 100000.0;
/// J/(mol K)
pub const R: f64 = 8.314;
/// carrier gas every diffusion coefficient refers to
pub const CARRIER: &str = "N2";

/// G = H - T (f1 + f2 ln x + f3 / x^2 + f4 / x + f5 x + f6 x^2 + f7 x^3), x = T / 10^4
pub fn gibbs_energy(data: &ThermoData, species: &str, T: f64) -> Result<f64, ThermoDataError> {
    let x = T / 10000.0;
    let f = |name: &str| data.get_f64(name, species);
    let phi = f("f1")?
        + f("f2")? * x.ln()
        + f("f3")? / (x * x)
        + f("f4")? / x
        + f("f5")? * x
        + f("f6")? * x * x
        + f("f7")? * x * x * x;
    Ok(f("H")? - T * phi)
}

/// Diffusion coefficient of a species in nitrogen (Chapman-Enskog with a power-law collision integral)
pub fn diffusion_coefficient(
    data: &ThermoData,
    species: &str,
    T: f64,
) -> Result<f64, ThermoDataError> {
    let sigma = (data.get_f64("sigma", species)? + data.get_f64("sigma", CARRIER)?) / 2.0;
    let eps = (data.get_f64("eps", species)? * data.get_f64("eps", CARRIER)?).sqrt();
    let omega = 1.074 * (T / eps).powf(-0.1604);
    let mu_i = data.get_f64("mu", species)?;
    let mu_n2 = data.get_f64("mu", CARRIER)?;
    let mu = 2.0 * mu_i * mu_n2 / (mu_i + mu_n2);
    Ok(0.02628 * T.powf(1.5) / (ATMOSPHERIC_PRESSURE * sigma * omega * mu.sqrt()))
}

/// Reactions of the chloride transport and nitride deposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum Reaction {
    K1,
    K2,
    K3,
    K4,
    K5,
    K6,
    K7,
    K8,
    K9,
    K10,
    K11,
    K12,
}

impl Reaction {
    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    pub fn equation(&self) -> &'static str {
        match self {
            Reaction::K1 => "2 HCl + 2 Al = 2 AlCl + H2",
            Reaction::K2 => "2 HCl + Al = AlCl2 + H2",
            Reaction::K3 => "6 HCl + 2 Al = 2 AlCl3 + 3 H2",
            Reaction::K4 => "2 HCl + 2 Ga = 2 GaCl + H2",
            Reaction::K5 => "2 HCl + Ga = GaCl2 + H2",
            Reaction::K6 => "6 HCl + 2 Ga = 2 GaCl3 + 3 H2",
            Reaction::K7 => "AlCl + NH3 = AlN + HCl + H2",
            Reaction::K8 => "2 AlCl + 2 NH3 = 2 AlN + 4 HCl + H2",
            Reaction::K9 => "AlCl3 + NH3 = AlN + 3 HCl",
            Reaction::K10 => "GaCl + NH3 = GaN + HCl + H2",
            Reaction::K11 => "2 GaCl + 2 NH3 = 2 GaN + 4 HCl + H2",
            Reaction::K12 => "GaCl3 + NH3 = GaN + 3 HCl",
        }
    }

    /// (coefficient, species) pairs of sum(reactants) - sum(products) in the Gibbs balance,
    /// and the power of the atmospheric pressure the constant is multiplied by
    fn balance(&self) -> (&'static [(f64, &'static str)], i32) {
        match self {
            Reaction::K1 => (
                &[(2.0, "HCl"), (2.0, "Al"), (-2.0, "AlCl"), (-1.0, "H2")],
                -1,
            ),
            Reaction::K2 => (&[(2.0, "HCl"), (1.0, "Al"), (-1.0, "AlCl2"), (-1.0, "H2")], 0),
            Reaction::K3 => (
                &[(6.0, "HCl"), (2.0, "Al"), (-2.0, "AlCl3"), (-3.0, "H2")],
                1,
            ),
            Reaction::K4 => (
                &[(2.0, "HCl"), (2.0, "Ga"), (-2.0, "GaCl"), (-1.0, "H2")],
                -1,
            ),
            Reaction::K5 => (&[(2.0, "HCl"), (1.0, "Ga"), (-1.0, "GaCl2"), (-1.0, "H2")], 0),
            Reaction::K6 => (
                &[(6.0, "HCl"), (2.0, "Ga"), (-2.0, "GaCl3"), (-3.0, "H2")],
                1,
            ),
            Reaction::K7 => (
                &[
                    (1.0, "AlCl"),
                    (1.0, "NH3"),
                    (-1.0, "AlN"),
                    (-1.0, "HCl"),
                    (-1.0, "H2"),
                ],
                0,
            ),
            Reaction::K8 => (
                &[
                    (2.0, "AlCl"),
                    (2.0, "NH3"),
                    (-2.0, "AlN"),
                    (-4.0, "HCl"),
                    (-1.0, "H2"),
                ],
                -1,
            ),
            Reaction::K9 => (
                &[(1.0, "AlCl3"), (1.0, "NH3"), (-1.0, "AlN"), (-3.0, "HCl")],
                -1,
            ),
            Reaction::K10 => (
                &[
                    (1.0, "GaCl"),
                    (1.0, "NH3"),
                    (-1.0, "GaN"),
                    (-1.0, "HCl"),
                    (-1.0, "H2"),
                ],
                0,
            ),
            Reaction::K11 => (
                &[
                    (2.0, "GaCl"),
                    (2.0, "NH3"),
                    (-2.0, "GaN"),
                    (-4.0, "HCl"),
                    (-1.0, "H2"),
                ],
                -1,
            ),
            Reaction::K12 => (
                &[(1.0, "GaCl3"), (1.0, "NH3"), (-1.0, "GaN"), (-3.0, "HCl")],
                -1,
            ),
        }
    }
}

/// K = exp(-dG / (R T)) * P^k, where dG is the Gibbs balance of the reaction
pub fn equilibrium_constant(
    data: &ThermoData,
    reaction: Reaction,
    T: f64,
) -> Result<f64, ThermoDataError> {
    let (terms, pressure_power) = reaction.balance();
    let mut dG = 0.0;
    for (coefficient, species) in terms {
        dG += coefficient * gibbs_energy(data, species, T)?;
    }
    Ok((-dG / (R * T)).exp() * ATMOSPHERIC_PRESSURE.powi(pressure_power))
}
