//! Chemical-equilibrium front end of the nonlinear solver: hydride vapour-phase epitaxy
//! of Al, Ga and AlGaN from their chlorides.
/// physical-property data bank (Gibbs energy coefficients, transport data, densities)
pub mod thermo_data;
/// Gibbs energy, diffusion coefficients and equilibrium constants K1..K12
pub mod properties;
/// equilibrium systems at the interface, range-checked solving, fluxes and growth rates
pub mod equilibrium;
/// temperature and composition sweeps, result tables
pub mod process;
