//! examples of usage of RustedEquilibria
/// Nonlinear equations examples: both drivers, the trigonometric system, line-search comparison
pub mod nonlinear_eqs_examples;
