/// eng
/// Error types of the crate: parsing of equations, rate constants, states and simulations
pub mod kinetics_errors;
/// eng
/// Parser of reaction equations like `1/2A + 2B <--> C` and of mechanisms (one equation per line).
/// Arrows `->`, `=>`, `→` mark irreversible steps, `<-->`, `<->`, `<=>`, `⇌`, `=` mark reversible ones.
///
///  # Examples
/// ```
/// use KiMech::Kinetics::equation_parser::{parse_mechanism, parse_step};
/// let step = parse_step("1/2A+2B->C").unwrap();
/// assert_eq!(step.reactants()[0].coefficient, 0.5);
/// assert!(!step.is_reversible());
/// let mechanism = parse_mechanism("S + E <--> C\nC -> E + P").unwrap();
/// assert_eq!(mechanism.species(), &["S", "E", "C", "P"]);
/// ```
pub mod equation_parser;
/// eng
/// Elementary reaction step: stoichiometry, rate constants and the law of mass action,
/// numerically and as symbolic expressions
///
///  # Examples
/// ```
/// use KiMech::Kinetics::reaction_step::{RateConstants, Step};
/// use std::collections::HashMap;
/// let mut step: Step = "A+B->C".parse().unwrap();
/// step.set_rate_constants(RateConstants::forward(2.0));
/// let state = HashMap::from([("A".to_string(), 3.0), ("B".to_string(), 4.0), ("C".to_string(), 0.0)]);
/// let d = step.rate_of_change(&state).unwrap();
/// assert_eq!(d["C"], 24.0);
/// ```
pub mod reaction_step;
/// eng
/// Multistep mechanism: ordered steps over a shared species universe, summed rates of change,
/// symbolic ODE system and intermediates
pub mod mechanism;
/// eng
/// The rate model capability shared by steps and mechanisms and its compiled, index-based form
/// used by the ODE solver
pub mod rate_model;
