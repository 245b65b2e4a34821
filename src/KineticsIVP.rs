/// eng
/// Time integration of reaction kinetics (initial value problem) with scheduled events.
///
///  # Examples
/// ```
/// use KiMech::Kinetics::equation_parser::parse_mechanism;
/// use KiMech::Kinetics::reaction_step::RateConstants;
/// use KiMech::KineticsIVP::reaction_events::ReactionEvent;
/// use KiMech::KineticsIVP::simulator::simulate;
/// use std::collections::HashMap;
/// let mut mechanism = parse_mechanism("A -> B").unwrap();
/// mechanism.set_rate_constants(&[RateConstants::forward(1.0)]).unwrap();
/// let initial = HashMap::from([("A".to_string(), 1.0), ("B".to_string(), 0.0)]);
/// let events = vec![ReactionEvent::change_concentration(5.0, "A", 1.0)];
/// let result = simulate(&mechanism, &initial, 10.0, 11, &events).unwrap();
/// assert_eq!(result.len(), 11);
/// ```
pub mod simulator;
/// discrete events: concentration changes and rate constants reassignment
pub mod reaction_events;
/// settings of the adaptive ODE solver
pub mod solver_settings;
/// simulation output: concentrations at sample times
pub mod time_series;
