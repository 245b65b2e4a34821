//! Discrete events scheduled during a simulation: instantaneous changes of concentrations and
//! reassignment of rate constants of a step.
use crate::Kinetics::kinetics_errors::{ConfigurationError, SimulationError, StateError};
use crate::Kinetics::rate_model::KineticSystem;
use crate::Kinetics::reaction_step::RateConstants;
use log::info;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// adds delta to the concentration (delta may be negative)
    ChangeConcentration { species: String, delta: f64 },
    /// overwrites the concentration
    SetConcentration { species: String, value: f64 },
    /// partial reassignment of the rate constants of the step with the given index
    SetRateConstants {
        step: usize,
        constants: RateConstants,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub time: f64,
    pub kind: EventKind,
}

impl ReactionEvent {
    pub fn change_concentration(time: f64, species: &str, delta: f64) -> Self {
        Self {
            time,
            kind: EventKind::ChangeConcentration {
                species: species.to_string(),
                delta,
            },
        }
    }
    pub fn set_concentration(time: f64, species: &str, value: f64) -> Self {
        Self {
            time,
            kind: EventKind::SetConcentration {
                species: species.to_string(),
                value,
            },
        }
    }
    pub fn set_rate_constants(time: f64, step: usize, constants: RateConstants) -> Self {
        Self {
            time,
            kind: EventKind::SetRateConstants { step, constants },
        }
    }

    /// checks time, payload and references against the compiled system before integration starts
    pub fn validate(&self, system: &KineticSystem, time_end: f64) -> Result<(), SimulationError> {
        if !self.time.is_finite() || self.time < 0.0 || self.time > time_end {
            return Err(SimulationError::InvalidParameters(format!(
                "event time {} is outside [0, {}]",
                self.time, time_end
            )));
        }
        match &self.kind {
            EventKind::ChangeConcentration { species, delta: amount }
            | EventKind::SetConcentration {
                species,
                value: amount,
            } => {
                if system.index_of(species).is_none() {
                    return Err(StateError::UnknownSpecies(species.clone()).into());
                }
                if !amount.is_finite() {
                    return Err(SimulationError::InvalidParameters(format!(
                        "event at t = {} carries non-finite amount {}",
                        self.time, amount
                    )));
                }
            }
            EventKind::SetRateConstants { step, constants } => {
                if *step >= system.number_of_steps() {
                    return Err(ConfigurationError::UnknownStep {
                        index: *step,
                        steps: system.number_of_steps(),
                    }
                    .into());
                }
                let finite = constants.kf.is_none_or(f64::is_finite)
                    && constants.kr.is_none_or(f64::is_finite);
                if !finite {
                    return Err(SimulationError::InvalidParameters(format!(
                        "event at t = {} carries non-finite rate constants",
                        self.time
                    )));
                }
            }
        }
        Ok(())
    }

    /// applies the event to the integration state and the private copy of the rate model
    pub fn apply(
        &self,
        system: &mut KineticSystem,
        y: &mut DVector<f64>,
    ) -> Result<(), SimulationError> {
        match &self.kind {
            EventKind::ChangeConcentration { species, delta } => {
                let i = system
                    .index_of(species)
                    .ok_or_else(|| StateError::UnknownSpecies(species.clone()))?;
                y[i] += delta;
            }
            EventKind::SetConcentration { species, value } => {
                let i = system
                    .index_of(species)
                    .ok_or_else(|| StateError::UnknownSpecies(species.clone()))?;
                y[i] = *value;
            }
            EventKind::SetRateConstants { step, constants } => {
                system.set_rate_constants(*step, *constants)?;
            }
        }
        info!("event at t = {} applied: {:?}", self.time, self.kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kinetics::equation_parser::parse_mechanism;
    use crate::Kinetics::rate_model::RateModel;

    fn system() -> KineticSystem {
        let mut mechanism = parse_mechanism("A -> B\nB <--> C").unwrap();
        mechanism
            .set_rate_constants(&[RateConstants::forward(1.0), RateConstants::reversible(1.0, 1.0)])
            .unwrap();
        mechanism.compile().unwrap()
    }

    #[test]
    fn test_apply_concentration_events() {
        let mut system = system();
        let mut y = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        ReactionEvent::change_concentration(1.0, "B", -0.5)
            .apply(&mut system, &mut y)
            .unwrap();
        ReactionEvent::set_concentration(1.0, "C", 0.25)
            .apply(&mut system, &mut y)
            .unwrap();
        assert_eq!(y.as_slice(), &[1.0, 1.5, 0.25]);
    }

    #[test]
    fn test_validation() {
        let system = system();
        assert!(ReactionEvent::change_concentration(10.0, "A", 1.0)
            .validate(&system, 10.0)
            .is_ok());
        assert!(matches!(
            ReactionEvent::change_concentration(10.5, "A", 1.0).validate(&system, 10.0),
            Err(SimulationError::InvalidParameters(_))
        ));
        assert!(matches!(
            ReactionEvent::change_concentration(-1.0, "A", 1.0).validate(&system, 10.0),
            Err(SimulationError::InvalidParameters(_))
        ));
        assert!(matches!(
            ReactionEvent::set_concentration(1.0, "X", 1.0).validate(&system, 10.0),
            Err(SimulationError::State(StateError::UnknownSpecies(_)))
        ));
        assert!(matches!(
            ReactionEvent::set_rate_constants(1.0, 2, RateConstants::forward(1.0))
                .validate(&system, 10.0),
            Err(SimulationError::Configuration(ConfigurationError::UnknownStep {
                index: 2,
                steps: 2
            }))
        ));
    }

    #[test]
    fn test_event_json_format() {
        let json = r#"[
            {"time": 200.0, "kind": {"ChangeConcentration": {"species": "S", "delta": 1.0}}},
            {"time": 300.0, "kind": {"SetRateConstants": {"step": 1, "constants": {"kf": 0.5}}}}
        ]"#;
        let events: Vec<ReactionEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(events[0], ReactionEvent::change_concentration(200.0, "S", 1.0));
        assert_eq!(
            events[1],
            ReactionEvent::set_rate_constants(300.0, 1, RateConstants::forward(0.5))
        );
    }
}
