//! # Reaction mechanism
//!
//! A `Mechanism` is an ordered list of elementary steps sharing one species universe. Its rate of
//! change is the sum of the per-step mass-action contributions:
//! ```text
//! d[X]/dt = Σ_j ν_Xj * (W_f,j - W_r,j)
//! ```
//! where ν_Xj is negative for reactants and positive for products. The universe is the union of
//! the species of all steps in order of first appearance and is fixed at construction.
//!
//! Rate constants are assigned step-wise; the mechanism also exposes the symbolic ODE system as
//! RustedSciThe expressions and detects intermediates (species whose net stoichiometric
//! coefficient over the whole mechanism is zero).
use crate::Kinetics::kinetics_errors::{ConfigurationError, ParseError};
use crate::Kinetics::rate_model::State;
use crate::Kinetics::reaction_step::{RateConstants, Step};
use RustedSciThe::symbolic::symbolic_engine::Expr;
use log::info;
use std::collections::HashMap;
use std::fmt;

/// species with net stoichiometric coefficient below this are intermediates
const INTERMEDIATE_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct Mechanism {
    steps: Vec<Step>,
    species: Vec<String>,
}

impl Mechanism {
    /// builds the mechanism and its species universe; fails on an empty list of steps
    pub fn new(steps: Vec<Step>) -> Result<Self, ParseError> {
        if steps.is_empty() {
            return Err(ParseError::EmptyMechanism);
        }
        let mut species: Vec<String> = Vec::new();
        for step in &steps {
            for name in step.species() {
                if !species.contains(&name) {
                    species.push(name);
                }
            }
        }
        info!(
            "mechanism of {} steps with species {:?}",
            steps.len(),
            species
        );
        Ok(Self { steps, species })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
    /// species universe in order of first appearance
    pub fn species(&self) -> &[String] {
        &self.species
    }
    /////////////////////////////////RATE CONSTANTS///////////////////////////////////////////
    /// applies constants to steps in order; a shorter list leaves the remaining steps untouched
    pub fn set_rate_constants(
        &mut self,
        constants: &[RateConstants],
    ) -> Result<(), ConfigurationError> {
        if constants.len() > self.steps.len() {
            return Err(ConfigurationError::TooManyRateConstants {
                given: constants.len(),
                steps: self.steps.len(),
            });
        }
        for (step, constants) in self.steps.iter_mut().zip(constants) {
            step.set_rate_constants(*constants);
        }
        Ok(())
    }
    /// assigns constants of a single step by its index
    pub fn set_step_rate_constants(
        &mut self,
        index: usize,
        constants: RateConstants,
    ) -> Result<(), ConfigurationError> {
        let steps = self.steps.len();
        let step = self
            .steps
            .get_mut(index)
            .ok_or(ConfigurationError::UnknownStep { index, steps })?;
        step.set_rate_constants(constants);
        Ok(())
    }
    /////////////////////////////////RATE LAW///////////////////////////////////////////
    /// net time derivative of every species of the universe
    pub fn rate_of_change(&self, state: &State) -> Result<HashMap<String, f64>, ConfigurationError> {
        let mut derivatives: HashMap<String, f64> =
            self.species.iter().map(|s| (s.clone(), 0.0)).collect();
        for step in &self.steps {
            for (species, contribution) in step.rate_of_change(state)? {
                *derivatives.entry(species).or_insert(0.0) += contribution;
            }
        }
        Ok(derivatives)
    }
    /// symbolic ODE system: right hand side of d[X]/dt for every species of the universe
    pub fn differential_equations(&self) -> Result<HashMap<String, Expr>, ConfigurationError> {
        let mut equations: HashMap<String, Expr> = HashMap::new();
        for step in &self.steps {
            for (species, expr) in step.differential_equations()? {
                let summed = match equations.remove(&species) {
                    Some(previous) => previous + expr,
                    None => expr,
                };
                equations.insert(species, summed);
            }
        }
        Ok(equations)
    }
    /// species consumed and produced in equal net amounts over the whole mechanism
    pub fn intermediates(&self) -> Vec<String> {
        let mut net: HashMap<&str, f64> = HashMap::new();
        for step in &self.steps {
            for term in step.reactants().iter().filter(|t| !t.is_condensed()) {
                *net.entry(term.species.as_str()).or_insert(0.0) += term.coefficient;
            }
            for term in step.products().iter().filter(|t| !t.is_condensed()) {
                *net.entry(term.species.as_str()).or_insert(0.0) -= term.coefficient;
            }
        }
        self.species
            .iter()
            .filter(|s| {
                net.get(s.as_str())
                    .is_some_and(|coefficient| coefficient.abs() < INTERMEDIATE_TOLERANCE)
            })
            .cloned()
            .collect()
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", lines.join("\n"))
    }
}
