//! # Rate model capability
//!
//! `RateModel` is the single capability the simulator needs: a species universe and the time
//! derivative of every species at a given state. It is implemented by `Step` and `Mechanism`
//! and dispatched statically through the `ReactionModel` enum.
//!
//! For time integration the model is compiled into a `KineticSystem`: species are mapped to
//! vector indices and every step keeps its (index, coefficient) lists and rate constants, so the
//! right hand side of the ODE works on nalgebra vectors without string lookups.
use crate::Kinetics::kinetics_errors::{ConfigurationError, StateError};
use crate::Kinetics::mechanism::Mechanism;
use crate::Kinetics::reaction_step::{RateConstants, Step, StoichTerm};
use enum_dispatch::enum_dispatch;
use log::warn;
use RustedSciThe::symbolic::symbolic_engine::Expr;
use nalgebra::DVector;
use std::collections::HashMap;

/// concentrations by species name
pub type State = HashMap<String, f64>;

#[enum_dispatch]
pub trait RateModel {
    /// species universe of the model, in a fixed order
    fn universe(&self) -> Vec<String>;
    /// time derivative of every species of the universe
    fn derivatives(&self, state: &State) -> Result<HashMap<String, f64>, ConfigurationError>;
    /// index-based form used by the ODE solver; fails if a rate constant is missing
    fn compile(&self) -> Result<KineticSystem, ConfigurationError>;
    /// number of elementary steps
    fn number_of_steps(&self) -> usize;
}

impl RateModel for Step {
    fn universe(&self) -> Vec<String> {
        self.species()
    }
    fn derivatives(&self, state: &State) -> Result<HashMap<String, f64>, ConfigurationError> {
        self.rate_of_change(state)
    }
    fn compile(&self) -> Result<KineticSystem, ConfigurationError> {
        KineticSystem::from_steps(self.species(), std::slice::from_ref(self))
    }
    fn number_of_steps(&self) -> usize {
        1
    }
}

impl RateModel for Mechanism {
    fn universe(&self) -> Vec<String> {
        self.species().to_vec()
    }
    fn derivatives(&self, state: &State) -> Result<HashMap<String, f64>, ConfigurationError> {
        self.rate_of_change(state)
    }
    fn compile(&self) -> Result<KineticSystem, ConfigurationError> {
        KineticSystem::from_steps(self.species().to_vec(), self.steps())
    }
    fn number_of_steps(&self) -> usize {
        self.steps().len()
    }
}

/// a single step or a whole mechanism
#[derive(Debug, Clone)]
#[enum_dispatch(RateModel)]
pub enum ReactionModel {
    Step(Step),
    Mechanism(Mechanism),
}

/// fills species of the universe absent from `partial` with zero concentration
pub fn complete_state(universe: &[String], partial: &State) -> State {
    let mut state = partial.clone();
    for species in universe {
        state.entry(species.clone()).or_insert(0.0);
    }
    state
}

#[derive(Debug, Clone)]
struct CompiledStep {
    reactants: Vec<(usize, f64)>,
    products: Vec<(usize, f64)>,
    kf: f64,
    /// Some only for reversible steps
    kr: Option<f64>,
    equation: String,
}

impl CompiledStep {
    fn net_rate(&self, y: &DVector<f64>) -> f64 {
        let forward = self.kf * mass_action(&self.reactants, y);
        match self.kr {
            Some(kr) => forward - kr * mass_action(&self.products, y),
            None => forward,
        }
    }
}

fn mass_action_expr(k: f64, terms: &[(usize, f64)], species: &[String]) -> Expr {
    terms.iter().fold(Expr::Const(k), |expr, (i, coefficient)| {
        expr * Expr::Pow(
            Box::new(Expr::Var(species[*i].clone())),
            Box::new(Expr::Const(*coefficient)),
        )
    })
}

fn mass_action(terms: &[(usize, f64)], y: &DVector<f64>) -> f64 {
    terms
        .iter()
        .map(|(i, coefficient)| y[*i].powf(*coefficient))
        .product()
}

/// mass-action ODE system over an indexed species vector
#[derive(Debug, Clone)]
pub struct KineticSystem {
    species: Vec<String>,
    steps: Vec<CompiledStep>,
}

impl KineticSystem {
    pub fn from_steps(species: Vec<String>, steps: &[Step]) -> Result<Self, ConfigurationError> {
        let index: HashMap<&str, usize> = species
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();
        let indexed = |terms: &[StoichTerm]| -> Vec<(usize, f64)> {
            terms
                .iter()
                .filter(|t| !t.is_condensed())
                .filter_map(|t| index.get(t.species.as_str()).map(|i| (*i, t.coefficient)))
                .collect()
        };
        let mut compiled = Vec::with_capacity(steps.len());
        for step in steps {
            let (kf, kr) = step.required_rate_constants()?;
            compiled.push(CompiledStep {
                reactants: indexed(step.reactants()),
                products: indexed(step.products()),
                kf,
                kr,
                equation: step.to_string(),
            });
        }
        Ok(Self {
            species,
            steps: compiled,
        })
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }
    pub fn index_of(&self, species: &str) -> Option<usize> {
        self.species.iter().position(|s| s == species)
    }
    pub fn number_of_steps(&self) -> usize {
        self.steps.len()
    }
    /// partial reassignment of the constants of one step
    pub fn set_rate_constants(
        &mut self,
        index: usize,
        constants: RateConstants,
    ) -> Result<(), ConfigurationError> {
        let steps = self.steps.len();
        let step = self
            .steps
            .get_mut(index)
            .ok_or(ConfigurationError::UnknownStep { index, steps })?;
        if let Some(kf) = constants.kf {
            step.kf = kf;
        }
        if let Some(kr) = constants.kr {
            match step.kr.as_mut() {
                Some(current) => *current = kr,
                None => warn!(
                    "reverse rate constant {} assigned to irreversible step '{}', it will be ignored",
                    kr, step.equation
                ),
            }
        }
        Ok(())
    }
    /// right hand side of the ODE system: dy = f(y)
    pub fn derivatives(&self, y: &DVector<f64>, dy: &mut DVector<f64>) {
        dy.fill(0.0);
        for step in &self.steps {
            let rate = step.net_rate(y);
            for (i, coefficient) in &step.reactants {
                dy[*i] -= coefficient * rate;
            }
            for (i, coefficient) in &step.products {
                dy[*i] += coefficient * rate;
            }
        }
    }
    /// symbolic right hand sides in species order, with the current rate constants
    pub fn differential_equations(&self) -> Vec<Expr> {
        let mut equations = vec![Expr::Const(0.0); self.species.len()];
        for step in &self.steps {
            let forward = mass_action_expr(step.kf, &step.reactants, &self.species);
            let rate = match step.kr {
                Some(kr) => forward - mass_action_expr(kr, &step.products, &self.species),
                None => forward,
            };
            for (i, coefficient) in &step.reactants {
                equations[*i] = equations[*i].clone() - Expr::Const(*coefficient) * rate.clone();
            }
            for (i, coefficient) in &step.products {
                equations[*i] = equations[*i].clone() + Expr::Const(*coefficient) * rate.clone();
            }
        }
        equations
    }
    /// orders a state as a vector; every species of the universe must be present and nothing else
    pub fn state_to_vector(&self, state: &State) -> Result<DVector<f64>, StateError> {
        if let Some(unknown) = state.keys().find(|k| self.index_of(k).is_none()) {
            return Err(StateError::UnknownSpecies(unknown.clone()));
        }
        let mut y = DVector::zeros(self.species.len());
        for (i, species) in self.species.iter().enumerate() {
            y[i] = *state
                .get(species)
                .ok_or_else(|| StateError::MissingSpecies(species.clone()))?;
        }
        Ok(y)
    }
    pub fn vector_to_state(&self, y: &DVector<f64>) -> State {
        self.species
            .iter()
            .zip(y.iter())
            .map(|(s, v)| (s.clone(), *v))
            .collect()
    }
}
