//! # Error types of the kinetics core
//!
//! Every failure of the crate is one of the enums below:
//! - `ParseError`: malformed reaction text (bad arrow, bad coefficient, degenerate step, empty side)
//! - `ConfigurationError`: missing rate constants at evaluation time, wrong rate-constant assignment
//! - `StateError`: state that does not match the species universe
//! - `SimulationError`: invalid time/point parameters, solver non-convergence, or one of the above
//!   raised while a simulation was being prepared
//!
//! Parsing and configuration errors are returned at the call that triggers them. Negative
//! concentrations produced by integration are NOT errors.
use crate::KineticsIVP::time_series::TimeSeries;
use thiserror::Error;

/// errors of the reaction equation parser
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("no reaction arrow found in '{0}'")]
    MissingArrow(String),
    #[error("more than one reaction arrow in '{0}'")]
    MultipleArrows(String),
    #[error("{side} side of '{equation}' is empty")]
    EmptySide { side: &'static str, equation: String },
    #[error("term '{0}' cannot be split into coefficient and species")]
    InvalidTerm(String),
    #[error("zero denominator in coefficient of term '{0}'")]
    ZeroDenominator(String),
    #[error("zero coefficient in term '{0}'")]
    ZeroCoefficient(String),
    #[error("species '{0}' is both a reactant and a product of the same step")]
    DegenerateStep(String),
    #[error("mechanism contains no reaction steps")]
    EmptyMechanism,
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<ParseError>,
    },
}

/// errors of rate constants assignment and evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("forward rate constant kf is not set for step '{0}'")]
    MissingForwardConstant(String),
    #[error("reverse rate constant kr is not set for reversible step '{0}'")]
    MissingReverseConstant(String),
    #[error("{given} sets of rate constants given for a mechanism of {steps} steps")]
    TooManyRateConstants { given: usize, steps: usize },
    #[error("step index {index} is out of range, model has {steps} steps")]
    UnknownStep { index: usize, steps: usize },
}

/// errors of concentration states
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("state has no concentration for species '{0}'")]
    MissingSpecies(String),
    #[error("species '{0}' does not take part in the reaction")]
    UnknownSpecies(String),
}

/// errors of the simulation (time integration with events)
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("invalid simulation parameters: {0}")]
    InvalidParameters(String),
    /// the solver gave up on the segment [t_start, t_end]; rows recorded before it are kept
    #[error("ODE solver failed on segment [{t_start}, {t_end}]: {reason}")]
    SolverFailure {
        t_start: f64,
        t_end: f64,
        reason: String,
        partial: Box<TimeSeries>,
    },
}

impl SimulationError {
    /// rows recorded before the failing segment, if the error came from the solver
    pub fn partial_result(&self) -> Option<&TimeSeries> {
        match self {
            SimulationError::SolverFailure { partial, .. } => Some(partial.as_ref()),
            _ => None,
        }
    }
}
