//! # Simulation task files
//!
//! A task file is a JSON document describing a complete simulation:
//! ```json
//! {
//!   "problem_name": "enzyme",
//!   "mechanism": "S + E <--> C\nC -> E + P",
//!   "rate_constants": [{"kf": 1.0, "kr": 0.05}, {"kf": 0.2}],
//!   "initial_state": {"S": 2.0, "E": 1.0, "C": 0.0, "P": 0.0},
//!   "time_end": 1000.0,
//!   "number_of_points": 5000,
//!   "events": [{"time": 200.0, "kind": {"ChangeConcentration": {"species": "S", "delta": 1.0}}}],
//!   "solver": {"method": "Auto", "rtol": 1e-8},
//!   "hide_intermediates": false
//! }
//! ```
//! `problem_name`, `rate_constants`, `events`, `solver` and `hide_intermediates` may be omitted.
//! JSON syntax errors are logged with the offending line and a pointer to the column.
use crate::Kinetics::equation_parser::parse_mechanism;
use crate::Kinetics::kinetics_errors::{ConfigurationError, ParseError, SimulationError};
use crate::Kinetics::mechanism::Mechanism;
use crate::Kinetics::rate_model::State;
use crate::Kinetics::reaction_step::RateConstants;
use crate::KineticsIVP::reaction_events::ReactionEvent;
use crate::KineticsIVP::simulator::KineticSimulator;
use crate::KineticsIVP::solver_settings::SolverSettings;
use crate::KineticsIVP::time_series::TimeSeries;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("cannot read task file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid task JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationTask {
    #[serde(default)]
    pub problem_name: Option<String>,
    /// reaction equations, one per line
    pub mechanism: String,
    /// constants of the steps in mechanism order
    #[serde(default)]
    pub rate_constants: Vec<RateConstants>,
    pub initial_state: State,
    pub time_end: f64,
    pub number_of_points: usize,
    #[serde(default)]
    pub events: Vec<ReactionEvent>,
    #[serde(default)]
    pub solver: SolverSettings,
    /// drop intermediates from the returned time series
    #[serde(default)]
    pub hide_intermediates: bool,
}

/// logs the line of `text` where serde_json stopped and a pointer to the column
fn log_json_error(text: &str, e: &serde_json::Error) {
    error!(
        "error parsing task at line {}, column {}: {}",
        e.line(),
        e.column(),
        e
    );
    if let Some(problem_line) = e.line().checked_sub(1).and_then(|i| text.lines().nth(i)) {
        error!("Problematic line: {}", problem_line);
        if e.column() >= 1 && e.column() <= problem_line.len() {
            error!("{}", " ".repeat(e.column() - 1) + "^");
        }
    }
}

impl SimulationTask {
    pub fn from_json(text: &str) -> Result<Self, TaskError> {
        serde_json::from_str(text).map_err(|e| {
            log_json_error(text, &e);
            TaskError::Json(e)
        })
    }
    pub fn from_file(path: &Path) -> Result<Self, TaskError> {
        let text = fs::read_to_string(path)?;
        let task = Self::from_json(&text)?;
        info!("task loaded from '{}'", path.display());
        Ok(task)
    }
    pub fn save_to_file(&self, path: &Path) -> Result<(), TaskError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
    /// parses the equations and assigns the rate constants
    pub fn build_mechanism(&self) -> Result<Mechanism, TaskError> {
        let mut mechanism = parse_mechanism(&self.mechanism)?;
        mechanism.set_rate_constants(&self.rate_constants)?;
        Ok(mechanism)
    }
    pub fn run(&self) -> Result<TimeSeries, TaskError> {
        let mechanism = self.build_mechanism()?;
        let simulator = KineticSimulator::with_settings(self.solver);
        let result = simulator.simulate(
            &mechanism,
            &self.initial_state,
            self.time_end,
            self.number_of_points,
            &self.events,
        )?;
        if self.hide_intermediates {
            return Ok(result.without_species(&mechanism.intermediates()));
        }
        Ok(result)
    }
    pub fn pretty_print_task(&self) {
        use prettytable::{Table, row};
        println!("\n=== SIMULATION TASK ===");
        println!("Problem Name: {:?}", self.problem_name);
        let mut table = Table::new();
        table.add_row(row!["Step", "Equation", "kf", "kr"]);
        let show = |k: Option<f64>| k.map_or("-".to_string(), |k| format!("{:.3e}", k));
        match self.build_mechanism() {
            Ok(mechanism) => {
                for (i, step) in mechanism.steps().iter().enumerate() {
                    table.add_row(row![i, step, show(step.kf()), show(step.kr())]);
                }
            }
            Err(e) => {
                error!("mechanism of the task is invalid: {}", e);
                table.add_row(row!["-", self.mechanism, "-", "-"]);
            }
        }
        table.printstd();
        let mut table = Table::new();
        table.add_row(row!["Species", "Initial concentration"]);
        let mut species: Vec<(&String, &f64)> = self.initial_state.iter().collect();
        species.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in species {
            table.add_row(row![name, format!("{:.4e}", value)]);
        }
        table.printstd();
        println!(
            "time_end = {}, points = {}, events = {}, method = {:?}, rtol = {}, atol = {}",
            self.time_end,
            self.number_of_points,
            self.events.len(),
            self.solver.method,
            self.solver.rtol,
            self.solver.atol
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KineticsIVP::reaction_events::EventKind;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ENZYME_TASK: &str = r#"{
        "problem_name": "enzyme",
        "mechanism": "S + E <--> C\nC -> E + P",
        "rate_constants": [{"kf": 1.0, "kr": 0.05}, {"kf": 0.2}],
        "initial_state": {"S": 2.0, "E": 1.0, "C": 0.0, "P": 0.0},
        "time_end": 100.0,
        "number_of_points": 101,
        "events": [{"time": 50.0, "kind": {"ChangeConcentration": {"species": "S", "delta": 1.0}}}],
        "solver": {"rtol": 1e-8},
        "hide_intermediates": true
    }"#;

    #[test]
    fn test_load_task_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(ENZYME_TASK.as_bytes()).unwrap();
        let task = SimulationTask::from_file(file.path()).unwrap();
        assert_eq!(task.problem_name.as_deref(), Some("enzyme"));
        assert_eq!(task.rate_constants[1], RateConstants::forward(0.2));
        assert_eq!(task.solver.atol, SolverSettings::default().atol);
        assert!(matches!(
            task.events[0].kind,
            EventKind::ChangeConcentration { delta, .. } if delta == 1.0
        ));
        task.pretty_print_task();
    }

    #[test]
    fn test_optional_fields() {
        let task = SimulationTask::from_json(
            r#"{"mechanism": "A -> B", "rate_constants": [{"kf": 1.0}],
                "initial_state": {"A": 1.0, "B": 0.0}, "time_end": 1.0, "number_of_points": 3}"#,
        )
        .unwrap();
        assert!(task.events.is_empty());
        assert!(!task.hide_intermediates);
        assert_eq!(task.solver, SolverSettings::default());
        let result = task.run().unwrap();
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_run_hides_intermediates() {
        let mut task = SimulationTask::from_json(ENZYME_TASK).unwrap();
        let result = task.run().unwrap();
        assert_eq!(result.species(), &["S", "P"]);
        assert_eq!(result.len(), 101);

        task.hide_intermediates = false;
        let result = task.run().unwrap();
        assert_eq!(result.species(), &["S", "E", "C", "P"]);
        for i in (0..101).step_by(10) {
            let s = result.state_at(i).unwrap();
            let substrate = if i < 50 { 2.0 } else { 3.0 };
            assert_relative_eq!(s["S"] + s["C"] + s["P"], substrate, epsilon = 1e-6);
            assert_relative_eq!(s["E"] + s["C"], 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_pretty_print_uses_normalised_steps() {
        let mut task = SimulationTask::from_json(ENZYME_TASK).unwrap();
        task.mechanism = "# enzyme\nS+E<=>C\n\nC -> E + P".to_string();
        assert_eq!(
            task.build_mechanism().unwrap().steps()[0].to_string(),
            "S + E <--> C"
        );
        task.pretty_print_task();
        task.mechanism = "S + E <=> C\nC -- E + P".to_string();
        task.pretty_print_task();
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let task = SimulationTask::from_json(ENZYME_TASK).unwrap();
        let file = NamedTempFile::new().unwrap();
        task.save_to_file(file.path()).unwrap();
        assert_eq!(SimulationTask::from_file(file.path()).unwrap(), task);
    }

    #[test]
    fn test_task_errors() {
        assert!(matches!(
            SimulationTask::from_json("{\"mechanism\": \"A -> B\",\n \"time_end\": }"),
            Err(TaskError::Json(_))
        ));
        assert!(matches!(
            SimulationTask::from_file(Path::new("no_such_task_file.json")),
            Err(TaskError::Io(_))
        ));
        let mut task = SimulationTask::from_json(ENZYME_TASK).unwrap();
        task.mechanism = "S + E <--> C\nC -- E + P".to_string();
        assert!(matches!(
            task.run(),
            Err(TaskError::Parse(ParseError::AtLine { line: 2, .. }))
        ));
        let mut task = SimulationTask::from_json(ENZYME_TASK).unwrap();
        task.rate_constants.push(RateConstants::forward(1.0));
        assert!(matches!(
            task.run(),
            Err(TaskError::Configuration(
                ConfigurationError::TooManyRateConstants { .. }
            ))
        ));
        let mut task = SimulationTask::from_json(ENZYME_TASK).unwrap();
        task.initial_state.remove("C");
        assert!(matches!(task.run(), Err(TaskError::Simulation(SimulationError::State(_)))));
    }
}
