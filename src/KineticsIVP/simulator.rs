//! # Event-driven kinetic simulator
//!
//! ## Purpose
//! Integrates the mass-action ODE system of a `Step` or `Mechanism` from t = 0 to `time_end`
//! and records the concentrations at `number_of_points` evenly spaced sample times, applying
//! scheduled discrete events on the way.
//!
//! ## Algorithm
//! 1. validation of everything before any integration: time and point parameters, solver
//!    settings, rate constants (model compilation), initial state, events
//! 2. events are stable-sorted by time
//! 3. the breakpoint timeline is the union of sample times and event times; an event closer
//!    than `1e-9 * time_end` to a sample time (or to another event) shares its breakpoint
//! 4. between consecutive breakpoints the system is integrated, restarting at every breakpoint,
//!    with the adaptive Dormand-Prince 5(4) method (`ode_solvers::Dopri5`) or with the implicit
//!    BDF/Radau solvers of RustedSciThe working on the symbolic right hand side. In the default
//!    `Auto` mode a Dormand-Prince failure (stiffness, step budget) switches the rest of the run
//!    to BDF
//! 5. at a breakpoint the events are applied in order, then the sample (if any) is recorded,
//!    so a sample that coincides with an event shows the post-event state
//!
//! ## Non-obvious features
//! - the caller's model is never mutated: it is compiled into a private `KineticSystem` per run
//!   and `SetRateConstants` events change only that copy
//! - concentrations are never clamped, negative values produced by the solver are kept
//! - on solver failure the rows recorded so far are returned inside the error
use crate::Kinetics::kinetics_errors::SimulationError;
use crate::Kinetics::rate_model::{KineticSystem, RateModel, State};
use crate::KineticsIVP::reaction_events::ReactionEvent;
use crate::KineticsIVP::solver_settings::{IntegrationMethod, SolverSettings};
use crate::KineticsIVP::time_series::TimeSeries;
use RustedSciThe::numerical::ODE_api2::{SolverParam, SolverType, UniversalODESolver};
use RustedSciThe::numerical::Radau::Radau_main::RadauOrder;
use log::{debug, info, warn};
use nalgebra::DVector;
use ode_solvers::dop_shared::OutputType;
use ode_solvers::{Dopri5, System};
use std::collections::HashMap;
use std::time::Instant;

/// relative distance under which an event time is considered equal to a breakpoint time
const COINCIDENCE_TOLERANCE: f64 = 1e-9;

/// right hand side handed to the ODE solver
struct KineticOde<'a> {
    system: &'a KineticSystem,
}

impl System<f64, DVector<f64>> for KineticOde<'_> {
    fn system(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        self.system.derivatives(y, dy);
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Breakpoint {
    time: f64,
    is_sample: bool,
    /// indices into the sorted events
    events: Vec<usize>,
}

/// sample times 0..=time_end and event times merged into one increasing timeline
fn build_timeline(time_end: f64, number_of_points: usize, events: &[ReactionEvent]) -> Vec<Breakpoint> {
    let last = (number_of_points - 1) as f64;
    let mut timeline: Vec<Breakpoint> = (0..number_of_points)
        .map(|i| Breakpoint {
            time: if i == number_of_points - 1 {
                time_end
            } else {
                time_end * i as f64 / last
            },
            is_sample: true,
            events: Vec::new(),
        })
        .collect();
    let tolerance = COINCIDENCE_TOLERANCE * time_end;
    for (k, event) in events.iter().enumerate() {
        // nearest sample first, then breakpoints created by earlier events
        let nearest = ((event.time / time_end) * last).round() as usize;
        let nearest = nearest.min(number_of_points - 1);
        if (timeline[nearest].time - event.time).abs() <= tolerance {
            timeline[nearest].events.push(k);
            continue;
        }
        match timeline[number_of_points..]
            .iter_mut()
            .find(|bp| (bp.time - event.time).abs() <= tolerance)
        {
            Some(bp) => bp.events.push(k),
            None => timeline.push(Breakpoint {
                time: event.time,
                is_sample: false,
                events: vec![k],
            }),
        }
    }
    timeline.sort_by(|a, b| a.time.total_cmp(&b.time));
    timeline
}

/// integrates rate models with scheduled events
#[derive(Debug, Clone, Default)]
pub struct KineticSimulator {
    pub settings: SolverSettings,
}

impl KineticSimulator {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_settings(settings: SolverSettings) -> Self {
        Self { settings }
    }

    fn validate_parameters(&self, time_end: f64, number_of_points: usize) -> Result<(), SimulationError> {
        if !(time_end.is_finite() && time_end > 0.0) {
            return Err(SimulationError::InvalidParameters(format!(
                "time_end must be positive and finite, got {}",
                time_end
            )));
        }
        if number_of_points < 2 {
            return Err(SimulationError::InvalidParameters(format!(
                "at least 2 sample points are required, got {}",
                number_of_points
            )));
        }
        self.settings
            .validate()
            .map_err(SimulationError::InvalidParameters)
    }

    /// integrates one segment [t_start, t_end] and returns the state at t_end; `stiff` is set
    /// once `Auto` has fallen back to BDF and stays set for the rest of the run
    fn integrate_segment(
        &self,
        system: &KineticSystem,
        t_start: f64,
        t_end: f64,
        y: DVector<f64>,
        stiff: &mut bool,
    ) -> Result<DVector<f64>, String> {
        match self.settings.method {
            IntegrationMethod::Dopri5 => self.explicit_segment(system, t_start, t_end, y),
            IntegrationMethod::Bdf => self.implicit_segment(system, t_start, t_end, y, SolverType::BDF),
            IntegrationMethod::Radau => self.implicit_segment(
                system,
                t_start,
                t_end,
                y,
                SolverType::Radau(RadauOrder::Order7),
            ),
            IntegrationMethod::Auto if *stiff => {
                self.implicit_segment(system, t_start, t_end, y, SolverType::BDF)
            }
            IntegrationMethod::Auto => {
                match self.explicit_segment(system, t_start, t_end, y.clone()) {
                    Ok(y) => Ok(y),
                    Err(reason) => {
                        warn!(
                            "Dormand-Prince failed on [{}, {}]: {}; switching to BDF",
                            t_start, t_end, reason
                        );
                        *stiff = true;
                        self.implicit_segment(system, t_start, t_end, y, SolverType::BDF)
                            .map_err(|e| format!("{}; BDF: {}", reason, e))
                    }
                }
            }
        }
    }

    fn explicit_segment(
        &self,
        system: &KineticSystem,
        t_start: f64,
        t_end: f64,
        y: DVector<f64>,
    ) -> Result<DVector<f64>, String> {
        let span = t_end - t_start;
        let mut stepper = Dopri5::from_param(
            KineticOde { system },
            t_start,
            t_end,
            span,
            y,
            self.settings.rtol,
            self.settings.atol,
            0.9,
            0.04,
            0.2,
            10.0,
            span,
            self.settings.initial_step,
            self.settings.max_steps,
            self.settings.stiffness_test_interval,
            OutputType::Sparse,
        );
        let stats = stepper.integrate().map_err(|e| format!("{}", e))?;
        debug!(
            "segment [{}, {}]: {} accepted, {} rejected steps, {} evaluations",
            t_start, t_end, stats.accepted_steps, stats.rejected_steps, stats.num_eval
        );
        stepper
            .y_out()
            .last()
            .cloned()
            .ok_or_else(|| "solver produced no output".to_string())
    }

    /// implicit integration of the symbolic system with the current rate constants
    fn implicit_segment(
        &self,
        system: &KineticSystem,
        t_start: f64,
        t_end: f64,
        y: DVector<f64>,
        solver_type: SolverType,
    ) -> Result<DVector<f64>, String> {
        let span = t_end - t_start;
        let n = y.len();
        let species = system.species().to_vec();
        // argument name must not shadow a species
        let mut arg = "t".to_string();
        while species.contains(&arg) {
            arg.push('_');
        }
        let first_step = (self.settings.initial_step > 0.0).then_some(self.settings.initial_step);
        let params = HashMap::from([
            ("step_size".to_owned(), SolverParam::Float(span / 100.0)),
            ("tolerance".to_owned(), SolverParam::Float(self.settings.rtol)),
            ("max_iterations".to_owned(), SolverParam::Int(self.settings.max_steps as _)),
            ("rtol".to_owned(), SolverParam::Float(self.settings.rtol)),
            ("atol".to_owned(), SolverParam::Float(self.settings.atol)),
            ("max_step".to_owned(), SolverParam::Float(span)),
            ("first_step".to_owned(), SolverParam::OptionalFloat(first_step)),
            ("vectorized".to_owned(), SolverParam::Bool(false)),
            ("jac_sparsity".to_owned(), SolverParam::OptionalMatrix(None)),
            ("parallel".to_owned(), SolverParam::Bool(false)),
        ]);
        let mut ode = UniversalODESolver::new(
            system.differential_equations(),
            species,
            arg,
            solver_type,
            t_start,
            y,
            t_end,
        );
        ode.set_parameters(params);
        ode.initialize();
        ode.solve();
        let (t, solution) = ode.get_result();
        let t = t.ok_or_else(|| "implicit solver produced no time grid".to_string())?;
        let solution = solution.ok_or_else(|| "implicit solver produced no solution".to_string())?;
        let reached = t
            .iter()
            .copied()
            .last()
            .ok_or_else(|| "implicit solver produced no output".to_string())?;
        if t_end - reached > COINCIDENCE_TOLERANCE * t_end.abs().max(span) {
            return Err(format!("implicit solver stopped at t = {}", reached));
        }
        // one row per time point, or one column per time point
        let last: Vec<f64> = if solution.nrows() == t.len() && solution.ncols() == n {
            solution.row(t.len() - 1).iter().copied().collect()
        } else if solution.ncols() == t.len() && solution.nrows() == n {
            solution.column(t.len() - 1).iter().copied().collect()
        } else {
            return Err(format!(
                "implicit solver returned a {}x{} solution for {} species and {} time points",
                solution.nrows(),
                solution.ncols(),
                n,
                t.len()
            ));
        };
        if let Some(value) = last.iter().find(|v| !v.is_finite()) {
            return Err(format!("implicit solver produced a non-finite value {}", value));
        }
        debug!(
            "segment [{}, {}]: {} implicit steps",
            t_start,
            t_end,
            t.len()
        );
        Ok(DVector::from_vec(last))
    }

    /// simulates the model from `initial_state` at t = 0 to `time_end`
    pub fn simulate<M: RateModel>(
        &self,
        model: &M,
        initial_state: &State,
        time_end: f64,
        number_of_points: usize,
        events: &[ReactionEvent],
    ) -> Result<TimeSeries, SimulationError> {
        let now = Instant::now();
        /////////////////////////////////VALIDATION///////////////////////////////////////////
        self.validate_parameters(time_end, number_of_points)?;
        let mut system = model.compile()?;
        let mut y = system.state_to_vector(initial_state)?;
        if let Some((species, value)) = initial_state.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SimulationError::InvalidParameters(format!(
                "initial concentration of '{}' is not finite: {}",
                species, value
            )));
        }
        for event in events {
            event.validate(&system, time_end)?;
        }
        let mut sorted_events = events.to_vec();
        sorted_events.sort_by(|a, b| a.time.total_cmp(&b.time));
        let timeline = build_timeline(time_end, number_of_points, &sorted_events);
        info!(
            "simulation of {} species, {} steps: t in [0, {}], {} points, {} events",
            system.species().len(),
            system.number_of_steps(),
            time_end,
            number_of_points,
            sorted_events.len()
        );
        /////////////////////////////////INTEGRATION///////////////////////////////////////////
        let species = system.species().to_vec();
        let mut times: Vec<f64> = Vec::with_capacity(number_of_points);
        let mut rows: Vec<DVector<f64>> = Vec::with_capacity(number_of_points);
        let mut t = 0.0;
        let mut stiff = false;
        for breakpoint in &timeline {
            if breakpoint.time > t {
                y = match self.integrate_segment(&system, t, breakpoint.time, y, &mut stiff) {
                    Ok(y) => y,
                    Err(reason) => {
                        return Err(SimulationError::SolverFailure {
                            t_start: t,
                            t_end: breakpoint.time,
                            reason,
                            partial: Box::new(TimeSeries::new(species, times, &rows)),
                        });
                    }
                };
                t = breakpoint.time;
            }
            for &k in &breakpoint.events {
                sorted_events[k].apply(&mut system, &mut y)?;
            }
            if breakpoint.is_sample {
                times.push(breakpoint.time);
                rows.push(y.clone());
            }
        }
        info!(
            "simulation finished in {} ms",
            now.elapsed().as_millis()
        );
        Ok(TimeSeries::new(species, times, &rows))
    }
}

/// simulation with default solver settings
pub fn simulate<M: RateModel>(
    model: &M,
    initial_state: &State,
    time_end: f64,
    number_of_points: usize,
    events: &[ReactionEvent],
) -> Result<TimeSeries, SimulationError> {
    KineticSimulator::new().simulate(model, initial_state, time_end, number_of_points, events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_snaps_events_to_samples() {
        let events = vec![
            ReactionEvent::change_concentration(5.0 + 1e-12, "A", 1.0),
            ReactionEvent::change_concentration(5.5, "A", 1.0),
            ReactionEvent::change_concentration(5.5, "B", 1.0),
            ReactionEvent::change_concentration(10.0, "A", 1.0),
        ];
        let timeline = build_timeline(10.0, 11, &events);
        assert_eq!(timeline.len(), 12);
        assert_eq!(timeline[5].time, 5.0);
        assert_eq!(timeline[5].events, vec![0]);
        assert_eq!(timeline[6].time, 5.5);
        assert!(!timeline[6].is_sample);
        assert_eq!(timeline[6].events, vec![1, 2]);
        assert_eq!(timeline[11].time, 10.0);
        assert_eq!(timeline[11].events, vec![3]);
        assert!(timeline.windows(2).all(|w| w[0].time < w[1].time));
    }
}
