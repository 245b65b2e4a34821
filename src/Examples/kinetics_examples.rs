use crate::Kinetics::equation_parser::{parse_mechanism, parse_step};
use crate::Kinetics::rate_model::{RateModel, State, complete_state};
use crate::Kinetics::reaction_step::RateConstants;
use crate::KineticsIVP::reaction_events::ReactionEvent;
use crate::KineticsIVP::simulator::{KineticSimulator, simulate};
use crate::KineticsIVP::solver_settings::SolverSettings;
use crate::Utils::task_loader::SimulationTask;
use log::{error, info};

pub fn kin_examples(kintask: usize) {
    match kintask {
        0 => {
            // PARSING AND RATE LAW OF ONE STEP
            let mut step = match parse_step("1/2A + 2B <--> C") {
                Ok(step) => step,
                Err(e) => {
                    error!("{}", e);
                    return;
                }
            };
            step.set_rate_constants_from_equilibrium(4.0, 0.5);
            println!("step: {}", step);
            println!("species: {:?}", step.species());
            let state: State = [("A", 1.0), ("B", 0.5), ("C", 0.2)]
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect();
            match step.rate_of_change(&state) {
                Ok(d) => println!("rate of change at {:?}: {:?}", state, d),
                Err(e) => error!("{}", e),
            }
            for equation in ["A -- B", "A -> B -> C", "1/0A -> B", "A + B -> A"] {
                if let Err(e) = parse_step(equation) {
                    println!("'{}': {}", equation, e);
                }
            }
        }
        1 => {
            // SYMBOLIC ODE SYSTEM OF A MECHANISM
            let mut mechanism = match parse_mechanism("2NO + O2 -> 2NO2\nNO2 + O3 <--> NO3 + O2") {
                Ok(mechanism) => mechanism,
                Err(e) => {
                    error!("{}", e);
                    return;
                }
            };
            if let Err(e) = mechanism.set_rate_constants(&[
                RateConstants::forward(2.0e-3),
                RateConstants::reversible(0.1, 0.01),
            ]) {
                error!("{}", e);
                return;
            }
            println!("{}", mechanism);
            match mechanism.differential_equations() {
                Ok(equations) => {
                    for species in mechanism.species() {
                        println!("d[{}]/dt = {}", species, equations[species]);
                    }
                }
                Err(e) => error!("{}", e),
            }
        }
        2 => {
            // FIRST ORDER DECAY WITH AN INJECTION AT t = 5
            let mut step = match parse_step("A -> B") {
                Ok(step) => step,
                Err(e) => {
                    error!("{}", e);
                    return;
                }
            };
            step.set_rate_constants(RateConstants::forward(1.0));
            let initial = complete_state(&step.universe(), &State::from([("A".to_string(), 1.0)]));
            let events = vec![ReactionEvent::change_concentration(5.0, "A", 1.0)];
            match simulate(&step, &initial, 10.0, 11, &events) {
                Ok(result) => result.pretty_print(),
                Err(e) => error!("{}", e),
            }
        }
        3 => {
            // MICHAELIS-MENTEN MECHANISM FROM A TASK
            let task = SimulationTask::from_json(
                r#"{
                "problem_name": "enzyme",
                "mechanism": "S + E <--> C\nC -> E + P",
                "rate_constants": [{"kf": 1.0, "kr": 0.05}, {"kf": 0.2}],
                "initial_state": {"S": 2.0, "E": 1.0, "C": 0.0, "P": 0.0},
                "time_end": 1000.0,
                "number_of_points": 5000,
                "events": [{"time": 200.0, "kind": {"ChangeConcentration": {"species": "S", "delta": 1.0}}}]
            }"#,
            );
            let task = match task {
                Ok(task) => task,
                Err(e) => {
                    error!("{}", e);
                    return;
                }
            };
            task.pretty_print_task();
            match task.run() {
                Ok(result) => {
                    result.pretty_print();
                    info!("final state {:?}", result.last_state());
                }
                Err(e) => error!("{}", e),
            }
        }
        4 => {
            // APPROACH TO EQUILIBRIUM AND A SWITCH OF RATE CONSTANTS
            let mut step = match parse_step("A + B <=> C") {
                Ok(step) => step,
                Err(e) => {
                    error!("{}", e);
                    return;
                }
            };
            step.set_rate_constants(RateConstants::reversible(1.0, 0.5));
            let initial: State = [("A", 1.0), ("B", 2.0), ("C", 0.0)]
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect();
            let events = vec![ReactionEvent::set_rate_constants(
                25.0,
                0,
                RateConstants::reversible(1.0, 2.0),
            )];
            let simulator = KineticSimulator::with_settings(SolverSettings {
                rtol: 1e-10,
                atol: 1e-12,
                ..Default::default()
            });
            match simulator.simulate(&step, &initial, 50.0, 51, &events) {
                Ok(result) => {
                    result.pretty_print();
                    for row in [24, 50] {
                        if let Some(s) = result.state_at(row) {
                            println!(
                                "t = {}: C/(A*B) = {:.6}",
                                result.times()[row],
                                s["C"] / (s["A"] * s["B"])
                            );
                        }
                    }
                }
                Err(e) => error!("{}", e),
            }
        }
        _ => {
            println!("there is no example with number {}", kintask);
        }
    }
}
