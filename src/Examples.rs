/// runnable demonstrations of parsing, rate laws and simulations
pub mod kinetics_examples;
