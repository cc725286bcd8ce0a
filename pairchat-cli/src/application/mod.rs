mod simulation;

pub use simulation::{Scenario, SimulationReport, Simulator, StepReport};
