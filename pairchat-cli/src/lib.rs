pub mod application;
pub mod infrastructure;

pub use application::{Scenario, SimulationReport, Simulator};
pub use infrastructure::{CliError, ConfigSource, LogConfig, Result};
