pub mod config_file;
pub mod error;
pub mod observability;

pub use config_file::ConfigSource;
pub use error::{CliError, Result};
pub use observability::LogConfig;
