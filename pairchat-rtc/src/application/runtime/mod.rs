mod builder;
mod driver;

pub use builder::EngineRuntimeBuilder;
pub use driver::{EngineHandle, EngineRuntime};
