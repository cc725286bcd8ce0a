mod engine;
mod monitor;
mod negotiator;
mod queue;
mod resources;
#[cfg(feature = "native")]
pub mod runtime;

pub use engine::{EngineInput, EngineNotice, SessionEngine, UserIntent};
pub use monitor::{ConnectionMonitor, MonitorTimer, Verdict};
pub use negotiator::SessionNegotiator;
pub use queue::{CandidateBuffer, QueueError, SignalQueue};
pub use resources::{Attach, ResourceLifecycle};
