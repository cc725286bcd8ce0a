mod effects;
mod events;
mod matchmaker;

pub use effects::{ClosedSession, HangUpReason, MatchEffect, SessionEnd, Transition};
pub use events::MatchEvent;
pub use matchmaker::{MatchError, Matchmaker, Result};
