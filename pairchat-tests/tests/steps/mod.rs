mod common_steps;
mod matchmaking_steps;
mod negotiation_steps;
mod recovery_steps;
mod teardown_steps;
