//! Client for the downstream home-automation orchestrator's REST surface.

mod client;
mod types;

pub use client::{OrchestratorClient, OrchestratorError};
pub use types::*;
