//! Client for the upstream WhatsApp-protocol provider's REST surface.

mod client;
mod types;

pub use client::{ProviderClient, ProviderError};
pub use types::*;
