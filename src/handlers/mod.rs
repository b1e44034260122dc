//! HTTP management surface: presents the Store, Rule Engine, Provider
//! Client, Orchestrator Client and Sync Coordinator to an operator UI.

pub mod ha;
pub mod health;
pub mod logs;
pub mod notify;
pub mod rules;
pub mod wa;

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::engine::Engine;
use crate::orchestrator::OrchestratorClient;
use crate::provider::ProviderClient;
use crate::store::DbPool;
use crate::sync::SyncCoordinator;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: DbPool,
    pub engine: Arc<Engine>,
    pub provider: Arc<ProviderClient>,
    pub orchestrator: Arc<OrchestratorClient>,
    pub sync: Arc<SyncCoordinator>,
    pub config: Arc<Config>,
}
