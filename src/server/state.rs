use crate::jobs::JobRunner;
use crate::server::config::ServerConfig;
use std::sync::Arc;

/// Shared application state available to all Axum handlers via `State<AppState>`
///
/// Cheaply cloneable: the runner holds its pipeline, store and queue behind `Arc`s.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Sticker job runner (sync pipeline plus optional background queue)
    pub runner: JobRunner,
    /// Server configuration
    pub config: Arc<ServerConfig>,
}
