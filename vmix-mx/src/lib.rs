//! vmix-mx library interface
//!
//! Exposes the mix pipeline and the HTTP router for the binary and for
//! integration testing.

pub mod api;
pub mod error;
pub mod mix;

pub use crate::error::{ApiError, ApiResult, MixError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::mix::MixService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Mix pipeline (fetcher, engine, scratch directory)
    pub mixer: Arc<MixService>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last mix failure, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(mixer: MixService) -> Self {
        Self {
            mixer: Arc::new(mixer),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::mix_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
