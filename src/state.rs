//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool (users and sessions), the drawing store behind
//! its trait seam, optional OAuth settings and the default auto-save policy.

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::auth::GitHubConfig;
use crate::services::autosave::AutosaveConfig;
use crate::services::drawing::{DrawingStore, PgDrawingStore};

/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub drawings: Arc<dyn DrawingStore>,
    /// `None` when GitHub OAuth env vars are missing; sign-in is then unavailable.
    pub github: Option<GitHubConfig>,
    pub autosave: AutosaveConfig,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, github: Option<GitHubConfig>, autosave: AutosaveConfig) -> Self {
        let drawings: Arc<dyn DrawingStore> = Arc::new(PgDrawingStore::new(pool.clone()));
        Self { pool, drawings, github, autosave }
    }

    #[must_use]
    pub fn with_drawing_store(mut self, store: Arc<dyn DrawingStore>) -> Self {
        self.drawings = store;
        self
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
