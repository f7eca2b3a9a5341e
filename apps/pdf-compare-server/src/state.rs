//! Application state management

use std::sync::Arc;

use crate::compare::ComparisonOrchestrator;
use crate::config::Config;
use crate::diff::PixelDiffEngine;
use crate::narrative::{NarrativeService, OpenAiComparator, TextComparator};
use crate::raster::{MupdfRasterizer, PageRasterizer};
use crate::session::SessionManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pub config: Config,
    pub sessions: SessionManager,
    pub orchestrator: ComparisonOrchestrator,
}

impl AppState {
    /// Create the production state: MuPDF rasterizer and, when enabled, the
    /// chat-completions narrative
    pub fn new(config: Config) -> Self {
        let rasterizer = Arc::new(MupdfRasterizer::new(
            config.raster.scale,
            config.raster.timeout_secs,
        ));

        let comparator: Option<Arc<dyn TextComparator>> = if config.narrative.enabled {
            Some(Arc::new(OpenAiComparator::new(
                &config.narrative.api_url,
                config.narrative.api_key.clone(),
                &config.narrative.model,
                config.narrative.timeout_secs,
            )))
        } else {
            None
        };

        Self::with_components(config, rasterizer, comparator)
    }

    /// Create a state around explicit rasterizer and comparator implementations
    pub fn with_components(
        config: Config,
        rasterizer: Arc<dyn PageRasterizer>,
        comparator: Option<Arc<dyn TextComparator>>,
    ) -> Self {
        let sessions = SessionManager::with_expiry_hours(config.session.expiry_hours);

        let mut orchestrator = ComparisonOrchestrator::new(
            rasterizer,
            PixelDiffEngine::new(config.diff),
            sessions.clone(),
            config.compare.max_concurrent_pages,
        );
        if let Some(comparator) = comparator {
            orchestrator = orchestrator
                .with_narrative(NarrativeService::new(comparator, config.narrative.chunk_size));
        }

        Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                orchestrator,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the session manager
    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    /// Get the comparison orchestrator
    pub fn orchestrator(&self) -> &ComparisonOrchestrator {
        &self.inner.orchestrator
    }
}
