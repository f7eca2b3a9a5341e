//! Comparison Session Manager
//!
//! Owns every comparison session. Background jobs write through the
//! generation-guarded methods, so results of a reset or removed session are
//! dropped instead of leaking into the next comparison.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::compare::DiffArtifact;
use crate::narrative::ChangeNarrative;
use crate::raster::RenderedDocument;

use super::types::{
    ComparisonSession, SessionError, SessionStatus, VisualizationMode, SESSION_EXPIRY_HOURS,
};

// ============================================================================
// Session Manager
// ============================================================================

/// Manages comparison sessions
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    /// Sessions indexed by ID
    sessions: RwLock<HashMap<Uuid, ComparisonSession>>,

    /// Lifetime of a new session
    expiry_hours: i64,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new() -> Self {
        Self::with_expiry_hours(SESSION_EXPIRY_HOURS)
    }

    /// Create a new session manager with a custom session lifetime
    pub fn with_expiry_hours(expiry_hours: i64) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                sessions: RwLock::new(HashMap::new()),
                expiry_hours,
            }),
        }
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Create an idle session
    pub async fn create_session(&self) -> ComparisonSession {
        let session = ComparisonSession::new(self.inner.expiry_hours);

        {
            let mut sessions = self.inner.sessions.write().await;
            sessions.insert(session.id, session.clone());
        }

        tracing::info!(session_id = %session.id, "Created comparison session");

        session
    }

    /// Get a session by ID
    pub async fn get_session(&self, id: Uuid) -> Result<ComparisonSession, SessionError> {
        let sessions = self.inner.sessions.read().await;
        sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Get a session by string ID
    pub async fn get_session_by_str(&self, id: &str) -> Result<ComparisonSession, SessionError> {
        let uuid = Uuid::parse_str(id).map_err(|_| SessionError::NotFound(id.to_string()))?;
        self.get_session(uuid).await
    }

    /// Clear a session and mark it rendering
    ///
    /// Returns the generation the new comparison must write with.
    pub async fn begin_comparison(&self, id: Uuid) -> Result<u64, SessionError> {
        self.update(id, |session| {
            let generation = session.reset();
            session.status = SessionStatus::Rendering;
            tracing::info!(session_id = %id, generation, "Comparison started");
            generation
        })
        .await
    }

    /// Clear a session back to idle
    pub async fn reset_session(&self, id: Uuid) -> Result<ComparisonSession, SessionError> {
        self.update(id, |session| {
            let generation = session.reset();
            tracing::info!(session_id = %id, generation, "Session reset");
            session.clone()
        })
        .await
    }

    /// Remove a session
    pub async fn remove_session(&self, id: Uuid) -> Result<ComparisonSession, SessionError> {
        let session = {
            let mut sessions = self.inner.sessions.write().await;
            sessions
                .remove(&id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?
        };

        tracing::info!(session_id = %id, "Comparison session removed");

        Ok(session)
    }

    // ========================================================================
    // Background Writes (generation-guarded)
    // ========================================================================

    /// Store the rasterized documents
    pub async fn attach_documents(
        &self,
        id: Uuid,
        generation: u64,
        original: Arc<RenderedDocument>,
        new: Arc<RenderedDocument>,
    ) -> bool {
        self.write_if_current(id, generation, "documents", move |session| {
            session.original = Some(original);
            session.new = Some(new);
        })
        .await
    }

    /// Mark the narrative as in flight
    pub async fn begin_narrative(&self, id: Uuid, generation: u64) -> bool {
        self.write_if_current(id, generation, "narrative_start", |session| {
            session.narrative_pending = true;
            session.narrative_error = None;
        })
        .await
    }

    /// Store the narrative outcome
    pub async fn commit_narrative(
        &self,
        id: Uuid,
        generation: u64,
        outcome: Result<ChangeNarrative, String>,
    ) -> bool {
        self.write_if_current(id, generation, "narrative", move |session| {
            session.narrative_pending = false;
            match outcome {
                Ok(narrative) => {
                    session.narrative = Some(narrative);
                    session.narrative_error = None;
                }
                Err(message) => {
                    session.narrative = None;
                    session.narrative_error = Some(message);
                }
            }
        })
        .await
    }

    /// Store the page artifacts and mark the session ready
    pub async fn commit_artifacts(
        &self,
        id: Uuid,
        generation: u64,
        artifacts: Vec<DiffArtifact>,
    ) -> bool {
        self.write_if_current(id, generation, "artifacts", move |session| {
            session.export_overlays = artifacts
                .iter()
                .map(|a| (a.page_index(), a.overlay().clone()))
                .collect();
            session.artifacts = artifacts;
            session.current_page = 1;
            session.status = SessionStatus::Ready;
            session.error = None;

            tracing::info!(
                session_id = %session.id,
                pages = session.artifacts.len(),
                "Comparison ready"
            );
        })
        .await
    }

    /// Drop all document state and return to idle with an error
    pub async fn fail(&self, id: Uuid, generation: u64, message: &str) -> bool {
        self.write_if_current(id, generation, "failure", |session| {
            session.status = SessionStatus::Idle;
            session.original = None;
            session.new = None;
            session.artifacts.clear();
            session.export_overlays.clear();
            session.current_page = 1;
            session.narrative = None;
            session.narrative_pending = false;
            session.error = Some(message.to_string());
        })
        .await
    }

    // ========================================================================
    // View State
    // ========================================================================

    pub async fn set_mode(
        &self,
        id: Uuid,
        mode: VisualizationMode,
    ) -> Result<ComparisonSession, SessionError> {
        self.update(id, |session| {
            session.mode = mode;
            session.clone()
        })
        .await
    }

    /// Move the page cursor (1-based, within the current comparison)
    pub async fn set_current_page(
        &self,
        id: Uuid,
        page: usize,
    ) -> Result<ComparisonSession, SessionError> {
        let mut sessions = self.inner.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let total = session.total_pages();
        if page == 0 || page > total {
            return Err(SessionError::InvalidPage { page, total });
        }

        session.current_page = page;
        Ok(session.clone())
    }

    // ========================================================================
    // Query Methods
    // ========================================================================

    pub async fn session_count(&self) -> usize {
        let sessions = self.inner.sessions.read().await;
        sessions.len()
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Clean up expired sessions
    ///
    /// Returns the number of sessions cleaned up
    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let count = {
            let mut sessions = self.inner.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|id, session| {
                let keep = session.expires_at >= now;
                if !keep {
                    tracing::debug!(session_id = %id, "Cleaned up expired session");
                }
                keep
            });
            before - sessions.len()
        };

        if count > 0 {
            tracing::info!(count = count, "Cleaned up expired comparison sessions");
        }

        count
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300)); // 5 minutes

            loop {
                interval.tick().await;
                self.cleanup_expired().await;
            }
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn update<T>(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut ComparisonSession) -> T,
    ) -> Result<T, SessionError> {
        let mut sessions = self.inner.sessions.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        Ok(apply(session))
    }

    async fn write_if_current(
        &self,
        id: Uuid,
        generation: u64,
        write: &'static str,
        apply: impl FnOnce(&mut ComparisonSession),
    ) -> bool {
        let mut sessions = self.inner.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) if session.generation == generation => {
                apply(session);
                true
            }
            Some(session) => {
                tracing::debug!(
                    session_id = %id,
                    generation,
                    current = session.generation,
                    write,
                    "Discarding stale session write"
                );
                false
            }
            None => {
                tracing::debug!(session_id = %id, write, "Discarding write for removed session");
                false
            }
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
