//! Comparison orchestrator
//!
//! Runs one comparison end to end: rasterize both uploads, attach them to the
//! session, start the narrative job, diff every page pair and commit the
//! artifacts. Every session write carries the generation the run started
//! with, so a reset while the pipeline is in flight discards its results.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::diff::{PageImage, PixelDiffEngine};
use crate::narrative::NarrativeService;
use crate::raster::{PageRasterizer, RenderedDocument};
use crate::session::{SessionError, SessionManager, PROCESSING_FAILED};

use super::pairing::{compare_pair, pair_pages, DiffArtifact};

/// An uploaded PDF
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub name: String,
    pub data: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Drives comparisons for a [`SessionManager`]
#[derive(Clone)]
pub struct ComparisonOrchestrator {
    rasterizer: Arc<dyn PageRasterizer>,
    narrative: Option<NarrativeService>,
    engine: PixelDiffEngine,
    sessions: SessionManager,
    max_concurrent_pages: usize,
}

impl ComparisonOrchestrator {
    pub fn new(
        rasterizer: Arc<dyn PageRasterizer>,
        engine: PixelDiffEngine,
        sessions: SessionManager,
        max_concurrent_pages: usize,
    ) -> Self {
        Self {
            rasterizer,
            narrative: None,
            engine,
            sessions,
            max_concurrent_pages: max_concurrent_pages.max(1),
        }
    }

    /// Enable the text narrative
    pub fn with_narrative(mut self, service: NarrativeService) -> Self {
        self.narrative = Some(service);
        self
    }

    pub fn engine(&self) -> &PixelDiffEngine {
        &self.engine
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Diff every page pair on the blocking pool
    ///
    /// At most `max_concurrent_pages` pages are in flight. The result has one
    /// artifact per page index, in page order.
    pub async fn compare_pages(&self, original: &[PageImage], new: &[PageImage]) -> Vec<DiffArtifact> {
        let pairs = pair_pages(original, new);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_pages));
        let mut slots: Vec<Option<DiffArtifact>> = (0..pairs.len()).map(|_| None).collect();

        let mut tasks = FuturesUnordered::new();
        for pair in pairs {
            let semaphore = semaphore.clone();
            let engine = self.engine;
            tasks.push(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let job = pair.clone();
                let result = tokio::task::spawn_blocking(move || compare_pair(&engine, &job)).await;
                match result {
                    Ok(artifact) => artifact,
                    Err(e) => {
                        tracing::warn!(
                            page = pair.page_number(),
                            error = %e,
                            "Page comparison task failed, keeping page unmodified"
                        );
                        DiffArtifact::passthrough(&pair)
                    }
                }
            });
        }

        while let Some(artifact) = tasks.next().await {
            let index = artifact.page_index();
            slots[index] = Some(artifact);
        }

        slots.into_iter().flatten().collect()
    }

    /// Reset the session and run a new comparison in the background
    ///
    /// The returned handle completes once the artifacts and the narrative
    /// have been committed (or discarded).
    pub async fn start(
        &self,
        session_id: Uuid,
        original: DocumentUpload,
        new: DocumentUpload,
    ) -> Result<JoinHandle<()>, SessionError> {
        let generation = self.sessions.begin_comparison(session_id).await?;

        tracing::info!(
            session_id = %session_id,
            generation,
            original = %original.name,
            new = %new.name,
            "Queued comparison"
        );

        let this = self.clone();
        Ok(tokio::spawn(async move {
            this.run(session_id, generation, original, new).await;
        }))
    }

    async fn run(self, id: Uuid, generation: u64, original: DocumentUpload, new: DocumentUpload) {
        let started = Instant::now();

        let rendered = tokio::try_join!(
            self.rasterizer.render(&original.name, original.data),
            self.rasterizer.render(&new.name, new.data),
        );

        let (original_doc, new_doc) = match rendered {
            Ok((o, n)) => (Arc::new(o), Arc::new(n)),
            Err(e) => {
                tracing::error!(session_id = %id, error = %e, "Failed to rasterize documents");
                self.sessions.fail(id, generation, PROCESSING_FAILED).await;
                return;
            }
        };

        if !self
            .sessions
            .attach_documents(id, generation, original_doc.clone(), new_doc.clone())
            .await
        {
            return;
        }

        let narrative_task = match &self.narrative {
            Some(service) => {
                self.spawn_narrative(service.clone(), id, generation, &original_doc, &new_doc)
                    .await
            }
            None => None,
        };

        let artifacts = self
            .compare_pages(&original_doc.images, &new_doc.images)
            .await;
        let pages = artifacts.len();

        if self.sessions.commit_artifacts(id, generation, artifacts).await {
            tracing::info!(
                session_id = %id,
                pages,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Visual comparison finished"
            );
        }

        if let Some(task) = narrative_task {
            if let Err(e) = task.await {
                tracing::warn!(session_id = %id, error = %e, "Narrative task failed");
            }
        }
    }

    async fn spawn_narrative(
        &self,
        service: NarrativeService,
        id: Uuid,
        generation: u64,
        original: &RenderedDocument,
        new: &RenderedDocument,
    ) -> Option<JoinHandle<()>> {
        if !self.sessions.begin_narrative(id, generation).await {
            return None;
        }

        let sessions = self.sessions.clone();
        let old_text = original.text.clone();
        let new_text = new.text.clone();

        Some(tokio::spawn(async move {
            let outcome = service
                .compare_texts(&old_text, &new_text)
                .await
                .map_err(|e| {
                    tracing::warn!(session_id = %id, error = %e, "Narrative comparison failed");
                    e.to_string()
                });
            sessions.commit_narrative(id, generation, outcome).await;
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::MockComparator;
    use crate::raster::testing::{solid_page, white_document, GatedRasterizer, StaticRasterizer};
    use crate::session::SessionStatus;

    fn upload(name: &str) -> DocumentUpload {
        DocumentUpload::new(name, b"%PDF-1.7 test".to_vec())
    }

    fn rasterizer() -> StaticRasterizer {
        StaticRasterizer::default()
            .with_document(white_document("original.pdf", &["Total: 10", "Page two"]))
            .with_document(white_document("new.pdf", &["Total: 12", "Page two"]))
    }

    fn orchestrator(rasterizer: Arc<dyn PageRasterizer>, sessions: &SessionManager) -> ComparisonOrchestrator {
        ComparisonOrchestrator::new(rasterizer, PixelDiffEngine::default(), sessions.clone(), 2)
    }

    #[tokio::test]
    async fn test_compare_pages_pads_missing_pages() {
        let sessions = SessionManager::new();
        let orchestrator = orchestrator(Arc::new(rasterizer()), &sessions);

        let original: Vec<PageImage> = (0..3)
            .map(|i| solid_page(10 + i, 10, [255, 255, 255, 255]))
            .collect();
        let new: Vec<PageImage> = (0..2)
            .map(|i| solid_page(10 + i, 10, [0, 0, 0, 255]))
            .collect();

        let artifacts = orchestrator.compare_pages(&original, &new).await;

        assert_eq!(artifacts.len(), 3);
        for (i, artifact) in artifacts.iter().enumerate() {
            assert_eq!(artifact.page_index(), i);
        }
        assert!(artifacts[0].highlight().is_some());
        assert!(artifacts[1].highlight().is_some());
        assert!(artifacts[2].highlight().is_none());
        assert_eq!(artifacts[2].overlay(), &original[2]);
    }

    #[tokio::test]
    async fn test_compare_pages_empty() {
        let sessions = SessionManager::new();
        let orchestrator = orchestrator(Arc::new(rasterizer()), &sessions);
        assert!(orchestrator.compare_pages(&[], &[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_start_commits_artifacts_and_narrative() {
        let sessions = SessionManager::new();
        let comparator = Arc::new(MockComparator::replying("- Totals:\n- 10 → 12"));
        let orchestrator = orchestrator(Arc::new(rasterizer()), &sessions)
            .with_narrative(NarrativeService::new(comparator.clone(), 4000));

        let id = sessions.create_session().await.id;
        let handle = orchestrator
            .start(id, upload("original.pdf"), upload("new.pdf"))
            .await
            .unwrap();
        handle.await.unwrap();

        let session = sessions.get_session(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Ready);
        assert_eq!(session.artifacts.len(), 2);
        assert_eq!(session.generation, 1);
        assert!(!session.narrative_pending);
        assert_eq!(
            session.narrative.unwrap().summary,
            "• Totals:\n  • 10 → 12"
        );

        let calls = comparator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "Total: 10\n\nPage two");
    }

    #[tokio::test]
    async fn test_rasterize_failure_resets_session() {
        let sessions = SessionManager::new();
        let orchestrator = orchestrator(Arc::new(rasterizer()), &sessions);

        let id = sessions.create_session().await.id;
        let handle = orchestrator
            .start(id, upload("original.pdf"), upload("missing.pdf"))
            .await
            .unwrap();
        handle.await.unwrap();

        let session = sessions.get_session(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Idle);
        assert_eq!(session.error.as_deref(), Some(PROCESSING_FAILED));
        assert!(session.original.is_none());
        assert!(session.new.is_none());
        assert!(session.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_narrative_failure_does_not_block_visuals() {
        let sessions = SessionManager::new();
        let orchestrator = orchestrator(Arc::new(rasterizer()), &sessions)
            .with_narrative(NarrativeService::new(Arc::new(MockComparator::failing()), 4000));

        let id = sessions.create_session().await.id;
        orchestrator
            .start(id, upload("original.pdf"), upload("new.pdf"))
            .await
            .unwrap()
            .await
            .unwrap();

        let session = sessions.get_session(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Ready);
        assert_eq!(session.artifacts.len(), 2);
        assert!(session.narrative.is_none());
        assert!(session.narrative_error.is_some());
    }

    #[tokio::test]
    async fn test_reset_mid_comparison_discards_results() {
        let sessions = SessionManager::new();
        let gated = Arc::new(GatedRasterizer::new(rasterizer()));
        let orchestrator = orchestrator(gated.clone(), &sessions);

        let id = sessions.create_session().await.id;
        let handle = orchestrator
            .start(id, upload("original.pdf"), upload("new.pdf"))
            .await
            .unwrap();

        gated.started.notified().await;
        sessions.reset_session(id).await.unwrap();
        gated.open();
        handle.await.unwrap();

        let session = sessions.get_session(id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Idle);
        assert!(session.artifacts.is_empty());
        assert!(session.export_overlays.is_empty());
        assert!(session.original.is_none());
    }

    #[tokio::test]
    async fn test_restart_supersedes_running_comparison() {
        let sessions = SessionManager::new();
        let gated = Arc::new(GatedRasterizer::new(rasterizer()));
        let slow = orchestrator(gated.clone(), &sessions);
        let fast = orchestrator(Arc::new(rasterizer()), &sessions);

        let id = sessions.create_session().await.id;
        let first = slow
            .start(id, upload("original.pdf"), upload("new.pdf"))
            .await
            .unwrap();
        gated.started.notified().await;

        fast.start(id, upload("new.pdf"), upload("original.pdf"))
            .await
            .unwrap()
            .await
            .unwrap();
        gated.open();
        first.await.unwrap();

        let session = sessions.get_session(id).await.unwrap();
        assert_eq!(session.generation, 2);
        assert_eq!(session.status, SessionStatus::Ready);
        assert_eq!(session.original.unwrap().name, "new.pdf");
    }

    #[tokio::test]
    async fn test_start_unknown_session() {
        let sessions = SessionManager::new();
        let orchestrator = orchestrator(Arc::new(rasterizer()), &sessions);
        let result = orchestrator
            .start(Uuid::new_v4(), upload("original.pdf"), upload("new.pdf"))
            .await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }
}
