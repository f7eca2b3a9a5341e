//! Page pairing and comparison orchestration

mod orchestrator;
mod pairing;

pub use orchestrator::{ComparisonOrchestrator, DocumentUpload};
pub use pairing::{
    compare_pair, pair_pages, total_pages, ArtifactSummary, DiffArtifact, PagePair, PageSides,
};
