// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod agent;
pub mod api;
pub mod briefing;
pub mod broadcast;
pub mod config;
pub mod errors;
pub mod ingest;
pub mod llm;
pub mod metrics;
pub mod pacing;
pub mod scrape;
pub mod speech;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::briefing::{Batch, Briefing, BriefingService, SourcePipeline, SourceSelection};
pub use crate::broadcast::{BroadcastComposer, BroadcastScript};
pub use crate::config::BriefingConfig;
pub use crate::errors::{BriefingError, ErrorKind};
pub use crate::ingest::{SourceKind, SourceResult, TopicOutcome};
pub use crate::speech::{AudioArtifact, SpeechRenderer};

use shuttle_axum::axum::Router;

/// Full application router: the briefing API plus `/metrics`.
pub fn app(state: AppState, metrics: &crate::metrics::Metrics) -> Router {
    create_router(state).merge(metrics.router())
}
