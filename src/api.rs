// src/api.rs
//! HTTP surface: `POST /generate-news-audio`, `GET /health`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shuttle_axum::axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::briefing::{BriefingService, SourceSelection};
use crate::ingest::normalize_topics;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BriefingService>,
}

impl AppState {
    pub fn new(service: BriefingService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/generate-news-audio", post(generate_news_audio))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct NewsRequest {
    pub topics: Vec<String>,
    pub source_type: SourceSelection,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

fn error_response(status: StatusCode, detail: String) -> Response {
    (status, Json(ErrorBody { detail })).into_response()
}

async fn generate_news_audio(
    State(state): State<AppState>,
    Json(req): Json<NewsRequest>,
) -> Response {
    let topics = normalize_topics(&req.topics);
    if topics.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "at least one non-empty topic is required".to_string(),
        );
    }

    match state.service.produce_briefing(&topics, req.source_type).await {
        Ok(briefing) => match briefing.audio {
            Some(audio) => {
                info!(target: "api", bytes = audio.bytes.len(), "audio served");
                let disposition = format!(
                    "attachment; filename=news-summary.{}",
                    audio.extension()
                );
                (
                    [
                        (header::CONTENT_TYPE, audio.content_type().to_string()),
                        (header::CONTENT_DISPOSITION, disposition),
                    ],
                    audio.bytes,
                )
                    .into_response()
            }
            None => StatusCode::NO_CONTENT.into_response(),
        },
        Err(e) => {
            error!(target: "api", error = %e, "briefing failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal Server Error: {e}"),
            )
        }
    }
}
