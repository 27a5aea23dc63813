//! Briefing service: binary entrypoint.
//! Loads configuration, wires the production adapters and serves the router.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use briefcast::metrics::Metrics;
use briefcast::{AppState, BriefingConfig, BriefingService};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - BRIEFING_DEV_LOG=1
/// BRIEFING_LOG_FORMAT=json switches the output to JSON lines.
fn enable_dev_tracing() {
    let dev_flag = std::env::var("BRIEFING_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("briefing=info,ingest=info,agent=info,speech=info,api=info,warn"));

    let json = std::env::var("BRIEFING_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let cfg = BriefingConfig::load_default().context("loading briefing config")?;
    tracing::info!(
        target: "briefing",
        gemini_key_set = !cfg.gemini.api_key.is_empty(),
        eleven_key_set = !cfg.speech.api_key.is_empty(),
        mcp_command = %cfg.mcp.command,
        output_dir = %cfg.speech.output_dir.display(),
        "config loaded"
    );

    let service = BriefingService::from_config(cfg).context("wiring briefing service")?;
    let metrics = Metrics::init()?;
    let router = briefcast::app(AppState::new(service), &metrics);

    Ok(router.into())
}
