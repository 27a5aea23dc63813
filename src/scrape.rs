// src/scrape.rs
//! Raw page fetching through the Bright Data Web Unlocker.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ScrapeConfig;
use crate::errors::{BriefingError, Result};

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Fetch the raw markup behind `url`.
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub type SharedScraper = Arc<dyn Scraper>;

pub struct BrightDataScraper {
    http: reqwest::Client,
    api_key: String,
    zone: String,
    endpoint: String,
}

#[derive(Serialize)]
struct UnlockerRequest<'a> {
    zone: &'a str,
    url: &'a str,
    format: &'a str,
}

impl BrightDataScraper {
    pub fn new(cfg: &ScrapeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(|e| BriefingError::Config(format!("scrape http client: {e}")))?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            zone: cfg.zone.clone(),
            endpoint: cfg.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Scraper for BrightDataScraper {
    async fn fetch(&self, url: &str) -> Result<String> {
        if self.api_key.trim().is_empty() {
            return Err(BriefingError::Config("Missing BRIGHTDATA_API_KEY".into()));
        }
        if self.zone.trim().is_empty() {
            return Err(BriefingError::Config(
                "Missing BRIGHTDATA_WEB_UNLOCKER_ZONE".into(),
            ));
        }

        let payload = UnlockerRequest {
            zone: &self.zone,
            url,
            format: "raw",
        };
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BriefingError::from_upstream_message(format!("BrightData error: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BriefingError::from_upstream_message(format!("BrightData error: {e}")))?;
        if !status.is_success() {
            return Err(BriefingError::from_status("BrightData", status.as_u16(), &body));
        }
        debug!(target: "ingest", url, bytes = body.len(), "scraped");
        Ok(body)
    }
}
