// src/speech/elevenlabs.rs
//! ElevenLabs text-to-speech over REST.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::{SpeechSynthesizer, VoiceSettings};
use crate::config::SpeechConfig;
use crate::errors::{BriefingError, Result};

pub struct ElevenLabsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

impl ElevenLabsClient {
    pub fn new(cfg: &SpeechConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(|e| BriefingError::Config(format!("speech http client: {e}")))?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> Result<Vec<u8>> {
        if self.api_key.trim().is_empty() {
            return Err(BriefingError::Config("ElevenLabs API key missing".into()));
        }

        let url = format!("{}/text-to-speech/{}", self.base_url, voice.voice_id);
        let resp = self
            .http
            .post(&url)
            .query(&[("output_format", voice.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .json(&TtsRequest {
                text,
                model_id: &voice.model_id,
            })
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(BriefingError::Config(format!(
                "ElevenLabs rejected the API key ({status})"
            )));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BriefingError::from_status("elevenlabs", status.as_u16(), &body));
        }

        let bytes = resp.bytes().await?;
        debug!(target: "speech", voice = %voice.voice_id, bytes = bytes.len(), "speech synthesized");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_a_config_error() {
        let cfg = SpeechConfig {
            api_key: " ".into(),
            ..SpeechConfig::default()
        };
        let client = ElevenLabsClient::new(&cfg).unwrap();
        let err = client
            .synthesize("hello", &VoiceSettings::from(&cfg))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Config);
    }
}
