// src/speech/mod.rs
//! Script -> audio file.
//!
//! The synthesizer returns encoded bytes; the renderer owns where they land.
//! Files are named `tts_%Y%m%d_%H%M%S.<ext>` under the output directory. The
//! final name is claimed with `create_new`, so concurrent renders never share
//! or replace a file. Bytes go to a per-artifact temp file that is renamed
//! over the claimed name; a failed or cancelled render removes both.

pub mod elevenlabs;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::SpeechConfig;
use crate::errors::{BriefingError, Result};

pub use elevenlabs::ElevenLabsClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSettings {
    pub voice_id: String,
    pub model_id: String,
    /// Provider format string, e.g. `mp3_44100_128`.
    pub output_format: String,
}

impl From<&SpeechConfig> for VoiceSettings {
    fn from(cfg: &SpeechConfig) -> Self {
        Self {
            voice_id: cfg.voice_id.clone(),
            model_id: cfg.model_id.clone(),
            output_format: cfg.output_format.clone(),
        }
    }
}

impl VoiceSettings {
    /// File extension implied by the format (`mp3_44100_128` -> `mp3`).
    pub fn extension(&self) -> &str {
        self.output_format
            .split('_')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("mp3")
    }
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> Result<Vec<u8>>;
}

pub type SharedSynthesizer = Arc<dyn SpeechSynthesizer>;

#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    pub path: PathBuf,
    pub generated_at: DateTime<Local>,
}

impl AudioArtifact {
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3")
    }

    pub fn content_type(&self) -> &'static str {
        match self.extension() {
            "mp3" => "audio/mpeg",
            "opus" => "audio/ogg",
            "ulaw" => "audio/basic",
            "pcm" => "audio/L16",
            _ => "application/octet-stream",
        }
    }
}

pub fn artifact_file_name(at: &DateTime<Local>, ext: &str) -> String {
    format!("tts_{}.{ext}", at.format("%Y%m%d_%H%M%S"))
}

/// Claim the first free `tts_...` name in `dir`, adding `_N` on collisions.
/// The returned path exists (empty) and belongs to the caller.
async fn claim_path(dir: &Path, at: &DateTime<Local>, ext: &str) -> Result<PathBuf> {
    let stem = format!("tts_{}", at.format("%Y%m%d_%H%M%S"));
    let mut n = 0u32;
    loop {
        let candidate = if n == 0 {
            dir.join(artifact_file_name(at, ext))
        } else {
            dir.join(format!("{stem}_{n}.{ext}"))
        };
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Temp file plus claimed name for one render. Removes both on drop unless
/// the render committed.
struct PendingArtifact {
    path: PathBuf,
    tmp: PathBuf,
    committed: bool,
}

impl PendingArtifact {
    fn new(path: PathBuf) -> Self {
        let mut tmp = path.clone().into_os_string();
        tmp.push(".part");
        Self {
            path,
            tmp: PathBuf::from(tmp),
            committed: false,
        }
    }

    async fn commit(mut self, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::write(&self.tmp, bytes).await?;
        tokio::fs::rename(&self.tmp, &self.path).await?;
        self.committed = true;
        Ok(std::mem::take(&mut self.path))
    }
}

impl Drop for PendingArtifact {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let _ = std::fs::remove_file(&self.tmp);
        let _ = std::fs::remove_file(&self.path);
    }
}

pub struct SpeechRenderer {
    synth: SharedSynthesizer,
    voice: VoiceSettings,
    output_dir: PathBuf,
}

impl SpeechRenderer {
    pub fn new(synth: SharedSynthesizer, voice: VoiceSettings, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            synth,
            voice,
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(cfg: &SpeechConfig, synth: SharedSynthesizer) -> Self {
        Self::new(synth, VoiceSettings::from(cfg), cfg.output_dir.clone())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Synthesize `script` and store it as a new artifact. Never overwrites.
    pub async fn render(&self, script: &str) -> Result<AudioArtifact> {
        if script.trim().is_empty() {
            return Err(BriefingError::Config("nothing to render: script is empty".into()));
        }
        let bytes = self.synth.synthesize(script, &self.voice).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let generated_at = Local::now();
        let claimed = claim_path(&self.output_dir, &generated_at, self.voice.extension()).await?;
        let path = PendingArtifact::new(claimed).commit(&bytes).await?;

        info!(
            target: "speech",
            path = %path.display(),
            bytes = bytes.len(),
            "audio written"
        );
        Ok(AudioArtifact {
            bytes,
            path,
            generated_at,
        })
    }
}
