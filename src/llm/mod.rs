// src/llm/mod.rs
//! Generative text model abstraction + the Gemini provider.

pub mod gemini;

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::Result;

pub use gemini::GeminiClient;

/// Sampling settings handed to every completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    /// Per-topic spoken summaries: deterministic-leaning, bounded length.
    pub const SPOKEN_SUMMARY: GenerationParams = GenerationParams {
        temperature: 0.4,
        top_p: 1.0,
        top_k: 1,
        max_output_tokens: 800,
    };

    /// The merged multi-topic script.
    pub const BROADCAST: GenerationParams = GenerationParams {
        temperature: 0.4,
        top_p: 1.0,
        top_k: 1,
        max_output_tokens: 1000,
    };

    /// Tool-calling turns of the discussion agent.
    pub const AGENT: GenerationParams = GenerationParams {
        temperature: 0.4,
        top_p: 1.0,
        top_k: 1,
        max_output_tokens: 2048,
    };
}

/// Single-prompt text completion.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type SharedModel = Arc<dyn GenerativeModel>;

/// Shared style rules for anything that ends up read aloud.
pub const SPOKEN_STYLE_RULES: &str = "\
- This text will be converted to audio by a text-to-speech engine.
- Use formal, clear, and fluent language like a professional news anchor.
- Use full, grammatically correct sentences.
- No emojis, symbols, markdown, or special characters.
- No headings, bullet points, lists, or introductory phrases.
- Start directly with the content.";
