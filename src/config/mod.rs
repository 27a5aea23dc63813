// src/config/mod.rs
pub mod briefing;

pub use briefing::{
    BriefingConfig, GeminiConfig, McpServerConfig, NewsConfig, PolicyOverrides, RedditConfig,
    ScrapeConfig, SourcePolicy, SpeechConfig,
};
