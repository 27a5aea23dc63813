// src/broadcast.rs
//! Merge per-topic news and reddit summaries into one broadcast script.

use tracing::{debug, info};

use crate::errors::Result;
use crate::ingest::SourceResult;
use crate::llm::{GenerationParams, SharedModel};

pub const TOPIC_SEPARATOR: &str = "\n\n--- NEW TOPIC ---\n\n";

const BROADCASTER_PROMPT: &str = "\
You are a virtual news broadcaster. Using the content provided for each topic, write a spoken-news script for a podcast.

Guidelines:
- Start directly with the news, no introductions or headings
- Use full, clear sentences and natural transitions between topics
- Keep a neutral, professional tone
- Mention Reddit opinions where available, with phrasing like \"Reddit users believe...\"
- Close each topic with a short wrap-up sentence

Avoid:
- Emojis, markdown or any formatting
- Usernames or Reddit-specific jargon

Topics:
";

/// The merged narration. Empty means no topic had any content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastScript(String);

impl BroadcastScript {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn non_empty<'a>(result: Option<&'a SourceResult>, topic: &str) -> Option<&'a str> {
    result
        .and_then(|r| r.text(topic))
        .filter(|t| !t.trim().is_empty())
}

/// Topic blocks in input order; topics with no content at all are skipped.
pub fn topic_blocks<S: AsRef<str>>(
    news: Option<&SourceResult>,
    reddit: Option<&SourceResult>,
    topics: &[S],
) -> Vec<String> {
    let mut blocks = Vec::new();
    for topic in topics {
        let topic = topic.as_ref();
        let mut context = String::new();
        if let Some(n) = non_empty(news, topic) {
            context.push_str(&format!("OFFICIAL NEWS:\n{n}\n"));
        }
        if let Some(r) = non_empty(reddit, topic) {
            context.push_str(&format!("REDDIT OPINIONS:\n{r}"));
        }
        if !context.is_empty() {
            blocks.push(format!("TOPIC: {topic}\n{context}"));
        }
    }
    blocks
}

/// Full prompt, or `None` when there is nothing to say.
pub fn build_prompt<S: AsRef<str>>(
    news: Option<&SourceResult>,
    reddit: Option<&SourceResult>,
    topics: &[S],
) -> Option<String> {
    let blocks = topic_blocks(news, reddit, topics);
    if blocks.is_empty() {
        return None;
    }
    Some(format!("{BROADCASTER_PROMPT}{}", blocks.join(TOPIC_SEPARATOR)))
}

pub struct BroadcastComposer {
    model: SharedModel,
}

impl BroadcastComposer {
    pub fn new(model: SharedModel) -> Self {
        Self { model }
    }

    /// One model call for the whole batch; none at all on empty input.
    pub async fn compose<S: AsRef<str>>(
        &self,
        news: Option<&SourceResult>,
        reddit: Option<&SourceResult>,
        topics: &[S],
    ) -> Result<BroadcastScript> {
        let Some(prompt) = build_prompt(news, reddit, topics) else {
            info!(target: "briefing", "no topic content, skipping composition");
            return Ok(BroadcastScript::empty());
        };
        debug!(target: "briefing", prompt_chars = prompt.len(), "composing broadcast");
        let text = self
            .model
            .complete(&prompt, &GenerationParams::BROADCAST)
            .await?;
        Ok(BroadcastScript::new(text))
    }
}
