// src/ingest/reddit.rs
//! Reddit topics: the tool agent finds recent threads and their talking
//! points, then a second model pass rewrites that into spoken style.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::debug;

use super::{SourceKind, TopicSource};
use crate::agent::{AgentMessage, ToolAgent};
use crate::errors::{BriefingError, Result};
use crate::llm::{GenerationParams, SharedModel, SPOKEN_STYLE_RULES};

/// `now - days` as `YYYY-MM-DD`. Posts must be strictly newer than this.
pub fn recency_cutoff(now: DateTime<Utc>, days: u32) -> String {
    (now - ChronoDuration::days(i64::from(days)))
        .format("%Y-%m-%d")
        .to_string()
}

pub fn discussion_messages(topic: &str, cutoff: &str, top_posts: u32) -> Vec<AgentMessage> {
    vec![
        AgentMessage::system(format!(
            "You are a Reddit research agent. Use the available tools to find the top \
             {top_posts} Reddit posts about '{topic}' posted AFTER {cutoff}. Read each post \
             and its comments and return the key talking points, recurring patterns and \
             overall sentiment."
        )),
        AgentMessage::user(format!(
            "Summarize the Reddit discussion on '{topic}':\n\
             - Main themes and opinions\n\
             - Interesting comments, quoted without usernames\n\
             - Notable patterns or sentiment\n\
             - Written as spoken news, as if narrated on a podcast"
        )),
    ]
}

pub fn polish_prompt(raw: &str) -> String {
    format!(
        "You are a podcast narrator. Rewrite the following Reddit analysis as a polished \
         spoken-news briefing. Never mention usernames.\n\nRules:\n{SPOKEN_STYLE_RULES}\n\n\
         Analysis:\n{raw}\n"
    )
}

pub struct RedditSource {
    model: SharedModel,
    recency_days: u32,
    top_posts: u32,
}

impl RedditSource {
    pub fn new(model: SharedModel, recency_days: u32, top_posts: u32) -> Self {
        Self {
            model,
            recency_days,
            top_posts: top_posts.max(1),
        }
    }
}

#[async_trait]
impl TopicSource for RedditSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Reddit
    }

    async fn summarize(&self, topic: &str, agent: &dyn ToolAgent) -> Result<String> {
        let cutoff = recency_cutoff(Utc::now(), self.recency_days);
        let raw = agent
            .run(&discussion_messages(topic, &cutoff, self.top_posts))
            .await?;
        if raw.trim().is_empty() {
            return Err(BriefingError::Upstream(format!(
                "agent returned nothing for '{topic}'"
            )));
        }
        debug!(target: "ingest", topic, %cutoff, chars = raw.len(), "reddit analysis gathered");
        self.model
            .complete(&polish_prompt(&raw), &GenerationParams::SPOKEN_SUMMARY)
            .await
    }
}
