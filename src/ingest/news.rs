// src/ingest/news.rs
//! News topics: search page -> plain text -> headlines -> spoken paragraph.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use super::{SourceKind, TopicSource};
use crate::agent::ToolAgent;
use crate::errors::{BriefingError, Result};
use crate::llm::{GenerationParams, SharedModel, SPOKEN_STYLE_RULES};
use crate::scrape::SharedScraper;

/// Line that closes a headline block on the search results page.
pub const BLOCK_SENTINEL: &str = "More";

static RE_HIDDEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<noscript\b[^>]*>.*?</noscript\s*>|<!--.*?-->",
    )
    .expect("static regex")
});
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));

/// Search URL for `topic`, newest first (`tbs=sbd:1`). Spaces encode as `+`.
pub fn search_url(base: &str, topic: &str) -> Result<String> {
    let url = Url::parse_with_params(base, &[("q", topic), ("tbs", "sbd:1")])
        .map_err(|e| BriefingError::Config(format!("invalid news search url '{base}': {e}")))?;
    Ok(url.into())
}

/// Strip markup to text, one text node per line.
pub fn clean_html_to_text(html: &str) -> String {
    // 1) Drop content that never renders
    let visible = RE_HIDDEN.replace_all(html, "");

    // 2) Tags become line breaks
    let text = RE_TAGS.replace_all(&visible, "\n");

    // 3) Entities
    let decoded = html_escape::decode_html_entities(&text);

    // 4) Trim lines, drop blanks
    decoded
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First line of each block, blocks delimited by [`BLOCK_SENTINEL`] lines.
/// A trailing block without a sentinel still counts. Repeats are dropped.
pub fn extract_headlines(text: &str) -> Vec<String> {
    let mut headlines = Vec::new();
    let mut seen = HashSet::new();
    let mut block_head: Option<&str> = None;

    let mut push = |line: &str, out: &mut Vec<String>| {
        if seen.insert(line.to_string()) {
            out.push(line.to_string());
        }
    };

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line == BLOCK_SENTINEL {
            if let Some(head) = block_head.take() {
                push(head, &mut headlines);
            }
        } else if block_head.is_none() {
            block_head = Some(line);
        }
    }
    if let Some(head) = block_head {
        push(head, &mut headlines);
    }
    headlines
}

pub fn headline_prompt(headlines: &[String]) -> String {
    format!(
        "You are a news summarization expert. Summarize the following headlines into a \
         spoken-news script.\n\nRules:\n{SPOKEN_STYLE_RULES}\n\nHeadlines:\n{}\n\nNews Script:\n",
        headlines.join("\n")
    )
}

pub struct NewsSource {
    scraper: SharedScraper,
    model: SharedModel,
    search_base: String,
}

impl NewsSource {
    pub fn new(scraper: SharedScraper, model: SharedModel, search_base: impl Into<String>) -> Self {
        Self {
            scraper,
            model,
            search_base: search_base.into(),
        }
    }
}

#[async_trait]
impl TopicSource for NewsSource {
    fn kind(&self) -> SourceKind {
        SourceKind::News
    }

    async fn summarize(&self, topic: &str, _agent: &dyn ToolAgent) -> Result<String> {
        let url = search_url(&self.search_base, topic)?;
        let html = self.scraper.fetch(&url).await?;
        let headlines = extract_headlines(&clean_html_to_text(&html));
        debug!(target: "ingest", topic, headlines = headlines.len(), "headlines extracted");
        if headlines.is_empty() {
            return Err(BriefingError::Upstream(format!(
                "no headlines found for '{topic}'"
            )));
        }
        self.model
            .complete(&headline_prompt(&headlines), &GenerationParams::SPOKEN_SUMMARY)
            .await
    }
}
