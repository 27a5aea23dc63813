// src/briefing.rs
//! `produce_briefing`: topics + source selection -> one audio artifact.
//!
//! Flow per request:
//!   1) credentials check (model + speech)
//!   2) selected sources run concurrently, topics sequential inside each
//!   3) one composition call over both mappings
//!   4) speech rendering, unless the script came back empty

use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::agent::{McpConnector, SharedConnector, ToollessConnector};
use crate::broadcast::{BroadcastComposer, BroadcastScript};
use crate::config::BriefingConfig;
use crate::errors::{BriefingError, Result};
use crate::ingest::{
    normalize_topics, NewsSource, RedditSource, SourceOrchestrator, SourceResult, TopicProcessor,
};
use crate::llm::{GeminiClient, SharedModel};
use crate::pacing::{RateLimiter, SharedClock, TokioClock};
use crate::scrape::BrightDataScraper;
use crate::speech::{AudioArtifact, ElevenLabsClient, SpeechRenderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelection {
    News,
    Reddit,
    Both,
}

impl SourceSelection {
    pub fn includes_news(self) -> bool {
        matches!(self, SourceSelection::News | SourceSelection::Both)
    }

    pub fn includes_reddit(self) -> bool {
        matches!(self, SourceSelection::Reddit | SourceSelection::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceSelection::News => "news",
            SourceSelection::Reddit => "reddit",
            SourceSelection::Both => "both",
        }
    }
}

impl fmt::Display for SourceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceSelection {
    type Err = BriefingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "news" => Ok(SourceSelection::News),
            "reddit" => Ok(SourceSelection::Reddit),
            "both" => Ok(SourceSelection::Both),
            other => Err(BriefingError::Config(format!(
                "unknown source selection '{other}' (expected news, reddit or both)"
            ))),
        }
    }
}

/// Topics of one request plus where to look for them. Consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    topics: Vec<String>,
    selection: SourceSelection,
}

impl Batch {
    pub fn new<S: AsRef<str>>(topics: &[S], selection: SourceSelection) -> Result<Self> {
        let topics = normalize_topics(topics);
        if topics.is_empty() {
            return Err(BriefingError::Config("at least one topic is required".into()));
        }
        Ok(Self { topics, selection })
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn selection(&self) -> SourceSelection {
        self.selection
    }
}

#[derive(Debug, Clone)]
pub struct Briefing {
    pub script: BroadcastScript,
    /// `None` when the script was empty and nothing was rendered.
    pub audio: Option<AudioArtifact>,
    pub news: Option<SourceResult>,
    pub reddit: Option<SourceResult>,
}

/// One source: its orchestrator plus how to open its session.
pub struct SourcePipeline {
    orchestrator: SourceOrchestrator,
    connector: SharedConnector,
}

impl SourcePipeline {
    pub fn new(orchestrator: SourceOrchestrator, connector: SharedConnector) -> Self {
        Self {
            orchestrator,
            connector,
        }
    }

    pub async fn run(&self, topics: &[String]) -> SourceResult {
        self.orchestrator
            .run_batch(topics, self.connector.as_ref())
            .await
    }
}

pub struct BriefingService {
    news: SourcePipeline,
    reddit: SourcePipeline,
    composer: BroadcastComposer,
    renderer: SpeechRenderer,
    config: Option<Arc<BriefingConfig>>,
}

impl BriefingService {
    pub fn new(
        news: SourcePipeline,
        reddit: SourcePipeline,
        composer: BroadcastComposer,
        renderer: SpeechRenderer,
    ) -> Self {
        Self {
            news,
            reddit,
            composer,
            renderer,
            config: None,
        }
    }

    /// Check `cfg`'s credentials before every request.
    pub fn with_config(mut self, cfg: Arc<BriefingConfig>) -> Self {
        self.config = Some(cfg);
        self
    }

    /// Wire the production adapters. Limiters live as long as the service,
    /// so pacing holds across requests, not just within one.
    pub fn from_config(cfg: BriefingConfig) -> Result<Self> {
        let clock: SharedClock = Arc::new(TokioClock);
        let gemini = Arc::new(GeminiClient::new(&cfg.gemini)?);
        let model: SharedModel = gemini.clone();

        let mcp: SharedConnector = Arc::new(McpConnector::new(cfg.mcp.clone(), gemini));
        let toolless: SharedConnector = Arc::new(ToollessConnector);

        // News
        let news_policy = &cfg.news.policy;
        let news_limiter = Arc::new(RateLimiter::new(
            "news",
            news_policy.permits,
            news_policy.window(),
            clock.clone(),
        ));
        let news_source = Arc::new(NewsSource::new(
            Arc::new(BrightDataScraper::new(&cfg.scrape)?),
            model.clone(),
            cfg.news.search_url.clone(),
        ));
        let news = SourcePipeline::new(
            SourceOrchestrator::new(
                TopicProcessor::from_policy(news_source, news_policy, news_limiter, clock.clone()),
                news_policy.pause(),
                clock.clone(),
            ),
            if cfg.news.use_tool_session {
                mcp.clone()
            } else {
                toolless
            },
        );

        // Reddit
        let reddit_policy = &cfg.reddit.policy;
        let reddit_limiter = Arc::new(RateLimiter::new(
            "reddit",
            reddit_policy.permits,
            reddit_policy.window(),
            clock.clone(),
        ));
        let reddit_source = Arc::new(RedditSource::new(
            model.clone(),
            cfg.reddit.recency_days,
            cfg.reddit.top_posts,
        ));
        let reddit = SourcePipeline::new(
            SourceOrchestrator::new(
                TopicProcessor::from_policy(
                    reddit_source,
                    reddit_policy,
                    reddit_limiter,
                    clock.clone(),
                ),
                reddit_policy.pause(),
                clock,
            ),
            mcp,
        );

        let renderer = SpeechRenderer::from_config(
            &cfg.speech,
            Arc::new(ElevenLabsClient::new(&cfg.speech)?),
        );

        Ok(Self::new(news, reddit, BroadcastComposer::new(model), renderer)
            .with_config(Arc::new(cfg)))
    }

    pub async fn produce_briefing<S: AsRef<str>>(
        &self,
        topics: &[S],
        selection: SourceSelection,
    ) -> Result<Briefing> {
        if let Some(cfg) = &self.config {
            cfg.ensure_credentials()?;
        }
        let batch = Batch::new(topics, selection)?;
        self.produce(batch).await
    }

    pub async fn produce(&self, batch: Batch) -> Result<Briefing> {
        counter!("briefing_requests_total", "selection" => batch.selection.as_str()).increment(1);
        info!(
            target: "briefing",
            topics = batch.topics.len(),
            selection = %batch.selection,
            "briefing started"
        );

        let topics = batch.topics();
        let news_run = async {
            if batch.selection.includes_news() {
                Some(self.news.run(topics).await)
            } else {
                None
            }
        };
        let reddit_run = async {
            if batch.selection.includes_reddit() {
                Some(self.reddit.run(topics).await)
            } else {
                None
            }
        };
        let (news, reddit) = tokio::join!(news_run, reddit_run);

        let script = self
            .composer
            .compose(news.as_ref(), reddit.as_ref(), topics)
            .await?;
        if script.is_empty() {
            info!(target: "briefing", "empty broadcast script, no audio rendered");
            return Ok(Briefing {
                script,
                audio: None,
                news,
                reddit,
            });
        }

        let audio = self.renderer.render(script.as_str()).await?;
        info!(target: "briefing", path = %audio.path.display(), "briefing ready");
        Ok(Briefing {
            script,
            audio: Some(audio),
            news,
            reddit,
        })
    }
}
