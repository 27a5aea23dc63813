// tests/common/mod.rs
// Fakes for every collaborator seam, shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use briefcast::agent::{
    AgentConnector, AgentMessage, AgentSession, SharedConnector, ToolAgent, ToolSpec,
    ToollessConnector,
};
use briefcast::briefing::SourcePipeline;
use briefcast::errors::{BriefingError, Result};
use briefcast::ingest::{NewsSource, RedditSource, SourceOrchestrator, TopicProcessor};
use briefcast::llm::{GenerationParams, GenerativeModel};
use briefcast::pacing::{ManualClock, RateLimiter, RetryPolicy, SharedClock};
use briefcast::scrape::Scraper;
use briefcast::speech::{SpeechRenderer, SpeechSynthesizer, VoiceSettings};
use briefcast::{BroadcastComposer, BriefingService};

/// Scripted reply: `Err(msg)` is classified like an adapter would (overload by message).
pub type Reply = std::result::Result<String, String>;

fn classify(msg: &str) -> BriefingError {
    BriefingError::from_upstream_message(msg.to_string())
}

fn pop_or(queue: &Mutex<VecDeque<Reply>>, fallback: impl FnOnce() -> String) -> Result<String> {
    match queue.lock().unwrap().pop_front() {
        Some(Ok(s)) => Ok(s),
        Some(Err(e)) => Err(classify(&e)),
        None => Ok(fallback()),
    }
}

// ------------------------------------------------------------
// Generative model
// ------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    pub prompts: Mutex<Vec<String>>,
    pub params: Mutex<Vec<GenerationParams>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_replies(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompt(&self, i: usize) -> String {
        self.prompts.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let n = {
            let mut p = self.prompts.lock().unwrap();
            p.push(prompt.to_string());
            p.len()
        };
        self.params.lock().unwrap().push(*params);
        pop_or(&self.replies, || format!("model reply #{n}"))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

// ------------------------------------------------------------
// Scraper
// ------------------------------------------------------------

pub struct FakeScraper {
    html: String,
    failures: Mutex<VecDeque<Reply>>,
    pub urls: Mutex<Vec<String>>,
}

impl FakeScraper {
    pub fn serving(html: &str) -> Arc<Self> {
        Arc::new(Self {
            html: html.to_string(),
            failures: Mutex::new(VecDeque::new()),
            urls: Mutex::new(Vec::new()),
        })
    }

    /// Scripted results consumed before falling back to `html`.
    pub fn with_script(html: &str, script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            html: html.to_string(),
            failures: Mutex::new(script.into()),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.urls.lock().unwrap().len()
    }
}

#[async_trait]
impl Scraper for FakeScraper {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.urls.lock().unwrap().push(url.to_string());
        let html = self.html.clone();
        pop_or(&self.failures, || html)
    }
}

/// Two headline blocks separated by the sentinel line.
pub const TWO_BLOCK_PAGE: &str = r#"<html><head><script>track()</script></head><body>
<article><h3>Stocks rally as inflation cools</h3><span>Reuters</span><time>1 hour ago</time></article>
<div>More</div>
<article><h3>Tech shares lead the market higher</h3><span>Bloomberg</span></article>
<div>More</div>
</body></html>"#;

// ------------------------------------------------------------
// Tool agent + sessions
// ------------------------------------------------------------

#[derive(Default)]
pub struct FakeAgent {
    replies: Mutex<VecDeque<Reply>>,
    stall: bool,
    pub runs: Mutex<Vec<Vec<AgentMessage>>>,
}

impl FakeAgent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_replies(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        })
    }

    /// Records the run, then never answers.
    pub fn stalling() -> Arc<Self> {
        Arc::new(Self {
            stall: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait]
impl ToolAgent for FakeAgent {
    async fn run(&self, messages: &[AgentMessage]) -> Result<String> {
        let n = {
            let mut r = self.runs.lock().unwrap();
            r.push(messages.to_vec());
            r.len()
        };
        if self.stall {
            std::future::pending::<()>().await;
        }
        pop_or(&self.replies, || format!("agent findings #{n}"))
    }
}

struct FakeSession {
    agent: Arc<FakeAgent>,
    tools: Vec<ToolSpec>,
    closes: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentSession for FakeSession {
    fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    fn agent(&self) -> &dyn ToolAgent {
        &*self.agent
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeConnector {
    pub agent: Arc<FakeAgent>,
    fail_open: Option<String>,
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
    pub drops: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new(agent: Arc<FakeAgent>) -> Arc<Self> {
        Arc::new(Self {
            agent,
            fail_open: None,
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            drops: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn failing(msg: &str) -> Arc<Self> {
        Arc::new(Self {
            agent: FakeAgent::new(),
            fail_open: Some(msg.to_string()),
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            drops: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentConnector for FakeConnector {
    async fn open(&self) -> Result<Box<dyn AgentSession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.fail_open {
            return Err(BriefingError::Connection(msg.clone()));
        }
        Ok(Box::new(FakeSession {
            agent: self.agent.clone(),
            tools: vec![ToolSpec {
                name: "search_engine".into(),
                description: "web search".into(),
                input_schema: serde_json::json!({"type": "object"}),
            }],
            closes: self.closes.clone(),
            drops: self.drops.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

// ------------------------------------------------------------
// Speech
// ------------------------------------------------------------

#[derive(Default)]
pub struct FakeSpeech {
    fail: Option<String>,
    pub texts: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(msg: &str) -> Arc<Self> {
        Arc::new(Self {
            fail: Some(msg.to_string()),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.texts.lock().unwrap().len()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, _voice: &VoiceSettings) -> Result<Vec<u8>> {
        self.texts.lock().unwrap().push(text.to_string());
        match &self.fail {
            Some(msg) => Err(BriefingError::Upstream(msg.clone())),
            None => Ok(format!("ID3{text}").into_bytes()),
        }
    }
}

pub fn mp3_voice() -> VoiceSettings {
    VoiceSettings {
        voice_id: "test-voice".into(),
        model_id: "test-model".into(),
        output_format: "mp3_44100_128".into(),
    }
}

// ------------------------------------------------------------
// Wiring helpers
// ------------------------------------------------------------

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new())
}

/// News orchestrator with the production numbers (5/1s, 3 attempts 2-10s, 1s pause).
pub fn news_orchestrator(
    scraper: Arc<FakeScraper>,
    model: Arc<ScriptedModel>,
    clock: SharedClock,
) -> SourceOrchestrator {
    let source = Arc::new(NewsSource::new(
        scraper,
        model,
        "https://news.google.com/search",
    ));
    let limiter = Arc::new(RateLimiter::new("news", 5, Duration::from_secs(1), clock.clone()));
    let retry = RetryPolicy::new(3, Duration::from_secs(2), Duration::from_secs(10));
    SourceOrchestrator::new(
        TopicProcessor::new(source, limiter, retry, clock.clone()),
        Duration::from_secs(1),
        clock,
    )
}

/// Reddit orchestrator with the production numbers (1/15s, 3 attempts 15-60s, 5s pause).
pub fn reddit_orchestrator(model: Arc<ScriptedModel>, clock: SharedClock) -> SourceOrchestrator {
    let source = Arc::new(RedditSource::new(model, 14, 2));
    let limiter = Arc::new(RateLimiter::new("reddit", 1, Duration::from_secs(15), clock.clone()));
    let retry = RetryPolicy::new(3, Duration::from_secs(15), Duration::from_secs(60));
    SourceOrchestrator::new(
        TopicProcessor::new(source, limiter, retry, clock.clone()),
        Duration::from_secs(5),
        clock,
    )
}

pub struct Harness {
    pub service: BriefingService,
    pub clock: Arc<ManualClock>,
    pub scraper: Arc<FakeScraper>,
    pub news_model: Arc<ScriptedModel>,
    pub reddit_model: Arc<ScriptedModel>,
    pub composer_model: Arc<ScriptedModel>,
    pub reddit_connector: Arc<FakeConnector>,
    pub speech: Arc<FakeSpeech>,
}

pub struct HarnessParts {
    pub scraper: Arc<FakeScraper>,
    pub news_model: Arc<ScriptedModel>,
    pub reddit_model: Arc<ScriptedModel>,
    pub composer_model: Arc<ScriptedModel>,
    pub reddit_connector: Arc<FakeConnector>,
    pub speech: Arc<FakeSpeech>,
}

impl Default for HarnessParts {
    fn default() -> Self {
        Self {
            scraper: FakeScraper::serving(TWO_BLOCK_PAGE),
            news_model: ScriptedModel::new(),
            reddit_model: ScriptedModel::new(),
            composer_model: ScriptedModel::new(),
            reddit_connector: FakeConnector::new(FakeAgent::new()),
            speech: FakeSpeech::new(),
        }
    }
}

/// Full service on fakes and virtual time, writing audio under `out_dir`.
pub fn harness(parts: HarnessParts, out_dir: &Path) -> Harness {
    let clock = manual_clock();
    let shared: SharedClock = clock.clone();

    let toolless: SharedConnector = Arc::new(ToollessConnector);
    let reddit_conn: SharedConnector = parts.reddit_connector.clone();

    let service = BriefingService::new(
        SourcePipeline::new(
            news_orchestrator(parts.scraper.clone(), parts.news_model.clone(), shared.clone()),
            toolless,
        ),
        SourcePipeline::new(
            reddit_orchestrator(parts.reddit_model.clone(), shared),
            reddit_conn,
        ),
        BroadcastComposer::new(parts.composer_model.clone()),
        SpeechRenderer::new(parts.speech.clone(), mp3_voice(), out_dir),
    );

    Harness {
        service,
        clock,
        scraper: parts.scraper,
        news_model: parts.news_model,
        reddit_model: parts.reddit_model,
        composer_model: parts.composer_model,
        reddit_connector: parts.reddit_connector,
        speech: parts.speech,
    }
}
