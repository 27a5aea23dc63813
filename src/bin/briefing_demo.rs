//! Runs one briefing from the command line.
//!
//! Usage: briefing-demo <news|reddit|both> <topic>...

use anyhow::{bail, Context};
use briefcast::{BriefingConfig, BriefingService, SourceSelection};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(selection) = args.next() else {
        bail!("usage: briefing-demo <news|reddit|both> <topic>...");
    };
    let selection: SourceSelection = selection.parse()?;
    let topics: Vec<String> = args.collect();
    if topics.is_empty() {
        bail!("usage: briefing-demo <news|reddit|both> <topic>...");
    }

    let cfg = BriefingConfig::load_default().context("loading briefing config")?;
    let service = BriefingService::from_config(cfg)?;
    let briefing = service.produce_briefing(&topics, selection).await?;

    for result in [&briefing.news, &briefing.reddit].into_iter().flatten() {
        for (topic, outcome) in result.iter() {
            let mark = if outcome.is_failed() { "failed" } else { "ok" };
            println!("[{}] {topic}: {mark}", result.key());
        }
    }

    match briefing.audio {
        Some(audio) => println!("audio written to {}", audio.path.display()),
        None => println!("no topic produced content; nothing to narrate"),
    }
    Ok(())
}
