// tests/broadcast.rs
//
// Composition over the per-source mappings.

mod common;

use briefcast::broadcast::{build_prompt, TOPIC_SEPARATOR};
use briefcast::ingest::{SourceKind, SourceResult, TopicOutcome};
use briefcast::llm::GenerationParams;
use briefcast::BroadcastComposer;

use common::*;

fn summary(s: &str) -> TopicOutcome {
    TopicOutcome::Summary(s.to_string())
}

#[tokio::test]
async fn all_empty_input_makes_no_model_call() {
    let model = ScriptedModel::new();
    let composer = BroadcastComposer::new(model.clone());

    let script = composer.compose(None, None, &["a", "b"]).await.unwrap();
    assert!(script.is_empty());

    let news = SourceResult::from_outcomes(SourceKind::News, [("a", summary(""))]);
    let reddit = SourceResult::from_outcomes(SourceKind::Reddit, [("b", summary("   "))]);
    let script = composer
        .compose(Some(&news), Some(&reddit), &["a", "b"])
        .await
        .unwrap();
    assert!(script.is_empty());

    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn mixed_input_keeps_topic_order_and_sections() {
    let news = SourceResult::from_outcomes(
        SourceKind::News,
        [("A", summary("news A")), ("B", summary("news B"))],
    );
    let reddit = SourceResult::from_outcomes(SourceKind::Reddit, [("B", summary("reddit B"))]);

    let model = ScriptedModel::with_replies(vec![Ok("Tonight's briefing.".into())]);
    let composer = BroadcastComposer::new(model.clone());
    let script = composer
        .compose(Some(&news), Some(&reddit), &["A", "B"])
        .await
        .unwrap();

    assert_eq!(script.as_str(), "Tonight's briefing.");
    assert_eq!(model.calls(), 1);
    assert_eq!(model.params.lock().unwrap()[0], GenerationParams::BROADCAST);

    let prompt = model.prompt(0);
    let expected = format!(
        "TOPIC: A\nOFFICIAL NEWS:\nnews A\n{TOPIC_SEPARATOR}TOPIC: B\nOFFICIAL NEWS:\nnews B\nREDDIT OPINIONS:\nreddit B"
    );
    assert!(prompt.ends_with(&expected), "prompt was:\n{prompt}");
}

#[test]
fn topics_without_content_are_skipped_and_errors_count_as_content() {
    let news = SourceResult::from_outcomes(
        SourceKind::News,
        [
            ("up", TopicOutcome::Failed("Error: upstream error: 500".into())),
            ("down", summary("")),
        ],
    );
    let prompt = build_prompt(Some(&news), None, &["down", "up", "missing"]).unwrap();
    assert!(!prompt.contains("TOPIC: down"));
    assert!(!prompt.contains("TOPIC: missing"));
    assert!(prompt.contains("TOPIC: up\nOFFICIAL NEWS:\nError: upstream error: 500\n"));
}

#[test]
fn reddit_only_topic_has_no_news_section() {
    let reddit = SourceResult::from_outcomes(SourceKind::Reddit, [("r", summary("chatter"))]);
    let prompt = build_prompt(None, Some(&reddit), &["r"]).unwrap();
    assert!(prompt.ends_with("TOPIC: r\nREDDIT OPINIONS:\nchatter"));
    assert!(!prompt.contains("OFFICIAL NEWS"));
}
