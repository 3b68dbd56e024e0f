//! End-to-end tests for thinkview using a mock provider
//!
//! These drive the engine the way the TUI and the headless runner do,
//! without a terminal or a real model.

mod mock_provider;

use anyhow::Result;
use mock_provider::{MockProvider, MockResponse};
use std::sync::Arc;
use std::time::Duration;
use thinkview::config::RenderConfig;
use thinkview::engine::{Engine, Step};
use thinkview::event::{Channel, StreamEvent};
use thinkview::provider::{CommandProvider, Provider, ScriptedProvider};
use thinkview::stream::Phase;

fn render_config() -> RenderConfig {
    RenderConfig {
        tick_ms: 60,
        soft_bound: 20,
        hard_bound: 100,
        sanitize_ascii: false,
    }
}

fn engine_for(provider: Arc<dyn Provider>) -> Engine {
    Engine::new(provider, &render_config())
}

fn think(text: &str) -> StreamEvent {
    StreamEvent::ThinkingDelta(text.to_string())
}

fn answer(text: &str) -> StreamEvent {
    StreamEvent::TextDelta(text.to_string())
}

fn end() -> StreamEvent {
    StreamEvent::MessageEnd {
        stop_reason: Some("end_turn".to_string()),
    }
}

/// Thinking then answer, both visible at the end
#[tokio::test]
async fn test_thinking_then_answer() -> Result<()> {
    let provider = Arc::new(MockProvider::new());
    provider.queue_response(MockResponse::new(vec![
        think("\n\nLet me "),
        think("add the numbers.\n\n\n\n"),
        answer("The answer "),
        answer("is 4."),
        end(),
    ]));

    let mut engine = engine_for(provider.clone());
    engine.submit("What is 2+2?").await?;

    let mut phases = vec![engine.session().phase()];
    while let Some(step) = engine.step().await {
        let phase = engine.session().phase();
        if phases.last() != Some(&phase) {
            phases.push(phase);
        }
        if matches!(step, Step::Finished(_)) {
            break;
        }
    }

    assert_eq!(
        phases,
        vec![
            Phase::AwaitingFirstToken,
            Phase::StreamingThinking,
            Phase::StreamingAnswer,
            Phase::Complete,
        ]
    );
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.thinking.text(), "Let me add the numbers.\n");
    assert_eq!(snapshot.answer.text(), "The answer is 4.");
    assert_eq!(provider.prompts(), vec!["What is 2+2?"]);
    Ok(())
}

/// Fragments between two ticks become visible together
#[tokio::test(start_paused = true)]
async fn test_fragments_batch_per_tick() -> Result<()> {
    let provider = Arc::new(MockProvider::new());
    let mut events: Vec<StreamEvent> = ["a ", "b ", "c ", "d ", "e "]
        .into_iter()
        .map(answer)
        .collect();
    events.push(end());
    // Fragments at 10..50ms, completion at 60ms; the 55ms tick sees all five.
    provider.queue_response(MockResponse::new(events).with_gap(Duration::from_millis(10)));

    let mut engine = Engine::new(
        provider,
        &RenderConfig {
            tick_ms: 55,
            ..render_config()
        },
    );
    engine.submit("go").await?;

    let mut batches = Vec::new();
    while let Some(step) = engine.step().await {
        match step {
            Step::Ticked(report) if report.answer > 0 => batches.push(report.answer),
            Step::Finished(_) => break,
            _ => {}
        }
    }

    // Ten units ("a", " ", ...) in one batch; nothing left for the final flush.
    assert_eq!(batches, vec![10]);
    assert_eq!(engine.snapshot().answer.text(), "a b c d e ");
    Ok(())
}

/// Cancel mid-stream drops everything; a late completion can't bring it back
#[tokio::test]
async fn test_cancel_mid_stream_then_resubmit() -> Result<()> {
    let provider = Arc::new(MockProvider::new());
    provider.queue_response(
        MockResponse::new(vec![think("some "), answer("words here")]).hanging(),
    );
    provider.queue_response(MockResponse::new(vec![answer("fresh"), end()]));

    let mut engine = engine_for(provider.clone());
    engine.submit("first").await?;
    while engine.session().phase() != Phase::StreamingAnswer {
        engine.step().await;
    }

    assert!(engine.cancel().await);
    assert!(!engine.cancel().await);
    assert_eq!(provider.cancel_count(), 1);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase, Phase::Cancelled);
    assert!(snapshot.thinking.text().is_empty());
    assert!(snapshot.answer.text().is_empty());
    assert!(engine.step().await.is_none());

    engine.submit("second").await?;
    assert_eq!(engine.run_to_end().await, Phase::Complete);
    let snapshot = engine.snapshot();
    assert_eq!(snapshot.answer.text(), "fresh");
    assert!(snapshot.thinking.text().is_empty());
    assert_eq!(snapshot.answer.in_flight[0].id, 1);
    Ok(())
}

/// Backend error in the middle of an answer is shown, and the session ends
#[tokio::test]
async fn test_error_event_mid_answer() -> Result<()> {
    let provider = Arc::new(MockProvider::new());
    provider.queue_response(MockResponse::new(vec![
        think("hmm"),
        answer("Partial answer."),
        StreamEvent::Error {
            message: "context length exceeded".to_string(),
        },
    ]));

    let mut engine = engine_for(provider);
    engine.submit("long prompt").await?;
    assert_eq!(engine.run_to_end().await, Phase::Error);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.thinking.text(), "hmm");
    assert_eq!(
        snapshot.answer.text(),
        "Partial answer.\n\nError: context length exceeded"
    );
    Ok(())
}

/// A failed stream item is a backend error too
#[tokio::test]
async fn test_stream_error_item() -> Result<()> {
    let provider = Arc::new(MockProvider::new());
    provider.queue_response(MockResponse::new(vec![answer("abc")]).failing("pipe closed"));

    let mut engine = engine_for(provider);
    engine.submit("x").await?;
    assert_eq!(engine.run_to_end().await, Phase::Error);
    assert_eq!(engine.snapshot().answer.text(), "abc\n\nError: pipe closed");
    Ok(())
}

/// A large burst in one tick keeps the animated window bounded and loses nothing
#[tokio::test]
async fn test_burst_is_bounded_and_lossless() -> Result<()> {
    let burst: String = (0..500).map(|i| format!("w{} ", i)).collect();
    let provider = Arc::new(MockProvider::new());
    provider.queue_response(MockResponse::new(vec![answer(&burst), end()]));

    let mut engine = engine_for(provider);
    engine.submit("x").await?;
    engine.run_to_end().await;

    let store = engine.session().store(Channel::Answer);
    assert!(store.in_flight_len() <= 20);
    assert_eq!(store.text(), burst);
    Ok(())
}

/// Snapshot JSON as printed by `thinkview run --json`
#[tokio::test]
async fn test_snapshot_json_shape() -> Result<()> {
    let provider = Arc::new(MockProvider::new());
    provider.queue_response(MockResponse::new(vec![think("t"), answer("a"), end()]));

    let mut engine = engine_for(provider);
    engine.submit("p").await?;
    engine.run_to_end().await;

    let json = serde_json::to_value(engine.snapshot())?;
    assert_eq!(json["phase"], "complete");
    assert_eq!(json["prompt"], "p");
    assert_eq!(json["answer"]["in_flight"][0]["text"], "a");
    assert_eq!(json["thinking"]["committed_text"], "");
    Ok(())
}

/// The built-in demo transcript fills both panes
#[tokio::test]
async fn test_demo_transcript() -> Result<()> {
    let provider = Arc::new(ScriptedProvider::demo(Duration::ZERO));
    let mut engine = engine_for(provider);
    engine.submit("show me").await?;
    assert_eq!(engine.run_to_end().await, Phase::Complete);

    let snapshot = engine.snapshot();
    assert!(snapshot.thinking.text().starts_with("The user wants"));
    assert!(snapshot.answer.text().starts_with("Here is the answer"));
    assert!(!snapshot.answer.text().contains("<|im_end|>"));
    Ok(())
}

#[cfg(unix)]
mod command {
    use super::*;

    fn shell(script: &str) -> Arc<dyn Provider> {
        Arc::new(CommandProvider::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
            "You think first.",
        ))
    }

    #[tokio::test]
    async fn test_command_output_is_split_into_channels() -> Result<()> {
        let provider = shell(
            "cat >/dev/null; printf '<think>checking</think>\\n<answer>yes</answer><|im_end|>'",
        );
        let mut engine = engine_for(provider);
        engine.submit("ok?").await?;
        assert_eq!(engine.run_to_end().await, Phase::Complete);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.thinking.text(), "checking");
        assert_eq!(snapshot.answer.text(), "yes");
        Ok(())
    }

    #[tokio::test]
    async fn test_command_receives_chatml_prompt() -> Result<()> {
        // Echo stdin back; parsing stops at the end marker of the system turn.
        let provider = shell("cat");
        let mut engine = engine_for(provider);
        engine.submit("hello there").await?;
        assert_eq!(engine.run_to_end().await, Phase::Complete);

        assert_eq!(
            engine.snapshot().answer.text(),
            "<|im_start|>system\nYou think first.\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_command_failure_surfaces_stderr() -> Result<()> {
        let provider = shell("cat >/dev/null; echo 'model file not found' >&2; exit 3");
        let mut engine = engine_for(provider);
        engine.submit("x").await?;
        assert_eq!(engine.run_to_end().await, Phase::Error);

        let answer = engine.snapshot().answer.text();
        assert!(answer.starts_with("Error: sh exited with status"));
        assert!(answer.contains("model file not found"));
        Ok(())
    }

    #[tokio::test]
    async fn test_command_cancel_kills_child() -> Result<()> {
        let provider = shell("cat >/dev/null; printf '<think>start '; sleep 30; printf 'never'");
        let mut engine = engine_for(provider);
        engine.submit("x").await?;
        while engine.session().phase() != Phase::StreamingThinking {
            engine.step().await;
        }

        let started = std::time::Instant::now();
        assert!(engine.cancel().await);
        assert_eq!(engine.session().phase(), Phase::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
        Ok(())
    }
}
