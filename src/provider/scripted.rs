//! Replays a tagged transcript as if a model were generating it

use super::tags::TagParser;
use super::{EventStream, Provider};
use crate::event::StreamEvent;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const DEMO_TRANSCRIPT: &str = "<think>
The user wants to see how a reasoning model streams its output.


I should think out loud first. Each word arrives as a separate chunk, so the view has to batch them into frames instead of redrawing for every one.

Old words fold into plain text while the newest ones fade in.
</think>
<answer>
Here is the answer, streamed word by word.

Thinking text goes to the panel above and can be collapsed with Ctrl+T. Press Esc while a response is streaming to cancel it, or type a new prompt and press Enter once it finishes.
</answer><|im_end|>";

pub struct ScriptedProvider {
    label: &'static str,
    transcript: Arc<str>,
    chunk_delay: Duration,
    /// Bumped by `complete` and `cancel`; a replay stops once it no longer matches
    generation: Arc<AtomicU64>,
}

impl ScriptedProvider {
    pub fn new(transcript: impl Into<String>, chunk_delay: Duration) -> Self {
        Self {
            label: "script",
            transcript: Arc::from(transcript.into()),
            chunk_delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_file(path: &Path, chunk_delay: Duration) -> Result<Self> {
        let transcript = crate::storage::read_transcript(path)?;
        Ok(Self::new(transcript, chunk_delay))
    }

    /// Built-in transcript used when no backend is configured
    pub fn demo(chunk_delay: Duration) -> Self {
        Self {
            label: "demo",
            ..Self::new(DEMO_TRANSCRIPT, chunk_delay)
        }
    }
}

/// Cut text into word-sized chunks, each word keeping its trailing whitespace.
fn chunk_words(text: &str) -> Vec<&str> {
    text.split_inclusive(char::is_whitespace).collect()
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(&self, prompt: &str) -> Result<EventStream> {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let transcript = Arc::clone(&self.transcript);
        let delay = self.chunk_delay;
        let (tx, rx) = mpsc::channel::<Result<StreamEvent>>(100);

        crate::logging::debug(&format!(
            "Replaying {} chars for prompt: {}",
            transcript.len(),
            crate::logging::truncate(prompt, 40)
        ));

        tokio::spawn(async move {
            let mut parser = TagParser::new();
            for chunk in chunk_words(&transcript) {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if generation.load(Ordering::SeqCst) != my_generation {
                    crate::logging::debug("Replay cancelled");
                    return;
                }
                for event in parser.feed(chunk) {
                    if tx.send(Ok(event)).await.is_err() {
                        return;
                    }
                }
                if parser.is_ended() {
                    break;
                }
            }

            for event in parser.finish() {
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(Ok(StreamEvent::MessageEnd {
                    stop_reason: Some("end_turn".to_string()),
                }))
                .await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn cancel(&self) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        self.label
    }
}
