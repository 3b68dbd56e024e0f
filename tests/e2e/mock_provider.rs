//! Mock provider for e2e tests
//!
//! Returns pre-scripted StreamEvent sequences for deterministic testing.

use anyhow::Result;
use async_stream::stream;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thinkview::event::StreamEvent;
use thinkview::provider::{EventStream, Provider};

/// One queued response
pub struct MockResponse {
    events: Vec<StreamEvent>,
    /// Delay before each event
    gap: Duration,
    /// Keep the stream open after the last event
    hang: bool,
    /// Yield this error item after the events
    fail_with: Option<String>,
}

impl MockResponse {
    pub fn new(events: Vec<StreamEvent>) -> Self {
        Self {
            events,
            gap: Duration::ZERO,
            hang: false,
            fail_with: None,
        }
    }

    pub fn with_gap(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }
}

pub struct MockProvider {
    responses: Mutex<VecDeque<MockResponse>>,
    prompts: Mutex<Vec<String>>,
    cancels: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        }
    }

    /// Queue a response to be returned on the next complete() call
    pub fn queue_response(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provider for MockProvider {
    async fn complete(&self, prompt: &str) -> Result<EventStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockResponse::new(Vec::new()));

        let stream = stream! {
            for event in response.events {
                if !response.gap.is_zero() {
                    tokio::time::sleep(response.gap).await;
                }
                yield Ok(event);
            }
            if let Some(message) = response.fail_with {
                yield Err(anyhow::anyhow!(message));
            }
            if response.hang {
                futures::future::pending::<()>().await;
            }
        };

        Ok(Box::pin(stream))
    }

    async fn cancel(&self) -> Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
