//! Stream session - lifecycle of one prompt submission
//!
//! The session exclusively owns both channels' buffers and token stores and
//! the shared token id counter. Everything that mutates them goes through
//! the handlers here or through the render scheduler, which borrows the
//! session for the length of a tick.

use super::buffer::ChannelBuffer;
use super::normalize::Normalizer;
use super::scheduler;
use super::tokens::{ChannelSnapshot, TokenStore};
use crate::config::RenderConfig;
use crate::event::{Channel, StreamEvent};
use crate::logging;
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Idle,
    AwaitingFirstToken,
    StreamingThinking,
    StreamingAnswer,
    Complete,
    Cancelled,
    Error,
}

impl Phase {
    /// A request is in flight: fragments, completion and errors are accepted
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Phase::AwaitingFirstToken | Phase::StreamingThinking | Phase::StreamingAnswer
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Cancelled | Phase::Error)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingFirstToken => "waiting",
            Phase::StreamingThinking => "thinking",
            Phase::StreamingAnswer => "answering",
            Phase::Complete => "done",
            Phase::Cancelled => "cancelled",
            Phase::Error => "error",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a request is already in flight ({})", .0.label())]
    Busy(Phase),
}

/// Everything the view needs for one frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub prompt: Option<String>,
    pub thinking: ChannelSnapshot,
    pub answer: ChannelSnapshot,
}

#[derive(Debug)]
pub(super) struct ChannelState {
    pub(super) buffer: ChannelBuffer,
    pub(super) store: TokenStore,
}

impl ChannelState {
    fn new(soft_bound: usize, hard_bound: usize) -> Self {
        Self {
            buffer: ChannelBuffer::new(),
            store: TokenStore::new(soft_bound, hard_bound),
        }
    }

    fn reset(&mut self) {
        self.buffer.reset();
        self.store.reset();
    }
}

pub struct StreamSession {
    id: Option<String>,
    prompt: Option<String>,
    phase: Phase,
    normalizer: Normalizer,
    thinking: ChannelState,
    answer: ChannelState,
    next_token_id: u64,
    started: Option<Instant>,
    finished_after: Option<Duration>,
}

impl StreamSession {
    pub fn new(normalizer: Normalizer, soft_bound: usize, hard_bound: usize) -> Self {
        Self {
            id: None,
            prompt: None,
            phase: Phase::Idle,
            normalizer,
            thinking: ChannelState::new(soft_bound, hard_bound),
            answer: ChannelState::new(soft_bound, hard_bound),
            next_token_id: 0,
            started: None,
            finished_after: None,
        }
    }

    pub fn from_config(render: &RenderConfig) -> Self {
        let (soft, hard) = render.bounds();
        Self::new(Normalizer::new(render.sanitize_ascii), soft, hard)
    }

    // ========== Transitions ==========

    /// Start a new request, discarding everything from the previous one.
    pub fn submit(&mut self, prompt: &str) -> Result<(), SessionError> {
        if self.phase.is_active() {
            return Err(SessionError::Busy(self.phase));
        }

        self.reset_channels();
        let id = crate::id::new_id("ses");
        logging::set_session(&id);
        logging::info(&format!(
            "Submitted prompt ({} chars): {}",
            prompt.chars().count(),
            logging::truncate(prompt, 80)
        ));

        self.id = Some(id);
        self.prompt = Some(prompt.to_string());
        self.phase = Phase::AwaitingFirstToken;
        self.started = Some(Instant::now());
        self.finished_after = None;
        Ok(())
    }

    /// Accept a raw fragment for a channel. Returns true if the phase changed.
    pub fn on_fragment(&mut self, channel: Channel, raw: &str) -> bool {
        if !self.phase.is_active() {
            logging::debug(&format!(
                "Dropped {} fragment while {}",
                channel.as_str(),
                self.phase.label()
            ));
            return false;
        }

        let normalized = self.normalizer.apply(raw);
        self.channel_mut(channel).buffer.append(&normalized);
        self.advance_phase(channel)
    }

    /// Backend finished: flush whatever is still buffered and end the session.
    pub fn complete(&mut self) -> bool {
        if !self.phase.is_active() {
            logging::debug(&format!("Ignored completion while {}", self.phase.label()));
            return false;
        }

        scheduler::flush(self);
        self.finish(Phase::Complete);
        logging::info(&format!(
            "Completed: thinking={}B answer={}B tokens={}",
            self.thinking.buffer.appended_bytes(),
            self.answer.buffer.appended_bytes(),
            self.next_token_id
        ));
        true
    }

    /// Backend failed: show the error as answer text and end the session.
    pub fn fail(&mut self, message: &str) -> bool {
        if !self.phase.is_active() {
            logging::debug(&format!("Ignored error while {}: {}", self.phase.label(), message));
            return false;
        }

        logging::error(&format!("Backend error: {}", message));
        let separator = if self.answer.buffer.has_content() {
            "\n\n"
        } else {
            ""
        };
        let visible = self
            .normalizer
            .apply(&format!("{}Error: {}", separator, message.trim()));
        self.answer.buffer.append(&visible);
        scheduler::flush(self);
        self.finish(Phase::Error);
        true
    }

    /// User cancelled: drop all text. No-op unless a request is in flight.
    pub fn cancel(&mut self) -> bool {
        if !self.phase.is_active() {
            return false;
        }

        self.reset_channels();
        self.finish(Phase::Cancelled);
        logging::info("Cancelled");
        logging::clear_session();
        true
    }

    /// Route a provider event to the matching handler. Returns true if visible state changed.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::ThinkingDelta(text) => self.on_fragment(Channel::Thinking, text),
            StreamEvent::TextDelta(text) => self.on_fragment(Channel::Answer, text),
            StreamEvent::MessageEnd { stop_reason } => {
                if let Some(reason) = stop_reason {
                    logging::debug(&format!("Stop reason: {}", reason));
                }
                self.complete()
            }
            StreamEvent::Error { message } => self.fail(message),
        }
    }

    fn finish(&mut self, phase: Phase) {
        self.phase = phase;
        self.finished_after = self.started.map(|s| s.elapsed());
    }

    fn reset_channels(&mut self) {
        self.thinking.reset();
        self.answer.reset();
        self.next_token_id = 0;
    }

    /// Move out of awaiting/thinking once a channel has visible content.
    pub(super) fn advance_phase(&mut self, channel: Channel) -> bool {
        let has_content = self.channel(channel).buffer.has_content();
        let next = match (self.phase, channel) {
            (Phase::AwaitingFirstToken, Channel::Thinking) if has_content => {
                Phase::StreamingThinking
            }
            (Phase::AwaitingFirstToken | Phase::StreamingThinking, Channel::Answer)
                if has_content =>
            {
                Phase::StreamingAnswer
            }
            _ => return false,
        };
        logging::debug(&format!("Phase {} -> {}", self.phase.label(), next.label()));
        self.phase = next;
        true
    }

    // ========== Internals shared with the scheduler ==========

    pub(super) fn channel(&self, channel: Channel) -> &ChannelState {
        match channel {
            Channel::Thinking => &self.thinking,
            Channel::Answer => &self.answer,
        }
    }

    pub(super) fn channel_mut(&mut self, channel: Channel) -> &mut ChannelState {
        match channel {
            Channel::Thinking => &mut self.thinking,
            Channel::Answer => &mut self.answer,
        }
    }

    pub(super) fn issue_token_id(&mut self) -> u64 {
        self.next_token_id += 1;
        self.next_token_id
    }

    // ========== Read access ==========

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    /// Drives the "currently thinking" indicator
    pub fn is_thinking(&self) -> bool {
        self.phase == Phase::StreamingThinking
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Time since submit, frozen once the session ends
    pub fn elapsed(&self) -> Option<Duration> {
        self.finished_after
            .or_else(|| self.started.map(|s| s.elapsed()))
    }

    pub fn has_content(&self, channel: Channel) -> bool {
        self.channel(channel).buffer.has_content()
    }

    pub fn store(&self, channel: Channel) -> &TokenStore {
        &self.channel(channel).store
    }

    /// Ids issued so far in this session
    pub fn tokens_issued(&self) -> u64 {
        self.next_token_id
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            prompt: self.prompt.clone(),
            thinking: self.thinking.store.snapshot(),
            answer: self.answer.store.snapshot(),
        }
    }
}
