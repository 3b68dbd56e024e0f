use serde::{Deserialize, Serialize};

/// One of the two independent text streams a model produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Intermediate reasoning
    Thinking,
    /// Final response
    Answer,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Thinking, Channel::Answer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Thinking => "thinking",
            Channel::Answer => "answer",
        }
    }
}

/// Streaming event from provider
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Reasoning content delta
    ThinkingDelta(String),
    /// Answer content delta
    TextDelta(String),
    /// Generation finished (may have stop reason)
    MessageEnd { stop_reason: Option<String> },
    /// Generation failed
    Error { message: String },
}

impl StreamEvent {
    pub fn delta(channel: Channel, text: impl Into<String>) -> Self {
        match channel {
            Channel::Thinking => StreamEvent::ThinkingDelta(text.into()),
            Channel::Answer => StreamEvent::TextDelta(text.into()),
        }
    }

    /// True for events after which the provider sends nothing more
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::MessageEnd { .. } | StreamEvent::Error { .. })
    }
}
