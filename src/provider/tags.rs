//! Split raw model output into thinking and answer text
//!
//! Local reasoning models wrap their output in `<think>…</think>` and
//! `<answer>…</answer>` and finish with `<|im_end|>`. Tags can arrive split
//! across chunks, so a trailing partial tag is held back until the next chunk
//! decides it.

use crate::event::{Channel, StreamEvent};
use regex::Regex;
use std::sync::OnceLock;

const TAGS: [&str; 5] = ["<think>", "</think>", "<answer>", "</answer>", "<|im_end|>"];

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(/?think|/?answer|\|im_end\|)>").expect("valid regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// No tag seen yet; a tagless model's output is the answer
    Untagged,
    Thinking,
    Answer,
    /// Between or after closed sections; dropped
    Closed,
    /// `<|im_end|>` seen; everything after it is dropped
    Ended,
}

impl Section {
    fn channel(self) -> Option<Channel> {
        match self {
            Section::Untagged | Section::Answer => Some(Channel::Answer),
            Section::Thinking => Some(Channel::Thinking),
            Section::Closed | Section::Ended => None,
        }
    }

    fn after(tag: &str) -> Self {
        match tag {
            "<think>" => Section::Thinking,
            "<answer>" => Section::Answer,
            "<|im_end|>" => Section::Ended,
            _ => Section::Closed,
        }
    }
}

#[derive(Debug)]
pub struct TagParser {
    pending: String,
    section: Section,
}

impl Default for TagParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TagParser {
    pub fn new() -> Self {
        Self {
            pending: String::new(),
            section: Section::Untagged,
        }
    }

    /// True once the end-of-message marker has been seen
    pub fn is_ended(&self) -> bool {
        self.section == Section::Ended
    }

    /// Feed a raw chunk, returning the deltas it completes.
    pub fn feed(&mut self, chunk: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_ended() {
            return events;
        }
        self.pending.push_str(chunk);

        while let Some(found) = tag_re().find(&self.pending) {
            let (start, end) = (found.start(), found.end());
            let next = Section::after(found.as_str());
            let before = self.pending[..start].to_string();
            self.pending.drain(..end);
            self.emit(before, &mut events);
            self.section = next;
            if self.is_ended() {
                self.pending.clear();
                return events;
            }
        }

        let keep_from = partial_tag_start(&self.pending);
        let ready: String = self.pending.drain(..keep_from).collect();
        self.emit(ready, &mut events);
        events
    }

    /// Release anything held back. Call once the raw stream is exhausted.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.pending);
        self.emit(rest, &mut events);
        events
    }

    fn emit(&self, text: String, events: &mut Vec<StreamEvent>) {
        if text.is_empty() {
            return;
        }
        if let Some(channel) = self.section.channel() {
            events.push(StreamEvent::delta(channel, text));
        }
    }
}

/// Byte index where a trailing partial tag starts, or `text.len()` if none.
fn partial_tag_start(text: &str) -> usize {
    if let Some(idx) = text.rfind('<') {
        let tail = &text[idx..];
        if TAGS
            .iter()
            .any(|tag| tag.len() > tail.len() && tag.starts_with(tail))
        {
            return idx;
        }
    }
    text.len()
}
