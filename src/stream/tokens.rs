//! Display tokens and the bounded per-channel token store
//!
//! Freshly drained text is cut into word, whitespace and newline units so
//! each can be animated on its own. Only a small tail of units stays "in
//! flight"; older units fold into a plain committed string.

use serde::Serialize;
use std::collections::VecDeque;

/// One individually animated unit of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayToken {
    pub id: u64,
    pub text: String,
}

/// Split text into display units.
///
/// Every `\n` becomes its own unit; each line is cut into alternating runs of
/// whitespace and non-whitespace, keeping the whitespace runs. Concatenating
/// the units gives back the input.
pub fn split_units(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut lines = text.split('\n').peekable();
    while let Some(line) = lines.next() {
        split_line(line, &mut units);
        if lines.peek().is_some() {
            units.push("\n");
        }
    }
    units
}

fn split_line<'a>(line: &'a str, out: &mut Vec<&'a str>) {
    let mut start = 0;
    let mut in_whitespace: Option<bool> = None;
    for (idx, c) in line.char_indices() {
        let ws = c.is_whitespace();
        if in_whitespace.is_some_and(|prev| prev != ws) {
            out.push(&line[start..idx]);
            start = idx;
        }
        in_whitespace = Some(ws);
    }
    if start < line.len() {
        out.push(&line[start..]);
    }
}

/// Read-only view of one channel handed to the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelSnapshot {
    pub committed_text: String,
    pub in_flight: Vec<DisplayToken>,
}

impl ChannelSnapshot {
    /// Full channel text: committed followed by the in-flight units
    pub fn text(&self) -> String {
        let mut out = self.committed_text.clone();
        for token in &self.in_flight {
            out.push_str(&token.text);
        }
        out
    }
}

/// In-flight window plus committed text for one channel
#[derive(Debug)]
pub struct TokenStore {
    in_flight: VecDeque<DisplayToken>,
    committed: String,
    soft_bound: usize,
    hard_bound: usize,
}

impl TokenStore {
    /// `soft_bound` is raised to at least 1 and `hard_bound` to at least `soft_bound`.
    pub fn new(soft_bound: usize, hard_bound: usize) -> Self {
        let soft_bound = soft_bound.max(1);
        Self {
            in_flight: VecDeque::new(),
            committed: String::new(),
            soft_bound,
            hard_bound: hard_bound.max(soft_bound),
        }
    }

    /// Append tokens, then enforce the hard bound. Returns how many tokens were folded.
    pub fn push(&mut self, tokens: impl IntoIterator<Item = DisplayToken>) -> usize {
        self.in_flight.extend(tokens);
        self.fold_above(self.hard_bound)
    }

    /// Enforce the soft bound. Returns how many tokens were folded.
    pub fn settle(&mut self) -> usize {
        self.fold_above(self.soft_bound)
    }

    /// Fold down to the soft bound once the window exceeds `bound`.
    fn fold_above(&mut self, bound: usize) -> usize {
        let len = self.in_flight.len();
        if len <= bound {
            return 0;
        }
        let excess = len - self.soft_bound;
        for token in self.in_flight.drain(..excess) {
            self.committed.push_str(&token.text);
        }
        excess
    }

    pub fn reset(&mut self) {
        self.in_flight.clear();
        self.committed.clear();
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn in_flight(&self) -> impl ExactSizeIterator<Item = &DisplayToken> + '_ {
        self.in_flight.iter()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty() && self.committed.is_empty()
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.soft_bound, self.hard_bound)
    }

    /// Committed text followed by the in-flight units
    pub fn text(&self) -> String {
        let mut out = self.committed.clone();
        for token in &self.in_flight {
            out.push_str(&token.text);
        }
        out
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            committed_text: self.committed.clone(),
            in_flight: self.in_flight.iter().cloned().collect(),
        }
    }
}
