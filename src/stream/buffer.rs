//! Channel buffer - accumulates normalized fragments between render ticks

/// Pending text for one channel, drained by the render scheduler
#[derive(Debug, Default)]
pub struct ChannelBuffer {
    pending: String,
    has_content: bool,
    appended_bytes: usize,
}

impl ChannelBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an already-normalized fragment.
    ///
    /// Until the channel has shown visible content, leading whitespace is
    /// dropped so the view never opens with blank lines. Returns true if this
    /// append gave the channel its first visible content.
    pub fn append(&mut self, fragment: &str) -> bool {
        let accepted = if self.has_content {
            fragment
        } else {
            fragment.trim_start()
        };
        if accepted.is_empty() {
            return false;
        }

        self.pending.push_str(accepted);
        self.appended_bytes += accepted.len();

        let first = !self.has_content;
        self.has_content = true;
        first
    }

    /// Take everything pending, or None if nothing arrived since the last drain
    pub fn drain_if_non_empty(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    /// Whether this channel has received visible content since the last reset
    pub fn has_content(&self) -> bool {
        self.has_content
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total bytes accepted since the last reset
    pub fn appended_bytes(&self) -> usize {
        self.appended_bytes
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.has_content = false;
        self.appended_bytes = 0;
    }
}
