//! Scroll follower - keeps the newest text in view while streaming

use crate::config::FollowMode;

/// Scroll position for one scrollable view, measured in rows from the bottom
#[derive(Debug, Clone)]
pub struct ScrollFollower {
    mode: FollowMode,
    /// (viewport_height, content_height) from the last frame
    viewport: Option<(usize, usize)>,
    offset: usize,
    /// Set when the user scrolls away from the bottom in smart mode
    paused: bool,
}

impl ScrollFollower {
    pub fn new(mode: FollowMode) -> Self {
        Self {
            mode,
            viewport: None,
            offset: 0,
            paused: false,
        }
    }

    /// Record the viewport for this frame and re-clamp the position.
    pub fn mount(&mut self, viewport_height: usize, content_height: usize) {
        // While paused, keep the same top row as content grows underneath.
        if let Some((_, previous)) = self.viewport {
            if self.paused && content_height > previous {
                self.offset += content_height - previous;
            }
        }
        self.viewport = Some((viewport_height, content_height));
        self.offset = self.offset.min(self.max_offset());
        if self.offset == 0 {
            self.paused = false;
        }
    }

    pub fn unmount(&mut self) {
        self.viewport = None;
    }

    /// Call after every visible-content change.
    pub fn follow(&mut self) {
        if self.viewport.is_none() {
            return;
        }
        match self.mode {
            FollowMode::Always => self.scroll_to_bottom(),
            FollowMode::Smart if !self.paused => self.offset = 0,
            FollowMode::Smart => {}
        }
    }

    pub fn scroll_up(&mut self, amount: usize) {
        if self.viewport.is_none() {
            return;
        }
        self.offset = (self.offset + amount).min(self.max_offset());
        if self.offset > 0 && self.mode == FollowMode::Smart {
            self.paused = true;
        }
    }

    pub fn scroll_down(&mut self, amount: usize) {
        if self.viewport.is_none() {
            return;
        }
        self.offset = self.offset.saturating_sub(amount);
        if self.offset == 0 {
            self.paused = false;
        }
    }

    /// Jump to the bottom and resume following (also used on a new submit)
    pub fn scroll_to_bottom(&mut self) {
        self.offset = 0;
        self.paused = false;
    }

    pub fn is_following(&self) -> bool {
        !self.paused
    }

    /// First visible row of the content
    pub fn top_row(&self) -> usize {
        self.max_offset().saturating_sub(self.offset)
    }

    /// Rows hidden below the viewport
    pub fn rows_below(&self) -> usize {
        self.offset
    }

    fn max_offset(&self) -> usize {
        self.viewport
            .map(|(viewport, content)| content.saturating_sub(viewport))
            .unwrap_or(0)
    }
}
