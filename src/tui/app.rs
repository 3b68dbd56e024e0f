use super::keybind::{self, KeyBinding, ScrollKeys};
use crate::config::Config;
use crate::engine::{Engine, Step};
use crate::event::Channel;
use crate::logging;
use crate::stream::ScrollFollower;
use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::{MissedTickBehavior, interval};

/// Pane that scroll keys move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Thinking,
    Answer,
}

/// TUI application state
pub struct App {
    engine: Engine,
    input: String,
    /// Cursor position in chars
    cursor_pos: usize,
    show_thinking: bool,
    focus: Focus,
    thinking_scroll: ScrollFollower,
    answer_scroll: ScrollFollower,
    scroll_keys: ScrollKeys,
    toggle_thinking: KeyBinding,
    toggle_thinking_label: String,
    /// When each in-flight token id was first drawn, for the fade-in
    token_seen: HashMap<u64, Instant>,
    redraw_period: Duration,
    started: Instant,
    /// Something visible changed since the last frame
    dirty: bool,
    should_quit: bool,
}

impl App {
    pub fn new(engine: Engine, cfg: &Config) -> Self {
        let (toggle_thinking, toggle_thinking_label) =
            keybind::load_toggle_thinking_key(&cfg.keybindings);
        Self {
            engine,
            input: String::new(),
            cursor_pos: 0,
            show_thinking: cfg.display.show_thinking,
            focus: Focus::Answer,
            thinking_scroll: ScrollFollower::new(cfg.display.follow),
            answer_scroll: ScrollFollower::new(cfg.display.follow),
            scroll_keys: keybind::load_scroll_keys(&cfg.keybindings),
            toggle_thinking,
            toggle_thinking_label,
            token_seen: HashMap::new(),
            redraw_period: Duration::from_millis(cfg.display.redraw_ms.max(1)),
            started: Instant::now(),
            dirty: true,
            should_quit: false,
        }
    }

    pub async fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        let mut event_stream = EventStream::new();
        let mut redraw_interval = interval(self.redraw_period);
        redraw_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if self.dirty {
                terminal.draw(|frame| super::ui::draw(frame, &mut self))?;
                self.dirty = false;
            }

            if self.should_quit {
                break;
            }

            let streaming = self.engine.is_active();
            tokio::select! {
                _ = redraw_interval.tick() => self.on_redraw_tick(),
                step = self.engine.step(), if streaming => {
                    if let Some(step) = step {
                        self.on_step(step);
                    }
                }
                event = event_stream.next() => {
                    match event {
                        Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                            self.handle_key(key.code, key.modifiers).await;
                            self.dirty = true;
                        }
                        Some(Ok(Event::Paste(text))) => {
                            self.handle_paste(&text);
                            self.dirty = true;
                        }
                        Some(Ok(Event::Resize(..))) => self.dirty = true,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => break,
                    }
                }
            }
        }

        if self.engine.is_active() {
            self.engine.cancel().await;
        }
        Ok(())
    }

    /// Fragments only fill the buffers; the view changes on ticks and phase moves.
    fn on_step(&mut self, step: Step) {
        let visible_change = match step {
            Step::Ticked(report) => report.changed(),
            Step::Fragment { changed } => changed,
            Step::Finished(phase) => {
                logging::debug(&format!("Session finished: {}", phase.label()));
                true
            }
        };
        if visible_change {
            self.track_tokens();
            self.thinking_scroll.follow();
            self.answer_scroll.follow();
            self.dirty = true;
        }
    }

    /// Spinner frames and fade-ins animate without new content.
    fn on_redraw_tick(&mut self) {
        let fading = self
            .token_seen
            .values()
            .any(|seen| seen.elapsed() < super::ui::FADE_IN);
        if self.engine.is_active() || fading {
            self.dirty = true;
        }
    }

    /// Stamp newly visible tokens and forget the ones that folded away.
    fn track_tokens(&mut self) {
        let now = Instant::now();
        let session = self.engine.session();
        let mut live = Vec::new();
        for channel in Channel::ALL {
            live.extend(session.store(channel).in_flight().map(|t| t.id));
        }
        self.token_seen.retain(|id, _| live.contains(id));
        for id in live {
            self.token_seen.entry(id).or_insert(now);
        }
    }

    pub async fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        if self.toggle_thinking.matches(code, modifiers) {
            self.show_thinking = !self.show_thinking;
            if !self.show_thinking {
                self.focus = Focus::Answer;
            }
            return;
        }
        if let Some(amount) = self.scroll_keys.scroll_amount(code, modifiers) {
            let follower = match self.focus {
                Focus::Thinking => &mut self.thinking_scroll,
                Focus::Answer => &mut self.answer_scroll,
            };
            if amount < 0 {
                follower.scroll_up(amount.unsigned_abs() as usize);
            } else {
                follower.scroll_down(amount as usize);
            }
            return;
        }

        match code {
            KeyCode::Esc => {
                if self.engine.is_active() {
                    self.engine.cancel().await;
                    self.token_seen.clear();
                } else {
                    self.input.clear();
                    self.cursor_pos = 0;
                }
            }
            KeyCode::Enter => self.submit_input().await,
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Answer if self.show_thinking => Focus::Thinking,
                    _ => Focus::Answer,
                };
            }
            KeyCode::Backspace => {
                if self.cursor_pos > 0 {
                    let idx = self.byte_index(self.cursor_pos - 1);
                    self.input.remove(idx);
                    self.cursor_pos -= 1;
                }
            }
            KeyCode::Left => self.cursor_pos = self.cursor_pos.saturating_sub(1),
            KeyCode::Right => {
                self.cursor_pos = (self.cursor_pos + 1).min(self.input.chars().count());
            }
            KeyCode::Home => self.cursor_pos = 0,
            KeyCode::End => self.cursor_pos = self.input.chars().count(),
            KeyCode::Char(c)
                if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                let idx = self.byte_index(self.cursor_pos);
                self.input.insert(idx, c);
                self.cursor_pos += 1;
            }
            _ => {}
        }
    }

    fn handle_paste(&mut self, text: &str) {
        // Prompts are single-line
        let text = text.replace(['\r', '\n'], " ");
        let idx = self.byte_index(self.cursor_pos);
        self.input.insert_str(idx, &text);
        self.cursor_pos += text.chars().count();
    }

    async fn submit_input(&mut self) {
        let prompt = self.input.trim().to_string();
        if prompt.is_empty() || self.engine.is_active() {
            return;
        }
        self.input.clear();
        self.cursor_pos = 0;
        self.token_seen.clear();
        self.thinking_scroll.scroll_to_bottom();
        self.answer_scroll.scroll_to_bottom();

        if let Err(e) = self.engine.submit(&prompt).await {
            logging::warn(&format!("Submit rejected: {:#}", e));
        }
    }

    fn byte_index(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(idx, _)| idx)
            .unwrap_or(self.input.len())
    }

    // ========== State for the renderer ==========

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor_pos(&self) -> usize {
        self.cursor_pos
    }

    pub fn show_thinking(&self) -> bool {
        self.show_thinking
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn toggle_thinking_label(&self) -> &str {
        &self.toggle_thinking_label
    }

    pub fn scroll_keys(&self) -> &ScrollKeys {
        &self.scroll_keys
    }

    pub fn scroll_mut(&mut self, channel: Channel) -> &mut ScrollFollower {
        match channel {
            Channel::Thinking => &mut self.thinking_scroll,
            Channel::Answer => &mut self.answer_scroll,
        }
    }

    /// How long a token has been on screen; zero for one not yet stamped
    pub fn token_age(&self, id: u64) -> Duration {
        self.token_seen
            .get(&id)
            .map(|seen| seen.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Clock for spinner frames
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}
