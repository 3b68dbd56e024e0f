//! Configuration file support for thinkview
//!
//! Config is loaded from `~/.thinkview/config.toml` (or `$THINKVIEW_HOME/config.toml`)
//! Environment variables override config file settings.

use crate::storage::thinkview_dir;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global config instance (loaded once on first access)
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::load)
}

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Render pacing and in-flight window
    pub render: RenderConfig,

    /// Display/UI configuration
    pub display: DisplayConfig,

    /// Keybinding configuration
    pub keybindings: KeybindingsConfig,

    /// Backend configuration
    pub provider: ProviderConfig,
}

pub const MIN_TICK_MS: u64 = 16;
pub const MAX_TICK_MS: u64 = 250;

/// Render pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Scheduler cadence in milliseconds (default: 60, clamped to 16..=250)
    pub tick_ms: u64,
    /// In-flight tokens kept animating per channel (default: 20)
    pub soft_bound: usize,
    /// Hard cap on in-flight tokens per channel (default: 100)
    pub hard_bound: usize,
    /// Fold typographic characters to ASCII and drop other non-ASCII (default: false)
    pub sanitize_ascii: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tick_ms: 60,
            soft_bound: 20,
            hard_bound: 100,
            sanitize_ascii: false,
        }
    }
}

impl RenderConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.clamp(MIN_TICK_MS, MAX_TICK_MS))
    }

    /// `(soft, hard)` with `1 <= soft <= hard`.
    pub fn bounds(&self) -> (usize, usize) {
        let soft = self.soft_bound.max(1);
        let hard = self.hard_bound.max(soft);
        if soft != self.soft_bound || hard != self.hard_bound {
            crate::logging::warn(&format!(
                "Adjusted render bounds soft={} hard={} to soft={} hard={}",
                self.soft_bound, self.hard_bound, soft, hard
            ));
        }
        (soft, hard)
    }
}

/// How the view follows new content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowMode {
    /// Always jump to the bottom on new content
    Always,
    /// Follow until the user scrolls up; resume at the bottom (default)
    #[default]
    Smart,
}

impl FollowMode {
    pub fn label(&self) -> &'static str {
        match self {
            FollowMode::Always => "always",
            FollowMode::Smart => "smart",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "always" | "force" => Some(FollowMode::Always),
            "smart" | "auto" => Some(FollowMode::Smart),
            _ => None,
        }
    }
}

/// Display/UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show the thinking panel expanded (default: true)
    pub show_thinking: bool,
    /// Scroll following mode (default: smart)
    pub follow: FollowMode,
    /// Redraw period in milliseconds for the terminal (default: 33)
    pub redraw_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_thinking: true,
            follow: FollowMode::Smart,
            redraw_ms: 33,
        }
    }
}

/// Keybinding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeybindingsConfig {
    /// Scroll up key (default: "alt+k")
    pub scroll_up: String,
    /// Scroll down key (default: "alt+j")
    pub scroll_down: String,
    /// Page up key (default: "pageup")
    pub scroll_page_up: String,
    /// Page down key (default: "pagedown")
    pub scroll_page_down: String,
    /// Collapse/expand the thinking panel (default: "ctrl+t")
    pub toggle_thinking: String,
}

impl Default for KeybindingsConfig {
    fn default() -> Self {
        Self {
            scroll_up: "alt+k".to_string(),
            scroll_down: "alt+j".to_string(),
            scroll_page_up: "pageup".to_string(),
            scroll_page_down: "pagedown".to_string(),
            toggle_thinking: "ctrl+t".to_string(),
        }
    }
}

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Local command that generates text from a ChatML prompt on stdin
    pub command: Option<String>,
    /// Extra arguments for `command`
    pub args: Vec<String>,
    /// System prompt wrapped into the ChatML template
    pub system_prompt: String,
    /// Delay between chunks for scripted transcripts (default: 30)
    pub script_chunk_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            system_prompt: "You are a helpful assistant. You first think about the reasoning \
                process as an internal monologue within <think>...</think> tags, and then \
                provide the user with the answer."
                .to_string(),
            script_chunk_delay_ms: 30,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> Option<PathBuf> {
        thinkview_dir().ok().map(|d| d.join("config.toml"))
    }

    /// Load config from file, with environment variable overrides
    pub fn load() -> Self {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        config
    }

    /// Load config from file only (no env overrides)
    fn load_from_file() -> Option<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return None;
        }

        let content = std::fs::read_to_string(&path).ok()?;
        match Self::parse(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                crate::logging::error(&format!("Failed to parse config file: {}", e));
                None
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<Self>(content)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Render
        if let Ok(v) = std::env::var("THINKVIEW_TICK_MS") {
            if let Ok(parsed) = v.trim().parse::<u64>() {
                self.render.tick_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("THINKVIEW_SOFT_BOUND") {
            if let Ok(parsed) = v.trim().parse::<usize>() {
                self.render.soft_bound = parsed;
            }
        }
        if let Ok(v) = std::env::var("THINKVIEW_HARD_BOUND") {
            if let Ok(parsed) = v.trim().parse::<usize>() {
                self.render.hard_bound = parsed;
            }
        }
        if let Ok(v) = std::env::var("THINKVIEW_SANITIZE_ASCII") {
            if let Some(parsed) = parse_env_bool(&v) {
                self.render.sanitize_ascii = parsed;
            }
        }

        // Display
        if let Ok(v) = std::env::var("THINKVIEW_FOLLOW") {
            if let Some(parsed) = FollowMode::parse(&v) {
                self.display.follow = parsed;
            }
        }
        if let Ok(v) = std::env::var("THINKVIEW_SHOW_THINKING") {
            if let Some(parsed) = parse_env_bool(&v) {
                self.display.show_thinking = parsed;
            }
        }

        // Keybindings
        if let Ok(v) = std::env::var("THINKVIEW_SCROLL_UP_KEY") {
            self.keybindings.scroll_up = v;
        }
        if let Ok(v) = std::env::var("THINKVIEW_SCROLL_DOWN_KEY") {
            self.keybindings.scroll_down = v;
        }
        if let Ok(v) = std::env::var("THINKVIEW_SCROLL_PAGE_UP_KEY") {
            self.keybindings.scroll_page_up = v;
        }
        if let Ok(v) = std::env::var("THINKVIEW_SCROLL_PAGE_DOWN_KEY") {
            self.keybindings.scroll_page_down = v;
        }

        // Provider
        if let Ok(v) = std::env::var("THINKVIEW_PROVIDER_COMMAND") {
            let trimmed = v.trim();
            self.provider.command = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> anyhow::Result<PathBuf> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("No config path"))?;

        if let Some(parent) = path.parent() {
            crate::storage::ensure_dir(parent)?;
        }

        let default_content = r#"# thinkview configuration file
# Location: ~/.thinkview/config.toml
#
# Environment variables override these settings (THINKVIEW_TICK_MS, THINKVIEW_FOLLOW, ...).

[render]
# Scheduler cadence in ms (16..250)
tick_ms = 60
# Tokens kept animating per channel before older ones are committed
soft_bound = 20
# Hard cap on animating tokens per channel
hard_bound = 100
# Fold smart quotes/dashes to ASCII and drop other non-ASCII characters
sanitize_ascii = false

[display]
show_thinking = true
# "smart" pauses following when you scroll up, "always" never pauses
follow = "smart"
redraw_ms = 33

[keybindings]
# Supports: ctrl, alt, shift modifiers + any key
scroll_up = "alt+k"
scroll_down = "alt+j"
scroll_page_up = "pageup"
scroll_page_down = "pagedown"
toggle_thinking = "ctrl+t"

[provider]
# Local generator reading a ChatML prompt on stdin, e.g. a llama.cpp CLI
# command = "llama-cli"
# args = ["-m", "/path/to/model.gguf", "-f", "/dev/stdin"]
script_chunk_delay_ms = 30
"#;

        std::fs::write(&path, default_content)?;
        Ok(path)
    }

    /// Get config as a formatted string for display
    pub fn display_string(&self) -> String {
        let path = Self::path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let (soft, hard) = self.render.bounds();

        format!(
            r#"Configuration ({})

Render:
- Tick: {}ms
- Soft bound: {}
- Hard bound: {}
- Sanitize ASCII: {}

Display:
- Show thinking: {}
- Follow: {}
- Redraw: {}ms

Keybindings:
- Scroll up: {}
- Scroll down: {}
- Page up: {}
- Page down: {}
- Toggle thinking: {}

Provider:
- Command: {}
- Script chunk delay: {}ms
"#,
            path,
            self.render.tick_interval().as_millis(),
            soft,
            hard,
            self.render.sanitize_ascii,
            self.display.show_thinking,
            self.display.follow.label(),
            self.display.redraw_ms,
            self.keybindings.scroll_up,
            self.keybindings.scroll_down,
            self.keybindings.scroll_page_up,
            self.keybindings.scroll_page_down,
            self.keybindings.toggle_thinking,
            self.provider.command.as_deref().unwrap_or("(none)"),
            self.provider.script_chunk_delay_ms,
        )
    }
}

fn parse_env_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let cfg = Config::parse(
            r#"
[render]
tick_ms = 80

[display]
follow = "always"
"#,
        )
        .unwrap();
        assert_eq!(cfg.render.tick_ms, 80);
        assert_eq!(cfg.render.soft_bound, 20);
        assert_eq!(cfg.render.hard_bound, 100);
        assert_eq!(cfg.display.follow, FollowMode::Always);
        assert!(cfg.display.show_thinking);
        assert_eq!(cfg.keybindings.toggle_thinking, "ctrl+t");
    }

    #[test]
    fn test_tick_interval_is_clamped() {
        let mut render = RenderConfig::default();
        assert_eq!(render.tick_interval(), Duration::from_millis(60));
        render.tick_ms = 1;
        assert_eq!(render.tick_interval(), Duration::from_millis(MIN_TICK_MS));
        render.tick_ms = 10_000;
        assert_eq!(render.tick_interval(), Duration::from_millis(MAX_TICK_MS));
    }

    #[test]
    fn test_bounds_are_ordered() {
        let render = RenderConfig {
            soft_bound: 0,
            hard_bound: 0,
            ..RenderConfig::default()
        };
        assert_eq!(render.bounds(), (1, 1));

        let render = RenderConfig {
            soft_bound: 50,
            hard_bound: 10,
            ..RenderConfig::default()
        };
        assert_eq!(render.bounds(), (50, 50));
    }

    #[test]
    fn test_default_config_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        // SAFETY: no other test reads or writes THINKVIEW_HOME.
        unsafe {
            std::env::set_var("THINKVIEW_HOME", dir.path());
        }
        let path = Config::create_default_config_file().unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let cfg = Config::parse(&content).unwrap();
        assert_eq!(cfg.render.tick_ms, 60);
        assert_eq!(cfg.display.follow, FollowMode::Smart);
        assert!(cfg.provider.command.is_none());
        unsafe {
            std::env::remove_var("THINKVIEW_HOME");
        }
    }

    #[test]
    fn test_parse_env_bool() {
        assert_eq!(parse_env_bool(" yes "), Some(true));
        assert_eq!(parse_env_bool("off"), Some(false));
        assert_eq!(parse_env_bool("maybe"), None);
    }
}
