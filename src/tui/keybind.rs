use crate::config::KeybindingsConfig;
use crossterm::event::{KeyCode, KeyModifiers};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub fn matches(&self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        let (code, modifiers) = normalize_key(code, modifiers);
        let (bind_code, bind_mods) = normalize_key(self.code, self.modifiers);
        code == bind_code && modifiers == bind_mods
    }
}

/// Configurable scroll keybindings
#[derive(Clone, Debug)]
pub struct ScrollKeys {
    pub up: KeyBinding,
    pub down: KeyBinding,
    pub page_up: KeyBinding,
    pub page_down: KeyBinding,
    pub up_label: String,
    pub down_label: String,
}

impl ScrollKeys {
    /// Rows to scroll for a key, negative = up
    pub fn scroll_amount(&self, code: KeyCode, modifiers: KeyModifiers) -> Option<i32> {
        if self.up.matches(code, modifiers) {
            return Some(-3);
        }
        if self.down.matches(code, modifiers) {
            return Some(3);
        }
        if self.page_up.matches(code, modifiers) {
            return Some(-10);
        }
        if self.page_down.matches(code, modifiers) {
            return Some(10);
        }
        None
    }
}

pub fn load_scroll_keys(cfg: &KeybindingsConfig) -> ScrollKeys {
    // Alt+K/J are more terminal compatible than Ctrl+Shift
    let default_up = KeyBinding::new(KeyCode::Char('k'), KeyModifiers::ALT);
    let default_down = KeyBinding::new(KeyCode::Char('j'), KeyModifiers::ALT);
    let default_page_up = KeyBinding::new(KeyCode::PageUp, KeyModifiers::NONE);
    let default_page_down = KeyBinding::new(KeyCode::PageDown, KeyModifiers::NONE);

    let (up, up_label) = parse_or_default(&cfg.scroll_up, default_up, "Alt+K");
    let (down, down_label) = parse_or_default(&cfg.scroll_down, default_down, "Alt+J");
    let (page_up, _) = parse_or_default(&cfg.scroll_page_up, default_page_up, "PageUp");
    let (page_down, _) = parse_or_default(&cfg.scroll_page_down, default_page_down, "PageDown");

    ScrollKeys {
        up,
        down,
        page_up,
        page_down,
        up_label,
        down_label,
    }
}

/// Key that collapses or expands the thinking panel, with its display label
pub fn load_toggle_thinking_key(cfg: &KeybindingsConfig) -> (KeyBinding, String) {
    let fallback = KeyBinding::new(KeyCode::Char('t'), KeyModifiers::CONTROL);
    parse_or_default(&cfg.toggle_thinking, fallback, "Ctrl+T")
}

fn parse_or_default(raw: &str, fallback: KeyBinding, fallback_label: &str) -> (KeyBinding, String) {
    match parse_keybinding(raw) {
        Some(binding) => {
            let label = format_binding(&binding);
            (binding, label)
        }
        None => (fallback, fallback_label.to_string()),
    }
}

fn is_disabled(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "none" | "off" | "disabled"
    )
}

pub fn parse_keybinding(raw: &str) -> Option<KeyBinding> {
    let raw = raw.trim();
    if raw.is_empty() || is_disabled(raw) {
        return None;
    }
    let lower = raw.to_ascii_lowercase();
    let parts: Vec<&str> = lower
        .split('+')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        return None;
    }

    let mut modifiers = KeyModifiers::empty();
    let mut key_part: Option<&str> = None;

    for part in parts {
        match part {
            "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
            "alt" | "option" | "meta" => modifiers |= KeyModifiers::ALT,
            "shift" => modifiers |= KeyModifiers::SHIFT,
            _ => {
                key_part = Some(part);
            }
        }
    }

    let key = key_part?;
    let code = match key {
        "tab" => KeyCode::Tab,
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "space" => KeyCode::Char(' '),
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        _ => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return None,
            }
        }
    };

    Some(KeyBinding { code, modifiers })
}

fn normalize_key(code: KeyCode, modifiers: KeyModifiers) -> (KeyCode, KeyModifiers) {
    match code {
        KeyCode::BackTab => (KeyCode::Tab, modifiers | KeyModifiers::SHIFT),
        // Shifted letters arrive uppercase, with or without SHIFT set
        KeyCode::Char(c) if c.is_ascii_uppercase() => (
            KeyCode::Char(c.to_ascii_lowercase()),
            modifiers | KeyModifiers::SHIFT,
        ),
        _ => (code, modifiers),
    }
}

fn format_binding(binding: &KeyBinding) -> String {
    let mut parts: Vec<String> = Vec::new();
    if binding.modifiers.contains(KeyModifiers::CONTROL) {
        parts.push("Ctrl".to_string());
    }
    if binding.modifiers.contains(KeyModifiers::ALT) {
        parts.push("Alt".to_string());
    }
    if binding.modifiers.contains(KeyModifiers::SHIFT) {
        parts.push("Shift".to_string());
    }

    let key = match binding.code {
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_ascii_uppercase().to_string(),
        _ => "Key".to_string(),
    };

    parts.push(key);
    parts.join("+")
}
