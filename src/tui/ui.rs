use super::app::{App, Focus};
use crate::event::Channel;
use crate::stream::tokens::split_units;
use crate::stream::{ChannelSnapshot, Phase, ScrollFollower, SessionSnapshot};
use ratatui::{prelude::*, widgets::Paragraph};
use std::time::Duration;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

// Minimal color palette
const USER_COLOR: Color = Color::Rgb(138, 180, 248); // Soft blue
const AI_COLOR: Color = Color::Rgb(129, 199, 132); // Soft green
const TEXT_COLOR: Color = Color::Rgb(220, 220, 220);
const THINK_COLOR: Color = Color::Rgb(140, 140, 140);
const DIM_COLOR: Color = Color::Rgb(80, 80, 80);
const ACCENT_COLOR: Color = Color::Rgb(186, 139, 255); // Purple accent
const ERROR_COLOR: Color = Color::Rgb(229, 115, 115);
const SCROLL_COLOR: Color = Color::Rgb(255, 193, 7); // Amber

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Time for a new token to reach its full colour
pub(super) const FADE_IN: Duration = Duration::from_millis(400);

pub fn draw(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let snapshot = app.engine().snapshot();

    let has_thinking = !snapshot.thinking.committed_text.is_empty()
        || !snapshot.thinking.in_flight.is_empty();
    let thinking_height = match (has_thinking, app.show_thinking()) {
        (false, _) => 0,
        (true, false) => 1,
        (true, true) => (area.height * 2 / 5).max(3),
    };

    let available_width = area.width.saturating_sub(4) as usize;
    let input_height = if available_width > 0 {
        ((app.input().chars().count() / available_width) + 1).min(5) as u16
    } else {
        1
    };

    // Layout: prompt + thinking + answer + status + input
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(thinking_height),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(input_height),
        ])
        .split(area);

    draw_prompt(frame, &snapshot, chunks[0]);
    if thinking_height > 0 {
        draw_thinking(frame, app, &snapshot.thinking, chunks[1]);
    }
    draw_answer(frame, app, &snapshot, chunks[2]);
    draw_status(frame, app, &snapshot, chunks[3]);
    draw_input(frame, app, chunks[4]);
}

fn draw_prompt(frame: &mut Frame, snapshot: &SessionSnapshot, area: Rect) {
    let line = match &snapshot.prompt {
        Some(prompt) => Line::from(vec![
            Span::styled("› ", Style::default().fg(USER_COLOR)),
            Span::styled(prompt.clone(), Style::default().fg(USER_COLOR).bold()),
        ]),
        None => Line::from(Span::styled(
            format!("thinkview {}", env!("THINKVIEW_VERSION")),
            Style::default().fg(DIM_COLOR),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_thinking(frame: &mut Frame, app: &mut App, thinking: &ChannelSnapshot, area: Rect) {
    let focused = app.focus() == Focus::Thinking;
    let marker = if app.show_thinking() { "▾" } else { "▸" };
    let mut header = vec![
        Span::styled(
            format!("{} thinking", marker),
            Style::default().fg(if focused { ACCENT_COLOR } else { THINK_COLOR }),
        ),
        Span::styled(
            format!(
                " · {} words · {} to {}",
                word_count(thinking),
                app.toggle_thinking_label(),
                if app.show_thinking() { "hide" } else { "show" }
            ),
            Style::default().fg(DIM_COLOR),
        ),
    ];
    if app.engine().session().is_thinking() {
        header.push(Span::styled(" …", Style::default().fg(ACCENT_COLOR)));
    }
    let header_area = Rect { height: 1, ..area };
    frame.render_widget(Paragraph::new(Line::from(header)), header_area);

    if !app.show_thinking() || area.height < 2 {
        app.scroll_mut(Channel::Thinking).unmount();
        return;
    }

    let body = Rect {
        x: area.x + 2,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height - 1,
    };
    let segments = channel_segments(app, thinking, THINK_COLOR, true);
    let lines = wrap_segments(&segments, body.width.saturating_sub(1) as usize);
    draw_scrolled(frame, lines, body, app.scroll_mut(Channel::Thinking));
}

fn draw_answer(frame: &mut Frame, app: &mut App, snapshot: &SessionSnapshot, area: Rect) {
    let base = if snapshot.phase == Phase::Error {
        ERROR_COLOR
    } else {
        TEXT_COLOR
    };
    let segments = channel_segments(app, &snapshot.answer, base, false);
    let lines = wrap_segments(&segments, area.width.saturating_sub(2) as usize);
    draw_scrolled(frame, lines, area, app.scroll_mut(Channel::Answer));
}

/// Render pre-wrapped lines at the follower's position, with ↑/↓ indicators.
fn draw_scrolled(
    frame: &mut Frame,
    lines: Vec<Line<'static>>,
    area: Rect,
    scroll: &mut ScrollFollower,
) {
    scroll.mount(area.height as usize, lines.len());
    let top = scroll.top_row();
    let below = scroll.rows_below();

    // Slice instead of Paragraph::scroll, whose offset is a u16
    let visible: Vec<Line<'static>> = lines
        .into_iter()
        .skip(top)
        .take(area.height as usize)
        .collect();
    frame.render_widget(Paragraph::new(visible), area);

    if top > 0 {
        let indicator = format!("↑{}", top);
        let indicator_area = Rect {
            x: area.x + area.width.saturating_sub(indicator.len() as u16 + 1),
            y: area.y,
            width: indicator.len() as u16 + 1,
            height: 1,
        };
        frame.render_widget(
            Paragraph::new(Span::styled(indicator, Style::default().fg(DIM_COLOR))),
            indicator_area,
        );
    }
    if below > 0 {
        let indicator = format!("↓{}", below);
        let indicator_area = Rect {
            x: area.x + area.width.saturating_sub(indicator.len() as u16 + 1),
            y: area.y + area.height.saturating_sub(1),
            width: indicator.len() as u16 + 1,
            height: 1,
        };
        frame.render_widget(
            Paragraph::new(Span::styled(indicator, Style::default().fg(SCROLL_COLOR))),
            indicator_area,
        );
    }
}

fn draw_status(frame: &mut Frame, app: &App, snapshot: &SessionSnapshot, area: Rect) {
    let session = app.engine().session();
    let elapsed = session.elapsed().map(|d| d.as_secs_f32()).unwrap_or(0.0);
    let spinner_idx = (app.uptime().as_secs_f32() * 12.5) as usize % SPINNER_FRAMES.len();
    let spinner = SPINNER_FRAMES[spinner_idx];
    let provider = app.engine().provider_name();

    let line = match snapshot.phase {
        Phase::Idle => Line::from(Span::styled(
            format!(
                "{} · Enter send · Esc cancel · {}/{} scroll · Ctrl+C quit",
                provider,
                app.scroll_keys().up_label,
                app.scroll_keys().down_label
            ),
            Style::default().fg(DIM_COLOR),
        )),
        Phase::AwaitingFirstToken => Line::from(vec![
            Span::styled(spinner, Style::default().fg(AI_COLOR)),
            Span::styled(
                format!(" waiting for {}… {:.1}s", provider, elapsed),
                Style::default().fg(DIM_COLOR),
            ),
        ]),
        Phase::StreamingThinking => Line::from(vec![
            Span::styled(spinner, Style::default().fg(ACCENT_COLOR)),
            Span::styled(" thinking…", Style::default().fg(ACCENT_COLOR)),
            Span::styled(format!(" {:.1}s", elapsed), Style::default().fg(DIM_COLOR)),
        ]),
        Phase::StreamingAnswer => Line::from(vec![
            Span::styled(spinner, Style::default().fg(AI_COLOR)),
            Span::styled(
                format!(" answering {:.1}s", elapsed),
                Style::default().fg(DIM_COLOR),
            ),
        ]),
        Phase::Complete => Line::from(Span::styled(
            format!("✓ done in {:.1}s", elapsed),
            Style::default().fg(AI_COLOR),
        )),
        Phase::Cancelled => Line::from(Span::styled(
            "cancelled",
            Style::default().fg(SCROLL_COLOR),
        )),
        Phase::Error => Line::from(Span::styled(
            format!("✗ failed after {:.1}s", elapsed),
            Style::default().fg(ERROR_COLOR),
        )),
    };

    frame.render_widget(Paragraph::new(line), area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let busy = app.engine().is_active();
    let (prompt_str, prompt_style) = if busy {
        ("… ", Style::default().fg(SCROLL_COLOR))
    } else {
        ("> ", Style::default().fg(DIM_COLOR))
    };

    let prompt_len = 2;
    let line_width = (area.width as usize).saturating_sub(prompt_len);
    if line_width == 0 {
        return;
    }

    let chars: Vec<char> = app.input().chars().collect();
    let mut lines: Vec<Line> = Vec::new();
    let mut pos = 0;

    while pos < chars.len() || lines.is_empty() {
        let end = (pos + line_width).min(chars.len());
        let line_text: String = chars[pos..end].iter().collect();

        if lines.is_empty() {
            lines.push(Line::from(vec![
                Span::styled(prompt_str, prompt_style),
                Span::raw(line_text),
            ]));
        } else {
            lines.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        if end == pos {
            break;
        }
        pos = end;
    }

    frame.render_widget(Paragraph::new(lines), area);

    let cursor_line = app.cursor_pos() / line_width;
    let cursor_col = app.cursor_pos() % line_width;
    let cursor_y = area.y + (cursor_line as u16).min(area.height.saturating_sub(1));
    let cursor_x = area.x + prompt_len as u16 + cursor_col as u16;
    frame.set_cursor_position(Position::new(cursor_x, cursor_y));
}

fn word_count(snapshot: &ChannelSnapshot) -> usize {
    let committed = snapshot.committed_text.split_whitespace().count();
    let in_flight = snapshot
        .in_flight
        .iter()
        .filter(|t| !t.text.trim().is_empty())
        .count();
    committed + in_flight
}

/// Committed text in the base colour followed by in-flight tokens fading in.
fn channel_segments(
    app: &App,
    snapshot: &ChannelSnapshot,
    base: Color,
    italic: bool,
) -> Vec<(String, Style)> {
    let mut style = Style::default().fg(base);
    if italic {
        style = style.italic();
    }
    let mut segments = Vec::with_capacity(snapshot.in_flight.len() + 1);
    if !snapshot.committed_text.is_empty() {
        segments.push((snapshot.committed_text.clone(), style));
    }
    for token in &snapshot.in_flight {
        let color = fade_color(base, app.token_age(token.id));
        segments.push((token.text.clone(), style.fg(color)));
    }
    segments
}

/// Interpolate from the background-ish dim colour to `target` over `FADE_IN`.
fn fade_color(target: Color, age: Duration) -> Color {
    let t = (age.as_secs_f32() / FADE_IN.as_secs_f32()).clamp(0.0, 1.0);
    let (Color::Rgb(r0, g0, b0), Color::Rgb(r1, g1, b1)) = (DIM_COLOR, target) else {
        return target;
    };
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Color::Rgb(mix(r0, r1), mix(g0, g1), mix(b0, b1))
}

/// Word-wrap styled text to `width` columns.
///
/// Breaks at whitespace where possible and hard-breaks words longer than a
/// line. Each `\n` ends a line.
pub(crate) fn wrap_segments(segments: &[(String, Style)], width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0usize;

    for (text, style) in segments {
        for unit in split_units(text) {
            if unit == "\n" {
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
                continue;
            }

            let unit_width = unit.width();
            let is_space = unit.chars().all(char::is_whitespace);
            if used > 0 && used + unit_width > width {
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
                if is_space {
                    continue;
                }
            }

            if unit_width <= width {
                current.push(Span::styled(unit.to_string(), *style));
                used += unit_width;
                continue;
            }

            let mut chunk = String::new();
            for c in unit.chars() {
                let char_width = c.width().unwrap_or(0);
                if used > 0 && used + char_width > width {
                    if !chunk.is_empty() {
                        current.push(Span::styled(std::mem::take(&mut chunk), *style));
                    }
                    lines.push(Line::from(std::mem::take(&mut current)));
                    used = 0;
                }
                chunk.push(c);
                used += char_width;
            }
            if !chunk.is_empty() {
                current.push(Span::styled(chunk, *style));
            }
        }
    }

    if !current.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::Engine;
    use crate::provider::ScriptedProvider;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn texts(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn plain(text: &str) -> Vec<(String, Style)> {
        vec![(text.to_string(), Style::default())]
    }

    #[test]
    fn test_wrap_at_word_boundaries() {
        let lines = wrap_segments(&plain("hello world again"), 11);
        assert_eq!(texts(&lines), vec!["hello world", "again"]);
    }

    #[test]
    fn test_wrap_keeps_blank_lines() {
        let lines = wrap_segments(&plain("a\n\nb"), 10);
        assert_eq!(texts(&lines), vec!["a", "", "b"]);
    }

    #[test]
    fn test_wrap_hard_breaks_long_words() {
        let lines = wrap_segments(&plain("abcdefgh"), 3);
        assert_eq!(texts(&lines), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_wrap_counts_wide_chars() {
        let lines = wrap_segments(&plain("日本語です"), 4);
        assert_eq!(texts(&lines), vec!["日本", "語で", "す"]);
    }

    #[test]
    fn test_wrap_across_segments() {
        let segments = vec![
            ("one ".to_string(), Style::default()),
            ("two".to_string(), Style::default().fg(Color::Red)),
            (" three".to_string(), Style::default()),
        ];
        let lines = wrap_segments(&segments, 7);
        assert_eq!(texts(&lines), vec!["one two", "three"]);
    }

    #[test]
    fn test_fade_color_endpoints() {
        assert_eq!(fade_color(TEXT_COLOR, Duration::ZERO), DIM_COLOR);
        assert_eq!(fade_color(TEXT_COLOR, FADE_IN), TEXT_COLOR);
        assert_eq!(fade_color(TEXT_COLOR, Duration::from_secs(5)), TEXT_COLOR);
    }

    #[test]
    fn test_scrolled_view_past_u16_rows() {
        let lines: Vec<Line<'static>> = (0..70_000)
            .map(|i| Line::from(format!("row {}", i)))
            .collect();
        let mut scroll = ScrollFollower::new(crate::config::FollowMode::Smart);
        let mut terminal = Terminal::new(TestBackend::new(20, 4)).unwrap();
        terminal
            .draw(|frame| {
                let area = frame.area();
                draw_scrolled(frame, lines.clone(), area, &mut scroll);
            })
            .unwrap();

        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert_eq!(scroll.top_row(), 69_996);
        assert!(screen.contains("row 69999"));
        assert!(screen.contains("row 69996"));
    }

    #[tokio::test]
    async fn test_draw_shows_both_channels() {
        let cfg = Config::default();
        let provider = Arc::new(ScriptedProvider::new(
            "<think>pondering</think><answer>forty two</answer>",
            Duration::ZERO,
        ));
        let mut engine = Engine::new(provider, &cfg.render);
        engine.submit("meaning?").await.unwrap();
        engine.run_to_end().await;
        let mut app = App::new(engine, &cfg);

        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal.draw(|frame| draw(frame, &mut app)).unwrap();

        let screen: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(screen.contains("meaning?"));
        assert!(screen.contains("pondering"));
        assert!(screen.contains("forty two"));
        assert!(screen.contains("done"));
    }
}
