use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use arboard::Clipboard;
use ratatui::{
    Frame,
    prelude::*,
    style::Style,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::form::{FormState, PANEL_FIELDS, SECRET_FIELDS, panel};
use crate::models::RecordSummary;
use crate::notify::{Notification, NotificationKind};
use crate::startup::StartupState;

const CLIPBOARD_LIFETIME_SECS: u64 = 20;
const COLOR_SAND: Color = Color::Rgb(0xEB, 0xDB, 0xB2);
const COLOR_OLIVE: Color = Color::Rgb(0x98, 0x97, 0x1A);
const COLOR_MOSS: Color = Color::Rgb(0x67, 0x67, 0x1C);
const COLOR_ERROR: Color = Color::Rgb(0xCC, 0x24, 0x1D);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    SecretForm,
    Credentials,
    Records,
}

#[derive(Clone, Copy)]
struct OverlayTheme {
    border: Color,
    title: Color,
    text: Color,
    bg: Color,
}

fn themed_overlay(title: &str) -> OverlayTheme {
    match title {
        "Verify Secret Question" => OverlayTheme {
            border: COLOR_OLIVE,
            title: COLOR_SAND,
            text: COLOR_SAND,
            bg: Color::Rgb(0x1D, 0x21, 0x10),
        },
        "Delete Secrets" => OverlayTheme {
            border: Color::Rgb(0xB3, 0x88, 0x45),
            title: Color::Rgb(0xF0, 0xD8, 0xA8),
            text: COLOR_SAND,
            bg: Color::Rgb(0x2A, 0x1C, 0x11),
        },
        "Add Email and Question" => OverlayTheme {
            border: COLOR_MOSS,
            title: Color::Rgb(0xD8, 0xCB, 0xA6),
            text: COLOR_SAND,
            bg: Color::Rgb(0x16, 0x19, 0x0D),
        },
        "Confirm quit" => OverlayTheme {
            border: Color::Rgb(0xA7, 0xA2, 0x36),
            title: Color::Rgb(0xE6, 0xD8, 0xB2),
            text: COLOR_SAND,
            bg: Color::Rgb(0x25, 0x24, 0x13),
        },
        "Exit Secretsafe" => OverlayTheme {
            border: COLOR_ERROR,
            title: Color::Rgb(0xF0, 0xD8, 0xA8),
            text: COLOR_SAND,
            bg: Color::Rgb(0x2A, 0x1C, 0x11),
        },
        _ => OverlayTheme {
            border: COLOR_MOSS,
            title: COLOR_SAND,
            text: COLOR_SAND,
            bg: Color::Rgb(0x1E, 0x20, 0x12),
        },
    }
}

fn centered_overlay_area(frame_size: Rect, lines: &[String]) -> Rect {
    let maxw = lines.iter().map(|s| s.chars().count()).max().unwrap_or(0) as u16 + 4;
    let maxh = lines.len() as u16 + 2;
    Rect::new(
        (frame_size.width.saturating_sub(maxw)) / 2,
        (frame_size.height.saturating_sub(maxh)) / 2,
        maxw.min(frame_size.width),
        maxh.min(frame_size.height),
    )
}

fn render_overlay(f: &mut Frame<'_>, lines: &[String], title: &str) {
    let area = centered_overlay_area(f.size(), lines);
    let theme = themed_overlay(title);
    let paragraph = Paragraph::new(
        lines
            .iter()
            .map(|l| Line::from(l.as_str()))
            .collect::<Vec<Line>>(),
    )
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                title,
                Style::default()
                    .fg(theme.title)
                    .add_modifier(Modifier::BOLD),
            ))
            .border_style(
                Style::default()
                    .fg(theme.border)
                    .add_modifier(Modifier::BOLD),
            )
            .style(Style::default().bg(theme.bg)),
    );
    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

pub struct ViewState<'a> {
    pub startup: &'a StartupState,
    pub focus: Pane,
    pub secret_form: &'a FormState<SECRET_FIELDS>,
    pub secret_step: usize,
    pub panel_form: &'a FormState<PANEL_FIELDS>,
    pub panel_step: usize,
    pub records: &'a [RecordSummary],
    pub record_idx: usize,
    pub search: &'a str,
    pub search_editing: bool,
    pub busy: bool,
    pub status: String,
    pub overlay: Option<(String, Vec<String>)>,
    pub notifications: &'a [Notification],
}

fn pane_block(title: &str, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(style)
}

fn clip(value: &str, max: usize) -> String {
    let mut out: String = value.chars().take(max).collect();
    if value.chars().count() > max {
        out.push('…');
    }
    out
}

fn field_lines<'a, const N: usize>(
    form: &'a FormState<N>,
    step: usize,
    focused: bool,
    masked: &[usize],
) -> Vec<Line<'a>> {
    let mut lines = Vec::new();
    for idx in 0..N {
        let marker = if focused && idx == step { ">" } else { " " };
        let raw = form.value(idx);
        let shown = if masked.contains(&idx) {
            "*".repeat(raw.chars().count())
        } else {
            clip(raw, 40)
        };
        lines.push(Line::from(format!(
            "{marker} {}: {shown}",
            form.field_name(idx)
        )));
        if let Some(error) = form.error(idx) {
            lines.push(Line::from(Span::styled(
                format!("    {error}"),
                Style::default().fg(COLOR_ERROR),
            )));
        }
    }
    lines
}

fn draw_secret_form(f: &mut Frame<'_>, area: Rect, state: &ViewState) {
    let mut lines = field_lines(
        state.secret_form,
        state.secret_step,
        state.focus == Pane::SecretForm,
        &[],
    );
    lines.push(Line::from(""));
    let action = if state.busy {
        "Encrypting ..."
    } else {
        "Enter advances; last field encrypts. ←/→ cycle format and cloud."
    };
    lines.push(Line::from(Span::styled(
        action,
        Style::default().fg(COLOR_OLIVE),
    )));
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(pane_block("Encrypt", state.focus == Pane::SecretForm));
    f.render_widget(paragraph, area);
}

fn draw_credentials(f: &mut Frame<'_>, area: Rect, state: &ViewState) {
    let focused = state.focus == Pane::Credentials;
    let lines = if state.startup.has_question {
        vec![
            Line::from(vec![
                Span::raw(" GPG Email: "),
                Span::styled(
                    state.startup.email.clone(),
                    Style::default().fg(COLOR_ERROR),
                ),
            ]),
            Line::from(vec![
                Span::raw(" Secret Question: "),
                Span::styled(
                    state.startup.question_masked(),
                    Style::default().fg(COLOR_ERROR),
                ),
            ]),
            Line::from(vec![
                Span::raw(" Answer: "),
                Span::styled("******", Style::default().fg(COLOR_ERROR)),
            ]),
        ]
    } else {
        let mut lines = field_lines(
            state.panel_form,
            state.panel_step,
            focused,
            &[panel::ANSWER, panel::CONFIRM],
        );
        lines.push(Line::from(Span::styled(
            if state.busy {
                "Submitting ..."
            } else {
                "Enter on the last field submits."
            },
            Style::default().fg(COLOR_OLIVE),
        )));
        lines
    };
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(pane_block("Credentials", focused));
    f.render_widget(paragraph, area);
}

fn draw_records(f: &mut Frame<'_>, area: Rect, state: &ViewState) {
    let focused = state.focus == Pane::Records;
    f.render_widget(pane_block("Secrets", focused), area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area.inner(Margin::new(1, 1)));

    let search_style = if state.search_editing {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(COLOR_SAND)
    };
    let search = Paragraph::new(Line::from(vec![
        Span::raw("Search: "),
        Span::styled(state.search.to_string(), search_style),
        Span::raw(if state.search_editing { "▏" } else { "" }),
    ]));
    f.render_widget(search, chunks[0]);

    let items: Vec<ListItem> = if state.records.is_empty() {
        vec![ListItem::new("No secrets")]
    } else {
        state
            .records
            .iter()
            .map(|r| {
                ListItem::new(format!(
                    "{:<4} {:<14} {:<18} {}",
                    r.id,
                    clip(&r.app, 14),
                    clip(&r.desc, 18),
                    r.format
                ))
            })
            .collect()
    };
    let mut list_state = ListState::default();
    if !state.records.is_empty() {
        list_state.select(Some(state.record_idx.min(state.records.len() - 1)));
    }
    let list = List::new(items)
        .highlight_symbol("▶ ")
        .highlight_style(if focused {
            Style::default()
                .fg(Color::Yellow)
                .bg(Color::Rgb(40, 40, 40))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        });
    f.render_stateful_widget(list, chunks[1], &mut list_state);
}

/// Where each notification is drawn: top-right, creation order downwards,
/// newer entries nudged right so older ones stay visible and clickable.
/// Shared with mouse hit-testing.
pub fn notification_areas(frame: Rect, count: usize) -> Vec<Rect> {
    let width: u16 = 46u16.min(frame.width.saturating_sub(4));
    let height: u16 = 3;
    (0..count)
        .map(|i| {
            let shift = (i as u16).min(2);
            let x = frame.width.saturating_sub(width + 2) + shift;
            let y = 1 + i as u16 * height;
            Rect::new(
                x.min(frame.width.saturating_sub(width)),
                y,
                width,
                height.min(frame.height.saturating_sub(y)),
            )
        })
        .collect()
}

fn notification_color(kind: NotificationKind) -> Color {
    match kind {
        NotificationKind::Success => Color::Green,
        NotificationKind::Error => COLOR_ERROR,
        NotificationKind::Info => Color::Cyan,
    }
}

fn draw_notifications(f: &mut Frame<'_>, notifications: &[Notification]) {
    let areas = notification_areas(f.size(), notifications.len());
    for (item, area) in notifications.iter().zip(areas) {
        if area.height == 0 {
            continue;
        }
        let color = if item.leaving {
            Color::DarkGray
        } else {
            notification_color(item.kind)
        };
        let border = if item.hovered {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(color)
        };
        let text = format!("{} {}", item.kind.icon(), clip(&item.message, 40));
        let widget = Paragraph::new(text)
            .style(if item.leaving {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(COLOR_SAND)
            })
            .block(Block::default().borders(Borders::ALL).border_style(border));
        f.render_widget(Clear, area);
        f.render_widget(widget, area);
    }
}

pub fn draw(f: &mut Frame<'_>, state: &ViewState) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(f.size());

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(48), Constraint::Percentage(52)])
        .split(layout[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(1)])
        .split(body[1]);

    draw_secret_form(f, body[0], state);
    draw_credentials(f, right[0], state);
    draw_records(f, right[1], state);

    let footer = Paragraph::new(state.status.clone()).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, layout[1]);

    if let Some((title, lines)) = &state.overlay {
        render_overlay(f, lines, title);
    }

    draw_notifications(f, state.notifications);
}

pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = Clipboard::new().map_err(|e| anyhow!("Clipboard unavailable: {e}"))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| anyhow!("Failed to set clipboard: {e}"))?;
    let mut clip = clipboard;
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(CLIPBOARD_LIFETIME_SECS));
        let _ = clip.set_text(String::new());
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_areas_stack_downwards_in_creation_order() {
        let frame = Rect::new(0, 0, 120, 40);
        let areas = notification_areas(frame, 3);
        assert_eq!(areas.len(), 3);
        assert!(areas[0].y < areas[1].y && areas[1].y < areas[2].y);
        // Newer entries are nudged right, never off-screen.
        assert!(areas[1].x >= areas[0].x);
        for area in &areas {
            assert!(area.x + area.width <= frame.width);
        }
    }

    #[test]
    fn notification_areas_clip_at_the_bottom() {
        let frame = Rect::new(0, 0, 80, 7);
        let areas = notification_areas(frame, 4);
        assert!(areas[3].height < 3);
    }

    #[test]
    fn clip_marks_truncation() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("0123456789abc", 10), "0123456789…");
    }
}
