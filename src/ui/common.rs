//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, status bar, and help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, View};
use crate::data::duration::format_duration;
use crate::data::Channel;

/// Render the header bar with the newest reading of every channel.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref data) = app.frame else {
        let line = Line::from(vec![
            Span::styled(" AIRWATCH ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("│ No samples yet"),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        return;
    };

    let overall = data.latest_severity();
    let mut spans = vec![
        Span::styled(" ● ", app.theme.severity_style(overall)),
        Span::styled("AIRWATCH ", Style::default().add_modifier(Modifier::BOLD)),
    ];

    for channel in Channel::ALL {
        let value = data.latest.value(channel);
        let severity = app.thresholds.classify(channel, value);
        spans.push(Span::raw("│ "));
        spans.push(Span::raw(format!("{} ", channel.label())));
        spans.push(Span::styled(
            value.to_string(),
            app.theme.severity_style(severity),
        ));
        spans.push(Span::styled(
            format!("/{} ", app.thresholds.limit(channel)),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }

    spans.push(Span::raw("│ "));
    spans.push(Span::styled(
        data.sample_count.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::raw(" samples"));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the tab bar showing available views.
///
/// Highlights the currently active view.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = View::ALL
        .iter()
        .enumerate()
        .map(|(i, view)| Line::from(format!(" {}:{} ", i + 1, view.label())))
        .collect();

    let tabs = Tabs::new(titles)
        .select(app.current_view.index())
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render the status bar at the bottom.
///
/// Shows link state, ingest counters, the last saved record and the
/// available controls. Temporary status messages take precedence.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = "Tab:switch s:save ?:help q:quit";

    if let Some(ref err) = app.transport_error {
        let prefix = if app.transport_closed { "Link closed" } else { "Link" };
        let paragraph = Paragraph::new(format!(" {}: {} | {}", prefix, err, controls))
            .style(Style::default().fg(app.theme.warning));
        frame.render_widget(paragraph, area);
        return;
    }

    let mut parts = vec![app.source_description().to_string()];

    match app.since_last_sample() {
        Some(elapsed) => parts.push(format!("Last sample {} ago", format_duration(elapsed))),
        None => parts.push("Waiting...".to_string()),
    }

    if app.stats.rejected > 0 || app.stats.undecodable > 0 {
        parts.push(format!(
            "Skipped {} unmatched, {} garbled",
            app.stats.rejected, app.stats.undecodable
        ));
    }

    if let Some(ref path) = app.last_record {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        parts.push(format!("Saved {}", name));
    }

    parts.push(controls.to_string());

    let paragraph = Paragraph::new(format!(" {}", parts.join(" | ")))
        .style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay with keyboard shortcuts.
///
/// Displayed as a centered modal on top of the current view.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Navigation",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  Tab/S-Tab   Cycle views"),
        Line::from("  ←/→ h/l     Switch views"),
        Line::from("  1-4         Jump to view"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " Recording",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  s         Save CSV record now"),
        Line::from(""),
        Line::from(vec![Span::styled(
            " General",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from("  ?         Toggle help"),
        Line::from("  q         Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    // Center the help overlay - responsive to terminal size
    let help_width = 40u16.min(area.width.saturating_sub(4));
    let help_height = 18u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(ratatui::widgets::Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
