//! Trend chart rendering.
//!
//! Each channel is drawn as a ratatui [`Chart`] with four datasets: the
//! connecting trend line, in-range points, over-threshold points and a
//! horizontal threshold reference line.

use std::time::Duration;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::{App, View};
use crate::data::duration::format_duration;
use crate::data::{ChannelSeries, Severity};

/// Width of the statistics panel in single-channel views.
const STATS_WIDTH: u16 = 28;

/// Render the chart area for the current view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(ref data) = app.frame else {
        render_waiting(frame, app, area);
        return;
    };

    let span = data.span;
    match app.current_view {
        View::Overview => {
            let channels = app.current_view.channels();
            let count = channels.len() as u32;
            let rows = Layout::vertical(channels.iter().map(|_| Constraint::Ratio(1, count)))
                .split(area);

            for (channel, row) in channels.iter().zip(rows.iter()) {
                if let Some(series) = data.channel(*channel) {
                    render_series(frame, app, series, span, *row);
                }
            }
        }
        View::Channel(channel) => {
            let Some(series) = data.channel(channel) else {
                return;
            };
            let columns =
                Layout::horizontal([Constraint::Min(20), Constraint::Length(STATS_WIDTH)])
                    .split(area);
            render_series(frame, app, series, span, columns[0]);
            render_stats(frame, app, series, columns[1]);
        }
    }
}

/// Placeholder shown until the first sample arrives.
fn render_waiting(frame: &mut Frame, app: &App, area: Rect) {
    let text = match app.transport_error {
        Some(ref err) => vec![
            Line::from(Span::styled(
                "No readings received",
                Style::default().fg(app.theme.warning),
            )),
            Line::from(err.as_str()),
        ],
        None => vec![
            Line::from("Waiting for sensor data..."),
            Line::from(Span::styled(
                app.source_description().to_string(),
                Style::default().add_modifier(Modifier::DIM),
            )),
        ],
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));
    let paragraph = Paragraph::new(text)
        .block(block)
        .alignment(ratatui::layout::Alignment::Center);
    frame.render_widget(paragraph, area);
}

/// Draw one channel's trend.
fn render_series(frame: &mut Frame, app: &App, series: &ChannelSeries, span: f64, area: Rect) {
    let x_max = span.max(1.0);
    let y_max = series.axis_bound as f64;
    let threshold = series.threshold as f64;

    let trend = series.coordinates();
    let normal = series.coordinates_with(Severity::Normal);
    let exceeded = series.coordinates_with(Severity::Exceeded);
    let limit_line = [(0.0, threshold), (x_max, threshold)];

    let datasets = vec![
        Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(app.theme.trend))
            .data(&trend),
        Dataset::default()
            .name("limit")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(app.theme.threshold))
            .data(&limit_line),
        Dataset::default()
            .name("normal")
            .marker(Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(app.theme.severity_style(Severity::Normal))
            .data(&normal),
        Dataset::default()
            .name("high")
            .marker(Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(app.theme.severity_style(Severity::Exceeded))
            .data(&exceeded),
    ];

    let latest = series.latest();
    let title_style = latest
        .map(|p| app.theme.severity_style(p.severity))
        .unwrap_or_default();
    let title = Line::from(vec![
        Span::styled(format!(" {} ", series.channel.label()), app.theme.header),
        Span::styled(
            latest
                .map(|p| format!("{} µg/m³ ", p.value))
                .unwrap_or_default(),
            title_style,
        ),
    ]);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let x_axis = Axis::default()
        .style(app.theme.axis)
        .bounds([0.0, x_max])
        .labels(vec![
            Span::raw("0s"),
            Span::raw(format_duration(Duration::from_secs_f64(x_max / 2.0))),
            Span::raw(format_duration(Duration::from_secs_f64(x_max))),
        ]);
    let y_axis = Axis::default()
        .style(app.theme.axis)
        .bounds([0.0, y_max])
        .labels(vec![
            Span::raw("0"),
            Span::styled(
                series.threshold.to_string(),
                Style::default().fg(app.theme.threshold),
            ),
            Span::raw(series.axis_bound.to_string()),
        ]);

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(x_axis)
        .y_axis(y_axis)
        .hidden_legend_constraints((Constraint::Ratio(1, 4), Constraint::Ratio(1, 3)));

    frame.render_widget(chart, area);
}

/// Side panel with aggregate figures for a single channel.
fn render_stats(frame: &mut Frame, app: &App, series: &ChannelSeries, area: Rect) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Threshold  ", bold),
            Span::styled(
                series.threshold.to_string(),
                Style::default().fg(app.theme.threshold),
            ),
        ]),
        Line::from(vec![
            Span::styled("Axis       ", bold),
            Span::raw(format!("0 - {}", series.axis_bound)),
        ]),
        Line::from(""),
    ];

    if let Some(summary) = series.summary() {
        let latest_severity = series.latest().map(|p| p.severity).unwrap_or_default();
        lines.push(Line::from(vec![
            Span::styled("Status     ", bold),
            Span::styled(
                latest_severity.symbol(),
                app.theme.severity_style(latest_severity),
            ),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Samples    ", bold),
            Span::raw(summary.count.to_string()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Min        ", bold),
            Span::raw(summary.min.to_string()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Max        ", bold),
            Span::styled(
                summary.max.to_string(),
                Style::default().fg(app.theme.severity_color(
                    if summary.max > series.threshold {
                        Severity::Exceeded
                    } else {
                        Severity::Normal
                    },
                )),
            ),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Mean       ", bold),
            Span::raw(format!("{:.1}", summary.mean)),
        ]));

        let exceeded_style = if summary.exceeded > 0 {
            app.theme.severity_style(Severity::Exceeded)
        } else {
            Style::default().add_modifier(Modifier::DIM)
        };
        lines.push(Line::from(vec![
            Span::styled("Over limit ", bold),
            Span::styled(
                format!(
                    "{} ({:.0}%)",
                    summary.exceeded,
                    summary.exceeded as f64 * 100.0 / summary.count as f64
                ),
                exceeded_style,
            ),
        ]));
    }

    let block = Block::default()
        .title(" Stats ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
