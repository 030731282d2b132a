//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::data::Severity;

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    /// Color for readings within their threshold.
    pub normal: Color,
    /// Color for readings above their threshold.
    pub exceeded: Color,
    /// Color of the connecting trend line.
    pub trend: Color,
    /// Color of the threshold reference line.
    pub threshold: Color,
    /// Color for warnings that are not threshold alerts (stalls, save failures).
    pub warning: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for axis labels and titles.
    pub axis: Style,
    /// Style for the active tab.
    pub tab_active: Style,
    /// Style for inactive tabs.
    pub tab_inactive: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            normal: Color::Green,
            exceeded: Color::Red,
            trend: Color::DarkGray,
            threshold: Color::LightRed,
            warning: Color::Yellow,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            axis: Style::default().fg(Color::Gray),
            tab_active: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            normal: Color::Green,
            exceeded: Color::Red,
            trend: Color::Gray,
            threshold: Color::Red,
            warning: Color::Yellow,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            axis: Style::default().fg(Color::DarkGray),
            tab_active: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        // Use terminal-light crate to detect background luminance
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Color for a reading of the given severity.
    pub fn severity_color(&self, severity: Severity) -> Color {
        match severity {
            Severity::Normal => self.normal,
            Severity::Exceeded => self.exceeded,
        }
    }

    /// Get style for a severity
    pub fn severity_style(&self, severity: Severity) -> Style {
        match severity {
            Severity::Normal => Style::default().fg(self.normal),
            Severity::Exceeded => Style::default().fg(self.exceeded).add_modifier(Modifier::BOLD),
        }
    }
}
