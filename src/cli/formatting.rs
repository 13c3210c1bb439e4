//! Formatting utilities for CLI output.

use crate::provider::ReloadEvent;

/// ANSI color codes for terminal output
pub struct Colors;

impl Colors {
    /// Reset all formatting
    pub const RESET: &'static str = "\x1b[0m";
    /// Bold text
    pub const BOLD: &'static str = "\x1b[1m";
    /// Dim text
    pub const DIM: &'static str = "\x1b[2m";
    /// Red color
    pub const RED: &'static str = "\x1b[31m";
    /// Green color
    pub const GREEN: &'static str = "\x1b[32m";
    /// Yellow color
    pub const YELLOW: &'static str = "\x1b[33m";
}

/// Formats error messages with red styling
pub fn format_error(text: &str) -> String {
    format!("{}{}{}{}", Colors::BOLD, Colors::RED, text, Colors::RESET)
}

/// Formats a value for display: quoted text, or `null` for a present but
/// empty entry.
///
/// # Examples
///
/// ```
/// use registry_config::cli::formatting::format_value;
///
/// assert_eq!(format_value(Some("SqlServer")), "\"SqlServer\"");
/// assert_eq!(format_value(None), "null");
/// ```
pub fn format_value(value: Option<&str>) -> String {
    match value {
        Some(text) => format!("\"{text}\""),
        None => "null".to_string(),
    }
}

/// Formats one `path = value` line. The root's own value shows as `(root)`.
pub fn format_entry(path: &str, value: Option<&str>) -> String {
    let path = if path.is_empty() { "(root)" } else { path };
    format!("{} = {}", path, format_value(value))
}

/// Formats the heading printed for each reload.
pub fn format_reload_header(event: &ReloadEvent, clock: &str) -> String {
    let (color, status) = if event.succeeded {
        (Colors::GREEN, "reloaded")
    } else {
        (Colors::YELLOW, "reload failed, data cleared")
    };

    format!(
        "{}[{}]{} {}{}#{} {}{}",
        Colors::DIM,
        clock,
        Colors::RESET,
        Colors::BOLD,
        color,
        event.sequence,
        status,
        Colors::RESET
    )
}
