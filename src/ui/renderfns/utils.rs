use chrono::Duration;
use ratatui::prelude::Color;
use serde_json::Value;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a matter or invoice status
pub fn status_color(status: &str) -> Color {
  match status.to_lowercase().as_str() {
    "active" | "paid" => Color::Green,
    "pending" | "draft" | "sent" => Color::Yellow,
    "overdue" => Color::Red,
    "closed" | "void" => Color::DarkGray,
    _ => Color::White,
  }
}

/// Render one field of a raw record as a table cell
pub fn field_text(record: &Value, field: &str) -> String {
  match record.get(field) {
    None | Some(Value::Null) => "-".to_string(),
    Some(Value::String(s)) => s.clone(),
    Some(Value::Bool(true)) => "yes".to_string(),
    Some(Value::Bool(false)) => "no".to_string(),
    Some(other) => other.to_string(),
  }
}

/// Compact age of a cached collection, e.g. "42s", "3m", "2h"
pub fn format_age(age: Duration) -> String {
  let secs = age.num_seconds().max(0);
  if secs < 60 {
    format!("{}s", secs)
  } else if secs < 3600 {
    format!("{}m", secs / 60)
  } else {
    format!("{}h", secs / 3600)
  }
}
