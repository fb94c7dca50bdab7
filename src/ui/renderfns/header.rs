use chrono::{DateTime, Utc};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::api::{EntityKind, ViewScope};

use super::utils::format_age;

/// What the header shows about the current collection
pub struct HeaderInfo<'a> {
  pub title: &'a str,
  pub kind: EntityKind,
  pub scope: Option<ViewScope>,
  pub loading: bool,
  pub last_fetched_at: Option<DateTime<Utc>>,
}

/// Draw the header bar with title, collection context, and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, info: &HeaderInfo) {
  let separator = || Span::styled("│", Style::default().fg(Color::DarkGray));

  let mut spans = vec![
    Span::styled(format!(" {} ", info.title), Style::default().fg(Color::Cyan).bold()),
    separator(),
    Span::styled(
      format!(" {} ", info.kind),
      Style::default().fg(Color::Yellow).bold(),
    ),
  ];

  if let Some(scope) = info.scope {
    spans.push(separator());
    spans.push(Span::styled(
      format!(" {} ", scope),
      Style::default().fg(Color::Magenta),
    ));
  }

  spans.push(separator());
  spans.push(Span::styled(
    format!(" {} ", freshness_label(info.loading, info.last_fetched_at, Utc::now())),
    Style::default().fg(Color::White),
  ));

  spans.push(Span::raw("  "));
  for (key, label) in [(":", "command"), ("r", "refresh"), ("s", "scope"), ("q", "quit")] {
    spans.push(Span::styled(format!("<{}>", key), Style::default().fg(Color::Cyan)));
    spans.push(Span::styled(
      format!(" {}   ", label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

fn freshness_label(
  loading: bool,
  last_fetched_at: Option<DateTime<Utc>>,
  now: DateTime<Utc>,
) -> String {
  match (loading, last_fetched_at) {
    (true, _) => "loading...".to_string(),
    (false, Some(at)) => format!("fetched {} ago", format_age(now - at)),
    (false, None) => "not loaded".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  #[test]
  fn test_freshness_label() {
    let now = Utc::now();
    assert_eq!(freshness_label(true, Some(now), now), "loading...");
    assert_eq!(
      freshness_label(false, Some(now - Duration::seconds(90)), now),
      "fetched 1m ago"
    );
    assert_eq!(freshness_label(false, None, now), "not loaded");
  }
}
