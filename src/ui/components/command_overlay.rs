use crate::commands::Command;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

const MAX_SUGGESTIONS: usize = 8;

/// Draw the command overlay with autocomplete
pub fn draw_command_overlay(
  frame: &mut Frame,
  area: Rect,
  input: &str,
  suggestions: &[&Command],
  selected_suggestion: usize,
) {
  let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
  let suggestion_count = suggestions.len().min(MAX_SUGGESTIONS);
  let height = (3 + suggestion_count as u16).min(area.height);

  // Position at top-left of content area with small margin
  let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height).intersection(area);

  frame.render_widget(Clear, overlay_area);

  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow))
    .title(" Command ");

  let inner = block.inner(overlay_area);
  frame.render_widget(block, overlay_area);

  if inner.height == 0 {
    return;
  }

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Input line
      Constraint::Min(0),    // Suggestions
    ])
    .split(inner);

  let input_line = Line::from(vec![
    Span::styled(":", Style::default().fg(Color::Yellow)),
    Span::raw(input),
    Span::styled("_", Style::default().fg(Color::Yellow)), // Cursor
  ]);
  frame.render_widget(Paragraph::new(input_line), chunks[0]);

  if suggestions.is_empty() || chunks[1].height == 0 {
    return;
  }

  let items: Vec<ListItem> = suggestions
    .iter()
    .take(MAX_SUGGESTIONS)
    .map(|cmd| {
      ListItem::new(Line::from(vec![
        Span::styled(
          format!("{:<12}", cmd.name),
          Style::default().fg(Color::Cyan),
        ),
        Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
      ]))
    })
    .collect();

  let list =
    List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

  let mut state = ListState::default();
  state.select(Some(selected_suggestion.min(suggestion_count.saturating_sub(1))));

  frame.render_stateful_widget(list, chunks[1], &mut state);
}
