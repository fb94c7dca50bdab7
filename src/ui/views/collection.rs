use crate::api::EntityKind;
use crate::ui::renderfns::{field_text, status_color, truncate};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table, TableState};
use serde_json::Value;

const MAX_CELL_WIDTH: usize = 40;

/// Draw one cached collection as a table of its display fields
pub fn draw_collection(
  frame: &mut Frame,
  area: Rect,
  kind: EntityKind,
  records: &[Value],
  selected: Option<usize>,
  loading: bool,
  summary: Option<&str>,
) {
  let title = if loading && records.is_empty() {
    format!(" {} (loading...) ", kind)
  } else {
    format!(" {} ({}) ", kind, records.len())
  };

  let mut block = Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));
  if let Some(summary) = summary {
    block = block.title_bottom(Line::from(format!(" {} ", summary)).right_aligned());
  }

  if records.is_empty() {
    let content = if loading { "" } else { "No records. Press 'r' to refresh." };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let fields = kind.display_fields();

  let header = Row::new(fields.iter().map(|f| column_title(f)))
    .style(Style::default().fg(Color::Cyan).bold());

  let rows = records.iter().map(|record| {
    Row::new(fields.iter().map(|field| {
      let text = truncate(&field_text(record, field), MAX_CELL_WIDTH);
      if *field == "status" {
        let color = status_color(&text);
        Text::styled(text, Style::default().fg(color))
      } else {
        Text::from(text)
      }
    }))
  });

  let widths = vec![Constraint::Ratio(1, fields.len() as u32); fields.len()];

  let table = Table::new(rows, widths)
    .header(header)
    .block(block)
    .row_highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White).bold())
    .highlight_symbol("> ");

  let mut state = TableState::default();
  state.select(selected);

  frame.render_stateful_widget(table, area, &mut state);
}

/// "clientName" -> "Client Name"
fn column_title(field: &str) -> String {
  let mut title = String::with_capacity(field.len() + 4);
  for (i, c) in field.chars().enumerate() {
    if i == 0 {
      title.extend(c.to_uppercase());
    } else if c.is_uppercase() {
      title.push(' ');
      title.push(c);
    } else {
      title.push(c);
    }
  }
  title
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_column_title() {
    assert_eq!(column_title("clientName"), "Client Name");
    assert_eq!(column_title("status"), "Status");
    assert_eq!(column_title("isActive"), "Is Active");
  }
}
