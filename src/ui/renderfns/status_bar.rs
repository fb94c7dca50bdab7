use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::Mode;

/// Draw the status bar with the input mode and the latest notice
pub fn draw_status_bar(
  frame: &mut Frame,
  area: Rect,
  mode: &Mode,
  command_input: &str,
  notice: Option<&str>,
  fetch_error: Option<&str>,
) {
  let line = match mode {
    Mode::Command => Line::from(vec![
      Span::styled(" COMMAND ", Style::default().fg(Color::Black).bg(Color::Yellow)),
      Span::styled(format!(" :{}", command_input), Style::default().fg(Color::Yellow)),
    ]),
    Mode::Normal => {
      let mut spans = vec![Span::styled(
        " NORMAL ",
        Style::default().fg(Color::Black).bg(Color::Cyan),
      )];
      // Fetch errors win over notices
      if let Some(error) = fetch_error {
        spans.push(Span::styled(
          format!(" stale: {}", error),
          Style::default().fg(Color::Red),
        ));
      } else if let Some(notice) = notice {
        spans.push(Span::styled(format!(" {}", notice), Style::default().fg(Color::White)));
      } else {
        spans.push(Span::styled(
          " j/k:nav  x:close matter  dd:delete  :new/:upload  Esc:dismiss",
          Style::default().fg(Color::DarkGray),
        ));
      }
      Line::from(spans)
    }
  };

  let paragraph = Paragraph::new(line).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}
