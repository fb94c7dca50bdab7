mod components;
mod renderfns;
mod views;

use crate::app::{App, Mode};
use ratatui::prelude::*;
use renderfns::HeaderInfo;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  let title = app.title();
  let loading = app.is_loading();
  renderfns::draw_header(
    frame,
    chunks[0],
    &HeaderInfo {
      title: &title,
      kind: app.kind(),
      scope: app.scope(),
      loading,
      last_fetched_at: app.last_fetched_at(),
    },
  );

  let records = app.records();
  let summary = app.summary();
  views::draw_collection(
    frame,
    chunks[1],
    app.kind(),
    &records,
    app.selected_index(records.len()),
    loading,
    summary.as_deref(),
  );

  let fetch_error = app.last_error();
  renderfns::draw_status_bar(
    frame,
    chunks[2],
    app.mode(),
    app.command_input(),
    app.notice(),
    fetch_error.as_deref(),
  );

  if *app.mode() == Mode::Command {
    components::draw_command_overlay(
      frame,
      chunks[1],
      app.command_input(),
      &app.autocomplete_suggestions(),
      app.selected_suggestion(),
    );
  }
}
