use crate::api::types::{Client, Document, Group, Matter, MatterStatus, MatterType, MatterUpdate};
use crate::api::{ApiClient, EntityKind, ViewScope};
use crate::cache::{record_id, Entity, EntityCache, FetchOutcome, FetchParams};
use crate::commands::{self, Command, CommandAction};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::summary;
use crate::ui;
use chrono::{DateTime, Utc};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use serde_json::{json, Value};
use std::io::stdout;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
}

/// Two-step delete: the first press arms a record, a second press on the same record confirms
#[derive(Debug, Default)]
struct PendingDelete {
  armed: Option<(EntityKind, String)>,
}

impl PendingDelete {
  /// Returns true when this press confirms the delete
  fn press(&mut self, kind: EntityKind, id: String) -> bool {
    let target = (kind, id);
    if self.armed.as_ref() == Some(&target) {
      self.armed = None;
      true
    } else {
      self.armed = Some(target);
      false
    }
  }

  fn cancel(&mut self) {
    self.armed = None;
  }
}

/// Payload for `:new <name>`, or `None` for kinds that need more than a name
fn creation_payload(kind: EntityKind, name: &str) -> Option<Value> {
  match kind {
    EntityKind::Client => Some(json!({ "displayName": name, "isActive": true })),
    EntityKind::Matter => Some(json!({ "name": name, "status": "active" })),
    EntityKind::Group => Some(json!({ "name": name })),
    EntityKind::MatterType => {
      let value = name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");
      Some(json!({ "label": name, "value": value, "active": true }))
    }
    _ => None,
  }
}

/// Main application state
pub struct App {
  /// Collection currently browsed
  kind: EntityKind,

  /// Selected row in the collection
  selected: usize,

  /// Current input mode
  mode: Mode,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  /// Last background outcome worth telling the user about
  notice: Option<String>,

  /// Record awaiting a second `d`
  pending_delete: PendingDelete,

  /// Application configuration
  config: Config,

  /// Shared entity cache
  cache: EntityCache<ApiClient>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: Config, cache: EntityCache<ApiClient>) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();

    Self {
      kind: EntityKind::Matter,
      selected: 0,
      mode: Mode::Normal,
      command_input: String::new(),
      selected_suggestion: 0,
      notice: None,
      pending_delete: PendingDelete::default(),
      config,
      cache,
      event_tx: tx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();
    self.watch_cache();

    // Initial data load
    self.fetch(FetchParams::default());

    // Main loop
    let result = async {
      while !self.should_quit {
        terminal.draw(|frame| ui::draw(frame, self))?;

        if let Some(event) = events.next().await {
          self.handle_event(event);
        }
      }
      Ok::<(), color_eyre::Report>(())
    }
    .await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  /// Redraw whenever the cache changes, not only on the next tick
  fn watch_cache(&self) {
    let mut revisions = self.cache.subscribe();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      while revisions.changed().await.is_ok() {
        if tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {} // UI refresh happens automatically
      Event::Notice(msg) => self.notice = Some(msg),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    if key.code != KeyCode::Char('d') {
      self.pending_delete.cancel();
    }

    match key.code {
      // Quit
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      // Navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Esc => self.notice = None,

      // Cache actions
      KeyCode::Char('r') => self.fetch(FetchParams::forced()),
      KeyCode::Char('s') => {
        if let Some(scope) = self.cache.scope(self.kind) {
          self.cache.set_scope(self.kind, scope.toggle());
          self.selected = 0;
          self.fetch(FetchParams::default());
        }
      }
      KeyCode::Char('x') => self.close_selected_matter(),
      KeyCode::Char('d') => self.delete_selected(),

      // Mode switches
      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
      }

      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0; // Reset selection on input change
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0; // Reset selection on input change
      }
      _ => {}
    }
  }

  fn execute_command(&mut self) {
    let Some(cmd) = commands::resolve(&self.command_input, self.selected_suggestion) else {
      self.notice = Some(format!("Unknown command: {}", self.command_input.trim()));
      self.command_input.clear();
      return;
    };
    let argument = commands::split_input(&self.command_input)
      .1
      .map(str::to_string);
    debug!(command = cmd.name, "executing command");

    match cmd.action {
      CommandAction::Browse(kind) => {
        self.kind = kind;
        self.selected = 0;
        self.fetch(FetchParams::default());
      }
      CommandAction::Scope(scope) => {
        if self.kind.is_view_scoped() {
          self.switch_scope(scope);
        } else {
          self.notice = Some(format!("{} are not scoped", self.kind));
        }
      }
      CommandAction::Create => match argument {
        Some(name) => self.create_record(&name),
        None => self.notice = Some("Usage: new <name>".to_string()),
      },
      CommandAction::Upload => match argument {
        Some(path) => self.upload_to_selected_matter(PathBuf::from(path)),
        None => self.notice = Some("Usage: upload <path>".to_string()),
      },
      CommandAction::Refresh => self.fetch(FetchParams::forced()),
      CommandAction::Logout => {
        info!("logging out, clearing cached collections");
        self.cache.clear_all();
        self.selected = 0;
        self.notice = Some("Session cleared".to_string());
        self.fetch(FetchParams::default());
      }
      CommandAction::Quit => self.should_quit = true,
    }
    self.command_input.clear();
  }

  fn switch_scope(&mut self, scope: ViewScope) {
    self.selected = 0;
    self.fetch(FetchParams::scoped(scope));
  }

  /// Fetch the current collection in the background
  fn fetch(&self, params: FetchParams) {
    let cache = self.cache.clone();
    let tx = self.event_tx.clone();
    let kind = self.kind;

    tokio::spawn(async move {
      let outcome = cache.fetch_kind(kind, params).await;
      debug!(kind = %kind, cache_hit = outcome.is_cache_hit(), "fetch finished");
      if let FetchOutcome::Failed { error } = outcome {
        let _ = tx.send(Event::Notice(format!("Failed to load {}: {}", kind, error)));
      }
    });
  }

  fn create_record(&mut self, name: &str) {
    let Some(payload) = creation_payload(self.kind, name) else {
      self.notice = Some(format!("{} cannot be created from the console", self.kind));
      return;
    };

    match self.kind {
      EntityKind::Client => self.spawn_add::<Client>(payload),
      EntityKind::Matter => self.spawn_add::<Matter>(payload),
      EntityKind::Group => self.spawn_add::<Group>(payload),
      EntityKind::MatterType => self.spawn_add::<MatterType>(payload),
      _ => {}
    }
  }

  /// Create in the background; the record shows up without a refetch
  fn spawn_add<T: Entity>(&self, payload: Value) {
    let cache = self.cache.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let notice = match cache.add::<T, _>(&payload).await {
        Ok(record) => format!("Created {} record {}", record.kind(), record.id()),
        Err(e) => format!("Failed to create {} record: {}", T::KIND, e),
      };
      let _ = tx.send(Event::Notice(notice));
    });
  }

  fn upload_to_selected_matter(&mut self, path: PathBuf) {
    if self.kind != EntityKind::Matter {
      self.notice = Some("Select a matter to upload into".to_string());
      return;
    }
    let Some(matter_id) = self.selected_record().as_ref().and_then(record_id) else {
      self.notice = Some("Select a matter to upload into".to_string());
      return;
    };
    let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
      self.notice = Some(format!("Not a file: {}", path.display()));
      return;
    };

    let cache = self.cache.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
          let _ = tx.send(Event::Notice(format!("Failed to read {}: {}", path.display(), e)));
          return;
        }
      };

      let notice = match cache.upload_document(&matter_id, &file_name, bytes).await {
        Ok(document) => {
          // The documents collection was invalidated; reload it for the next visit
          cache.fetch::<Document>(FetchParams::default()).await;
          format!("Uploaded {} to matter {}", document.name, matter_id)
        }
        Err(e) => format!("Failed to upload {}: {}", file_name, e),
      };
      let _ = tx.send(Event::Notice(notice));
    });
  }

  fn close_selected_matter(&mut self) {
    if self.kind != EntityKind::Matter {
      return;
    }
    let Some(id) = self.selected_record().as_ref().and_then(record_id) else {
      return;
    };

    let cache = self.cache.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let partial = MatterUpdate {
        status: Some(MatterStatus::Closed),
        ..MatterUpdate::default()
      };
      let notice = match cache.update::<Matter, _>(&id, &partial).await {
        Ok(()) => format!("Closed matter {}", id),
        Err(e) => format!("Failed to close matter {}: {}", id, e),
      };
      let _ = tx.send(Event::Notice(notice));
    });
  }

  fn delete_selected(&mut self) {
    let Some(id) = self.selected_record().as_ref().and_then(record_id) else {
      return;
    };
    if !self.pending_delete.press(self.kind, id.clone()) {
      self.notice = Some(format!("Press d again to delete {}", id));
      return;
    }

    let cache = self.cache.clone();
    let tx = self.event_tx.clone();
    let kind = self.kind;

    tokio::spawn(async move {
      let notice = match cache.delete_kind(kind, &id).await {
        Ok(()) => format!("Deleted {} record {}", kind, id),
        Err(e) => format!("Failed to delete {}: {}", id, e),
      };
      let _ = tx.send(Event::Notice(notice));
    });
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.records().len();
    if len > 0 {
      self.selected = (self.selected.min(len - 1) as i32 + delta).rem_euclid(len as i32) as usize;
    }
  }

  fn selected_record(&self) -> Option<Value> {
    let records = self.records();
    let index = self.selected_index(records.len())?;
    records.into_iter().nth(index)
  }

  // Accessors for UI rendering
  pub fn kind(&self) -> EntityKind {
    self.kind
  }

  pub fn records(&self) -> Vec<Value> {
    self.cache.raw_records(self.kind)
  }

  /// Selection clamped to the current collection, which may have shrunk
  pub fn selected_index(&self, len: usize) -> Option<usize> {
    (len > 0).then(|| self.selected.min(len - 1))
  }

  pub fn scope(&self) -> Option<ViewScope> {
    self.cache.scope(self.kind)
  }

  pub fn is_loading(&self) -> bool {
    self.cache.is_loading(self.kind)
  }

  pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
    self.cache.last_fetched_at(self.kind)
  }

  pub fn last_error(&self) -> Option<String> {
    self.cache.last_error(self.kind)
  }

  /// Roll-up of the typed records on screen
  pub fn summary(&self) -> Option<String> {
    summary::summarize(&self.cache, self.kind)
  }

  pub fn notice(&self) -> Option<&str> {
    self.notice.as_deref()
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  /// Header title, falling back to the API host
  pub fn title(&self) -> String {
    match &self.config.title {
      Some(title) => title.clone(),
      None => self
        .cache
        .gateway()
        .base_url()
        .host_str()
        .unwrap_or("caseload")
        .to_string(),
    }
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}
