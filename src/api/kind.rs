//! Entity kinds served by the record API and the view scopes that narrow them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One cached collection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
  Client,
  Matter,
  TimeEntry,
  Invoice,
  Event,
  Document,
  ApiKey,
  Group,
  MatterType,
}

impl EntityKind {
  #[cfg(test)]
  pub const ALL: [EntityKind; 9] = [
    EntityKind::Client,
    EntityKind::Matter,
    EntityKind::TimeEntry,
    EntityKind::Invoice,
    EntityKind::Event,
    EntityKind::Document,
    EntityKind::ApiKey,
    EntityKind::Group,
    EntityKind::MatterType,
  ];

  /// REST collection path on the record API.
  pub fn path(self) -> &'static str {
    match self {
      EntityKind::Client => "/api/clients",
      EntityKind::Matter => "/api/matters",
      EntityKind::TimeEntry => "/api/time-entries",
      EntityKind::Invoice => "/api/invoices",
      EntityKind::Event => "/api/calendar",
      EntityKind::Document => "/api/documents",
      EntityKind::ApiKey => "/api/api-keys",
      EntityKind::Group => "/api/groups",
      EntityKind::MatterType => "/api/matter-types",
    }
  }

  /// Field a list response wraps its array in, e.g. `{"matters": [...]}`.
  pub fn collection_field(self) -> &'static str {
    match self {
      EntityKind::Client => "clients",
      EntityKind::Matter => "matters",
      EntityKind::TimeEntry => "timeEntries",
      EntityKind::Invoice => "invoices",
      EntityKind::Event => "events",
      EntityKind::Document => "documents",
      EntityKind::ApiKey => "apiKeys",
      EntityKind::Group => "groups",
      EntityKind::MatterType => "matterTypes",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      EntityKind::Client => "Clients",
      EntityKind::Matter => "Matters",
      EntityKind::TimeEntry => "Time Entries",
      EntityKind::Invoice => "Invoices",
      EntityKind::Event => "Calendar",
      EntityKind::Document => "Documents",
      EntityKind::ApiKey => "API Keys",
      EntityKind::Group => "Groups",
      EntityKind::MatterType => "Matter Types",
    }
  }

  /// Whether the server returns a different result set per view scope.
  pub fn is_view_scoped(self) -> bool {
    matches!(
      self,
      EntityKind::Client | EntityKind::Matter | EntityKind::Invoice
    )
  }

  /// Whether mutations produce server-computed fields that a local merge cannot know.
  /// Document uploads derive size, type and extracted metadata on the server.
  pub fn has_derived_fields(self) -> bool {
    matches!(self, EntityKind::Document)
  }

  /// JSON fields shown as columns in the collection browser, in order.
  pub fn display_fields(self) -> &'static [&'static str] {
    match self {
      EntityKind::Client => &["displayName", "type", "email", "isActive"],
      EntityKind::Matter => &["number", "name", "status", "clientName"],
      EntityKind::TimeEntry => &["date", "hours", "description", "billed"],
      EntityKind::Invoice => &["number", "clientName", "total", "status"],
      EntityKind::Event => &["title", "startTime", "type", "location"],
      EntityKind::Document => &["name", "matterName", "type", "size"],
      EntityKind::ApiKey => &["name", "keyPrefix", "lastUsed"],
      EntityKind::Group => &["name", "description"],
      EntityKind::MatterType => &["label", "value", "active"],
    }
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Identity-based qualifier narrowing which records a list fetch returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewScope {
  #[default]
  My,
  All,
}

impl ViewScope {
  /// Value of the `view` query parameter.
  pub fn as_param(self) -> &'static str {
    match self {
      ViewScope::My => "my",
      ViewScope::All => "all",
    }
  }

  pub fn toggle(self) -> Self {
    match self {
      ViewScope::My => ViewScope::All,
      ViewScope::All => ViewScope::My,
    }
  }
}

impl fmt::Display for ViewScope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ViewScope::My => f.write_str("mine"),
      ViewScope::All => f.write_str("all"),
    }
  }
}

impl FromStr for ViewScope {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "my" | "mine" => Ok(ViewScope::My),
      "all" => Ok(ViewScope::All),
      other => Err(format!("unknown view scope '{}' (expected 'my' or 'all')", other)),
    }
  }
}
