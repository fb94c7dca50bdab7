//! In-memory entity store.
//!
//! Pure structural edits over cached collections. Nothing here performs I/O
//! and nothing fails for a missing record: a patch racing ahead of the fetch
//! that would have loaded its target is expected and ignored.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;

use crate::api::{EntityKind, ViewScope};

/// Identifies one cached collection.
///
/// View-scoped kinds get one entry per scope; other kinds ignore the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub kind: EntityKind,
  pub scope: Option<ViewScope>,
}

impl CacheKey {
  pub fn new(kind: EntityKind, scope: ViewScope) -> Self {
    Self {
      kind,
      scope: kind.is_view_scoped().then_some(scope),
    }
  }

  pub fn unscoped(kind: EntityKind) -> Self {
    Self { kind, scope: None }
  }
}

/// A cached collection and when it was last fetched.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
  /// Records in server order
  pub records: Vec<Value>,
  /// Set by every successful fetch, cleared by invalidation
  pub last_fetched_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
  /// Whether the entry can be served without a network call.
  ///
  /// With `empty_is_stale`, a fetched-but-empty collection does not count as fresh.
  pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration, empty_is_stale: bool) -> bool {
    let Some(fetched_at) = self.last_fetched_at else {
      return false;
    };
    if empty_is_stale && self.records.is_empty() {
      return false;
    }
    now - fetched_at < window
  }
}

/// All cached collections for one session.
#[derive(Debug, Default)]
pub struct EntityStore {
  entries: HashMap<CacheKey, CacheEntry>,
}

impl EntityStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry> {
    self.entries.get(key)
  }

  /// Snapshot of a collection's records (empty if never fetched).
  pub fn records(&self, key: &CacheKey) -> Vec<Value> {
    self
      .entries
      .get(key)
      .map(|e| e.records.clone())
      .unwrap_or_default()
  }

  pub fn last_fetched_at(&self, key: &CacheKey) -> Option<DateTime<Utc>> {
    self.entries.get(key).and_then(|e| e.last_fetched_at)
  }

  /// Overwrite a collection after a successful list fetch.
  pub fn replace(&mut self, key: CacheKey, records: Vec<Value>) {
    self.replace_at(key, records, Utc::now());
  }

  pub fn replace_at(&mut self, key: CacheKey, records: Vec<Value>, fetched_at: DateTime<Utc>) {
    self.entries.insert(
      key,
      CacheEntry {
        records,
        last_fetched_at: Some(fetched_at),
      },
    );
  }

  /// Shallow-merge `partial` into every cached record of `kind` with this id.
  ///
  /// Returns how many records were patched; zero is not an error.
  pub fn patch_one(&mut self, kind: EntityKind, id: &str, partial: &Value) -> usize {
    let Some(fields) = partial.as_object() else {
      return 0;
    };

    let mut patched = 0;
    for record in self.records_of_kind_mut(kind) {
      if !id_matches(record, id) {
        continue;
      }
      if let Some(target) = record.as_object_mut() {
        for (name, value) in fields {
          target.insert(name.clone(), value.clone());
        }
        patched += 1;
      }
    }
    patched
  }

  /// Add a newly created record to the end of a collection.
  ///
  /// A record whose id is already present is replaced in place.
  pub fn append(&mut self, key: CacheKey, record: Value) {
    let entry = self.entries.entry(key).or_default();
    let existing = record_id(&record).and_then(|id| {
      entry
        .records
        .iter()
        .position(|r| record_id(r).as_deref() == Some(id.as_str()))
    });

    match existing {
      Some(index) => entry.records[index] = record,
      None => entry.records.push(record),
    }
  }

  /// Delete the record with this id from every entry of `kind`.
  pub fn remove(&mut self, kind: EntityKind, id: &str) -> usize {
    let mut removed = 0;
    for entry in self.entries_of_kind_mut(kind) {
      let before = entry.records.len();
      entry.records.retain(|r| !id_matches(r, id));
      removed += before - entry.records.len();
    }
    removed
  }

  /// Clear the fetch timestamp of every entry of `kind`, keeping its records.
  pub fn invalidate(&mut self, kind: EntityKind) {
    for entry in self.entries_of_kind_mut(kind) {
      entry.last_fetched_at = None;
    }
  }

  /// Drop every collection and timestamp.
  pub fn clear_all(&mut self) {
    self.entries.clear();
  }

  fn entries_of_kind_mut(&mut self, kind: EntityKind) -> impl Iterator<Item = &mut CacheEntry> {
    self
      .entries
      .iter_mut()
      .filter(move |(key, _)| key.kind == kind)
      .map(|(_, entry)| entry)
  }

  fn records_of_kind_mut(&mut self, kind: EntityKind) -> impl Iterator<Item = &mut Value> {
    self
      .entries_of_kind_mut(kind)
      .flat_map(|entry| entry.records.iter_mut())
  }
}

/// Extract a record's id. The API uses string ids but some tables still emit numbers.
pub fn record_id(record: &Value) -> Option<String> {
  match record.get("id")? {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn id_matches(record: &Value, id: &str) -> bool {
  record_id(record).as_deref() == Some(id)
}
