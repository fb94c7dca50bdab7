//! View-scope routing.
//!
//! Tracks which scope each view-scoped kind is currently shown in and turns
//! a scope switch into a forced refresh, so a `my` result set is never served
//! for `all` or the reverse.

use std::collections::{HashMap, HashSet};

use crate::api::{EntityKind, ViewScope};

use super::storage::CacheKey;

/// Where a fetch should read and write, and whether it must skip the freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
  pub key: CacheKey,
  pub force_refresh: bool,
}

#[derive(Debug)]
pub struct ScopeRouter {
  default_scope: ViewScope,
  active: HashMap<EntityKind, ViewScope>,
  /// Kinds whose scope was switched outside a fetch and still owe a refresh
  pending: HashSet<EntityKind>,
}

impl ScopeRouter {
  pub fn new(default_scope: ViewScope) -> Self {
    Self {
      default_scope,
      active: HashMap::new(),
      pending: HashSet::new(),
    }
  }

  /// Active scope for a kind, `None` for kinds that are not view-scoped.
  pub fn scope(&self, kind: EntityKind) -> Option<ViewScope> {
    kind
      .is_view_scoped()
      .then(|| self.active.get(&kind).copied().unwrap_or(self.default_scope))
  }

  /// Key holding the collection views currently show for `kind`.
  pub fn active_key(&self, kind: EntityKind) -> CacheKey {
    match self.scope(kind) {
      Some(scope) => CacheKey::new(kind, scope),
      None => CacheKey::unscoped(kind),
    }
  }

  /// Switch the active scope. Returns true if it changed; the next fetch is then forced.
  pub fn set_scope(&mut self, kind: EntityKind, scope: ViewScope) -> bool {
    if !self.switch(kind, scope) {
      return false;
    }
    self.pending.insert(kind);
    true
  }

  /// Resolve a fetch for `kind`, switching the active scope if a different one is requested.
  pub fn route(&mut self, kind: EntityKind, requested: Option<ViewScope>) -> Route {
    if !kind.is_view_scoped() {
      return Route {
        key: CacheKey::unscoped(kind),
        force_refresh: false,
      };
    }

    let switched = requested.is_some_and(|scope| self.switch(kind, scope));
    let owed = self.pending.remove(&kind);

    Route {
      key: self.active_key(kind),
      force_refresh: switched || owed,
    }
  }

  /// Entries a newly created record should appear in.
  ///
  /// For view-scoped kinds that is the active scope plus `all`.
  pub fn append_keys(&self, kind: EntityKind) -> Vec<CacheKey> {
    let active = self.active_key(kind);
    let mut keys = vec![active];
    if kind.is_view_scoped() && active.scope != Some(ViewScope::All) {
      keys.push(CacheKey::new(kind, ViewScope::All));
    }
    keys
  }

  /// Forget every switched scope.
  pub fn reset(&mut self) {
    self.active.clear();
    self.pending.clear();
  }

  fn switch(&mut self, kind: EntityKind, scope: ViewScope) -> bool {
    if !kind.is_view_scoped() || self.scope(kind) == Some(scope) {
      return false;
    }
    self.active.insert(kind, scope);
    true
  }
}
