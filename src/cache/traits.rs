//! Core traits and types for the entity cache.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::api::{EntityKind, GatewayError, ViewScope};

/// Trait for records that live in a cached collection.
///
/// Implementors name their collection kind and expose the server-assigned id.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Collection this record belongs to
  const KIND: EntityKind;

  /// Server-assigned identifier, unique within the collection
  fn id(&self) -> &str;

  fn kind(&self) -> EntityKind {
    Self::KIND
  }
}

/// The remote record API, seen from the cache.
///
/// Records cross this boundary as JSON objects; the cache decodes them into
/// typed entities on read.
#[async_trait]
pub trait RecordGateway: Send + Sync + 'static {
  /// List the collection, narrowed by `scope` for view-scoped kinds.
  async fn list(
    &self,
    kind: EntityKind,
    scope: Option<ViewScope>,
  ) -> Result<Vec<Value>, GatewayError>;

  /// Create a record, returning the server's canonical representation.
  async fn create(&self, kind: EntityKind, payload: Value) -> Result<Value, GatewayError>;

  /// Apply a partial update. Returns the updated record if the server echoes it.
  async fn update(
    &self,
    kind: EntityKind,
    id: &str,
    partial: Value,
  ) -> Result<Option<Value>, GatewayError>;

  async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), GatewayError>;

  /// Upload a file into a matter, returning the created document record.
  async fn upload(
    &self,
    matter_id: &str,
    file_name: &str,
    bytes: Vec<u8>,
  ) -> Result<Value, GatewayError>;
}

/// Caller-supplied options for a fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchParams {
  /// Requested view scope; ignored for kinds that are not view-scoped
  pub scope: Option<ViewScope>,
  /// Skip the freshness check and always hit the gateway
  pub force_refresh: bool,
}

impl FetchParams {
  pub fn forced() -> Self {
    Self {
      scope: None,
      force_refresh: true,
    }
  }

  pub fn scoped(scope: ViewScope) -> Self {
    Self {
      scope: Some(scope),
      force_refresh: false,
    }
  }
}

/// What a fetch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
  /// Entry was fresh; no network call was made
  CacheHit,
  /// Gateway returned `count` records which replaced the entry
  Refreshed { count: usize },
  /// Gateway failed; the entry was left as it was
  Failed { error: String },
  /// Gateway answered after `clear_all`; nothing was stored
  Discarded,
}

impl FetchOutcome {
  pub fn is_cache_hit(&self) -> bool {
    matches!(self, FetchOutcome::CacheHit)
  }
}

/// How a successful mutation is reconciled with the cached collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPolicy {
  /// Patch the returned or submitted fields into the cached records
  Merge,
  /// Clear the collection's fetch timestamp so the next read refetches
  Invalidate,
}

impl MutationPolicy {
  pub fn for_kind(kind: EntityKind) -> Self {
    if kind.has_derived_fields() {
      MutationPolicy::Invalidate
    } else {
      MutationPolicy::Merge
    }
  }
}
