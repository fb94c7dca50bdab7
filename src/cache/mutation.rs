//! Mutations that go through the gateway and are reflected in cached collections.
//!
//! The store is only touched after the gateway call succeeds, so a failed
//! mutation leaves every collection exactly as it was. Nothing is retried.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::types::Document;
use crate::api::{EntityKind, GatewayError};

use super::layer::{lock, EntityCache};
use super::traits::{Entity, MutationPolicy, RecordGateway};

impl<G: RecordGateway> EntityCache<G> {
  /// Create a record and append the server's canonical copy to the cached collection.
  pub async fn add<T, P>(&self, payload: &P) -> Result<T, GatewayError>
  where
    T: Entity,
    P: Serialize + ?Sized,
  {
    let kind = T::KIND;
    let payload = serde_json::to_value(payload)?;
    let epoch = self.epoch();

    let created = self.shared.gateway.create(kind, payload).await?;
    let decoded = serde_json::from_value::<T>(created.clone());

    if self.epoch() == epoch {
      match (&decoded, MutationPolicy::for_kind(kind)) {
        (Ok(_), MutationPolicy::Merge) => self.apply_created(kind, created),
        (Err(e), MutationPolicy::Merge) => {
          warn!(kind = %kind, error = %e, "created record does not decode, invalidating");
          self.apply_invalidate(kind);
        }
        (_, MutationPolicy::Invalidate) => self.apply_invalidate(kind),
      }
    }

    Ok(decoded?)
  }

  /// Apply a partial update to a record of `T`.
  pub async fn update<T, P>(&self, id: &str, partial: &P) -> Result<(), GatewayError>
  where
    T: Entity,
    P: Serialize + ?Sized,
  {
    let partial = serde_json::to_value(partial)?;
    self.update_kind(T::KIND, id, partial).await
  }

  /// Apply a partial update and patch the cached record.
  ///
  /// The patch is the record the server echoes back when it does, so fields the
  /// server derives are picked up; otherwise it is the submitted payload.
  pub async fn update_kind(
    &self,
    kind: EntityKind,
    id: &str,
    partial: Value,
  ) -> Result<(), GatewayError> {
    let epoch = self.epoch();
    let echoed = self
      .shared
      .gateway
      .update(kind, id, partial.clone())
      .await?;

    if self.epoch() != epoch {
      return Ok(());
    }

    match MutationPolicy::for_kind(kind) {
      MutationPolicy::Invalidate => self.apply_invalidate(kind),
      MutationPolicy::Merge => {
        let patch = echoed.filter(Value::is_object).unwrap_or(partial);
        let patched = lock(&self.shared.store).patch_one(kind, id, &patch);
        debug!(kind = %kind, id, patched, "patched cached records");
        self.notify();
      }
    }
    Ok(())
  }

  pub async fn delete<T: Entity>(&self, id: &str) -> Result<(), GatewayError> {
    self.delete_kind(T::KIND, id).await
  }

  /// Delete a record and drop it from every cached entry of its kind.
  pub async fn delete_kind(&self, kind: EntityKind, id: &str) -> Result<(), GatewayError> {
    let epoch = self.epoch();
    self.shared.gateway.delete(kind, id).await?;

    if self.epoch() == epoch {
      let removed = lock(&self.shared.store).remove(kind, id);
      debug!(kind = %kind, id, removed, "removed cached records");
      self.notify();
    }
    Ok(())
  }

  /// Upload a file into a matter.
  ///
  /// The document record carries metadata the server derives from the file, so
  /// the documents collection is invalidated rather than merged.
  pub async fn upload_document(
    &self,
    matter_id: &str,
    file_name: &str,
    bytes: Vec<u8>,
  ) -> Result<Document, GatewayError> {
    let epoch = self.epoch();
    let created = self
      .shared
      .gateway
      .upload(matter_id, file_name, bytes)
      .await?;

    if self.epoch() == epoch {
      self.apply_invalidate(EntityKind::Document);
    }

    Ok(serde_json::from_value(created)?)
  }

  fn apply_created(&self, kind: EntityKind, record: Value) {
    let keys = lock(&self.shared.router).append_keys(kind);
    {
      let mut store = lock(&self.shared.store);
      for key in keys {
        store.append(key, record.clone());
      }
    }
    debug!(kind = %kind, "appended created record");
    self.notify();
  }

  fn apply_invalidate(&self, kind: EntityKind) {
    lock(&self.shared.store).invalidate(kind);
    debug!(kind = %kind, "invalidated cached collection");
    self.notify();
  }
}
