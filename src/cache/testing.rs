//! Scripted in-memory gateway for cache tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::api::{EntityKind, GatewayError, ViewScope};

use super::storage::record_id;
use super::traits::RecordGateway;

type CollectionKey = (EntityKind, Option<ViewScope>);

/// Serves canned collections, counts calls and can be told to fail.
#[derive(Default)]
pub struct FakeGateway {
  collections: Mutex<HashMap<CollectionKey, Vec<Value>>>,
  list_calls: Mutex<Vec<CollectionKey>>,
  mutation_calls: AtomicUsize,
  failing: AtomicBool,
  echo_updates: AtomicBool,
  latency: Option<Duration>,
  next_id: AtomicUsize,
}

impl FakeGateway {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_collection(
    self,
    kind: EntityKind,
    scope: Option<ViewScope>,
    records: Vec<Value>,
  ) -> Self {
    self
      .collections
      .lock()
      .unwrap()
      .insert((kind, scope), records);
    self
  }

  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  /// Make `update` return the merged record with a server-stamped `updatedAt`.
  pub fn set_echo_updates(&self, echo: bool) {
    self.echo_updates.store(echo, Ordering::SeqCst);
  }

  pub fn list_calls(&self, kind: EntityKind) -> usize {
    self.list_scopes(kind).len()
  }

  /// Scopes passed to `list` for `kind`, in call order.
  pub fn list_scopes(&self, kind: EntityKind) -> Vec<Option<ViewScope>> {
    self
      .list_calls
      .lock()
      .unwrap()
      .iter()
      .filter(|(k, _)| *k == kind)
      .map(|(_, scope)| *scope)
      .collect()
  }

  pub fn mutation_calls(&self) -> usize {
    self.mutation_calls.load(Ordering::SeqCst)
  }

  async fn simulate_network(&self) -> Result<(), GatewayError> {
    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }
    if self.failing.load(Ordering::SeqCst) {
      return Err(GatewayError::Server("scripted failure".to_string()));
    }
    Ok(())
  }

  fn assign_id(&self) -> String {
    format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
  }
}

#[async_trait]
impl RecordGateway for FakeGateway {
  async fn list(
    &self,
    kind: EntityKind,
    scope: Option<ViewScope>,
  ) -> Result<Vec<Value>, GatewayError> {
    self.list_calls.lock().unwrap().push((kind, scope));
    self.simulate_network().await?;
    Ok(
      self
        .collections
        .lock()
        .unwrap()
        .get(&(kind, scope))
        .cloned()
        .unwrap_or_default(),
    )
  }

  async fn create(&self, _kind: EntityKind, payload: Value) -> Result<Value, GatewayError> {
    self.mutation_calls.fetch_add(1, Ordering::SeqCst);
    self.simulate_network().await?;

    let mut record = payload;
    if let Some(fields) = record.as_object_mut() {
      fields.insert("id".to_string(), json!(self.assign_id()));
      fields.insert("createdAt".to_string(), json!("2024-01-01T00:00:00Z"));
    }
    Ok(record)
  }

  async fn update(
    &self,
    kind: EntityKind,
    id: &str,
    partial: Value,
  ) -> Result<Option<Value>, GatewayError> {
    self.mutation_calls.fetch_add(1, Ordering::SeqCst);
    self.simulate_network().await?;

    if !self.echo_updates.load(Ordering::SeqCst) {
      return Ok(None);
    }

    let collections = self.collections.lock().unwrap();
    let mut record = collections
      .iter()
      .filter(|((k, _), _)| *k == kind)
      .flat_map(|(_, records)| records.iter())
      .find(|r| record_id(r).as_deref() == Some(id))
      .cloned()
      .unwrap_or_else(|| json!({ "id": id }));

    if let (Some(target), Some(fields)) = (record.as_object_mut(), partial.as_object()) {
      for (name, value) in fields {
        target.insert(name.clone(), value.clone());
      }
      target.insert("updatedAt".to_string(), json!("2024-01-01T00:00:00Z"));
    }
    Ok(Some(record))
  }

  async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), GatewayError> {
    self.mutation_calls.fetch_add(1, Ordering::SeqCst);
    self.simulate_network().await?;

    for ((k, _), records) in self.collections.lock().unwrap().iter_mut() {
      if *k == kind {
        records.retain(|r| record_id(r).as_deref() != Some(id));
      }
    }
    Ok(())
  }

  async fn upload(
    &self,
    matter_id: &str,
    file_name: &str,
    bytes: Vec<u8>,
  ) -> Result<Value, GatewayError> {
    self.mutation_calls.fetch_add(1, Ordering::SeqCst);
    self.simulate_network().await?;

    Ok(json!({
      "id": self.assign_id(),
      "name": file_name,
      "matterId": matter_id,
      "size": bytes.len(),
    }))
  }
}
