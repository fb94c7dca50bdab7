//! Typed records for each entity kind.
//!
//! Field names follow the record API's camelCase JSON. Everything the console
//! does not display is optional so that partial server shapes still decode.

use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::Entity;

use super::kind::EntityKind;

/// A client of the firm (person or company)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub display_name: String,
  #[serde(rename = "type", default)]
  pub client_type: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatterStatus {
  Active,
  Pending,
  Closed,
  #[serde(other)]
  Other,
}

/// A legal matter (case or engagement)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matter {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default)]
  pub number: Option<String>,
  pub name: String,
  pub status: MatterStatus,
  #[serde(default)]
  pub client_id: Option<String>,
  #[serde(default)]
  pub client_name: Option<String>,
  #[serde(default)]
  pub responsible_attorney: Option<String>,
}

/// Partial update payload for a matter. Unset fields are not sent.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatterUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<MatterStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub responsible_attorney: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default)]
  pub matter_id: Option<String>,
  pub date: String,
  pub hours: f64,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub billable: bool,
  #[serde(default)]
  pub billed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  #[serde(default)]
  pub number: Option<String>,
  #[serde(default)]
  pub client_name: Option<String>,
  #[serde(default)]
  pub total: f64,
  #[serde(default)]
  pub amount_paid: f64,
  pub status: String,
}

/// Calendar event (hearing, deadline, meeting)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub title: String,
  pub start_time: String,
  #[serde(default)]
  pub end_time: Option<String>,
  #[serde(rename = "type", default)]
  pub event_type: Option<String>,
  #[serde(default)]
  pub location: Option<String>,
  #[serde(default)]
  pub matter_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub matter_id: Option<String>,
  #[serde(default)]
  pub matter_name: Option<String>,
  #[serde(rename = "type", default)]
  pub mime_type: Option<String>,
  #[serde(default)]
  pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub key_prefix: Option<String>,
  #[serde(default)]
  pub last_used: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatterType {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub value: String,
  pub label: String,
  #[serde(default = "default_true")]
  pub active: bool,
}

fn default_true() -> bool {
  true
}

/// Record ids are strings, but some tables still emit numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawId {
    Text(String),
    Int(i64),
    Uint(u64),
  }

  Ok(match RawId::deserialize(deserializer)? {
    RawId::Text(s) => s,
    RawId::Int(n) => n.to_string(),
    RawId::Uint(n) => n.to_string(),
  })
}

// ============================================================================
// Entity implementations
// ============================================================================

macro_rules! impl_entity {
  ($ty:ty, $kind:expr) => {
    impl Entity for $ty {
      const KIND: EntityKind = $kind;

      fn id(&self) -> &str {
        &self.id
      }
    }
  };
}

impl_entity!(Client, EntityKind::Client);
impl_entity!(Matter, EntityKind::Matter);
impl_entity!(TimeEntry, EntityKind::TimeEntry);
impl_entity!(Invoice, EntityKind::Invoice);
impl_entity!(CalendarEvent, EntityKind::Event);
impl_entity!(Document, EntityKind::Document);
impl_entity!(ApiKey, EntityKind::ApiKey);
impl_entity!(Group, EntityKind::Group);
impl_entity!(MatterType, EntityKind::MatterType);
