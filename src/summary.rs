//! One-line roll-ups of the collection on screen.
//!
//! These read the typed records, so anything the console cannot decode is
//! left out of the totals.

use chrono::{DateTime, Utc};

use crate::api::types::{
  ApiKey, CalendarEvent, Client, Document, Group, Invoice, Matter, MatterStatus, MatterType,
  TimeEntry,
};
use crate::api::EntityKind;
use crate::cache::{EntityCache, RecordGateway};

pub fn summarize<G: RecordGateway>(cache: &EntityCache<G>, kind: EntityKind) -> Option<String> {
  match kind {
    EntityKind::Client => clients(&cache.records::<Client>()),
    EntityKind::Matter => matters(&cache.records::<Matter>()),
    EntityKind::TimeEntry => time_entries(&cache.records::<TimeEntry>()),
    EntityKind::Invoice => invoices(&cache.records::<Invoice>()),
    EntityKind::Event => events(&cache.records::<CalendarEvent>(), Utc::now()),
    EntityKind::Document => documents(&cache.records::<Document>()),
    EntityKind::ApiKey => api_keys(&cache.records::<ApiKey>()),
    EntityKind::Group => groups(&cache.records::<Group>()),
    EntityKind::MatterType => matter_types(&cache.records::<MatterType>()),
  }
}

fn clients(clients: &[Client]) -> Option<String> {
  if clients.is_empty() {
    return None;
  }
  let active = clients.iter().filter(|c| c.is_active != Some(false)).count();
  Some(format!("{} of {} active", active, clients.len()))
}

fn matters(matters: &[Matter]) -> Option<String> {
  if matters.is_empty() {
    return None;
  }
  let count = |status: MatterStatus| matters.iter().filter(|m| m.status == status).count();
  Some(format!(
    "{} active, {} pending, {} closed",
    count(MatterStatus::Active),
    count(MatterStatus::Pending),
    count(MatterStatus::Closed)
  ))
}

fn time_entries(entries: &[TimeEntry]) -> Option<String> {
  if entries.is_empty() {
    return None;
  }
  let logged: f64 = entries.iter().map(|e| e.hours).sum();
  let unbilled: f64 = entries.iter().filter(|e| !e.billed).map(|e| e.hours).sum();
  Some(format!("{:.1}h logged, {:.1}h unbilled", logged, unbilled))
}

fn invoices(invoices: &[Invoice]) -> Option<String> {
  let open: Vec<&Invoice> = invoices
    .iter()
    .filter(|i| !matches!(i.status.to_lowercase().as_str(), "paid" | "void" | "draft"))
    .collect();
  if open.is_empty() {
    return None;
  }
  let outstanding: f64 = open.iter().map(|i| (i.total - i.amount_paid).max(0.0)).sum();
  Some(format!("{:.2} outstanding on {} invoices", outstanding, open.len()))
}

/// Events whose start time is unreadable are not counted as upcoming
fn events(events: &[CalendarEvent], now: DateTime<Utc>) -> Option<String> {
  if events.is_empty() {
    return None;
  }
  let upcoming = events
    .iter()
    .filter_map(|e| DateTime::parse_from_rfc3339(&e.start_time).ok())
    .filter(|start| *start >= now)
    .count();
  Some(format!("{} upcoming", upcoming))
}

fn documents(documents: &[Document]) -> Option<String> {
  if documents.is_empty() {
    return None;
  }
  let bytes: u64 = documents.iter().filter_map(|d| d.size).sum();
  Some(format!("{} files, {}", documents.len(), format_size(bytes)))
}

fn api_keys(keys: &[ApiKey]) -> Option<String> {
  if keys.is_empty() {
    return None;
  }
  let unused = keys.iter().filter(|k| k.last_used.is_none()).count();
  Some(format!("{} never used", unused))
}

fn groups(groups: &[Group]) -> Option<String> {
  if groups.is_empty() {
    return None;
  }
  let members: usize = groups.iter().map(|g| g.member_ids.len()).sum();
  Some(format!("{} memberships", members))
}

fn matter_types(types: &[MatterType]) -> Option<String> {
  if types.is_empty() {
    return None;
  }
  let active = types.iter().filter(|t| t.active).count();
  Some(format!("{} of {} active", active, types.len()))
}

fn format_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
  let mut size = bytes as f64;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{} {}", bytes, UNITS[0])
  } else {
    format!("{:.1} {}", size, UNITS[unit])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::testing::FakeGateway;
  use crate::cache::{CacheSettings, FetchParams};
  use chrono::Duration;
  use serde_json::{from_value, json};

  #[test]
  fn test_empty_collections_have_no_summary() {
    assert_eq!(clients(&[]), None);
    assert_eq!(matters(&[]), None);
    assert_eq!(invoices(&[]), None);
    assert_eq!(documents(&[]), None);
  }

  #[test]
  fn test_matter_statuses() {
    let matters_list: Vec<Matter> = from_value(json!([
      { "id": "m1", "name": "Estate of Doe", "status": "active" },
      { "id": "m2", "name": "Acme v. Widget", "status": "active" },
      { "id": "m3", "name": "Smith Lease", "status": "closed" },
      { "id": "m4", "name": "Jones", "status": "on_hold" },
    ]))
    .unwrap();
    assert_eq!(
      matters(&matters_list).as_deref(),
      Some("2 active, 0 pending, 1 closed")
    );
  }

  #[test]
  fn test_unbilled_hours() {
    let entries: Vec<TimeEntry> = from_value(json!([
      { "id": "t1", "date": "2024-03-01", "hours": 1.5, "billed": true },
      { "id": "t2", "date": "2024-03-02", "hours": 2.0 },
    ]))
    .unwrap();
    assert_eq!(
      time_entries(&entries).as_deref(),
      Some("3.5h logged, 2.0h unbilled")
    );
  }

  #[test]
  fn test_outstanding_skips_paid_and_void() {
    let list: Vec<Invoice> = from_value(json!([
      { "id": "i1", "total": 1000.0, "amountPaid": 250.0, "status": "sent" },
      { "id": "i2", "total": 500.0, "status": "paid" },
      { "id": "i3", "total": 80.0, "status": "void" },
    ]))
    .unwrap();
    assert_eq!(
      invoices(&list).as_deref(),
      Some("750.00 outstanding on 1 invoices")
    );
  }

  #[test]
  fn test_upcoming_events() {
    let now = Utc::now();
    let list: Vec<CalendarEvent> = from_value(json!([
      { "id": "e1", "title": "Hearing", "startTime": (now + Duration::days(2)).to_rfc3339() },
      { "id": "e2", "title": "Filing", "startTime": (now - Duration::days(2)).to_rfc3339() },
      { "id": "e3", "title": "Call", "startTime": "next tuesday" },
    ]))
    .unwrap();
    assert_eq!(events(&list, now).as_deref(), Some("1 upcoming"));
  }

  #[test]
  fn test_format_size() {
    assert_eq!(format_size(512), "512 B");
    assert_eq!(format_size(1536), "1.5 KB");
    assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
  }

  #[tokio::test]
  async fn test_summary_reads_cached_records() {
    let gateway = FakeGateway::new().with_collection(
      EntityKind::Group,
      None,
      vec![
        json!({ "id": 7, "name": "Litigation", "memberIds": ["u1", "u2"] }),
        json!({ "id": "g2", "name": "Probate", "memberIds": ["u3"] }),
      ],
    );
    let cache = EntityCache::new(gateway, CacheSettings::default());
    cache
      .fetch_kind(EntityKind::Group, FetchParams::default())
      .await;

    assert_eq!(
      summarize(&cache, EntityKind::Group).as_deref(),
      Some("3 memberships")
    );
    assert_eq!(summarize(&cache, EntityKind::ApiKey), None);
  }
}
