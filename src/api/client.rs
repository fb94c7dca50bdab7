//! HTTP gateway to the practice-management record API.
//!
//! Every collection is a plain REST resource under `/api/...`. List responses
//! come back either as a bare array or wrapped in an object, so records are
//! handed to the cache as raw JSON and only decoded on read.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, multipart, Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};
use url::{ParseError, Url};

use crate::cache::RecordGateway;
use crate::config::ApiConfig;

use super::{EntityKind, GatewayError, ViewScope};

// ============================================================================
// Constants
// ============================================================================

const UPLOAD_PATH: &str = "/api/documents/upload";

/// Generic wrapper fields tried after the kind's own collection field
const WRAPPER_FIELDS: [&str; 2] = ["data", "records"];

/// Record API client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  base_url: Url,
  token: Option<String>,
}

impl ApiClient {
  pub fn new(config: &ApiConfig, token: Option<String>) -> Result<Self, GatewayError> {
    let base_url = Url::parse(&config.url)?;
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;

    Ok(Self {
      client,
      base_url,
      token,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn url(&self, path: &str) -> Result<Url, GatewayError> {
    Ok(self.base_url.join(path)?)
  }

  /// Collection path plus the id as one encoded segment
  fn record_url(&self, kind: EntityKind, id: &str) -> Result<Url, GatewayError> {
    let mut url = self.url(kind.path())?;
    url
      .path_segments_mut()
      .map_err(|_| GatewayError::InvalidUrl(ParseError::RelativeUrlWithCannotBeABaseBase))?
      .push(id);
    Ok(url)
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let builder = self
      .client
      .request(method, url)
      .header(header::ACCEPT, "application/json");
    match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    }
  }

  /// Check if response is successful, returning an error with body if not.
  async fn check_response(response: Response) -> Result<Response, GatewayError> {
    if response.status().is_success() {
      Ok(response)
    } else {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      Err(GatewayError::from_status(status, &body))
    }
  }

  /// Send a request and read its JSON body. An empty body reads as `None`.
  async fn send(&self, builder: RequestBuilder) -> Result<Option<Value>, GatewayError> {
    let response = Self::check_response(builder.send().await?).await?;
    let body = response.text().await?;
    if body.trim().is_empty() {
      return Ok(None);
    }
    Ok(Some(serde_json::from_str(&body)?))
  }
}

#[async_trait]
impl RecordGateway for ApiClient {
  async fn list(
    &self,
    kind: EntityKind,
    scope: Option<ViewScope>,
  ) -> Result<Vec<Value>, GatewayError> {
    let mut url = self.url(kind.path())?;
    if let Some(scope) = scope {
      url.query_pairs_mut().append_pair("view", scope.as_param());
    }
    debug!(%kind, %url, "GET collection");

    let body = self.send(self.request(Method::GET, url)).await?;
    let records = extract_records(kind, body.unwrap_or(Value::Array(Vec::new())))?;
    debug!(%kind, count = records.len(), "Collection received");
    Ok(records)
  }

  async fn create(&self, kind: EntityKind, payload: Value) -> Result<Value, GatewayError> {
    let url = self.url(kind.path())?;
    debug!(%kind, "POST record");

    let body = self.send(self.request(Method::POST, url).json(&payload)).await?;
    body
      .and_then(unwrap_record)
      .ok_or_else(|| GatewayError::InvalidResponse(format!("create {} returned no record", kind)))
  }

  async fn update(
    &self,
    kind: EntityKind,
    id: &str,
    partial: Value,
  ) -> Result<Option<Value>, GatewayError> {
    let url = self.record_url(kind, id)?;
    debug!(%kind, id, "PATCH record");

    let body = self.send(self.request(Method::PATCH, url).json(&partial)).await?;
    Ok(body.and_then(unwrap_record))
  }

  async fn delete(&self, kind: EntityKind, id: &str) -> Result<(), GatewayError> {
    let url = self.record_url(kind, id)?;
    debug!(%kind, id, "DELETE record");

    self.send(self.request(Method::DELETE, url)).await?;
    Ok(())
  }

  async fn upload(
    &self,
    matter_id: &str,
    file_name: &str,
    bytes: Vec<u8>,
  ) -> Result<Value, GatewayError> {
    let url = self.url(UPLOAD_PATH)?;
    debug!(matter_id, file_name, size = bytes.len(), "Uploading document");

    let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
    let form = multipart::Form::new()
      .text("matterId", matter_id.to_string())
      .part("file", part);

    let body = self.send(self.request(Method::POST, url).multipart(form)).await?;
    body.and_then(unwrap_record).ok_or_else(|| {
      GatewayError::InvalidResponse("document upload returned no record".to_string())
    })
  }
}

// ============================================================================
// Response shapes
// ============================================================================

/// Pull the record array out of a list response.
///
/// Accepts a bare array, or an object holding the array under the kind's
/// collection field, `data` or `records`.
pub fn extract_records(kind: EntityKind, body: Value) -> Result<Vec<Value>, GatewayError> {
  match body {
    Value::Array(records) => Ok(records),
    Value::Object(mut fields) => {
      let field = std::iter::once(kind.collection_field())
        .chain(WRAPPER_FIELDS)
        .find(|name| fields.get(*name).is_some_and(Value::is_array));

      match field.and_then(|name| fields.remove(name)) {
        Some(Value::Array(records)) => Ok(records),
        _ => {
          warn!(%kind, "List response has no record array");
          Err(GatewayError::InvalidResponse(format!(
            "{} list response has no record array",
            kind
          )))
        }
      }
    }
    other => Err(GatewayError::InvalidResponse(format!(
      "{} list response is not an array: {}",
      kind, other
    ))),
  }
}

/// Pull a single record out of a create/update response.
///
/// An object carrying an `id` is the record itself; otherwise a lone object
/// field (e.g. `{"matter": {...}}` or `{"data": {...}}`) is unwrapped.
pub fn unwrap_record(body: Value) -> Option<Value> {
  let Value::Object(fields) = body else {
    return None;
  };
  if fields.contains_key("id") {
    return Some(Value::Object(fields));
  }

  let mut objects = fields
    .into_iter()
    .filter_map(|(_, value)| value.is_object().then_some(value));
  match (objects.next(), objects.next()) {
    (Some(inner), None) if inner.get("id").is_some() => Some(inner),
    _ => None,
  }
}
