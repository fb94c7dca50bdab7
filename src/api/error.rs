use thiserror::Error;

/// Failure reported by the record gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
  #[error("Unauthorized - session may have expired")]
  Unauthorized,

  #[error("Access denied: {0}")]
  AccessDenied(String),

  #[error("Record not found: {0}")]
  NotFound(String),

  #[error("Validation failed: {0}")]
  Validation(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("Rate limited - please wait before retrying")]
  RateLimited,

  #[error("Server error: {0}")]
  Server(String),

  #[error("Network error: {0}")]
  Network(#[from] reqwest::Error),

  #[error("Invalid response: {0}")]
  InvalidResponse(String),

  #[error("Failed to decode record: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("Invalid URL: {0}")]
  InvalidUrl(#[from] url::ParseError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl GatewayError {
  /// Truncate a response body to avoid logging excessive data
  fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
      body.to_string()
    } else {
      let mut end = MAX_ERROR_BODY_LENGTH;
      while !body.is_char_boundary(end) {
        end -= 1;
      }
      format!(
        "{}... (truncated, {} total bytes)",
        &body[..end],
        body.len()
      )
    }
  }

  pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
    let truncated = Self::truncate_body(body);
    match status.as_u16() {
      400 | 422 => GatewayError::Validation(truncated),
      401 => GatewayError::Unauthorized,
      403 => GatewayError::AccessDenied(truncated),
      404 => GatewayError::NotFound(truncated),
      409 => GatewayError::Conflict(truncated),
      429 => GatewayError::RateLimited,
      500..=599 => GatewayError::Server(truncated),
      _ => GatewayError::InvalidResponse(format!("Status {}: {}", status, truncated)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use reqwest::StatusCode;

  #[test]
  fn test_from_status_mapping() {
    assert!(matches!(
      GatewayError::from_status(StatusCode::UNAUTHORIZED, ""),
      GatewayError::Unauthorized
    ));
    assert!(matches!(
      GatewayError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "name required"),
      GatewayError::Validation(ref m) if m == "name required"
    ));
    assert!(matches!(
      GatewayError::from_status(StatusCode::CONFLICT, "stale"),
      GatewayError::Conflict(_)
    ));
    assert!(matches!(
      GatewayError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
      GatewayError::Server(_)
    ));
    assert!(matches!(
      GatewayError::from_status(StatusCode::IM_A_TEAPOT, ""),
      GatewayError::InvalidResponse(_)
    ));
  }

  #[test]
  fn test_long_body_is_truncated() {
    let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 100);
    match GatewayError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body) {
      GatewayError::Server(msg) => {
        assert!(msg.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(msg.contains("truncated, 600 total bytes"));
      }
      other => panic!("unexpected error: {:?}", other),
    }
  }
}
