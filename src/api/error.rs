use reqwest::StatusCode;
use thiserror::Error;

/// Every way a call against the backend can fail.
///
/// Cloneable so that one failed request can be handed to every caller that
/// was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
  /// Non-2xx response other than 401
  #[error("HTTP {status}: {body}")]
  Status { status: u16, body: String },

  /// 401 response; the session is gone
  #[error("HTTP 401: {body}")]
  Unauthorized { body: String },

  /// The request never produced a response
  #[error("request failed: {0}")]
  Transport(String),

  #[error("failed to encode request body: {0}")]
  Encode(String),

  #[error("failed to decode response: {0}")]
  Decode(String),

  /// The response parsed but was not one of the accepted envelopes
  #[error("unexpected response shape for {resource}: {found}")]
  UnexpectedShape { resource: String, found: String },

  #[error("credential store error: {0}")]
  Storage(String),
}

impl ApiError {
  /// Classify a non-2xx response. An empty body is replaced by the status text.
  pub fn from_status(status: u16, body: String) -> Self {
    let body = if body.trim().is_empty() {
      StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown status")
        .to_string()
    } else {
      body
    };

    if status == 401 {
      ApiError::Unauthorized { body }
    } else {
      ApiError::Status { status, body }
    }
  }

  /// HTTP status code, when the failure came from a response.
  pub fn status(&self) -> Option<u16> {
    match self {
      ApiError::Status { status, .. } => Some(*status),
      ApiError::Unauthorized { .. } => Some(401),
      _ => None,
    }
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(self, ApiError::Unauthorized { .. })
  }

  pub fn is_not_found(&self) -> bool {
    self.status() == Some(404)
  }
}
