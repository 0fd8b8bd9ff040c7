//! Request client: builds one call against the backend and normalizes its outcome.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use super::error::ApiError;
use super::transport::{HttpRequest, Method, Transport};
use crate::credentials::CredentialStore;

/// Notified whenever the backend answers 401.
///
/// The client only reports the event; what happens next (clearing the
/// credential, moving to the sign-in view) belongs to the listener.
pub trait UnauthorizedListener: Send + Sync {
  fn on_unauthorized(&self);
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
  /// Extra headers; replace generated headers of the same name
  pub headers: Vec<(String, String)>,
}

impl RequestOptions {
  pub fn header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }
}

/// HTTP client for the backend API.
#[derive(Clone)]
pub struct ApiClient {
  base_url: String,
  transport: Arc<dyn Transport>,
  credentials: Arc<dyn CredentialStore>,
  listeners: Arc<RwLock<Vec<Arc<dyn UnauthorizedListener>>>>,
}

impl ApiClient {
  pub fn new(
    base_url: &str,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
  ) -> Self {
    Self {
      base_url: base_url.trim_end_matches('/').to_string(),
      transport,
      credentials,
      listeners: Arc::new(RwLock::new(Vec::new())),
    }
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
    &self.credentials
  }

  /// Register a listener for 401 responses.
  pub fn on_unauthorized(&self, listener: Arc<dyn UnauthorizedListener>) {
    let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
    listeners.push(listener);
  }

  /// Absolute URLs pass through untouched; anything else is appended to the base URL.
  pub fn resolve_url(&self, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
      path.to_string()
    } else if path.starts_with('/') {
      format!("{}{}", self.base_url, path)
    } else {
      format!("{}/{}", self.base_url, path)
    }
  }

  /// Perform one call and return the parsed JSON body.
  ///
  /// A 2xx with an empty body yields `Value::Null`. Non-2xx responses become
  /// `ApiError::Status`, or `ApiError::Unauthorized` for 401 after every
  /// registered listener has been notified.
  pub async fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
    options: RequestOptions,
  ) -> Result<Value, ApiError> {
    let url = self.resolve_url(path);
    let mut headers: Vec<(String, String)> = Vec::new();

    let body = match body {
      Some(value) => {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        Some(serde_json::to_string(&value).map_err(|e| ApiError::Encode(e.to_string()))?)
      }
      None => None,
    };

    let token = self
      .credentials
      .get()
      .map_err(|e| ApiError::Storage(e.to_string()))?;
    if let Some(token) = token {
      headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
    }

    for (name, value) in options.headers {
      headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
      headers.push((name, value));
    }

    let request = HttpRequest {
      method,
      url,
      headers,
      body,
      include_credentials: true,
    };

    debug!(method = %request.method, url = %request.url, "sending request");
    let response = self.transport.execute(request).await?;
    debug!(status = response.status, "received response");

    if !response.is_success() {
      let err = ApiError::from_status(response.status, response.body);
      if err.is_unauthorized() {
        warn!(path, "backend rejected credentials");
        self.notify_unauthorized();
      }
      return Err(err);
    }

    if response.body.trim().is_empty() {
      return Ok(Value::Null);
    }

    serde_json::from_str(&response.body).map_err(|e| ApiError::Decode(e.to_string()))
  }

  fn notify_unauthorized(&self) {
    let listeners: Vec<_> = self
      .listeners
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .clone();
    for listener in listeners {
      listener.on_unauthorized();
    }
  }

  /// GET returning the raw JSON value.
  pub async fn get_value(&self, path: &str) -> Result<Value, ApiError> {
    self
      .request(Method::Get, path, None, RequestOptions::default())
      .await
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    decode(self.get_value(path).await?)
  }

  pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let body = encode(body)?;
    decode(
      self
        .request(Method::Post, path, Some(body), RequestOptions::default())
        .await?,
    )
  }

  /// POST without a body (likes, mark-read, logout).
  pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    decode(
      self
        .request(Method::Post, path, None, RequestOptions::default())
        .await?,
    )
  }

  pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let body = encode(body)?;
    decode(
      self
        .request(Method::Put, path, Some(body), RequestOptions::default())
        .await?,
    )
  }

  pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    decode(
      self
        .request(Method::Delete, path, None, RequestOptions::default())
        .await?,
    )
  }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
  serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))
}

/// The caller names the expected shape; nothing here validates it further.
fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
  serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}
