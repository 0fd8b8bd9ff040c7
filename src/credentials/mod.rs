//! Credential store: the single owner of the bearer token.
//!
//! The token has no expiry tracking of its own. It is written on login or
//! signup, read before every request, and cleared on logout or when the
//! server answers 401.

mod sqlite;

use color_eyre::Result;
use sha2::{Digest, Sha256};
use std::sync::Mutex;

pub use sqlite::SqliteCredentialStore;

/// Storage backend for the authentication token.
pub trait CredentialStore: Send + Sync {
  /// Current token, if any.
  fn get(&self) -> Result<Option<String>>;

  /// Replace the stored token. An empty token clears the store.
  fn set(&self, token: &str) -> Result<()>;

  /// Forget the stored token.
  fn clear(&self) -> Result<()>;
}

/// Process-local store that forgets everything on exit.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
  token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
  pub fn new() -> Self {
    Self::default()
  }

  #[cfg(test)]
  pub fn with_token(token: &str) -> Self {
    Self {
      token: Mutex::new(Some(token.to_string())),
    }
  }
}

impl CredentialStore for MemoryCredentialStore {
  fn get(&self) -> Result<Option<String>> {
    let token = self.token.lock().unwrap_or_else(|e| e.into_inner());
    Ok(token.clone())
  }

  fn set(&self, token: &str) -> Result<()> {
    let mut slot = self.token.lock().unwrap_or_else(|e| e.into_inner());
    *slot = if token.is_empty() {
      None
    } else {
      Some(token.to_string())
    };
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let mut slot = self.token.lock().unwrap_or_else(|e| e.into_inner());
    *slot = None;
    Ok(())
  }
}

/// Short, non-reversible identifier for a token, safe to write to logs.
pub fn fingerprint(token: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(token.as_bytes());
  let digest = hex::encode(hasher.finalize());
  digest[..8].to_string()
}
