//! Durable credential storage backed by SQLite.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use super::{fingerprint, CredentialStore};
use crate::config::Config;

const TOKEN_KEY: &str = "auth_token";

/// Schema for the session database.
const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS credentials (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Token store that survives restarts, scoped to the local user account.
pub struct SqliteCredentialStore {
  conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open session database at {}: {}", path.display(), e))?;

    conn
      .execute_batch(SESSION_SCHEMA)
      .map_err(|e| eyre!("Failed to run session migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    Ok(Config::data_dir()?.join("session.db"))
  }
}

impl CredentialStore for SqliteCredentialStore {
  fn get(&self) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let token: Option<String> = conn
      .query_row(
        "SELECT value FROM credentials WHERE name = ?",
        params![TOKEN_KEY],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read credential: {}", e))?;

    Ok(token.filter(|t| !t.is_empty()))
  }

  fn set(&self, token: &str) -> Result<()> {
    if token.is_empty() {
      return self.clear();
    }

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO credentials (name, value, stored_at)
         VALUES (?, ?, datetime('now'))",
        params![TOKEN_KEY, token],
      )
      .map_err(|e| eyre!("Failed to store credential: {}", e))?;

    debug!(token = %fingerprint(token), "stored credential");
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM credentials WHERE name = ?", params![TOKEN_KEY])
      .map_err(|e| eyre!("Failed to clear credential: {}", e))?;

    debug!("cleared credential");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_token_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.db");

    {
      let store = SqliteCredentialStore::open_at(&path).unwrap();
      assert_eq!(store.get().unwrap(), None);
      store.set("abc123").unwrap();
    }

    let reopened = SqliteCredentialStore::open_at(&path).unwrap();
    assert_eq!(reopened.get().unwrap().as_deref(), Some("abc123"));
  }

  #[test]
  fn test_set_replaces_and_clear_removes() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteCredentialStore::open_at(&dir.path().join("session.db")).unwrap();

    store.set("first").unwrap();
    store.set("second").unwrap();
    assert_eq!(store.get().unwrap().as_deref(), Some("second"));

    store.clear().unwrap();
    assert_eq!(store.get().unwrap(), None);

    // Clearing an empty store is fine
    store.clear().unwrap();
  }

  #[test]
  fn test_empty_token_clears() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteCredentialStore::open_at(&dir.path().join("session.db")).unwrap();

    store.set("abc123").unwrap();
    store.set("").unwrap();
    assert_eq!(store.get().unwrap(), None);
  }
}
