//! Command-line pages. Each page declares its reads as [`Query`] values,
//! waits for them, and renders plain text.
//!
//! [`Query`]: crate::query::Query

pub mod assistant;
pub mod auth;
pub mod chat;
pub mod feed;
pub mod housing;
pub mod keys;
pub mod profile;
pub mod universities;

use chrono::{DateTime, Utc};

use crate::api::ApiError;
use crate::fallback::Source;
use crate::query::QueryResult;

pub const LOADING: &str = "Loading...";

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn format_price(price: f64) -> String {
  let whole = price.round() as i64;
  let digits = whole.abs().to_string();
  let mut grouped = String::new();
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }
  let sign = if whole < 0 { "-" } else { "" };
  format!("{}${}/mo", sign, grouped)
}

pub fn format_when(at: Option<DateTime<Utc>>) -> String {
  match at {
    Some(at) => at.format("%Y-%m-%d %H:%M").to_string(),
    None => "-".to_string(),
  }
}

/// One line explaining a failed read, or nothing when the session policy
/// already handles it.
fn error_line(error: &ApiError) -> Option<String> {
  if error.is_unauthorized() {
    None
  } else {
    Some(format!("Error: {}", error))
  }
}

/// Render a read that has no sample fallback.
pub fn render_result<T>(result: &QueryResult<T>, render: impl FnOnce(&T) -> String) -> String {
  match (&result.data, &result.error) {
    (Some(data), _) => render(data),
    (None, _) if result.is_loading => LOADING.to_string(),
    (None, Some(error)) => error_line(error).unwrap_or_default(),
    (None, None) => String::new(),
  }
}

/// Header shown above lists that may have been replaced with sample content.
fn source_notice(source: Source, error: Option<&ApiError>, what: &str) -> Option<String> {
  if source != Source::Sample {
    return None;
  }
  Some(match error.and_then(error_line) {
    Some(reason) => format!("{} (showing sample {})", reason, what),
    None => format!("Showing sample {}", what),
  })
}
