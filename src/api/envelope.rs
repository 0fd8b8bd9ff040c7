//! List response normalization.
//!
//! The backend wraps collections inconsistently: a bare array, an object
//! with the items under the resource name (`{"listings": [...]}`), or under
//! `data`. All three are folded into one `Page<T>` right after the call, so
//! nothing downstream re-derives the shape. Anything else is a contract
//! violation.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::error::ApiError;

/// Which envelope a list arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListShape {
  Bare,
  Named,
  Data,
}

/// A normalized list plus whatever pagination metadata came with it.
#[derive(Debug, Clone)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub shape: ListShape,
  pub total: Option<u64>,
  pub page: Option<u64>,
  pub has_more: Option<bool>,
}

/// Normalize a list response, keeping only the items.
pub fn normalize_list<T: DeserializeOwned>(value: Value, resource: &str) -> Result<Vec<T>, ApiError> {
  let page = normalize_page(value, resource)?;
  debug!(
    resource,
    shape = ?page.shape,
    count = page.items.len(),
    total = ?page.total,
    page = ?page.page,
    has_more = ?page.has_more,
    "normalized list"
  );
  Ok(page.items)
}

/// Normalize a list response into a `Page`.
pub fn normalize_page<T: DeserializeOwned>(value: Value, resource: &str) -> Result<Page<T>, ApiError> {
  match value {
    Value::Array(items) => Ok(Page {
      items: decode_items(items)?,
      shape: ListShape::Bare,
      total: None,
      page: None,
      has_more: None,
    }),
    Value::Object(mut map) => {
      let (items, shape) = if let Some(items) = map.remove(resource) {
        (items, ListShape::Named)
      } else if let Some(items) = map.remove("data") {
        (items, ListShape::Data)
      } else {
        return Err(ApiError::UnexpectedShape {
          resource: resource.to_string(),
          found: describe_object(&map),
        });
      };

      let items = match items {
        Value::Array(items) => items,
        other => {
          return Err(ApiError::UnexpectedShape {
            resource: resource.to_string(),
            found: format!("non-array field ({})", kind(&other)),
          })
        }
      };

      Ok(Page {
        items: decode_items(items)?,
        shape,
        total: map.get("total").and_then(Value::as_u64),
        page: map.get("page").and_then(Value::as_u64),
        has_more: map.get("has_more").and_then(Value::as_bool),
      })
    }
    other => Err(ApiError::UnexpectedShape {
      resource: resource.to_string(),
      found: kind(&other).to_string(),
    }),
  }
}

fn decode_items<T: DeserializeOwned>(items: Vec<Value>) -> Result<Vec<T>, ApiError> {
  items
    .into_iter()
    .map(|item| serde_json::from_value(item).map_err(|e| ApiError::Decode(e.to_string())))
    .collect()
}

fn describe_object(map: &Map<String, Value>) -> String {
  let keys: Vec<&str> = map.keys().map(String::as_str).collect();
  format!("object with keys [{}]", keys.join(", "))
}

fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Item {
    id: String,
  }

  #[test]
  fn test_named_wrapper() {
    let page: Page<Item> = normalize_page(
      json!({"listings": [{"id": "a"}, {"id": "b"}], "total": 2, "has_more": false}),
      "listings",
    )
    .unwrap();

    assert_eq!(page.shape, ListShape::Named);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, Some(2));
    assert_eq!(page.has_more, Some(false));
  }

  #[test]
  fn test_bare_and_data_wrappers() {
    let bare: Vec<Item> = normalize_list(json!([{"id": "a"}]), "posts").unwrap();
    assert_eq!(bare, vec![Item { id: "a".into() }]);

    let data: Page<Item> = normalize_page(json!({"data": [{"id": "z"}]}), "posts").unwrap();
    assert_eq!(data.shape, ListShape::Data);
    assert_eq!(data.items[0].id, "z");
  }

  #[test]
  fn test_empty_array_stays_empty() {
    let items: Vec<Item> = normalize_list(json!([]), "listings").unwrap();
    assert!(items.is_empty());
  }

  #[test]
  fn test_unknown_shapes_are_rejected() {
    let err = normalize_list::<Item>(json!({"results": []}), "listings").unwrap_err();
    assert!(matches!(err, ApiError::UnexpectedShape { .. }));
    assert!(err.to_string().contains("results"));

    let err = normalize_list::<Item>(json!({"listings": {"id": "a"}}), "listings").unwrap_err();
    assert!(matches!(err, ApiError::UnexpectedShape { .. }));

    let err = normalize_list::<Item>(Value::Null, "listings").unwrap_err();
    assert!(matches!(err, ApiError::UnexpectedShape { .. }));
  }
}
