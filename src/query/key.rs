use std::fmt;

/// Identifies one cacheable read, e.g. `["chat", "messages", "c1"]`.
///
/// Keys are compared part by part; invalidating a key also invalidates
/// every key it is a prefix of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
  pub fn new<I, S>(parts: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self(parts.into_iter().map(Into::into).collect())
  }

  pub fn parts(&self) -> &[String] {
    &self.0
  }

  /// Extend this key with one more part.
  pub fn child(&self, part: impl Into<String>) -> Self {
    let mut parts = self.0.clone();
    parts.push(part.into());
    Self(parts)
  }

  /// True when `prefix` matches the leading parts of this key.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.parts().join(":"))
  }
}

impl<const N: usize> From<[&str; N]> for QueryKey {
  fn from(parts: [&str; N]) -> Self {
    Self::new(parts)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_prefix_matching() {
    let messages = QueryKey::from(["chat", "messages", "c1"]);
    assert!(messages.starts_with(&QueryKey::from(["chat"])));
    assert!(messages.starts_with(&QueryKey::from(["chat", "messages"])));
    assert!(messages.starts_with(&messages));
    assert!(!messages.starts_with(&QueryKey::from(["chat", "conversations"])));
    assert!(!QueryKey::from(["chat"]).starts_with(&messages));
  }

  #[test]
  fn test_parts_are_not_concatenated() {
    // "ab" + "c" must not collide with "a" + "bc"
    assert_ne!(QueryKey::from(["ab", "c"]), QueryKey::from(["a", "bc"]));
    assert!(!QueryKey::from(["feedback"]).starts_with(&QueryKey::from(["feed"])));
  }

  #[test]
  fn test_child_and_display() {
    let key = QueryKey::from(["chat", "messages"]).child("c1");
    assert_eq!(key.parts().len(), 3);
    assert_eq!(key.to_string(), "chat:messages:c1");
  }
}
