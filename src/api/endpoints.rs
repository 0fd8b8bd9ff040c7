//! Every backend route, by name.
//!
//! Fixed routes are constants; parameterized routes are functions. Identifiers
//! and free-text queries are percent-encoded but otherwise passed through;
//! a bad identifier comes back from the server as a 404.

use url::form_urlencoded;

/// Percent-encode a path segment or query value (space becomes `%20`).
pub fn encode(value: &str) -> String {
  // byte_serialize writes '+' for space and escapes a literal '+'
  form_urlencoded::byte_serialize(value.as_bytes())
    .collect::<String>()
    .replace('+', "%20")
}

/// Append query parameters, skipping `None` values.
pub fn with_query(path: &str, params: &[(&str, Option<String>)]) -> String {
  let mut serializer = form_urlencoded::Serializer::new(String::new());
  for (name, value) in params {
    if let Some(value) = value {
      serializer.append_pair(name, value);
    }
  }
  let query = serializer.finish();
  if query.is_empty() {
    path.to_string()
  } else {
    format!("{}?{}", path, query)
  }
}

pub mod auth {
  pub const REGISTER: &str = "/api/auth/register";
  pub const LOGIN: &str = "/api/auth/login";
  pub const LOGOUT: &str = "/api/auth/logout";
  pub const ME: &str = "/api/auth/me";

  pub fn verify_email(token: &str) -> String {
    format!("/api/auth/verify-email/{}", super::encode(token))
  }
}

pub mod universities {
  pub const LIST: &str = "/api/universities/";
  pub const VERIFY_EMAIL: &str = "/api/universities/verify-email";

  pub fn search(query: &str) -> String {
    format!("/api/universities/search?q={}", super::encode(query))
  }

  pub fn by_domain(domain: &str) -> String {
    format!("/api/universities/domain/{}", super::encode(domain))
  }
}

pub mod housing {
  pub const LISTINGS: &str = "/api/housing/listings";

  pub fn listing(id: &str) -> String {
    format!("/api/housing/listings/{}", super::encode(id))
  }

  pub fn search(query: &str) -> String {
    format!("/api/housing/search?q={}", super::encode(query))
  }

  pub fn user_listings(user_id: &str) -> String {
    format!("/api/housing/users/{}/listings", super::encode(user_id))
  }

  pub fn listing_like(id: &str) -> String {
    format!("/api/housing/listings/{}/like", super::encode(id))
  }

  pub fn listing_activate(id: &str) -> String {
    format!("/api/housing/listings/{}/activate", super::encode(id))
  }

  pub fn listing_deactivate(id: &str) -> String {
    format!("/api/housing/listings/{}/deactivate", super::encode(id))
  }
}

pub mod feed {
  pub const FEED: &str = "/api/feed";
  pub const POSTS: &str = "/api/feed/posts";

  pub fn post(id: &str) -> String {
    format!("/api/feed/posts/{}", super::encode(id))
  }

  pub fn post_like(id: &str) -> String {
    format!("/api/feed/posts/{}/like", super::encode(id))
  }

  pub fn post_comment(id: &str) -> String {
    format!("/api/feed/posts/{}/comments", super::encode(id))
  }

  pub fn user_posts(user_id: &str) -> String {
    format!("/api/feed/users/{}/posts", super::encode(user_id))
  }
}

pub mod chat {
  pub const CONVERSATIONS: &str = "/api/chat/conversations";
  pub const UNREAD_COUNT: &str = "/api/chat/unread-count";
  pub const SEARCH: &str = "/api/chat/search";

  pub fn conversation(id: &str) -> String {
    format!("/api/chat/conversations/{}", super::encode(id))
  }

  pub fn conversation_messages(id: &str) -> String {
    format!("/api/chat/conversations/{}/messages", super::encode(id))
  }

  pub fn conversation_mark_read(id: &str) -> String {
    format!("/api/chat/conversations/{}/mark-read", super::encode(id))
  }

  pub fn users_search(query: &str) -> String {
    format!("/api/chat/users/search?q={}", super::encode(query))
  }
}

pub mod profile {
  pub const ME: &str = "/api/profile/me";
  pub const ME_STATS: &str = "/api/profile/me/stats";
  pub const SEARCH: &str = "/api/profile/search";

  pub fn by_user(user_id: &str) -> String {
    format!("/api/profile/{}", super::encode(user_id))
  }
}

/// Olive, the AI housing concierge
pub mod assistant {
  pub const CHAT: &str = "/api/olive/chat";
  pub const CONVERSATIONS: &str = "/api/olive/conversations";

  pub fn conversation(id: &str) -> String {
    format!("/api/olive/conversations/{}", super::encode(id))
  }

  pub fn conversation_title(id: &str) -> String {
    format!("/api/olive/conversations/{}/title", super::encode(id))
  }
}
