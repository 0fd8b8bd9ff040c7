//! Cache keys used by the pages. Writes invalidate by prefix, so related
//! reads share a leading part.

use crate::api::types::ListingFilters;
use crate::query::QueryKey;

pub fn auth_me() -> QueryKey {
  QueryKey::from(["auth", "me"])
}

pub fn housing() -> QueryKey {
  QueryKey::from(["housing"])
}

/// Unfiltered browsing uses `housing:list`; filtered views hang off it.
pub fn housing_list(filters: &ListingFilters) -> QueryKey {
  let base = QueryKey::from(["housing", "list"]);
  let fragment = filters.key_fragment();
  if fragment.is_empty() {
    base
  } else {
    base.child(fragment)
  }
}

pub fn housing_listing(id: &str) -> QueryKey {
  QueryKey::from(["housing", "listing"]).child(id)
}

pub fn housing_search(query: &str) -> QueryKey {
  QueryKey::from(["housing", "search"]).child(query)
}

pub fn housing_mine() -> QueryKey {
  QueryKey::from(["housing", "mine"])
}

pub fn feed() -> QueryKey {
  QueryKey::from(["feed"])
}

/// First page of the feed.
pub fn feed_posts() -> QueryKey {
  QueryKey::from(["feed", "posts"])
}

/// Later pages get their own segment so they never collide with a post id.
pub fn feed_page(page: u32) -> QueryKey {
  QueryKey::from(["feed", "page"]).child(page.to_string())
}

pub fn feed_post(id: &str) -> QueryKey {
  QueryKey::from(["feed", "post"]).child(id)
}

pub fn user_posts(user_id: &str) -> QueryKey {
  QueryKey::from(["feed", "user"]).child(user_id)
}

pub fn chat() -> QueryKey {
  QueryKey::from(["chat"])
}

pub fn chat_conversations() -> QueryKey {
  QueryKey::from(["chat", "conversations"])
}

pub fn chat_messages(conversation_id: &str) -> QueryKey {
  QueryKey::from(["chat", "messages"]).child(conversation_id)
}

/// Message search, optionally scoped to one conversation.
pub fn chat_search(query: &str, conversation_id: Option<&str>) -> QueryKey {
  let key = QueryKey::from(["chat", "search"]).child(query);
  match conversation_id {
    Some(id) => key.child(id),
    None => key,
  }
}

pub fn chat_users(query: &str) -> QueryKey {
  QueryKey::from(["chat", "users"]).child(query)
}

pub fn profile_me() -> QueryKey {
  QueryKey::from(["profile", "me"])
}

pub fn profile_stats() -> QueryKey {
  QueryKey::from(["profile", "stats"])
}

pub fn profile() -> QueryKey {
  QueryKey::from(["profile"])
}

pub fn profile_user(user_id: &str) -> QueryKey {
  QueryKey::from(["profile", "user"]).child(user_id)
}

pub fn profile_search(query: &str) -> QueryKey {
  QueryKey::from(["profile", "search"]).child(query)
}

pub fn assistant() -> QueryKey {
  QueryKey::from(["assistant"])
}

pub fn assistant_conversations() -> QueryKey {
  QueryKey::from(["assistant", "conversations"])
}

pub fn assistant_conversation(id: &str) -> QueryKey {
  QueryKey::from(["assistant", "conversation"]).child(id)
}

pub fn universities(query: Option<&str>) -> QueryKey {
  let base = QueryKey::from(["universities"]);
  match query {
    Some(q) => base.child(q),
    None => base,
  }
}
