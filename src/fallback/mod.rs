//! Bundled sample content shown when the backend has nothing to give.
//!
//! Substitution happens only when data is absent. An empty list from the
//! backend is a real answer and is shown as such.

mod assistant;

pub use assistant::OfflineAssistant;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::api::types::{Conversation, HousingListing, Post};

const SAMPLE_LISTINGS: &str = include_str!("../../data/sample_listings.json");
const SAMPLE_POSTS: &str = include_str!("../../data/sample_posts.json");
const SAMPLE_CONVERSATIONS: &str = include_str!("../../data/sample_conversations.json");

fn parse_sample<T: DeserializeOwned>(name: &str, raw: &str) -> Vec<T> {
  match serde_json::from_str(raw) {
    Ok(items) => items,
    Err(e) => {
      warn!(sample = name, error = %e, "bundled sample data is malformed");
      Vec::new()
    }
  }
}

pub fn sample_listings() -> Vec<HousingListing> {
  parse_sample("listings", SAMPLE_LISTINGS)
}

pub fn sample_posts() -> Vec<Post> {
  parse_sample("posts", SAMPLE_POSTS)
}

pub fn sample_conversations() -> Vec<Conversation> {
  parse_sample("conversations", SAMPLE_CONVERSATIONS)
}

/// Whether the items on screen came from the backend or the bundled set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
  Live,
  Sample,
}

/// `data` if present (even when empty), otherwise the sample set.
pub fn or_sample<T, F>(data: Option<Vec<T>>, sample: F) -> (Vec<T>, Source)
where
  F: FnOnce() -> Vec<T>,
{
  match data {
    Some(items) => (items, Source::Live),
    None => {
      warn!("no data from backend; showing sample content");
      (sample(), Source::Sample)
    }
  }
}
