//! Payloads exchanged with the backend.
//!
//! Fields the backend may omit are defaulted so that partial or older
//! responses still decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  pub email: String,
  pub full_name: String,
  #[serde(default)]
  pub university_id: Option<String>,
  #[serde(default)]
  pub university_email: Option<String>,
  #[serde(default)]
  pub profile_picture_url: Option<String>,
  #[serde(default)]
  pub is_verified: bool,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
  pub full_name: String,
  pub university_email: String,
  pub university_domain: String,
  pub password: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  #[serde(default = "default_token_type")]
  pub token_type: String,
  pub user: User,
}

fn default_token_type() -> String {
  "bearer".to_string()
}

/// Signup either signs the user in or asks them to confirm their email first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RegisterOutcome {
  SignedIn(TokenResponse),
  ConfirmationRequired(RegistrationConfirmation),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistrationConfirmation {
  pub message: String,
  #[serde(default)]
  pub email: Option<String>,
}

// ============================================================================
// Universities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct University {
  pub id: String,
  pub name: String,
  pub domain: String,
  #[serde(default)]
  pub country: Option<String>,
  #[serde(default)]
  pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailCheckRequest {
  pub email: String,
}

/// Whether an address belongs to a known university.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmailCheck {
  pub is_valid: bool,
  #[serde(default)]
  pub university: Option<University>,
  #[serde(default)]
  pub message: Option<String>,
}

// ============================================================================
// Housing
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
  Apartment,
  Sublet,
  Room,
  House,
}

impl PropertyType {
  pub fn as_str(&self) -> &'static str {
    match self {
      PropertyType::Apartment => "apartment",
      PropertyType::Sublet => "sublet",
      PropertyType::Room => "room",
      PropertyType::House => "house",
    }
  }
}

impl std::str::FromStr for PropertyType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "apartment" => Ok(PropertyType::Apartment),
      "sublet" => Ok(PropertyType::Sublet),
      "room" => Ok(PropertyType::Room),
      "house" => Ok(PropertyType::House),
      other => Err(format!(
        "unknown property type '{}' (expected apartment, sublet, room or house)",
        other
      )),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HousingListing {
  pub id: String,
  #[serde(default)]
  pub user_id: Option<String>,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub address: String,
  #[serde(default)]
  pub city: String,
  #[serde(default)]
  pub state: String,
  #[serde(default)]
  pub zip_code: Option<String>,
  #[serde(default)]
  pub price: f64,
  #[serde(default)]
  pub bedrooms: Option<u32>,
  #[serde(default)]
  pub bathrooms: Option<f32>,
  #[serde(default)]
  pub square_feet: Option<u32>,
  #[serde(default)]
  pub property_type: Option<PropertyType>,
  #[serde(default)]
  pub amenities: Vec<String>,
  #[serde(default)]
  pub images: Vec<String>,
  #[serde(default)]
  pub contact_email: Option<String>,
  #[serde(default)]
  pub contact_phone: Option<String>,
  #[serde(default = "default_true")]
  pub is_active: bool,
  #[serde(default)]
  pub like_count: u64,
  #[serde(default)]
  pub view_count: u64,
  #[serde(default)]
  pub is_liked_by_current_user: Option<bool>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Serialize)]
pub struct NewListing {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub address: String,
  pub city: String,
  pub state: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub zip_code: Option<String>,
  pub price: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bedrooms: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bathrooms: Option<f32>,
  pub property_type: PropertyType,
  pub amenities: Vec<String>,
  pub images: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub contact_email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub contact_phone: Option<String>,
}

/// Partial update; unset fields are left alone by the server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListingUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_active: Option<bool>,
}

impl ListingUpdate {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.description.is_none()
      && self.price.is_none()
      && self.is_active.is_none()
  }
}

/// Filters accepted by the listings endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilters {
  pub page: Option<u32>,
  pub page_size: Option<u32>,
  pub min_price: Option<f64>,
  pub max_price: Option<f64>,
  pub bedrooms: Option<u32>,
  pub property_type: Option<PropertyType>,
  pub city: Option<String>,
  pub state: Option<String>,
}

impl ListingFilters {
  pub fn query_pairs(&self) -> Vec<(&'static str, Option<String>)> {
    vec![
      ("page", self.page.map(|v| v.to_string())),
      ("page_size", self.page_size.map(|v| v.to_string())),
      ("min_price", self.min_price.map(|v| v.to_string())),
      ("max_price", self.max_price.map(|v| v.to_string())),
      ("bedrooms", self.bedrooms.map(|v| v.to_string())),
      (
        "property_type",
        self.property_type.map(|p| p.as_str().to_string()),
      ),
      ("city", self.city.clone()),
      ("state", self.state.clone()),
    ]
  }

  /// Stable cache-key fragment; empty when no filter is set.
  pub fn key_fragment(&self) -> String {
    self
      .query_pairs()
      .into_iter()
      .filter_map(|(name, value)| value.map(|v| format!("{}={}", name, v)))
      .collect::<Vec<_>>()
      .join("&")
  }
}

// ============================================================================
// Feed
// ============================================================================

/// Compact user card embedded in posts, conversations and search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
  pub id: String,
  pub full_name: String,
  #[serde(default)]
  pub profile_picture_url: Option<String>,
  #[serde(default)]
  pub university_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
  pub id: String,
  #[serde(default)]
  pub user_id: Option<String>,
  #[serde(default)]
  pub content: Option<String>,
  #[serde(default)]
  pub media_urls: Vec<String>,
  #[serde(default)]
  pub like_count: u64,
  #[serde(default)]
  pub comment_count: u64,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub user: Option<Author>,
  #[serde(default)]
  pub is_liked_by_current_user: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
  pub content: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub media_urls: Vec<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub media_types: Vec<String>,
}

/// Only the text of a post can be edited.
#[derive(Debug, Clone, Serialize)]
pub struct PostUpdate {
  pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment {
  pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Comment {
  pub id: String,
  #[serde(default)]
  pub post_id: Option<String>,
  #[serde(default)]
  pub content: String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub id: String,
  pub conversation_id: String,
  #[serde(default)]
  pub sender_id: Option<String>,
  #[serde(default)]
  pub content: String,
  #[serde(default)]
  pub is_read: bool,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
  pub id: String,
  #[serde(default)]
  pub participant_1_id: Option<String>,
  #[serde(default)]
  pub participant_2_id: Option<String>,
  #[serde(default)]
  pub last_message_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub other_participant: Option<Author>,
  #[serde(default)]
  pub last_message: Option<Message>,
  #[serde(default)]
  pub unread_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
  pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewConversation {
  pub participant_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UnreadCount {
  #[serde(default)]
  pub unread_count: u64,
}

// ============================================================================
// Profile
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  pub id: String,
  pub full_name: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub university_name: Option<String>,
  #[serde(default)]
  pub bio: Option<String>,
  #[serde(default)]
  pub interests: Vec<String>,
  #[serde(default)]
  pub major: Option<String>,
  #[serde(default)]
  pub graduation_year: Option<u16>,
  #[serde(default)]
  pub profile_picture_url: Option<String>,
  #[serde(default)]
  pub is_verified: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub full_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bio: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub interests: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub major: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub graduation_year: Option<u16>,
}

impl ProfileUpdate {
  pub fn is_empty(&self) -> bool {
    self.full_name.is_none()
      && self.bio.is_none()
      && self.interests.is_none()
      && self.major.is_none()
      && self.graduation_year.is_none()
  }
}

/// Profile search criteria. `query` matches names and universities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileSearch {
  pub query: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub university_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub interests: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub graduation_year: Option<u16>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfileStats {
  #[serde(default)]
  pub posts_count: u64,
  #[serde(default)]
  pub listings_count: u64,
  #[serde(default)]
  pub connections_count: u64,
  #[serde(default)]
  pub joined_date: Option<DateTime<Utc>>,
}

// ============================================================================
// Assistant (Olive)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistantRole {
  User,
  Assistant,
  System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub conversation_id: Option<String>,
  pub role: AssistantRole,
  pub content: String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantChatRequest {
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TitleUpdate {
  pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssistantReply {
  pub conversation_id: String,
  pub user_message: AssistantMessage,
  pub assistant_message: AssistantMessage,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssistantConversation {
  pub id: String,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub message_count: u64,
  #[serde(default)]
  pub last_message_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssistantConversationDetail {
  pub id: String,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub messages: Vec<AssistantMessage>,
}
