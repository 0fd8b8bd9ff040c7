//! Typed operations for every backend endpoint.

use serde_json::Value;
use tracing::{info, warn};

use super::client::ApiClient;
use super::endpoints::{self, assistant, auth, chat, feed, housing, profile, universities};
use super::envelope::normalize_list;
use super::error::ApiError;
use super::types::*;
use crate::credentials::fingerprint;

/// The backend, one method per endpoint.
#[derive(Clone)]
pub struct UniboeApi {
  client: ApiClient,
}

impl UniboeApi {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }

  fn store_token(&self, token: &str) -> Result<(), ApiError> {
    self
      .client
      .credentials()
      .set(token)
      .map_err(|e| ApiError::Storage(e.to_string()))?;
    info!(token = %fingerprint(token), "signed in");
    Ok(())
  }

  fn clear_token(&self) -> Result<(), ApiError> {
    self
      .client
      .credentials()
      .clear()
      .map_err(|e| ApiError::Storage(e.to_string()))
  }

  pub fn is_signed_in(&self) -> Result<bool, ApiError> {
    self
      .client
      .credentials()
      .get()
      .map(|t| t.is_some())
      .map_err(|e| ApiError::Storage(e.to_string()))
  }

  // --------------------------------------------------------------------------
  // Auth
  // --------------------------------------------------------------------------

  pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
    let request = LoginRequest {
      email: email.to_string(),
      password: password.to_string(),
    };
    let response: TokenResponse = self.client.post(auth::LOGIN, &request).await?;
    self.store_token(&response.access_token)?;
    Ok(response)
  }

  pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterOutcome, ApiError> {
    let outcome: RegisterOutcome = self.client.post(auth::REGISTER, request).await?;
    if let RegisterOutcome::SignedIn(ref token) = outcome {
      self.store_token(&token.access_token)?;
    }
    Ok(outcome)
  }

  /// Sign out. The local credential is dropped even if the server call fails.
  pub async fn logout(&self) -> Result<(), ApiError> {
    let result = self.client.post_empty::<Value>(auth::LOGOUT).await;
    self.clear_token()?;
    info!("signed out");
    if let Err(ref e) = result {
      warn!(error = %e, "logout request failed; local session cleared anyway");
    }
    result.map(|_| ())
  }

  pub async fn me(&self) -> Result<User, ApiError> {
    self.client.get(auth::ME).await
  }

  pub async fn verify_email(&self, token: &str) -> Result<Value, ApiError> {
    self.client.get_value(&auth::verify_email(token)).await
  }

  // --------------------------------------------------------------------------
  // Universities
  // --------------------------------------------------------------------------

  pub async fn universities(&self) -> Result<Vec<University>, ApiError> {
    let value = self.client.get_value(universities::LIST).await?;
    normalize_list(value, "universities")
  }

  pub async fn search_universities(&self, query: &str) -> Result<Vec<University>, ApiError> {
    let value = self.client.get_value(&universities::search(query)).await?;
    normalize_list(value, "universities")
  }

  pub async fn university_by_domain(&self, domain: &str) -> Result<University, ApiError> {
    self.client.get(&universities::by_domain(domain)).await
  }

  pub async fn check_university_email(&self, email: &str) -> Result<EmailCheck, ApiError> {
    let request = EmailCheckRequest {
      email: email.trim().to_string(),
    };
    self.client.post(universities::VERIFY_EMAIL, &request).await
  }

  // --------------------------------------------------------------------------
  // Housing
  // --------------------------------------------------------------------------

  pub async fn listings(&self, filters: &ListingFilters) -> Result<Vec<HousingListing>, ApiError> {
    let path = endpoints::with_query(housing::LISTINGS, &filters.query_pairs());
    let value = self.client.get_value(&path).await?;
    normalize_list(value, "listings")
  }

  pub async fn listing(&self, id: &str) -> Result<HousingListing, ApiError> {
    self.client.get(&housing::listing(id)).await
  }

  pub async fn create_listing(&self, listing: &NewListing) -> Result<HousingListing, ApiError> {
    self.client.post(housing::LISTINGS, listing).await
  }

  pub async fn update_listing(
    &self,
    id: &str,
    update: &ListingUpdate,
  ) -> Result<HousingListing, ApiError> {
    self.client.put(&housing::listing(id), update).await
  }

  pub async fn delete_listing(&self, id: &str) -> Result<(), ApiError> {
    self
      .client
      .delete::<Value>(&housing::listing(id))
      .await
      .map(|_| ())
  }

  pub async fn search_listings(&self, query: &str) -> Result<Vec<HousingListing>, ApiError> {
    let value = self.client.get_value(&housing::search(query)).await?;
    normalize_list(value, "listings")
  }

  /// Listings owned by the signed-in user.
  pub async fn my_listings(&self) -> Result<Vec<HousingListing>, ApiError> {
    let me = self.me().await?;
    let value = self.client.get_value(&housing::user_listings(&me.id)).await?;
    normalize_list(value, "listings")
  }

  pub async fn like_listing(&self, id: &str) -> Result<(), ApiError> {
    self
      .client
      .post_empty::<Value>(&housing::listing_like(id))
      .await
      .map(|_| ())
  }

  pub async fn unlike_listing(&self, id: &str) -> Result<(), ApiError> {
    self
      .client
      .delete::<Value>(&housing::listing_like(id))
      .await
      .map(|_| ())
  }

  pub async fn set_listing_active(&self, id: &str, active: bool) -> Result<HousingListing, ApiError> {
    let path = if active {
      housing::listing_activate(id)
    } else {
      housing::listing_deactivate(id)
    };
    self.client.post_empty(&path).await
  }

  // --------------------------------------------------------------------------
  // Feed
  // --------------------------------------------------------------------------

  pub async fn posts(&self, page: Option<u32>) -> Result<Vec<Post>, ApiError> {
    let path = endpoints::with_query(feed::FEED, &[("page", page.map(|p| p.to_string()))]);
    let value = self.client.get_value(&path).await?;
    normalize_list(value, "posts")
  }

  pub async fn create_post(&self, post: &NewPost) -> Result<Post, ApiError> {
    self.client.post(feed::POSTS, post).await
  }

  pub async fn post(&self, id: &str) -> Result<Post, ApiError> {
    self.client.get(&feed::post(id)).await
  }

  /// Replace the text of one of the signed-in user's posts.
  pub async fn update_post(&self, id: &str, content: &str) -> Result<Post, ApiError> {
    let update = PostUpdate {
      content: content.trim().to_string(),
    };
    self.client.put(&feed::post(id), &update).await
  }

  pub async fn delete_post(&self, id: &str) -> Result<(), ApiError> {
    self
      .client
      .delete::<Value>(&feed::post(id))
      .await
      .map(|_| ())
  }

  pub async fn like_post(&self, id: &str) -> Result<(), ApiError> {
    self
      .client
      .post_empty::<Value>(&feed::post_like(id))
      .await
      .map(|_| ())
  }

  pub async fn unlike_post(&self, id: &str) -> Result<(), ApiError> {
    self
      .client
      .delete::<Value>(&feed::post_like(id))
      .await
      .map(|_| ())
  }

  pub async fn comment_on_post(&self, id: &str, content: &str) -> Result<Comment, ApiError> {
    let comment = NewComment {
      content: content.to_string(),
    };
    self.client.post(&feed::post_comment(id), &comment).await
  }

  pub async fn user_posts(&self, user_id: &str) -> Result<Vec<Post>, ApiError> {
    let value = self.client.get_value(&feed::user_posts(user_id)).await?;
    normalize_list(value, "posts")
  }

  // --------------------------------------------------------------------------
  // Chat
  // --------------------------------------------------------------------------

  pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
    let value = self.client.get_value(chat::CONVERSATIONS).await?;
    normalize_list(value, "conversations")
  }

  pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
    let value = self
      .client
      .get_value(&chat::conversation_messages(conversation_id))
      .await?;
    normalize_list(value, "messages")
  }

  pub async fn send_message(&self, conversation_id: &str, content: &str) -> Result<Message, ApiError> {
    let message = NewMessage {
      content: content.to_string(),
    };
    self
      .client
      .post(&chat::conversation_messages(conversation_id), &message)
      .await
  }

  pub async fn search_users(&self, query: &str) -> Result<Vec<Author>, ApiError> {
    let value = self.client.get_value(&chat::users_search(query)).await?;
    normalize_list(value, "users")
  }

  pub async fn start_conversation(&self, participant_id: &str) -> Result<Conversation, ApiError> {
    let request = NewConversation {
      participant_id: participant_id.to_string(),
    };
    self.client.post(chat::CONVERSATIONS, &request).await
  }

  pub async fn mark_conversation_read(&self, conversation_id: &str) -> Result<(), ApiError> {
    self
      .client
      .post_empty::<Value>(&chat::conversation_mark_read(conversation_id))
      .await
      .map(|_| ())
  }

  pub async fn unread_count(&self) -> Result<UnreadCount, ApiError> {
    self.client.get(chat::UNREAD_COUNT).await
  }

  /// Removes the conversation and every message in it.
  pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ApiError> {
    self
      .client
      .delete::<Value>(&chat::conversation(conversation_id))
      .await
      .map(|_| ())
  }

  /// Messages containing `query`, newest first, optionally within one conversation.
  pub async fn search_messages(
    &self,
    query: &str,
    conversation_id: Option<&str>,
  ) -> Result<Vec<Message>, ApiError> {
    let path = endpoints::with_query(
      chat::SEARCH,
      &[
        ("q", Some(query.to_string())),
        ("conversation_id", conversation_id.map(String::from)),
      ],
    );
    let value = self.client.get_value(&path).await?;
    normalize_list(value, "messages")
  }

  // --------------------------------------------------------------------------
  // Profile
  // --------------------------------------------------------------------------

  pub async fn my_profile(&self) -> Result<Profile, ApiError> {
    self.client.get(profile::ME).await
  }

  pub async fn profile(&self, user_id: &str) -> Result<Profile, ApiError> {
    self.client.get(&profile::by_user(user_id)).await
  }

  pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
    self.client.put(profile::ME, update).await
  }

  pub async fn profile_stats(&self) -> Result<ProfileStats, ApiError> {
    self.client.get(profile::ME_STATS).await
  }

  pub async fn search_profiles(&self, search: &ProfileSearch) -> Result<Vec<Profile>, ApiError> {
    let value: Value = self.client.post(profile::SEARCH, search).await?;
    normalize_list(value, "profiles")
  }

  // --------------------------------------------------------------------------
  // Assistant
  // --------------------------------------------------------------------------

  pub async fn ask_assistant(
    &self,
    message: &str,
    conversation_id: Option<&str>,
  ) -> Result<AssistantReply, ApiError> {
    let request = AssistantChatRequest {
      message: message.trim().to_string(),
      conversation_id: conversation_id.map(String::from),
    };
    self.client.post(assistant::CHAT, &request).await
  }

  pub async fn assistant_history(&self) -> Result<Vec<AssistantConversation>, ApiError> {
    let value = self.client.get_value(assistant::CONVERSATIONS).await?;
    normalize_list(value, "conversations")
  }

  pub async fn assistant_conversation(
    &self,
    id: &str,
  ) -> Result<AssistantConversationDetail, ApiError> {
    self.client.get(&assistant::conversation(id)).await
  }

  pub async fn rename_assistant_conversation(
    &self,
    id: &str,
    title: &str,
  ) -> Result<AssistantConversation, ApiError> {
    let update = TitleUpdate {
      title: title.trim().to_string(),
    };
    self
      .client
      .put(&assistant::conversation_title(id), &update)
      .await
  }

  pub async fn delete_assistant_conversation(&self, id: &str) -> Result<(), ApiError> {
    self
      .client
      .delete::<Value>(&assistant::conversation(id))
      .await
      .map(|_| ())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::transport::mock::MockTransport;
  use crate::api::transport::Method;
  use crate::credentials::{CredentialStore, MemoryCredentialStore};
  use std::sync::Arc;

  const TOKEN_BODY: &str = r#"{
    "access_token": "tok-1",
    "token_type": "bearer",
    "user": {"id": "u1", "email": "ada@nyu.edu", "full_name": "Ada Lovelace"}
  }"#;

  fn api_with(transport: Arc<MockTransport>) -> (UniboeApi, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::new());
    let client = ApiClient::new("http://api.test", transport, store.clone());
    (UniboeApi::new(client), store)
  }

  #[tokio::test]
  async fn test_login_stores_token() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Post, auth::LOGIN, 200, TOKEN_BODY);
    let (api, store) = api_with(transport.clone());

    let response = api.login("ada@nyu.edu", "Secret123").await.unwrap();

    assert_eq!(response.user.full_name, "Ada Lovelace");
    assert_eq!(store.get().unwrap().as_deref(), Some("tok-1"));
    let body = transport.requests()[0].body.clone().unwrap();
    assert!(body.contains("\"email\":\"ada@nyu.edu\""));
  }

  #[tokio::test]
  async fn test_failed_login_keeps_no_token() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Post, auth::LOGIN, 400, "Invalid credentials");
    let (api, store) = api_with(transport);

    assert!(api.login("ada@nyu.edu", "wrong").await.is_err());
    assert_eq!(store.get().unwrap(), None);
  }

  #[tokio::test]
  async fn test_logout_clears_token_even_on_failure() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Post, auth::LOGOUT, 500, "boom");
    let (api, store) = api_with(transport);
    store.set("tok-1").unwrap();

    assert!(api.logout().await.is_err());
    assert_eq!(store.get().unwrap(), None);
  }

  #[tokio::test]
  async fn test_listings_unwraps_named_envelope() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Get,
      housing::LISTINGS,
      200,
      r#"{"listings": [{"id": "a", "title": "A"}, {"id": "b", "title": "B"}], "total": 2}"#,
    );
    let (api, _) = api_with(transport);

    let listings = api.listings(&ListingFilters::default()).await.unwrap();
    let ids: Vec<_> = listings.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
  }

  #[tokio::test]
  async fn test_listing_filters_become_query_string() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Get,
      "/api/housing/listings?max_price=1500&city=New+York",
      200,
      "[]",
    );
    let (api, _) = api_with(transport.clone());

    let filters = ListingFilters {
      max_price: Some(1500.0),
      city: Some("New York".into()),
      ..Default::default()
    };
    let listings = api.listings(&filters).await.unwrap();
    assert!(listings.is_empty());
  }

  #[tokio::test]
  async fn test_my_listings_resolves_current_user() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Get,
      auth::ME,
      200,
      r#"{"id": "u1", "email": "ada@nyu.edu", "full_name": "Ada Lovelace"}"#,
    );
    transport.respond(
      Method::Get,
      "/api/housing/users/u1/listings",
      200,
      r#"{"data": [{"id": "mine", "title": "Mine"}]}"#,
    );
    let (api, _) = api_with(transport);

    let listings = api.my_listings().await.unwrap();
    assert_eq!(listings[0].id, "mine");
  }

  #[tokio::test]
  async fn test_send_message_posts_content() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Post,
      "/api/chat/conversations/c1/messages",
      201,
      r#"{"id": "m9", "conversation_id": "c1", "content": "hello"}"#,
    );
    let (api, _) = api_with(transport.clone());

    let message = api.send_message("c1", "hello").await.unwrap();
    assert_eq!(message.id, "m9");
    assert_eq!(
      transport.requests()[0].body.as_deref(),
      Some("{\"content\":\"hello\"}")
    );
  }

  #[tokio::test]
  async fn test_assistant_request_trims_message() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Post,
      assistant::CHAT,
      200,
      r#"{
        "conversation_id": "o1",
        "user_message": {"role": "user", "content": "hi"},
        "assistant_message": {"role": "assistant", "content": "Hello!"}
      }"#,
    );
    let (api, _) = api_with(transport.clone());

    let reply = api.ask_assistant("  hi  ", None).await.unwrap();
    assert_eq!(reply.assistant_message.content, "Hello!");
    assert_eq!(
      transport.requests()[0].body.as_deref(),
      Some("{\"message\":\"hi\"}")
    );
  }

  #[tokio::test]
  async fn test_message_search_scopes_to_conversation() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Get,
      "/api/chat/search?q=lease+renewal&conversation_id=c1",
      200,
      r#"[{"id": "m1", "conversation_id": "c1", "content": "lease renewal is in May"}]"#,
    );
    let (api, _) = api_with(transport.clone());

    let found = api.search_messages("lease renewal", Some("c1")).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].content, "lease renewal is in May");
  }

  #[tokio::test]
  async fn test_profile_search_posts_criteria() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Post,
      profile::SEARCH,
      200,
      r#"{
        "profiles": [{"id": "u2", "full_name": "Grace Hopper"}],
        "total": 1, "page": 1, "page_size": 20, "has_more": false
      }"#,
    );
    let (api, _) = api_with(transport.clone());

    let search = ProfileSearch {
      query: "Grace".into(),
      graduation_year: Some(2026),
      ..Default::default()
    };
    let profiles = api.search_profiles(&search).await.unwrap();

    assert_eq!(profiles[0].full_name, "Grace Hopper");
    assert_eq!(
      transport.requests()[0].body.as_deref(),
      Some("{\"query\":\"Grace\",\"graduation_year\":2026}")
    );
  }

  #[tokio::test]
  async fn test_deleting_a_post_accepts_no_content() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Delete, "/api/feed/posts/p1", 204, "");
    let (api, _) = api_with(transport.clone());

    api.delete_post("p1").await.unwrap();
    assert_eq!(transport.calls(Method::Delete, "/api/feed/posts/p1"), 1);
  }
}
