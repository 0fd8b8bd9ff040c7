use color_eyre::{eyre::bail, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

use super::{keys, render_result, source_notice, truncate, LOADING};
use crate::api::types::{Author, Conversation, Message};
use crate::api::ApiError;
use crate::app::App;
use crate::fallback::{or_sample, sample_conversations, Source};
use crate::query::{Optimistic, Query, QueryKey};

static NEXT_PENDING: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
  pub id: String,
  pub sender_id: Option<String>,
  pub content: String,
  /// Sent locally, not yet confirmed by the backend
  pub pending: bool,
}

impl From<&Message> for ChatLine {
  fn from(message: &Message) -> Self {
    Self {
      id: message.id.clone(),
      sender_id: message.sender_id.clone(),
      content: message.content.clone(),
      pending: false,
    }
  }
}

/// Messages on screen for one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatView {
  pub lines: Vec<ChatLine>,
}

impl ChatView {
  pub fn from_messages(messages: &[Message]) -> Self {
    Self {
      lines: messages.iter().map(ChatLine::from).collect(),
    }
  }
}

/// Append `content` as a pending line; reverting removes exactly that line.
pub fn append_pending(content: &str) -> Optimistic<ChatView> {
  let id = format!("pending-{}", NEXT_PENDING.fetch_add(1, Ordering::Relaxed));
  let line = ChatLine {
    id: id.clone(),
    sender_id: None,
    content: content.to_string(),
    pending: true,
  };
  Optimistic::new(
    move |view: &mut ChatView| view.lines.push(line),
    move |view: &mut ChatView| view.lines.retain(|l| l.id != id),
  )
}

/// Send a message with the pending line shown immediately.
pub async fn send_message(
  app: &App,
  conversation_id: &str,
  content: &str,
  view: &watch::Sender<ChatView>,
) -> Result<Message, ApiError> {
  let invalidate = [keys::chat_messages(conversation_id), keys::chat_conversations()];
  app
    .queries
    .mutate_optimistic(
      view,
      append_pending(content),
      app.api.send_message(conversation_id, content),
      &invalidate,
    )
    .await
}

/// Conversation list plus, once one is selected, its messages.
pub struct ChatPage {
  app: App,
  conversations: Query<Vec<Conversation>>,
  messages: Query<Vec<Message>>,
}

impl ChatPage {
  pub fn new(app: &App) -> Self {
    let api = app.api.clone();
    let mut conversations = Query::new(app.queries.clone(), keys::chat_conversations(), move || {
      let api = api.clone();
      async move { api.conversations().await }
    })
    .retry(0);
    conversations.fetch();

    Self {
      app: app.clone(),
      conversations,
      messages: messages_query(app, None),
    }
  }

  /// Switch conversations. A request still out for the previous one is left to finish.
  pub fn select(&mut self, conversation_id: &str) {
    self.messages = messages_query(&self.app, Some(conversation_id.to_string()));
    self.messages.fetch();
  }

  /// Go back to the server for the selected conversation.
  pub fn refresh_messages(&mut self) {
    self.messages.refetch();
  }

  pub async fn load(&mut self) {
    self.conversations.resolve().await;
    self.messages.resolve().await;
  }

  pub fn conversations(&self) -> Option<(Vec<Conversation>, Source)> {
    let result = self.conversations.result();
    if result.is_loading && result.data.is_none() {
      return None;
    }
    Some(or_sample(
      result.data.map(|d| d.as_ref().clone()),
      sample_conversations,
    ))
  }

  pub fn view(&self) -> ChatView {
    match self.messages.result().data {
      Some(messages) => ChatView::from_messages(&messages),
      None => ChatView::default(),
    }
  }

  pub fn render_conversations(&self) -> String {
    let (conversations, source) = match self.conversations() {
      Some(shown) => shown,
      None => return LOADING.to_string(),
    };

    let error = self.conversations.result().error;
    let mut lines: Vec<String> = source_notice(source, error.as_ref(), "conversations")
      .into_iter()
      .collect();
    if conversations.is_empty() {
      lines.push("No conversations yet.".to_string());
    }
    lines.extend(conversations.iter().map(conversation_row));
    lines.join("\n")
  }

  pub fn render_messages(&self) -> String {
    if !self.messages.is_enabled() {
      return "Select a conversation.".to_string();
    }
    let result = self.messages.result();
    render_result(&result, |_| render_view(&self.view()))
  }
}

fn messages_query(app: &App, conversation_id: Option<String>) -> Query<Vec<Message>> {
  let enabled = conversation_id.is_some();
  let key = match &conversation_id {
    Some(id) => keys::chat_messages(id),
    None => QueryKey::from(["chat", "messages"]),
  };
  let api = app.api.clone();
  Query::new(app.queries.clone(), key, move || {
    let api = api.clone();
    let id = conversation_id.clone().unwrap_or_default();
    async move { api.messages(&id).await }
  })
  .enabled(enabled)
}

fn conversation_row(conversation: &Conversation) -> String {
  let with = conversation
    .other_participant
    .as_ref()
    .map(|p| p.full_name.as_str())
    .unwrap_or("Unknown");
  let preview = conversation
    .last_message
    .as_ref()
    .map(|m| truncate(&m.content, 50))
    .unwrap_or_default();
  let unread = if conversation.unread_count > 0 {
    format!(" ({} unread)", conversation.unread_count)
  } else {
    String::new()
  };
  format!("{:<24} {}{}  {}", conversation.id, with, unread, preview)
}

fn render_view(view: &ChatView) -> String {
  if view.lines.is_empty() {
    return "No messages yet.".to_string();
  }
  view
    .lines
    .iter()
    .map(|line| {
      let who = line.sender_id.as_deref().unwrap_or("me");
      let marker = if line.pending { " (sending)" } else { "" };
      format!("{}: {}{}", who, line.content, marker)
    })
    .collect::<Vec<_>>()
    .join("\n")
}

fn user_row(user: &Author) -> String {
  match &user.university_name {
    Some(university) => format!("{:<36} {} ({})", user.id, user.full_name, university),
    None => format!("{:<36} {}", user.id, user.full_name),
  }
}

pub async fn list(app: &App) -> Result<String> {
  let mut page = ChatPage::new(app);
  page.load().await;
  Ok(page.render_conversations())
}

pub async fn messages(app: &App, conversation_id: &str) -> Result<String> {
  let mut page = ChatPage::new(app);
  page.select(conversation_id);
  page.load().await;
  if let Err(e) = app.api.mark_conversation_read(conversation_id).await {
    tracing::debug!(error = %e, "could not mark conversation read");
  }
  Ok(page.render_messages())
}

pub async fn send(app: &App, conversation_id: &str, content: &str) -> Result<String> {
  let mut page = ChatPage::new(app);
  page.select(conversation_id);
  page.load().await;
  let (view, _rx) = watch::channel(page.view());

  match send_message(app, conversation_id, content, &view).await {
    Ok(_) => {
      page.refresh_messages();
      page.load().await;
      Ok(page.render_messages())
    }
    Err(e) => Ok(format!(
      "Message not sent: {}\n{}",
      e,
      render_view(&view.borrow())
    )),
  }
}

pub async fn users(app: &App, text: &str) -> Result<String> {
  let api = app.api.clone();
  let needle = text.to_string();
  let mut query = Query::new(app.queries.clone(), keys::chat_users(text), move || {
    let api = api.clone();
    let needle = needle.clone();
    async move { api.search_users(&needle).await }
  });
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, |users| {
    if users.is_empty() {
      "No users found.".to_string()
    } else {
      users.iter().map(user_row).collect::<Vec<_>>().join("\n")
    }
  }))
}

/// Messages mentioning `text`, newest first.
pub async fn search(app: &App, text: &str, conversation_id: Option<&str>) -> Result<String> {
  let text = text.trim();
  if text.is_empty() {
    bail!("Search text is required");
  }
  let api = app.api.clone();
  let needle = text.to_string();
  let scope = conversation_id.map(String::from);
  let mut query = Query::new(
    app.queries.clone(),
    keys::chat_search(text, conversation_id),
    move || {
      let api = api.clone();
      let needle = needle.clone();
      let scope = scope.clone();
      async move { api.search_messages(&needle, scope.as_deref()).await }
    },
  );
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, |messages| {
    if messages.is_empty() {
      return "No messages found.".to_string();
    }
    messages
      .iter()
      .map(|m| format!("[{}] {}", m.conversation_id, truncate(&m.content, 80)))
      .collect::<Vec<_>>()
      .join("\n")
  }))
}

/// Delete a conversation with all of its messages. Cannot be undone.
pub async fn delete(app: &App, conversation_id: &str) -> Result<String> {
  app
    .queries
    .mutate(app.api.delete_conversation(conversation_id), |_| {
      vec![keys::chat()]
    })
    .await?;
  Ok(format!("Deleted conversation {}", conversation_id))
}

pub async fn unread(app: &App) -> Result<String> {
  let api = app.api.clone();
  let mut query = Query::new(
    app.queries.clone(),
    QueryKey::from(["chat", "unread"]),
    move || {
      let api = api.clone();
      async move { api.unread_count().await }
    },
  );
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, |count| match count.unread_count {
    0 => "No unread messages".to_string(),
    1 => "1 unread message".to_string(),
    n => format!("{} unread messages", n),
  }))
}

pub async fn start(app: &App, participant_id: &str) -> Result<String> {
  let conversation = app
    .queries
    .mutate(app.api.start_conversation(participant_id), |_| {
      vec![keys::chat_conversations()]
    })
    .await?;
  Ok(format!("Conversation {}", conversation.id))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::transport::mock::MockTransport;
  use crate::api::transport::Method;
  use crate::app::testing;
  use crate::query::CacheStatus;
  use pretty_assertions::assert_eq;
  use std::sync::Arc;

  const MESSAGES_PATH: &str = "/api/chat/conversations/c1/messages";

  #[tokio::test]
  async fn test_messages_wait_for_a_conversation() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, "/api/chat/conversations", 200, r#"{"conversations": []}"#);
    let (app, _) = testing::app(transport.clone(), Some("tok"));
    app
      .queries
      .set_query_data(&keys::chat_messages("other"), Vec::<Message>::new());

    let mut page = ChatPage::new(&app);
    page.load().await;

    let requested_messages = transport
      .requests()
      .iter()
      .filter(|r| r.url.contains("/messages"))
      .count();
    assert_eq!(requested_messages, 0);
    assert!(page.messages.result().data.is_none());
    assert_eq!(page.render_messages(), "Select a conversation.");
  }

  #[tokio::test]
  async fn test_selecting_a_conversation_loads_messages() {
    let transport = Arc::new(MockTransport::new());
    transport
      .respond(Method::Get, "/api/chat/conversations", 200, "[]")
      .respond(
        Method::Get,
        MESSAGES_PATH,
        200,
        r#"{"messages": [{"id": "m1", "conversation_id": "c1", "sender_id": "u2", "content": "hi"}]}"#,
      );
    let (app, _) = testing::app(transport.clone(), Some("tok"));

    let mut page = ChatPage::new(&app);
    page.select("c1");
    page.load().await;

    assert_eq!(transport.calls(Method::Get, MESSAGES_PATH), 1);
    assert_eq!(page.render_messages(), "u2: hi");
  }

  #[tokio::test]
  async fn test_send_shows_pending_then_invalidates() {
    let (transport, gate) = MockTransport::gated();
    let transport = Arc::new(transport);
    transport.respond(
      Method::Post,
      MESSAGES_PATH,
      201,
      r#"{"id": "m2", "conversation_id": "c1", "content": "hello"}"#,
    );
    let (app, _) = testing::app(transport, Some("tok"));
    app
      .queries
      .set_query_data(&keys::chat_messages("c1"), Vec::<Message>::new());
    app
      .queries
      .set_query_data(&keys::chat_conversations(), Vec::<Conversation>::new());

    let (view, mut rx) = watch::channel(ChatView::default());
    let task = {
      let app = app.clone();
      tokio::spawn(async move {
        let sent = send_message(&app, "c1", "hello", &view).await;
        (sent, view)
      })
    };

    rx.changed().await.unwrap();
    {
      let shown = rx.borrow_and_update();
      assert_eq!(shown.lines.len(), 1);
      assert!(shown.lines[0].pending);
      assert_eq!(shown.lines[0].content, "hello");
    }

    gate.open();
    let (sent, _view) = task.await.unwrap();

    assert_eq!(sent.unwrap().id, "m2");
    assert_eq!(
      app.queries.status(&keys::chat_messages("c1")),
      Some(CacheStatus::Stale)
    );
    assert_eq!(
      app.queries.status(&keys::chat_conversations()),
      Some(CacheStatus::Stale)
    );
  }

  #[tokio::test]
  async fn test_failed_send_removes_pending_line() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Post, MESSAGES_PATH, 500, "boom");
    let (app, _) = testing::app(transport, Some("tok"));

    let existing = ChatView {
      lines: vec![ChatLine {
        id: "m1".into(),
        sender_id: Some("u2".into()),
        content: "hi".into(),
        pending: false,
      }],
    };
    let (view, rx) = watch::channel(existing.clone());

    let result = send_message(&app, "c1", "hello", &view).await;

    assert!(result.is_err());
    assert_eq!(*rx.borrow(), existing);
  }

  #[tokio::test]
  async fn test_conversations_fall_back_to_sample() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, "/api/chat/conversations", 500, "");
    let (app, _) = testing::app(transport, Some("tok"));

    let mut page = ChatPage::new(&app);
    page.load().await;

    let (conversations, source) = page.conversations().unwrap();
    assert_eq!(source, Source::Sample);
    assert_eq!(conversations.len(), sample_conversations().len());
  }

  #[tokio::test]
  async fn test_unread_count() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, "/api/chat/unread-count", 200, r#"{"unread_count": 3}"#);
    let (app, _) = testing::app(transport, Some("tok"));

    assert_eq!(unread(&app).await.unwrap(), "3 unread messages");
  }

  #[tokio::test]
  async fn test_send_shows_the_conversation_from_the_server() {
    let transport = Arc::new(MockTransport::new());
    transport
      .respond(Method::Get, "/api/chat/conversations", 200, "[]")
      .respond(Method::Get, MESSAGES_PATH, 200, "[]")
      .respond(
        Method::Get,
        MESSAGES_PATH,
        200,
        r#"[{"id": "m1", "conversation_id": "c1", "sender_id": "u1", "content": "hello"}]"#,
      )
      .respond(
        Method::Post,
        MESSAGES_PATH,
        201,
        r#"{"id": "m1", "conversation_id": "c1", "content": "hello"}"#,
      );
    let (app, _) = testing::app(transport.clone(), Some("tok"));

    let out = send(&app, "c1", "hello").await.unwrap();

    assert_eq!(out, "u1: hello");
    assert_eq!(transport.calls(Method::Get, MESSAGES_PATH), 2);
  }

  #[tokio::test]
  async fn test_search_messages_within_a_conversation() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Get,
      "/api/chat/search?q=deposit&conversation_id=c1",
      200,
      r#"[{"id": "m4", "conversation_id": "c1", "content": "The deposit is one month"}]"#,
    );
    let (app, _) = testing::app(transport, Some("tok"));

    let out = search(&app, "deposit", Some("c1")).await.unwrap();

    assert_eq!(out, "[c1] The deposit is one month");
  }

  #[tokio::test]
  async fn test_delete_conversation_invalidates_chat() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Delete, "/api/chat/conversations/c1", 204, "");
    let (app, _) = testing::app(transport, Some("tok"));
    app
      .queries
      .set_query_data(&keys::chat_conversations(), Vec::<Conversation>::new());
    app
      .queries
      .set_query_data(&keys::chat_messages("c1"), Vec::<Message>::new());

    assert_eq!(delete(&app, "c1").await.unwrap(), "Deleted conversation c1");
    assert_eq!(
      app.queries.status(&keys::chat_conversations()),
      Some(CacheStatus::Stale)
    );
    assert_eq!(
      app.queries.status(&keys::chat_messages("c1")),
      Some(CacheStatus::Stale)
    );
  }
}
