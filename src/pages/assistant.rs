use color_eyre::{eyre::bail, Result};
use tracing::warn;

use super::{format_when, keys, render_result};
use crate::api::types::{AssistantConversation, AssistantConversationDetail, AssistantRole};
use crate::app::App;
use crate::query::Query;

/// Where an answer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
  Online {
    conversation_id: String,
    content: String,
  },
  Offline(String),
}

impl Answer {
  pub fn content(&self) -> &str {
    match self {
      Answer::Online { content, .. } => content,
      Answer::Offline(content) => content,
    }
  }
}

/// Ask Olive. When the backend can't answer, the offline responder does;
/// an expired session is still an error.
///
/// An online answer creates or extends a conversation, so cached history goes stale.
pub async fn answer(app: &App, prompt: &str, conversation_id: Option<&str>) -> Result<Answer> {
  let asked = app
    .queries
    .mutate(app.api.ask_assistant(prompt, conversation_id), |_| {
      vec![keys::assistant()]
    })
    .await;
  match asked {
    Ok(reply) => Ok(Answer::Online {
      conversation_id: reply.conversation_id,
      content: reply.assistant_message.content,
    }),
    Err(e) if e.is_unauthorized() => Err(e.into()),
    Err(e) => {
      warn!(error = %e, "assistant unavailable; answering offline");
      Ok(Answer::Offline(app.assistant.reply(prompt).await))
    }
  }
}

pub async fn ask(app: &App, prompt: &str, conversation_id: Option<&str>) -> Result<String> {
  let reply = answer(app, prompt, conversation_id).await?;
  Ok(match &reply {
    Answer::Online {
      conversation_id,
      content,
    } => format!("Olive: {}\n(conversation {})", content, conversation_id),
    Answer::Offline(content) => format!("Olive (offline): {}", content),
  })
}

pub async fn history(app: &App) -> Result<String> {
  let api = app.api.clone();
  let mut query = Query::new(
    app.queries.clone(),
    keys::assistant_conversations(),
    move || {
      let api = api.clone();
      async move { api.assistant_history().await }
    },
  );
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, |conversations| {
    render_history(conversations)
  }))
}

/// One past conversation, message by message.
pub async fn conversation(app: &App, id: &str) -> Result<String> {
  let api = app.api.clone();
  let owned = id.to_string();
  let mut query = Query::new(
    app.queries.clone(),
    keys::assistant_conversation(id),
    move || {
      let api = api.clone();
      let id = owned.clone();
      async move { api.assistant_conversation(&id).await }
    },
  );
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, render_transcript))
}

pub async fn rename(app: &App, id: &str, title: &str) -> Result<String> {
  if title.trim().is_empty() {
    bail!("Title cannot be empty");
  }
  let renamed = app
    .queries
    .mutate(app.api.rename_assistant_conversation(id, title), |_| {
      vec![keys::assistant()]
    })
    .await?;
  Ok(format!(
    "Renamed {} to \"{}\"",
    renamed.id,
    renamed.title.as_deref().unwrap_or(title.trim())
  ))
}

pub async fn delete(app: &App, id: &str) -> Result<String> {
  app
    .queries
    .mutate(app.api.delete_assistant_conversation(id), |_| {
      vec![keys::assistant()]
    })
    .await?;
  Ok(format!("Deleted conversation {}", id))
}

fn render_transcript(conversation: &AssistantConversationDetail) -> String {
  let mut lines = vec![conversation
    .title
    .clone()
    .unwrap_or_else(|| "Untitled".to_string())];
  for message in &conversation.messages {
    let who = match message.role {
      AssistantRole::User => "You",
      AssistantRole::Assistant => "Olive",
      AssistantRole::System => continue,
    };
    lines.push(format!("{}: {}", who, message.content));
  }
  lines.join("\n")
}

fn render_history(conversations: &[AssistantConversation]) -> String {
  if conversations.is_empty() {
    return "No conversations with Olive yet.".to_string();
  }
  conversations
    .iter()
    .map(|c| {
      format!(
        "{:<36} {:<30} {} messages, last {}",
        c.id,
        c.title.as_deref().unwrap_or("Untitled"),
        c.message_count,
        format_when(c.last_message_at)
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}
