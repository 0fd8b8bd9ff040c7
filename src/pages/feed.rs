use color_eyre::Result;
use tokio::sync::watch;
use tracing::info;

use super::{format_when, keys, render_result, source_notice, truncate, LOADING};
use crate::api::types::{NewPost, Post};
use crate::api::ApiError;
use crate::app::App;
use crate::fallback::{or_sample, sample_posts, Source};
use crate::query::{Optimistic, Query};

/// The community feed, falling back to bundled posts when the backend has none.
pub struct FeedPage {
  query: Query<Vec<Post>>,
}

impl FeedPage {
  pub fn new(app: &App, page: Option<u32>) -> Self {
    let api = app.api.clone();
    let key = match page {
      Some(n) if n > 1 => keys::feed_page(n),
      _ => keys::feed_posts(),
    };
    let mut query = Query::new(app.queries.clone(), key, move || {
      let api = api.clone();
      async move { api.posts(page).await }
    })
    .retry(0);

    query.fetch();
    Self { query }
  }

  pub async fn load(&mut self) {
    self.query.resolve().await;
  }

  pub fn posts(&self) -> Option<(Vec<Post>, Source)> {
    let result = self.query.result();
    if result.is_loading && result.data.is_none() {
      return None;
    }
    Some(or_sample(result.data.map(|d| d.as_ref().clone()), sample_posts))
  }

  pub fn render(&self) -> String {
    let (posts, source) = match self.posts() {
      Some(shown) => shown,
      None => return LOADING.to_string(),
    };

    let error = self.query.result().error;
    let mut lines: Vec<String> = source_notice(source, error.as_ref(), "posts")
      .into_iter()
      .collect();
    if posts.is_empty() {
      lines.push("Nothing in the feed yet.".to_string());
    }
    for post in &posts {
      lines.push(post_block(post));
    }
    lines.join("\n")
  }
}

fn post_block(post: &Post) -> String {
  let author = post
    .user
    .as_ref()
    .map(|u| u.full_name.as_str())
    .unwrap_or("Unknown");
  let liked = if post.is_liked_by_current_user.unwrap_or(false) {
    " (liked)"
  } else {
    ""
  };
  format!(
    "[{}] {} · {}\n  {}\n  {} likes{} · {} comments",
    post.id,
    author,
    format_when(post.created_at),
    truncate(post.content.as_deref().unwrap_or(""), 280),
    post.like_count,
    liked,
    post.comment_count
  )
}

/// What the like button shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeState {
  pub liked: bool,
  pub like_count: u64,
}

impl LikeState {
  pub fn of(post: &Post) -> Self {
    Self {
      liked: post.is_liked_by_current_user.unwrap_or(false),
      like_count: post.like_count,
    }
  }
}

/// Flip the like flag and move the count by one; reverting restores `before`.
pub fn toggle_like(before: LikeState) -> Optimistic<LikeState> {
  Optimistic::new(
    move |state: &mut LikeState| {
      state.liked = !before.liked;
      state.like_count = if before.liked {
        before.like_count.saturating_sub(1)
      } else {
        before.like_count + 1
      };
    },
    move |state: &mut LikeState| *state = before,
  )
}

/// Like or unlike a post with the button updated immediately.
pub async fn toggle_post_like(
  app: &App,
  post_id: &str,
  view: &watch::Sender<LikeState>,
) -> Result<(), ApiError> {
  let before = *view.borrow();
  let action = async {
    if before.liked {
      app.api.unlike_post(post_id).await
    } else {
      app.api.like_post(post_id).await
    }
  };
  app
    .queries
    .mutate_optimistic(view, toggle_like(before), action, &[keys::feed()])
    .await
}

pub async fn list(app: &App, page: Option<u32>) -> Result<String> {
  let mut feed = FeedPage::new(app, page);
  feed.load().await;
  Ok(feed.render())
}

pub async fn like(app: &App, post_id: &str) -> Result<String> {
  let post = app.api.post(post_id).await?;
  let (view, _rx) = watch::channel(LikeState::of(&post));

  let outcome = toggle_post_like(app, post_id, &view).await;
  let state = *view.borrow();
  match outcome {
    Ok(()) => {
      let verb = if state.liked { "Liked" } else { "Unliked" };
      Ok(format!("{} post {} ({} likes)", verb, post_id, state.like_count))
    }
    Err(e) => Ok(format!(
      "Could not update like on {}: {} ({} likes)",
      post_id, e, state.like_count
    )),
  }
}

pub async fn post(app: &App, content: &str) -> Result<String> {
  let new_post = NewPost {
    content: content.trim().to_string(),
    media_urls: Vec::new(),
    media_types: Vec::new(),
  };
  let created = app
    .queries
    .mutate(app.api.create_post(&new_post), |_| vec![keys::feed()])
    .await?;
  info!(post = %created.id, "posted to feed");
  Ok(format!("Posted {}", created.id))
}

pub async fn comment(app: &App, post_id: &str, content: &str) -> Result<String> {
  let comment = app
    .queries
    .mutate(app.api.comment_on_post(post_id, content), |_| {
      vec![keys::feed()]
    })
    .await?;
  Ok(format!("Commented on {} ({})", post_id, comment.id))
}

pub async fn edit(app: &App, post_id: &str, content: &str) -> Result<String> {
  let updated = app
    .queries
    .mutate(app.api.update_post(post_id, content), |_| vec![keys::feed()])
    .await?;
  app.queries.set_query_data(&keys::feed_post(post_id), updated.clone());
  Ok(post_block(&updated))
}

pub async fn delete(app: &App, post_id: &str) -> Result<String> {
  app
    .queries
    .mutate(app.api.delete_post(post_id), |_| vec![keys::feed()])
    .await?;
  info!(post = %post_id, "deleted post");
  Ok(format!("Deleted post {}", post_id))
}

/// Everything one user has posted.
pub async fn by_user(app: &App, user_id: &str) -> Result<String> {
  let api = app.api.clone();
  let id = user_id.to_string();
  let mut query = Query::new(app.queries.clone(), keys::user_posts(user_id), move || {
    let api = api.clone();
    let id = id.clone();
    async move { api.user_posts(&id).await }
  });
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, |posts| {
    if posts.is_empty() {
      "No posts yet.".to_string()
    } else {
      posts.iter().map(post_block).collect::<Vec<_>>().join("\n\n")
    }
  }))
}

/// A single post, read through the cache.
pub async fn show(app: &App, post_id: &str) -> Result<String> {
  let api = app.api.clone();
  let id = post_id.to_string();
  let mut query = Query::new(app.queries.clone(), keys::feed_post(post_id), move || {
    let api = api.clone();
    let id = id.clone();
    async move { api.post(&id).await }
  });
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, post_block))
}
