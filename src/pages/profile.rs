use color_eyre::{eyre::bail, Result};

use super::{format_when, keys, render_result};
use crate::api::types::{Profile, ProfileSearch, ProfileStats, ProfileUpdate};
use crate::app::App;
use crate::query::Query;

fn render_profile(profile: &Profile) -> String {
  let mut lines = vec![profile.full_name.clone()];
  if profile.is_verified {
    lines[0].push_str(" (verified)");
  }
  if let Some(email) = &profile.email {
    lines.push(email.clone());
  }
  if let Some(university) = &profile.university_name {
    lines.push(university.clone());
  }
  match (&profile.major, profile.graduation_year) {
    (Some(major), Some(year)) => lines.push(format!("{}, class of {}", major, year)),
    (Some(major), None) => lines.push(major.clone()),
    (None, Some(year)) => lines.push(format!("Class of {}", year)),
    (None, None) => {}
  }
  if let Some(bio) = &profile.bio {
    lines.push(String::new());
    lines.push(bio.clone());
  }
  if !profile.interests.is_empty() {
    lines.push(format!("Interests: {}", profile.interests.join(", ")));
  }
  lines.join("\n")
}

fn render_stats(stats: &ProfileStats) -> String {
  format!(
    "{} posts · {} listings · {} connections · joined {}",
    stats.posts_count,
    stats.listings_count,
    stats.connections_count,
    format_when(stats.joined_date)
  )
}

fn profile_query(app: &App) -> Query<Profile> {
  let api = app.api.clone();
  let mut query = Query::new(app.queries.clone(), keys::profile_me(), move || {
    let api = api.clone();
    async move { api.my_profile().await }
  });
  query.fetch();
  query
}

fn stats_query(app: &App) -> Query<ProfileStats> {
  let api = app.api.clone();
  let mut query = Query::new(app.queries.clone(), keys::profile_stats(), move || {
    let api = api.clone();
    async move { api.profile_stats().await }
  });
  query.fetch();
  query
}

/// Profile card with stats underneath. Both reads go out together.
pub async fn show(app: &App) -> Result<String> {
  let mut profile = profile_query(app);
  let mut stats = stats_query(app);
  let profile = profile.resolve().await;
  let stats = stats.resolve().await;

  let mut out = render_result(&profile, render_profile);
  if let Some(stats) = &stats.data {
    out.push_str("\n\n");
    out.push_str(&render_stats(stats));
  }
  Ok(out)
}

pub async fn stats(app: &App) -> Result<String> {
  let result = stats_query(app).resolve().await;
  Ok(render_result(&result, render_stats))
}

/// Another user's profile.
pub async fn show_user(app: &App, user_id: &str) -> Result<String> {
  let api = app.api.clone();
  let id = user_id.to_string();
  let mut query = Query::new(app.queries.clone(), keys::profile_user(user_id), move || {
    let api = api.clone();
    let id = id.clone();
    async move { api.profile(&id).await }
  });
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, render_profile))
}

/// Find other students by name or university.
pub async fn search(app: &App, text: &str) -> Result<String> {
  let text = text.trim();
  if text.is_empty() {
    bail!("Search text is required");
  }
  let api = app.api.clone();
  let search = ProfileSearch {
    query: text.to_string(),
    ..Default::default()
  };
  let mut query = Query::new(app.queries.clone(), keys::profile_search(text), move || {
    let api = api.clone();
    let search = search.clone();
    async move { api.search_profiles(&search).await }
  });
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, |profiles| {
    if profiles.is_empty() {
      return format!("No students match \"{}\".", text);
    }
    profiles
      .iter()
      .map(|p| match &p.university_name {
        Some(university) => format!("{:<36} {} ({})", p.id, p.full_name, university),
        None => format!("{:<36} {}", p.id, p.full_name),
      })
      .collect::<Vec<_>>()
      .join("\n")
  }))
}

pub async fn update(app: &App, update: ProfileUpdate) -> Result<String> {
  if update.is_empty() {
    bail!("Nothing to update");
  }
  let profile = app
    .queries
    .mutate(app.api.update_profile(&update), |_| vec![keys::profile()])
    .await?;
  app.queries.set_query_data(&keys::profile_me(), profile.clone());
  Ok(render_profile(&profile))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::transport::mock::MockTransport;
  use crate::api::transport::Method;
  use crate::app::testing;
  use crate::query::CacheStatus;
  use std::sync::Arc;

  const PROFILE: &str = r#"{"id": "u1", "full_name": "Ada", "major": "CS", "graduation_year": 2027, "interests": ["climbing"]}"#;

  #[tokio::test]
  async fn test_show_combines_profile_and_stats() {
    let transport = Arc::new(MockTransport::new());
    transport
      .respond(Method::Get, "/api/profile/me", 200, PROFILE)
      .respond(
        Method::Get,
        "/api/profile/me/stats",
        200,
        r#"{"posts_count": 3, "listings_count": 1, "connections_count": 0}"#,
      );
    let (app, _) = testing::app(transport, Some("tok"));

    let out = show(&app).await.unwrap();

    assert!(out.starts_with("Ada\nCS, class of 2027"));
    assert!(out.contains("Interests: climbing"));
    assert!(out.contains("3 posts · 1 listings · 0 connections"));
  }

  #[tokio::test]
  async fn test_update_refreshes_cached_profile() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Put,
      "/api/profile/me",
      200,
      r#"{"id": "u1", "full_name": "Ada L"}"#,
    );
    let (app, _) = testing::app(transport.clone(), Some("tok"));
    app.queries.set_query_data(
      &keys::profile_stats(),
      ProfileStats {
        posts_count: 0,
        listings_count: 0,
        connections_count: 0,
        joined_date: None,
      },
    );

    let out = update(
      &app,
      ProfileUpdate {
        full_name: Some("Ada L".into()),
        ..Default::default()
      },
    )
    .await
    .unwrap();

    assert_eq!(out, "Ada L");
    assert_eq!(
      app.queries.status(&keys::profile_me()),
      Some(CacheStatus::Populated)
    );
    assert_eq!(
      app.queries.status(&keys::profile_stats()),
      Some(CacheStatus::Stale)
    );
    let sent = transport.requests();
    assert_eq!(sent[0].body.as_deref(), Some(r#"{"full_name":"Ada L"}"#));
  }

  #[tokio::test]
  async fn test_search_lists_matches() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Post,
      "/api/profile/search",
      200,
      r#"{"profiles": [{"id": "u2", "full_name": "Grace", "university_name": "NYU"}], "total": 1}"#,
    );
    let (app, _) = testing::app(transport.clone(), Some("tok"));

    let out = search(&app, " Grace ").await.unwrap();

    assert!(out.ends_with("Grace (NYU)"));
    assert_eq!(
      transport.requests()[0].body.as_deref(),
      Some(r#"{"query":"Grace"}"#)
    );
  }

  #[tokio::test]
  async fn test_search_without_matches() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Post, "/api/profile/search", 200, r#"{"profiles": []}"#);
    let (app, _) = testing::app(transport, Some("tok"));

    assert_eq!(search(&app, "zed").await.unwrap(), "No students match \"zed\".");
  }

  #[tokio::test]
  async fn test_empty_update_is_rejected() {
    let (app, _) = testing::app(Arc::new(MockTransport::new()), Some("tok"));
    assert!(update(&app, ProfileUpdate::default()).await.is_err());
  }
}
