use color_eyre::Result;

use super::{error_line, keys, render_result};
use crate::api::types::{EmailCheck, University};
use crate::app::App;
use crate::query::Query;

fn render_universities(universities: &[University]) -> String {
  if universities.is_empty() {
    return "No universities found.".to_string();
  }
  universities
    .iter()
    .map(|u| {
      let place = match (&u.state, &u.country) {
        (Some(state), _) => state.clone(),
        (None, Some(country)) => country.clone(),
        (None, None) => String::new(),
      };
      format!("{:<40} {:<24} {}", u.name, u.domain, place)
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// All universities, or those matching `search`.
pub async fn list(app: &App, search: Option<&str>) -> Result<String> {
  let api = app.api.clone();
  let needle = search.map(String::from);
  let mut query = Query::new(app.queries.clone(), keys::universities(search), move || {
    let api = api.clone();
    let needle = needle.clone();
    async move {
      match needle {
        Some(q) => api.search_universities(&q).await,
        None => api.universities().await,
      }
    }
  });
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, |u| render_universities(u)))
}

/// The university that owns an email domain. A one-off read, so no view
/// state is kept for it.
pub async fn by_domain(app: &App, domain: &str) -> Result<String> {
  let api = app.api.clone();
  let owned = domain.to_string();
  let key = keys::universities(None).child("domain").child(domain);
  let result = app
    .queries
    .fetch_query(&key, move || {
      let api = api.clone();
      let domain = owned.clone();
      async move { api.university_by_domain(&domain).await }
    })
    .await;
  Ok(match result {
    Ok(university) => render_universities(std::slice::from_ref(university.as_ref())),
    Err(e) => error_line(&e).unwrap_or_default(),
  })
}

fn render_check(email: &str, check: &EmailCheck) -> String {
  match (&check.university, check.is_valid) {
    (Some(university), true) => format!("{} belongs to {}", email, university.name),
    _ => check
      .message
      .clone()
      .unwrap_or_else(|| format!("{} is not a university address", email)),
  }
}

/// Ask the backend whether an address can be used to register.
pub async fn check_email(app: &App, email: &str) -> Result<String> {
  let check = app.api.check_university_email(email).await?;
  Ok(render_check(email, &check))
}
