use color_eyre::{eyre::bail, Result};

use super::{format_price, keys, render_result, source_notice, truncate, LOADING};
use crate::api::types::{HousingListing, ListingFilters, ListingUpdate, NewListing};
use crate::app::App;
use crate::fallback::{or_sample, sample_listings, Source};
use crate::query::Query;

/// Browse listings, falling back to the bundled set when the backend has none.
pub struct HousingList {
  query: Query<Vec<HousingListing>>,
}

impl HousingList {
  pub fn new(app: &App, filters: ListingFilters) -> Self {
    let api = app.api.clone();
    let key = keys::housing_list(&filters);
    let mut query = Query::new(app.queries.clone(), key, move || {
      let api = api.clone();
      let filters = filters.clone();
      async move { api.listings(&filters).await }
    })
    .retry(0);

    query.fetch();
    Self { query }
  }

  pub async fn load(&mut self) {
    self.query.resolve().await;
  }

  /// Listings to display, or `None` while the first load is pending.
  pub fn listings(&self) -> Option<(Vec<HousingListing>, Source)> {
    let result = self.query.result();
    if result.is_loading && result.data.is_none() {
      return None;
    }
    Some(or_sample(
      result.data.map(|d| d.as_ref().clone()),
      sample_listings,
    ))
  }

  pub fn render(&self) -> String {
    let (listings, source) = match self.listings() {
      Some(shown) => shown,
      None => return LOADING.to_string(),
    };

    let error = self.query.result().error;
    let mut lines: Vec<String> = source_notice(source, error.as_ref(), "listings")
      .into_iter()
      .collect();
    if listings.is_empty() {
      lines.push("No listings found.".to_string());
    }
    lines.extend(listings.iter().map(listing_row));
    lines.join("\n")
  }
}

fn listing_row(listing: &HousingListing) -> String {
  let beds = match listing.bedrooms {
    Some(0) => "studio".to_string(),
    Some(n) => format!("{} bd", n),
    None => "-".to_string(),
  };
  format!(
    "{:<20} {:<40} {:>12} {:>7}  {}",
    truncate(&listing.id, 20),
    truncate(&listing.title, 40),
    format_price(listing.price),
    beds,
    listing.city
  )
}

fn listing_detail(listing: &HousingListing) -> String {
  let mut lines = vec![
    listing.title.clone(),
    format!("{}, {}, {}", listing.address, listing.city, listing.state),
    format!("Price: {}", format_price(listing.price)),
  ];
  if let Some(kind) = listing.property_type {
    lines.push(format!("Type: {}", kind.as_str()));
  }
  if let Some(bedrooms) = listing.bedrooms {
    lines.push(format!("Bedrooms: {}", bedrooms));
  }
  if let Some(bathrooms) = listing.bathrooms {
    lines.push(format!("Bathrooms: {}", bathrooms));
  }
  if !listing.amenities.is_empty() {
    lines.push(format!("Amenities: {}", listing.amenities.join(", ")));
  }
  if let Some(description) = &listing.description {
    lines.push(String::new());
    lines.push(description.clone());
  }
  if let Some(email) = &listing.contact_email {
    lines.push(format!("Contact: {}", email));
  }
  lines.push(format!("{} likes, {} views", listing.like_count, listing.view_count));
  if !listing.is_active {
    lines.push("(inactive)".to_string());
  }
  lines.join("\n")
}

fn render_rows(listings: &[HousingListing]) -> String {
  if listings.is_empty() {
    return "No listings found.".to_string();
  }
  listings
    .iter()
    .map(listing_row)
    .collect::<Vec<_>>()
    .join("\n")
}

pub async fn list(app: &App, filters: ListingFilters) -> Result<String> {
  let mut page = HousingList::new(app, filters);
  page.load().await;
  Ok(page.render())
}

pub async fn show(app: &App, id: &str) -> Result<String> {
  let api = app.api.clone();
  let listing_id = id.to_string();
  let mut query = Query::new(app.queries.clone(), keys::housing_listing(id), move || {
    let api = api.clone();
    let id = listing_id.clone();
    async move { api.listing(&id).await }
  });
  query.fetch();
  let result = query.resolve().await;
  if result.error.as_ref().is_some_and(|e| e.is_not_found()) {
    return Ok(format!("Listing {} not found.", id));
  }
  Ok(render_result(&result, listing_detail))
}

pub async fn search(app: &App, text: &str) -> Result<String> {
  let api = app.api.clone();
  let needle = text.to_string();
  let mut query = Query::new(app.queries.clone(), keys::housing_search(text), move || {
    let api = api.clone();
    let needle = needle.clone();
    async move { api.search_listings(&needle).await }
  });
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, |l| render_rows(l)))
}

/// Listings owned by the signed-in user.
pub async fn mine(app: &App) -> Result<String> {
  let api = app.api.clone();
  let mut query = Query::new(app.queries.clone(), keys::housing_mine(), move || {
    let api = api.clone();
    async move { api.my_listings().await }
  });
  query.fetch();
  let result = query.resolve().await;
  Ok(render_result(&result, |l| render_rows(l)))
}

pub async fn create(app: &App, listing: NewListing) -> Result<String> {
  let created = app
    .queries
    .mutate(app.api.create_listing(&listing), |_| vec![keys::housing()])
    .await?;
  Ok(format!("Created listing {} ({})", created.id, created.title))
}

pub async fn delete(app: &App, id: &str) -> Result<String> {
  app
    .queries
    .mutate(app.api.delete_listing(id), |_| vec![keys::housing()])
    .await?;
  Ok(format!("Deleted listing {}", id))
}

pub async fn update(app: &App, id: &str, update: ListingUpdate) -> Result<String> {
  if update.is_empty() {
    bail!("Nothing to update");
  }
  let listing = app
    .queries
    .mutate(app.api.update_listing(id, &update), |_| vec![keys::housing()])
    .await?;
  app
    .queries
    .set_query_data(&keys::housing_listing(id), listing.clone());
  Ok(listing_detail(&listing))
}

/// Show or hide a listing from browsing.
pub async fn set_active(app: &App, id: &str, active: bool) -> Result<String> {
  let listing = app
    .queries
    .mutate(app.api.set_listing_active(id, active), |_| vec![keys::housing()])
    .await?;
  let state = if listing.is_active { "active" } else { "inactive" };
  Ok(format!("Listing {} is now {}", listing.id, state))
}

pub async fn like(app: &App, id: &str, undo: bool) -> Result<String> {
  let action = async {
    if undo {
      app.api.unlike_listing(id).await
    } else {
      app.api.like_listing(id).await
    }
  };
  app
    .queries
    .mutate(action, |_| vec![keys::housing_listing(id)])
    .await?;
  Ok(if undo {
    format!("Removed {} from saved listings", id)
  } else {
    format!("Saved listing {}", id)
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::endpoints::housing as routes;
  use crate::api::transport::mock::MockTransport;
  use crate::api::transport::Method;
  use crate::app::testing;
  use crate::query::CacheStatus;
  use pretty_assertions::assert_eq;
  use std::sync::Arc;

  #[tokio::test]
  async fn test_named_envelope_yields_two_listings() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Get,
      routes::LISTINGS,
      200,
      r#"{"listings": [{"id": "a"}, {"id": "b"}]}"#,
    );
    let (app, _) = testing::app(transport, Some("tok"));

    let mut page = HousingList::new(&app, ListingFilters::default());
    page.load().await;
    let (listings, source) = page.listings().unwrap();

    let ids: Vec<_> = listings.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(source, Source::Live);
  }

  #[tokio::test]
  async fn test_empty_list_is_shown_as_empty() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, routes::LISTINGS, 200, "[]");
    let (app, _) = testing::app(transport, Some("tok"));

    let mut page = HousingList::new(&app, ListingFilters::default());
    page.load().await;
    let (listings, source) = page.listings().unwrap();

    assert!(listings.is_empty());
    assert_eq!(source, Source::Live);
    let rendered = page.render();
    assert_eq!(rendered, "No listings found.");
  }

  #[tokio::test]
  async fn test_backend_failure_shows_sample_listings() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, routes::LISTINGS, 503, "Service Unavailable");
    let (app, _) = testing::app(transport, Some("tok"));

    let mut page = HousingList::new(&app, ListingFilters::default());
    page.load().await;
    let (listings, source) = page.listings().unwrap();

    assert_eq!(source, Source::Sample);
    assert_eq!(listings.len(), sample_listings().len());
    assert!(page.render().contains("showing sample listings"));
  }

  #[tokio::test]
  async fn test_unexpected_shape_falls_back_to_sample() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(Method::Get, routes::LISTINGS, 200, r#"{"items": []}"#);
    let (app, _) = testing::app(transport, Some("tok"));

    let mut page = HousingList::new(&app, ListingFilters::default());
    page.load().await;

    assert_eq!(page.listings().unwrap().1, Source::Sample);
  }

  #[tokio::test]
  async fn test_delete_invalidates_listing_reads() {
    let transport = Arc::new(MockTransport::new());
    transport
      .respond(Method::Get, routes::LISTINGS, 200, r#"[{"id": "a"}]"#)
      .respond(Method::Delete, "/api/housing/listings/a", 204, "");
    let (app, _) = testing::app(transport.clone(), Some("tok"));

    list(&app, ListingFilters::default()).await.unwrap();
    list(&app, ListingFilters::default()).await.unwrap();
    assert_eq!(transport.calls(Method::Get, routes::LISTINGS), 1);

    let message = delete(&app, "a").await.unwrap();
    assert_eq!(message, "Deleted listing a");

    list(&app, ListingFilters::default()).await.unwrap();
    assert_eq!(transport.calls(Method::Get, routes::LISTINGS), 2);
  }

  #[tokio::test]
  async fn test_update_replaces_cached_listing() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Put,
      "/api/housing/listings/a",
      200,
      r#"{"id": "a", "title": "Loft", "price": 1100}"#,
    );
    let (app, _) = testing::app(transport.clone(), Some("tok"));
    let list_key = keys::housing_list(&ListingFilters::default());
    app
      .queries
      .set_query_data(&list_key, Vec::<HousingListing>::new());

    let change = ListingUpdate {
      price: Some(1100.0),
      ..Default::default()
    };
    let out = update(&app, "a", change).await.unwrap();

    assert!(out.starts_with("Loft"));

    assert_eq!(
      transport.requests()[0].body.as_deref(),
      Some(r#"{"price":1100.0}"#)
    );
    assert_eq!(app.queries.status(&list_key), Some(CacheStatus::Stale));
    let cached = app
      .queries
      .get_query_data::<HousingListing>(&keys::housing_listing("a"))
      .unwrap();
    assert_eq!(cached.title, "Loft");
  }

  #[tokio::test]
  async fn test_empty_update_sends_nothing() {
    let transport = Arc::new(MockTransport::new());
    let (app, _) = testing::app(transport.clone(), Some("tok"));

    assert!(update(&app, "a", ListingUpdate::default()).await.is_err());
    assert!(transport.requests().is_empty());
  }

  #[tokio::test]
  async fn test_deactivate() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Post,
      "/api/housing/listings/a/deactivate",
      200,
      r#"{"id": "a", "is_active": false}"#,
    );
    let (app, _) = testing::app(transport, Some("tok"));

    assert_eq!(
      set_active(&app, "a", false).await.unwrap(),
      "Listing a is now inactive"
    );
  }

  #[tokio::test]
  async fn test_like_and_unlike_listing() {
    let transport = Arc::new(MockTransport::new());
    transport
      .respond(Method::Post, "/api/housing/listings/a/like", 200, "{}")
      .respond(Method::Delete, "/api/housing/listings/a/like", 204, "");
    let (app, _) = testing::app(transport.clone(), Some("tok"));

    assert_eq!(like(&app, "a", false).await.unwrap(), "Saved listing a");
    assert_eq!(
      like(&app, "a", true).await.unwrap(),
      "Removed a from saved listings"
    );
    assert_eq!(transport.calls(Method::Post, "/api/housing/listings/a/like"), 1);
    assert_eq!(transport.calls(Method::Delete, "/api/housing/listings/a/like"), 1);
  }

  #[tokio::test]
  async fn test_show_missing_listing() {
    let transport = Arc::new(MockTransport::new());
    let (app, _) = testing::app(transport, Some("tok"));

    assert_eq!(show(&app, "zz").await.unwrap(), "Listing zz not found.");
  }

  #[tokio::test]
  async fn test_show_renders_detail() {
    let transport = Arc::new(MockTransport::new());
    transport.respond(
      Method::Get,
      "/api/housing/listings/a",
      200,
      r#"{"id": "a", "title": "Loft", "city": "Ithaca", "state": "NY", "address": "1 Main St", "price": 1200, "bedrooms": 1}"#,
    );
    let (app, _) = testing::app(transport, Some("tok"));

    let rendered = show(&app, "a").await.unwrap();

    assert!(rendered.starts_with("Loft\n1 Main St, Ithaca, NY"));
    assert!(rendered.contains("Price: $1,200/mo"));
  }
}
