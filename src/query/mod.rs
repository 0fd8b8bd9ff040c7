//! Cached reads and invalidating writes.
//!
//! Inspired by TanStack Query: a [`QueryClient`] owns one cache entry per
//! [`QueryKey`], views hold a [`Query`] per dependency, and writes go through
//! [`QueryClient::mutate`] or [`QueryClient::mutate_optimistic`].

mod client;
mod key;
mod mutation;
mod observer;

pub use client::{CacheStatus, QueryClient, QueryOptions};
pub use key::QueryKey;
pub use mutation::Optimistic;
pub use observer::{Query, QueryResult};
