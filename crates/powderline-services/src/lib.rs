//! Shared plumbing for the Powderline providers: a retrying JSON client,
//! in-memory TTL caching and coordinate helpers.

pub mod cache;
pub mod geo;
pub mod http;
pub mod retry;

pub use cache::{Cached, Freshness, TtlCache};
pub use geo::{distance_km, nearest, within_radius, BoundingBox, Coordinates, Located};
pub use http::ApiClient;
pub use retry::{with_retry, RetryConfig};
