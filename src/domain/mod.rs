//! Domain entities shared by every storage backend.
//!
//! All entities are plain serde structs: the KV backend stores them as JSON
//! values, the relational backend maps them onto columns (nested value
//! objects become JSON text columns).

mod analytics;
mod link;
mod user;

pub use analytics::{AnalyticsEvent, AnalyticsSummary, EventType};
pub use link::{Link, LinkType};
pub use user::{SeoMeta, Theme, User};
