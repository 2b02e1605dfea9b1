//! # Data Models
//!
//! SeaORM entities for the marketplace schema plus small shared response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod booking;
pub mod bookmark;
pub mod category;
pub mod listing;
pub mod provider;
pub mod provider_analytics;
pub mod review;
pub mod user;

pub use booking::{BookingStatus, Entity as Booking};
pub use bookmark::Entity as Bookmark;
pub use category::Entity as Category;
pub use listing::{Entity as Listing, ListingStatus};
pub use provider::Entity as Provider;
pub use provider_analytics::Entity as ProviderAnalytics;
pub use review::Entity as Review;
pub use user::{Entity as User, Role};

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "marketplace".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
