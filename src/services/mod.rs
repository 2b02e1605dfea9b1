//! # Domain Services
//!
//! Business rules of the marketplace: account resolution, listing moderation,
//! the booking state machine, reviews, bookmarks and provider analytics.
//! Services are cheap to construct (they only hold `Arc`s) and are built per
//! request from the application state.

pub mod analytics;
pub mod booking;
pub mod bookmark;
pub mod catalog;
pub mod directory;
pub mod review;

pub use analytics::AnalyticsService;
pub use booking::BookingEngine;
pub use bookmark::BookmarkSet;
pub use catalog::ListingCatalog;
pub use directory::{Account, Directory, RoleAllowlists};
pub use review::ReviewLedger;

use crate::models::Role;

/// The authenticated account performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
