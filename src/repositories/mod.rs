//! # Repository Layer
//!
//! Repository implementations that encapsulate SeaORM operations for the
//! marketplace entities. Repositories return raw [`sea_orm::DbErr`]s; the
//! service layer translates them into the domain error taxonomy.

pub mod analytics;
pub mod booking;
pub mod bookmark;
pub mod category;
pub mod listing;
pub mod provider;
pub mod review;
pub mod user;

pub use analytics::AnalyticsRepository;
pub use booking::BookingRepository;
pub use bookmark::BookmarkRepository;
pub use category::CategoryRepository;
pub use listing::ListingRepository;
pub use provider::ProviderRepository;
pub use review::ReviewRepository;
pub use user::UserRepository;
