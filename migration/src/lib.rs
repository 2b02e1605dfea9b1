//! Database migrations for the marketplace API.
//!
//! One migration per table, applied in dependency order so that every
//! foreign key points at a table that already exists.

pub use sea_orm_migration::prelude::*;

mod m2025_01_01_000001_create_users;
mod m2025_01_01_000002_create_providers;
mod m2025_01_01_000003_create_categories;
mod m2025_01_01_000004_create_listings;
mod m2025_01_01_000005_create_bookings;
mod m2025_01_01_000006_create_reviews;
mod m2025_01_01_000007_create_bookmarks;
mod m2025_01_01_000008_create_provider_analytics;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_01_01_000001_create_users::Migration),
            Box::new(m2025_01_01_000002_create_providers::Migration),
            Box::new(m2025_01_01_000003_create_categories::Migration),
            Box::new(m2025_01_01_000004_create_listings::Migration),
            Box::new(m2025_01_01_000005_create_bookings::Migration),
            Box::new(m2025_01_01_000006_create_reviews::Migration),
            Box::new(m2025_01_01_000007_create_bookmarks::Migration),
            Box::new(m2025_01_01_000008_create_provider_analytics::Migration),
        ]
    }
}
