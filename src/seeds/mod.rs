//! Database seeding functionality
//!
//! Populates reference data needed before the marketplace is usable.

pub mod categories;

pub use categories::seed_categories;
