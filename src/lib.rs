//! # Local Services Marketplace
//!
//! Backend for a marketplace where providers publish service listings,
//! customers book and review them, and admins moderate. The crate exposes the
//! HTTP API (`server`, `handlers`), the domain services and their persistence
//! (`services`, `repositories`, `models`), and the ambient plumbing around
//! them (`config`, `telemetry`, `db`, `identity`).

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod external;
pub mod faq;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod repositories;
pub mod seeds;
pub mod server;
pub mod services;
pub mod telemetry;
pub use migration;
