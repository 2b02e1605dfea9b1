//! Test utilities shared by the integration tests.
//!
//! Provides an in-memory SQLite database with all migrations applied, an
//! application state wired with the shared-secret identity provider, token
//! signing, fixture builders and a small HTTP driver for the router.

use anyhow::{Result, anyhow};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use marketplace::config::{AppConfig, IdentityConfig, ProviderAllowlistEntry};
use marketplace::db::{init_pool, run_migrations};
use marketplace::models::{BookingStatus, ListingStatus, Role, booking, listing, provider, user};
use marketplace::repositories::listing::NewListing;
use marketplace::repositories::provider::BusinessInfo;
use marketplace::repositories::user::NewUser;
use marketplace::repositories::{
    BookingRepository, ListingRepository, ProviderRepository, UserRepository,
};
use marketplace::server::{AppState, create_app};

pub const TEST_SECRET: &[u8] = b"integration-test-secret";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const LISTED_PROVIDER_EMAIL: &str = "listed@example.com";

/// Configuration for tests: in-memory SQLite and shared-secret tokens.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        database_url: "sqlite::memory:".to_string(),
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        provider_allowlist: vec![ProviderAllowlistEntry {
            email: LISTED_PROVIDER_EMAIL.to_string(),
            business_name: Some("Listed Plumbing".to_string()),
            description: Some("Pipes and drains".to_string()),
        }],
        identity: IdentityConfig {
            mode: "shared_secret".to_string(),
            shared_secret: Some(TEST_SECRET.to_vec()),
            verify_attempts: 1,
            verify_backoff_ms: 0,
            ..IdentityConfig::default()
        },
        ..AppConfig::default()
    }
}

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = init_pool(&test_config()).await?;
    run_migrations(&db).await?;
    Ok(db)
}

#[allow(dead_code)]
pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    Ok(Arc::new(setup_test_db().await?))
}

/// A migrated SQLite database in a file under `dir`, shared by a pool of
/// several connections so requests can interleave.
#[allow(dead_code)]
pub async fn setup_file_db(dir: &std::path::Path) -> Result<Arc<DatabaseConnection>> {
    let config = AppConfig {
        database_url: format!("sqlite://{}?mode=rwc", dir.join("marketplace.db").display()),
        db_max_connections: 4,
        ..test_config()
    };
    let db = init_pool(&config).await?;
    run_migrations(&db).await?;
    Ok(Arc::new(db))
}

/// Application state over a fresh database
#[allow(dead_code)]
pub async fn test_state_with(config: AppConfig) -> Result<AppState> {
    let db = init_pool(&config).await?;
    run_migrations(&db).await?;
    AppState::build(config, db)
}

#[allow(dead_code)]
pub async fn test_app() -> Result<(Router, AppState)> {
    let state = test_state_with(test_config()).await?;
    Ok((create_app(state.clone()), state))
}

/// Sign a shared-secret identity token.
#[allow(dead_code)]
pub fn token_for(subject: &str, email: Option<&str>, name: Option<&str>) -> String {
    let now = Utc::now();
    let mut claims = json!({
        "sub": subject,
        "iat": now.timestamp(),
        "exp": (now + Duration::minutes(10)).timestamp(),
    });
    if let Some(email) = email {
        claims["email"] = json!(email);
    }
    if let Some(name) = name {
        claims["name"] = json!(name);
    }
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET),
    )
    .expect("sign test token")
}

#[allow(dead_code)]
pub async fn create_user(
    db: &DatabaseConnection,
    id: &str,
    email: &str,
    role: Role,
) -> Result<user::Model> {
    Ok(UserRepository::insert_on(
        db,
        NewUser {
            id: id.to_string(),
            email: email.to_string(),
            display_name: format!("User {id}"),
            phone: None,
            role,
        },
    )
    .await?)
}

/// A provider-role user with a provider profile
#[allow(dead_code)]
pub async fn create_provider(
    db: &DatabaseConnection,
    id: &str,
    email: &str,
) -> Result<(user::Model, provider::Model)> {
    let user = create_user(db, id, email, Role::Provider).await?;
    let profile = ProviderRepository::insert_on(
        db,
        &user.id,
        BusinessInfo {
            business_name: format!("{id} Services"),
            description: "Test provider".to_string(),
        },
    )
    .await?;
    Ok((user, profile))
}

#[allow(dead_code)]
pub async fn create_listing(
    db: &Arc<DatabaseConnection>,
    provider_id: i32,
    status: ListingStatus,
) -> Result<listing::Model> {
    let repo = ListingRepository::new(db.clone());
    let created = repo
        .create(NewListing {
            provider_id,
            title: "Deep Home Cleaning".to_string(),
            description: Some("Whole-flat clean".to_string()),
            price: 120.0,
            ..NewListing::default()
        })
        .await?;
    if status == ListingStatus::Pending {
        return Ok(created);
    }
    repo.set_status(created, status)
        .await?
        .ok_or_else(|| anyhow!("listing status changed during setup"))
}

#[allow(dead_code)]
pub async fn create_booking(
    db: &Arc<DatabaseConnection>,
    listing_id: i32,
    user_id: &str,
    status: BookingStatus,
) -> Result<booking::Model> {
    let date = (Utc::now() + Duration::days(3)).into();
    let created = BookingRepository::insert_pending_on(&**db, listing_id, user_id, date).await?;
    if status == BookingStatus::Pending {
        return Ok(created);
    }
    BookingRepository::new(db.clone())
        .set_status(created, status)
        .await?
        .ok_or_else(|| anyhow!("booking status changed during setup"))
}

/// RFC 3339 timestamp `days` from now
#[allow(dead_code)]
pub fn days_from_now(days: i64) -> String {
    (Utc::now() + Duration::days(days)).to_rfc3339()
}

/// Send a request through the router and decode the JSON response.
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, json))
}
