//! # Server Configuration
//!
//! Application state, router assembly and the HTTP server loop for the
//! marketplace API.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use url::Url;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::external::{GeocodingClient, OpenDataClient, TtlCache, build_http_client};
use crate::handlers;
use crate::identity::{IdentityProvider, build_identity_provider};
use crate::services::{
    AnalyticsService, BookingEngine, BookmarkSet, Directory, ListingCatalog, ReviewLedger,
    RoleAllowlists,
};
use crate::telemetry;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub identity: Arc<dyn IdentityProvider>,
    pub allowlists: Arc<RoleAllowlists>,
    pub geocoder: Arc<GeocodingClient>,
    pub open_data: Arc<OpenDataClient>,
}

impl AppState {
    /// Build state with the identity provider selected by configuration.
    pub fn build(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<Self> {
        let http = build_http_client(Duration::from_millis(config.external.timeout_ms))?;
        let identity = build_identity_provider(&config, http.clone())?;
        Self::with_identity(config, db, identity, http)
    }

    /// Build state around an explicit identity provider.
    pub fn with_identity(
        config: AppConfig,
        db: DatabaseConnection,
        identity: Arc<dyn IdentityProvider>,
        http: reqwest::Client,
    ) -> anyhow::Result<Self> {
        let external = &config.external;
        let capacity = NonZeroUsize::new(external.geocode_cache_capacity)
            .context("geocode cache capacity must be positive")?;
        let geocoder = GeocodingClient::new(
            http.clone(),
            Url::parse(&external.geocode_base_url).context("invalid geocode base URL")?,
            external.maps_api_key.clone(),
            Arc::new(TtlCache::new(capacity)),
            Duration::from_secs(external.geocode_cache_ttl_seconds),
        );
        let open_data = OpenDataClient::new(
            http,
            Url::parse(&external.open_data_base_url).context("invalid open data base URL")?,
        );

        Ok(Self {
            allowlists: Arc::new(RoleAllowlists::from_config(&config)),
            config: Arc::new(config),
            db: Arc::new(db),
            identity,
            geocoder: Arc::new(geocoder),
            open_data: Arc::new(open_data),
        })
    }

    pub fn directory(&self) -> Directory {
        Directory::new(
            self.db.clone(),
            self.allowlists.clone(),
            self.identity.clone(),
        )
    }

    pub fn catalog(&self) -> ListingCatalog {
        ListingCatalog::new(self.db.clone())
    }

    pub fn bookings(&self) -> BookingEngine {
        BookingEngine::new(self.db.clone())
    }

    pub fn reviews(&self) -> ReviewLedger {
        ReviewLedger::new(self.db.clone())
    }

    pub fn bookmarks(&self) -> BookmarkSet {
        BookmarkSet::new(self.db.clone())
    }

    pub fn analytics(&self) -> AnalyticsService {
        AnalyticsService::new(self.db.clone())
    }
}

fn api_routes() -> Router<AppState> {
    use handlers::{
        accounts, analytics, bookings, bookmarks, categories, chat, external, listings, reviews,
    };

    Router::new()
        // accounts
        .route("/login", post(accounts::login))
        .route("/logout", post(accounts::logout))
        .route("/users/me", get(accounts::me))
        .route("/users/delete", delete(accounts::delete_me))
        .route("/admin/users", get(accounts::admin_list_users))
        .route("/admin/users/{id}", delete(accounts::admin_delete_user))
        .route("/admin/users/{id}/role", put(accounts::admin_set_role))
        // catalog
        .route("/categories", get(categories::list_categories))
        .route(
            "/provider/services",
            post(listings::create_listing).get(listings::list_own_listings),
        )
        .route(
            "/provider/services/{id}",
            get(listings::get_own_listing)
                .put(listings::update_own_listing)
                .delete(listings::delete_own_listing),
        )
        .route("/provider/analytics", get(analytics::provider_analytics))
        .route("/services", get(listings::list_public_listings))
        .route("/services/{id}", get(listings::get_listing))
        .route("/admin/services", get(listings::admin_list_listings))
        .route(
            "/admin/services/{id}",
            put(listings::admin_update_listing).delete(listings::admin_delete_listing),
        )
        .route(
            "/admin/services/{id}/approve",
            post(listings::admin_approve_listing),
        )
        .route(
            "/admin/services/{id}/reject",
            post(listings::admin_reject_listing),
        )
        // bookings
        .route(
            "/bookings",
            post(bookings::create_booking).get(bookings::list_bookings),
        )
        .route(
            "/bookings/{id}",
            get(bookings::get_booking).delete(bookings::delete_booking),
        )
        .route("/bookings/{id}/status", put(bookings::update_booking_status))
        // reviews
        .route(
            "/services/{id}/reviews",
            get(reviews::list_listing_reviews).post(reviews::add_review),
        )
        .route(
            "/services/{id}/all-reviews",
            get(reviews::list_listing_reviews),
        )
        .route("/reviews/averages", get(reviews::average_ratings))
        .route(
            "/reviews/{id}",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        .route("/admin/reviews", get(reviews::admin_list_reviews))
        .route("/admin/reviews/{id}", delete(reviews::delete_review))
        // bookmarks
        .route(
            "/bookmarks",
            get(bookmarks::list_bookmarks).post(bookmarks::add_bookmark),
        )
        .route("/bookmarks/{id}", delete(bookmarks::remove_bookmark))
        .route(
            "/bookmarks/listing/{listing_id}",
            delete(bookmarks::remove_bookmark_by_listing),
        )
        .route(
            "/bookmarks/check/{listing_id}",
            get(bookmarks::check_bookmark),
        )
        // external data and chat
        .route("/maps/geocode", get(external::geocode))
        .route("/govsg/{dataset}", get(external::open_data))
        .route("/ping", get(external::ping))
        .route("/chat", post(chat::chat))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if !config.cors_allowed_origins.is_empty() {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        base.allow_origin(origins)
    } else if config.is_dev_profile() {
        base.allow_origin(Any)
    } else {
        base
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api", api_routes())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(telemetry::trace_context_middleware))
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config
        .bind_addr()
        .with_context(|| format!("Invalid server address: {}", config.api_bind_addr))?;
    let profile = config.profile.clone();

    let state = AppState::build(config, db)?;
    if !state.geocoder.is_configured() {
        tracing::warn!("No maps API key configured, geocoding requests will be refused");
    }
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::accounts::login,
        crate::handlers::accounts::me,
        crate::handlers::accounts::logout,
        crate::handlers::accounts::delete_me,
        crate::handlers::accounts::admin_list_users,
        crate::handlers::accounts::admin_delete_user,
        crate::handlers::accounts::admin_set_role,
        crate::handlers::categories::list_categories,
        crate::handlers::listings::create_listing,
        crate::handlers::listings::list_own_listings,
        crate::handlers::listings::get_own_listing,
        crate::handlers::listings::update_own_listing,
        crate::handlers::listings::delete_own_listing,
        crate::handlers::listings::list_public_listings,
        crate::handlers::listings::get_listing,
        crate::handlers::listings::admin_list_listings,
        crate::handlers::listings::admin_update_listing,
        crate::handlers::listings::admin_approve_listing,
        crate::handlers::listings::admin_reject_listing,
        crate::handlers::listings::admin_delete_listing,
        crate::handlers::analytics::provider_analytics,
        crate::handlers::bookings::create_booking,
        crate::handlers::bookings::list_bookings,
        crate::handlers::bookings::get_booking,
        crate::handlers::bookings::update_booking_status,
        crate::handlers::bookings::delete_booking,
        crate::handlers::reviews::list_listing_reviews,
        crate::handlers::reviews::add_review,
        crate::handlers::reviews::update_review,
        crate::handlers::reviews::delete_review,
        crate::handlers::reviews::average_ratings,
        crate::handlers::reviews::admin_list_reviews,
        crate::handlers::bookmarks::list_bookmarks,
        crate::handlers::bookmarks::add_bookmark,
        crate::handlers::bookmarks::remove_bookmark,
        crate::handlers::bookmarks::remove_bookmark_by_listing,
        crate::handlers::bookmarks::check_bookmark,
        crate::handlers::external::geocode,
        crate::handlers::external::open_data,
        crate::handlers::external::ping,
        crate::handlers::chat::chat,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::Role,
            crate::models::ListingStatus,
            crate::models::BookingStatus,
            crate::error::ApiError,
            crate::repositories::booking::BookingDetail,
            crate::repositories::review::RatingAverage,
            crate::repositories::analytics::ProviderAnalyticsSummary,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "accounts", description = "Login, profile and user administration"),
        (name = "services", description = "Service listings and moderation"),
        (name = "bookings", description = "Booking lifecycle"),
        (name = "reviews", description = "Reviews and ratings"),
        (name = "bookmarks", description = "Saved services"),
        (name = "external", description = "Third-party data proxies"),
    ),
    info(
        title = "Local Services Marketplace API",
        description = "Accounts, service listings, bookings, reviews and bookmarks",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
