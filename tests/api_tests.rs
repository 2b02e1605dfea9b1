//! End-to-end HTTP tests driving the router in-process.

#[path = "test_utils/mod.rs"]
mod test_utils;

use anyhow::Result;
use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use test_utils::{ADMIN_EMAIL, days_from_now, send, test_app, token_for};

async fn login(app: &axum::Router, token: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    send(app, Method::POST, "/api/login", Some(token), body).await
}

#[tokio::test]
async fn login_creates_then_resolves_account() -> Result<()> {
    let (app, _) = test_app().await?;
    let token = token_for("uid-alex", Some("alex@example.com"), Some("Alex Lim"));

    let (status, body) = login(&app, &token, None).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["created"], json!(true));
    assert_eq!(body["user"]["role"], json!("customer"));
    assert_eq!(body["user"]["display_name"], json!("Alex Lim"));

    let (status, body) = login(&app, &token, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], json!(false));
    assert_eq!(body["message"], json!("Login successful"));
    Ok(())
}

#[tokio::test]
async fn login_assigns_admin_and_provider_roles() -> Result<()> {
    let (app, _) = test_app().await?;

    let admin = token_for("uid-admin", Some(ADMIN_EMAIL), None);
    let (_, body) = login(&app, &admin, None).await?;
    assert_eq!(body["user"]["role"], json!("admin"));
    assert_eq!(body["user"]["display_name"], json!("Unnamed User"));

    let provider = token_for("uid-pro", Some("pro@example.com"), Some("Pro"));
    let (status, body) = login(
        &app,
        &provider,
        Some(json!({
            "role": "provider",
            "business_name": "Pro Cleaning",
            "business_description": "Move-out cleans"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], json!("provider"));
    assert_eq!(body["user"]["provider"]["business_name"], json!("Pro Cleaning"));

    let incomplete = token_for("uid-half", Some("half@example.com"), None);
    let (status, body) = login(&app, &incomplete, Some(json!({"role": "provider"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("VALIDATION_FAILED"));
    Ok(())
}

#[tokio::test]
async fn logout_requires_a_valid_token() -> Result<()> {
    let (app, _) = test_app().await?;

    let (status, _) = send(&app, Method::POST, "/api/logout", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = token_for("uid-out", Some("out@example.com"), None);
    let (status, body) = send(&app, Method::POST, "/api/logout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Logout logged"));
    Ok(())
}

#[tokio::test]
async fn unauthenticated_requests_get_the_error_envelope() -> Result<()> {
    let (app, _) = test_app().await?;

    let (status, body) = send(&app, Method::GET, "/api/bookings", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Missing or invalid Authorization header"));
    assert_eq!(body["code"], json!("UNAUTHORIZED"));
    assert!(body["trace_id"].is_string());

    let (status, body) =
        send(&app, Method::GET, "/api/bookings", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Invalid token"));

    let stranger = token_for("uid-new", Some("new@example.com"), None);
    let (status, body) = send(&app, Method::GET, "/api/bookings", Some(&stranger), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("User not registered"));

    let (status, _) = send(&app, Method::GET, "/api/users/me", Some(&stranger), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn listing_moderation_and_booking_flow() -> Result<()> {
    let (app, _) = test_app().await?;
    let admin = token_for("uid-admin", Some(ADMIN_EMAIL), Some("Admin"));
    let provider = token_for("uid-pro", Some("pro@example.com"), Some("Pro"));
    let customer = token_for("uid-cust", Some("cust@example.com"), Some("Cust"));

    login(&app, &admin, None).await?;
    login(
        &app,
        &provider,
        Some(json!({
            "role": "provider",
            "business_name": "Pro Cleaning",
            "business_description": "Move-out cleans"
        })),
    )
    .await?;
    login(&app, &customer, None).await?;

    // customers cannot publish
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/provider/services",
        Some(&customer),
        Some(json!({"title": "Fake", "price": 1.0})),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], json!("Provider access required"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/provider/services",
        Some(&provider),
        Some(json!({"title": "End of tenancy clean", "price": 250.0})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["service"]["status"], json!("pending"));
    let listing_id = body["service"]["id"].as_i64().expect("listing id");

    let (_, body) = send(&app, Method::GET, "/api/services", None, None).await?;
    assert_eq!(body["count"], json!(0));

    let approve = format!("/api/admin/services/{listing_id}/approve");
    let (status, body) = send(&app, Method::POST, &approve, Some(&customer), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], json!("Admin access required"));

    let (status, body) = send(&app, Method::POST, &approve, Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"]["status"], json!("approved"));

    let (_, body) = send(&app, Method::GET, "/api/services", None, None).await?;
    assert_eq!(body["count"], json!(1));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/bookings",
        Some(&customer),
        Some(json!({"listing_id": listing_id, "booking_date": days_from_now(5)})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["booking"]["status"], json!("pending"));
    let booking_id = body["booking"]["id"].as_i64().expect("booking id");

    let status_uri = format!("/api/bookings/{booking_id}/status");
    let (status, _) = send(
        &app,
        Method::PUT,
        &status_uri,
        Some(&customer),
        Some(json!({"status": "confirmed"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::PUT,
        &status_uri,
        Some(&provider),
        Some(json!({"status": "confirmed"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], json!("confirmed"));

    let (_, body) = send(&app, Method::GET, "/api/bookings", Some(&customer), None).await?;
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["bookings"][0]["status"], json!("confirmed"));

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/bookings/{booking_id}"),
        Some(&provider),
        None,
    )
    .await?;
    assert_eq!(body["booking"]["customer_email"], json!("cust@example.com"));

    let (status, body) =
        send(&app, Method::GET, "/api/provider/analytics", Some(&provider), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["analytics"]["total_services"], json!(1));
    assert_eq!(body["analytics"]["total_bookings"], json!(1));

    // `role` selects the booking perspective like `as`
    let (status, body) =
        send(&app, Method::GET, "/api/bookings?role=customer", Some(&provider), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(0));
    let (_, body) =
        send(&app, Method::GET, "/api/bookings?role=provider", Some(&provider), None).await?;
    assert_eq!(body["count"], json!(1));

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/services/{listing_id}/reviews"),
        Some(&customer),
        Some(json!({"booking_id": booking_id, "rating": 5, "comment": "Spotless"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    for path in ["reviews", "all-reviews"] {
        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/services/{listing_id}/{path}"),
            None,
            None,
        )
        .await?;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert_eq!(body["reviews"].as_array().map(Vec::len), Some(1), "{path}");
        assert_eq!(body["reviews"][0]["rating"], json!(5), "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn bookmark_round_trip_over_http() -> Result<()> {
    let (app, state) = test_app().await?;
    let customer = token_for("uid-cust", Some("cust@example.com"), None);
    login(&app, &customer, None).await?;
    let (_, provider) =
        test_utils::create_provider(&state.db, "uid-pro", "pro@example.com").await?;
    let listing = test_utils::create_listing(
        &state.db,
        provider.id,
        marketplace::models::ListingStatus::Approved,
    )
    .await?;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/bookmarks",
        Some(&customer),
        Some(json!({"listing_id": listing.id})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/bookmarks",
        Some(&customer),
        Some(json!({"listing_id": listing.id})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("This service is already bookmarked"));

    let check = format!("/api/bookmarks/check/{}", listing.id);
    let (_, body) = send(&app, Method::GET, &check, Some(&customer), None).await?;
    assert_eq!(body["is_bookmarked"], json!(true));

    let (_, body) = send(&app, Method::GET, "/api/bookmarks", Some(&customer), None).await?;
    assert_eq!(body["count"], json!(1));

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/bookmarks/listing/{}", listing.id),
        Some(&customer),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::GET, &check, Some(&customer), None).await?;
    assert_eq!(body["is_bookmarked"], json!(false));
    Ok(())
}

#[tokio::test]
async fn trace_id_is_echoed_and_reported_in_errors() -> Result<()> {
    let (app, _) = test_app().await?;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/users/me")
        .header("x-trace-id", "trace-abc-123")
        .body(Body::empty())?;
    let response = app.clone().oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get("x-trace-id")
            .and_then(|v| v.to_str().ok()),
        Some("trace-abc-123")
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["trace_id"], json!("trace-abc-123"));
    Ok(())
}

#[tokio::test]
async fn malformed_bodies_and_paths_use_the_envelope() -> Result<()> {
    let (app, _) = test_app().await?;

    let (status, body) = send(&app, Method::GET, "/api/services/abc", None, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("VALIDATION_FAILED"));

    let (status, body) = send(&app, Method::GET, "/api/services/999", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Service not found"));
    Ok(())
}

#[tokio::test]
async fn chat_answers_from_the_faq() -> Result<()> {
    let (app, _) = test_app().await?;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/chat",
        None,
        Some(json!({"message": "How do I cancel my booking?"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(
        body["reply"],
        json!(marketplace::faq::reply_for("How do I cancel my booking?"))
    );

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/chat",
        None,
        Some(json!({"message": "   "})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("message is required"));
    Ok(())
}

#[tokio::test]
async fn external_routes_validate_before_calling_out() -> Result<()> {
    let (app, _) = test_app().await?;

    let (status, body) = send(&app, Method::GET, "/api/ping", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("pong"));

    let (status, _) = send(&app, Method::GET, "/api/govsg/weather", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, "/api/maps/geocode", None, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("address param required"));

    // no maps key configured in tests
    let (status, _) = send(
        &app,
        Method::GET,
        "/api/maps/geocode?address=1%20Raffles%20Place",
        None,
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn health_reports_database_state() -> Result<()> {
    let (app, _) = test_app().await?;

    let (status, body) = send(&app, Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["database"], json!("ok"));
    Ok(())
}
