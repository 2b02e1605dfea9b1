//! Booking engine behaviour against a migrated SQLite database.

#[path = "test_utils/mod.rs"]
mod test_utils;

use anyhow::Result;
use marketplace::error::ServiceError;
use marketplace::models::{BookingStatus, ListingStatus, Role};
use marketplace::repositories::BookingRepository;
use marketplace::services::BookingEngine;
use marketplace::services::booking::BookingPerspective;
use test_utils::{create_booking, create_listing, create_provider, create_user, days_from_now};

struct Fixture {
    engine: BookingEngine,
    db: std::sync::Arc<sea_orm::DatabaseConnection>,
    listing_id: i32,
    provider_user: String,
    customer: String,
}

async fn fixture() -> Result<Fixture> {
    let db = test_utils::setup_test_db_arc().await?;
    let (provider_user, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let customer = create_user(&db, "cust-1", "cust@example.com", Role::Customer).await?;
    let listing = create_listing(&db, provider.id, ListingStatus::Approved).await?;
    Ok(Fixture {
        engine: BookingEngine::new(db.clone()),
        db,
        listing_id: listing.id,
        provider_user: provider_user.id,
        customer: customer.id,
    })
}

#[tokio::test]
async fn create_booking_on_approved_listing_is_pending() -> Result<()> {
    let f = fixture().await?;
    let date = days_from_now(2);

    let booking = f
        .engine
        .create_booking(&f.customer, Some(f.listing_id), Some(&date))
        .await?;

    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.user_id, f.customer);
    assert_eq!(booking.listing_id, f.listing_id);
    Ok(())
}

#[tokio::test]
async fn create_booking_requires_listing_and_date() -> Result<()> {
    let f = fixture().await?;

    let missing_date = f
        .engine
        .create_booking(&f.customer, Some(f.listing_id), None)
        .await;
    assert!(matches!(missing_date, Err(ServiceError::Validation(_))));

    let missing_listing = f
        .engine
        .create_booking(&f.customer, None, Some(&days_from_now(1)))
        .await;
    assert!(matches!(missing_listing, Err(ServiceError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn create_booking_rejects_past_dates() -> Result<()> {
    let f = fixture().await?;

    let result = f
        .engine
        .create_booking(&f.customer, Some(f.listing_id), Some(&days_from_now(-1)))
        .await;

    match result {
        Err(ServiceError::Validation(message)) => {
            assert_eq!(message, "Booking date must be in the future")
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn create_booking_refuses_unapproved_or_missing_listing() -> Result<()> {
    let f = fixture().await?;
    let provider = marketplace::repositories::ProviderRepository::new(f.db.clone())
        .find_by_user_id(&f.provider_user)
        .await?
        .expect("provider profile");
    let pending = create_listing(&f.db, provider.id, ListingStatus::Pending).await?;

    for listing_id in [pending.id, 9999] {
        let result = f
            .engine
            .create_booking(&f.customer, Some(listing_id), Some(&days_from_now(1)))
            .await;
        match result {
            Err(ServiceError::NotFound(message)) => {
                assert_eq!(message, "Service not found or not approved for booking.")
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }
    Ok(())
}

#[tokio::test]
async fn provider_confirms_then_completes() -> Result<()> {
    let f = fixture().await?;
    let booking = create_booking(&f.db, f.listing_id, &f.customer, BookingStatus::Pending).await?;

    let confirmed = f
        .engine
        .update_status(booking.id, &f.provider_user, BookingStatus::Confirmed)
        .await?;
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    let completed = f
        .engine
        .update_status(booking.id, &f.provider_user, BookingStatus::Completed)
        .await?;
    assert_eq!(completed.status, BookingStatus::Completed);

    // completed is final
    let reopened = f
        .engine
        .update_status(booking.id, &f.provider_user, BookingStatus::Cancelled)
        .await;
    assert!(matches!(reopened, Err(ServiceError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn customer_can_cancel_but_not_confirm() -> Result<()> {
    let f = fixture().await?;
    let booking = create_booking(&f.db, f.listing_id, &f.customer, BookingStatus::Pending).await?;

    let confirm = f
        .engine
        .update_status(booking.id, &f.customer, BookingStatus::Confirmed)
        .await;
    match confirm {
        Err(ServiceError::Validation(message)) => {
            assert_eq!(message, "Invalid status transition from pending to confirmed")
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }

    let cancelled = f
        .engine
        .update_status(booking.id, &f.customer, BookingStatus::Cancelled)
        .await?;
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    Ok(())
}

#[tokio::test]
async fn strangers_cannot_touch_a_booking() -> Result<()> {
    let f = fixture().await?;
    let stranger = create_user(&f.db, "stranger", "stranger@example.com", Role::Customer).await?;
    let booking = create_booking(&f.db, f.listing_id, &f.customer, BookingStatus::Pending).await?;

    let update = f
        .engine
        .update_status(booking.id, &stranger.id, BookingStatus::Cancelled)
        .await;
    assert!(matches!(update, Err(ServiceError::Forbidden(_))));

    let details = f.engine.get_booking_details(booking.id, &stranger.id).await;
    assert!(matches!(details, Err(ServiceError::Forbidden(_))));

    let missing = f.engine.get_booking_details(4242, &f.customer).await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn booking_details_join_listing_and_parties() -> Result<()> {
    let f = fixture().await?;
    let booking = create_booking(&f.db, f.listing_id, &f.customer, BookingStatus::Confirmed).await?;

    let as_customer = f.engine.get_booking_details(booking.id, &f.customer).await?;
    let as_provider = f
        .engine
        .get_booking_details(booking.id, &f.provider_user)
        .await?;

    assert_eq!(as_customer.id, booking.id);
    assert_eq!(as_provider.id, booking.id);
    assert_eq!(as_customer.listing_title, "Deep Home Cleaning");
    assert_eq!(as_customer.status, BookingStatus::Confirmed);
    Ok(())
}

#[tokio::test]
async fn list_bookings_by_perspective_and_status() -> Result<()> {
    let f = fixture().await?;
    create_booking(&f.db, f.listing_id, &f.customer, BookingStatus::Pending).await?;
    create_booking(&f.db, f.listing_id, &f.customer, BookingStatus::Confirmed).await?;

    let mine = f
        .engine
        .list_bookings(&f.customer, BookingPerspective::Customer, None)
        .await?;
    assert_eq!(mine.len(), 2);

    let incoming = f
        .engine
        .list_bookings(
            &f.provider_user,
            BookingPerspective::Provider,
            Some(BookingStatus::Confirmed),
        )
        .await?;
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].status, BookingStatus::Confirmed);

    let not_provider = f
        .engine
        .list_bookings(&f.customer, BookingPerspective::Provider, None)
        .await;
    match not_provider {
        Err(ServiceError::Forbidden(message)) => assert_eq!(message, "User is not a provider"),
        other => panic!("expected forbidden, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn only_pending_bookings_can_be_deleted_by_their_customer() -> Result<()> {
    let f = fixture().await?;
    let pending = create_booking(&f.db, f.listing_id, &f.customer, BookingStatus::Pending).await?;
    let confirmed =
        create_booking(&f.db, f.listing_id, &f.customer, BookingStatus::Confirmed).await?;

    let by_provider = f.engine.delete_booking(pending.id, &f.provider_user).await;
    assert!(matches!(by_provider, Err(ServiceError::Forbidden(_))));

    let not_pending = f.engine.delete_booking(confirmed.id, &f.customer).await;
    assert!(matches!(not_pending, Err(ServiceError::InvalidState(_))));

    f.engine.delete_booking(pending.id, &f.customer).await?;
    let gone = f.engine.get_booking_details(pending.id, &f.customer).await;
    assert!(matches!(gone, Err(ServiceError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn status_write_from_a_stale_read_is_refused() -> Result<()> {
    let f = fixture().await?;
    let booking = create_booking(&f.db, f.listing_id, &f.customer, BookingStatus::Pending).await?;
    let stale = booking.clone();

    f.engine
        .update_status(booking.id, &f.customer, BookingStatus::Cancelled)
        .await?;

    let repo = BookingRepository::new(f.db.clone());
    let overwritten = repo.set_status(stale, BookingStatus::Completed).await?;
    assert!(overwritten.is_none());

    let stored = repo.find_by_id(booking.id).await?.map(|b| b.status);
    assert_eq!(stored, Some(BookingStatus::Cancelled));
    Ok(())
}

#[tokio::test]
async fn delete_pending_leaves_confirmed_bookings() -> Result<()> {
    let f = fixture().await?;
    let booking = create_booking(&f.db, f.listing_id, &f.customer, BookingStatus::Pending).await?;
    f.engine
        .update_status(booking.id, &f.provider_user, BookingStatus::Confirmed)
        .await?;

    let repo = BookingRepository::new(f.db.clone());
    assert!(!repo.delete_pending(booking.id).await?);
    assert!(repo.find_by_id(booking.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn racing_requests_never_both_change_a_booking() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = test_utils::setup_file_db(dir.path()).await?;
    let (provider_user, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let customer = create_user(&db, "cust-1", "cust@example.com", Role::Customer).await?;
    let listing = create_listing(&db, provider.id, ListingStatus::Approved).await?;
    let engine = BookingEngine::new(db.clone());
    let repo = BookingRepository::new(db.clone());

    for _ in 0..20 {
        let booking =
            create_booking(&db, listing.id, &customer.id, BookingStatus::Confirmed).await?;
        let (cancel, complete) = tokio::join!(
            engine.update_status(booking.id, &customer.id, BookingStatus::Cancelled),
            engine.update_status(booking.id, &provider_user.id, BookingStatus::Completed),
        );
        assert!(
            !(cancel.is_ok() && complete.is_ok()),
            "cancel and complete both applied"
        );
        let stored = repo.find_by_id(booking.id).await?.map(|b| b.status);
        if cancel.is_ok() {
            assert_eq!(stored, Some(BookingStatus::Cancelled));
        }
        if complete.is_ok() {
            assert_eq!(stored, Some(BookingStatus::Completed));
        }

        let pending = create_booking(&db, listing.id, &customer.id, BookingStatus::Pending).await?;
        let (confirm, delete) = tokio::join!(
            engine.update_status(pending.id, &provider_user.id, BookingStatus::Confirmed),
            engine.delete_booking(pending.id, &customer.id),
        );
        assert!(
            !(confirm.is_ok() && delete.is_ok()),
            "confirm and delete both applied"
        );
        let remaining = repo.find_by_id(pending.id).await?;
        if delete.is_ok() {
            assert!(remaining.is_none());
        }
        if confirm.is_ok() {
            assert_eq!(remaining.map(|b| b.status), Some(BookingStatus::Confirmed));
        }
    }
    Ok(())
}
