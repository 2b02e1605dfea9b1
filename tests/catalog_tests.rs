//! Listing catalog: creation, edits, moderation and visibility.

#[path = "test_utils/mod.rs"]
mod test_utils;

use anyhow::Result;
use marketplace::error::ServiceError;
use marketplace::models::ListingStatus;
use marketplace::repositories::listing::{ListingFilter, ListingPatch};
use marketplace::seeds::seed_categories;
use marketplace::repositories::ListingRepository;
use marketplace::services::ListingCatalog;
use marketplace::services::catalog::{ListingDraft, Requester};
use test_utils::{create_listing, create_provider};

fn draft(title: &str, price: f64) -> ListingDraft {
    ListingDraft {
        title: Some(title.to_string()),
        price: Some(price),
        description: Some("Two cleaners, three hours".to_string()),
        ..ListingDraft::default()
    }
}

#[tokio::test]
async fn new_listings_start_pending() -> Result<()> {
    let db = test_utils::setup_test_db_arc().await?;
    let (_, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let catalog = ListingCatalog::new(db.clone());

    let listing = catalog
        .create_listing(provider.id, draft("  Aircon Servicing ", 80.0))
        .await?;

    assert_eq!(listing.status, ListingStatus::Pending);
    assert_eq!(listing.title, "Aircon Servicing");
    assert_eq!(listing.provider_id, provider.id);
    Ok(())
}

#[tokio::test]
async fn create_listing_validates_input() -> Result<()> {
    let db = test_utils::setup_test_db_arc().await?;
    let (_, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let catalog = ListingCatalog::new(db.clone());

    let missing_price = catalog
        .create_listing(
            provider.id,
            ListingDraft {
                title: Some("Tutoring".to_string()),
                ..ListingDraft::default()
            },
        )
        .await;
    match missing_price {
        Err(ServiceError::Validation(message)) => {
            assert_eq!(message, "title and price are required")
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let negative = catalog.create_listing(provider.id, draft("Tutoring", -1.0)).await;
    assert!(matches!(negative, Err(ServiceError::Validation(_))));

    let unknown_category = catalog
        .create_listing(
            provider.id,
            ListingDraft {
                category_id: Some(999),
                ..draft("Tutoring", 30.0)
            },
        )
        .await;
    assert!(matches!(unknown_category, Err(ServiceError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn listing_may_reference_a_seeded_category() -> Result<()> {
    let db = test_utils::setup_test_db_arc().await?;
    seed_categories(&db).await?;
    let (_, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let catalog = ListingCatalog::new(db.clone());

    let listing = catalog
        .create_listing(
            provider.id,
            ListingDraft {
                category_id: Some(1),
                ..draft("Plumbing", 60.0)
            },
        )
        .await?;
    assert_eq!(listing.category_id, Some(1));
    Ok(())
}

#[tokio::test]
async fn admin_moderates_pending_listings_once() -> Result<()> {
    let db = test_utils::setup_test_db_arc().await?;
    let (_, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let catalog = ListingCatalog::new(db.clone());
    let listing = create_listing(&db, provider.id, ListingStatus::Pending).await?;

    let by_owner = catalog
        .moderate(listing.id, &Requester::provider(provider.id), ListingStatus::Approved)
        .await;
    assert!(matches!(by_owner, Err(ServiceError::Forbidden(_))));

    let approved = catalog
        .moderate(listing.id, &Requester::admin(), ListingStatus::Approved)
        .await?;
    assert_eq!(approved.status, ListingStatus::Approved);

    let again = catalog
        .moderate(listing.id, &Requester::admin(), ListingStatus::Rejected)
        .await;
    assert!(matches!(again, Err(ServiceError::InvalidTransition(_))));
    Ok(())
}

#[tokio::test]
async fn owner_completes_an_approved_listing() -> Result<()> {
    let db = test_utils::setup_test_db_arc().await?;
    let (_, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let catalog = ListingCatalog::new(db.clone());
    let listing = create_listing(&db, provider.id, ListingStatus::Approved).await?;
    let owner = Requester::provider(provider.id);

    let completed = catalog
        .update_listing(listing.id, &owner, ListingPatch::default(), Some(ListingStatus::Completed))
        .await?;
    assert_eq!(completed.status, ListingStatus::Completed);

    let reopen = catalog
        .update_listing(listing.id, &owner, ListingPatch::default(), Some(ListingStatus::Approved))
        .await;
    assert!(matches!(reopen, Err(ServiceError::InvalidTransition(_))));
    Ok(())
}

#[tokio::test]
async fn partial_update_keeps_untouched_fields() -> Result<()> {
    let db = test_utils::setup_test_db_arc().await?;
    let (_, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let catalog = ListingCatalog::new(db.clone());
    let listing = create_listing(&db, provider.id, ListingStatus::Approved).await?;

    let updated = catalog
        .update_listing(
            listing.id,
            &Requester::provider(provider.id),
            ListingPatch {
                price: Some(150.0),
                ..ListingPatch::default()
            },
            None,
        )
        .await?;

    assert_eq!(updated.price, 150.0);
    assert_eq!(updated.title, listing.title);
    assert_eq!(updated.description, listing.description);
    assert_eq!(updated.status, ListingStatus::Approved);

    let empty = catalog
        .update_listing(
            listing.id,
            &Requester::provider(provider.id),
            ListingPatch::default(),
            None,
        )
        .await;
    match empty {
        Err(ServiceError::Validation(message)) => assert_eq!(message, "No fields to update"),
        other => panic!("expected validation error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn other_providers_cannot_edit_or_delete() -> Result<()> {
    let db = test_utils::setup_test_db_arc().await?;
    let (_, owner) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let (_, rival) = create_provider(&db, "prov-2", "rival@example.com").await?;
    let catalog = ListingCatalog::new(db.clone());
    let listing = create_listing(&db, owner.id, ListingStatus::Approved).await?;
    let rival = Requester::provider(rival.id);

    let edit = catalog
        .update_listing(
            listing.id,
            &rival,
            ListingPatch {
                title: Some("Mine now".to_string()),
                ..ListingPatch::default()
            },
            None,
        )
        .await;
    assert!(matches!(edit, Err(ServiceError::Forbidden(_))));

    let delete = catalog.delete_listing(listing.id, &rival).await;
    assert!(matches!(delete, Err(ServiceError::Forbidden(_))));

    let view = catalog.get_owned(listing.id, &rival).await;
    assert!(matches!(view, Err(ServiceError::Forbidden(_))));

    catalog.delete_listing(listing.id, &Requester::admin()).await?;
    let gone = catalog.get_listing(listing.id).await;
    assert!(matches!(gone, Err(ServiceError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn public_listing_hides_unmoderated_work() -> Result<()> {
    let db = test_utils::setup_test_db_arc().await?;
    let (_, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let catalog = ListingCatalog::new(db.clone());
    create_listing(&db, provider.id, ListingStatus::Pending).await?;
    create_listing(&db, provider.id, ListingStatus::Rejected).await?;
    let approved = create_listing(&db, provider.id, ListingStatus::Approved).await?;
    let completed = create_listing(&db, provider.id, ListingStatus::Completed).await?;

    let public = catalog.list_public(ListingFilter::default()).await?;
    assert_eq!(public.iter().map(|l| l.id).collect::<Vec<_>>(), vec![approved.id]);

    let finished = catalog
        .list_public(ListingFilter {
            status: Some(ListingStatus::Completed),
            ..ListingFilter::default()
        })
        .await?;
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].id, completed.id);

    let pending = catalog
        .list_public(ListingFilter {
            status: Some(ListingStatus::Pending),
            ..ListingFilter::default()
        })
        .await;
    assert!(matches!(pending, Err(ServiceError::Validation(_))));

    assert_eq!(catalog.list_all(ListingFilter::default()).await?.len(), 4);
    assert_eq!(catalog.list_for_provider(provider.id).await?.len(), 4);
    Ok(())
}

#[tokio::test]
async fn moderation_from_a_stale_read_is_refused() -> Result<()> {
    let db = test_utils::setup_test_db_arc().await?;
    let (_, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let catalog = ListingCatalog::new(db.clone());
    let listing = create_listing(&db, provider.id, ListingStatus::Pending).await?;
    let stale = listing.clone();

    catalog
        .moderate(listing.id, &Requester::admin(), ListingStatus::Rejected)
        .await?;

    let repo = ListingRepository::new(db.clone());
    assert!(repo.set_status(stale, ListingStatus::Approved).await?.is_none());
    let stored = repo.find_by_id(listing.id).await?.map(|l| l.status);
    assert_eq!(stored, Some(ListingStatus::Rejected));
    Ok(())
}

#[tokio::test]
async fn racing_moderators_settle_on_one_outcome() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = test_utils::setup_file_db(dir.path()).await?;
    let (_, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let catalog = ListingCatalog::new(db.clone());
    let repo = ListingRepository::new(db.clone());

    for _ in 0..20 {
        let listing = create_listing(&db, provider.id, ListingStatus::Pending).await?;
        let admin = Requester::admin();
        let (approve, reject) = tokio::join!(
            catalog.moderate(listing.id, &admin, ListingStatus::Approved),
            catalog.moderate(listing.id, &admin, ListingStatus::Rejected),
        );
        assert!(!(approve.is_ok() && reject.is_ok()), "both moderations applied");
        let stored = repo.find_by_id(listing.id).await?.map(|l| l.status);
        if approve.is_ok() {
            assert_eq!(stored, Some(ListingStatus::Approved));
        }
        if reject.is_ok() {
            assert_eq!(stored, Some(ListingStatus::Rejected));
        }
    }
    Ok(())
}

#[tokio::test]
async fn edit_and_completion_land_together() -> Result<()> {
    let db = test_utils::setup_test_db_arc().await?;
    let (_, provider) = create_provider(&db, "prov-1", "prov@example.com").await?;
    let catalog = ListingCatalog::new(db.clone());
    let listing = create_listing(&db, provider.id, ListingStatus::Approved).await?;

    let patch = ListingPatch {
        price: Some(150.0),
        ..ListingPatch::default()
    };
    let updated = catalog
        .update_listing(
            listing.id,
            &Requester::provider(provider.id),
            patch,
            Some(ListingStatus::Completed),
        )
        .await?;
    assert_eq!(updated.status, ListingStatus::Completed);
    assert_eq!(updated.price, 150.0);

    let stored = catalog.get_listing(listing.id).await?;
    assert_eq!(stored.status, ListingStatus::Completed);
    assert_eq!(stored.price, 150.0);
    assert_eq!(stored.title, "Deep Home Cleaning");
    Ok(())
}
