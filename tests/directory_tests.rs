//! Account resolution, role assignment and account removal.

#[path = "test_utils/mod.rs"]
mod test_utils;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use marketplace::config::ProviderAllowlistEntry;
use marketplace::error::ServiceError;
use marketplace::identity::{IdentityError, IdentityProvider, VerifiedIdentity};
use marketplace::models::{ListingStatus, Role};
use marketplace::repositories::{ListingRepository, ProviderRepository};
use marketplace::services::directory::{AccountRequest, Resolution};
use marketplace::services::{Actor, Directory, RoleAllowlists};
use sea_orm::DatabaseConnection;
use test_utils::{create_listing, create_user};

/// Records revocations and optionally fails them.
#[derive(Default)]
struct RecordingIdentity {
    fail_revoke: bool,
    revoked: Mutex<Vec<String>>,
}

#[async_trait]
impl IdentityProvider for RecordingIdentity {
    async fn verify(&self, _token: &str) -> Result<VerifiedIdentity, IdentityError> {
        Err(IdentityError::InvalidToken("not used".to_string()))
    }

    async fn revoke(&self, subject_id: &str) -> Result<(), IdentityError> {
        self.revoked
            .lock()
            .expect("revocation log")
            .push(subject_id.to_string());
        if self.fail_revoke {
            Err(IdentityError::Revocation("upstream down".to_string()))
        } else {
            Ok(())
        }
    }
}

fn allowlists() -> Arc<RoleAllowlists> {
    Arc::new(RoleAllowlists::new(
        vec!["Admin@Example.com".to_string()],
        vec![ProviderAllowlistEntry {
            email: "listed@example.com".to_string(),
            business_name: Some("Listed Plumbing".to_string()),
            description: None,
        }],
    ))
}

async fn directory_with(
    identity: Arc<RecordingIdentity>,
) -> Result<(Directory, Arc<DatabaseConnection>)> {
    let db = test_utils::setup_test_db_arc().await?;
    Ok((Directory::new(db.clone(), allowlists(), identity), db))
}

fn request(subject: &str, email: &str) -> AccountRequest {
    AccountRequest {
        subject_id: subject.to_string(),
        email: Some(email.to_string()),
        display_name: Some("Jamie Tan".to_string()),
        ..AccountRequest::default()
    }
}

#[tokio::test]
async fn first_login_creates_customer_then_resolves_existing() -> Result<()> {
    let (directory, _) = directory_with(Arc::default()).await?;

    let first = directory
        .resolve_or_create(request("uid-1", "jamie@example.com"))
        .await?;
    assert!(first.is_created());
    assert_eq!(first.account().user.role, Role::Customer);
    assert!(first.account().provider.is_none());

    let second = directory
        .resolve_or_create(request("uid-1", "jamie@example.com"))
        .await?;
    assert!(matches!(second, Resolution::Existing(_)));
    assert_eq!(second.into_account().user.id, "uid-1");
    Ok(())
}

#[tokio::test]
async fn allowlisted_emails_get_privileged_roles() -> Result<()> {
    let (directory, _) = directory_with(Arc::default()).await?;

    let admin = directory
        .resolve_or_create(request("uid-admin", "admin@example.com"))
        .await?
        .into_account();
    assert_eq!(admin.user.role, Role::Admin);

    let provider = directory
        .resolve_or_create(request("uid-listed", "listed@example.com"))
        .await?
        .into_account();
    assert_eq!(provider.user.role, Role::Provider);
    let profile = provider.provider.expect("provider profile");
    assert_eq!(profile.business_name, "Listed Plumbing");
    assert_eq!(profile.description, "");
    Ok(())
}

#[tokio::test]
async fn requested_provider_role_needs_business_details() -> Result<()> {
    let (directory, _) = directory_with(Arc::default()).await?;

    let incomplete = directory
        .resolve_or_create(AccountRequest {
            requested_role: Some(Role::Provider),
            business_name: Some("Sparkle Co".to_string()),
            ..request("uid-2", "sparkle@example.com")
        })
        .await;
    assert!(matches!(incomplete, Err(ServiceError::Validation(_))));

    let complete = directory
        .resolve_or_create(AccountRequest {
            requested_role: Some(Role::Provider),
            business_name: Some("Sparkle Co".to_string()),
            business_description: Some("Home cleaning".to_string()),
            ..request("uid-2", "sparkle@example.com")
        })
        .await?
        .into_account();
    assert_eq!(complete.user.role, Role::Provider);
    assert_eq!(
        complete.provider.map(|p| p.business_name),
        Some("Sparkle Co".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn requested_admin_role_is_ignored() -> Result<()> {
    let (directory, _) = directory_with(Arc::default()).await?;

    let account = directory
        .resolve_or_create(AccountRequest {
            requested_role: Some(Role::Admin),
            ..request("uid-3", "hopeful@example.com")
        })
        .await?
        .into_account();
    assert_eq!(account.user.role, Role::Customer);
    Ok(())
}

#[tokio::test]
async fn missing_email_and_name_are_handled() -> Result<()> {
    let (directory, _) = directory_with(Arc::default()).await?;

    let no_email = directory
        .resolve_or_create(AccountRequest {
            subject_id: "uid-4".to_string(),
            ..AccountRequest::default()
        })
        .await;
    match no_email {
        Err(ServiceError::Validation(message)) => {
            assert_eq!(message, "Email missing from identity token")
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let unnamed = directory
        .resolve_or_create(AccountRequest {
            display_name: None,
            ..request("uid-4", "anon@example.com")
        })
        .await?
        .into_account();
    assert_eq!(unnamed.user.display_name, "Unnamed User");
    Ok(())
}

#[tokio::test]
async fn duplicate_email_under_new_subject_conflicts() -> Result<()> {
    let (directory, db) = directory_with(Arc::default()).await?;
    create_user(&db, "uid-old", "taken@example.com", Role::Customer).await?;

    let result = directory
        .resolve_or_create(request("uid-new", "taken@example.com"))
        .await;
    match result {
        Err(ServiceError::Conflict(message)) => {
            assert_eq!(message, "An account with this email already exists")
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn deleting_own_account_survives_revoke_failure() -> Result<()> {
    let identity = Arc::new(RecordingIdentity {
        fail_revoke: true,
        ..RecordingIdentity::default()
    });
    let (directory, _) = directory_with(identity.clone()).await?;
    directory
        .resolve_or_create(request("uid-5", "leaving@example.com"))
        .await?;

    directory.delete_account("uid-5").await?;

    assert_eq!(*identity.revoked.lock().expect("revocation log"), vec!["uid-5".to_string()]);
    let gone = directory.get_profile("uid-5").await;
    assert!(matches!(gone, Err(ServiceError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn deleting_a_provider_cascades_to_listings() -> Result<()> {
    let (directory, db) = directory_with(Arc::default()).await?;
    let account = directory
        .resolve_or_create(request("uid-listed", "listed@example.com"))
        .await?
        .into_account();
    let provider_id = account.provider.as_ref().expect("provider profile").id;
    let listing = create_listing(&db, provider_id, ListingStatus::Approved).await?;

    directory.delete_account("uid-listed").await?;

    assert!(ProviderRepository::new(db.clone()).find_by_id(provider_id).await?.is_none());
    assert!(ListingRepository::new(db.clone()).find_by_id(listing.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn admin_removal_rules() -> Result<()> {
    let identity = Arc::new(RecordingIdentity::default());
    let (directory, db) = directory_with(identity.clone()).await?;
    create_user(&db, "uid-admin", "admin@example.com", Role::Admin).await?;
    create_user(&db, "uid-target", "target@example.com", Role::Customer).await?;
    let admin = Actor::new("uid-admin", Role::Admin);

    let by_customer = directory
        .remove_user(&Actor::new("uid-target", Role::Customer), "uid-admin")
        .await;
    assert!(matches!(by_customer, Err(ServiceError::Forbidden(_))));

    let self_delete = directory.remove_user(&admin, "uid-admin").await;
    assert!(matches!(self_delete, Err(ServiceError::Validation(_))));

    directory.remove_user(&admin, "uid-target").await?;
    let again = directory.remove_user(&admin, "uid-target").await;
    assert!(matches!(again, Err(ServiceError::NotFound(_))));

    // admin removal leaves the upstream identity alone
    assert!(identity.revoked.lock().expect("revocation log").is_empty());
    assert_eq!(directory.list_users().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn set_role_keeps_provider_profile_in_step() -> Result<()> {
    let (directory, db) = directory_with(Arc::default()).await?;
    create_user(&db, "uid-target", "target@example.com", Role::Customer).await?;
    let admin = Actor::new("uid-admin", Role::Admin);

    let promoted = directory
        .set_role(
            &admin,
            "uid-target",
            Role::Provider,
            Some("Target Repairs".to_string()),
            None,
        )
        .await?;
    assert_eq!(promoted.user.role, Role::Provider);
    assert_eq!(
        promoted.provider.as_ref().map(|p| p.business_name.as_str()),
        Some("Target Repairs")
    );

    let demoted = directory
        .set_role(&admin, "uid-target", Role::Customer, None, None)
        .await?;
    assert_eq!(demoted.user.role, Role::Customer);
    assert!(demoted.provider.is_none());
    assert!(
        ProviderRepository::new(db.clone())
            .find_by_user_id("uid-target")
            .await?
            .is_none()
    );

    let missing = directory
        .set_role(&admin, "nobody", Role::Admin, None, None)
        .await;
    assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    Ok(())
}
