//! Listing catalog: creation, partial edits, moderation and public queries.
//!
//! Listing status follows a small state machine:
//! `pending -> approved | rejected` by an admin, then `approved -> completed`
//! by the owning provider. Rejected and completed listings are final.

use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};

use crate::error::ServiceError;
use crate::models::{ListingStatus, listing};
use crate::repositories::listing::{ListingFilter, ListingPatch, NewListing};
use crate::repositories::{CategoryRepository, ListingRepository};
use crate::services::Account;

/// Input for a new listing as received from a provider
#[derive(Debug, Clone, Default)]
pub struct ListingDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<i32>,
    pub image_url: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Who is acting on a listing
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    pub is_admin: bool,
    pub provider_id: Option<i32>,
}

impl Requester {
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            provider_id: None,
        }
    }

    pub fn provider(provider_id: i32) -> Self {
        Self {
            is_admin: false,
            provider_id: Some(provider_id),
        }
    }

    fn owns(&self, listing: &listing::Model) -> bool {
        self.provider_id == Some(listing.provider_id)
    }
}

impl From<&Account> for Requester {
    fn from(account: &Account) -> Self {
        Self {
            is_admin: account.user.role == crate::models::Role::Admin,
            provider_id: account.provider.as_ref().map(|p| p.id),
        }
    }
}

/// Check a listing status change against the moderation rules.
pub fn authorize_listing_transition(
    requester: &Requester,
    listing: &listing::Model,
    target: ListingStatus,
) -> Result<(), ServiceError> {
    let current = listing.status;
    let allowed = !current.is_terminal()
        && ((requester.is_admin
            && current == ListingStatus::Pending
            && matches!(target, ListingStatus::Approved | ListingStatus::Rejected))
            || (requester.owns(listing)
                && current == ListingStatus::Approved
                && target == ListingStatus::Completed));

    if allowed {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition(format!(
            "Cannot change listing status from {} to {}",
            current.as_str(),
            target.as_str()
        )))
    }
}

fn validate_price(price: f64) -> Result<f64, ServiceError> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(ServiceError::validation(
            "price must be a non-negative number",
        ))
    }
}

fn validate_title(title: &str) -> Result<String, ServiceError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        Err(ServiceError::validation("title must not be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Conditional status write; fails when the stored status moved on since
/// `existing` was read.
async fn transition_on<C: ConnectionTrait>(
    conn: &C,
    existing: listing::Model,
    target: ListingStatus,
) -> Result<listing::Model, ServiceError> {
    let from = existing.status;
    ListingRepository::set_status_on(conn, existing, target)
        .await?
        .ok_or_else(|| ServiceError::InvalidState(format!("Listing is no longer {}", from.as_str())))
}

fn record_transition(from: ListingStatus, updated: &listing::Model) {
    tracing::info!(
        listing_id = updated.id,
        from = from.as_str(),
        to = updated.status.as_str(),
        "Listing status changed"
    );
    metrics::counter!("listing_status_changes_total", "to" => updated.status.as_str()).increment(1);
}

#[derive(Debug, Clone)]
pub struct ListingCatalog {
    db: Arc<DatabaseConnection>,
    listings: ListingRepository,
    categories: CategoryRepository,
}

impl ListingCatalog {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            listings: ListingRepository::new(db.clone()),
            categories: CategoryRepository::new(db.clone()),
            db,
        }
    }

    async fn ensure_category(&self, category_id: Option<i32>) -> Result<(), ServiceError> {
        if let Some(id) = category_id {
            if self.categories.find_by_id(id).await?.is_none() {
                return Err(ServiceError::validation(format!(
                    "Category {id} does not exist"
                )));
            }
        }
        Ok(())
    }

    async fn load(&self, listing_id: i32) -> Result<listing::Model, ServiceError> {
        self.listings
            .find_by_id(listing_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Service not found"))
    }

    /// Create a listing for `provider_id`. New listings are always pending.
    pub async fn create_listing(
        &self,
        provider_id: i32,
        draft: ListingDraft,
    ) -> Result<listing::Model, ServiceError> {
        let (Some(title), Some(price)) = (draft.title, draft.price) else {
            return Err(ServiceError::validation("title and price are required"));
        };
        let title = validate_title(&title)?;
        let price = validate_price(price)?;
        self.ensure_category(draft.category_id).await?;

        let created = self
            .listings
            .create(NewListing {
                provider_id,
                category_id: draft.category_id,
                title,
                description: draft.description,
                price,
                image_url: draft.image_url,
                location: draft.location,
                latitude: draft.latitude,
                longitude: draft.longitude,
            })
            .await?;

        tracing::info!(listing_id = created.id, provider_id, "Listing created");
        Ok(created)
    }

    /// Apply a partial edit and, optionally, a status change.
    pub async fn update_listing(
        &self,
        listing_id: i32,
        requester: &Requester,
        patch: ListingPatch,
        status: Option<ListingStatus>,
    ) -> Result<listing::Model, ServiceError> {
        let existing = self.load(listing_id).await?;
        if !requester.is_admin && !requester.owns(&existing) {
            return Err(ServiceError::forbidden(
                "Not authorized to modify this service",
            ));
        }
        if patch.is_empty() && status.is_none() {
            return Err(ServiceError::validation("No fields to update"));
        }

        if let Some(target) = status {
            authorize_listing_transition(requester, &existing, target)?;
        }

        let mut patch = patch;
        if let Some(title) = patch.title.as_deref() {
            patch.title = Some(validate_title(title)?);
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
        }
        self.ensure_category(patch.category_id).await?;

        let from = existing.status;
        let txn = self.db.begin().await?;
        let current = match status {
            Some(target) => transition_on(&txn, existing, target).await?,
            None => existing,
        };
        let updated = ListingRepository::update_on(&txn, current, patch).await?;
        txn.commit().await?;

        if status.is_some() {
            record_transition(from, &updated);
        }
        Ok(updated)
    }

    /// Admin approval or rejection of a pending listing
    pub async fn moderate(
        &self,
        listing_id: i32,
        requester: &Requester,
        target: ListingStatus,
    ) -> Result<listing::Model, ServiceError> {
        if !requester.is_admin {
            return Err(ServiceError::forbidden("Admin access required"));
        }
        let existing = self.load(listing_id).await?;
        authorize_listing_transition(requester, &existing, target)?;
        let from = existing.status;
        let updated = transition_on(&*self.db, existing, target).await?;
        record_transition(from, &updated);
        Ok(updated)
    }

    pub async fn delete_listing(
        &self,
        listing_id: i32,
        requester: &Requester,
    ) -> Result<(), ServiceError> {
        let existing = self.load(listing_id).await?;
        if !requester.is_admin && !requester.owns(&existing) {
            return Err(ServiceError::forbidden(
                "Not authorized to delete this service",
            ));
        }
        self.listings.delete_by_id(existing.id).await?;
        tracing::info!(listing_id, "Listing deleted");
        Ok(())
    }

    /// Public listing query. Defaults to approved; only approved and
    /// completed listings are visible publicly.
    pub async fn list_public(
        &self,
        mut filter: ListingFilter,
    ) -> Result<Vec<listing::Model>, ServiceError> {
        let status = filter.status.unwrap_or(ListingStatus::Approved);
        if !matches!(status, ListingStatus::Approved | ListingStatus::Completed) {
            return Err(ServiceError::validation(
                "status must be approved or completed",
            ));
        }
        filter.status = Some(status);
        Ok(self.listings.list(&filter).await?)
    }

    /// Unrestricted query for admins
    pub async fn list_all(&self, filter: ListingFilter) -> Result<Vec<listing::Model>, ServiceError> {
        Ok(self.listings.list(&filter).await?)
    }

    pub async fn list_for_provider(
        &self,
        provider_id: i32,
    ) -> Result<Vec<listing::Model>, ServiceError> {
        Ok(self
            .listings
            .list(&ListingFilter {
                provider_id: Some(provider_id),
                ..ListingFilter::default()
            })
            .await?)
    }

    pub async fn get_listing(&self, listing_id: i32) -> Result<listing::Model, ServiceError> {
        self.load(listing_id).await
    }

    /// A listing as seen by its owner; other providers are refused.
    pub async fn get_owned(
        &self,
        listing_id: i32,
        requester: &Requester,
    ) -> Result<listing::Model, ServiceError> {
        let existing = self.load(listing_id).await?;
        if requester.is_admin || requester.owns(&existing) {
            Ok(existing)
        } else {
            Err(ServiceError::forbidden("Not authorized to view this service"))
        }
    }
}
