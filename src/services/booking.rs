//! Booking engine.
//!
//! The only multi-actor state machine in the marketplace. A booking is made
//! by a customer against an approved listing and then moved through
//! `pending -> confirmed -> completed` or to `cancelled` by the customer or
//! the provider owning the listing. `cancelled` and `completed` are final.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};

use crate::error::ServiceError;
use crate::models::{BookingStatus, ListingStatus, booking};
use crate::repositories::booking::BookingDetail;
use crate::repositories::{BookingRepository, ListingRepository, ProviderRepository};

/// How the acting user relates to a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingRelation {
    Customer,
    /// Owner of the booked listing
    Provider,
}

/// Which side of the marketplace a booking list is requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingPerspective {
    Customer,
    Provider,
}

/// Check a requested status change for an actor with the given relation.
pub fn authorize_transition(
    relation: BookingRelation,
    current: BookingStatus,
    target: BookingStatus,
) -> Result<(), ServiceError> {
    use BookingStatus::*;

    let allowed = match (relation, current, target) {
        (_, from, _) if from.is_terminal() => false,
        (BookingRelation::Customer, Pending | Confirmed, Cancelled) => true,
        (BookingRelation::Provider, Pending, Confirmed) => true,
        (BookingRelation::Provider, Pending | Confirmed, Cancelled | Completed) => true,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(ServiceError::validation(format!(
            "Invalid status transition from {} to {}",
            current.as_str(),
            target.as_str()
        )))
    }
}

/// Parse an RFC 3339 booking date and require it to be after `now`.
pub fn parse_booking_date(
    raw: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<FixedOffset>, ServiceError> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|_| ServiceError::validation("booking_date must be a valid RFC 3339 timestamp"))?;
    if parsed.with_timezone(&Utc) <= now {
        return Err(ServiceError::validation(
            "Booking date must be in the future",
        ));
    }
    Ok(parsed)
}

#[derive(Debug, Clone)]
pub struct BookingEngine {
    db: Arc<DatabaseConnection>,
    bookings: BookingRepository,
    listings: ListingRepository,
    providers: ProviderRepository,
}

impl BookingEngine {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            bookings: BookingRepository::new(db.clone()),
            listings: ListingRepository::new(db.clone()),
            providers: ProviderRepository::new(db.clone()),
            db,
        }
    }

    /// Create a pending booking. The listing status check and the insert run
    /// in one transaction with the listing row share-locked.
    pub async fn create_booking(
        &self,
        customer_id: &str,
        listing_id: Option<i32>,
        booking_date: Option<&str>,
    ) -> Result<booking::Model, ServiceError> {
        let (Some(listing_id), Some(raw_date)) = (listing_id, booking_date) else {
            return Err(ServiceError::validation(
                "listing_id and booking_date are required",
            ));
        };
        let booking_date = parse_booking_date(raw_date, Utc::now())?;

        let txn = self.db.begin().await?;
        let listing = ListingRepository::find_by_id_for_share(&txn, listing_id).await?;
        if !listing.is_some_and(|l| l.status == ListingStatus::Approved) {
            return Err(ServiceError::not_found(
                "Service not found or not approved for booking.",
            ));
        }
        let created =
            BookingRepository::insert_pending_on(&txn, listing_id, customer_id, booking_date)
                .await?;
        txn.commit().await?;

        tracing::info!(
            booking_id = created.id,
            listing_id,
            customer_id,
            "Booking created"
        );
        metrics::counter!("bookings_created_total").increment(1);
        Ok(created)
    }

    /// Bookings visible to an actor. Provider views require a provider profile.
    pub async fn list_bookings(
        &self,
        actor_id: &str,
        view: BookingPerspective,
        status: Option<BookingStatus>,
    ) -> Result<Vec<booking::Model>, ServiceError> {
        match view {
            BookingPerspective::Customer => Ok(self.bookings.list_for_customer(actor_id, status).await?),
            BookingPerspective::Provider => {
                let provider = self
                    .providers
                    .find_by_user_id(actor_id)
                    .await?
                    .ok_or_else(|| ServiceError::forbidden("User is not a provider"))?;
                Ok(self.bookings.list_for_provider(provider.id, status).await?)
            }
        }
    }

    async fn load(&self, booking_id: i32) -> Result<booking::Model, ServiceError> {
        self.bookings
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Booking not found"))
    }

    /// Relation of `actor_id` to the booking. Owning the listing takes
    /// precedence over being the customer.
    async fn relation(
        &self,
        booking: &booking::Model,
        actor_id: &str,
    ) -> Result<Option<BookingRelation>, ServiceError> {
        if let Some(provider) = self.providers.find_by_user_id(actor_id).await? {
            let owns_listing = self
                .listings
                .find_by_id(booking.listing_id)
                .await?
                .is_some_and(|listing| listing.provider_id == provider.id);
            if owns_listing {
                return Ok(Some(BookingRelation::Provider));
            }
        }
        if booking.user_id == actor_id {
            return Ok(Some(BookingRelation::Customer));
        }
        Ok(None)
    }

    pub async fn get_booking_details(
        &self,
        booking_id: i32,
        actor_id: &str,
    ) -> Result<BookingDetail, ServiceError> {
        let booking = self.load(booking_id).await?;
        if self.relation(&booking, actor_id).await?.is_none() {
            return Err(ServiceError::forbidden(
                "Not authorized to view this booking",
            ));
        }
        self.bookings
            .find_detail(booking)
            .await?
            .ok_or_else(|| ServiceError::not_found("Booking not found"))
    }

    pub async fn update_status(
        &self,
        booking_id: i32,
        actor_id: &str,
        target: BookingStatus,
    ) -> Result<booking::Model, ServiceError> {
        let booking = self.load(booking_id).await?;
        let relation = self.relation(&booking, actor_id).await?.ok_or_else(|| {
            ServiceError::forbidden("Not authorized to update this booking")
        })?;

        let from = booking.status;
        authorize_transition(relation, from, target)?;
        let updated = self
            .bookings
            .set_status(booking, target)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidState(format!("Booking is no longer {}", from.as_str()))
            })?;

        tracing::info!(
            booking_id,
            actor_id,
            from = from.as_str(),
            to = target.as_str(),
            "Booking status changed"
        );
        metrics::counter!("booking_transitions_total", "to" => target.as_str()).increment(1);
        Ok(updated)
    }

    /// Delete a booking. Only its customer may do so, and only while pending.
    pub async fn delete_booking(&self, booking_id: i32, actor_id: &str) -> Result<(), ServiceError> {
        let booking = self.load(booking_id).await?;
        if booking.user_id != actor_id {
            return Err(ServiceError::forbidden(
                "Not authorized to delete this booking",
            ));
        }
        if booking.status != BookingStatus::Pending {
            return Err(ServiceError::InvalidState(
                "Only pending bookings can be deleted".to_string(),
            ));
        }
        if !self.bookings.delete_pending(booking_id).await? {
            return Err(ServiceError::InvalidState(
                "Only pending bookings can be deleted".to_string(),
            ));
        }
        tracing::info!(booking_id, actor_id, "Booking deleted");
        Ok(())
    }
}
