//! Review ledger. A review is tied one-to-one to a booking and may only be
//! written by that booking's customer for that booking's listing.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::error::ServiceError;
use crate::models::review;
use crate::repositories::review::{NewReview, RatingAverage, ReviewPatch, ReviewWithReviewer};
use crate::repositories::{BookingRepository, ReviewRepository};

const MIN_RATING: i32 = 1;
const MAX_RATING: i32 = 5;

fn validate_rating(rating: i32) -> Result<i32, ServiceError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(ServiceError::validation(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}"
        )))
    }
}

#[derive(Debug, Clone)]
pub struct ReviewLedger {
    reviews: ReviewRepository,
    bookings: BookingRepository,
}

impl ReviewLedger {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            reviews: ReviewRepository::new(db.clone()),
            bookings: BookingRepository::new(db),
        }
    }

    pub async fn add_review(
        &self,
        reviewer_id: &str,
        listing_id: i32,
        booking_id: Option<i32>,
        rating: Option<i32>,
        comment: Option<String>,
    ) -> Result<review::Model, ServiceError> {
        let (Some(booking_id), Some(rating)) = (booking_id, rating) else {
            return Err(ServiceError::validation("Missing required fields"));
        };
        let rating = validate_rating(rating)?;

        if self
            .bookings
            .find_matching(booking_id, reviewer_id, listing_id)
            .await?
            .is_none()
        {
            return Err(ServiceError::validation(
                "Invalid booking for this user or service",
            ));
        }

        let created = self
            .reviews
            .create(NewReview {
                booking_id,
                user_id: reviewer_id.to_string(),
                listing_id,
                rating,
                comment,
            })
            .await
            .map_err(|err| {
                ServiceError::from_db_with_conflict(err, "This booking has already been reviewed")
            })?;

        tracing::info!(review_id = created.id, booking_id, listing_id, "Review added");
        Ok(created)
    }

    /// Partial update of rating and comment
    pub async fn update_review(
        &self,
        review_id: i32,
        patch: ReviewPatch,
    ) -> Result<review::Model, ServiceError> {
        if patch.rating.is_none() && patch.comment.is_none() {
            return Err(ServiceError::validation("Nothing to update"));
        }
        if let Some(rating) = patch.rating {
            validate_rating(rating)?;
        }
        let existing = self
            .reviews
            .find_by_id(review_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Review not found"))?;
        Ok(self.reviews.update(existing, patch).await?)
    }

    pub async fn delete_review(&self, review_id: i32) -> Result<(), ServiceError> {
        if !self.reviews.delete_by_id(review_id).await? {
            return Err(ServiceError::not_found("Review not found"));
        }
        tracing::info!(review_id, "Review deleted");
        Ok(())
    }

    pub async fn list_for_listing(
        &self,
        listing_id: i32,
    ) -> Result<Vec<ReviewWithReviewer>, ServiceError> {
        Ok(self.reviews.list_for_listing(listing_id).await?)
    }

    pub async fn list_all(&self) -> Result<Vec<review::Model>, ServiceError> {
        Ok(self.reviews.list_all().await?)
    }

    pub async fn average_ratings(&self) -> Result<Vec<RatingAverage>, ServiceError> {
        Ok(self.reviews.average_ratings().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(6).is_err());
    }
}
