//! Per-user bookmark set

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::error::ServiceError;
use crate::models::bookmark;
use crate::repositories::bookmark::BookmarkedListing;
use crate::repositories::{BookmarkRepository, ListingRepository};

const DUPLICATE_BOOKMARK: &str = "This service is already bookmarked";

#[derive(Debug, Clone)]
pub struct BookmarkSet {
    bookmarks: BookmarkRepository,
    listings: ListingRepository,
}

impl BookmarkSet {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            bookmarks: BookmarkRepository::new(db.clone()),
            listings: ListingRepository::new(db),
        }
    }

    /// Bookmark a listing. A duplicate is an error, never a silent no-op.
    pub async fn add(&self, user_id: &str, listing_id: i32) -> Result<bookmark::Model, ServiceError> {
        if self.listings.find_by_id(listing_id).await?.is_none() {
            return Err(ServiceError::not_found("Service not found"));
        }
        if self
            .bookmarks
            .find_by_user_and_listing(user_id, listing_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::conflict(DUPLICATE_BOOKMARK));
        }
        self.bookmarks
            .create(user_id, listing_id)
            .await
            .map_err(|err| ServiceError::from_db_with_conflict(err, DUPLICATE_BOOKMARK))
    }

    pub async fn remove(&self, bookmark_id: i32, requester_id: &str) -> Result<(), ServiceError> {
        let existing = self
            .bookmarks
            .find_by_id(bookmark_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Bookmark not found"))?;
        if existing.user_id != requester_id {
            return Err(ServiceError::forbidden(
                "Not authorized to remove this bookmark",
            ));
        }
        self.bookmarks.delete_by_id(bookmark_id).await?;
        Ok(())
    }

    pub async fn remove_by_listing(&self, user_id: &str, listing_id: i32) -> Result<(), ServiceError> {
        let existing = self
            .bookmarks
            .find_by_user_and_listing(user_id, listing_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Bookmark not found"))?;
        self.bookmarks.delete_by_id(existing.id).await?;
        Ok(())
    }

    /// Bookmarked listings that are currently approved
    pub async fn list_with_details(
        &self,
        user_id: &str,
    ) -> Result<Vec<BookmarkedListing>, ServiceError> {
        Ok(self.bookmarks.list_with_details(user_id).await?)
    }

    pub async fn is_bookmarked(&self, user_id: &str, listing_id: i32) -> Result<bool, ServiceError> {
        Ok(self
            .bookmarks
            .find_by_user_and_listing(user_id, listing_id)
            .await?
            .is_some())
    }
}
