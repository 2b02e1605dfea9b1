//! Bookmark repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult,
    JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    prelude::DateTimeWithTimeZone,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::models::bookmark::{self, Entity as Bookmark};
use crate::models::listing::{self, ListingStatus};
use crate::models::{category, provider};

/// A bookmark joined with the listing, provider and category it points at
#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct BookmarkedListing {
    pub bookmark_id: i32,
    pub user_id: String,
    pub listing_id: i32,
    #[schema(value_type = String, format = DateTime)]
    pub bookmarked_at: DateTimeWithTimeZone,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub status: ListingStatus,
    pub image_url: Option<String>,
    pub location: Option<String>,
    pub category_id: Option<i32>,
    pub provider_id: i32,
    pub business_name: String,
    pub provider_description: String,
    pub category_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BookmarkRepository {
    pub db: Arc<DatabaseConnection>,
}

impl BookmarkRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<bookmark::Model>, DbErr> {
        Bookmark::find_by_id(id).one(&*self.db).await
    }

    pub async fn find_by_user_and_listing(
        &self,
        user_id: &str,
        listing_id: i32,
    ) -> Result<Option<bookmark::Model>, DbErr> {
        Bookmark::find()
            .filter(bookmark::Column::UserId.eq(user_id))
            .filter(bookmark::Column::ListingId.eq(listing_id))
            .one(&*self.db)
            .await
    }

    /// Insert a bookmark. The unique (user_id, listing_id) index rejects duplicates.
    pub async fn create(&self, user_id: &str, listing_id: i32) -> Result<bookmark::Model, DbErr> {
        bookmark::ActiveModel {
            user_id: Set(user_id.to_string()),
            listing_id: Set(listing_id),
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
    }

    /// Returns false when no such bookmark exists.
    pub async fn delete_by_id(&self, id: i32) -> Result<bool, DbErr> {
        let result = Bookmark::delete_by_id(id).exec(&*self.db).await?;
        Ok(result.rows_affected > 0)
    }

    /// Bookmarks of a user whose listing is currently approved, newest first
    pub async fn list_with_details(&self, user_id: &str) -> Result<Vec<BookmarkedListing>, DbErr> {
        Bookmark::find()
            .select_only()
            .column_as(bookmark::Column::Id, "bookmark_id")
            .column_as(bookmark::Column::UserId, "user_id")
            .column_as(bookmark::Column::ListingId, "listing_id")
            .column_as(bookmark::Column::CreatedAt, "bookmarked_at")
            .column_as(listing::Column::Title, "title")
            .column_as(listing::Column::Description, "description")
            .column_as(listing::Column::Price, "price")
            .column_as(listing::Column::Status, "status")
            .column_as(listing::Column::ImageUrl, "image_url")
            .column_as(listing::Column::Location, "location")
            .column_as(listing::Column::CategoryId, "category_id")
            .column_as(listing::Column::ProviderId, "provider_id")
            .column_as(provider::Column::BusinessName, "business_name")
            .column_as(provider::Column::Description, "provider_description")
            .column_as(category::Column::Name, "category_name")
            .join(JoinType::InnerJoin, bookmark::Relation::Listing.def())
            .join(JoinType::InnerJoin, listing::Relation::Provider.def())
            .join(JoinType::LeftJoin, listing::Relation::Category.def())
            .filter(bookmark::Column::UserId.eq(user_id))
            .filter(listing::Column::Status.eq(ListingStatus::Approved))
            .order_by_desc(bookmark::Column::CreatedAt)
            .order_by_desc(bookmark::Column::Id)
            .into_model::<BookmarkedListing>()
            .all(&*self.db)
            .await
    }
}
