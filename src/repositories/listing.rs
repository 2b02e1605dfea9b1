//! Listing repository
//!
//! Partial updates go through [`ListingPatch`]: every `Some` field is written,
//! every `None` field is left untouched.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;

use crate::models::listing::{self, Entity as Listing, ListingStatus};

/// Fields for a new listing. Status is always `pending` on insert.
#[derive(Debug, Clone, Default)]
pub struct NewListing {
    pub provider_id: i32,
    pub category_id: Option<i32>,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Editable listing fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<i32>,
    pub image_url: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ListingPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Optional listing filters, combined with AND
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub status: Option<ListingStatus>,
    pub provider_id: Option<i32>,
    pub category_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct ListingRepository {
    pub db: Arc<DatabaseConnection>,
}

impl ListingRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<listing::Model>, DbErr> {
        Listing::find_by_id(id).one(&*self.db).await
    }

    /// Read a listing under a shared row lock so its status cannot change
    /// until the surrounding transaction ends.
    pub async fn find_by_id_for_share<C: ConnectionTrait>(
        conn: &C,
        id: i32,
    ) -> Result<Option<listing::Model>, DbErr> {
        Listing::find_by_id(id).lock_shared().one(conn).await
    }

    /// Listings matching `filter`, newest first
    pub async fn list(&self, filter: &ListingFilter) -> Result<Vec<listing::Model>, DbErr> {
        let mut query = Listing::find();
        if let Some(status) = filter.status {
            query = query.filter(listing::Column::Status.eq(status));
        }
        if let Some(provider_id) = filter.provider_id {
            query = query.filter(listing::Column::ProviderId.eq(provider_id));
        }
        if let Some(category_id) = filter.category_id {
            query = query.filter(listing::Column::CategoryId.eq(category_id));
        }
        query
            .order_by_desc(listing::Column::CreatedAt)
            .order_by_desc(listing::Column::Id)
            .all(&*self.db)
            .await
    }

    pub async fn create(&self, new: NewListing) -> Result<listing::Model, DbErr> {
        listing::ActiveModel {
            provider_id: Set(new.provider_id),
            category_id: Set(new.category_id),
            title: Set(new.title),
            description: Set(new.description),
            price: Set(new.price),
            status: Set(ListingStatus::Pending),
            image_url: Set(new.image_url),
            location: Set(new.location),
            latitude: Set(new.latitude),
            longitude: Set(new.longitude),
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
    }

    /// Apply the supplied fields of `patch` to `existing` on any connection,
    /// including an open transaction.
    pub async fn update_on<C: ConnectionTrait>(
        conn: &C,
        existing: listing::Model,
        patch: ListingPatch,
    ) -> Result<listing::Model, DbErr> {
        if patch.is_empty() {
            return Ok(existing);
        }

        let mut active: listing::ActiveModel = existing.into();
        if let Some(title) = patch.title {
            active.title = Set(title);
        }
        if let Some(description) = patch.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = patch.price {
            active.price = Set(price);
        }
        if let Some(category_id) = patch.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(image_url) = patch.image_url {
            active.image_url = Set(Some(image_url));
        }
        if let Some(location) = patch.location {
            active.location = Set(Some(location));
        }
        if let Some(latitude) = patch.latitude {
            active.latitude = Set(Some(latitude));
        }
        if let Some(longitude) = patch.longitude {
            active.longitude = Set(Some(longitude));
        }
        active.update(conn).await
    }

    pub async fn set_status(
        &self,
        existing: listing::Model,
        status: ListingStatus,
    ) -> Result<Option<listing::Model>, DbErr> {
        Self::set_status_on(&*self.db, existing, status).await
    }

    /// Move `existing` to `status` while the stored status still equals
    /// `existing.status`. `None` means another request changed it first.
    pub async fn set_status_on<C: ConnectionTrait>(
        conn: &C,
        existing: listing::Model,
        status: ListingStatus,
    ) -> Result<Option<listing::Model>, DbErr> {
        let result = Listing::update_many()
            .set(listing::ActiveModel {
                status: Set(status),
                ..Default::default()
            })
            .filter(listing::Column::Id.eq(existing.id))
            .filter(listing::Column::Status.eq(existing.status))
            .exec(conn)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        Ok(Some(listing::Model { status, ..existing }))
    }

    /// Returns false when no such listing exists.
    pub async fn delete_by_id(&self, id: i32) -> Result<bool, DbErr> {
        let result = Listing::delete_by_id(id).exec(&*self.db).await?;
        Ok(result.rows_affected > 0)
    }
}
