//! Booking repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, prelude::DateTimeWithTimeZone,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::models::booking::{self, BookingStatus, Entity as Booking};
use crate::models::listing;
use crate::models::provider::Entity as Provider;
use crate::models::user::Entity as User;

/// Booking joined with its listing, provider and both parties
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingDetail {
    pub id: i32,
    pub listing_id: i32,
    pub user_id: String,
    #[schema(value_type = String, format = DateTime)]
    pub booking_date: DateTimeWithTimeZone,
    pub status: BookingStatus,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
    pub listing_title: String,
    pub listing_description: Option<String>,
    pub listing_price: f64,
    pub provider_id: i32,
    pub business_name: String,
    pub provider_description: String,
    pub customer_name: String,
    pub customer_email: String,
    pub provider_name: Option<String>,
    pub provider_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BookingRepository {
    pub db: Arc<DatabaseConnection>,
}

impl BookingRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<booking::Model>, DbErr> {
        Booking::find_by_id(id).one(&*self.db).await
    }

    /// Insert a pending booking on any connection, including an open transaction.
    pub async fn insert_pending_on<C: ConnectionTrait>(
        conn: &C,
        listing_id: i32,
        user_id: &str,
        booking_date: DateTimeWithTimeZone,
    ) -> Result<booking::Model, DbErr> {
        booking::ActiveModel {
            listing_id: Set(listing_id),
            user_id: Set(user_id.to_string()),
            booking_date: Set(booking_date),
            status: Set(BookingStatus::Pending),
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    /// Bookings made by a customer, latest booking date first
    pub async fn list_for_customer(
        &self,
        user_id: &str,
        status: Option<BookingStatus>,
    ) -> Result<Vec<booking::Model>, DbErr> {
        let mut query = Booking::find().filter(booking::Column::UserId.eq(user_id));
        if let Some(status) = status {
            query = query.filter(booking::Column::Status.eq(status));
        }
        query
            .order_by_desc(booking::Column::BookingDate)
            .all(&*self.db)
            .await
    }

    /// Bookings against any listing of a provider, latest booking date first
    pub async fn list_for_provider(
        &self,
        provider_id: i32,
        status: Option<BookingStatus>,
    ) -> Result<Vec<booking::Model>, DbErr> {
        let mut query = Booking::find()
            .join(
                sea_orm::JoinType::InnerJoin,
                booking::Relation::Listing.def(),
            )
            .filter(listing::Column::ProviderId.eq(provider_id));
        if let Some(status) = status {
            query = query.filter(booking::Column::Status.eq(status));
        }
        query
            .order_by_desc(booking::Column::BookingDate)
            .all(&*self.db)
            .await
    }

    /// The booking with this id, if it was made by `user_id` for `listing_id`
    pub async fn find_matching(
        &self,
        booking_id: i32,
        user_id: &str,
        listing_id: i32,
    ) -> Result<Option<booking::Model>, DbErr> {
        Booking::find_by_id(booking_id)
            .filter(booking::Column::UserId.eq(user_id))
            .filter(booking::Column::ListingId.eq(listing_id))
            .one(&*self.db)
            .await
    }

    /// Move `existing` to `status`. The write only lands while the stored
    /// status still equals `existing.status`; `None` means another request
    /// changed the booking first.
    pub async fn set_status(
        &self,
        existing: booking::Model,
        status: BookingStatus,
    ) -> Result<Option<booking::Model>, DbErr> {
        let result = Booking::update_many()
            .set(booking::ActiveModel {
                status: Set(status),
                ..Default::default()
            })
            .filter(booking::Column::Id.eq(existing.id))
            .filter(booking::Column::Status.eq(existing.status))
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        Ok(Some(booking::Model { status, ..existing }))
    }

    /// Delete a booking only while it is still pending. Returns false when
    /// the booking is gone or has left `pending`.
    pub async fn delete_pending(&self, id: i32) -> Result<bool, DbErr> {
        let result = Booking::delete_many()
            .filter(booking::Column::Id.eq(id))
            .filter(booking::Column::Status.eq(BookingStatus::Pending))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Assemble the detail view of a booking. Returns `None` if the booking
    /// or one of its required relations is missing.
    pub async fn find_detail(
        &self,
        booking: booking::Model,
    ) -> Result<Option<BookingDetail>, DbErr> {
        let db = &*self.db;
        let Some(listing) = listing::Entity::find_by_id(booking.listing_id).one(db).await? else {
            return Ok(None);
        };
        let Some(provider) = Provider::find_by_id(listing.provider_id).one(db).await? else {
            return Ok(None);
        };
        let Some(customer) = User::find_by_id(booking.user_id.clone()).one(db).await? else {
            return Ok(None);
        };
        let provider_user = User::find_by_id(provider.user_id.clone()).one(db).await?;

        Ok(Some(BookingDetail {
            id: booking.id,
            listing_id: booking.listing_id,
            user_id: booking.user_id,
            booking_date: booking.booking_date,
            status: booking.status,
            created_at: booking.created_at,
            listing_title: listing.title,
            listing_description: listing.description,
            listing_price: listing.price,
            provider_id: provider.id,
            business_name: provider.business_name,
            provider_description: provider.description,
            customer_name: customer.display_name,
            customer_email: customer.email,
            provider_name: provider_user.as_ref().map(|u| u.display_name.clone()),
            provider_email: provider_user.map(|u| u.email),
        }))
    }
}
