//! Review repository and rating aggregates

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult,
    JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::models::review::{self, Entity as Review};
use crate::models::user;

/// Fields for a new review row
#[derive(Debug, Clone)]
pub struct NewReview {
    pub booking_id: i32,
    pub user_id: String,
    pub listing_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewPatch {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}

/// A review together with the reviewer's display name
#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct ReviewWithReviewer {
    pub id: i32,
    pub booking_id: i32,
    pub user_id: String,
    pub listing_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
    pub reviewer_name: String,
}

/// Average rating of one listing
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RatingAverage {
    pub listing_id: i32,
    /// Rounded to one decimal place
    pub avg_rating: f64,
    pub review_count: i64,
}

#[derive(Debug, FromQueryResult)]
struct RatingAggregateRow {
    listing_id: i32,
    avg_rating: Option<f64>,
    review_count: i64,
}

/// Round to one decimal place
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone)]
pub struct ReviewRepository {
    pub db: Arc<DatabaseConnection>,
}

impl ReviewRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<review::Model>, DbErr> {
        Review::find_by_id(id).one(&*self.db).await
    }

    pub async fn create(&self, new: NewReview) -> Result<review::Model, DbErr> {
        review::ActiveModel {
            booking_id: Set(new.booking_id),
            user_id: Set(new.user_id),
            listing_id: Set(new.listing_id),
            rating: Set(new.rating),
            comment: Set(new.comment),
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
    }

    pub async fn update(
        &self,
        existing: review::Model,
        patch: ReviewPatch,
    ) -> Result<review::Model, DbErr> {
        let mut active: review::ActiveModel = existing.into();
        if let Some(rating) = patch.rating {
            active.rating = Set(rating);
        }
        if let Some(comment) = patch.comment {
            active.comment = Set(Some(comment));
        }
        active.update(&*self.db).await
    }

    /// Returns false when no such review exists.
    pub async fn delete_by_id(&self, id: i32) -> Result<bool, DbErr> {
        let result = Review::delete_by_id(id).exec(&*self.db).await?;
        Ok(result.rows_affected > 0)
    }

    /// Reviews of a listing with reviewer names, newest first
    pub async fn list_for_listing(
        &self,
        listing_id: i32,
    ) -> Result<Vec<ReviewWithReviewer>, DbErr> {
        Review::find()
            .select_only()
            .columns([
                review::Column::Id,
                review::Column::BookingId,
                review::Column::UserId,
                review::Column::ListingId,
                review::Column::Rating,
                review::Column::Comment,
                review::Column::CreatedAt,
            ])
            .column_as(user::Column::DisplayName, "reviewer_name")
            .join(JoinType::InnerJoin, review::Relation::User.def())
            .filter(review::Column::ListingId.eq(listing_id))
            .order_by_desc(review::Column::CreatedAt)
            .order_by_desc(review::Column::Id)
            .into_model::<ReviewWithReviewer>()
            .all(&*self.db)
            .await
    }

    /// Every review, newest first
    pub async fn list_all(&self) -> Result<Vec<review::Model>, DbErr> {
        Review::find()
            .order_by_desc(review::Column::CreatedAt)
            .order_by_desc(review::Column::Id)
            .all(&*self.db)
            .await
    }

    /// Average rating and review count per listing, computed on read.
    pub async fn average_ratings(&self) -> Result<Vec<RatingAverage>, DbErr> {
        let rows = Review::find()
            .select_only()
            .column(review::Column::ListingId)
            .column_as(
                Expr::cust("CAST(AVG(rating) AS DOUBLE PRECISION)"),
                "avg_rating",
            )
            .column_as(Expr::col(review::Column::Id).count(), "review_count")
            .group_by(review::Column::ListingId)
            .order_by_asc(review::Column::ListingId)
            .into_model::<RatingAggregateRow>()
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| RatingAverage {
                listing_id: row.listing_id,
                avg_rating: round_rating(row.avg_rating.unwrap_or_default()),
                review_count: row.review_count,
            })
            .collect())
    }
}
