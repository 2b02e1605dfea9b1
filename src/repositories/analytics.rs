//! Provider analytics queries and rollup persistence

use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QuerySelect, RelationTrait, Set,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::models::provider_analytics::{self, Entity as ProviderAnalytics};
use crate::models::{booking, listing, review};
use crate::repositories::review::round_rating;

/// Aggregates for one provider, computed from listings, bookings and reviews
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProviderAnalyticsSummary {
    pub provider_id: i32,
    pub total_services: i64,
    /// `None` until the provider has at least one review
    pub average_rating: Option<f64>,
    pub total_bookings: i64,
}

#[derive(Debug, FromQueryResult)]
struct AverageRow {
    avg_rating: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct AnalyticsRepository {
    pub db: Arc<DatabaseConnection>,
}

impl AnalyticsRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Compute the authoritative aggregates for a provider.
    pub async fn compute(&self, provider_id: i32) -> Result<ProviderAnalyticsSummary, DbErr> {
        let db = &*self.db;

        let total_services = listing::Entity::find()
            .filter(listing::Column::ProviderId.eq(provider_id))
            .count(db)
            .await?;

        let total_bookings = booking::Entity::find()
            .join(JoinType::InnerJoin, booking::Relation::Listing.def())
            .filter(listing::Column::ProviderId.eq(provider_id))
            .count(db)
            .await?;

        let average = review::Entity::find()
            .select_only()
            .column_as(
                Expr::cust("CAST(AVG(reviews.rating) AS DOUBLE PRECISION)"),
                "avg_rating",
            )
            .join(JoinType::InnerJoin, review::Relation::Listing.def())
            .filter(listing::Column::ProviderId.eq(provider_id))
            .into_model::<AverageRow>()
            .one(db)
            .await?
            .and_then(|row| row.avg_rating)
            .map(round_rating);

        Ok(ProviderAnalyticsSummary {
            provider_id,
            total_services: total_services as i64,
            average_rating: average,
            total_bookings: total_bookings as i64,
        })
    }

    /// Store the rollup snapshot, replacing any previous one.
    pub async fn upsert_snapshot(&self, summary: &ProviderAnalyticsSummary) -> Result<(), DbErr> {
        let row = provider_analytics::ActiveModel {
            provider_id: Set(summary.provider_id),
            total_services: Set(summary.total_services),
            average_rating: Set(summary.average_rating),
            total_bookings: Set(summary.total_bookings),
            updated_at: Set(chrono::Utc::now().into()),
        };

        ProviderAnalytics::insert(row)
            .on_conflict(
                OnConflict::column(provider_analytics::Column::ProviderId)
                    .update_columns([
                        provider_analytics::Column::TotalServices,
                        provider_analytics::Column::AverageRating,
                        provider_analytics::Column::TotalBookings,
                        provider_analytics::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    pub async fn find_snapshot(
        &self,
        provider_id: i32,
    ) -> Result<Option<provider_analytics::Model>, DbErr> {
        ProviderAnalytics::find_by_id(provider_id)
            .one(&*self.db)
            .await
    }
}
