//! Provider profile repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set,
};
use std::sync::Arc;

use crate::models::provider::{self, Entity as Provider};

/// Business details for a new provider profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessInfo {
    pub business_name: String,
    pub description: String,
}

/// Repository for provider profile operations
#[derive(Debug, Clone)]
pub struct ProviderRepository {
    pub db: Arc<DatabaseConnection>,
}

impl ProviderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<provider::Model>, DbErr> {
        Provider::find_by_id(id).one(&*self.db).await
    }

    /// The provider profile owned by a user, if any
    pub async fn find_by_user_id(&self, user_id: &str) -> Result<Option<provider::Model>, DbErr> {
        Self::find_by_user_id_on(&*self.db, user_id).await
    }

    pub async fn find_by_user_id_on<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
    ) -> Result<Option<provider::Model>, DbErr> {
        Provider::find()
            .filter(provider::Column::UserId.eq(user_id))
            .one(conn)
            .await
    }

    /// Insert a provider profile on any connection, including an open transaction.
    pub async fn insert_on<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
        info: BusinessInfo,
    ) -> Result<provider::Model, DbErr> {
        provider::ActiveModel {
            user_id: Set(user_id.to_string()),
            business_name: Set(info.business_name),
            description: Set(info.description),
            approved: Set(false),
            ..Default::default()
        }
        .insert(conn)
        .await
    }

    /// Remove the provider profile of a user. Returns false when there was none.
    pub async fn delete_by_user_id_on<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
    ) -> Result<bool, DbErr> {
        let result = Provider::delete_many()
            .filter(provider::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
