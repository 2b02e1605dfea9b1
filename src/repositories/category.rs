//! Category repository

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;

use crate::models::category::{self, Entity as Category};

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pub db: Arc<DatabaseConnection>,
}

impl CategoryRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<category::Model>, DbErr> {
        Category::find_by_id(id).one(&*self.db).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<category::Model>, DbErr> {
        Category::find()
            .filter(category::Column::Name.eq(name))
            .one(&*self.db)
            .await
    }

    /// All categories ordered by name
    pub async fn list_all(&self) -> Result<Vec<category::Model>, DbErr> {
        Category::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await
    }

    pub async fn create(&self, name: &str) -> Result<category::Model, DbErr> {
        category::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
    }
}
