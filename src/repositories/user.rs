//! User repository for database operations

use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryOrder, Set,
};
use std::sync::Arc;

use crate::models::user::{self, Entity as User, Role};

/// Fields for a new user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub role: Role,
}

/// Repository for user database operations
#[derive(Debug, Clone)]
pub struct UserRepository {
    pub db: Arc<DatabaseConnection>,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<user::Model>, DbErr> {
        User::find_by_id(id.to_string()).one(&*self.db).await
    }

    /// All users, newest first
    pub async fn list_all(&self) -> Result<Vec<user::Model>, DbErr> {
        User::find()
            .order_by_desc(user::Column::CreatedAt)
            .all(&*self.db)
            .await
    }

    /// Deletes a user; dependent rows go with it via cascading foreign keys.
    /// Returns false when no such user exists.
    pub async fn delete_by_id(&self, id: &str) -> Result<bool, DbErr> {
        let result = User::delete_by_id(id.to_string()).exec(&*self.db).await?;
        Ok(result.rows_affected > 0)
    }

    /// Insert a user on any connection, including an open transaction.
    pub async fn insert_on<C: ConnectionTrait>(conn: &C, new: NewUser) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            id: Set(new.id),
            email: Set(new.email),
            display_name: Set(new.display_name),
            phone: Set(new.phone),
            role: Set(new.role),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(conn)
        .await
    }

    /// Change the role of an existing user on the given connection.
    pub async fn set_role_on<C: ConnectionTrait>(
        conn: &C,
        existing: user::Model,
        role: Role,
    ) -> Result<user::Model, DbErr> {
        let mut active: user::ActiveModel = existing.into();
        active.role = Set(role);
        active.update(conn).await
    }
}
