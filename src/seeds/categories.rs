//! Category seeding
//!
//! Inserts the default service categories. Existing categories are left
//! alone, so the seed can run any number of times.

use anyhow::Result;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::repositories::CategoryRepository;

pub const DEFAULT_CATEGORIES: [&str; 10] = [
    "Personal Chef",
    "Package Delivery",
    "Electrician Services",
    "Home Cleaning",
    "Auto Mechanic",
    "Handyman Repairs",
    "Beauty Salon",
    "Tech Support",
    "Private Tutoring",
    "Plumbing Services",
];

/// Seeds the categories table, returning how many categories were created
pub async fn seed_categories(db: &DatabaseConnection) -> Result<usize> {
    let repo = CategoryRepository::new(Arc::new(db.clone()));
    let mut created = 0;

    for name in DEFAULT_CATEGORIES {
        if repo.find_by_name(name).await?.is_some() {
            log::info!("Category '{}' already exists, skipping", name);
            continue;
        }
        repo.create(name).await?;
        log::info!("Created category: {}", name);
        created += 1;
    }

    log::info!("Category seeding complete ({} created)", created);
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::{init_pool, run_migrations};

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let config = AppConfig {
            profile: "test".to_string(),
            database_url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        let db = init_pool(&config).await.unwrap();
        run_migrations(&db).await.unwrap();

        assert_eq!(seed_categories(&db).await.unwrap(), DEFAULT_CATEGORIES.len());
        assert_eq!(seed_categories(&db).await.unwrap(), 0);

        let all = CategoryRepository::new(Arc::new(db)).list_all().await.unwrap();
        assert_eq!(all.len(), DEFAULT_CATEGORIES.len());
    }
}
