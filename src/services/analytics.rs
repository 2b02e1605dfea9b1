//! Provider analytics. Figures are computed on demand; the stored rollup is
//! refreshed as a side effect and is advisory only.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::error::ServiceError;
use crate::repositories::AnalyticsRepository;
use crate::repositories::analytics::ProviderAnalyticsSummary;

#[derive(Debug, Clone)]
pub struct AnalyticsService {
    analytics: AnalyticsRepository,
}

impl AnalyticsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            analytics: AnalyticsRepository::new(db),
        }
    }

    pub async fn summary(&self, provider_id: i32) -> Result<ProviderAnalyticsSummary, ServiceError> {
        let summary = self.analytics.compute(provider_id).await?;
        if let Err(err) = self.analytics.upsert_snapshot(&summary).await {
            tracing::warn!(provider_id, error = %err, "Failed to refresh analytics rollup");
        }
        Ok(summary)
    }
}
