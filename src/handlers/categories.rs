//! Category listing

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::category;
use crate::repositories::CategoryRepository;
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryView {
    pub id: i32,
    pub name: String,
}

impl From<category::Model> for CategoryView {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoriesResponse {
    pub success: bool,
    pub categories: Vec<CategoryView>,
}

/// All categories ordered by name
#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "Categories", body = CategoriesResponse)
    ),
    tag = "services"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    let categories = CategoryRepository::new(state.db.clone()).list_all().await?;
    Ok(Json(CategoriesResponse {
        success: true,
        categories: categories.into_iter().map(CategoryView::from).collect(),
    }))
}
