use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::services::inventory::{CreateMedicineCommand, InventoryService, MedicineWithStock};
use crate::{ApiResponse, PaginatedResponse};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Trait for medicine handler state that provides access to the catalog
pub trait MedicineHandlerState: Clone + Send + Sync + 'static {
    fn inventory_service(&self) -> &InventoryService;
    fn config(&self) -> &AppConfig;
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MedicineResponse {
    pub medicine_id: i64,
    pub name: String,
    pub unit: String,
    pub min_stock_level: i32,
    pub active: bool,
    pub stock_on_hand: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MedicineWithStock> for MedicineResponse {
    fn from(item: MedicineWithStock) -> Self {
        Self {
            medicine_id: item.medicine.medicine_id,
            name: item.medicine.name,
            unit: item.medicine.unit,
            min_stock_level: item.medicine.min_stock_level,
            active: item.medicine.active,
            stock_on_hand: item.stock_on_hand,
            created_at: item.medicine.created_at,
            updated_at: item.medicine.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMedicineRequest {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub min_stock_level: i32,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct MedicineListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Create the medicine catalog router
pub fn medicines_router<S>() -> Router<S>
where
    S: MedicineHandlerState,
{
    Router::new()
        .route("/", get(list_medicines::<S>).post(create_medicine::<S>))
        .route("/:id", get(get_medicine::<S>))
}

/// List medicines with on-hand totals
#[utoipa::path(
    get,
    path = "/api/v1/medicines",
    params(MedicineListQuery),
    responses(
        (status = 200, description = "Medicine list returned",
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "medicines"
)]
pub async fn list_medicines<S>(
    State(state): State<S>,
    Query(query): Query<MedicineListQuery>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: MedicineHandlerState,
{
    let (page, per_page) = clamp_paging(state.config(), query.page, query.per_page);

    let (items, total) = state
        .inventory_service()
        .list_medicines(page, per_page)
        .await?;

    let items: Vec<MedicineResponse> = items.into_iter().map(Into::into).collect();
    let total_pages = total.div_ceil(per_page);

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit: per_page,
        total_pages,
    })))
}

/// Add a medicine to the catalog
#[utoipa::path(
    post,
    path = "/api/v1/medicines",
    request_body = CreateMedicineRequest,
    responses(
        (status = 201, description = "Medicine created", body = MedicineResponse,
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 409, description = "Medicine name already in use", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "medicines"
)]
pub async fn create_medicine<S>(
    State(state): State<S>,
    Json(payload): Json<CreateMedicineRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: MedicineHandlerState,
{
    let created = state
        .inventory_service()
        .create_medicine(CreateMedicineCommand {
            name: payload.name,
            unit: payload.unit,
            min_stock_level: payload.min_stock_level,
        })
        .await?;

    let response = MedicineResponse::from(MedicineWithStock {
        medicine: created,
        stock_on_hand: 0,
    });

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// Fetch one medicine with its on-hand total
#[utoipa::path(
    get,
    path = "/api/v1/medicines/{id}",
    params(("id" = i64, Path, description = "Medicine id")),
    responses(
        (status = 200, description = "Medicine returned", body = MedicineResponse,
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 404, description = "Medicine not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "medicines"
)]
pub async fn get_medicine<S>(
    State(state): State<S>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: MedicineHandlerState,
{
    let item = state.inventory_service().get_medicine(id).await?;
    Ok(Json(ApiResponse::success(MedicineResponse::from(item))))
}

/// Normalizes paging parameters against configured limits.
pub(crate) fn clamp_paging(
    config: &AppConfig,
    page: Option<u64>,
    per_page: Option<u64>,
) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page
        .unwrap_or(config.api_default_page_size)
        .clamp(1, config.api_max_page_size);
    (page, per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        )
    }

    #[test]
    fn paging_defaults_apply() {
        let cfg = test_config();
        assert_eq!(clamp_paging(&cfg, None, None), (1, 20));
    }

    #[test]
    fn paging_is_clamped_to_limits() {
        let cfg = test_config();
        assert_eq!(clamp_paging(&cfg, Some(0), Some(0)), (1, 1));
        assert_eq!(clamp_paging(&cfg, Some(3), Some(1000)), (3, 100));
    }
}
