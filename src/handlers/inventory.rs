use crate::config::AppConfig;
use crate::entities::medicine_batch;
use crate::entities::stock_ledger_entry::{self, Direction};
use crate::errors::ServiceError;
use crate::services::inventory::{AdjustStockCommand, InventoryService, StockAdjustment};
use crate::{ApiResponse, PaginatedResponse};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Trait for inventory handler state that provides access to inventory service
pub trait InventoryHandlerState: Clone + Send + Sync + 'static {
    fn inventory_service(&self) -> &InventoryService;
    fn config(&self) -> &AppConfig;
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    /// "inbound" or "outbound"
    pub direction: String,
    pub quantity: i32,
    pub reason: String,
    pub acting_user_id: i64,
    /// Required for inbound adjustments
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdjustmentLineResponse {
    pub batch_id: i64,
    pub batch_code: String,
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockAdjustmentResponse {
    pub medicine_id: i64,
    pub direction: String,
    pub total: i32,
    pub lines: Vec<AdjustmentLineResponse>,
    pub stock_on_hand: i32,
}

impl From<StockAdjustment> for StockAdjustmentResponse {
    fn from(adjustment: StockAdjustment) -> Self {
        Self {
            medicine_id: adjustment.medicine_id,
            direction: adjustment.direction.as_str().to_string(),
            total: adjustment.total,
            lines: adjustment
                .lines
                .into_iter()
                .map(|line| AdjustmentLineResponse {
                    batch_id: line.batch_id,
                    batch_code: line.batch_code,
                    quantity: line.quantity,
                })
                .collect(),
            stock_on_hand: adjustment.stock_on_hand,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchResponse {
    pub batch_id: i64,
    pub medicine_id: i64,
    pub batch_code: String,
    pub quantity: i32,
    pub quantity_available: i32,
    pub expiry_date: NaiveDate,
    pub depleted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<medicine_batch::Model> for BatchResponse {
    fn from(batch: medicine_batch::Model) -> Self {
        Self {
            depleted: batch.is_depleted(),
            batch_id: batch.batch_id,
            medicine_id: batch.medicine_id,
            batch_code: batch.batch_code,
            quantity: batch.quantity,
            quantity_available: batch.quantity_available,
            expiry_date: batch.expiry_date,
            created_at: batch.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerEntryResponse {
    pub entry_id: Uuid,
    pub medicine_id: i64,
    pub batch_id: i64,
    pub delta: i32,
    pub direction: String,
    pub reason: String,
    pub acting_user_id: i64,
    pub created_at: DateTime<Utc>,
}

impl From<stock_ledger_entry::Model> for LedgerEntryResponse {
    fn from(entry: stock_ledger_entry::Model) -> Self {
        Self {
            direction: entry.direction().as_str().to_string(),
            entry_id: entry.entry_id,
            medicine_id: entry.medicine_id,
            batch_id: entry.batch_id,
            delta: entry.delta,
            reason: entry.reason,
            acting_user_id: entry.acting_user_id,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct BatchListQuery {
    pub include_depleted: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct LedgerListQuery {
    pub batch_id: Option<i64>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Create the stock router, nested under the medicine catalog
pub fn stock_router<S>() -> Router<S>
where
    S: InventoryHandlerState,
{
    Router::new()
        .route("/:id/adjustments", post(adjust_stock::<S>))
        .route("/:id/batches", get(list_batches::<S>))
        .route("/:id/ledger", get(list_ledger::<S>))
}

/// Apply an inbound or outbound stock adjustment
#[utoipa::path(
    post,
    path = "/api/v1/medicines/{id}/adjustments",
    params(("id" = i64, Path, description = "Medicine id")),
    request_body = AdjustStockRequest,
    responses(
        (status = 201, description = "Adjustment committed", body = StockAdjustmentResponse,
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Medicine not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent adjustment conflict", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn adjust_stock<S>(
    State(state): State<S>,
    Path(id): Path<i64>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    let direction = Direction::from_str(&payload.direction).ok_or_else(|| {
        ServiceError::ValidationError(format!(
            "direction must be 'inbound' or 'outbound', got '{}'",
            payload.direction
        ))
    })?;

    let adjustment = state
        .inventory_service()
        .adjust_stock(AdjustStockCommand {
            medicine_id: id,
            direction,
            quantity: payload.quantity,
            reason: payload.reason,
            acting_user_id: payload.acting_user_id,
            expiry_date: payload.expiry_date,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(StockAdjustmentResponse::from(
            adjustment,
        ))),
    ))
}

/// List a medicine's batches in depletion order
#[utoipa::path(
    get,
    path = "/api/v1/medicines/{id}/batches",
    params(("id" = i64, Path, description = "Medicine id"), BatchListQuery),
    responses(
        (status = 200, description = "Batch list returned",
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 404, description = "Medicine not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn list_batches<S>(
    State(state): State<S>,
    Path(id): Path<i64>,
    Query(query): Query<BatchListQuery>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    let batches = state
        .inventory_service()
        .list_batches(id, query.include_depleted.unwrap_or(false))
        .await?;

    let batches: Vec<BatchResponse> = batches.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(batches)))
}

/// List a medicine's ledger entries, newest first
#[utoipa::path(
    get,
    path = "/api/v1/medicines/{id}/ledger",
    params(("id" = i64, Path, description = "Medicine id"), LedgerListQuery),
    responses(
        (status = 200, description = "Ledger page returned",
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 404, description = "Medicine not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn list_ledger<S>(
    State(state): State<S>,
    Path(id): Path<i64>,
    Query(query): Query<LedgerListQuery>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: InventoryHandlerState,
{
    let (page, per_page) =
        super::medicines::clamp_paging(state.config(), query.page, query.per_page);

    let (entries, total) = state
        .inventory_service()
        .list_ledger(id, query.batch_id, page, per_page)
        .await?;

    let items: Vec<LedgerEntryResponse> = entries.into_iter().map(Into::into).collect();
    let total_pages = total.div_ceil(per_page);

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit: per_page,
        total_pages,
    })))
}
