use crate::errors::ServiceError;
use crate::services::reports::{ConsumptionRow, ReportService, StockPositionRow};
use crate::ApiResponse;
use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Trait for report handler state that provides access to the report service
pub trait ReportHandlerState: Clone + Send + Sync + 'static {
    fn report_service(&self) -> &ReportService;
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct ConsumptionQuery {
    /// Period start, inclusive (YYYY-MM-DD)
    pub from: NaiveDate,
    /// Period end, inclusive (YYYY-MM-DD)
    pub to: NaiveDate,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConsumptionRowResponse {
    pub medicine_id: i64,
    pub name: String,
    pub unit: String,
    pub beginning: i32,
    pub received: i32,
    pub consumed: i32,
    pub ending: i32,
}

impl From<ConsumptionRow> for ConsumptionRowResponse {
    fn from(row: ConsumptionRow) -> Self {
        Self {
            medicine_id: row.medicine_id,
            name: row.name,
            unit: row.unit,
            beginning: row.beginning,
            received: row.received,
            consumed: row.consumed,
            ending: row.ending,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockPositionRowResponse {
    pub medicine_id: i64,
    pub name: String,
    pub unit: String,
    pub stock_on_hand: i32,
    pub min_stock_level: i32,
    pub low_stock: bool,
    pub earliest_expiry: Option<NaiveDate>,
}

impl From<StockPositionRow> for StockPositionRowResponse {
    fn from(row: StockPositionRow) -> Self {
        Self {
            medicine_id: row.medicine_id,
            name: row.name,
            unit: row.unit,
            stock_on_hand: row.stock_on_hand,
            min_stock_level: row.min_stock_level,
            low_stock: row.low_stock,
            earliest_expiry: row.earliest_expiry,
        }
    }
}

/// Create the reports router
pub fn reports_router<S>() -> Router<S>
where
    S: ReportHandlerState,
{
    Router::new()
        .route("/consumption", get(consumption_report::<S>))
        .route("/stock-position", get(stock_position::<S>))
}

/// Period consumption report derived from ledger sums
#[utoipa::path(
    get,
    path = "/api/v1/reports/consumption",
    params(ConsumptionQuery),
    responses(
        (status = 200, description = "Consumption report returned",
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 400, description = "Invalid period", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn consumption_report<S>(
    State(state): State<S>,
    Query(query): Query<ConsumptionQuery>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: ReportHandlerState,
{
    let rows = state
        .report_service()
        .consumption_report(query.from, query.to)
        .await?;

    let rows: Vec<ConsumptionRowResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(rows)))
}

/// Current stock position per medicine
#[utoipa::path(
    get,
    path = "/api/v1/reports/stock-position",
    responses(
        (status = 200, description = "Stock position returned",
            headers(("X-Request-Id" = String, description = "Unique request id for tracing"))
        ),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn stock_position<S>(
    State(state): State<S>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: ReportHandlerState,
{
    let rows = state.report_service().stock_position().await?;
    let rows: Vec<StockPositionRowResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::success(rows)))
}
