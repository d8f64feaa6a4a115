use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MediTrack Inventory API",
        version = "0.3.0",
        description = r#"
# MediTrack Inventory API

Medicine inventory service for municipal health centers: batch-level stock
tracking with first-expiry-first-out depletion, an append-only stock ledger,
and ledger-derived consumption reporting.

## Stock model

Every inbound receipt creates a batch; outbound issues deplete batches in
ascending expiry order and write one ledger entry per batch touched. The
ledger is the audit trail: batch quantities always reconcile to the sum of
their ledger deltas.

## Error Handling

The API uses consistent error response formats with appropriate HTTP status
codes:

```json
{
  "error": "Unprocessable Entity",
  "message": "requested 20 units but only 15 available",
  "request_id": "…",
  "timestamp": "2025-01-01T00:00:00Z"
}
```

## Pagination

List endpoints support `page` (default: 1) and `per_page` (default: 20,
max: 100) query parameters.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "medicines", description = "Medicine catalog endpoints"),
        (name = "stock", description = "Stock adjustment, batch, and ledger endpoints"),
        (name = "reports", description = "Consumption and stock-position reports")
    ),
    paths(
        // Catalog
        crate::handlers::medicines::list_medicines,
        crate::handlers::medicines::create_medicine,
        crate::handlers::medicines::get_medicine,

        // Stock
        crate::handlers::inventory::adjust_stock,
        crate::handlers::inventory::list_batches,
        crate::handlers::inventory::list_ledger,

        // Reports
        crate::handlers::reports::consumption_report,
        crate::handlers::reports::stock_position,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,

            // Catalog types
            crate::handlers::medicines::MedicineResponse,
            crate::handlers::medicines::CreateMedicineRequest,

            // Stock types
            crate::handlers::inventory::AdjustStockRequest,
            crate::handlers::inventory::StockAdjustmentResponse,
            crate::handlers::inventory::AdjustmentLineResponse,
            crate::handlers::inventory::BatchResponse,
            crate::handlers::inventory::LedgerEntryResponse,

            // Report types
            crate::handlers::reports::ConsumptionRowResponse,
            crate::handlers::reports::StockPositionRowResponse,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_covers_the_surface() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("MediTrack Inventory API"));
        assert!(json.contains("/api/v1/medicines/{id}/adjustments"));
        assert!(json.contains("/api/v1/reports/consumption"));
    }
}
