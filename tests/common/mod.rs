#![allow(dead_code)]

//! Shared setup for stock integration tests.

use meditrack_api::db::{create_db_pool, run_migrations, DbPool};
use meditrack_api::entities::medicine;
use meditrack_api::entities::stock_ledger_entry::Direction;
use meditrack_api::errors::ServiceError;
use meditrack_api::events::{process_events, EventSender};
use meditrack_api::services::inventory::{
    AdjustStockCommand, CreateMedicineCommand, InventoryService, StockAdjustment,
};
use std::{env, sync::Arc};
use tokio::sync::mpsc;
use uuid::Uuid;

pub async fn setup() -> (Arc<DbPool>, InventoryService) {
    env::set_var("APP__DATABASE_URL", "sqlite::memory:?cache=shared");

    let db_pool = Arc::new(create_db_pool().await.expect("Failed to create DB pool"));
    run_migrations(db_pool.as_ref())
        .await
        .expect("Failed to run migrations");

    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(process_events(rx));

    let service = InventoryService::new(db_pool.clone(), EventSender::new(tx));
    (db_pool, service)
}

/// Tests share one in-memory database, so catalog names must not collide.
pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

pub async fn create_medicine(service: &InventoryService, prefix: &str) -> medicine::Model {
    service
        .create_medicine(CreateMedicineCommand {
            name: unique_name(prefix),
            unit: "tablet".to_string(),
            min_stock_level: 0,
        })
        .await
        .expect("Failed to create medicine")
}

pub async fn inbound(
    service: &InventoryService,
    medicine_id: i64,
    quantity: i32,
    expiry: &str,
) -> StockAdjustment {
    service
        .adjust_stock(AdjustStockCommand {
            medicine_id,
            direction: Direction::Inbound,
            quantity,
            reason: "delivery".to_string(),
            acting_user_id: 1,
            expiry_date: Some(expiry.parse().expect("bad expiry date")),
        })
        .await
        .expect("Inbound adjustment failed")
}

pub async fn outbound(
    service: &InventoryService,
    medicine_id: i64,
    quantity: i32,
) -> Result<StockAdjustment, ServiceError> {
    service
        .adjust_stock(AdjustStockCommand {
            medicine_id,
            direction: Direction::Outbound,
            quantity,
            reason: "dispensed".to_string(),
            acting_user_id: 1,
            expiry_date: None,
        })
        .await
}
