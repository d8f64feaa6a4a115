mod common;

use meditrack_api::services::inventory::stock_on_hand;

// Ignored by default: concurrent writers against shared-cache SQLite mostly
// serialize, so this is only meaningful against Postgres.
// Run with: cargo test -- --ignored concurrent_outbounds
#[tokio::test]
#[ignore]
async fn concurrent_outbounds_never_over_deplete() {
    let (db, service) = common::setup().await;
    let med = common::create_medicine(&service, "concurrent").await;

    common::inbound(&service, med.medicine_id, 10, "2026-01-01").await;

    // 20 concurrent single-unit issues against 10 units of stock
    let mut tasks = Vec::new();
    for _ in 0..20 {
        let service = service.clone();
        let medicine_id = med.medicine_id;
        tasks.push(tokio::spawn(async move {
            common_outbound(&service, medicine_id).await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.expect("task panicked") {
            successes += 1;
        }
    }

    let on_hand = stock_on_hand(db.as_ref(), med.medicine_id).await.unwrap();
    assert!(on_hand >= 0, "stock went negative: {}", on_hand);
    assert_eq!(on_hand, 10 - successes);
    assert!(successes <= 10);
}

async fn common_outbound(
    service: &meditrack_api::services::inventory::InventoryService,
    medicine_id: i64,
) -> bool {
    use meditrack_api::entities::stock_ledger_entry::Direction;
    use meditrack_api::services::inventory::AdjustStockCommand;

    service
        .adjust_stock(AdjustStockCommand {
            medicine_id,
            direction: Direction::Outbound,
            quantity: 1,
            reason: "dispensed".to_string(),
            acting_user_id: 1,
            expiry_date: None,
        })
        .await
        .is_ok()
}
