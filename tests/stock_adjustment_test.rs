mod common;

use meditrack_api::entities::{
    medicine,
    medicine_batch::{self, Entity as MedicineBatch},
    stock_ledger_entry::{self, Direction, Entity as StockLedgerEntry},
};
use meditrack_api::errors::ServiceError;
use meditrack_api::services::inventory::{stock_on_hand, AdjustStockCommand};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};

#[tokio::test]
async fn inbound_creates_one_batch_and_one_positive_entry() {
    let (db, service) = common::setup().await;
    let med = common::create_medicine(&service, "amoxicillin").await;

    let adjustment = common::inbound(&service, med.medicine_id, 50, "2026-01-01").await;

    assert_eq!(adjustment.direction, Direction::Inbound);
    assert_eq!(adjustment.total, 50);
    assert_eq!(adjustment.lines.len(), 1);
    assert_eq!(adjustment.stock_on_hand, 50);

    let batches = MedicineBatch::find()
        .filter(medicine_batch::Column::MedicineId.eq(med.medicine_id))
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].quantity, 50);
    assert_eq!(batches[0].quantity_available, 50);
    assert_eq!(batches[0].expiry_date, "2026-01-01".parse().unwrap());

    let entries = StockLedgerEntry::find()
        .filter(stock_ledger_entry::Column::MedicineId.eq(med.medicine_id))
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].delta, 50);
    assert_eq!(entries[0].batch_id, batches[0].batch_id);
    assert_eq!(entries[0].reason, "delivery");
}

#[tokio::test]
async fn outbound_depletes_batches_in_expiry_order() {
    let (db, service) = common::setup().await;
    let med = common::create_medicine(&service, "paracetamol").await;

    let first = common::inbound(&service, med.medicine_id, 5, "2025-01-01").await;
    let second = common::inbound(&service, med.medicine_id, 10, "2025-06-01").await;
    let first_batch = first.lines[0].batch_id;
    let second_batch = second.lines[0].batch_id;

    let adjustment = common::outbound(&service, med.medicine_id, 8)
        .await
        .expect("outbound should succeed");

    assert_eq!(adjustment.lines.len(), 2);
    assert_eq!(adjustment.lines[0].batch_id, first_batch);
    assert_eq!(adjustment.lines[0].quantity, 5);
    assert_eq!(adjustment.lines[1].batch_id, second_batch);
    assert_eq!(adjustment.lines[1].quantity, 3);
    assert_eq!(adjustment.stock_on_hand, 7);

    let batches = MedicineBatch::find()
        .filter(medicine_batch::Column::MedicineId.eq(med.medicine_id))
        .order_by_asc(medicine_batch::Column::ExpiryDate)
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(batches[0].quantity_available, 0);
    assert_eq!(batches[1].quantity_available, 7);

    // One negative entry per batch touched
    let entries = StockLedgerEntry::find()
        .filter(stock_ledger_entry::Column::MedicineId.eq(med.medicine_id))
        .filter(stock_ledger_entry::Column::Delta.lt(0))
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    let deltas: Vec<i32> = entries.iter().map(|e| e.delta).collect();
    assert!(deltas.contains(&-5));
    assert!(deltas.contains(&-3));
}

#[tokio::test]
async fn insufficient_stock_rolls_back_and_replays_identically() {
    let (db, service) = common::setup().await;
    let med = common::create_medicine(&service, "ibuprofen").await;

    common::inbound(&service, med.medicine_id, 15, "2026-01-01").await;

    for _ in 0..2 {
        let err = common::outbound(&service, med.medicine_id, 20)
            .await
            .expect_err("outbound beyond stock must fail");
        assert!(matches!(err, ServiceError::InsufficientStock(_)));

        // Nothing committed: batch state and ledger unchanged
        let batches = MedicineBatch::find()
            .filter(medicine_batch::Column::MedicineId.eq(med.medicine_id))
            .all(db.as_ref())
            .await
            .unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].quantity_available, 15);

        let entries = StockLedgerEntry::find()
            .filter(stock_ledger_entry::Column::MedicineId.eq(med.medicine_id))
            .all(db.as_ref())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }
}

#[tokio::test]
async fn ledger_deltas_reconcile_to_batch_state() {
    let (db, service) = common::setup().await;
    let med = common::create_medicine(&service, "cetirizine").await;

    common::inbound(&service, med.medicine_id, 30, "2025-03-01").await;
    common::inbound(&service, med.medicine_id, 20, "2025-09-01").await;
    common::outbound(&service, med.medicine_id, 12).await.unwrap();
    common::outbound(&service, med.medicine_id, 25).await.unwrap();

    let batches = MedicineBatch::find()
        .filter(medicine_batch::Column::MedicineId.eq(med.medicine_id))
        .all(db.as_ref())
        .await
        .unwrap();

    for batch in &batches {
        let entries = StockLedgerEntry::find()
            .filter(stock_ledger_entry::Column::BatchId.eq(batch.batch_id))
            .all(db.as_ref())
            .await
            .unwrap();
        let delta_sum: i32 = entries.iter().map(|e| e.delta).sum();
        assert_eq!(
            delta_sum, batch.quantity_available,
            "batch {} does not reconcile",
            batch.batch_code
        );
        assert!(batch.quantity_available <= batch.quantity);
        assert!(batch.quantity_available >= 0);
    }

    // Conservation: on-hand equals total inbound minus total outbound
    let on_hand = stock_on_hand(db.as_ref(), med.medicine_id).await.unwrap();
    assert_eq!(on_hand, 30 + 20 - 12 - 25);
}

#[tokio::test]
async fn unknown_and_inactive_medicines_are_not_found() {
    let (db, service) = common::setup().await;

    let err = common::outbound(&service, 9_999_999, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let med = common::create_medicine(&service, "retired").await;
    let mut active: medicine::ActiveModel = med.clone().into();
    active.active = Set(false);
    active.update(db.as_ref()).await.unwrap();

    let err = common::outbound(&service, med.medicine_id, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn inbound_without_expiry_is_rejected() {
    let (_db, service) = common::setup().await;
    let med = common::create_medicine(&service, "no-expiry").await;

    let err = service
        .adjust_stock(AdjustStockCommand {
            medicine_id: med.medicine_id,
            direction: Direction::Inbound,
            quantity: 10,
            reason: "delivery".to_string(),
            acting_user_id: 1,
            expiry_date: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn ledger_listing_is_newest_first_and_filterable() {
    let (_db, service) = common::setup().await;
    let med = common::create_medicine(&service, "ledger-list").await;

    let first = common::inbound(&service, med.medicine_id, 10, "2025-05-01").await;
    common::outbound(&service, med.medicine_id, 4).await.unwrap();

    let (entries, total) = service
        .list_ledger(med.medicine_id, None, 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(entries.len(), 2);
    assert!(entries[0].created_at >= entries[1].created_at);

    let batch_id = first.lines[0].batch_id;
    let (entries, total) = service
        .list_ledger(med.medicine_id, Some(batch_id), 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert!(entries.iter().all(|e| e.batch_id == batch_id));
}

#[tokio::test]
async fn depleted_batches_are_hidden_by_default() {
    let (_db, service) = common::setup().await;
    let med = common::create_medicine(&service, "batch-list").await;

    common::inbound(&service, med.medicine_id, 5, "2025-01-01").await;
    common::inbound(&service, med.medicine_id, 10, "2025-06-01").await;
    common::outbound(&service, med.medicine_id, 5).await.unwrap();

    let visible = service.list_batches(med.medicine_id, false).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].quantity_available, 10);

    let all = service.list_batches(med.medicine_id, true).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].is_depleted());
}
