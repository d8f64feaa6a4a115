mod common;

use chrono::{Duration, Utc};
use meditrack_api::errors::ServiceError;
use meditrack_api::services::reports::ReportService;

#[tokio::test]
async fn report_figures_are_ledger_sums() {
    let (db, service) = common::setup().await;
    let reports = ReportService::new(db.clone());
    let med = common::create_medicine(&service, "report-sums").await;

    common::inbound(&service, med.medicine_id, 100, "2026-01-01").await;
    common::outbound(&service, med.medicine_id, 30).await.unwrap();
    common::outbound(&service, med.medicine_id, 10).await.unwrap();

    let today = Utc::now().date_naive();
    let yesterday = today - Duration::days(1);

    // Period covering the adjustments: no beginning balance yet
    let rows = reports.consumption_report(yesterday, today).await.unwrap();
    let row = rows
        .iter()
        .find(|r| r.medicine_id == med.medicine_id)
        .expect("medicine missing from report");
    assert_eq!(row.beginning, 0);
    assert_eq!(row.received, 100);
    assert_eq!(row.consumed, 40);
    assert_eq!(row.ending, 60);

    // Period after the adjustments: everything rolls into the beginning balance
    let tomorrow = today + Duration::days(1);
    let rows = reports.consumption_report(tomorrow, tomorrow).await.unwrap();
    let row = rows
        .iter()
        .find(|r| r.medicine_id == med.medicine_id)
        .expect("medicine missing from report");
    assert_eq!(row.beginning, 60);
    assert_eq!(row.received, 0);
    assert_eq!(row.consumed, 0);
    assert_eq!(row.ending, 60);
}

#[tokio::test]
async fn inverted_period_is_rejected() {
    let (db, _service) = common::setup().await;
    let reports = ReportService::new(db);

    let today = Utc::now().date_naive();
    let err = reports
        .consumption_report(today, today - Duration::days(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn stock_position_flags_low_stock_and_earliest_expiry() {
    let (db, service) = common::setup().await;
    let reports = ReportService::new(db);

    let med = service
        .create_medicine(meditrack_api::services::inventory::CreateMedicineCommand {
            name: common::unique_name("low-stock"),
            unit: "bottle".to_string(),
            min_stock_level: 25,
        })
        .await
        .unwrap();

    common::inbound(&service, med.medicine_id, 10, "2025-12-01").await;
    common::inbound(&service, med.medicine_id, 10, "2025-04-01").await;

    let rows = reports.stock_position().await.unwrap();
    let row = rows
        .iter()
        .find(|r| r.medicine_id == med.medicine_id)
        .expect("medicine missing from stock position");

    assert_eq!(row.stock_on_hand, 20);
    assert_eq!(row.min_stock_level, 25);
    assert!(row.low_stock);
    assert_eq!(row.earliest_expiry, Some("2025-04-01".parse().unwrap()));

    // Depleting the earlier batch moves the earliest expiry forward
    common::outbound(&service, med.medicine_id, 10).await.unwrap();
    let rows = reports.stock_position().await.unwrap();
    let row = rows
        .iter()
        .find(|r| r.medicine_id == med.medicine_id)
        .unwrap();
    assert_eq!(row.stock_on_hand, 10);
    assert_eq!(row.earliest_expiry, Some("2025-12-01".parse().unwrap()));
}
