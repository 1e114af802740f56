use chrono::{Duration, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{Engine, EngineError, InvoiceDraft, ReconciliationStatus, TruckLoadStatus};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build().await.unwrap();
    (engine, db)
}

fn recon_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, 2).unwrap()
}

#[tokio::test]
async fn create_reconciliation_computes_wastage() {
    let (engine, _db) = engine_with_db().await;
    let truck = engine.new_truck("AB123CD", "Daily 1").await.unwrap();

    let record = engine
        .create_reconciliation(truck.id, recon_date(), 1000.0, 950.0)
        .await
        .unwrap();

    assert_eq!(record.wastage_weight, 50.0);
    assert_eq!(record.wastage_percentage, 5.0);
    assert_eq!(record.status, ReconciliationStatus::Completed);
}

#[tokio::test]
async fn zero_load_yields_zero_percentage() {
    let (engine, _db) = engine_with_db().await;
    let truck = engine.new_truck("AB123CD", "Daily 1").await.unwrap();

    let record = engine
        .create_reconciliation(truck.id, recon_date(), 0.0, 0.0)
        .await
        .unwrap();

    assert_eq!(record.wastage_weight, 0.0);
    assert_eq!(record.wastage_percentage, 0.0);
}

#[tokio::test]
async fn duplicate_truck_day_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let truck = engine.new_truck("AB123CD", "Daily 1").await.unwrap();

    engine
        .create_reconciliation(truck.id, recon_date(), 1000.0, 950.0)
        .await
        .unwrap();

    let err = engine
        .create_reconciliation(truck.id, recon_date(), 800.0, 700.0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists(_)));

    // The first record is untouched.
    let records = engine
        .list_reconciliations_for_truck(truck.id, 10)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].load_weight, 1000.0);
    assert_eq!(records[0].wastage_weight, 50.0);
}

#[tokio::test]
async fn sold_above_load_is_rejected() {
    let (engine, _db) = engine_with_db().await;
    let truck = engine.new_truck("AB123CD", "Daily 1").await.unwrap();

    let err = engine
        .create_reconciliation(truck.id, recon_date(), 900.0, 950.0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
}

#[tokio::test]
async fn unknown_truck_is_rejected() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .create_reconciliation(uuid::Uuid::new_v4(), recon_date(), 1000.0, 950.0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn recalculate_repairs_manually_corrected_weights() {
    let (engine, db) = engine_with_db().await;
    let backend = db.get_database_backend();
    let truck = engine.new_truck("AB123CD", "Daily 1").await.unwrap();

    let record = engine
        .create_reconciliation(truck.id, recon_date(), 1000.0, 950.0)
        .await
        .unwrap();

    // Manual correction of the raw sold weight leaves the derived fields
    // stale.
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE daily_reconciliations SET sold_weight = ? WHERE id = ?;",
        vec![900.0f64.into(), record.id.to_string().into()],
    ))
    .await
    .unwrap();

    assert!(!engine
        .validate_reconciliation_integrity(record.id)
        .await
        .unwrap());

    let changed = engine.recalculate_reconciliation(record.id).await.unwrap();
    assert!(changed);

    let records = engine
        .list_reconciliations_for_truck(truck.id, 10)
        .await
        .unwrap();
    assert_eq!(records[0].wastage_weight, 100.0);
    assert_eq!(records[0].wastage_percentage, 10.0);

    assert!(engine
        .validate_reconciliation_integrity(record.id)
        .await
        .unwrap());

    let changed = engine.recalculate_reconciliation(record.id).await.unwrap();
    assert!(!changed);
}

#[tokio::test]
async fn investigation_appends_notes_and_steps_status() {
    let (engine, _db) = engine_with_db().await;
    let truck = engine.new_truck("AB123CD", "Daily 1").await.unwrap();

    let record = engine
        .create_reconciliation(truck.id, recon_date(), 1000.0, 700.0)
        .await
        .unwrap();

    // Resolving before flagging is invalid.
    let err = engine
        .resolve_investigation(record.id, "nothing to review")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));

    assert!(engine
        .flag_for_investigation(record.id, "wastage spike on route 4")
        .await
        .unwrap());

    let records = engine
        .list_reconciliations_for_truck(truck.id, 10)
        .await
        .unwrap();
    assert_eq!(records[0].status, ReconciliationStatus::UnderInvestigation);
    assert_eq!(
        records[0].notes.as_deref(),
        Some("wastage spike on route 4")
    );

    assert!(engine
        .resolve_investigation(record.id, "driver confirmed broken cages")
        .await
        .unwrap());

    let records = engine
        .list_reconciliations_for_truck(truck.id, 10)
        .await
        .unwrap();
    assert_eq!(records[0].status, ReconciliationStatus::Completed);
    assert_eq!(
        records[0].notes.as_deref(),
        Some("wastage spike on route 4\ndriver confirmed broken cages")
    );
}

#[tokio::test]
async fn reconcile_truck_day_sums_loads_and_sales() {
    let (engine, _db) = engine_with_db().await;
    let customer = engine.new_customer("Bar Centrale").await.unwrap();
    let truck = engine.new_truck("AB123CD", "Daily 1").await.unwrap();
    let date = recon_date();

    engine
        .new_truck_load(truck.id, date, 600.0, 24, None)
        .await
        .unwrap();
    engine
        .new_truck_load(truck.id, date, 400.0, 16, Some("second run"))
        .await
        .unwrap();

    // Two sales totalling 950 kg net.
    for (number, gross, tare) in [("202604020001", 550.0, 50.0), ("202604020002", 500.0, 50.0)] {
        let draft = InvoiceDraft::new(
            number,
            customer.id,
            truck.id,
            date,
            gross,
            tare,
            2.0,
            0.0,
        )
        .unwrap();
        engine.post_invoice(draft).await.unwrap();
    }

    let record = engine.reconcile_truck_day(truck.id, date).await.unwrap();
    assert_eq!(record.load_weight, 1000.0);
    assert_eq!(record.sold_weight, 950.0);
    assert_eq!(record.wastage_weight, 50.0);
    assert_eq!(record.wastage_percentage, 5.0);
}

#[tokio::test]
async fn truck_load_status_is_forward_only() {
    let (engine, _db) = engine_with_db().await;
    let truck = engine.new_truck("AB123CD", "Daily 1").await.unwrap();

    let load = engine
        .new_truck_load(truck.id, recon_date(), 600.0, 24, None)
        .await
        .unwrap();
    assert_eq!(load.status, TruckLoadStatus::Loaded);

    assert_eq!(
        engine.advance_truck_load(load.id).await.unwrap(),
        TruckLoadStatus::InTransit
    );
    assert_eq!(
        engine.advance_truck_load(load.id).await.unwrap(),
        TruckLoadStatus::Completed
    );

    let err = engine.advance_truck_load(load.id).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
}

#[tokio::test]
async fn anomaly_scan_flags_the_outlier() {
    let (engine, _db) = engine_with_db().await;
    let steady = engine.new_truck("AB123CD", "Daily 1").await.unwrap();
    let outlier = engine.new_truck("EF456GH", "Daily 2").await.unwrap();
    let today = Utc::now().date_naive();

    // Thirty days clustered at 3% wastage.
    for i in 0..30i64 {
        engine
            .create_reconciliation(steady.id, today - Duration::days(i), 1000.0, 970.0)
            .await
            .unwrap();
    }
    // One day at 25%.
    engine
        .create_reconciliation(outlier.id, today, 1000.0, 750.0)
        .await
        .unwrap();

    let anomalies = engine.find_wastage_anomalies(30, 2.0).await.unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].truck_id, outlier.id);
    assert_eq!(anomalies[0].wastage_percentage, 25.0);
}

#[tokio::test]
async fn anomaly_scan_needs_at_least_two_records() {
    let (engine, _db) = engine_with_db().await;
    let truck = engine.new_truck("AB123CD", "Daily 1").await.unwrap();
    let today = Utc::now().date_naive();

    engine
        .create_reconciliation(truck.id, today, 1000.0, 700.0)
        .await
        .unwrap();

    let anomalies = engine.find_wastage_anomalies(30, 2.0).await.unwrap();
    assert!(anomalies.is_empty());
}

#[tokio::test]
async fn consistent_patterns_require_three_occurrences() {
    let (engine, _db) = engine_with_db().await;
    let repeat = engine.new_truck("AB123CD", "Daily 1").await.unwrap();
    let oneoff = engine.new_truck("EF456GH", "Daily 2").await.unwrap();
    let today = Utc::now().date_naive();

    // Three days above 10% for the repeat offender.
    for i in 0..3i64 {
        engine
            .create_reconciliation(repeat.id, today - Duration::days(i), 1000.0, 850.0)
            .await
            .unwrap();
    }
    // Only two for the other truck.
    for i in 0..2i64 {
        engine
            .create_reconciliation(oneoff.id, today - Duration::days(i), 1000.0, 880.0)
            .await
            .unwrap();
    }

    let patterns = engine
        .find_consistent_variance_patterns(10.0, 7)
        .await
        .unwrap();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns.get(&repeat.id).map(Vec::len), Some(3));
}
