use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{Engine, InvoiceDraft};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build().await.unwrap();
    (engine, db)
}

async fn engine_with_file_db() -> (Engine, DatabaseConnection, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("allocator_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build().await.unwrap();

    (engine, db, path)
}

fn sale_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
}

#[tokio::test]
async fn allocates_date_scoped_sequential_numbers() {
    let (engine, _db) = engine_with_db().await;

    let first = engine.allocate_invoice_number(sale_date()).await.unwrap();
    let second = engine.allocate_invoice_number(sale_date()).await.unwrap();

    assert_eq!(first, "202603150001");
    assert_eq!(second, "202603150002");
}

#[tokio::test]
async fn prefixes_are_independent() {
    let (engine, _db) = engine_with_db().await;

    let march = engine.allocate_invoice_number(sale_date()).await.unwrap();
    let april = engine
        .allocate_invoice_number(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap())
        .await
        .unwrap();

    assert_eq!(march, "202603150001");
    assert_eq!(april, "202604010001");
}

#[tokio::test]
async fn seeds_counter_from_existing_numbers() {
    let (engine, _db) = engine_with_db().await;
    let customer = engine.new_customer("Bar Centrale").await.unwrap();
    let truck = engine.new_truck("AB123CD", "Daily 1").await.unwrap();

    // An invoice numbered outside the counter, as the legacy path produced.
    let draft = InvoiceDraft::new(
        "202603150007",
        customer.id,
        truck.id,
        sale_date(),
        100.0,
        0.0,
        2.0,
        0.0,
    )
    .unwrap();
    engine.post_invoice(draft).await.unwrap();

    let next = engine.allocate_invoice_number(sale_date()).await.unwrap();
    assert_eq!(next, "202603150008");
}

#[tokio::test]
async fn collision_retries_with_disambiguating_suffix() {
    let (engine, db) = engine_with_db().await;
    let backend = db.get_database_backend();
    let customer = engine.new_customer("Bar Centrale").await.unwrap();
    let truck = engine.new_truck("AB123CD", "Daily 1").await.unwrap();

    let draft = InvoiceDraft::new(
        "202603150001",
        customer.id,
        truck.id,
        sale_date(),
        100.0,
        0.0,
        2.0,
        0.0,
    )
    .unwrap();
    engine.post_invoice(draft).await.unwrap();

    // A counter that lags behind the existing numbers forces the collision
    // path.
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO invoice_sequences (prefix, last_seq) VALUES (?, ?);",
        vec!["20260315".into(), 0i64.into()],
    ))
    .await
    .unwrap();

    let number = engine.allocate_invoice_number(sale_date()).await.unwrap();
    assert!(number.starts_with("202603150001-"));
}

#[tokio::test]
async fn falls_back_to_timestamp_identifier_on_read_failure() {
    let (engine, db) = engine_with_db().await;
    let backend = db.get_database_backend();

    db.execute(Statement::from_string(
        backend,
        "DROP TABLE invoice_sequences;".to_string(),
    ))
    .await
    .unwrap();
    db.execute(Statement::from_string(
        backend,
        "DROP TABLE invoices;".to_string(),
    ))
    .await
    .unwrap();

    let number = engine.allocate_invoice_number(sale_date()).await.unwrap();
    assert!(number.starts_with("INV-"));
    assert_eq!(number.len(), "INV-".len() + 14);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_allocations_are_unique() {
    let (engine, db, path) = engine_with_file_db().await;

    // Seed the counter so every task takes the increment path.
    engine.allocate_invoice_number(sale_date()).await.unwrap();

    let engine = Arc::new(engine);
    let mut handles = Vec::new();
    for _ in 0..20 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.allocate_invoice_number(sale_date()).await
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        numbers.insert(handle.await.unwrap().unwrap());
    }
    assert_eq!(numbers.len(), 20);

    drop(db);
    let _ = std::fs::remove_file(path);
}
