//! Runs against a live PostgreSQL when `DATABASE_URL` is set; skipped otherwise.

use chrono::NaiveDateTime;
use sqlrecord::{
    Database, DatabaseConfig, PgProvider, Query, Record, ServerTime, StatsMonitor,
    TransactionOptions, Value,
};
use std::sync::Arc;

#[derive(Record, Debug, Default, Clone, PartialEq)]
#[record(table = "sqlrecord_it_person")]
struct Person {
    id: Option<i64>,
    #[record(not_null)]
    name: String,
    age: i32,
    created: ServerTime<NaiveDateTime>,
}

fn try_provider() -> Option<PgProvider> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;
    Some(PgProvider::new(&database_url).expect("DATABASE_URL is not a valid connection string"))
}

#[tokio::test]
async fn person_lifecycle() {
    let Some(provider) = try_provider() else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let stats = Arc::new(StatsMonitor::new());
    let db = Database::new(provider, DatabaseConfig::default()).with_monitor_arc(stats.clone());
    let mut session = db.session();

    session
        .batch_execute("DROP TABLE IF EXISTS sqlrecord_it_person")
        .await
        .unwrap();
    session.create_table::<Person>().await.unwrap();

    let mut ann = Person {
        name: "Ann".into(),
        age: 30,
        ..Default::default()
    };
    session.store(&mut ann).await.unwrap();
    let id = ann.id.expect("identity written back");
    assert!(!ann.created.is_now());

    ann.age = 31;
    session.store(&mut ann).await.unwrap();
    let loaded: Person = session.load(id).await.unwrap();
    assert_eq!(loaded, ann);

    let mut q = db.select_for::<Person>().unwrap();
    q.where_equal("name", "Ann").and_where_in("age", [30, 31]).unwrap();
    assert_eq!(session.count(&q).await.unwrap(), 1);

    let bumped = session
        .transaction_with_retry(TransactionOptions::default(), async |s| {
            s.execute_sql(
                "UPDATE sqlrecord_it_person SET age=age+? WHERE id=?",
                &[Value::Int(1), Value::Int(id)],
            )
            .await
        })
        .await
        .unwrap();
    assert_eq!(bumped, 1);

    session.refresh(&mut ann).await.unwrap();
    assert_eq!(ann.age, 32);

    session.delete(&ann).await.unwrap();
    assert!(session.load::<Person>(id).await.unwrap_err().is_not_found());

    session
        .batch_execute("DROP TABLE sqlrecord_it_person")
        .await
        .unwrap();
    assert_eq!(stats.stats().failed_queries, 0);
}
