//! End-to-end checks for derived records, run against the in-memory provider.

use chrono::{NaiveDate, NaiveDateTime};
use sqlrecord::mock::{MockProvider, MockReply};
use sqlrecord::{
    ClassHandler, Database, DatabaseConfig, FieldType, FieldValue, OrmError, Query, Record,
    RecordEnum, ServerTime, TransactionOptions, Value,
};

#[derive(RecordEnum, Debug, Clone, Copy, PartialEq, Default)]
enum Status {
    #[default]
    Active,
    #[record(rename = "on_hold")]
    OnHold,
}

#[derive(Record, Debug, Default, Clone, PartialEq)]
#[record(table = "people")]
struct Person {
    id: Option<i64>,
    #[record(not_null)]
    name: Option<String>,
    status: Status,
    #[record(column = "created_at")]
    created: ServerTime<NaiveDateTime>,
    #[record(skip)]
    cached_label: String,
}

#[derive(Record, Debug, Default)]
struct OrderLine {
    #[record(identity)]
    line_no: i64,
    sku: String,
    qty: i32,
}

#[derive(Record, Debug, Default)]
#[record(schema = "CREATE TABLE audit_log (note TEXT NOT NULL)")]
struct AuditLog {
    note: String,
}

fn created_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 14)
        .unwrap()
        .and_hms_opt(9, 26, 53)
        .unwrap()
}

fn database() -> (MockProvider, Database<MockProvider>) {
    let provider = MockProvider::new();
    let db = Database::new(provider.clone(), DatabaseConfig::default());
    (provider, db)
}

#[test]
fn derive_describes_the_table() {
    let descriptor = Person::descriptor();
    assert_eq!(descriptor.type_name, "Person");
    assert_eq!(descriptor.table, "people");
    let columns: Vec<&str> = descriptor.fields.iter().map(|f| f.column).collect();
    assert_eq!(columns, ["id", "name", "status", "created_at"]);
    assert!(descriptor.fields[1].not_null);
    assert_eq!(descriptor.fields[2].field_type, FieldType::Enum);

    let handler = ClassHandler::of::<Person>().unwrap();
    assert_eq!(handler.identity().map(|f| f.name()), Some("id"));
    assert!(handler.field("CREATED_AT").is_some());
    assert!(handler.field("cached_label").is_none());
}

#[test]
fn derive_defaults_and_overrides() {
    assert_eq!(OrderLine::descriptor().table, "order_line");
    assert_eq!(OrderLine::descriptor().identity, Some("line_no"));

    let audit = ClassHandler::of::<AuditLog>().unwrap();
    assert!(audit.identity().is_none());
    assert_eq!(audit.create_schema(), "CREATE TABLE audit_log (note TEXT NOT NULL)");
}

#[test]
fn enums_are_stored_by_name() {
    assert_eq!(Value::from(Status::OnHold), Value::Enum("on_hold".into()));
    assert_eq!(Status::Active.to_value(), Value::Enum("Active".into()));
    assert_eq!(
        Status::from_value(Value::Text("on_hold".into())).unwrap(),
        Status::OnHold
    );
    assert!(Status::from_value(Value::Text("Archived".into())).is_err());
    assert!(Status::from_value(Value::Int(1)).is_err());
}

#[tokio::test]
async fn store_round_trip() {
    let (provider, db) = database();
    provider
        .reply("INSERT INTO people", MockReply::Affected(1))
        .reply("SELECT lastval()", MockReply::rows(["lastval"], [[Value::Int(11)]]))
        .reply(
            "SELECT created_at FROM people WHERE id=11",
            MockReply::rows(["created_at"], [[Value::DateTime(created_at())]]),
        )
        .reply("UPDATE people", MockReply::Affected(1));

    let mut session = db.session();
    let mut person = Person {
        name: Some("Ann".into()),
        cached_label: "not persisted".into(),
        ..Default::default()
    };
    session.store(&mut person).await.unwrap();
    assert_eq!(person.id, Some(11));
    assert_eq!(person.created, ServerTime::Literal(created_at()));

    person.status = Status::OnHold;
    session.update_fields(&mut person, &["status"]).await.unwrap();

    assert_eq!(
        provider.sql_log(),
        [
            "INSERT INTO people (name,status,created_at) VALUES (?,'Active',now())",
            "SELECT lastval()",
            "SELECT created_at FROM people WHERE id=11",
            "UPDATE people SET status='on_hold' WHERE id=11",
        ]
    );
}

#[tokio::test]
async fn not_null_is_enforced_before_io() {
    let (provider, db) = database();
    let mut person = Person::default();
    let err = db.session().insert(&mut person).await.unwrap_err();
    assert!(err.is_validation(), "{err}");
    assert!(provider.statements().is_empty());
}

#[tokio::test]
async fn rows_map_to_records() {
    let (provider, db) = database();
    provider.reply(
        "SELECT * FROM people WHERE status=",
        MockReply::rows(
            ["ID", "name", "status", "created_at"],
            [
                vec![
                    Value::Int(1),
                    Value::Text("Ann".into()),
                    Value::Text("on_hold".into()),
                    Value::DateTime(created_at()),
                ],
                vec![
                    Value::Int(2),
                    Value::Text("Bo".into()),
                    Value::Text("Active".into()),
                    Value::DateTime(created_at()),
                ],
            ],
        ),
    );

    let mut q = db.select_for::<Person>().unwrap();
    q.where_equal("status", Status::OnHold);
    let people: Vec<Person> = db.session().query(&q).await.unwrap();

    assert_eq!(q.query_string(), "SELECT * FROM people WHERE status='on_hold'");
    assert_eq!(people.len(), 2);
    assert_eq!(people[0].status, Status::OnHold);
    assert_eq!(people[0].created, ServerTime::Literal(created_at()));
    assert_eq!(people[1].name.as_deref(), Some("Bo"));
    assert_eq!(people[1].cached_label, "");
}

#[tokio::test]
async fn records_without_identity_can_only_be_inserted() {
    let (provider, db) = database();
    provider.reply("INSERT INTO audit_log", MockReply::Affected(1));

    let mut session = db.session();
    let mut entry = AuditLog {
        note: "imported".into(),
    };
    session.insert(&mut entry).await.unwrap();
    assert!(matches!(session.update(&mut entry).await, Err(OrmError::Mapping(_))));
    assert!(matches!(session.store(&mut entry).await, Err(OrmError::Mapping(_))));

    assert_eq!(provider.sql_log(), ["INSERT INTO audit_log (note) VALUES (?)"]);
}

#[tokio::test]
async fn transaction_commits_derived_writes() {
    let (provider, db) = database();
    provider
        .reply("INSERT INTO order_line", MockReply::Affected(1))
        .reply("DELETE FROM order_line", MockReply::Affected(1));

    let mut session = db.session();
    let mut line = OrderLine {
        line_no: 3,
        sku: "A-1".into(),
        qty: 2,
    };
    session
        .transaction(TransactionOptions::default(), async |s| {
            s.insert(&mut line).await?;
            s.delete(&line).await
        })
        .await
        .unwrap();

    assert_eq!(
        provider.sql_log(),
        [
            "BEGIN ISOLATION LEVEL SERIALIZABLE",
            "INSERT INTO order_line (line_no,sku,qty) VALUES (3,?,2)",
            "DELETE FROM order_line WHERE line_no=3",
            "COMMIT",
        ]
    );
    assert_eq!(provider.acquired(), 1);
}
