use super::*;
use crate::error::OrmError;
use crate::value::Row;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;

// ── Hand-written fixtures (what `#[derive(Record)]` generates) ──

#[derive(Debug, Default, Clone)]
struct Account {
    id: Option<i64>,
    owner: Option<String>,
    balance: Decimal,
    tags: Properties,
    title: LocalizedString,
    subtitle: Option<LocalizedString>,
    opened: ServerTime<chrono::NaiveDateTime>,
}

impl Record for Account {
    fn descriptor() -> &'static RecordDescriptor {
        static DESCRIPTOR: RecordDescriptor = RecordDescriptor {
            type_name: "Account",
            table: "account",
            schema: None,
            identity: None,
            fields: &[
                FieldDescriptor {
                    name: "id",
                    column: "id",
                    field_type: <Option<i64> as FieldValue>::FIELD_TYPE,
                    not_null: false,
                },
                FieldDescriptor {
                    name: "owner",
                    column: "owner_name",
                    field_type: <Option<String> as FieldValue>::FIELD_TYPE,
                    not_null: true,
                },
                FieldDescriptor {
                    name: "balance",
                    column: "balance",
                    field_type: <Decimal as FieldValue>::FIELD_TYPE,
                    not_null: false,
                },
                FieldDescriptor {
                    name: "tags",
                    column: "tags",
                    field_type: <Properties as FieldValue>::FIELD_TYPE,
                    not_null: false,
                },
                FieldDescriptor {
                    name: "title",
                    column: "title",
                    field_type: <LocalizedString as FieldValue>::FIELD_TYPE,
                    not_null: false,
                },
                FieldDescriptor {
                    name: "subtitle",
                    column: "subtitle",
                    field_type: <Option<LocalizedString> as FieldValue>::FIELD_TYPE,
                    not_null: false,
                },
                FieldDescriptor {
                    name: "opened",
                    column: "opened_at",
                    field_type: <ServerTime<chrono::NaiveDateTime> as FieldValue>::FIELD_TYPE,
                    not_null: false,
                },
            ],
        };
        &DESCRIPTOR
    }

    fn field_value(&self, index: usize) -> Value {
        match index {
            0 => self.id.to_value(),
            1 => self.owner.to_value(),
            2 => self.balance.to_value(),
            3 => self.tags.to_value(),
            4 => self.title.to_value(),
            5 => self.subtitle.to_value(),
            6 => self.opened.to_value(),
            _ => Value::Null,
        }
    }

    fn set_field_value(&mut self, index: usize, value: Value) -> Result<(), ConversionError> {
        match index {
            0 => self.id.assign_value(value),
            1 => self.owner.assign_value(value),
            2 => self.balance.assign_value(value),
            3 => self.tags.assign_value(value),
            4 => self.title.assign_value(value),
            5 => self.subtitle.assign_value(value),
            6 => self.opened.assign_value(value),
            _ => Err(ConversionError::unknown_field(index)),
        }
    }
}

macro_rules! broken_record {
    ($name:ident, $identity:expr, [$(($field:literal, $column:literal, $ty:ty)),*]) => {
        #[derive(Default)]
        struct $name;

        impl Record for $name {
            fn descriptor() -> &'static RecordDescriptor {
                static DESCRIPTOR: RecordDescriptor = RecordDescriptor {
                    type_name: stringify!($name),
                    table: "broken",
                    schema: Some("CREATE TABLE broken (x INTEGER)"),
                    identity: $identity,
                    fields: &[$(FieldDescriptor {
                        name: $field,
                        column: $column,
                        field_type: <$ty as FieldValue>::FIELD_TYPE,
                        not_null: false,
                    }),*],
                };
                &DESCRIPTOR
            }

            fn field_value(&self, _index: usize) -> Value {
                Value::Null
            }

            fn set_field_value(&mut self, index: usize, _value: Value) -> Result<(), ConversionError> {
                Err(ConversionError::unknown_field(index))
            }
        }
    };
}

broken_record!(MissingIdentity, Some("key"), [("id", "id", i64)]);
broken_record!(SharedColumn, None, [("a", "col", i32), ("b", "COL", i32)]);
broken_record!(TextIdentity, Some("code"), [("code", "code", String)]);
broken_record!(NoIdentity, None, [("code", "code", String)]);

fn account() -> Account {
    Account {
        id: None,
        owner: Some("ann".into()),
        balance: Decimal::new(1050, 2),
        tags: [("tier", "gold")].into_iter().collect(),
        title: LocalizedString::new().with("en", "Savings"),
        subtitle: None,
        opened: ServerTime::Now,
    }
}

// ── ClassHandler ──

#[test]
fn handler_exposes_table_fields_and_identity() {
    let handler = ClassHandler::of::<Account>().unwrap();
    assert_eq!(handler.table_name(), "account");
    assert_eq!(handler.type_name(), "Account");
    assert_eq!(handler.fields().len(), 7);
    assert_eq!(handler.identity().map(|f| f.name()), Some("id"));

    let owner = handler.field("OWNER").unwrap();
    assert_eq!(owner.column(), "owner_name");
    assert_eq!(handler.field("Owner_Name"), Some(owner));
    assert!(handler.field("missing").is_none());

    assert_eq!(handler.field("balance").unwrap().sql_type(), SqlType::Decimal);
    assert_eq!(handler.field("tags").unwrap().sql_type(), SqlType::String);
    assert_eq!(handler.field("opened").unwrap().sql_type(), SqlType::DateTime);
}

#[test]
fn derived_schema_lists_every_column() {
    let handler = ClassHandler::of::<Account>().unwrap();
    assert_eq!(
        handler.create_schema(),
        "CREATE TABLE account (id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY, \
         owner_name TEXT NOT NULL, balance DECIMAL, tags TEXT, title TEXT, subtitle TEXT, \
         opened_at TIMESTAMP)"
    );
}

#[test]
fn handler_is_built_once_across_threads() {
    let handlers: Vec<Arc<ClassHandler>> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| ClassHandler::of::<Account>().unwrap()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });
    for handler in &handlers[1..] {
        assert!(Arc::ptr_eq(&handlers[0], handler));
    }
}

#[test]
fn misconfigured_records_are_mapping_errors() {
    let err = ClassHandler::of::<MissingIdentity>().unwrap_err();
    assert!(matches!(err, OrmError::Mapping(ref m) if m.contains("'key'")), "{err}");

    let err = ClassHandler::of::<SharedColumn>().unwrap_err();
    assert!(matches!(err, OrmError::Mapping(_)), "{err}");

    let err = ClassHandler::of::<TextIdentity>().unwrap_err();
    assert!(matches!(err, OrmError::Mapping(_)), "{err}");

    // Cached failures stay failures.
    assert!(ClassHandler::of::<MissingIdentity>().is_err());
}

#[test]
fn explicit_schema_and_missing_identity() {
    let handler = ClassHandler::of::<NoIdentity>().unwrap();
    assert_eq!(handler.create_schema(), "CREATE TABLE broken (x INTEGER)");
    assert!(handler.identity().is_none());
    assert!(matches!(
        handler.persisted_id(&NoIdentity),
        Err(OrmError::Mapping(_))
    ));
}

#[test]
fn handler_rejects_foreign_record_types() {
    let handler = ClassHandler::of::<Account>().unwrap();
    let err = handler.read_row(&mut NoIdentity, &Row::from_pairs([("id", 1)]));
    assert!(matches!(err, Err(OrmError::Mapping(_))));
}

#[test]
fn persisted_means_non_negative_identity() {
    let handler = ClassHandler::of::<Account>().unwrap();
    let mut record = account();
    assert_eq!(handler.persisted_id(&record).unwrap(), None);
    record.id = Some(UNSAVED_ID);
    assert!(!handler.is_persisted(&record).unwrap());
    handler.set_identity(&mut record, 42).unwrap();
    assert_eq!(record.id, Some(42));
    assert_eq!(handler.persisted_id(&record).unwrap(), Some(42));
}

// ── FieldHandler conversions ──

#[test]
fn bind_values_follow_field_types() {
    let handler = ClassHandler::of::<Account>().unwrap();
    let record = account();
    let bind = |name: &str| handler.field(name).unwrap().bind_value(&record).unwrap();

    assert_eq!(bind("id"), Value::Null);
    assert_eq!(bind("balance"), Value::Decimal(Decimal::new(1050, 2)));
    assert_eq!(bind("tags"), Value::Text("tier=gold".into()));
    assert_eq!(bind("title"), Value::Text("en=Savings".into()));
    assert_eq!(bind("opened"), Value::ServerNow);
}

#[test]
fn not_null_is_enforced_both_ways() {
    let handler = ClassHandler::of::<Account>().unwrap();
    let owner = handler.field("owner").unwrap();
    let mut record = Account::default();

    assert!(owner.bind_value(&record).unwrap_err().is_validation());
    let err = owner.read_column(&mut record, Value::Null).unwrap_err();
    assert!(matches!(err, OrmError::Decode { ref column, .. } if column == "owner_name"));
}

#[test]
fn read_row_overwrites_only_present_columns() {
    let handler = ClassHandler::of::<Account>().unwrap();
    let mut record = account();
    let row = Row::from_pairs([
        ("ID", Value::Int(9)),
        ("balance", Value::Text("12.75".into())),
        ("opened_at", Value::Text("2024-03-01 08:30:00".into())),
    ]);

    assert_eq!(handler.read_row(&mut record, &row).unwrap(), 3);
    assert_eq!(record.id, Some(9));
    assert_eq!(record.balance, Decimal::new(1275, 2));
    assert_eq!(record.owner.as_deref(), Some("ann"));
    let opened = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap();
    assert_eq!(record.opened, ServerTime::Literal(opened));
}

#[test]
fn localized_string_is_updated_in_place() {
    let handler = ClassHandler::of::<Account>().unwrap();
    let mut record = account();
    let held = record.title.clone();

    let row = Row::from_pairs([
        ("title", "en=Checking\nfr=Courant"),
        ("subtitle", "en=Daily"),
    ]);
    handler.read_row(&mut record, &row).unwrap();

    assert!(held.shares_storage_with(&record.title));
    assert_eq!(held.get("en").as_deref(), Some("Checking"));
    assert_eq!(held.get("fr").as_deref(), Some("Courant"));
    // An empty optional field gets a new instance.
    let subtitle = record.subtitle.clone().unwrap();
    assert_eq!(subtitle.get("en").as_deref(), Some("Daily"));

    // A held optional instance is reused as well.
    handler
        .read_row(&mut record, &Row::from_pairs([("subtitle", "en=Weekly")]))
        .unwrap();
    assert_eq!(subtitle.get("en").as_deref(), Some("Weekly"));
}

#[test]
fn conversion_failures_name_the_column() {
    let handler = ClassHandler::of::<Account>().unwrap();
    let mut record = account();
    let err = handler
        .field("balance")
        .unwrap()
        .read_column(&mut record, Value::Text("lots".into()))
        .unwrap_err();
    assert!(matches!(err, OrmError::Decode { ref column, .. } if column == "balance"));
}

// ── FieldType ──

#[test]
fn sql_type_mapping_is_closed() {
    assert_eq!(FieldType::Bool.sql_type(), SqlType::Boolean);
    assert_eq!(FieldType::Byte.sql_type(), SqlType::Byte);
    assert_eq!(FieldType::Long.sql_type(), SqlType::Integer);
    assert_eq!(FieldType::Double.sql_type(), SqlType::Float);
    assert_eq!(FieldType::Bytes.sql_type(), SqlType::Binary);
    assert_eq!(FieldType::Time.sql_type(), SqlType::DateTime);
    assert_eq!(FieldType::Enum.sql_type(), SqlType::Enum);
    assert_eq!(FieldType::Uuid.sql_type(), SqlType::String);
    assert_eq!(FieldType::Properties.sql_type(), SqlType::String);
}

#[test]
fn coerce_normalizes_driver_values() {
    assert_eq!(FieldType::Bool.coerce(Value::Int(1)).unwrap(), Value::Bool(true));
    assert_eq!(
        FieldType::Long.coerce(Value::Decimal(Decimal::new(70, 0))).unwrap(),
        Value::Int(70)
    );
    assert_eq!(
        FieldType::Enum.coerce(Value::Text("RED".into())).unwrap(),
        Value::Enum("RED".into())
    );
    assert_eq!(FieldType::Char.coerce(Value::Text("x".into())).unwrap(), Value::Char('x'));
    assert_eq!(FieldType::Int.coerce(Value::Null).unwrap(), Value::Null);
    assert!(FieldType::Int.coerce(Value::Float(1.5)).is_err());
    assert_eq!(FieldType::Long.coerce(Value::Float(-42.0)).unwrap(), Value::Int(-42));
    assert!(FieldType::Date.coerce(Value::ServerNow).is_err());
}

#[test]
fn integer_fields_check_range() {
    let err = i16::from_value(Value::Int(70_000)).unwrap_err();
    assert_eq!(err.to_string(), "cannot convert integer into i16: out of range");
    assert_eq!(u8::from_value(Value::Int(255)).unwrap(), 255);
}

#[test]
fn properties_round_trip_through_text() {
    let props: Properties = [("a=b", "1"), ("multi", "x\ny")].into_iter().collect();
    let restored = Properties::from_value(props.to_value()).unwrap();
    assert_eq!(restored, props);
    assert_eq!(restored.get("multi"), Some("x\ny"));
}

#[test]
fn server_time_maps_now_to_sentinel() {
    let now: ServerTime<i64> = ServerTime::Now;
    assert_eq!(now.to_value(), Value::ServerNow);
    assert_eq!(ServerTime::<i64>::from_value(Value::ServerNow).unwrap(), ServerTime::Now);
    assert_eq!(ServerTime::<i64>::from(5).to_value(), Value::Int(5));
    assert!(ServerTime::<i64>::default().is_now());
}

#[test]
fn float_integers_outside_i64_are_rejected() {
    assert!(FieldType::Long.coerce(Value::Float(1e19)).is_err());
    assert!(FieldType::Long.coerce(Value::Float(-1e19)).is_err());
    assert!(FieldType::Long.coerce(Value::Float(f64::INFINITY)).is_err());
    assert_eq!(
        FieldType::Long.coerce(Value::Float(9_007_199_254_740_992.0)).unwrap(),
        Value::Int(1 << 53)
    );
}
