use super::*;
use crate::dialect::Dialect;
use crate::text::placeholder_offsets;
use chrono::NaiveDate;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn assert_placeholders_match(q: &impl Query) {
    let sql = q.query_string();
    assert_eq!(
        placeholder_offsets(&sql).len(),
        q.query_parameters().len(),
        "placeholder mismatch in {sql}"
    );
}

// ── End-to-end scenario ──

#[test]
fn person_scenario_inlines_numbers_by_default() {
    let mut q = SelectQuery::new("person");
    q.alias("p").and_where_equal("age", 30);
    q.and_where_in("city", ["NYC", "LA"]).unwrap();

    assert_eq!(q.where_clause(), "p.age=30 AND p.city IN (?,?)");
    assert_eq!(q.query_parameters(), vec![text("NYC"), text("LA")]);
    assert_eq!(
        q.query_string(),
        "SELECT * FROM person AS p WHERE p.age=30 AND p.city IN (?,?)"
    );
}

#[test]
fn person_scenario_binds_everything_without_literal_inlining() {
    let mut q = SelectQuery::new("person");
    q.alias("p")
        .inline_literals(false)
        .and_where_equal("age", 30);
    q.and_where_in("city", ["NYC", "LA"]).unwrap();

    assert_eq!(q.where_clause(), "p.age=? AND p.city IN (?,?)");
    assert_eq!(
        q.query_parameters(),
        vec![Value::Int(30), text("NYC"), text("LA")]
    );
}

// ── AND injection ──

#[test]
fn and_where_on_empty_buffer_adds_no_and() {
    let mut q = SelectQuery::new("t");
    q.and_where("a=1");
    assert_eq!(q.where_clause(), "a=1");
}

#[test]
fn and_where_after_open_parenthesis_adds_no_and() {
    let mut q = SelectQuery::new("t");
    q.where_("(  ").and_where("a=1").where_(")");
    assert_eq!(q.where_clause(), "(  a=1)");
}

#[test]
fn and_where_after_condition_adds_and() {
    let mut q = SelectQuery::new("t");
    q.where_("a=1").and_where("b=2");
    assert_eq!(q.where_clause(), "a=1 AND b=2");

    let mut q = SelectQuery::new("t");
    q.separator("\n").where_("a=1").and_where("b=2");
    assert_eq!(q.where_clause(), "a=1\nAND b=2");
}

#[test]
fn plain_where_never_adds_and() {
    let mut q = SelectQuery::new("t");
    q.where_equal("a", 1).where_(" OR ").where_equal("b", 2);
    assert_eq!(q.where_clause(), "a=1 OR b=2");
}

// ── Value embedding ──

#[test]
fn null_becomes_is_null() {
    let mut q = SelectQuery::new("t");
    q.where_equal("a", Value::Null)
        .and_where_not_equal("b", None::<i32>)
        .and_where_is_null("c")
        .and_where_is_not_null("d");
    assert_eq!(
        q.where_clause(),
        "a IS NULL AND b IS NOT NULL AND c IS NULL AND d IS NOT NULL"
    );
    assert!(q.query_parameters().is_empty());
}

#[test]
fn simple_literals_are_inlined_and_strings_bound() {
    let mut q = SelectQuery::new("t");
    q.where_equal("flag", true)
        .and_where_equal("color", Value::Enum("RED".into()))
        .and_where_not_equal("price", 9.5)
        .and_where_equal("name", "O'Brien");
    assert_eq!(
        q.where_clause(),
        "flag=TRUE AND color='RED' AND price<>9.5 AND name=?"
    );
    assert_eq!(q.query_parameters(), vec![text("O'Brien")]);
}

#[test]
fn unparameterized_values_are_quoted() {
    let mut q = SelectQuery::new("t");
    q.parameterized(false)
        .where_equal("name", "O'Brien")
        .and_where_equal("born", day(1990, 5, 1))
        .and_where_equal("age", 40);
    assert_eq!(
        q.where_clause(),
        "name='O''Brien' AND born='1990-05-01' AND age=40"
    );
    assert!(q.query_parameters().is_empty());
}

#[test]
fn server_now_uses_the_dialect_expression() {
    let mut q = SelectQuery::new("t");
    q.dialect(Dialect::MySql).where_equal("seen", Value::ServerNow);
    assert_eq!(q.where_clause(), "seen=NOW()");
    assert!(q.query_parameters().is_empty());
}

#[test]
fn raw_text_fills_placeholders_in_order() {
    let mut q = SelectQuery::new("t");
    q.where_with("age>? AND name=?", [Value::from(18), text("ann")])
        .unwrap();
    assert_eq!(q.where_clause(), "age>18 AND name=?");
    assert_eq!(q.query_parameters(), vec![text("ann")]);
}

#[test]
fn raw_text_rejects_mismatched_parameters() {
    let mut q = SelectQuery::new("t");
    q.where_("a=1");
    let err = q.and_where_with("b=? AND c=?", ["x"]).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(q.where_clause(), "a=1");
}

#[test]
fn raw_text_ignores_quoted_question_marks() {
    let mut q = SelectQuery::new("t");
    q.where_with("note <> '?' AND id=?", ["x"]).unwrap();
    assert_eq!(q.where_clause(), "note <> '?' AND id=?");
    assert_eq!(q.query_parameters(), vec![text("x")]);

    let mut q = SelectQuery::new("t");
    q.parameterized(false)
        .where_with("note <> 'why?' AND name=? -- who?", ["ann"])
        .unwrap();
    assert_eq!(q.where_clause(), "note <> 'why?' AND name='ann' -- who?");
    assert!(q.query_parameters().is_empty());
}

#[test]
fn raw_set_binds_like_other_raw_text() {
    let mut q = UpdateQuery::new("account");
    q.set_raw("note=note||'?'||?", ["!"])
        .unwrap()
        .set_raw("balance=balance+?", [5])
        .unwrap()
        .where_equal("id", 1);
    assert_eq!(
        q.query_string(),
        "UPDATE account SET note=note||'?'||?,balance=balance+5 WHERE id=1"
    );
    assert_eq!(q.query_parameters(), vec![text("!")]);
    assert!(q.set_raw("a=?", Vec::<Value>::new()).unwrap_err().is_validation());
}

// ── Column qualification ──

#[test]
fn alias_prefixes_only_plain_columns() {
    let mut q = SelectQuery::new("person");
    q.alias("p")
        .where_equal("name", "bob")
        .and_where_equal("lower(name)", "bob")
        .and_where_is_null("q.deleted")
        .and_where_equal("first || last", "x");
    assert_eq!(
        q.where_clause(),
        "p.name=? AND lower(name)=? AND q.deleted IS NULL AND first || last=?"
    );
}

// ── IN lists ──

#[test]
fn single_element_in_degenerates_to_equal() {
    let mut a = SelectQuery::new("t");
    a.alias("x").and_where_in("id", [7]).unwrap();
    let mut b = SelectQuery::new("t");
    b.alias("x").and_where_equal("id", 7);
    assert_eq!(a.query_string(), b.query_string());
    assert_eq!(a.query_parameters(), b.query_parameters());

    let mut a = SelectQuery::new("t");
    a.where_not_in("name", vec!["ann".to_string()]).unwrap();
    let mut b = SelectQuery::new("t");
    b.where_not_equal("name", "ann");
    assert_eq!(a, b);
}

#[test]
fn empty_in_is_rejected_but_and_not_in_is_a_no_op() {
    let empty = Vec::<i64>::new;
    let mut q = SelectQuery::new("t");
    q.where_equal("a", 1);

    assert!(q.where_in("id", empty()).unwrap_err().is_validation());
    assert!(q.and_where_in("id", empty()).unwrap_err().is_validation());
    assert!(q.where_not_in("id", empty()).unwrap_err().is_validation());
    q.and_where_not_in("id", empty()).unwrap();

    assert_eq!(q.where_clause(), "a=1");
}

#[test]
fn multi_element_in_embeds_each_value() {
    let mut q = SelectQuery::new("t");
    q.where_in("id", [1_i32, 2, 3]).unwrap();
    q.and_where_not_in("code", ["a", "b"]).unwrap();
    assert_eq!(q.where_clause(), "id IN (1,2,3) AND code NOT IN (?,?)");
    assert_eq!(q.query_parameters(), vec![text("a"), text("b")]);
}

#[test]
fn subquery_parameters_follow_the_outer_ones() {
    let mut sub = SelectQuery::new("member");
    sub.columns("person_id").where_equal("club", "chess");

    let mut q = SelectQuery::new("person");
    q.where_equal("city", "Oslo")
        .and_where_in_query("id", &sub)
        .and_where_equal("name", "kim");
    assert_eq!(
        q.where_clause(),
        "city=? AND id IN (SELECT person_id FROM member WHERE club=?) AND name=?"
    );
    assert_eq!(
        q.query_parameters(),
        vec![text("Oslo"), text("chess"), text("kim")]
    );
}

// ── Dates ──

#[test]
fn between_dates_without_bounds_is_a_no_op() {
    let mut q = SelectQuery::new("t");
    q.where_("a=1")
        .and_where_between_dates::<NaiveDate>("created", None, None);
    assert_eq!(q.where_clause(), "a=1");
    assert!(q.query_parameters().is_empty());
}

#[test]
fn between_dates_covers_whole_days() {
    let start = day(2024, 1, 31).and_hms_opt(15, 30, 0).unwrap();
    let end = day(2024, 2, 29).and_hms_opt(23, 59, 59).unwrap();
    let mut q = SelectQuery::new("t");
    q.and_where_between_dates("created", Some(start), Some(end));
    assert_eq!(q.where_clause(), "created>=? AND created<?");
    assert_eq!(
        q.query_parameters(),
        vec![Value::Date(day(2024, 1, 31)), Value::Date(day(2024, 3, 1))]
    );
}

#[test]
fn between_dates_with_one_bound() {
    let mut q = SelectQuery::new("t");
    q.parameterized(false)
        .where_between_dates("created", None, Some(day(2023, 12, 31)));
    assert_eq!(q.where_clause(), "created<'2024-01-01'");

    let mut q = SelectQuery::new("t");
    q.where_between_dates("created", Some(day(2023, 12, 31)), None);
    assert_eq!(q.where_clause(), "created>=?");
}

// ── Search ──

#[test]
fn search_match_builds_one_group_per_word() {
    let tags = ForeignColumn::new("tag", "name", "tag_id", "id");
    let mut q = SelectQuery::new("article");
    q.alias("a")
        .where_search_match("rust  async", SearchMethod::AllWords, &["title", "body"], &[tags])
        .unwrap();

    let group = "(a.title LIKE ? OR a.body LIKE ? OR \
                 EXISTS (SELECT * FROM tag WHERE tag.id=a.tag_id AND tag.name LIKE ?))";
    assert_eq!(q.where_clause(), format!("({group} AND {group})"));

    let rust = text("%rust%");
    let asynk = text("%async%");
    assert_eq!(
        q.query_parameters(),
        vec![
            rust.clone(),
            rust.clone(),
            rust,
            asynk.clone(),
            asynk.clone(),
            asynk
        ]
    );
}

#[test]
fn search_match_single_word_any() {
    let mut q = SelectQuery::new("article");
    q.where_equal("published", true)
        .and_where_search_match("50%", SearchMethod::AnyWord, &["title"], &[])
        .unwrap();
    assert_eq!(q.where_clause(), "published=TRUE AND (title LIKE ?)");
    assert_eq!(q.query_parameters(), vec![text("%50\\%%")]);
}

#[test]
fn search_match_any_word_joins_with_or() {
    let mut q = SelectQuery::new("article");
    q.and_where_search_match("a b", SearchMethod::AnyWord, &["title"], &[])
        .unwrap();
    assert_eq!(q.where_clause(), "((title LIKE ?) OR (title LIKE ?))");
}

#[test]
fn search_match_validation() {
    let mut q = SelectQuery::new("article");
    assert!(q
        .where_search_match("   ", SearchMethod::AllWords, &["title"], &[])
        .unwrap_err()
        .is_validation());
    assert!(q
        .where_search_match("word", SearchMethod::AllWords, &[], &[])
        .unwrap_err()
        .is_validation());
    assert_eq!(q.where_clause(), "");
}

// ── Joins ──

#[test]
fn join_uses_query_alias_on_the_left() {
    let mut q = SelectQuery::new("orders");
    q.alias("o")
        .join(None, "customer_id", "customer", Some("c"), "id", JoinType::Left)
        .where_equal("c.country", "NO");
    assert_eq!(
        q.query_string(),
        "SELECT * FROM orders AS o LEFT JOIN customer AS c ON o.customer_id=c.id WHERE c.country=?"
    );
}

#[test]
fn join_without_aliases_uses_table_names() {
    let mut q = SelectQuery::new("orders");
    q.join(None, "customer_id", "customer", None, "id", JoinType::Inner)
        .join(Some("customer"), "region_id", "region", None, "id", JoinType::Full);
    assert_eq!(
        q.join_clause(),
        "JOIN customer ON orders.customer_id=customer.id \
         FULL JOIN region ON customer.region_id=region.id"
    );
}

// ── UPDATE / DELETE ──

#[test]
fn update_parameters_run_join_set_where() {
    let mut q = UpdateQuery::new("account");
    q.join_raw("JOIN owner ON owner.id=account.owner_id AND owner.region=?", ["eu"])
        .unwrap();
    q.set("note", "x").set_now("updated").where_equal("owner.name", "ann");
    assert_eq!(
        q.query_string(),
        "UPDATE account JOIN owner ON owner.id=account.owner_id AND owner.region=? \
         SET note=?,updated=now() WHERE owner.name=?"
    );
    assert_eq!(
        q.query_parameters(),
        vec![text("eu"), text("x"), text("ann")]
    );
    q.validate().unwrap();
}

#[test]
fn update_without_set_is_invalid() {
    let mut q = UpdateQuery::new("account");
    q.where_equal("id", 1);
    assert!(q.validate().unwrap_err().is_validation());
}

#[test]
fn delete_requires_a_filter() {
    let mut q = DeleteQuery::new("session");
    assert!(q.validate().unwrap_err().is_validation());
    q.allow_unfiltered(true);
    q.validate().unwrap();
    assert_eq!(q.query_string(), "DELETE FROM session");

    let mut q = DeleteQuery::new("session");
    q.where_equal("user_id", 5);
    q.validate().unwrap();
    assert_eq!(q.query_string(), "DELETE FROM session WHERE user_id=5");
}

#[test]
fn missing_table_is_invalid() {
    assert!(SelectQuery::new("  ").validate().unwrap_err().is_validation());
}

// ── Reads are pure ──

#[test]
fn select_extras_and_count() {
    let mut q = SelectQuery::new("person");
    q.columns("id, name")
        .where_equal("city", "Oslo")
        .order_by("name")
        .limit(10)
        .offset(20);
    assert_eq!(
        q.query_string(),
        "SELECT id, name FROM person WHERE city=? ORDER BY name LIMIT 10 OFFSET 20"
    );
    assert_eq!(q.count_string(), "SELECT COUNT(*) FROM person WHERE city=?");
    assert_eq!(q.query_string(), q.query_string());
    assert_eq!(q.query_parameters(), q.query_parameters());
}

#[test]
fn placeholders_always_match_parameters() {
    let mut sub = SelectQuery::new("member");
    sub.columns("person_id").where_in("club", ["chess", "go"]).unwrap();

    let mut q = SelectQuery::new("person");
    q.alias("p")
        .join_raw("JOIN city c ON c.id=p.city_id AND c.name<>?", ["Nowhere"])
        .unwrap()
        .where_equal("name", "a")
        .and_where_in_query("id", &sub)
        .and_where_between_dates("born", Some(day(1980, 1, 1)), Some(day(1990, 1, 1)))
        .and_where_search_match("x y z", SearchMethod::AnyWord, &["bio"], &[])
        .unwrap()
        .and_where_with("score>? OR nick=?", [Value::from(3), text("z")])
        .unwrap();
    assert_placeholders_match(&q);

    let mut u = UpdateQuery::new("person");
    u.set("name", "b").set("age", 4).where_in("id", [1, 2]).unwrap();
    assert_placeholders_match(&u);

    let mut d = DeleteQuery::new("person");
    d.parameterized(false).where_in("name", ["a", "b"]).unwrap();
    assert_placeholders_match(&d);
    assert_eq!(d.query_string(), "DELETE FROM person WHERE name IN ('a','b')");
}
