use chrono::Utc;
use folio_model::{Document, Query, Where};
use serde_json::json;

fn doc() -> Document {
    Document::new(
        1,
        json!({"title": "A", "author": {"id": "u1"}, "tags": ["x", "y"], "archived": null}),
        Utc::now(),
    )
}

#[test]
fn equals_on_nested_path() {
    let v = doc().to_json();
    assert!(Where::equals("author.id", "u1").matches(&v));
    assert!(!Where::equals("author.id", "u2").matches(&v));
    assert!(Where::equals("tags.1", "y").matches(&v));
}

#[test]
fn not_equals_and_in() {
    let v = doc().to_json();
    assert!(Where::NotEquals { path: "title".into(), value: json!("B") }.matches(&v));
    assert!(Where::In { path: "title".into(), values: vec![json!("A"), json!("C")] }.matches(&v));
    assert!(!Where::In { path: "missing".into(), values: vec![json!(null)] }.matches(&v));
}

#[test]
fn exists_treats_null_as_absent() {
    let v = doc().to_json();
    assert!(Where::Exists { path: "title".into(), exists: true }.matches(&v));
    assert!(Where::Exists { path: "archived".into(), exists: false }.matches(&v));
    assert!(Where::Exists { path: "nope".into(), exists: false }.matches(&v));
}

#[test]
fn and_flattens_and_or_short_circuits() {
    let combined = Where::equals("title", "A")
        .and(Where::equals("author.id", "u1"))
        .and(Where::equals("id", 1));
    match &combined {
        Where::And(clauses) => assert_eq!(clauses.len(), 3),
        other => panic!("expected And, got {other:?}"),
    }
    assert!(combined.matches(&doc().to_json()));

    let either = Where::Or(vec![Where::equals("title", "Z"), Where::equals("title", "A")]);
    assert!(either.matches(&doc().to_json()));
}

#[test]
fn query_matches_id_and_filter() {
    let d = doc();
    assert!(Query::by_id(1.into()).matches(&d));
    assert!(!Query::by_id(2.into()).matches(&d));
    assert!(!Query::by_id("1".into()).matches(&d));

    let filtered = Query::by_id(1.into()).with_filter(Some(Where::equals("author.id", "u2")));
    assert!(filtered.has_filter());
    assert!(!filtered.matches(&d));
}

#[test]
fn where_serde_shape() {
    let w = Where::equals("title", "A");
    let json = serde_json::to_value(&w).unwrap();
    assert_eq!(json, json!({"equals": {"path": "title", "value": "A"}}));
    let back: Where = serde_json::from_value(json).unwrap();
    assert_eq!(back, w);
}
