use chrono::{TimeZone, Utc};
use folio_model::{Document, DocumentPatch, DocumentStatus};
use pretty_assertions::assert_eq;
use serde_json::json;

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn new_lifts_reserved_keys() {
    let doc = Document::new(
        1,
        json!({"id": 99, "title": "A", "_status": "published", "createdAt": "x"}),
        t0(),
    );
    assert_eq!(doc.id, folio_types::DocumentId::from(1));
    assert_eq!(doc.status, Some(DocumentStatus::Published));
    assert_eq!(doc.fields.len(), 1);
    assert_eq!(doc.get_str("/title"), Some("A"));
}

#[test]
fn new_with_non_object_data_has_no_fields() {
    let doc = Document::new("x", json!("scalar"), t0());
    assert!(doc.fields.is_empty());
}

#[test]
fn field_pointer_reaches_nested_values() {
    let doc = Document::new(1, json!({"meta": {"tags": ["a", "b"]}}), t0());
    assert_eq!(doc.field("/meta/tags/1"), Some(&json!("b")));
    assert_eq!(doc.field("/missing"), None);
}

// ── JSON view ────────────────────────────────────────────────────

#[test]
fn to_json_is_flattened() {
    let mut doc = Document::new(1, json!({"title": "A"}), t0());
    doc.status = Some(DocumentStatus::Draft);
    let v = doc.to_json();
    assert_eq!(v["id"], json!(1));
    assert_eq!(v["title"], json!("A"));
    assert_eq!(v["_status"], json!("draft"));
    assert_eq!(v["createdAt"], json!(t0().to_rfc3339()));
}

#[test]
fn localized_view_prefers_locale_then_fallback() {
    let mut doc = Document::new(1, json!({"title": "Base", "slug": "s"}), t0());
    doc.locales.insert("en".into(), json!({"title": "Hello", "body": "en body"}).as_object().unwrap().clone());
    doc.locales.insert("de".into(), json!({"title": "Hallo"}).as_object().unwrap().clone());

    let de = doc.to_localized_json(Some("de"), Some("en"));
    assert_eq!(de["title"], json!("Hallo"));
    assert_eq!(de["body"], json!("en body"));
    assert_eq!(de["slug"], json!("s"));

    let plain = doc.to_json();
    assert_eq!(plain["title"], json!("Base"));
}

// ── Patches ──────────────────────────────────────────────────────

#[test]
fn patch_from_data_drops_reserved_keys() {
    let patch = DocumentPatch::from_data(
        &json!({"id": 5, "title": "B", "_status": "published", "updatedAt": "now"}),
        &[],
        None,
    );
    assert_eq!(patch.status, Some(DocumentStatus::Published));
    assert_eq!(patch.fields.len(), 1);
    assert!(patch.localized.is_none());
}

#[test]
fn patch_splits_localized_fields_only_with_locale() {
    let data = json!({"title": "Hallo", "views": 3});

    let with_locale = DocumentPatch::from_data(&data, &["title"], Some("de"));
    assert_eq!(with_locale.fields.keys().collect::<Vec<_>>(), vec!["views"]);
    let (code, overlay) = with_locale.localized.unwrap();
    assert_eq!(code, "de");
    assert_eq!(overlay["title"], json!("Hallo"));

    let without = DocumentPatch::from_data(&data, &["title"], None);
    assert_eq!(without.fields.len(), 2);
    assert!(without.localized.is_none());
}

#[test]
fn apply_never_touches_canonical_fields_for_localized_changes() {
    let doc = Document::new(1, json!({"title": "Base"}), t0());
    let patch = DocumentPatch::from_data(&json!({"title": "Hallo"}), &["title"], Some("de"));
    let later = t0() + chrono::Duration::seconds(5);
    let patched = doc.patched(&patch, later);

    assert_eq!(patched.get_str("/title"), Some("Base"));
    assert_eq!(patched.locales["de"]["title"], json!("Hallo"));
    assert_eq!(patched.updated_at, later);
    assert_eq!(patched.created_at, t0());
}

#[test]
fn apply_is_shallow_merge() {
    let doc = Document::new(1, json!({"title": "A", "meta": {"a": 1, "b": 2}}), t0());
    let patch = DocumentPatch::from_data(&json!({"meta": {"a": 9}}), &[], None);
    let patched = doc.patched(&patch, t0());
    assert_eq!(patched.fields["meta"], json!({"a": 9}));
    assert_eq!(patched.fields["title"], json!("A"));
}

#[test]
fn empty_patch_is_empty() {
    assert!(DocumentPatch::from_data(&json!({"id": 1}), &[], None).is_empty());
    assert!(!DocumentPatch::from_data(&json!({"x": 1}), &[], None).is_empty());
}

#[test]
fn rebased_patch_carries_the_base_forward() {
    let live = Document::new(1, json!({"title": "Live", "body": "old"}), t0());
    let mut draft = Document::new(1, json!({"title": "Draft", "body": "draft body"}), t0());
    draft.status = Some(DocumentStatus::Draft);
    draft.locales.insert("de".into(), json!({"title": "Entwurf"}).as_object().cloned().unwrap());

    let patch = DocumentPatch::from_data(
        &json!({"title": "Titel", "_status": "published"}),
        &["title"],
        Some("de"),
    );
    let rebased = patch.rebased_on(&draft);
    let written = live.patched(&rebased, t0());

    assert_eq!(written.get_str("/title"), Some("Draft"));
    assert_eq!(written.get_str("/body"), Some("draft body"));
    assert_eq!(written.locales["de"]["title"], json!("Titel"));
    assert_eq!(written.status, Some(DocumentStatus::Published));
}
