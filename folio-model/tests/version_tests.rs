use chrono::{Duration, TimeZone, Utc};
use folio_model::{EditLock, FileData, SizeData};
use folio_types::UserId;
use serde_json::json;
use std::collections::BTreeMap;

// ── EditLock ─────────────────────────────────────────────────────

#[test]
fn lock_expiry_is_strict() {
    let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let lock = EditLock::new("posts", 1.into(), Some(UserId::from(7)), t);
    let d = Duration::seconds(300);
    assert!(!lock.is_expired(t, d));
    assert!(!lock.is_expired(t + d, d));
    assert!(lock.is_expired(t + d + Duration::seconds(1), d));
}

#[test]
fn lock_holder_matching() {
    let lock = EditLock::new("posts", 1.into(), Some(UserId::from(7)), Utc::now());
    assert!(lock.is_held_by(Some(&UserId::from(7))));
    assert!(!lock.is_held_by(Some(&UserId::from(9))));
    assert!(!lock.is_held_by(None));

    let orphan = EditLock::new("posts", 1.into(), None, Utc::now());
    assert!(!orphan.is_held_by(None));
}

// ── FileData ─────────────────────────────────────────────────────

#[test]
fn file_data_paths_include_sizes() {
    let mut sizes = BTreeMap::new();
    sizes.insert(
        "thumb".to_string(),
        SizeData {
            filename: "a-64x64.png".into(),
            mime_type: "image/png".into(),
            filesize: 10,
            width: Some(64),
            height: Some(64),
        },
    );
    let file = FileData {
        filename: "a.png".into(),
        mime_type: "image/png".into(),
        filesize: 100,
        checksum: "00".into(),
        width: None,
        height: None,
        sizes,
    };
    assert_eq!(file.paths("media/"), vec!["media/a.png", "media/a-64x64.png"]);
    assert_eq!(file.paths(""), vec!["a.png", "a-64x64.png"]);
}

#[test]
fn file_data_camel_case_json() {
    let value = json!({"filename": "f.pdf", "mimeType": "application/pdf", "filesize": 3, "checksum": "ab"});
    let file = FileData::from_value(&value).unwrap();
    assert_eq!(file.mime_type, "application/pdf");
    assert!(file.sizes.is_empty());
    assert_eq!(file.to_value(), value);
    assert!(FileData::from_value(&json!("f.pdf")).is_none());
}
