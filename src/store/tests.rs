use super::{content_digest, FileStore, StoreError, StoreLimits, UploadOutcome};
use std::io::Cursor;

fn store_with(names: &[(&str, &str)]) -> FileStore {
    let mut store = FileStore::new();
    for (name, content) in names {
        store.create(name, content).unwrap();
    }
    store
}

#[test]
fn test_new_store_is_empty() {
    let store = FileStore::new();
    assert!(store.is_empty());
    assert_eq!(store.len(), 0);
    assert_eq!(store.total_size(), 0);
}

#[test]
fn test_create_appends_in_order() {
    let store = store_with(&[("b", "2"), ("a", ""), ("c", "333")]);
    assert_eq!(store.list(), vec!["b", "a", "c"]);
    assert_eq!(store.get("a"), Some(""));
    assert_eq!(store.total_size(), 4);
}

#[test]
fn test_create_rejects_duplicate() {
    let mut store = store_with(&[("demo", "x")]);
    let err = store.create("demo", "").unwrap_err();
    assert!(matches!(err, StoreError::DuplicateName(name) if name == "demo"));
    assert_eq!(store.get("demo"), Some("x"));
}

#[test]
fn test_create_rejects_empty_name() {
    let mut store = FileStore::new();
    assert!(matches!(
        store.create("", ""),
        Err(StoreError::InvalidName(_))
    ));
    assert!(store.is_empty());
}

#[test]
fn test_delete_confirmed() {
    let mut store = store_with(&[("a", ""), ("b", "")]);
    assert!(store.delete("a", |_| true));
    assert_eq!(store.list(), vec!["b"]);
}

#[test]
fn test_delete_declined_keeps_file() {
    let mut store = store_with(&[("a", "keep")]);
    assert!(!store.delete("a", |_| false));
    assert_eq!(store.get("a"), Some("keep"));
}

#[test]
fn test_delete_absent_does_not_ask() {
    let mut store = store_with(&[("a", "")]);
    let mut asked = false;
    assert!(!store.delete("missing", |_| {
        asked = true;
        true
    }));
    assert!(!asked);
    assert_eq!(store.len(), 1);
}

#[test]
fn test_move_rekeys_content() {
    let mut store = store_with(&[("a", "alpha"), ("b", "beta")]);
    store.move_file("a", "z").unwrap();
    assert_eq!(store.list(), vec!["b", "z"]);
    assert_eq!(store.get("z"), Some("alpha"));
    assert_eq!(store.entry("z").unwrap().name, "z");
    assert!(!store.contains("a"));
}

#[test]
fn test_move_overwrites_target_silently() {
    let mut store = store_with(&[("a", "alpha"), ("b", "beta")]);
    store.move_file("a", "b").unwrap();
    assert_eq!(store.list(), vec!["b"]);
    assert_eq!(store.get("b"), Some("alpha"));
}

#[test]
fn test_move_onto_itself_is_unchanged() {
    let mut store = store_with(&[("a", "alpha"), ("b", "beta")]);
    store.move_file("a", "a").unwrap();
    assert_eq!(store.list(), vec!["a", "b"]);
    assert_eq!(store.get("a"), Some("alpha"));
}

#[test]
fn test_move_missing_source() {
    let mut store = store_with(&[("b", "beta")]);
    let err = store.move_file("a", "b").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(name) if name == "a"));
    assert_eq!(store.get("b"), Some("beta"));
}

#[test]
fn test_upload_strips_last_extension() {
    let mut store = FileStore::new();
    let outcome = store.upload("a.b.ts", b"let x = 1", |_| true).unwrap();
    assert_eq!(outcome, UploadOutcome::Inserted);
    assert_eq!(store.get("a.b"), Some("let x = 1"));
}

#[test]
fn test_upload_without_extension_uses_default_name() {
    let mut store = FileStore::new().default_name("scratch");
    store.upload("README", b"text", |_| true).unwrap();
    store.upload(".ts", b"", |_| true).unwrap();
    assert_eq!(store.list(), vec!["scratch"]);
}

#[test]
fn test_upload_overwrite_requires_confirmation() {
    let mut store = store_with(&[("a", "old")]);
    let declined = store.upload("a.ts", b"new", |_| false).unwrap();
    assert_eq!(declined, UploadOutcome::Declined);
    assert_eq!(store.get("a"), Some("old"));

    let mut asked_for = String::new();
    let accepted = store
        .upload("a.ts", b"new", |key| {
            asked_for = key.to_string();
            true
        })
        .unwrap();
    assert_eq!(accepted, UploadOutcome::Overwritten);
    assert_eq!(asked_for, "a");
    assert_eq!(store.get("a"), Some("new"));
}

#[test]
fn test_upload_decodes_invalid_utf8_lossily() {
    let mut store = FileStore::new();
    store.upload("bin.ts", &[b'o', b'k', 0xff], |_| true).unwrap();
    assert_eq!(store.get("bin"), Some("ok\u{fffd}"));
}

#[test]
fn test_file_size_limit() {
    let limits = StoreLimits {
        max_file_size: 4,
        max_total_size: 6,
    };
    let mut store = FileStore::new().with_limits(limits);
    assert!(matches!(
        store.create("big", "12345"),
        Err(StoreError::FileTooLarge { size: 5, max: 4 })
    ));
    store.create("a", "1234").unwrap();
    assert!(matches!(
        store.create("b", "123"),
        Err(StoreError::FileTooLarge { size: 7, max: 6 })
    ));
    // replacing content only counts the difference
    assert_eq!(
        store.upload("a.ts", b"12", |_| true).unwrap(),
        UploadOutcome::Overwritten
    );
    store.create("b", "123").unwrap();
    assert_eq!(store.total_size(), 5);
}

#[test]
fn test_entry_digest() {
    let store = store_with(&[("a", "hello")]);
    let entry = store.entry("a").unwrap();
    assert_eq!(
        entry.digest(),
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
    assert_eq!(entry.digest(), content_digest("hello"));
}

#[test]
fn test_archive_round_trip() {
    let source = store_with(&[("first", "console.log(1)"), ("second", "")]);
    let bytes = source
        .export_archive(Cursor::new(Vec::new()), "ts")
        .unwrap()
        .into_inner();

    let mut target = FileStore::new();
    let outcomes = target.import_archive(Cursor::new(bytes), |_| true).unwrap();
    assert_eq!(
        outcomes,
        vec![
            ("first.ts".to_string(), UploadOutcome::Inserted),
            ("second.ts".to_string(), UploadOutcome::Inserted),
        ]
    );
    assert_eq!(target.list(), vec!["first", "second"]);
    assert_eq!(target.get("first"), Some("console.log(1)"));
}

#[test]
fn test_import_rejects_garbage() {
    let mut store = FileStore::new();
    let err = store
        .import_archive(Cursor::new(b"not a zip".to_vec()), |_| true)
        .unwrap_err();
    assert!(matches!(err, StoreError::Archive(_)));
}

#[test]
fn test_load_dir_skips_hidden_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.ts"), "b").unwrap();
    std::fs::write(dir.path().join("a.ts"), "a").unwrap();
    std::fs::write(dir.path().join(".hidden.ts"), "h").unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    std::fs::write(dir.path().join("nested").join("c.js"), "c").unwrap();

    let mut store = FileStore::new();
    store.load_dir(dir.path(), |_| true).unwrap();
    assert_eq!(store.list(), vec!["a", "b", "c"]);
}

fn tight_limits() -> StoreLimits {
    StoreLimits {
        max_file_size: 4,
        max_total_size: 100,
    }
}

#[test]
fn test_import_rejects_oversized_entry() {
    let source = store_with(&[("a", "ok"), ("big", "0123456789")]);
    let bytes = source
        .export_archive(Cursor::new(Vec::new()), "ts")
        .unwrap()
        .into_inner();

    let mut target = FileStore::new().with_limits(tight_limits());
    let err = target
        .import_archive(Cursor::new(bytes), |_| true)
        .unwrap_err();
    assert!(matches!(err, StoreError::FileTooLarge { size: 10, max: 4 }));
    assert!(target.is_empty());
}

#[test]
fn test_load_dir_rejects_oversized_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.ts"), "ok").unwrap();
    std::fs::write(dir.path().join("big.ts"), "0123456789").unwrap();

    let mut store = FileStore::new().with_limits(tight_limits());
    let err = store.load_dir(dir.path(), |_| true).unwrap_err();
    assert!(matches!(err, StoreError::FileTooLarge { size: 10, max: 4 }));
    assert!(store.is_empty());
}
