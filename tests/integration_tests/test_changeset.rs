// library-level tests for changesets and the queued changeset log

use metaquery::changeset::file::FileChangesetManager;
use metaquery::changeset::{parse_key_value, MetadataChangeset};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_builder_combine_and_apply() {
    let first = MetadataChangeset::builder()
        .put_field("camera.model", "x100")
        .put_tag("raw")
        .build();
    let (key, value) = parse_key_value("camera.iso=400").unwrap();
    let second = MetadataChangeset::builder()
        .put_field(key, value)
        .remove_field("stale")
        .remove_tag("old")
        .build();

    let combined = first.combine(&second);
    let existing = json!({"stale": {"x": 1}, "camera": {"model": "old"}});
    let updated = combined.apply_field_updates(existing.as_object().unwrap());

    assert_eq!(
        serde_json::Value::Object(updated),
        json!({"camera": {"model": "x100", "iso": 400}})
    );
    assert_eq!(
        combined.apply_tag_updates(&["old".to_string(), "keep".to_string()]),
        vec!["keep".to_string(), "raw".to_string()]
    );
}

#[test]
fn test_queued_updates_apply_to_matching_records() {
    let dir = TempDir::new().unwrap();
    let manager = FileChangesetManager::open(dir.path().join("nested/queue.jsonl")).unwrap();

    manager.put_tags("a.txt", ["new"]).unwrap();
    manager
        .put_fields("a.txt", [("owner", json!("ana"))])
        .unwrap();
    manager.set_description("b.txt", "second file").unwrap();

    let mut records = vec![
        json!({"relative_path": "a.txt", "metadata": {}, "tags": ["old"]}),
        json!({"relative_path": "b.txt"}),
        json!({"relative_path": "c.txt", "tags": []}),
    ];
    let applied = manager.apply_to_records(&mut records).unwrap();

    assert_eq!(applied, 2);
    assert_eq!(records[0]["tags"], json!(["old", "new"]));
    assert_eq!(records[0]["metadata"], json!({"owner": "ana"}));
    assert_eq!(records[1]["description"], "second file");
    assert_eq!(records[2], json!({"relative_path": "c.txt", "tags": []}));

    manager.clear().unwrap();
    assert!(manager.pending_updates().unwrap().is_empty());
}
