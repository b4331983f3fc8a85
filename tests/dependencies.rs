mod support;

use std::fs;

use tasktracker::{DanglingReference, Error, NewTask};

use support::TestRoot;

#[test]
fn blocked_by_follows_add_and_remove() -> Result<(), Box<dyn std::error::Error>> {
    let root = TestRoot::init()?;
    let mut store = root.store()?;
    store.create_task(NewTask::new("Schema"))?;
    store.create_task(NewTask::new("Migration"))?;

    assert!(store.add_dependency(2, 1)?);
    assert_eq!(store.get_blocked_by(1)?, vec![2]);
    assert_eq!(store.get_dependencies(2)?, vec![1]);

    let on_disk = root.read_json("dependencies.json");
    assert_eq!(on_disk["dependencies"]["2"], serde_json::json!(["1"]));
    assert_eq!(on_disk["blockedBy"]["1"], serde_json::json!(["2"]));

    assert!(store.remove_dependency(2, 1)?);
    assert!(store.get_blocked_by(1)?.is_empty());
    assert!(store.get_dependencies(2)?.is_empty());

    let on_disk = root.read_json("dependencies.json");
    assert_eq!(on_disk["dependencies"], serde_json::json!({}));
    assert_eq!(on_disk["blockedBy"], serde_json::json!({}));
    Ok(())
}

#[test]
fn repeated_edges_do_not_write() -> Result<(), Box<dyn std::error::Error>> {
    let root = TestRoot::init()?;
    let mut store = root.store()?;
    assert!(store.add_dependency(3, 1)?);
    let before = root.read_bytes("dependencies.json");

    // Any write would now fail while staging its temp file.
    fs::create_dir(root.data_file("dependencies.json.tmp"))?;

    assert!(!store.add_dependency(3, 1)?);
    assert!(!store.remove_dependency(3, 2)?);
    assert_eq!(store.get_blocked_by(1)?, vec![3]);
    assert_eq!(root.read_bytes("dependencies.json"), before);
    Ok(())
}

#[test]
fn self_dependency_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let root = TestRoot::init()?;
    let mut store = root.store()?;
    let before = root.read_bytes("dependencies.json");

    for id in [1, 2, 42] {
        let err = store.add_dependency(id, id).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
    assert_eq!(root.read_bytes("dependencies.json"), before);
    Ok(())
}

#[test]
fn dangling_edges_are_reported_not_removed() -> Result<(), Box<dyn std::error::Error>> {
    let root = TestRoot::init()?;
    let mut store = root.store()?;
    store.create_task(NewTask::new("Keep"))?;
    store.create_task(NewTask::new("Archive me"))?;
    store.create_task(NewTask::new("Delete me"))?;

    store.add_dependency(1, 2)?;
    store.add_dependency(3, 1)?;
    store.archive_task(2, "shelved")?;
    store.delete_task(3)?;

    assert_eq!(
        store.dangling_dependencies()?,
        vec![DanglingReference {
            task_id: 3,
            depends_on_id: 1,
            missing: vec![3],
        }]
    );
    assert_eq!(store.get_blocked_by(1)?, vec![3]);
    Ok(())
}

#[test]
fn corrupt_graph_is_reset() -> Result<(), Box<dyn std::error::Error>> {
    let root = TestRoot::init()?;
    root.write_data_file("dependencies.json", "not json")?;

    let mut store = root.store()?;
    assert!(store.get_dependencies(1)?.is_empty());
    assert_eq!(
        root.data_files_with_prefix("dependencies.json.corrupt-").len(),
        1
    );
    assert!(store.add_dependency(2, 1)?);
    Ok(())
}

#[test]
fn string_id_lists_load_without_recovery() -> Result<(), Box<dyn std::error::Error>> {
    let root = TestRoot::init()?;
    root.write_data_file(
        "dependencies.json",
        r#"{ "dependencies": { "2": ["1"] }, "blockedBy": { "1": ["2"] } }"#,
    )?;

    let mut store = root.store()?;
    assert_eq!(store.get_blocked_by(1)?, vec![2]);
    assert_eq!(store.get_dependencies(2)?, vec![1]);
    assert!(store.take_warnings().is_empty());
    assert!(root
        .data_files_with_prefix("dependencies.json.corrupt-")
        .is_empty());
    Ok(())
}

#[test]
fn numeric_id_lists_are_rewritten_as_strings() -> Result<(), Box<dyn std::error::Error>> {
    let root = TestRoot::init()?;
    root.write_data_file(
        "dependencies.json",
        r#"{ "dependencies": { "2": [1] }, "blockedBy": { "1": [2] } }"#,
    )?;

    let mut store = root.store()?;
    assert!(store.add_dependency(3, 1)?);
    let on_disk = root.read_json("dependencies.json");
    assert_eq!(on_disk["dependencies"]["2"], serde_json::json!(["1"]));
    assert_eq!(on_disk["blockedBy"]["1"], serde_json::json!(["2", "3"]));
    assert!(store.take_warnings().is_empty());
    Ok(())
}
