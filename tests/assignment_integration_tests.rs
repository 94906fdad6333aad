//! Integration tests for the AssignmentEngine
//!
//! These tests verify:
//! - Bulk assignment over a mixed collection (ignored, missing, present)
//! - Idempotence of repeated runs
//! - Key migration, including the no-op cases
//! - Per-document failures never stopping a bulk run
//! - The store contract (how often each collaborator is called)

use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::eq;
use serde_yaml_ng::Value;
use std::sync::Arc;
use vaultid::store::MetadataMutator;
use vaultid::{
    AssignOutcome, AssignmentEngine, Document, DocumentStore, MemoryStore, Metadata, Settings,
    StoreError,
};

mock! {
    pub Store {}

    #[async_trait]
    impl DocumentStore for Store {
        async fn list_documents(&self) -> Result<Vec<Document>, StoreError>;
        async fn read_metadata(&self, doc: &Document) -> Result<Option<Metadata>, StoreError>;
        async fn process_metadata(
            &self,
            doc: &Document,
            mutator: MetadataMutator,
        ) -> Result<(), StoreError>;
    }
}

fn metadata(yaml: &str) -> Metadata {
    serde_yaml_ng::from_str(yaml).unwrap()
}

fn settings(id_key: &str, ignore: &str) -> Settings {
    Settings {
        id_key: id_key.to_string(),
        ignore_file_regex: ignore.to_string(),
        ..Settings::default()
    }
}

fn string_value(metadata: &Metadata, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn sample_vault() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new()
            .with_document("a.md", Some(Metadata::new()))
            .with_document("templates/b.md", Some(Metadata::new()))
            .with_document("c.md", Some(metadata("id: existing\n"))),
    )
}

#[tokio::test]
async fn test_assign_all_end_to_end() {
    let store = sample_vault();
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let report = engine
        .assign_all(&settings("id", "^templates/"))
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.assigned, 1);
    assert_eq!(report.excluded, 1);
    assert_eq!(report.already_present, 1);
    assert!(report.failures.is_empty());
    assert!(report.invalid_pattern.is_none());

    let a = store.metadata("a.md").unwrap().unwrap();
    let a_id = string_value(&a, "id").expect("a.md should have an ID");
    assert!(!a_id.is_empty());

    let b = store.metadata("templates/b.md").unwrap().unwrap();
    assert!(b.get("id").is_none(), "ignored note must not get an ID");

    let c = store.metadata("c.md").unwrap().unwrap();
    assert_eq!(string_value(&c, "id").as_deref(), Some("existing"));
}

#[tokio::test]
async fn test_assign_all_is_idempotent() {
    let store = sample_vault();
    let engine = AssignmentEngine::new(Arc::clone(&store));
    let settings = settings("id", "^templates/");

    engine.assign_all(&settings).await.unwrap();
    let first = store.metadata("a.md").unwrap().unwrap();
    let writes_after_first = store.write_count();

    let report = engine.assign_all(&settings).await.unwrap();
    let second = store.metadata("a.md").unwrap().unwrap();

    assert_eq!(report.assigned, 0);
    assert_eq!(report.already_present, 2);
    assert_eq!(first, second);
    assert_eq!(store.write_count(), writes_after_first);
}

#[tokio::test]
async fn test_every_note_gets_a_distinct_identifier() {
    let store = Arc::new(MemoryStore::new());
    for i in 0..200 {
        store.insert(format!("notes/{i}.md"), None);
    }
    let engine = AssignmentEngine::new(Arc::clone(&store)).with_concurrency(8);

    let report = engine.assign_all(&Settings::default()).await.unwrap();
    assert_eq!(report.assigned, 200);

    let mut ids: Vec<String> = (0..200)
        .map(|i| {
            let m = store.metadata(&format!("notes/{i}.md")).unwrap().unwrap();
            string_value(&m, "id").unwrap()
        })
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 200);
}

#[tokio::test]
async fn test_falsy_values_are_regenerated() {
    let store = Arc::new(
        MemoryStore::new()
            .with_document("null.md", Some(metadata("id: null\n")))
            .with_document("zero.md", Some(metadata("id: 0\n")))
            .with_document("false.md", Some(metadata("id: false\n")))
            .with_document("list.md", Some(metadata("id: []\n"))),
    );
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let report = engine.assign_all(&Settings::default()).await.unwrap();

    assert_eq!(report.assigned, 3);
    assert_eq!(report.already_present, 1);
    let list = store.metadata("list.md").unwrap().unwrap();
    assert_eq!(list.get("id"), Some(&Value::Sequence(Vec::new())));
}

#[tokio::test]
async fn test_assign_keeps_other_fields() {
    let store = Arc::new(
        MemoryStore::new().with_document("a.md", Some(metadata("title: A\ntags: [x, y]\n"))),
    );
    let engine = AssignmentEngine::new(Arc::clone(&store));

    engine
        .assign_if_missing(&Document::new("a.md"), &Settings::default())
        .await
        .unwrap();

    let a = store.metadata("a.md").unwrap().unwrap();
    let keys: Vec<_> = a.keys().filter_map(Value::as_str).collect();
    assert_eq!(keys, vec!["title", "tags", "id"]);
}

#[tokio::test]
async fn test_assign_if_missing_propagates_missing_document() {
    let engine = AssignmentEngine::new(Arc::new(MemoryStore::new()));

    let result = engine
        .assign_if_missing(&Document::new("gone.md"), &Settings::default())
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_migrate_key_moves_values() {
    let store = Arc::new(
        MemoryStore::new()
            .with_document("a.md", Some(metadata("title: A\nid: X\n")))
            .with_document("b.md", Some(metadata("id: ''\n")))
            .with_document("c.md", None)
            .with_document("templates/d.md", Some(metadata("id: Y\n"))),
    );
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let report = engine.migrate_key("id", "uid").await.unwrap();

    assert_eq!(report.total, 4);
    assert_eq!(report.migrated, 2);
    assert_eq!(report.untouched, 2);

    let a = store.metadata("a.md").unwrap().unwrap();
    assert_eq!(string_value(&a, "uid").as_deref(), Some("X"));
    assert!(a.get("id").is_none());
    assert_eq!(string_value(&a, "title").as_deref(), Some("A"));

    // Migration ignores exclusion; only truthy values move
    let d = store.metadata("templates/d.md").unwrap().unwrap();
    assert_eq!(string_value(&d, "uid").as_deref(), Some("Y"));

    let b = store.metadata("b.md").unwrap().unwrap();
    assert_eq!(b, metadata("id: ''\n"));
    assert_eq!(store.metadata("c.md").unwrap(), None);
}

#[tokio::test]
async fn test_migrate_overwrites_existing_target_in_either_order() {
    let store = Arc::new(
        MemoryStore::new()
            .with_document("target-first.md", Some(metadata("uid: stale\nid: X\n")))
            .with_document("target-last.md", Some(metadata("id: Y\nuid: stale\n")))
            .with_document("target-between.md", Some(metadata("id: Z\nuid: stale\ntitle: T\n"))),
    );
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let report = engine.migrate_key("id", "uid").await.unwrap();
    assert_eq!(report.migrated, 3);

    for (path, expected) in [
        ("target-first.md", "X"),
        ("target-last.md", "Y"),
        ("target-between.md", "Z"),
    ] {
        let m = store.metadata(path).unwrap().unwrap();
        assert_eq!(string_value(&m, "uid").as_deref(), Some(expected), "{path}");
        assert!(m.get("id").is_none(), "{path}");
        assert_eq!(
            m.keys().filter(|k| k.as_str() == Some("uid")).count(),
            1,
            "{path}"
        );
    }

    let between = store.metadata("target-between.md").unwrap().unwrap();
    let keys: Vec<_> = between.keys().filter_map(Value::as_str).collect();
    assert_eq!(keys, vec!["uid", "title"]);
}

#[tokio::test]
async fn test_migrate_moves_non_string_values_unchanged() {
    let store = Arc::new(
        MemoryStore::new()
            .with_document("number.md", Some(metadata("id: 42\n")))
            .with_document("tagged.md", Some(metadata("id: !ref X\n")))
            .with_document("list.md", Some(metadata("id: [a, b]\n"))),
    );
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let report = engine.migrate_key("id", "uid").await.unwrap();
    assert_eq!(report.migrated, 3);

    for (path, before) in [
        ("number.md", "id: 42\n"),
        ("tagged.md", "id: !ref X\n"),
        ("list.md", "id: [a, b]\n"),
    ] {
        let original = metadata(before).get("id").cloned();
        let m = store.metadata(path).unwrap().unwrap();
        assert_eq!(m.get("uid").cloned(), original, "{path}");
        assert!(m.get("id").is_none(), "{path}");
    }
}

#[tokio::test]
async fn test_migrate_twice_is_noop() {
    let store = Arc::new(MemoryStore::new().with_document("a.md", Some(metadata("id: X\n"))));
    let engine = AssignmentEngine::new(Arc::clone(&store));

    engine.migrate_key("id", "uid").await.unwrap();
    let writes = store.write_count();
    let report = engine.migrate_key("id", "uid").await.unwrap();

    assert_eq!(report.migrated, 0);
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn test_batch_continues_after_write_failure() {
    let store = Arc::new(
        MemoryStore::new()
            .with_document("a.md", None)
            .with_document("broken.md", None)
            .with_document("c.md", None),
    );
    store.fail_writes_for("broken.md");
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let report = engine.assign_all(&Settings::default()).await.unwrap();

    assert_eq!(report.assigned, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, "broken.md");
    assert_eq!(engine.metrics().snapshot().failed, 1);
    assert_eq!(store.metadata("broken.md").unwrap(), None);
}

#[tokio::test]
async fn test_migration_continues_after_write_failure() {
    let store = Arc::new(
        MemoryStore::new()
            .with_document("a.md", Some(metadata("id: A\n")))
            .with_document("b.md", Some(metadata("id: B\n"))),
    );
    store.fail_writes_for("a.md");
    let engine = AssignmentEngine::new(Arc::clone(&store));

    let report = engine.migrate_key("id", "uid").await.unwrap();

    assert_eq!(report.migrated, 1);
    assert_eq!(report.failures.len(), 1);
    let b = store.metadata("b.md").unwrap().unwrap();
    assert_eq!(string_value(&b, "uid").as_deref(), Some("B"));
}

#[tokio::test]
async fn test_read_failure_is_isolated() {
    let mut store = MockStore::new();
    store
        .expect_list_documents()
        .times(1)
        .returning(|| Ok(vec![Document::new("a.md"), Document::new("bad.md")]));
    store
        .expect_read_metadata()
        .withf(|doc| doc.path() == "bad.md")
        .times(1)
        .returning(|doc| {
            Err(StoreError::InvalidFrontMatter {
                path: doc.path.clone(),
                message: "mapping expected".to_string(),
            })
        });
    store
        .expect_read_metadata()
        .withf(|doc| doc.path() == "a.md")
        .times(1)
        .returning(|_| Ok(None));
    store
        .expect_process_metadata()
        .with(eq(Document::new("a.md")), mockall::predicate::always())
        .times(1)
        .returning(|_, mutator| {
            let mut metadata = Metadata::new();
            mutator(&mut metadata);
            assert!(metadata.contains_key("id"));
            Ok(())
        });

    let engine = AssignmentEngine::new(Arc::new(store));
    let report = engine.assign_all(&Settings::default()).await.unwrap();

    assert_eq!(report.assigned, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, "bad.md");
}

#[tokio::test]
async fn test_ignored_note_is_never_read() {
    let mut store = MockStore::new();
    store.expect_read_metadata().never();
    store.expect_process_metadata().never();

    let engine = AssignmentEngine::new(Arc::new(store));
    let outcome = engine
        .assign_if_missing(
            &Document::new("templates/daily.md"),
            &settings("id", "^templates/"),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, AssignOutcome::Excluded(_)));
}

#[tokio::test]
async fn test_present_identifier_skips_write() {
    let mut store = MockStore::new();
    store
        .expect_read_metadata()
        .times(1)
        .returning(|_| Ok(Some(serde_yaml_ng::from_str("id: existing\n").unwrap())));
    store.expect_process_metadata().never();

    let engine = AssignmentEngine::new(Arc::new(store));
    let outcome = engine
        .assign_if_missing(&Document::new("a.md"), &Settings::default())
        .await
        .unwrap();

    assert_eq!(outcome, AssignOutcome::AlreadyPresent);
}

#[tokio::test]
async fn test_lost_race_reports_already_present() {
    // The fresh block seen by the mutator already carries an ID written by an
    // overlapping call
    let mut store = MockStore::new();
    store.expect_read_metadata().times(1).returning(|_| Ok(None));
    store
        .expect_process_metadata()
        .times(1)
        .returning(|_, mutator| {
            let mut metadata: Metadata = serde_yaml_ng::from_str("id: winner\n").unwrap();
            mutator(&mut metadata);
            assert_eq!(metadata.get("id"), Some(&Value::from("winner")));
            Ok(())
        });

    let engine = AssignmentEngine::new(Arc::new(store));
    let outcome = engine
        .assign_if_missing(&Document::new("a.md"), &Settings::default())
        .await
        .unwrap();

    assert_eq!(outcome, AssignOutcome::AlreadyPresent);
}

#[tokio::test]
async fn test_list_failure_propagates() {
    let mut store = MockStore::new();
    store.expect_list_documents().times(1).returning(|| {
        Err(StoreError::NotFound("vault".to_string()))
    });

    let engine = AssignmentEngine::new(Arc::new(store));
    assert!(engine.assign_all(&Settings::default()).await.is_err());
}

#[tokio::test]
async fn test_same_key_migration_never_lists() {
    let mut store = MockStore::new();
    store.expect_list_documents().never();

    let engine = AssignmentEngine::new(Arc::new(store));
    let report = engine.migrate_key("id", "id").await.unwrap();

    assert_eq!(report.migrated, 0);
}
