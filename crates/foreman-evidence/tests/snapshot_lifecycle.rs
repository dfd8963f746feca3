//! End-to-end snapshot lifecycle: collect, seal, persist, reload, tamper

use foreman_evidence::{
    verify_snapshot_files, ContentHash, ControlName, SnapshotBuilder, SnapshotError, SnapshotStore,
};
use proptest::prelude::*;
use tempfile::TempDir;

#[tokio::test]
async fn collected_evidence_survives_persistence() {
    let tmp = TempDir::new().unwrap();
    let evidence = tmp.path().join("evidence");
    tokio::fs::create_dir_all(evidence.join("runs")).await.unwrap();
    tokio::fs::write(evidence.join("qiel-summary.json"), br#"{"passing":303,"total":303}"#)
        .await
        .unwrap();
    tokio::fs::write(evidence.join("runs/red-qa.log"), b"3 failing").await.unwrap();
    tokio::fs::write(evidence.join("build-philosophy.md"), b"# followed").await.unwrap();

    let snapshot = SnapshotBuilder::new().build(123, "abc123ef99", &evidence).await.unwrap();
    assert_eq!(snapshot.pr_number(), 123);
    assert_eq!(snapshot.commit_sha(), "abc123ef99");
    assert!(snapshot.completeness().complete);
    assert_eq!(snapshot.files().count(), 3);
    for file in snapshot.files() {
        assert_eq!(file.hash.to_string().len(), 64);
    }
    assert_eq!(snapshot.bucket(ControlName::BuildPhilosophy).unwrap().files.len(), 1);

    let store = SnapshotStore::new(tmp.path().join("snapshots"));
    store.save(&snapshot).await.unwrap();
    let loaded = store.load(snapshot.snapshot_id()).await.unwrap();
    assert_eq!(loaded.hash(), snapshot.hash());

    assert!(verify_snapshot_files(&loaded).await.iter().all(|f| f.intact));
}

#[tokio::test]
async fn evidence_hash_swap_in_stored_snapshot_is_detected() {
    let tmp = TempDir::new().unwrap();
    tokio::fs::write(tmp.path().join("qa.log"), b"green").await.unwrap();
    let snapshot = SnapshotBuilder::new().build(9, "feedface00", tmp.path()).await.unwrap();

    let store = SnapshotStore::new(tmp.path().join("store"));
    let path = store.save(&snapshot).await.unwrap();

    let original = snapshot.files().next().unwrap().hash.to_string();
    let forged = ContentHash::compute(b"forged").to_string();
    let text = tokio::fs::read_to_string(&path).await.unwrap();
    tokio::fs::write(&path, text.replace(&original, &forged)).await.unwrap();

    let err = store.load_path(&path).await.unwrap_err();
    assert!(matches!(err, SnapshotError::IntegrityViolation { .. }));
}

proptest! {
    #[test]
    fn any_pr_number_change_breaks_hash(pr in 0u64..1_000_000, delta in 1u64..1000) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let tmp = TempDir::new().unwrap();
        let snapshot = rt
            .block_on(SnapshotBuilder::new().build(pr, "0000aaaa", &tmp.path().join("missing")))
            .unwrap();
        let mut value = serde_json::to_value(&snapshot).unwrap();
        value["prNumber"] = serde_json::json!(pr + delta);
        let tampered: foreman_evidence::EvidenceSnapshot = serde_json::from_value(value).unwrap();
        prop_assert!(tampered.verify().is_err());
    }
}
