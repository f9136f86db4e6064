//! End-to-end protocol flows against the in-memory store.

use backup_client::config::Config;
use backup_client::coordinator::BackupCoordinator;
use backup_client::error::BackupError;
use backup_client::store::memory::MemoryStore;
use backup_client::store::RemoteStore;
use std::path::PathBuf;
use std::sync::Arc;

struct Harness {
    store: Arc<MemoryStore>,
    coordinator: BackupCoordinator,
    _restore_dir: tempfile::TempDir,
    src_dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let restore_dir = tempfile::tempdir().unwrap();
        let config = Config {
            restore_dir: restore_dir.path().to_path_buf(),
            ..Config::default()
        };
        let coordinator =
            BackupCoordinator::new(Arc::clone(&store) as Arc<dyn RemoteStore>, &config);
        Harness {
            store,
            coordinator,
            _restore_dir: restore_dir,
            src_dir: tempfile::tempdir().unwrap(),
        }
    }

    async fn fixtures(&self, files: &[(&str, &str)]) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for (name, contents) in files {
            let path = self.src_dir.path().join(name);
            tokio::fs::write(&path, contents).await.unwrap();
            paths.push(path);
        }
        paths
    }
}

#[tokio::test]
async fn backup_then_same_id_is_safe_and_other_id_conflicts() {
    let h = Harness::new();
    let paths = h.fixtures(&[("f1.bin", "one"), ("f2.bin", "two")]).await;

    h.coordinator
        .backup("node1", "abc", &paths, true)
        .await
        .unwrap();

    h.coordinator.check_safe("node1", "abc", true).await.unwrap();

    let err = h
        .coordinator
        .check_safe("node1", "xyz", true)
        .await
        .unwrap_err();
    match err {
        BackupError::Conflict {
            existing,
            requested,
        } => {
            assert_eq!(existing, "abc");
            assert_eq!(requested, "xyz");
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn listing_shows_backed_up_nodes() {
    let h = Harness::new();
    let paths = h.fixtures(&[("f1.bin", "one")]).await;

    h.coordinator
        .backup("node1", "abc", &paths, true)
        .await
        .unwrap();

    let available = h.coordinator.list_available(true).await.unwrap();
    assert_eq!(available.len(), 1);
    assert!(available.contains_key("node1"));
}

#[tokio::test]
async fn restore_roundtrip_matches_backed_up_bytes() {
    let h = Harness::new();
    let paths = h
        .fixtures(&[("wallet.db", "wallet bytes"), ("channels.bak", "channel bytes")])
        .await;

    h.coordinator
        .backup("node1", "abc", &paths, true)
        .await
        .unwrap();

    let restored = h.coordinator.restore("node1", "abc", true).await.unwrap();
    assert_eq!(restored.len(), 2);

    for path in &restored {
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        let original = std::fs::read(h.src_dir.path().join(&name)).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), original, "mismatch in {name}");
    }
}

#[tokio::test]
async fn restore_claims_ownership_of_the_backup_id() {
    let h = Harness::new();
    let paths = h.fixtures(&[("f1.bin", "one")]).await;

    h.coordinator
        .backup("node1", "abc", &paths, true)
        .await
        .unwrap();
    h.coordinator.restore("node1", "imported", true).await.unwrap();

    // The restoring device now owns the lineage; the old ID conflicts.
    let err = h
        .coordinator
        .check_safe("node1", "abc", true)
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::Conflict { .. }));
}

#[tokio::test]
async fn second_backup_replaces_the_version_folder() {
    let h = Harness::new();
    let first = h.fixtures(&[("f1.bin", "one")]).await;
    let second = h.fixtures(&[("f2.bin", "two"), ("f3.bin", "three")]).await;

    h.coordinator
        .backup("node1", "abc", &first, true)
        .await
        .unwrap();
    h.coordinator
        .backup("node1", "abc", &second, true)
        .await
        .unwrap();

    let available = h.coordinator.list_available(true).await.unwrap();
    let node_folder = available["node1"].clone();
    assert_eq!(h.store.subfolder_titles(&node_folder).len(), 1);

    let restored = h.coordinator.restore("node1", "abc", true).await.unwrap();
    let mut names: Vec<String> = restored
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["f2.bin", "f3.bin"]);
}

#[tokio::test]
async fn failed_upload_keeps_previous_version_downloadable() {
    let h = Harness::new();
    let good = h.fixtures(&[("f1.bin", "original")]).await;
    let mixed = h.fixtures(&[("f2.bin", "new"), ("bad.bin", "doomed")]).await;

    h.coordinator
        .backup("node1", "abc", &good, true)
        .await
        .unwrap();

    h.store.fail_upload_of("bad.bin");
    let err = h
        .coordinator
        .backup("node1", "abc", &mixed, true)
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::PartialUpload { .. }));

    // The previously active version is still what restore sees.
    let restored = h.coordinator.restore("node1", "abc", true).await.unwrap();
    assert_eq!(restored.len(), 1);
    assert_eq!(std::fs::read(&restored[0]).unwrap(), b"original");
}

#[tokio::test]
async fn concurrent_operations_share_one_sign_in() {
    let h = Harness::new();
    h.store
        .set_auth_delay(std::time::Duration::from_millis(50));

    let coordinator = Arc::new(h.coordinator);
    let mut handles = Vec::new();
    for _ in 0..6 {
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            coordinator.list_available(false).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(h.store.auth_attempts(), 1);
}

#[tokio::test]
async fn sign_out_forces_fresh_interactive_sign_in() {
    let h = Harness::new();
    let paths = h.fixtures(&[("f1.bin", "one")]).await;

    h.coordinator
        .backup("node1", "abc", &paths, false)
        .await
        .unwrap();
    assert_eq!(h.store.interactive_auths(), 0);

    h.coordinator.sign_out().await.unwrap();
    assert_eq!(h.store.revocations(), 1);

    h.coordinator
        .backup("node1", "abc", &paths, true)
        .await
        .unwrap();
    assert_eq!(h.store.auth_attempts(), 2);
    assert_eq!(h.store.interactive_auths(), 1);
}

#[tokio::test]
async fn sign_out_without_session_still_revokes_provider_state() {
    let h = Harness::new();

    // A failed sign-in leaves no cached connection behind.
    h.store.set_deny_auth(true);
    h.coordinator.list_available(false).await.unwrap_err();

    h.coordinator.sign_out().await.unwrap();
    assert_eq!(h.store.revocations(), 1);
    assert_eq!(h.store.auth_attempts(), 1);
}

#[tokio::test]
async fn restore_without_backup_reports_no_backup_found() {
    let h = Harness::new();
    let err = h
        .coordinator
        .restore("node-without-backups", "abc", true)
        .await
        .unwrap_err();
    assert!(matches!(err, BackupError::NoBackupFound));
}
