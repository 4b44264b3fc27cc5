//! Install State Persistence Tests
//!
//! Round trips through the state file, set semantics of the installed and
//! skipped lists, file permissions and error reporting for corrupt files.

use std::collections::HashSet;

use strixforge::{StateError, StateStore};

fn as_set(ids: &[String]) -> HashSet<String> {
    ids.iter().cloned().collect()
}

#[test]
fn test_missing_file_is_first_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::load(dir.path().join("state.json")).unwrap();
    assert!(store.is_first_run());
    assert!(store.installed_stages().is_empty());
    assert!(store.skipped_stages().is_empty());
}

#[test]
fn test_save_and_reload_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let mut store = StateStore::new(&path);
    store.add_installed_stage("system");
    store.add_installed_stage("kernel");
    store.add_skipped_stage("thermal");
    store.set_device_name("Beelink GTR9 Pro");
    store.set_installer_version("1.2.3");
    store.mark_first_run_complete();
    store.save().unwrap();

    let reloaded = StateStore::load(&path).unwrap();
    assert!(!reloaded.is_first_run());
    assert_eq!(
        as_set(reloaded.installed_stages()),
        as_set(&["kernel".to_string(), "system".to_string()])
    );
    assert!(reloaded.is_stage_skipped("thermal"));
    assert_eq!(reloaded.state().device_name, "Beelink GTR9 Pro");
    assert_eq!(reloaded.state().installer_version, "1.2.3");
    assert!(reloaded.state().timestamp.is_some());
}

#[test]
fn test_adding_twice_is_idempotent() {
    let mut store = StateStore::new("unused.json");
    for _ in 0..3 {
        store.add_installed_stage("graphics");
        store.add_skipped_stage("apps");
    }
    assert_eq!(store.installed_stages().len(), 1);
    assert_eq!(store.skipped_stages().len(), 1);
}

#[test]
fn test_installing_clears_skip_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut store = StateStore::new(&path);
    store.add_skipped_stage("workspace");
    store.save().unwrap();

    let mut store = StateStore::load(&path).unwrap();
    store.add_installed_stage("workspace");
    store.save().unwrap();

    let reloaded = StateStore::load(&path).unwrap();
    assert!(reloaded.is_stage_installed("workspace"));
    assert!(!reloaded.is_stage_skipped("workspace"));
}

#[cfg(unix)]
#[test]
fn test_state_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut store = StateStore::new(&path);
    store.save().unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_corrupt_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{\"installedStages\": [").unwrap();

    let err = StateStore::load(&path).unwrap_err();
    assert!(matches!(err, StateError::InvalidJson(_)));
}

#[test]
fn test_save_overwrites_previous_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "garbage that is not json").unwrap();

    let mut store = StateStore::new(&path);
    store.add_installed_stage("lxd");
    store.save().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("\"installedStages\""));
    assert!(StateStore::load(&path).unwrap().is_stage_installed("lxd"));
}
