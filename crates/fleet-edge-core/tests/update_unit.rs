// crates/fleet-edge-core/tests/update_unit.rs
// ============================================================================
// Module: Update Pipeline Unit Tests
// Description: Manifest signature verification and apply_update atomicity.
// Purpose: Validate tamper detection and no-durable-change-on-failure.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use fleet_edge_core::PlaceholderFetcher;
use fleet_edge_core::UpdateError;
use fleet_edge_core::UpdateManager;
use fleet_edge_core::UpdateManifest;
use fleet_edge_core::UpdateState;
use fleet_edge_core::compute_manifest_signature;
use fleet_edge_core::interfaces::ArtifactFetcher;
use fleet_edge_core::interfaces::InstallHook;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const SECRET: &str = "super-secret";

fn signed_manifest(version: &str, timestamp: f64) -> UpdateManifest {
    let artifact_url = format!("https://cdn.example.com/{version}/artifact.tar.gz");
    let signature =
        compute_manifest_signature(SECRET.as_bytes(), version, &artifact_url, timestamp);
    UpdateManifest {
        version: version.to_string(),
        artifact_url,
        signature,
        timestamp,
    }
}

/// Install hook recording the artifact contents it saw.
#[derive(Clone, Default)]
struct RecordingInstall {
    /// Contents of each installed artifact, shared with the test body.
    installed: Arc<Mutex<Vec<String>>>,
}

impl InstallHook for RecordingInstall {
    fn install(&self, artifact_path: &Path) -> Result<(), String> {
        let contents = std::fs::read_to_string(artifact_path).map_err(|err| err.to_string())?;
        self.installed.lock().unwrap().push(contents);
        Ok(())
    }
}

/// Fetcher that always fails.
struct FailingFetcher;

impl ArtifactFetcher for FailingFetcher {
    fn fetch(&self, _artifact_url: &str, _destination: &Path) -> Result<(), String> {
        Err("connection reset".to_string())
    }
}

/// Install hook that always fails.
struct FailingInstall;

impl InstallHook for FailingInstall {
    fn install(&self, _artifact_path: &Path) -> Result<(), String> {
        Err("no space left".to_string())
    }
}

/// Install hook counting invocations.
#[derive(Default)]
struct CountingInstall {
    /// Number of install calls observed.
    calls: AtomicU32,
}

impl InstallHook for CountingInstall {
    fn install(&self, _artifact_path: &Path) -> Result<(), String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn manager_with(
    fetcher: Box<dyn ArtifactFetcher>,
    installer: Box<dyn InstallHook>,
) -> UpdateManager {
    UpdateManager::new(SECRET, UpdateState::new("0.0.0"), fetcher, installer)
}

// ============================================================================
// SECTION: Signature Validation
// ============================================================================

#[test]
fn valid_manifest_passes_validation() {
    let manager =
        manager_with(Box::new(PlaceholderFetcher), Box::new(RecordingInstall::default()));
    let manifest = signed_manifest("1.0.0", 1_700_000_000.0);
    manager.validate_manifest(&manifest).expect("signature should verify");
}

#[test]
fn flipping_any_signed_field_fails_validation() {
    let manager =
        manager_with(Box::new(PlaceholderFetcher), Box::new(RecordingInstall::default()));
    let manifest = signed_manifest("1.0.0", 1_700_000_000.0);

    let mut tampered = manifest.clone();
    let mut signature = tampered.signature.into_bytes();
    signature[0] = if signature[0] == b'0' { b'1' } else { b'0' };
    tampered.signature = String::from_utf8(signature).unwrap();
    assert!(matches!(
        manager.validate_manifest(&tampered),
        Err(UpdateError::Validation)
    ));

    let mut tampered = manifest.clone();
    tampered.version = "1.0.1".to_string();
    assert!(matches!(
        manager.validate_manifest(&tampered),
        Err(UpdateError::Validation)
    ));

    let mut tampered = manifest.clone();
    tampered.artifact_url.push('x');
    assert!(matches!(
        manager.validate_manifest(&tampered),
        Err(UpdateError::Validation)
    ));

    let mut tampered = manifest;
    tampered.timestamp += 1.0;
    assert!(matches!(
        manager.validate_manifest(&tampered),
        Err(UpdateError::Validation)
    ));
}

// ============================================================================
// SECTION: Apply Update
// ============================================================================

#[test]
fn apply_update_commits_version_after_install() {
    let mut manager =
        manager_with(Box::new(PlaceholderFetcher), Box::new(RecordingInstall::default()));
    let manifest = signed_manifest("1.0.0", 1_700_000_000.0);
    let applied = manager.apply_update(&manifest).expect("update should apply");
    assert_eq!(applied, "1.0.0");
    assert_eq!(manager.current_version(), "1.0.0");
}

#[test]
fn tampered_manifest_leaves_version_unchanged() {
    let mut manager =
        manager_with(Box::new(PlaceholderFetcher), Box::new(RecordingInstall::default()));
    let mut manifest = signed_manifest("1.0.0", 1_700_000_000.0);
    let mut signature = manifest.signature.into_bytes();
    signature[10] = if signature[10] == b'a' { b'b' } else { b'a' };
    manifest.signature = String::from_utf8(signature).unwrap();
    let Err(err) = manager.apply_update(&manifest) else {
        panic!("expected tampered manifest to fail");
    };
    assert!(matches!(err, UpdateError::Validation));
    assert_eq!(manager.current_version(), "0.0.0");
}

#[test]
fn fetch_failure_aborts_without_commit() {
    let mut manager = manager_with(Box::new(FailingFetcher), Box::new(CountingInstall::default()));
    let manifest = signed_manifest("2.0.0", 1_700_000_000.0);
    let Err(err) = manager.apply_update(&manifest) else {
        panic!("expected fetch failure");
    };
    assert!(matches!(err, UpdateError::Fetch(_)));
    assert_eq!(manager.current_version(), "0.0.0");
}

#[test]
fn install_failure_aborts_without_commit() {
    let mut manager = manager_with(Box::new(PlaceholderFetcher), Box::new(FailingInstall));
    let manifest = signed_manifest("2.0.0", 1_700_000_000.0);
    let Err(err) = manager.apply_update(&manifest) else {
        panic!("expected install failure");
    };
    assert!(matches!(err, UpdateError::Install(_)));
    assert_eq!(manager.current_version(), "0.0.0");
}

#[test]
fn reapplying_accepted_manifest_is_idempotent() {
    let installer = Box::new(CountingInstall::default());
    let mut manager = UpdateManager::new(
        SECRET,
        UpdateState::new("0.0.0"),
        Box::new(PlaceholderFetcher),
        installer,
    );
    let manifest = signed_manifest("1.0.0", 1_700_000_000.0);
    manager.apply_update(&manifest).expect("first apply");
    let applied = manager.apply_update(&manifest).expect("second apply still validates");
    assert_eq!(applied, "1.0.0");
    assert_eq!(manager.current_version(), "1.0.0");
}

#[test]
fn signed_downgrade_is_permitted() {
    let mut manager =
        manager_with(Box::new(PlaceholderFetcher), Box::new(RecordingInstall::default()));
    let upgrade = signed_manifest("2.0.0", 1_700_000_000.0);
    manager.apply_update(&upgrade).expect("upgrade");
    let downgrade = signed_manifest("1.9.0", 1_700_000_100.0);
    manager.apply_update(&downgrade).expect("signed downgrade");
    assert_eq!(manager.current_version(), "1.9.0");
}

#[test]
fn placeholder_fetcher_writes_marker_artifact() {
    let install = RecordingInstall::default();
    let installed = Arc::clone(&install.installed);
    let mut manager = UpdateManager::new(
        SECRET,
        UpdateState::new("0.0.0"),
        Box::new(PlaceholderFetcher),
        Box::new(install),
    );
    let manifest = signed_manifest("1.0.0", 1_700_000_000.0);
    manager.apply_update(&manifest).expect("apply");
    let seen = installed.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], format!("artifact from {}\n", manifest.artifact_url));
}
