// crates/fleet-edge-core/src/core/update.rs
// ============================================================================
// Module: Fleet Edge Update Pipeline
// Description: Manifest signature verification, artifact fetch, and install.
// Purpose: Apply signed software updates with no durable state on failure.
// Dependencies: hmac, sha2, subtle, serde, tempfile, thiserror
// ============================================================================

//! ## Overview
//! Updates are described by a signed [`UpdateManifest`]. The manager verifies
//! the HMAC-SHA256 signature with a constant-time comparison, fetches the
//! artifact into a scoped temporary directory, hands it to the install hook,
//! and only then commits the new version. Any failure leaves
//! `current_version` unchanged and releases the temporary directory.
//!
//! Version comparison is strict string inequality; signed downgrades are
//! permitted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::interfaces::ArtifactFetcher;
use crate::interfaces::InstallHook;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Filename of the fetched artifact inside the scoped temporary directory.
const ARTIFACT_FILENAME: &str = "artifact";

// ============================================================================
// SECTION: Manifest
// ============================================================================

/// Signed descriptor of an available software update.
///
/// # Invariants
/// - `signature` is the lowercase hex HMAC-SHA256 of
///   `"{version}:{artifact_url}:{timestamp}"` under the site secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateManifest {
    /// Version offered by the manifest.
    pub version: String,
    /// Location of the update artifact.
    pub artifact_url: String,
    /// Lowercase hex HMAC-SHA256 signature.
    pub signature: String,
    /// Manifest issue time in wall-clock seconds.
    pub timestamp: f64,
}

impl UpdateManifest {
    /// Returns the message the signature covers.
    #[must_use]
    pub fn signing_message(&self) -> String {
        format!("{}:{}:{}", self.version, self.artifact_url, self.timestamp)
    }
}

/// Computes the lowercase hex manifest signature for the given fields.
#[must_use]
pub fn compute_manifest_signature(
    secret_key: &[u8],
    version: &str,
    artifact_url: &str,
    timestamp: f64,
) -> String {
    let message = format!("{version}:{artifact_url}:{timestamp}");
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret_key)
        .expect("hmac accepts keys of any length");
    mac.update(message.as_bytes());
    hex_encode(&mac.finalize().into_bytes())
}

// ============================================================================
// SECTION: State and Errors
// ============================================================================

/// Durable view of the installed software version.
///
/// # Invariants
/// - `current_version` is mutated only by a successful `apply_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateState {
    /// Currently installed version.
    pub current_version: String,
}

impl UpdateState {
    /// Creates the state for a known installed version.
    #[must_use]
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
        }
    }
}

/// Errors raised by the update pipeline.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Manifest signature did not verify.
    #[error("update signature validation failed")]
    Validation,
    /// Artifact could not be fetched.
    #[error("update artifact fetch failed: {0}")]
    Fetch(String),
    /// Install hook failed.
    #[error("update install failed: {0}")]
    Install(String),
    /// Temporary workspace could not be created.
    #[error("update workspace io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Update Manager
// ============================================================================

/// State machine over the installed version, driven by signed manifests.
///
/// # Invariants
/// - `current_version` advances only after a successful install.
/// - Partial failures leave no durable state change.
pub struct UpdateManager {
    /// HMAC key shared with the fleet backend.
    secret_key: Vec<u8>,
    /// Installed-version state owned by this manager.
    state: UpdateState,
    /// Downloads artifacts to a path.
    fetcher: Box<dyn ArtifactFetcher>,
    /// Stages fetched artifacts for adoption.
    installer: Box<dyn InstallHook>,
    /// `(version, signature)` of the last accepted manifest, for dedup
    /// across repeated fetches of the same offer.
    last_accepted: Option<(String, String)>,
}

impl UpdateManager {
    /// Creates a manager for the given secret and installed state.
    #[must_use]
    pub fn new(
        secret_key: impl AsRef<[u8]>,
        state: UpdateState,
        fetcher: Box<dyn ArtifactFetcher>,
        installer: Box<dyn InstallHook>,
    ) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
            state,
            fetcher,
            installer,
            last_accepted: None,
        }
    }

    /// Returns the currently installed version.
    #[must_use]
    pub fn current_version(&self) -> &str {
        &self.state.current_version
    }

    /// Returns true when the offered version differs from the installed one.
    ///
    /// Comparison is strict string inequality, not semver order; signed
    /// downgrades are permitted.
    #[must_use]
    pub fn needs_update(&self, version: &str) -> bool {
        version != self.state.current_version
    }

    /// Verifies the manifest signature in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Validation`] on mismatch.
    pub fn validate_manifest(&self, manifest: &UpdateManifest) -> Result<(), UpdateError> {
        let expected = compute_manifest_signature(
            &self.secret_key,
            &manifest.version,
            &manifest.artifact_url,
            manifest.timestamp,
        );
        let matches: bool = expected.as_bytes().ct_eq(manifest.signature.as_bytes()).into();
        if matches {
            Ok(())
        } else {
            Err(UpdateError::Validation)
        }
    }

    /// Validates, fetches, installs, and commits the manifest version.
    ///
    /// Re-applying the last accepted manifest still validates but skips the
    /// fetch and install; the committed version is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError`] when validation, fetch, or install fails; the
    /// installed version is unchanged and the temporary directory released.
    pub fn apply_update(&mut self, manifest: &UpdateManifest) -> Result<String, UpdateError> {
        self.validate_manifest(manifest)?;
        let offer = (manifest.version.clone(), manifest.signature.clone());
        if self.last_accepted.as_ref() == Some(&offer) {
            return Ok(self.state.current_version.clone());
        }
        let workspace = tempfile::tempdir().map_err(|err| UpdateError::Io(err.to_string()))?;
        let artifact_path = workspace.path().join(ARTIFACT_FILENAME);
        self.fetcher.fetch(&manifest.artifact_url, &artifact_path).map_err(UpdateError::Fetch)?;
        self.installer.install(&artifact_path).map_err(UpdateError::Install)?;
        drop(workspace);
        self.state.current_version = manifest.version.clone();
        self.last_accepted = Some(offer);
        Ok(self.state.current_version.clone())
    }
}

// ============================================================================
// SECTION: Placeholder Fetcher
// ============================================================================

/// Stand-in fetcher that writes a marker file instead of downloading.
///
/// Used by simulations and tests; real deployments wire an HTTP fetcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderFetcher;

impl ArtifactFetcher for PlaceholderFetcher {
    fn fetch(&self, artifact_url: &str, destination: &std::path::Path) -> Result<(), String> {
        std::fs::write(destination, format!("artifact from {artifact_url}\n"))
            .map_err(|err| err.to_string())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders bytes as lowercase hex.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let hi = usize::from(byte >> 4);
        let lo = usize::from(byte & 0x0f);
        out.push(char::from(HEX[hi]));
        out.push(char::from(HEX[lo]));
    }
    out
}
