// crates/fleet-edge-backend-http/src/http.rs
// ============================================================================
// Module: HTTP Fleet Backend
// Description: Blocking HTTP implementation of the fleet backend contract.
// Purpose: Deliver agent traffic to the central backend with strict limits.
// Dependencies: fleet-edge-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The HTTP backend issues bounded requests against a fixed base URL:
//! `GET  v1/sites/{site}/ping`,
//! `POST v1/sites/{site}/events`,
//! `GET  v1/sites/{site}/commands`,
//! `GET  v1/sites/{site}/update-manifest`, and
//! `POST v1/sites/{site}/inventory|diagnostics|metrics`.
//! Redirects are not followed, response bodies are size-capped, and
//! cleartext HTTP is blocked unless the config allows it. A failed probe
//! reports `false` rather than raising, so connectivity evaluation never
//! errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use fleet_edge_core::BackendError;
use fleet_edge_core::CommandRequest;
use fleet_edge_core::FleetBackend;
use fleet_edge_core::SyncResult;
use fleet_edge_core::UpdateManifest;
use fleet_edge_core::WireEvent;
use fleet_edge_core::interfaces::ArtifactFetcher;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP backend.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` base URLs.
/// - `max_response_bytes` is a hard upper bound on response bodies.
/// - URLs with embedded credentials are rejected.
/// - `timeout_ms` applies to the full request lifecycle; `ping_timeout_ms`
///   applies to liveness probes only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpBackendConfig {
    /// Backend base URL.
    pub base_url: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Liveness probe timeout in milliseconds.
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    /// Allow cleartext HTTP (disabled by default).
    #[serde(default)]
    pub allow_http: bool,
    /// User agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum response size allowed, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl HttpBackendConfig {
    /// Creates a config with default limits for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: default_timeout_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
            allow_http: false,
            user_agent: default_user_agent(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

/// Returns the default request timeout in milliseconds.
const fn default_timeout_ms() -> u64 {
    5_000
}

/// Returns the default probe timeout in milliseconds.
const fn default_ping_timeout_ms() -> u64 {
    5_000
}

/// Returns the default outbound user agent.
fn default_user_agent() -> String {
    "fleet-edge/0.1".to_string()
}

/// Returns the default response size cap.
const fn default_max_response_bytes() -> usize {
    1024 * 1024
}

// ============================================================================
// SECTION: Backend Implementation
// ============================================================================

/// Blocking HTTP fleet backend.
///
/// # Invariants
/// - Redirects are not followed.
/// - Responses exceeding configured limits fail closed.
pub struct HttpFleetBackend {
    /// Backend configuration, including limits and policy.
    config: HttpBackendConfig,
    /// Parsed base URL requests are joined against.
    base: Url,
    /// HTTP client used for regular requests.
    client: Client,
    /// HTTP client with the shorter probe timeout.
    ping_client: Client,
}

impl HttpFleetBackend {
    /// Creates a backend for the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the base URL violates policy or a
    /// client cannot be built.
    pub fn new(config: HttpBackendConfig) -> Result<Self, BackendError> {
        let base = Url::parse(&config.base_url)
            .map_err(|_| BackendError::Unavailable("invalid backend base url".to_string()))?;
        validate_base_url(&base, &config)?;
        let client = build_client(&config, config.timeout_ms)?;
        let ping_client = build_client(&config, config.ping_timeout_ms)?;
        Ok(Self {
            config,
            base,
            client,
            ping_client,
        })
    }

    /// Builds the site-scoped endpoint URL for one leaf resource.
    fn endpoint(&self, site_id: &str, leaf: &str) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::Unavailable("backend base url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v1", "sites", site_id, leaf]);
        Ok(url)
    }

    /// Issues a GET and decodes a JSON body within the size cap.
    fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, BackendError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| BackendError::Unavailable(err.to_string()))?;
        let response = response
            .error_for_status()
            .map_err(|err| BackendError::Unavailable(err.to_string()))?;
        decode_json(response, self.config.max_response_bytes)
    }

    /// Issues a POST with a JSON document and checks the status.
    fn post_json(&self, url: Url, document: &Value) -> Result<Response, BackendError> {
        let response = self
            .client
            .post(url)
            .json(document)
            .send()
            .map_err(|err| BackendError::Unavailable(err.to_string()))?;
        response.error_for_status().map_err(|err| BackendError::Unavailable(err.to_string()))
    }
}

impl FleetBackend for HttpFleetBackend {
    fn ping(&self, site_id: &str) -> bool {
        let Ok(url) = self.endpoint(site_id, "ping") else {
            return false;
        };
        match self.ping_client.get(url).send() {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn send_batch(&self, site_id: &str, items: &[WireEvent]) -> Result<SyncResult, BackendError> {
        let url = self.endpoint(site_id, "events")?;
        let document = serde_json::to_value(items)
            .map_err(|err| BackendError::InvalidResponse(err.to_string()))?;
        let response = self.post_json(url, &document)?;
        decode_json(response, self.config.max_response_bytes)
    }

    fn fetch_commands(&self, site_id: &str) -> Result<Vec<CommandRequest>, BackendError> {
        let url = self.endpoint(site_id, "commands")?;
        self.get_json(url)
    }

    fn get_update_manifest(
        &self,
        site_id: &str,
    ) -> Result<Option<UpdateManifest>, BackendError> {
        let url = self.endpoint(site_id, "update-manifest")?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| BackendError::Unavailable(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND
            || response.status() == StatusCode::NO_CONTENT
        {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|err| BackendError::Unavailable(err.to_string()))?;
        let body = read_response_limited(response, self.config.max_response_bytes)?;
        if body.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice::<Option<UpdateManifest>>(&body)
            .map_err(|err| BackendError::InvalidResponse(err.to_string()))
    }

    fn post_inventory(&self, site_id: &str, inventory: &Value) -> Result<(), BackendError> {
        let url = self.endpoint(site_id, "inventory")?;
        self.post_json(url, inventory).map(|_| ())
    }

    fn post_diagnostics(&self, site_id: &str, diagnostics: &Value) -> Result<(), BackendError> {
        let url = self.endpoint(site_id, "diagnostics")?;
        self.post_json(url, diagnostics).map(|_| ())
    }

    fn post_metrics(&self, site_id: &str, metrics: &Value) -> Result<(), BackendError> {
        let url = self.endpoint(site_id, "metrics")?;
        self.post_json(url, metrics).map(|_| ())
    }
}

// ============================================================================
// SECTION: Artifact Fetcher
// ============================================================================

/// Blocking HTTP artifact fetcher with a byte cap.
///
/// # Invariants
/// - Artifacts exceeding `max_artifact_bytes` fail closed.
/// - Redirects are not followed.
pub struct HttpArtifactFetcher {
    /// HTTP client used for downloads.
    client: Client,
    /// Hard upper bound on artifact size.
    max_artifact_bytes: usize,
}

impl HttpArtifactFetcher {
    /// Default artifact size cap (64 MiB).
    pub const DEFAULT_MAX_ARTIFACT_BYTES: usize = 64 * 1024 * 1024;

    /// Creates a fetcher with the given timeout and size cap.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the client cannot be built.
    pub fn new(
        timeout_ms: u64,
        user_agent: impl Into<String>,
        max_artifact_bytes: usize,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(user_agent.into())
            .redirect(Policy::none())
            .build()
            .map_err(|_| BackendError::Unavailable("http client build failed".to_string()))?;
        Ok(Self {
            client,
            max_artifact_bytes,
        })
    }
}

impl ArtifactFetcher for HttpArtifactFetcher {
    fn fetch(&self, artifact_url: &str, destination: &Path) -> Result<(), String> {
        let url = Url::parse(artifact_url).map_err(|_| "invalid artifact url".to_string())?;
        let response = self.client.get(url).send().map_err(|err| err.to_string())?;
        let response = response.error_for_status().map_err(|err| err.to_string())?;
        let body = read_response_limited(response, self.max_artifact_bytes)
            .map_err(|err| err.to_string())?;
        fs::write(destination, body).map_err(|err| err.to_string())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates base URL scheme and credential policy.
fn validate_base_url(url: &Url, config: &HttpBackendConfig) -> Result<(), BackendError> {
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        _ => {
            return Err(BackendError::Unavailable(
                "unsupported backend url scheme".to_string(),
            ));
        }
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(BackendError::Unavailable(
            "backend url credentials are not allowed".to_string(),
        ));
    }
    Ok(())
}

/// Builds a client with the shared policy and the given timeout.
fn build_client(config: &HttpBackendConfig, timeout_ms: u64) -> Result<Client, BackendError> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(config.user_agent.clone())
        .redirect(Policy::none())
        .build()
        .map_err(|_| BackendError::Unavailable("http client build failed".to_string()))
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(
    mut response: Response,
    max_bytes: usize,
) -> Result<Vec<u8>, BackendError> {
    let max_bytes_u64 = max_bytes as u64;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(BackendError::InvalidResponse(
            "http response exceeds size limit".to_string(),
        ));
    }
    let mut buffer = Vec::new();
    let limit = max_bytes_u64.saturating_add(1);
    let mut handle = (&mut response).take(limit);
    handle
        .read_to_end(&mut buffer)
        .map_err(|_| BackendError::Unavailable("failed to read response".to_string()))?;
    if buffer.len() > max_bytes {
        return Err(BackendError::InvalidResponse(
            "http response exceeds size limit".to_string(),
        ));
    }
    Ok(buffer)
}

/// Decodes a JSON body within the size cap.
fn decode_json<T: serde::de::DeserializeOwned>(
    response: Response,
    max_bytes: usize,
) -> Result<T, BackendError> {
    let body = read_response_limited(response, max_bytes)?;
    serde_json::from_slice(&body).map_err(|err| BackendError::InvalidResponse(err.to_string()))
}
