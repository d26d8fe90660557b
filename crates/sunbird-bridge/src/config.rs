//! Bridge configuration.

use serde::{Deserialize, Serialize};
use sunbird_kernel::ModuleSource;

/// Verdict of the build step about the kernel bundle.
///
/// The build pipeline records whether a real module was produced; a stub
/// or missing bundle routes the bridge straight to the static fallback
/// without ever invoking the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum BundleStatus {
    Available,
    Stub(String),
    Missing(String),
}

/// Remote inference proxy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Endpoint answering POSTed turns with `{"answer": "..."}`.
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Everything the bridge needs to pick and drive a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Where the kernel module binary lives.
    pub module: ModuleSource,
    /// Build-step verdict about the bundle.
    #[serde(default = "default_bundle")]
    pub bundle: BundleStatus,
    /// Set to route turns through the remote inference proxy.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    /// Optional sidecar resource (URL or file path) with operator-facing
    /// diagnostics, fetched best-effort when the static fallback engages.
    #[serde(default)]
    pub diagnostic_sidecar: Option<String>,
}

fn default_bundle() -> BundleStatus {
    BundleStatus::Available
}

impl BridgeConfig {
    pub fn new(module: ModuleSource) -> Self {
        Self {
            module,
            bundle: BundleStatus::Available,
            remote: None,
            diagnostic_sidecar: None,
        }
    }

    pub fn with_bundle(mut self, bundle: BundleStatus) -> Self {
        self.bundle = bundle;
        self
    }

    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_diagnostic_sidecar(mut self, location: impl Into<String>) -> Self {
        self.diagnostic_sidecar = Some(location.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"module":{"path":"/srv/kernel.wasm"}}"#).unwrap();
        assert_eq!(config.bundle, BundleStatus::Available);
        assert!(config.remote.is_none());
        assert!(config.diagnostic_sidecar.is_none());
    }

    #[test]
    fn test_bundle_status_round_trips() {
        let status = BundleStatus::Stub("placeholder build".into());
        let json = serde_json::to_string(&status).unwrap();
        let back: BundleStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
