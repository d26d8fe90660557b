//! One-shot backend selection and the caller-facing surface.

use std::time::Duration;

use sunbird_kernel::load_kernel;
use sunbird_types::{BridgeError, Capabilities, KernelControls, Result, TurnRequest};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::backend::{Backend, NativeKernel};
use crate::config::{BridgeConfig, BundleStatus, RemoteConfig};
use crate::fallback::StaticFallback;
use crate::remote::RemoteProxy;

/// Upper bound on sidecar diagnostics carried into fallback answers.
const SIDECAR_MAX_BYTES: usize = 2048;

/// The caller-facing bridge.
///
/// Explicitly constructed and dependency-injectable: production code
/// builds one from a [`BridgeConfig`], tests can inject a ready-made
/// [`Backend`]. Selection runs once, lazily, on the first call; the
/// chosen backend is immutable afterwards.
pub struct Bridge {
    config: Option<BridgeConfig>,
    backend: OnceCell<Backend>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config: Some(config),
            backend: OnceCell::new(),
        }
    }

    /// Build a bridge around an already-selected backend.
    pub fn with_backend(backend: Backend) -> Self {
        Self {
            config: None,
            backend: OnceCell::new_with(Some(backend)),
        }
    }

    /// The active backend, selecting it on first use.
    pub async fn backend(&self) -> &Backend {
        self.backend
            .get_or_init(|| async {
                match &self.config {
                    Some(config) => select_backend(config).await,
                    // Unreachable in practice: a bridge without a config
                    // was built with a pre-selected backend.
                    None => Backend::Static(StaticFallback::new(
                        "bridge was constructed without a configuration",
                    )),
                }
            })
            .await
    }

    pub async fn capabilities(&self) -> Capabilities {
        self.backend().await.capabilities()
    }

    /// Answer one conversational turn.
    pub async fn ask(&self, turn: &TurnRequest) -> Result<String> {
        self.backend().await.ask(turn).await
    }

    pub async fn configure(&self, controls: &KernelControls) -> Result<()> {
        self.backend().await.configure(controls).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.backend().await.reset().await
    }
}

/// Selection logic; runs exactly once per bridge.
async fn select_backend(config: &BridgeConfig) -> Backend {
    match &config.bundle {
        BundleStatus::Stub(reason) => {
            warn!(reason = %reason, "kernel bundle is a stub build; using static fallback");
            return static_backend(
                config,
                format!("the kernel bundle is a placeholder build ({reason})"),
            )
            .await;
        }
        BundleStatus::Missing(reason) => {
            warn!(reason = %reason, "kernel bundle is missing; using static fallback");
            return static_backend(
                config,
                format!("the kernel bundle was not produced ({reason})"),
            )
            .await;
        }
        BundleStatus::Available => {}
    }

    match load_kernel(&config.module).await {
        Ok(kernel) => {
            let capabilities = kernel.capabilities();
            info!(?capabilities, "native kernel backend selected");
            let native = Backend::Native(NativeKernel::new(kernel));
            match &config.remote {
                Some(remote) => wrap_in_proxy(remote, native),
                None => native,
            }
        }
        Err(error) => {
            warn!(error = %error, "kernel load failed; using static fallback");
            static_backend(config, error.to_string()).await
        }
    }
}

fn wrap_in_proxy(remote: &RemoteConfig, delegate: Backend) -> Backend {
    match build_remote_client(remote) {
        Ok(client) => {
            info!(endpoint = %remote.endpoint, "remote inference proxy enabled");
            Backend::Remote(RemoteProxy::new(remote.endpoint.clone(), client, delegate))
        }
        Err(error) => {
            warn!(error = %error, "remote proxy client unavailable; staying local");
            delegate
        }
    }
}

fn build_remote_client(remote: &RemoteConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(remote.timeout_ms))
        .build()
        .map_err(|error| BridgeError::Transport(format!("failed to build HTTP client: {error}")))
}

async fn static_backend(config: &BridgeConfig, reason: String) -> Backend {
    let mut fallback = StaticFallback::new(reason);
    if let Some(location) = &config.diagnostic_sidecar {
        if let Some(text) = fetch_sidecar(location).await {
            fallback = fallback.with_sidecar(text);
        }
    }
    Backend::Static(fallback)
}

/// Best-effort fetch of the sidecar diagnostic resource.
async fn fetch_sidecar(location: &str) -> Option<String> {
    let text = if location.starts_with("http://") || location.starts_with("https://") {
        let response = reqwest::get(location).await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.text().await.ok()?
    } else {
        std::fs::read_to_string(location).ok()?
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut cut = trimmed.len().min(SIDECAR_MAX_BYTES);
    while cut > 0 && !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    Some(trimmed[..cut].to_string())
}
