//! Module loading: fetch, two-path compilation, instantiation, init.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sunbird_types::{BridgeError, Result};
use tracing::{info, warn};
use wasmi::{Engine, Linker, Module, Store};

use crate::exports::ExportTable;
use crate::instance::KernelInstance;
use crate::shim::{self, ShimState};

/// Where the kernel module binary comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleSource {
    /// Raw module bytes already in memory.
    Bytes(Vec<u8>),
    /// A file on the local filesystem.
    Path(PathBuf),
    /// An HTTP(S) endpoint serving the binary.
    Url(String),
}

/// Fetch, compile, instantiate and initialize the kernel module.
///
/// `init` runs exactly once here; a non-zero status is a fatal load error
/// carrying the code. Capabilities are probed immediately after.
pub async fn load_kernel(source: &ModuleSource) -> Result<KernelInstance> {
    let bytes = fetch(source).await?;
    let engine = Engine::default();
    let module = compile(&engine, &bytes)?;

    let mut store = Store::new(&engine, ShimState::new());
    let mut linker = Linker::<ShimState>::new(&engine);
    shim::register(&mut linker)
        .map_err(|error| BridgeError::Load(format!("syscall shim registration failed: {error}")))?;

    let instance = linker
        .instantiate(&mut store, &module)
        .map_err(|error| BridgeError::Load(format!("module instantiation failed: {error}")))?
        .start(&mut store)
        .map_err(|error| BridgeError::Load(format!("module start failed: {error}")))?;

    let memory = instance
        .get_memory(&store, "memory")
        .ok_or_else(|| BridgeError::Load("module has no `memory` export".to_string()))?;

    let exports = ExportTable::resolve(&store, &instance)?;

    let status = exports
        .init
        .call(&mut store, ())
        .map_err(|error| BridgeError::Load(format!("kernel init trapped: {error}")))?;
    if status != 0 {
        return Err(BridgeError::Load(format!(
            "kernel init returned status {status}"
        )));
    }
    info!("kernel module loaded and initialized");

    Ok(KernelInstance::from_parts(store, memory, exports))
}

async fn fetch(source: &ModuleSource) -> Result<Vec<u8>> {
    match source {
        ModuleSource::Bytes(bytes) => Ok(bytes.clone()),
        ModuleSource::Path(path) => std::fs::read(path).map_err(|error| {
            BridgeError::Load(format!(
                "failed to read module at {}: {error}",
                path.display()
            ))
        }),
        ModuleSource::Url(url) => download(url).await,
    }
}

async fn download(url: &str) -> Result<Vec<u8>> {
    info!(url, "downloading kernel module");
    let response = reqwest::get(url)
        .await
        .map_err(|error| BridgeError::Load(format!("module download failed: {error}")))?;
    if !response.status().is_success() {
        return Err(BridgeError::Load(format!(
            "module download failed with status {}",
            response.status()
        )));
    }
    if let Some(content_type) = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        if content_type != "application/wasm" {
            // Misconfigured proxies routinely mislabel the binary; the
            // buffered compile path below copes with whatever arrived.
            warn!(content_type, "unexpected content type for kernel module");
        }
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|error| BridgeError::Load(format!("module download was interrupted: {error}")))?;
    Ok(bytes.to_vec())
}

/// Streaming compilation first, full-buffer retry second.
///
/// The retry is mandatory: streaming failures are common (truncated
/// caches, proxies rewriting responses) and must not be fatal on their
/// own.
fn compile(engine: &Engine, bytes: &[u8]) -> Result<Module> {
    match Module::new_streaming(engine, bytes) {
        Ok(module) => Ok(module),
        Err(stream_error) => {
            warn!(error = %stream_error, "streaming compilation failed; retrying from buffer");
            Module::new(engine, bytes).map_err(|buffer_error| {
                BridgeError::Load(format!(
                    "module compilation failed: {buffer_error} (streaming attempt: {stream_error})"
                ))
            })
        }
    }
}
