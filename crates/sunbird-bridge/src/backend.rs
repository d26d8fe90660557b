//! The closed set of execution backends.
//!
//! Exactly one backend is active per process; every call site matches the
//! enum exhaustively. The set is fixed by design — new strategies are new
//! variants, not subclasses.

use sunbird_kernel::KernelInstance;
use sunbird_types::{BridgeError, Capabilities, KernelControls, Result, TurnRequest};
use tokio::sync::Mutex;

use crate::fallback::StaticFallback;
use crate::remote::RemoteProxy;

/// Which backend answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Native,
    Remote,
    Static,
}

/// One of the three execution strategies.
pub enum Backend {
    Native(NativeKernel),
    Remote(RemoteProxy),
    Static(StaticFallback),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Native(_) => BackendKind::Native,
            Self::Remote(_) => BackendKind::Remote,
            Self::Static(_) => BackendKind::Static,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Self::Native(native) => native.capabilities(),
            Self::Remote(proxy) => proxy.delegate().capabilities(),
            Self::Static(_) => Capabilities::without_module(),
        }
    }

    /// Answer one turn. The static fallback always answers; the remote
    /// proxy recovers through its delegate; only the native path can
    /// return a typed per-call error.
    pub async fn ask(&self, turn: &TurnRequest) -> Result<String> {
        match self {
            Self::Native(native) => native.ask(turn).await,
            Self::Remote(proxy) => proxy.ask(turn).await,
            Self::Static(fallback) => Ok(fallback.answer()),
        }
    }

    pub async fn configure(&self, controls: &KernelControls) -> Result<()> {
        match self {
            Self::Native(native) => native.configure(controls).await,
            Self::Remote(proxy) => proxy.delegate().configure_local(controls).await,
            Self::Static(_) => Ok(()),
        }
    }

    pub async fn reset(&self) -> Result<()> {
        match self {
            Self::Native(native) => native.reset().await,
            Self::Remote(proxy) => proxy.delegate().reset_local().await,
            Self::Static(_) => Ok(()),
        }
    }

    /// Delegate path used by the remote proxy. A proxy never delegates to
    /// another proxy; the guard exists so the type system cannot be used
    /// to build one anyway.
    pub(crate) async fn ask_local(&self, turn: &TurnRequest) -> Result<String> {
        match self {
            Self::Native(native) => native.ask(turn).await,
            Self::Remote(_) => Err(BridgeError::Transport(
                "remote proxy cannot delegate to another proxy".to_string(),
            )),
            Self::Static(fallback) => Ok(fallback.answer()),
        }
    }

    pub(crate) async fn configure_local(&self, controls: &KernelControls) -> Result<()> {
        match self {
            Self::Native(native) => native.configure(controls).await,
            Self::Remote(_) | Self::Static(_) => Ok(()),
        }
    }

    pub(crate) async fn reset_local(&self) -> Result<()> {
        match self {
            Self::Native(native) => native.reset().await,
            Self::Remote(_) | Self::Static(_) => Ok(()),
        }
    }
}

/// The loaded kernel module behind a single-flight queue.
///
/// The module is not reentrant, so at most one `execute`/`configure`/
/// `reset` may be in flight; the tokio mutex is FIFO-fair, which gives
/// later callers their turn in arrival order.
pub struct NativeKernel {
    kernel: Mutex<KernelInstance>,
    capabilities: Capabilities,
}

impl NativeKernel {
    pub fn new(kernel: KernelInstance) -> Self {
        let capabilities = kernel.capabilities();
        Self {
            kernel: Mutex::new(kernel),
            capabilities,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub async fn ask(&self, turn: &TurnRequest) -> Result<String> {
        let program = sunbird_script::render_program(turn);
        let mut kernel = self.kernel.lock().await;
        kernel.execute(&program)
    }

    pub async fn configure(&self, controls: &KernelControls) -> Result<()> {
        let mut kernel = self.kernel.lock().await;
        kernel.configure(controls)
    }

    pub async fn reset(&self) -> Result<()> {
        let mut kernel = self.kernel.lock().await;
        kernel.reset()
    }
}
