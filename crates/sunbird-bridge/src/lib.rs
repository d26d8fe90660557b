//! Unified call surface over the kernel backends.
//!
//! The chat layer talks to a [`Bridge`]; the bridge talks to exactly one
//! [`Backend`], selected lazily on the first call and memoized for the
//! process lifetime:
//!
//! - **Native** — the loaded kernel module, behind a single-flight queue.
//! - **Remote** — an inference proxy that falls back to its local
//!   delegate on any transport failure; never fails outright.
//! - **Static** — a fixed diagnostic answer used when the module bundle
//!   is missing, a stub, or failed to load; never fails either.
//!
//! There is no automatic re-probe or upgrade path: a load failure turns
//! into a permanent static fallback for the life of the process.

mod backend;
mod bridge;
mod config;
mod fallback;
mod remote;

pub use backend::{Backend, BackendKind, NativeKernel};
pub use bridge::Bridge;
pub use config::{BridgeConfig, BundleStatus, RemoteConfig};
pub use fallback::StaticFallback;
pub use remote::{RemoteProxy, LOCAL_FALLBACK_NOTE};
