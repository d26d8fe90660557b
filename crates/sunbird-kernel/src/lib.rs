//! Kernel module hosting for the Sunbird bridge.
//!
//! This crate owns the host side of the module boundary:
//!
//! ```text
//! ModuleSource → load_kernel → KernelInstance::execute / configure / reset
//! ```
//!
//! [`load_kernel`] fetches and compiles the module (streaming first, full
//! buffer on retry), wires the [syscall shim](shim) into its imports,
//! resolves the exported entry points under their accepted spellings, and
//! runs `init` exactly once. The resulting [`KernelInstance`] marshals
//! program text and answers across the module's linear memory.
//!
//! Linear-memory views are never cached: wasmi hands out borrows tied to
//! the store, so every read and write re-acquires the view, which is what
//! keeps buffer access correct across memory growth.

mod exports;
mod instance;
mod loader;
mod shim;

pub use exports::{ExportTable, KernelOp};
pub use instance::{KernelInstance, OUTPUT_CAPACITY};
pub use loader::{load_kernel, ModuleSource};
pub use shim::ProcessExit;
