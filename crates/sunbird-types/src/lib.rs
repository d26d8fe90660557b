//! Shared types for the Sunbird kernel execution bridge.
//!
//! This crate defines the kernel control surface, the capability report,
//! the conversational turn types handed in by the chat layer, and the
//! error taxonomy used across all bridge stages.

mod capability;
mod controls;
mod error;
mod turn;

pub use capability::Capabilities;
pub use controls::{EncodedControls, KernelControls, TARGET_UNSET};
pub use error::{BridgeError, ExecFailure};
pub use turn::{AttachmentDescriptor, ContextSnippet, TurnRequest, DEFAULT_MODE};

/// Result type used throughout the bridge.
pub type Result<T> = std::result::Result<T, BridgeError>;
