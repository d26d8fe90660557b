//! Capability report for the loaded kernel module.

use serde::{Deserialize, Serialize};

/// What the active kernel can do.
///
/// Computed once after a successful load and immutable afterwards. The
/// chat layer reads this to adapt its copy ("accelerated kernel",
/// "compatibility mode", …); nothing inside the bridge consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// A native kernel module was loaded and initialized.
    pub has_native_module: bool,
    /// The module reports vector-extension support.
    pub has_vector_extension: bool,
    /// Parallel lanes of the vector extension; 1 when absent or unknown.
    pub vector_lane_width: u32,
}

impl Capabilities {
    /// The report for a process running without a kernel module.
    pub fn without_module() -> Self {
        Self {
            has_native_module: false,
            has_vector_extension: false,
            vector_lane_width: 1,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::without_module()
    }
}
