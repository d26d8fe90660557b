//! Export-name alias resolution.
//!
//! Toolchains disagree about decoration: emscripten-style builds prefix
//! every export with an underscore, wasi-sdk builds do not, and the
//! allocator pair may surface as plain libc `malloc`/`free`. Each logical
//! operation therefore resolves through a priority-ordered alias list,
//! once, at load time. A required operation with no accepted spelling
//! present fails the load.

use sunbird_types::BridgeError;
use wasmi::{Instance, Store, TypedFunc, WasmParams, WasmResults};

use crate::shim::ShimState;

/// Parameter tuple of the `configure` export.
pub(crate) type ConfigureParams = (i32, i32, i32, i32, i32, i32, i32);

/// The kernel's logical operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelOp {
    Init,
    Reset,
    Execute,
    Configure,
    ProbeSimd,
    LaneWidth,
    Allocate,
    Free,
}

impl KernelOp {
    /// Accepted export spellings, in priority order.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Init => &["sunbird_kernel_init", "_sunbird_kernel_init"],
            Self::Reset => &["sunbird_kernel_reset", "_sunbird_kernel_reset"],
            Self::Execute => &["sunbird_kernel_execute", "_sunbird_kernel_execute"],
            Self::Configure => &["sunbird_kernel_configure", "_sunbird_kernel_configure"],
            Self::ProbeSimd => &["sunbird_kernel_has_simd", "_sunbird_kernel_has_simd"],
            Self::LaneWidth => &["sunbird_kernel_lane_width", "_sunbird_kernel_lane_width"],
            Self::Allocate => &[
                "sunbird_kernel_alloc",
                "_sunbird_kernel_alloc",
                "malloc",
                "_malloc",
            ],
            Self::Free => &[
                "sunbird_kernel_free",
                "_sunbird_kernel_free",
                "free",
                "_free",
            ],
        }
    }

    /// Logical name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Reset => "reset",
            Self::Execute => "execute",
            Self::Configure => "configure",
            Self::ProbeSimd => "probe-simd",
            Self::LaneWidth => "lane-width",
            Self::Allocate => "allocate",
            Self::Free => "free",
        }
    }
}

/// Resolved entry points of a loaded module.
///
/// Built once at load time; the probe pair is optional and its absence
/// degrades capabilities instead of failing the load.
#[derive(Debug)]
pub struct ExportTable {
    pub(crate) init: TypedFunc<(), i32>,
    pub(crate) reset: TypedFunc<(), i32>,
    pub(crate) execute: TypedFunc<(i32, i32, i32), i32>,
    pub(crate) configure: TypedFunc<ConfigureParams, i32>,
    pub(crate) allocate: TypedFunc<i32, i32>,
    pub(crate) free: TypedFunc<i32, ()>,
    pub(crate) probe_simd: Option<TypedFunc<(), i32>>,
    pub(crate) lane_width: Option<TypedFunc<(), i32>>,
}

impl ExportTable {
    pub(crate) fn resolve(
        store: &Store<ShimState>,
        instance: &Instance,
    ) -> Result<Self, BridgeError> {
        Ok(Self {
            init: required(store, instance, KernelOp::Init)?,
            reset: required(store, instance, KernelOp::Reset)?,
            execute: required(store, instance, KernelOp::Execute)?,
            configure: required(store, instance, KernelOp::Configure)?,
            allocate: required(store, instance, KernelOp::Allocate)?,
            free: required(store, instance, KernelOp::Free)?,
            probe_simd: lookup(store, instance, KernelOp::ProbeSimd),
            lane_width: lookup(store, instance, KernelOp::LaneWidth),
        })
    }
}

/// First alias that exists *and* carries the expected signature wins.
fn lookup<P, R>(
    store: &Store<ShimState>,
    instance: &Instance,
    op: KernelOp,
) -> Option<TypedFunc<P, R>>
where
    P: WasmParams,
    R: WasmResults,
{
    for alias in op.aliases() {
        if let Some(func) = instance.get_func(store, alias) {
            if let Ok(typed) = func.typed::<P, R>(store) {
                return Some(typed);
            }
        }
    }
    None
}

fn required<P, R>(
    store: &Store<ShimState>,
    instance: &Instance,
    op: KernelOp,
) -> Result<TypedFunc<P, R>, BridgeError>
where
    P: WasmParams,
    R: WasmResults,
{
    lookup(store, instance, op).ok_or_else(|| {
        BridgeError::Load(format!(
            "kernel export `{}` not found under any accepted name ({})",
            op.name(),
            op.aliases().join(", "),
        ))
    })
}
