//! A loaded, initialized kernel instance and its call surface.

use sunbird_types::{
    BridgeError, Capabilities, ExecFailure, KernelControls, Result,
};
use tracing::{debug, warn};
use wasmi::{Memory, Store};

use crate::exports::ExportTable;
use crate::shim::{ProcessExit, ShimState};

/// Fixed capacity of the kernel's answer buffer, in bytes.
pub const OUTPUT_CAPACITY: u32 = 8192;

/// Returned in place of an empty kernel answer.
const EMPTY_OUTPUT_NOTICE: &str = "kernel finished without producing output.";

/// A ready-to-call kernel module.
///
/// Owns the wasmi store (and with it the module's linear memory) for the
/// process lifetime; the module binary is never reloaded. `reset` asks
/// the module to clear its internal state, it does not re-instantiate.
#[derive(Debug)]
pub struct KernelInstance {
    store: Store<ShimState>,
    memory: Memory,
    exports: ExportTable,
    capabilities: Capabilities,
    alloc_count: u64,
    free_count: u64,
}

impl KernelInstance {
    pub(crate) fn from_parts(
        mut store: Store<ShimState>,
        memory: Memory,
        exports: ExportTable,
    ) -> Self {
        let capabilities = probe_capabilities(&mut store, &exports);
        Self {
            store,
            memory,
            exports,
            capabilities,
            alloc_count: 0,
            free_count: 0,
        }
    }

    /// Capability report computed once after load.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// `(successful allocations, successful frees)` over the instance
    /// lifetime. The module is never reloaded, so any difference between
    /// the two is a buffer leaked for good.
    pub fn alloc_stats(&self) -> (u64, u64) {
        (self.alloc_count, self.free_count)
    }

    /// Run one program to completion and return its textual output.
    ///
    /// Both buffers are freed on every exit path — success, kernel error
    /// or trap.
    pub fn execute(&mut self, program: &str) -> Result<String> {
        let mut encoded = program.as_bytes().to_vec();
        encoded.push(0);

        let input_ptr = self.allocate("program", encoded.len() as i32)?;
        let output_ptr = match self.allocate("output", OUTPUT_CAPACITY as i32) {
            Ok(ptr) => ptr,
            Err(error) => {
                self.release(input_ptr);
                return Err(error);
            }
        };

        let outcome = self.run(input_ptr, output_ptr, &encoded);
        self.release(input_ptr);
        self.release(output_ptr);
        outcome
    }

    fn run(&mut self, input_ptr: i32, output_ptr: i32, encoded: &[u8]) -> Result<String> {
        // Copy through a freshly acquired view: the second allocation may
        // have grown memory since the first buffer was handed out, and a
        // stale view must never be written through.
        {
            let data = self.memory.data_mut(&mut self.store);
            let start = input_ptr as u32 as usize;
            let Some(dest) = data.get_mut(start..start + encoded.len()) else {
                return Err(BridgeError::Execution(ExecFailure::INVALID_ARGUMENTS));
            };
            dest.copy_from_slice(encoded);
        }

        let status = self
            .exports
            .execute
            .call(
                &mut self.store,
                (input_ptr, output_ptr, OUTPUT_CAPACITY as i32),
            )
            .map_err(|error| map_trap("execute", &error))?;

        if status < 0 {
            return Err(BridgeError::Execution(ExecFailure(status)));
        }

        let written = (status as u32).min(OUTPUT_CAPACITY) as usize;
        let data = self.memory.data(&self.store);
        let start = output_ptr as u32 as usize;
        let Some(bytes) = data.get(start..start + written) else {
            return Err(BridgeError::Execution(ExecFailure::OUTPUT_PREPARATION_FAILED));
        };
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_end();
        if text.is_empty() {
            Ok(EMPTY_OUTPUT_NOTICE.to_string())
        } else {
            Ok(text.to_string())
        }
    }

    /// Clamp, quantize and push the controls into the kernel.
    pub fn configure(&mut self, controls: &KernelControls) -> Result<()> {
        let encoded = controls.encode();
        debug!(?encoded, "configuring kernel");
        let status = self
            .exports
            .configure
            .call(&mut self.store, encoded.as_args())
            .map_err(|error| map_control_trap("configure", &error))?;
        if status != 0 {
            return Err(BridgeError::Configuration {
                operation: "configure",
                status,
            });
        }
        Ok(())
    }

    /// Ask the module to clear its internal state.
    pub fn reset(&mut self) -> Result<()> {
        let status = self
            .exports
            .reset
            .call(&mut self.store, ())
            .map_err(|error| map_control_trap("reset", &error))?;
        if status != 0 {
            return Err(BridgeError::Configuration {
                operation: "reset",
                status,
            });
        }
        Ok(())
    }

    fn allocate(&mut self, what: &'static str, size: i32) -> Result<i32> {
        let ptr = self
            .exports
            .allocate
            .call(&mut self.store, size)
            .map_err(|error| {
                warn!(error = %error, what, "kernel allocator trapped");
                BridgeError::Allocation {
                    what,
                    size: size as u32,
                }
            })?;
        if ptr == 0 {
            return Err(BridgeError::Allocation {
                what,
                size: size as u32,
            });
        }
        self.alloc_count += 1;
        Ok(ptr)
    }

    fn release(&mut self, ptr: i32) {
        if ptr == 0 {
            return;
        }
        match self.exports.free.call(&mut self.store, ptr) {
            Ok(()) => self.free_count += 1,
            Err(error) => warn!(error = %error, ptr, "kernel free trapped; buffer leaked"),
        }
    }
}

/// Probe vector support after init; a failing probe degrades to scalar
/// instead of failing the load.
fn probe_capabilities(store: &mut Store<ShimState>, exports: &ExportTable) -> Capabilities {
    let has_vector_extension = match &exports.probe_simd {
        Some(probe) => match probe.call(&mut *store, ()) {
            Ok(flag) => flag == 1,
            Err(error) => {
                debug!(error = %error, "vector-support probe failed");
                false
            }
        },
        None => false,
    };
    let vector_lane_width = match &exports.lane_width {
        Some(probe) => match probe.call(&mut *store, ()) {
            Ok(width) if width > 0 => width as u32,
            Ok(_) => 1,
            Err(error) => {
                debug!(error = %error, "lane-width probe failed");
                1
            }
        },
        None => 1,
    };
    Capabilities {
        has_native_module: true,
        has_vector_extension,
        vector_lane_width,
    }
}

fn map_trap(operation: &'static str, error: &wasmi::Error) -> BridgeError {
    if let Some(exit) = error.downcast_ref::<ProcessExit>() {
        warn!(code = exit.code, operation, "kernel requested process exit");
    } else {
        warn!(error = %error, operation, "kernel trapped");
    }
    BridgeError::Execution(ExecFailure::RUNTIME_ERROR)
}

fn map_control_trap(operation: &'static str, error: &wasmi::Error) -> BridgeError {
    warn!(error = %error, operation, "kernel trapped");
    BridgeError::Configuration {
        operation,
        status: -1,
    }
}
