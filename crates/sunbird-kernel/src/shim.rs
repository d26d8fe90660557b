//! Minimal process-environment shim for the kernel module.
//!
//! The module is built against a small `wasi_snapshot_preview1` surface so
//! it can run standalone; this shim answers those calls with host
//! primitives only — no real file system, process table or network is
//! behind it. Descriptor 1 routes to the informational log sink and
//! descriptor 2 to the warning sink; everything else about the "process"
//! is deliberately empty.
//!
//! Handlers that touch guest memory return `EINVAL` when the memory
//! export is not reachable yet: the loader may in principle trigger shim
//! calls during the instantiation handshake, before memory is attached,
//! and that must stay recoverable.

use std::fmt;
use std::time::Instant;

use tracing::{info, warn};
use wasmi::{Caller, Extern, Linker, Memory};

/// Import module name the kernel links against.
pub(crate) const SHIM_MODULE: &str = "wasi_snapshot_preview1";

const ERRNO_SUCCESS: i32 = 0;
const ERRNO_BADF: i32 = 8;
const ERRNO_INVAL: i32 = 28;

/// `fdstat` filetype byte for a character device.
const FILETYPE_CHARACTER_DEVICE: u8 = 2;
const FDSTAT_SIZE: usize = 24;

/// Raised when the module calls `proc_exit`.
///
/// Fatal for the current execution only: the error aborts the in-flight
/// call and leaves the host process alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: u32,
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kernel module requested process exit with code {}", self.code)
    }
}

impl wasmi::core::HostError for ProcessExit {}

/// Fallback generator for `random_get` when OS entropy is unavailable.
///
/// splitmix64 — weak but serviceable; the syscall contract is "never
/// fail", not "always cryptographic".
#[derive(Debug)]
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        Self {
            state: seed | 1, // never all-zero
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    fn fill(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

/// Host state carried by the wasmi store.
#[derive(Debug)]
pub(crate) struct ShimState {
    /// Epoch for `clock_time_get`; the absolute value is arbitrary.
    epoch: Instant,
    fallback_rng: SplitMix64,
}

impl ShimState {
    pub(crate) fn new() -> Self {
        let epoch = Instant::now();
        Self {
            epoch,
            fallback_rng: SplitMix64::new(0x5eed_c0de ^ epoch.elapsed().as_nanos() as u64),
        }
    }
}

fn memory_of(caller: &mut Caller<'_, ShimState>) -> Option<Memory> {
    caller.get_export("memory").and_then(Extern::into_memory)
}

/// Write `bytes` into guest memory; false on out-of-bounds.
fn write_guest(
    memory: &Memory,
    caller: &mut Caller<'_, ShimState>,
    addr: i32,
    bytes: &[u8],
) -> bool {
    let data = memory.data_mut(&mut *caller);
    let start = addr as u32 as usize;
    match data.get_mut(start..start + bytes.len()) {
        Some(slice) => {
            slice.copy_from_slice(bytes);
            true
        }
        None => false,
    }
}

fn read_u32(data: &[u8], addr: usize) -> Option<u32> {
    let slice = data.get(addr..addr + 4)?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(slice);
    Some(u32::from_le_bytes(buf))
}

/// Register the shim's syscall handlers on the linker.
pub(crate) fn register(
    linker: &mut Linker<ShimState>,
) -> Result<(), wasmi::errors::LinkerError> {
    // Zero arguments, zero environment variables. The sizes calls write
    // two zero counters; the getters have nothing to copy.
    linker.func_wrap(
        SHIM_MODULE,
        "args_sizes_get",
        |mut caller: Caller<'_, ShimState>, argc_ptr: i32, argv_buf_size_ptr: i32| -> i32 {
            let Some(memory) = memory_of(&mut caller) else {
                return ERRNO_INVAL;
            };
            if !write_guest(&memory, &mut caller, argc_ptr, &0u32.to_le_bytes())
                || !write_guest(&memory, &mut caller, argv_buf_size_ptr, &0u32.to_le_bytes())
            {
                return ERRNO_INVAL;
            }
            ERRNO_SUCCESS
        },
    )?;
    linker.func_wrap(
        SHIM_MODULE,
        "args_get",
        |_caller: Caller<'_, ShimState>, _argv_ptr: i32, _argv_buf_ptr: i32| -> i32 {
            ERRNO_SUCCESS
        },
    )?;
    linker.func_wrap(
        SHIM_MODULE,
        "environ_sizes_get",
        |mut caller: Caller<'_, ShimState>, count_ptr: i32, buf_size_ptr: i32| -> i32 {
            let Some(memory) = memory_of(&mut caller) else {
                return ERRNO_INVAL;
            };
            if !write_guest(&memory, &mut caller, count_ptr, &0u32.to_le_bytes())
                || !write_guest(&memory, &mut caller, buf_size_ptr, &0u32.to_le_bytes())
            {
                return ERRNO_INVAL;
            }
            ERRNO_SUCCESS
        },
    )?;
    linker.func_wrap(
        SHIM_MODULE,
        "environ_get",
        |_caller: Caller<'_, ShimState>, _environ_ptr: i32, _buf_ptr: i32| -> i32 {
            ERRNO_SUCCESS
        },
    )?;

    // Std descriptors present as character devices; nothing else exists.
    linker.func_wrap(
        SHIM_MODULE,
        "fd_fdstat_get",
        |mut caller: Caller<'_, ShimState>, fd: i32, stat_ptr: i32| -> i32 {
            if !(0..=2).contains(&fd) {
                return ERRNO_BADF;
            }
            let Some(memory) = memory_of(&mut caller) else {
                return ERRNO_INVAL;
            };
            let mut stat = [0u8; FDSTAT_SIZE];
            stat[0] = FILETYPE_CHARACTER_DEVICE;
            if !write_guest(&memory, &mut caller, stat_ptr, &stat) {
                return ERRNO_INVAL;
            }
            ERRNO_SUCCESS
        },
    )?;
    linker.func_wrap(
        SHIM_MODULE,
        "fd_close",
        |_caller: Caller<'_, ShimState>, fd: i32| -> i32 {
            if (0..=2).contains(&fd) {
                ERRNO_SUCCESS
            } else {
                ERRNO_BADF
            }
        },
    )?;

    // Gathered write: descriptor 1 → info sink, 2 → warn sink. The exact
    // byte count goes back through `nwritten` — the module checks it for
    // partial writes.
    linker.func_wrap(
        SHIM_MODULE,
        "fd_write",
        |mut caller: Caller<'_, ShimState>,
         fd: i32,
         iovs_ptr: i32,
         iovs_len: i32,
         nwritten_ptr: i32|
         -> i32 {
            if fd != 1 && fd != 2 {
                return ERRNO_BADF;
            }
            let Some(memory) = memory_of(&mut caller) else {
                return ERRNO_INVAL;
            };
            let mut gathered = Vec::new();
            {
                let data = memory.data(&caller);
                for index in 0..iovs_len as u32 as usize {
                    let head = iovs_ptr as u32 as usize + index * 8;
                    let Some(ptr) = read_u32(data, head) else {
                        return ERRNO_INVAL;
                    };
                    let Some(len) = read_u32(data, head + 4) else {
                        return ERRNO_INVAL;
                    };
                    let start = ptr as usize;
                    let Some(span) = data.get(start..start + len as usize) else {
                        return ERRNO_INVAL;
                    };
                    gathered.extend_from_slice(span);
                }
            }
            let text = String::from_utf8_lossy(&gathered);
            let text = text.trim_end_matches('\n');
            if !text.is_empty() {
                if fd == 1 {
                    info!(target: "sunbird_kernel", "{text}");
                } else {
                    warn!(target: "sunbird_kernel", "{text}");
                }
            }
            let written = gathered.len() as u32;
            if !write_guest(&memory, &mut caller, nwritten_ptr, &written.to_le_bytes()) {
                return ERRNO_INVAL;
            }
            ERRNO_SUCCESS
        },
    )?;

    // Never fails: OS entropy when available, splitmix64 otherwise.
    linker.func_wrap(
        SHIM_MODULE,
        "random_get",
        |mut caller: Caller<'_, ShimState>, buf_ptr: i32, buf_len: i32| -> i32 {
            let len = buf_len as u32 as usize;
            let mut bytes = vec![0u8; len];
            if getrandom::getrandom(&mut bytes).is_err() {
                caller.data_mut().fallback_rng.fill(&mut bytes);
            }
            let Some(memory) = memory_of(&mut caller) else {
                return ERRNO_INVAL;
            };
            if !write_guest(&memory, &mut caller, buf_ptr, &bytes) {
                return ERRNO_INVAL;
            }
            ERRNO_SUCCESS
        },
    )?;

    // Monotonic nanoseconds since an arbitrary epoch, regardless of the
    // requested clock id. Sub-millisecond precision is not promised.
    linker.func_wrap(
        SHIM_MODULE,
        "clock_time_get",
        |mut caller: Caller<'_, ShimState>, _clock_id: i32, _precision: i64, time_ptr: i32| -> i32 {
            let nanos = caller.data().epoch.elapsed().as_nanos() as u64;
            let Some(memory) = memory_of(&mut caller) else {
                return ERRNO_INVAL;
            };
            if !write_guest(&memory, &mut caller, time_ptr, &nanos.to_le_bytes()) {
                return ERRNO_INVAL;
            }
            ERRNO_SUCCESS
        },
    )?;

    linker.func_wrap(
        SHIM_MODULE,
        "proc_exit",
        |_caller: Caller<'_, ShimState>, code: i32| -> Result<(), wasmi::Error> {
            Err(wasmi::Error::host(ProcessExit { code: code as u32 }))
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splitmix_fill_covers_uneven_lengths() {
        let mut rng = SplitMix64::new(42);
        let mut buf = [0u8; 13];
        rng.fill(&mut buf);
        // 13 bytes from two rounds; at least one must be non-zero.
        assert!(buf.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_splitmix_sequences_differ_by_seed() {
        let mut a = SplitMix64::new(1);
        let mut b = SplitMix64::new(2);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn test_process_exit_display_mentions_code() {
        let exit = ProcessExit { code: 7 };
        assert!(exit.to_string().contains('7'));
    }
}
