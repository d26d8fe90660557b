//! Kernel tuning controls and their fixed-point wire encoding.
//!
//! The kernel's `configure` entry point accepts integers only, so every
//! control is clamped and quantized on the host side before it crosses the
//! module boundary. Rates and targets travel as thousandths, temperature
//! as hundredths; an unset target is the [`TARGET_UNSET`] sentinel.

use serde::{Deserialize, Serialize};

/// Wire sentinel for an unset target value.
pub const TARGET_UNSET: i32 = -1;

/// Caller-facing kernel controls.
///
/// Values outside the documented bounds are accepted here and clamped
/// during [`KernelControls::encode`]; the kernel never sees an
/// out-of-range integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelControls {
    /// Upward adaptation rate, bounded to `[0, 2]`.
    pub rate_up: f64,
    /// Downward adaptation rate, bounded to `[0, 2]`.
    pub rate_down: f64,
    /// Optional upward target, bounded to `[-10, 10]`.
    pub target_up: Option<f64>,
    /// Optional downward target, bounded to `[0, 1]`.
    pub target_down: Option<f64>,
    /// Sampling temperature, bounded to `[0.1, 2.5]`.
    pub temperature: f64,
    /// Candidate pool size, bounded to `[1, 64]`.
    pub top_k: u32,
    /// Whether beam selection is enabled.
    pub beam: bool,
}

impl Default for KernelControls {
    fn default() -> Self {
        Self {
            rate_up: 0.25,
            rate_down: 0.2,
            target_up: None,
            target_down: None,
            temperature: 0.85,
            top_k: 4,
            beam: true,
        }
    }
}

/// The fixed-point form passed to the kernel's `configure` export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedControls {
    pub rate_up_milli: i32,
    pub rate_down_milli: i32,
    pub target_up_milli: i32,
    pub target_down_milli: i32,
    pub temperature_centi: i32,
    pub top_k: i32,
    pub beam: i32,
}

impl EncodedControls {
    /// The encoded fields in the order the `configure` export expects them.
    pub fn as_args(&self) -> (i32, i32, i32, i32, i32, i32, i32) {
        (
            self.rate_up_milli,
            self.rate_down_milli,
            self.target_up_milli,
            self.target_down_milli,
            self.temperature_centi,
            self.top_k,
            self.beam,
        )
    }
}

/// Clamp with a defined answer for NaN: the lower bound.
fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        return lo;
    }
    value.clamp(lo, hi)
}

fn milli(value: f64, lo: f64, hi: f64) -> i32 {
    (clamp(value, lo, hi) * 1000.0).round() as i32
}

impl KernelControls {
    /// Clamp and quantize every control into the integer wire form.
    ///
    /// The wire format reserves negative target values for "unset", so a
    /// *set* `target_up` floors at 0 on the wire even though host state
    /// accepts values down to −10.
    pub fn encode(&self) -> EncodedControls {
        EncodedControls {
            rate_up_milli: milli(self.rate_up, 0.0, 2.0),
            rate_down_milli: milli(self.rate_down, 0.0, 2.0),
            target_up_milli: match self.target_up {
                Some(target) => milli(target, -10.0, 10.0).max(0),
                None => TARGET_UNSET,
            },
            target_down_milli: match self.target_down {
                Some(target) => milli(target, 0.0, 1.0),
                None => TARGET_UNSET,
            },
            temperature_centi: (clamp(self.temperature, 0.1, 2.5) * 100.0).round() as i32,
            top_k: self.top_k.clamp(1, 64) as i32,
            beam: i32::from(self.beam),
        }
    }
}
