// ============================================================
// Layer 5: Compute Backend Selection
// ============================================================
// Chosen at build time:
//
//   --features ndarray   (default) CPU, pure Rust
//   --features wgpu      GPU through WebGPU; wins if both are on
//
// Training wraps the compute backend in Autodiff; inference and
// evaluation run on the compute backend directly.

use burn::prelude::Backend;

#[cfg(feature = "wgpu")]
pub type ComputeBackend = burn::backend::Wgpu;

#[cfg(all(feature = "ndarray", not(feature = "wgpu")))]
pub type ComputeBackend = burn::backend::NdArray;

#[cfg(not(any(feature = "ndarray", feature = "wgpu")))]
compile_error!("enable at least one backend feature: `ndarray` or `wgpu`");

pub type TrainBackend = burn::backend::Autodiff<ComputeBackend>;

pub fn default_device() -> <ComputeBackend as Backend>::Device {
    Default::default()
}

/// Recorded in checkpoints; informational only.
pub fn compute_target() -> &'static str {
    if cfg!(feature = "wgpu") {
        "wgpu"
    } else {
        "cpu"
    }
}
