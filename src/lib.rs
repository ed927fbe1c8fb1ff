pub mod error;
pub mod fusion;
pub mod model;
pub mod utils;
#[cfg(feature = "wasm")]
mod wasm;

pub use error::{FireGanError, Result};
pub use fusion::{FireGan, FireGanConfig, FusionOutput};

#[cfg(feature = "wgpu")]
pub type MyBackend = burn::backend::Wgpu<f32>;
#[cfg(not(feature = "wgpu"))]
pub type MyBackend = burn::backend::NdArray<f32>;
