pub mod fusion_generator;
pub mod generator;
mod layers;
pub mod spectral;

pub use fusion_generator::{FusionGenerator, FusionGeneratorConfig};
pub use generator::{DownsampleConfig, UnetGenerator, UnetGeneratorConfig, UpsampleConfig};
pub use spectral::{SpectralNorm, SpectralNormConfig};
