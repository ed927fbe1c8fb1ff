//! FIRe-GAN: Generator 1 synthesizes an infrared image from the visible one, Generator 2
//! fuses the pair.

use burn::{
    module::Module,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, NamedMpkFileRecorder, Recorder},
};
use std::path::Path;

use crate::{
    error::{FireGanError, Result},
    model::{
        FusionGenerator, FusionGeneratorConfig, UnetGenerator, UnetGeneratorConfig,
    },
};

const G1_RECORD: &str = "g1";
const G2_RECORD: &str = "g2";

#[derive(Config, Debug)]
pub struct FireGanConfig {
    #[config(default = "UnetGeneratorConfig::firegan()")]
    pub g1: UnetGeneratorConfig,
    #[config(default = "FusionGeneratorConfig::new()")]
    pub g2: FusionGeneratorConfig,
    #[config(default = 384)]
    pub height: usize,
    #[config(default = 512)]
    pub width: usize,
}

impl FireGanConfig {
    pub fn validate(&self) -> Result<()> {
        self.g1.validate()?;
        self.g1.check_input(self.height, self.width)?;
        if self.g2.in_channels != self.g1.in_channels + self.g1.out_channels {
            return Err(FireGanError::ChannelMismatch {
                expected: self.g1.in_channels + self.g1.out_channels,
                actual: self.g2.in_channels,
            });
        }

        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<FireGan<B>> {
        self.validate()?;

        Ok(FireGan {
            g1: self.g1.init(device)?,
            g2: self.g2.init(device),
        })
    }
}

#[derive(Clone, Debug)]
pub struct FusionOutput<B: Backend> {
    pub infrared: Tensor<B, 4>,
    pub fused: Tensor<B, 4>,
}

#[derive(Module, Debug)]
pub struct FireGan<B: Backend> {
    pub g1: UnetGenerator<B>,
    pub g2: FusionGenerator<B>,
}

impl<B: Backend> FireGan<B> {
    pub fn synthesize_infrared(&self, visible: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        self.g1.check_input(visible.dims())?;

        Ok(self.g1.forward(visible))
    }

    pub fn fuse(&self, visible: Tensor<B, 4>, infrared: Tensor<B, 4>) -> Result<Tensor<B, 4>> {
        let [vb, _, vh, vw] = visible.dims();
        let [ib, _, ih, iw] = infrared.dims();
        if (vb, vh, vw) != (ib, ih, iw) {
            return Err(FireGanError::ShapeMismatch {
                visible: visible.dims(),
                infrared: infrared.dims(),
            });
        }

        let input = Tensor::cat(vec![visible, infrared], 1);
        self.g2.check_input(input.dims())?;

        Ok(self.g2.forward(input))
    }

    pub fn fuse_visible(&self, visible: Tensor<B, 4>) -> Result<FusionOutput<B>> {
        let infrared = self.synthesize_infrared(visible.clone())?;
        let fused = self.fuse(visible, infrared.clone())?;

        Ok(FusionOutput { infrared, fused })
    }

    /// Logs both generators' layer trees and parameter counts.
    pub fn summary(&self) {
        tracing::info!("generator 1 (U-Net):\n{}", self.g1);
        tracing::info!(params = self.g1.num_params(), "generator 1");
        tracing::info!("generator 2 (fusion):\n{}", self.g2);
        tracing::info!(
            params = self.g2.num_params(),
            spectral_norm = self.g2.is_spectral(),
            "generator 2"
        );
    }

    /// Loads `g1.mpk` and `g2.mpk` from `dir`.
    pub fn load<P: AsRef<Path>>(self, dir: P, device: &B::Device) -> Result<Self> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let dir = dir.as_ref();

        let record = recorder.load(dir.join(G1_RECORD), device)?;
        let g1 = self.g1.load_record(record);
        let record = recorder.load(dir.join(G2_RECORD), device)?;
        let g2 = self.g2.load_record(record);
        tracing::info!(dir = %dir.display(), "loaded generator weights");

        Ok(Self { g1, g2 })
    }

    pub fn save<P: AsRef<Path>>(self, dir: P) -> Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        recorder.record(self.g1.into_record(), dir.join(G1_RECORD))?;
        recorder.record(self.g2.into_record(), dir.join(G2_RECORD))?;
        tracing::info!(dir = %dir.display(), "saved generator weights");

        Ok(())
    }

    /// In-memory counterpart of [`FireGan::load`], for targets without a file system.
    pub fn load_bytes(self, g1: Vec<u8>, g2: Vec<u8>, device: &B::Device) -> Result<Self> {
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::new();

        let record = recorder.load(g1, device)?;
        let g1 = self.g1.load_record(record);
        let record = recorder.load(g2, device)?;
        let g2 = self.g2.load_record(record);

        Ok(Self { g1, g2 })
    }

    pub fn to_bytes(self) -> Result<(Vec<u8>, Vec<u8>)> {
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::new();

        let g1 = recorder.record(self.g1.into_record(), ())?;
        let g2 = recorder.record(self.g2.into_record(), ())?;

        Ok((g1, g2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{DownsampleConfig, UpsampleConfig},
        MyBackend,
    };
    use burn::tensor::Distribution;

    fn small_config() -> FireGanConfig {
        let g1 = UnetGeneratorConfig::new(
            vec![
                DownsampleConfig::new(4).with_batch_norm(false),
                DownsampleConfig::new(8),
            ],
            vec![UpsampleConfig::new(4).with_dropout(true)],
        );

        FireGanConfig::new()
            .with_g1(g1)
            .with_height(8)
            .with_width(12)
    }

    fn random(dims: [usize; 4]) -> Tensor<MyBackend, 4> {
        Tensor::random(dims, Distribution::Uniform(-1.0, 1.0), &Default::default())
    }

    #[test]
    fn default_config_is_valid() {
        let config = FireGanConfig::new();

        assert_eq!((config.height, config.width), (384, 512));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inconsistent_channels() {
        let config = small_config().with_g2(FusionGeneratorConfig::new().with_in_channels(4));

        assert!(matches!(
            config.validate(),
            Err(FireGanError::ChannelMismatch {
                expected: 6,
                actual: 4
            })
        ));
    }

    #[test]
    fn fuse_visible_produces_both_images() {
        let model = small_config()
            .init::<MyBackend>(&Default::default())
            .unwrap();

        let output = model.fuse_visible(random([2, 3, 8, 12])).unwrap();
        assert_eq!(output.infrared.dims(), [2, 3, 8, 12]);
        assert_eq!(output.fused.dims(), [2, 3, 8, 12]);
    }

    #[test]
    fn fuse_rejects_mismatched_pairs() {
        let model = small_config()
            .init::<MyBackend>(&Default::default())
            .unwrap();

        let result = model.fuse(random([1, 3, 8, 12]), random([1, 3, 8, 8]));
        assert!(matches!(result, Err(FireGanError::ShapeMismatch { .. })));

        let result = model.fuse(random([1, 3, 8, 12]), random([1, 1, 8, 12]));
        assert!(matches!(
            result,
            Err(FireGanError::ChannelMismatch {
                expected: 6,
                actual: 4
            })
        ));
    }

    #[test]
    fn synthesize_rejects_indivisible_input() {
        let model = small_config()
            .init::<MyBackend>(&Default::default())
            .unwrap();

        let result = model.synthesize_infrared(random([1, 3, 6, 12]));
        assert!(matches!(
            result,
            Err(FireGanError::InputNotDivisible { factor: 4, .. })
        ));
    }

    #[test]
    fn weights_round_trip_through_records() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let config = small_config();

        let model = config.init::<MyBackend>(&device).unwrap();
        let input = random([1, 3, 8, 12]);
        let expected = model
            .fuse_visible(input.clone())
            .unwrap()
            .fused
            .into_data()
            .iter::<f32>()
            .collect::<Vec<_>>();
        model.save(dir.path()).unwrap();

        let loaded = config
            .init::<MyBackend>(&device)
            .unwrap()
            .load(dir.path(), &device)
            .unwrap();
        let actual = loaded
            .fuse_visible(input)
            .unwrap()
            .fused
            .into_data()
            .iter::<f32>()
            .collect::<Vec<_>>();

        assert_eq!(expected.len(), actual.len());
        for (e, a) in expected.iter().zip(&actual) {
            assert!((e - a).abs() < 1e-5);
        }
    }

    #[test]
    fn weights_round_trip_through_bytes() {
        let device = Default::default();
        let config = small_config().with_g2(FusionGeneratorConfig::new().with_spectral_norm(true));

        let model = config.init::<MyBackend>(&device).unwrap();
        let input = random([1, 3, 8, 12]);
        let expected = model
            .fuse_visible(input.clone())
            .unwrap()
            .fused
            .into_data()
            .iter::<f32>()
            .collect::<Vec<_>>();
        let (g1, g2) = model.to_bytes().unwrap();

        let loaded = config
            .init::<MyBackend>(&device)
            .unwrap()
            .load_bytes(g1, g2, &device)
            .unwrap();
        let actual = loaded
            .fuse_visible(input)
            .unwrap()
            .fused
            .into_data()
            .iter::<f32>()
            .collect::<Vec<_>>();

        for (e, a) in expected.iter().zip(&actual) {
            assert!((e - a).abs() < 1e-5);
        }
    }

    #[test]
    fn config_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firegan.json");
        let config = small_config();

        config.save(&path).unwrap();
        let loaded = FireGanConfig::load(&path).unwrap();

        assert_eq!(loaded.g1.depth(), 2);
        assert_eq!((loaded.height, loaded.width), (8, 12));
        assert!(!loaded.g2.spectral_norm);
    }
}
