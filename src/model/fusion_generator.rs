//! Generator 2: a shallow stack that fuses `[visible, infrared]` into one RGB image.

use burn::{
    module::Module,
    nn::{BatchNorm, LeakyRelu, LeakyReluConfig},
    prelude::*,
};

use crate::{
    error::{FireGanError, Result},
    model::{
        layers::{batch_norm, FusionConv2d, FusionConvTranspose2d},
        spectral::SpectralNormConfig,
    },
};

#[derive(Module, Debug)]
pub struct FusionGenerator<B: Backend> {
    deconv_1: FusionConvTranspose2d<B>,
    bn_1: BatchNorm<B, 2>,
    conv_2: FusionConv2d<B>,
    bn_2: BatchNorm<B, 2>,
    deconv_3: FusionConvTranspose2d<B>,
    bn_3: BatchNorm<B, 2>,
    conv_4: FusionConv2d<B>,
    bn_4: BatchNorm<B, 2>,
    out_layer: FusionConv2d<B>,
    lrelu: LeakyRelu,
    in_channels: usize,
}
impl<B: Backend> FusionGenerator<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.deconv_1.forward(input); // +4
        let output = self.lrelu.forward(self.bn_1.forward(output));

        let output = self.conv_2.forward(output); // -4
        let output = self.lrelu.forward(self.bn_2.forward(output));

        let output = self.deconv_3.forward(output); // +2
        let output = self.lrelu.forward(self.bn_3.forward(output));

        let output = self.conv_4.forward(output); // -2
        let output = self.lrelu.forward(self.bn_4.forward(output));

        let out = self.out_layer.forward(output);

        burn::tensor::activation::tanh(out)
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn is_spectral(&self) -> bool {
        self.out_layer.is_spectral()
    }

    pub fn check_input(&self, dims: [usize; 4]) -> Result<()> {
        if dims[1] != self.in_channels {
            return Err(FireGanError::ChannelMismatch {
                expected: self.in_channels,
                actual: dims[1],
            });
        }

        Ok(())
    }
}

#[derive(Config, Debug)]
pub struct FusionGeneratorConfig {
    /// Visible RGB plus infrared RGB.
    #[config(default = 6)]
    pub in_channels: usize,
    #[config(default = 3)]
    pub out_channels: usize,
    #[config(default = false)]
    pub spectral_norm: bool,
    #[config(default = 0.2)]
    pub negative_slope: f64,
    #[config(default = "SpectralNormConfig::new()")]
    pub spectral: SpectralNormConfig,
}
impl FusionGeneratorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FusionGenerator<B> {
        let sn = self.spectral_norm.then_some(&self.spectral);

        let deconv_1 = FusionConvTranspose2d::new([self.in_channels, 256], 5, sn, device);
        let bn_1 = batch_norm(256, device);
        let conv_2 = FusionConv2d::new([256, 128], 5, sn, device);
        let bn_2 = batch_norm(128, device);
        let deconv_3 = FusionConvTranspose2d::new([128, 64], 3, sn, device);
        let bn_3 = batch_norm(64, device);
        let conv_4 = FusionConv2d::new([64, 32], 3, sn, device);
        let bn_4 = batch_norm(32, device);
        let out_layer = FusionConv2d::new([32, self.out_channels], 1, sn, device);
        let lrelu = LeakyReluConfig::new()
            .with_negative_slope(self.negative_slope)
            .init();

        tracing::debug!(
            spectral_norm = self.spectral_norm,
            in_channels = self.in_channels,
            "built fusion generator"
        );

        FusionGenerator {
            deconv_1,
            bn_1,
            conv_2,
            bn_2,
            deconv_3,
            bn_3,
            conv_4,
            bn_4,
            out_layer,
            lrelu,
            in_channels: self.in_channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MyBackend;
    use burn::tensor::Distribution;

    #[test]
    fn output_keeps_spatial_size() {
        let device = Default::default();
        let generator = FusionGeneratorConfig::new().init::<MyBackend>(&device);
        let input =
            Tensor::<MyBackend, 4>::random([2, 6, 12, 16], Distribution::Uniform(-1.0, 1.0), &device);

        let output = generator.forward(input);
        assert_eq!(output.dims(), [2, 3, 12, 16]);
        assert!(!generator.is_spectral());

        let max = output.abs().max().into_scalar();
        assert!(max <= 1.0);
    }

    #[test]
    fn spectral_variant_keeps_spatial_size() {
        let device = Default::default();
        let generator = FusionGeneratorConfig::new()
            .with_spectral_norm(true)
            .init::<MyBackend>(&device);
        let input =
            Tensor::<MyBackend, 4>::random([1, 6, 8, 10], Distribution::Uniform(-1.0, 1.0), &device);

        assert!(generator.is_spectral());
        assert_eq!(generator.forward(input).dims(), [1, 3, 8, 10]);
    }

    #[test]
    fn spectral_norm_only_adds_one_vector_per_convolution() {
        let device = Default::default();
        let plain = FusionGeneratorConfig::new().init::<MyBackend>(&device);
        let spectral = FusionGeneratorConfig::new()
            .with_spectral_norm(true)
            .init::<MyBackend>(&device);

        // num_params also counts the running u vectors, one per output channel
        let u_len = 256 + 128 + 64 + 32 + 3;
        assert_eq!(spectral.num_params(), plain.num_params() + u_len);
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let device = Default::default();
        let generator = FusionGeneratorConfig::new().init::<MyBackend>(&device);

        assert!(generator.check_input([1, 6, 4, 4]).is_ok());
        assert!(matches!(
            generator.check_input([1, 3, 4, 4]),
            Err(FireGanError::ChannelMismatch {
                expected: 6,
                actual: 3
            })
        ));
    }
}
