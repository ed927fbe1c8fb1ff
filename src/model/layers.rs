use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Initializer, LeakyRelu,
        LeakyReluConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::{
        module::{conv2d, conv_transpose2d},
        ops::{ConvOptions, ConvTransposeOptions},
    },
};

use crate::model::spectral::{SpectralNorm, SpectralNormConfig};

// Keras defaults: momentum 0.99 on the running average, i.e. 0.01 on the new batch.
const BN_MOMENTUM: f64 = 0.01;
const BN_EPSILON: f64 = 1e-3;

pub(crate) fn batch_norm<B: Backend>(channels: usize, device: &B::Device) -> BatchNorm<B, 2> {
    BatchNormConfig::new(channels)
        .with_momentum(BN_MOMENTUM)
        .with_epsilon(BN_EPSILON)
        .init(device)
}

pub(crate) fn pix2pix_initializer() -> Initializer {
    Initializer::Normal {
        mean: 0.0,
        std: 0.02,
    }
}

/// He-uniform: `U(-sqrt(6 / fan_in), sqrt(6 / fan_in))`.
pub(crate) fn he_uniform() -> Initializer {
    Initializer::KaimingUniform {
        gain: 2f64.sqrt(),
        fan_out_only: false,
    }
}

/// Symmetric padding that makes a stride-2 convolution halve an even input.
pub(crate) fn same_padding(kernel_size: usize) -> usize {
    (kernel_size - 1) / 2
}

/// Padding and output padding that make a stride-2 transposed convolution double its input.
pub(crate) fn same_padding_transposed(kernel_size: usize) -> (usize, usize) {
    let padding = (kernel_size - 1) / 2;
    (padding, 2 * padding + 2 - kernel_size)
}

// ////////////////////////////////////////////////////////////////////////////
// U-Net blocks

/// Conv (stride 2) -> optional BatchNorm -> LeakyReLU.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    bn: Option<BatchNorm<B, 2>>,
    lrelu: LeakyRelu,
}
impl<B: Backend> Downsample<B> {
    pub fn new(
        channels: [usize; 2],
        kernel_size: usize,
        apply_batchnorm: bool,
        device: &B::Device,
    ) -> Self {
        let padding = same_padding(kernel_size);
        let conv = Conv2dConfig::new(channels, [kernel_size, kernel_size])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_initializer(pix2pix_initializer())
            .with_bias(false)
            .init(device);
        let bn = apply_batchnorm.then(|| batch_norm(channels[1], device));
        // Keras' LeakyReLU default slope
        let lrelu = LeakyReluConfig::new().with_negative_slope(0.3).init();

        Self { conv, bn, lrelu }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.conv.forward(input);
        let output = match &self.bn {
            Some(bn) => bn.forward(output),
            None => output,
        };
        self.lrelu.forward(output)
    }
}

/// Transposed conv (stride 2) -> BatchNorm -> optional Dropout(0.5) -> ReLU.
#[derive(Module, Debug)]
pub struct Upsample<B: Backend> {
    deconv: ConvTranspose2d<B>,
    bn: BatchNorm<B, 2>,
    dropout: Option<Dropout>,
    relu: Relu,
}
impl<B: Backend> Upsample<B> {
    pub fn new(
        channels: [usize; 2],
        kernel_size: usize,
        apply_dropout: bool,
        device: &B::Device,
    ) -> Self {
        let (padding, padding_out) = same_padding_transposed(kernel_size);
        let deconv = ConvTranspose2dConfig::new(channels, [kernel_size, kernel_size])
            .with_stride([2, 2])
            .with_padding([padding, padding])
            .with_padding_out([padding_out, padding_out])
            .with_initializer(pix2pix_initializer())
            .with_bias(false)
            .init(device);
        let bn = batch_norm(channels[1], device);
        let dropout = apply_dropout.then(|| DropoutConfig::new(0.5).init());
        let relu = Relu::new();

        Self {
            deconv,
            bn,
            dropout,
            relu,
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.deconv.forward(input);
        let output = self.bn.forward(output);
        let output = match &self.dropout {
            Some(dropout) => dropout.forward(output),
            None => output,
        };
        self.relu.forward(output)
    }
}

// ////////////////////////////////////////////////////////////////////////////
// Fusion generator convolutions: stride 1, valid padding, optional spectral norm

#[derive(Module, Debug)]
pub struct FusionConv2d<B: Backend> {
    conv: Conv2d<B>,
    spectral_norm: Option<SpectralNorm<B>>,
}
impl<B: Backend> FusionConv2d<B> {
    pub fn new(
        channels: [usize; 2],
        kernel_size: usize,
        spectral_norm: Option<&SpectralNormConfig>,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new(channels, [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Valid)
            .with_initializer(he_uniform())
            .init(device);
        let spectral_norm = spectral_norm.map(|config| config.init(channels[1], device));

        Self {
            conv,
            spectral_norm,
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        match &self.spectral_norm {
            None => self.conv.forward(input),
            Some(sn) => {
                let weight = sn.normalize(self.conv.weight.val(), 0);
                let bias = self.conv.bias.as_ref().map(|bias| bias.val());
                conv2d(
                    input,
                    weight,
                    bias,
                    ConvOptions::new([1, 1], [0, 0], [1, 1], 1),
                )
            }
        }
    }

    pub fn is_spectral(&self) -> bool {
        self.spectral_norm.is_some()
    }
}

#[derive(Module, Debug)]
pub struct FusionConvTranspose2d<B: Backend> {
    deconv: ConvTranspose2d<B>,
    spectral_norm: Option<SpectralNorm<B>>,
}
impl<B: Backend> FusionConvTranspose2d<B> {
    pub fn new(
        channels: [usize; 2],
        kernel_size: usize,
        spectral_norm: Option<&SpectralNormConfig>,
        device: &B::Device,
    ) -> Self {
        let deconv = ConvTranspose2dConfig::new(channels, [kernel_size, kernel_size])
            .with_initializer(he_uniform())
            .init(device);
        let spectral_norm = spectral_norm.map(|config| config.init(channels[1], device));

        Self {
            deconv,
            spectral_norm,
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        match &self.spectral_norm {
            None => self.deconv.forward(input),
            Some(sn) => {
                // transposed weights are laid out [in, out, kh, kw]
                let weight = sn.normalize(self.deconv.weight.val(), 1);
                let bias = self.deconv.bias.as_ref().map(|bias| bias.val());
                conv_transpose2d(
                    input,
                    weight,
                    bias,
                    ConvTransposeOptions::new([1, 1], [0, 0], [0, 0], [1, 1], 1),
                )
            }
        }
    }
}
