//! Generator 1: a U-Net that maps a visible image to an infrared-like image.

use burn::{
    module::Module,
    nn::conv::{ConvTranspose2d, ConvTranspose2dConfig},
    prelude::*,
};

use crate::{
    error::{FireGanError, Result},
    model::layers::{pix2pix_initializer, same_padding_transposed, Downsample, Upsample},
};

#[derive(Config, Debug)]
pub struct DownsampleConfig {
    pub filters: usize,
    #[config(default = true)]
    pub batch_norm: bool,
}

#[derive(Config, Debug)]
pub struct UpsampleConfig {
    pub filters: usize,
    #[config(default = false)]
    pub dropout: bool,
}

#[derive(Config, Debug)]
pub struct UnetGeneratorConfig {
    pub down_stack: Vec<DownsampleConfig>,
    pub up_stack: Vec<UpsampleConfig>,
    #[config(default = 3)]
    pub in_channels: usize,
    #[config(default = 3)]
    pub out_channels: usize,
    #[config(default = 4)]
    pub kernel_size: usize,
}

impl UnetGeneratorConfig {
    /// The FIRe-GAN Generator 1 table.
    pub fn firegan() -> Self {
        let down_stack = vec![
            DownsampleConfig::new(64).with_batch_norm(false),
            DownsampleConfig::new(128),
            DownsampleConfig::new(256),
            DownsampleConfig::new(512),
            DownsampleConfig::new(512),
            DownsampleConfig::new(512),
            DownsampleConfig::new(512),
        ];
        let up_stack = vec![
            UpsampleConfig::new(512).with_dropout(true),
            UpsampleConfig::new(512).with_dropout(true),
            UpsampleConfig::new(512).with_dropout(true),
            UpsampleConfig::new(256),
            UpsampleConfig::new(128),
            UpsampleConfig::new(64),
        ];

        Self::new(down_stack, up_stack)
    }

    pub fn depth(&self) -> usize {
        self.down_stack.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.down_stack.is_empty() {
            return Err(FireGanError::EmptyDownStack);
        }
        if self.up_stack.len() + 1 != self.down_stack.len() {
            return Err(FireGanError::StackMismatch {
                down: self.down_stack.len(),
                up: self.up_stack.len(),
            });
        }
        if self.kernel_size < 2 {
            return Err(FireGanError::KernelTooSmall(self.kernel_size));
        }
        if let Some(index) = self.down_stack.iter().position(|layer| layer.filters == 0) {
            return Err(FireGanError::ZeroFilters { stack: "down", index });
        }
        if let Some(index) = self.up_stack.iter().position(|layer| layer.filters == 0) {
            return Err(FireGanError::ZeroFilters { stack: "up", index });
        }
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(FireGanError::ZeroChannels {
                in_channels: self.in_channels,
                out_channels: self.out_channels,
            });
        }
        divisor(self.depth())?;

        Ok(())
    }

    /// Every down block halves the input, so both sides must be divisible by `2^depth`.
    pub fn check_input(&self, height: usize, width: usize) -> Result<()> {
        check_divisible(height, width, self.depth())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<UnetGenerator<B>> {
        self.validate()?;

        let mut in_channels = self.in_channels;
        let down_stack = self
            .down_stack
            .iter()
            .map(|layer| {
                let block = Downsample::new(
                    [in_channels, layer.filters],
                    self.kernel_size,
                    layer.batch_norm,
                    device,
                );
                in_channels = layer.filters;
                block
            })
            .collect::<Vec<_>>();

        // skips are consumed deepest first, the bottleneck itself is not one
        let skip_channels = self
            .down_stack
            .iter()
            .rev()
            .skip(1)
            .map(|layer| layer.filters);
        let up_stack = self
            .up_stack
            .iter()
            .zip(skip_channels)
            .map(|(layer, skip)| {
                let block = Upsample::new(
                    [in_channels, layer.filters],
                    self.kernel_size,
                    layer.dropout,
                    device,
                );
                in_channels = layer.filters + skip;
                block
            })
            .collect::<Vec<_>>();

        let (padding, padding_out) = same_padding_transposed(self.kernel_size);
        let last = ConvTranspose2dConfig::new(
            [in_channels, self.out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_stride([2, 2])
        .with_padding([padding, padding])
        .with_padding_out([padding_out, padding_out])
        .with_initializer(pix2pix_initializer())
        .init(device);

        tracing::debug!(
            depth = self.depth(),
            in_channels = self.in_channels,
            "built U-Net generator"
        );

        Ok(UnetGenerator {
            down_stack,
            up_stack,
            last,
            in_channels: self.in_channels,
        })
    }
}

#[derive(Module, Debug)]
pub struct UnetGenerator<B: Backend> {
    down_stack: Vec<Downsample<B>>,
    up_stack: Vec<Upsample<B>>,
    last: ConvTranspose2d<B>,
    in_channels: usize,
}
impl<B: Backend> UnetGenerator<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut output = input;
        let mut skips = Vec::with_capacity(self.down_stack.len());
        for down in &self.down_stack {
            output = down.forward(output);
            skips.push(output.clone());
        }
        skips.pop();

        for (up, skip) in self.up_stack.iter().zip(skips.into_iter().rev()) {
            output = up.forward(output);
            output = Tensor::cat(vec![output, skip], 1);
        }

        let output = self.last.forward(output);

        burn::tensor::activation::tanh(output)
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn depth(&self) -> usize {
        self.down_stack.len()
    }

    pub fn check_input(&self, dims: [usize; 4]) -> Result<()> {
        let [_, channels, height, width] = dims;
        if channels != self.in_channels {
            return Err(FireGanError::ChannelMismatch {
                expected: self.in_channels,
                actual: channels,
            });
        }

        check_divisible(height, width, self.depth())
    }
}

fn divisor(depth: usize) -> Result<usize> {
    u32::try_from(depth)
        .ok()
        .and_then(|shift| 1usize.checked_shl(shift))
        .ok_or(FireGanError::TooDeep(depth))
}

fn check_divisible(height: usize, width: usize, depth: usize) -> Result<()> {
    let factor = divisor(depth)?;
    if height == 0 || width == 0 || height % factor != 0 || width % factor != 0 {
        return Err(FireGanError::InputNotDivisible {
            height,
            width,
            factor,
        });
    }

    Ok(())
}
