//! Spectral normalization of convolution weights.
//!
//! The weight is viewed as a `[out_channels, rest]` matrix whose largest singular value is
//! estimated by power iteration. The layer then convolves with `weight / sigma`.

use burn::{module::RunningState, prelude::*, tensor::Distribution};

#[derive(Config, Debug)]
pub struct SpectralNormConfig {
    #[config(default = 1)]
    pub power_iterations: usize,
    #[config(default = 1e-12)]
    pub epsilon: f64,
}

impl SpectralNormConfig {
    pub fn init<B: Backend>(&self, out_channels: usize, device: &B::Device) -> SpectralNorm<B> {
        let u = Tensor::random([1, out_channels], Distribution::Normal(0.0, 1.0), device);

        SpectralNorm {
            u: RunningState::new(u),
            power_iterations: self.power_iterations.max(1),
            epsilon: self.epsilon,
        }
    }
}

#[derive(Module, Debug)]
pub struct SpectralNorm<B: Backend> {
    u: RunningState<Tensor<B, 2>>,
    power_iterations: usize,
    epsilon: f64,
}

impl<B: Backend> SpectralNorm<B> {
    /// Divides `weight` by its estimated spectral norm. `out_dim` is the weight dimension
    /// holding the output channels (0 for convolutions, 1 for transposed convolutions).
    ///
    /// The left singular vector estimate is written back only while training.
    pub fn normalize(&self, weight: Tensor<B, 4>, out_dim: usize) -> Tensor<B, 4> {
        let dims = weight.dims();
        let rows = dims[out_dim];
        let cols = dims.iter().product::<usize>() / rows;

        let matrix = if out_dim == 0 {
            weight.clone().reshape([rows, cols])
        } else {
            weight.clone().swap_dims(0, out_dim).reshape([rows, cols])
        };
        let detached = matrix.clone().detach();

        let u = if B::ad_enabled() {
            self.u.value_sync()
        } else {
            self.u.value()
        };
        let mut v = l2_normalize(u.matmul(detached.clone()), self.epsilon);
        let mut u = l2_normalize(v.clone().matmul(detached.clone().transpose()), self.epsilon);
        for _ in 1..self.power_iterations {
            v = l2_normalize(u.matmul(detached.clone()), self.epsilon);
            u = l2_normalize(v.clone().matmul(detached.clone().transpose()), self.epsilon);
        }

        // [1, rows] x [rows, cols] x [cols, 1]
        let sigma = u.clone().matmul(matrix).matmul(v.transpose());

        if B::ad_enabled() {
            self.u.update(u.detach());
        }

        weight.div(sigma.reshape([1, 1, 1, 1]))
    }

    pub fn u(&self) -> Tensor<B, 2> {
        self.u.value_sync()
    }
}

fn l2_normalize<B: Backend>(input: Tensor<B, 2>, epsilon: f64) -> Tensor<B, 2> {
    let norm = input.clone().powi_scalar(2).sum().sqrt().add_scalar(epsilon);

    input.div(norm.unsqueeze())
}
