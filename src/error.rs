use burn::{config::ConfigError, record::RecorderError};
use thiserror::Error;

pub type Result<T, E = FireGanError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum FireGanError {
    #[error("the down stack needs at least one block")]
    EmptyDownStack,

    #[error("the up stack has {up} blocks, a down stack of {down} needs {}", .down.saturating_sub(1))]
    StackMismatch { down: usize, up: usize },

    #[error("layer {index} of the {stack} stack has zero filters")]
    ZeroFilters { stack: &'static str, index: usize },

    #[error("generator channels must be non-zero, got {in_channels} in and {out_channels} out")]
    ZeroChannels {
        in_channels: usize,
        out_channels: usize,
    },

    #[error("a down stack of {0} blocks halves the input more often than a usize can hold")]
    TooDeep(usize),

    #[error("stride-2 layers need a kernel size of at least 2, got {0}")]
    KernelTooSmall(usize),

    #[error("input {height}x{width} is not divisible by {factor}")]
    InputNotDivisible {
        height: usize,
        width: usize,
        factor: usize,
    },

    #[error("expected {expected} input channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    #[error("visible {visible:?} and infrared {infrared:?} tensors differ in batch or size")]
    ShapeMismatch {
        visible: [usize; 4],
        infrared: [usize; 4],
    },

    #[error("image buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("failed to load or save model record: {0}")]
    Recorder(#[from] RecorderError),

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_filters(text: &str) -> Result<usize, std::num::ParseIntError> {
        text.parse()
    }

    fn kernel(size: usize) -> Result<usize> {
        if size < 2 {
            return Err(FireGanError::KernelTooSmall(size));
        }
        Ok(size)
    }

    #[test]
    fn result_alias_accepts_other_error_types() {
        assert_eq!(parse_filters("64").unwrap(), 64);
        assert!(parse_filters("x").is_err());
        assert_eq!(kernel(4).unwrap(), 4);
        assert!(matches!(kernel(1), Err(FireGanError::KernelTooSmall(1))));
    }

    #[test]
    fn stack_mismatch_names_expected_length() {
        let err = FireGanError::StackMismatch { down: 7, up: 5 };

        assert_eq!(
            err.to_string(),
            "the up stack has 5 blocks, a down stack of 7 needs 6"
        );
    }
}
