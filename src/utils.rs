use burn::prelude::*;
use image::{imageops::FilterType, RgbImage};
use std::path::Path;

use crate::error::{FireGanError, Result};

/// Opens an image as RGB, resized to `width` x `height` when it isn't already.
pub fn load_image<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Result<RgbImage> {
    let image = image::open(path.as_ref())?.to_rgb8();
    if image.dimensions() == (width, height) {
        return Ok(image);
    }

    tracing::debug!(
        path = %path.as_ref().display(),
        from = ?image.dimensions(),
        to = ?(width, height),
        "resizing image"
    );
    Ok(image::imageops::resize(&image, width, height, FilterType::Triangle))
}

/// Interleaved RGB bytes -> `[3, height, width]` scaled to `[-1, 1]`.
pub fn rgb_to_tensor<B: Backend>(
    rgb: Vec<u8>,
    height: usize,
    width: usize,
    device: &B::Device,
) -> Result<Tensor<B, 3>> {
    let expected = height * width * 3;
    if rgb.len() != expected {
        return Err(FireGanError::BufferSize {
            expected,
            actual: rgb.len(),
        });
    }

    Ok(bytes_to_tensor(&rgb, height, width, device))
}

pub fn image_to_tensor<B: Backend>(image: &RgbImage, device: &B::Device) -> Tensor<B, 3> {
    let (width, height) = image.dimensions();

    bytes_to_tensor(image.as_raw(), height as usize, width as usize, device)
}

fn bytes_to_tensor<B: Backend>(
    bytes: &[u8],
    height: usize,
    width: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    let data = bytes.iter().map(|&c| c as f32).collect::<Vec<_>>();
    let tensor = Tensor::<B, 3>::from_data(TensorData::new(data, [height, width, 3]), device)
        .permute([2, 0, 1]);

    tensor / 127.5 - 1.0
}

/// `[3, height, width]` in `[-1, 1]` -> interleaved RGB bytes.
pub fn tensor_to_rgb<B: Backend>(tensor: Tensor<B, 3>) -> Vec<u8> {
    ((tensor + 1.0) * 127.5)
        .clamp(0.0, 255.0)
        .permute([1, 2, 0])
        .into_data()
        .iter::<f32>()
        .map(|c| c.round() as u8)
        .collect()
}

pub fn tensor_to_image<B: Backend>(tensor: Tensor<B, 3>) -> Result<RgbImage> {
    let [_, height, width] = tensor.dims();

    rgb_to_image(tensor_to_rgb(tensor), height, width)
}

pub fn rgb_to_image(rgb: Vec<u8>, height: usize, width: usize) -> Result<RgbImage> {
    let expected = height * width * 3;
    let actual = rgb.len();
    if actual != expected {
        return Err(FireGanError::BufferSize { expected, actual });
    }

    RgbImage::from_raw(width as u32, height as u32, rgb)
        .ok_or(FireGanError::BufferSize { expected, actual })
}

/// Places `images` next to each other, top aligned.
pub fn mosaic(images: &[RgbImage]) -> RgbImage {
    let width = images.iter().map(|image| image.width()).sum();
    let height = images.iter().map(|image| image.height()).max().unwrap_or(0);

    let mut mosaic = RgbImage::new(width, height);
    let mut offset = 0;
    for image in images {
        for (x, y, pixel) in image.enumerate_pixels() {
            mosaic.put_pixel(offset + x, y, *pixel);
        }
        offset += image.width();
    }
    mosaic
}
