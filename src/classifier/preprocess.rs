use image::{imageops, RgbImage};

use crate::classifier::TensorLayout;

/// Resizes to the square model input and scales channels into `[0, 1]`.
/// Returns the tensor shape alongside the data.
pub fn image_to_tensor(
    image: &RgbImage,
    input_size: u32,
    layout: TensorLayout,
) -> ([usize; 4], Vec<f32>) {
    let resized = if image.dimensions() == (input_size, input_size) {
        image.clone()
    } else {
        imageops::resize(image, input_size, input_size, imageops::FilterType::Triangle)
    };
    let side = input_size as usize;
    let plane = side * side;
    let mut data = vec![0f32; plane * 3];

    for (index, pixel) in resized.pixels().enumerate() {
        for channel in 0..3 {
            let value = pixel.0[channel] as f32 / 255.0;
            match layout {
                TensorLayout::Nhwc => data[index * 3 + channel] = value,
                TensorLayout::Nchw => data[channel * plane + index] = value,
            }
        }
    }

    let shape = match layout {
        TensorLayout::Nhwc => [1, side, side, 3],
        TensorLayout::Nchw => [1, 3, side, side],
    };
    (shape, data)
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|v| v / sum).collect()
}
