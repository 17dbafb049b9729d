use image::{imageops, RgbImage};

use crate::common::{frame::chroma_dimensions, Frame, PixelLayout, Rotation};

/// Converts planar YUV frames into upright RGB images.
///
/// The unrotated RGB backing buffer is allocated on the first frame and
/// reused for every frame after that. If the camera changes resolution the
/// buffer is reallocated at the new size.
#[derive(Debug, Default)]
pub struct YuvConverter {
    buffer: Option<RgbImage>,
    allocations: usize,
}

impl YuvConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensions of the backing buffer, once one exists.
    pub fn buffer_dimensions(&self) -> Option<(u32, u32)> {
        self.buffer.as_ref().map(|buffer| buffer.dimensions())
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Returns `None` when no buffer can be produced for the frame; the caller
    /// skips it.
    pub fn convert(&mut self, frame: &Frame) -> Option<RgbImage> {
        let buffer = self.buffer_for(frame.width(), frame.height())?;
        yuv_to_rgb(frame, buffer);
        Some(rotate(buffer, frame.rotation()))
    }

    fn buffer_for(&mut self, width: u32, height: u32) -> Option<&mut RgbImage> {
        let reusable = matches!(&self.buffer, Some(buffer) if buffer.dimensions() == (width, height));
        if !reusable {
            if let Some((old_width, old_height)) = self.buffer_dimensions() {
                tracing::debug!(
                    "Frame size changed from {}x{} to {}x{}, reallocating buffer",
                    old_width,
                    old_height,
                    width,
                    height
                );
            }
            let len = (width as usize)
                .checked_mul(height as usize)?
                .checked_mul(3)?;
            self.buffer = Some(RgbImage::from_raw(width, height, vec![0u8; len])?);
            self.allocations += 1;
        }
        self.buffer.as_mut()
    }
}

fn rotate(buffer: &RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::Deg0 => buffer.clone(),
        Rotation::Deg90 => imageops::rotate90(buffer),
        Rotation::Deg180 => imageops::rotate180(buffer),
        Rotation::Deg270 => imageops::rotate270(buffer),
    }
}

/// BT.601 limited range, fixed point.
fn yuv_pixel(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = 298 * (y as i32 - 16);
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |value: i32| ((value + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(c + 409 * e),
        clamp(c - 100 * d - 208 * e),
        clamp(c + 516 * d),
    ]
}

fn yuv_to_rgb(frame: &Frame, out: &mut RgbImage) {
    let width = frame.width() as usize;
    let (chroma_width, chroma_height) = chroma_dimensions(frame.width(), frame.height());
    let luma = frame.luma();
    let chroma = frame.chroma();
    let layout = frame.layout();

    for (index, pixel) in out.pixels_mut().enumerate() {
        let (x, y) = (index % width, index / width);
        let (cx, cy) = (x / 2, y / 2);
        let (u, v) = match layout {
            PixelLayout::Nv12 => {
                let at = cy * chroma_width * 2 + cx * 2;
                (chroma[at], chroma[at + 1])
            }
            PixelLayout::Nv21 => {
                let at = cy * chroma_width * 2 + cx * 2;
                (chroma[at + 1], chroma[at])
            }
            PixelLayout::I420 => {
                let at = cy * chroma_width + cx;
                (chroma[at], chroma[chroma_width * chroma_height + at])
            }
        };
        pixel.0 = yuv_pixel(luma[index], u, v);
    }
}

/// Packs interleaved RGB into NV12 (BT.601 limited range), for cameras that
/// only hand out decoded images. Chroma is taken from the top-left pixel of
/// each 2x2 block. Short buffers give an empty vec.
pub fn rgb_to_nv12(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    if rgb.len() < width * height * 3 {
        return Vec::new();
    }
    let (chroma_width, chroma_height) = chroma_dimensions(width as u32, height as u32);
    let at = |x: usize, y: usize| {
        let i = (y * width + x) * 3;
        (rgb[i] as i32, rgb[i + 1] as i32, rgb[i + 2] as i32)
    };

    let mut out = Vec::with_capacity(width * height + 2 * chroma_width * chroma_height);
    for y in 0..height {
        for x in 0..width {
            let (r, g, b) = at(x, y);
            out.push((((66 * r + 129 * g + 25 * b + 128) >> 8) + 16) as u8);
        }
    }
    for cy in 0..chroma_height {
        for cx in 0..chroma_width {
            let (r, g, b) = at(cx * 2, cy * 2);
            out.push((((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128).clamp(0, 255) as u8);
            out.push((((112 * r - 94 * g - 18 * b + 128) >> 8) + 128).clamp(0, 255) as u8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(
        width: u32,
        height: u32,
        layout: PixelLayout,
        luma: impl Fn(u32, u32) -> u8,
        chroma: &[u8],
        rotation: Rotation,
    ) -> Frame {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                data.push(luma(x, y));
            }
        }
        let (cw, ch) = chroma_dimensions(width, height);
        let planes = 2 * cw * ch;
        data.extend(chroma.iter().cycle().take(planes));
        Frame::new(width, height, layout, data, rotation).unwrap()
    }

    fn gray(width: u32, height: u32, rotation: Rotation) -> Frame {
        frame(width, height, PixelLayout::Nv12, |_, _| 128, &[128], rotation)
    }

    #[test]
    fn buffer_is_allocated_once_for_a_fixed_size() {
        let mut converter = YuvConverter::new();
        assert_eq!(converter.buffer_dimensions(), None);
        for _ in 0..5 {
            let image = converter.convert(&gray(6, 4, Rotation::Deg0)).unwrap();
            assert_eq!(image.dimensions(), (6, 4));
            assert_eq!(converter.buffer_dimensions(), Some((6, 4)));
        }
        assert_eq!(converter.allocations(), 1);
    }

    #[test]
    fn size_changes_reallocate_the_buffer() {
        let mut converter = YuvConverter::new();
        converter.convert(&gray(6, 4, Rotation::Deg0)).unwrap();
        let image = converter.convert(&gray(8, 6, Rotation::Deg0)).unwrap();
        assert_eq!(image.dimensions(), (8, 6));
        assert_eq!(converter.buffer_dimensions(), Some((8, 6)));
        assert_eq!(converter.allocations(), 2);
    }

    #[test]
    fn limited_range_extremes_map_to_black_and_white() {
        let mut converter = YuvConverter::new();
        let black = frame(2, 2, PixelLayout::I420, |_, _| 16, &[128], Rotation::Deg0);
        let white = frame(2, 2, PixelLayout::I420, |_, _| 235, &[128], Rotation::Deg0);
        assert_eq!(converter.convert(&black).unwrap().get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(
            converter.convert(&white).unwrap().get_pixel(1, 1).0,
            [255, 255, 255]
        );
    }

    #[test]
    fn interleaved_chroma_order_follows_layout() {
        let mut converter = YuvConverter::new();
        let nv12 = frame(2, 2, PixelLayout::Nv12, |_, _| 128, &[255, 128], Rotation::Deg0);
        let nv21 = frame(2, 2, PixelLayout::Nv21, |_, _| 128, &[255, 128], Rotation::Deg0);

        let blue = converter.convert(&nv12).unwrap().get_pixel(0, 0).0;
        let red = converter.convert(&nv21).unwrap().get_pixel(0, 0).0;
        assert_eq!(blue[2], 255);
        assert_eq!(blue[0], 130);
        assert_eq!(red[0], 255);
        assert_eq!(red[2], 130);
    }

    #[test]
    fn rotation_hint_turns_output_upright() {
        let mut converter = YuvConverter::new();
        // Bright left column, 4 wide by 2 tall.
        let sideways = frame(
            4,
            2,
            PixelLayout::Nv12,
            |x, _| if x == 0 { 235 } else { 16 },
            &[128],
            Rotation::Deg90,
        );
        let upright = converter.convert(&sideways).unwrap();
        assert_eq!(upright.dimensions(), (2, 4));
        assert_eq!(converter.buffer_dimensions(), Some((4, 2)));
        for x in 0..2 {
            assert_eq!(upright.get_pixel(x, 0).0, [255, 255, 255]);
            assert_eq!(upright.get_pixel(x, 3).0, [0, 0, 0]);
        }
    }

    #[test]
    fn decoded_rgb_repacks_into_nv12() {
        let white = rgb_to_nv12(&[255u8; 2 * 2 * 3], 2, 2);
        assert_eq!(white, vec![235, 235, 235, 235, 128, 128]);

        // Odd sizes keep a full chroma row and column.
        let packed = rgb_to_nv12(&[40u8; 3 * 3 * 3], 3, 3);
        assert_eq!(packed.len(), PixelLayout::Nv12.frame_len(3, 3));

        let frame = Frame::new(2, 2, PixelLayout::Nv12, white, Rotation::Deg0).unwrap();
        let image = YuvConverter::new().convert(&frame).unwrap();
        assert_eq!(image.get_pixel(1, 1).0, [255, 255, 255]);
    }

    #[test]
    fn short_rgb_buffers_are_dropped() {
        assert!(rgb_to_nv12(&[0u8; 5], 2, 2).is_empty());
    }

    #[test]
    fn odd_sized_frames_convert() {
        let mut converter = YuvConverter::new();
        let image = converter
            .convert(&frame(3, 3, PixelLayout::I420, |_, _| 128, &[128], Rotation::Deg180))
            .unwrap();
        assert_eq!(image.dimensions(), (3, 3));
    }
}
