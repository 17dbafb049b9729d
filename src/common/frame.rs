use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::FrameError;

/// Planar 4:2:0 layouts a camera can hand us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// Y plane followed by interleaved U/V.
    Nv12,
    /// Y plane followed by interleaved V/U.
    Nv21,
    /// Y plane, then U plane, then V plane.
    I420,
}

impl PixelLayout {
    /// Bytes needed for a `width` x `height` frame in this layout.
    pub fn frame_len(&self, width: u32, height: u32) -> usize {
        let (chroma_width, chroma_height) = chroma_dimensions(width, height);
        (width as usize * height as usize) + 2 * chroma_width * chroma_height
    }
}

/// Chroma planes are subsampled by two in both directions, rounding up.
pub fn chroma_dimensions(width: u32, height: u32) -> (usize, usize) {
    (width.div_ceil(2) as usize, height.div_ceil(2) as usize)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: i32) -> Result<Self, FrameError> {
        if degrees % 90 != 0 {
            return Err(FrameError::InvalidRotation(degrees));
        }
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            _ => Ok(Rotation::Deg270),
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether applying this rotation swaps width and height.
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// One captured camera image in its native planar format.
///
/// Cloning is cheap: the pixel data is reference counted so the preview
/// stream and the analysis stream can both observe the same capture.
#[derive(Debug, Clone)]
pub struct Frame {
    id: Uuid,
    width: u32,
    height: u32,
    layout: PixelLayout,
    data: Bytes,
    rotation: Rotation,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: impl Into<Bytes>,
        rotation: Rotation,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidDimensions(width, height));
        }
        let data = data.into();
        let expected = layout.frame_len(width, height);
        if data.len() < expected {
            return Err(FrameError::ShortBuffer {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            width,
            height,
            layout,
            data,
            rotation,
            captured_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn luma(&self) -> &[u8] {
        &self.data[..self.width as usize * self.height as usize]
    }

    /// Everything after the luma plane, laid out according to [`PixelLayout`].
    pub fn chroma(&self) -> &[u8] {
        let start = self.width as usize * self.height as usize;
        &self.data[start..self.layout.frame_len(self.width, self.height)]
    }
}
