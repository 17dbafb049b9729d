//! Webcam capture through the platform's native backend.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;

use crate::camera::{CameraProvider, CaptureRequest, FrameSource, LensFacing, OpenSource};
use crate::common::{frame::chroma_dimensions, Frame, PixelLayout, Rotation};
use crate::error::CameraError;
use crate::pipeline::converter::rgb_to_nv12;

const REQUESTED_FRAME_RATE: u32 = 30;

/// Desktop cameras have no facing, so each facing maps to a device index.
#[derive(Debug, Clone)]
pub struct NativeCameraProvider {
    front_index: u32,
    back_index: u32,
}

impl NativeCameraProvider {
    pub fn new(front_index: u32, back_index: u32) -> Self {
        Self {
            front_index,
            back_index,
        }
    }

    fn index_for(&self, facing: LensFacing) -> u32 {
        match facing {
            LensFacing::Front => self.front_index,
            LensFacing::Back => self.back_index,
        }
    }
}

impl CameraProvider for NativeCameraProvider {
    fn has_camera(&self, facing: LensFacing) -> Result<bool, CameraError> {
        let cameras = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| CameraError::InfoUnavailable(facing, e.to_string()))?;
        let wanted = CameraIndex::Index(self.index_for(facing));
        Ok(cameras.iter().any(|info| info.index() == &wanted))
    }

    fn open(&self, facing: LensFacing, request: CaptureRequest) -> Result<OpenSource, CameraError> {
        if !self.has_camera(facing)? {
            return Err(CameraError::MissingLens(facing));
        }
        let index = self.index_for(facing);
        Ok(Box::new(move || {
            let (width, height) = request.resolution;
            let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
                CameraFormat::new(
                    Resolution::new(width, height),
                    FrameFormat::NV12,
                    REQUESTED_FRAME_RATE,
                ),
            ));
            let mut camera = Camera::new(CameraIndex::Index(index), format)
                .map_err(|e| CameraError::Binding(e.to_string()))?;
            camera
                .open_stream()
                .map_err(|e| CameraError::Binding(e.to_string()))?;
            tracing::info!(
                "Opened {} camera at index {} ({:?})",
                facing,
                index,
                camera.camera_format()
            );
            let source: Box<dyn FrameSource> = Box::new(NativeFrameSource {
                camera,
                rotation: request.rotation,
            });
            Ok(source)
        }))
    }
}

struct NativeFrameSource {
    camera: Camera,
    rotation: Rotation,
}

impl FrameSource for NativeFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| CameraError::Capture(e.to_string()))?;
        let resolution = buffer.resolution();
        let (width, height) = (resolution.width(), resolution.height());
        let data = match buffer.source_frame_format() {
            FrameFormat::NV12 => buffer.buffer().to_vec(),
            FrameFormat::YUYV => yuyv_to_nv12(buffer.buffer(), width, height),
            // MJPEG, RAWRGB, GRAY and friends go through nokhwa's decoder.
            other => match buffer.decode_image::<RgbFormat>() {
                Ok(decoded) => rgb_to_nv12(decoded.as_raw(), width, height),
                Err(e) => {
                    tracing::warn!("Dropping undecodable {:?} frame: {}", other, e);
                    return Ok(None);
                }
            },
        };
        match Frame::new(width, height, PixelLayout::Nv12, data, self.rotation) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => {
                tracing::debug!("Skipping malformed frame: {}", e);
                Ok(None)
            }
        }
    }
}

impl Drop for NativeFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("Failed to stop camera stream: {}", e);
        }
    }
}

/// Repacks YUYV 4:2:2 into NV12, taking chroma from even rows.
fn yuyv_to_nv12(packed: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    let (chroma_width, chroma_height) = chroma_dimensions(width as u32, height as u32);
    let stride = width * 2;
    if packed.len() < stride * height {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(width * height + 2 * chroma_width * chroma_height);
    for row in packed.chunks_exact(stride).take(height) {
        out.extend(row.iter().step_by(2));
    }
    for row in packed.chunks_exact(stride).take(height).step_by(2) {
        for pair in row.chunks(4).take(chroma_width) {
            let u = pair.get(1).copied().unwrap_or(128);
            let v = pair.get(3).copied().unwrap_or(128);
            out.push(u);
            out.push(v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_repacks_into_nv12() {
        // 2x2 image: two rows of Y0 U Y1 V.
        let packed = [10, 100, 20, 200, 30, 110, 40, 210];
        let nv12 = yuyv_to_nv12(&packed, 2, 2);
        assert_eq!(nv12, vec![10, 20, 30, 40, 100, 200]);
    }

    #[test]
    fn short_yuyv_buffers_are_dropped() {
        assert!(yuyv_to_nv12(&[0u8; 3], 2, 2).is_empty());
    }
}
