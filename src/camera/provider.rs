use std::sync::Arc;

use serde::Deserialize;

use crate::camera::{LensFacing, SyntheticCameraProvider};
use crate::common::{Frame, Rotation};
use crate::config::CameraSettings;
use crate::error::CameraError;

/// What the use-cases ask of the camera when they are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub resolution: (u32, u32),
    pub rotation: Rotation,
}

/// A live stream of frames, driven from the capture thread.
pub trait FrameSource {
    /// `Ok(None)` means the camera had no buffer for us this time; the caller
    /// moves on to the next one.
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError>;
}

/// Deferred source construction. Camera handles are often tied to the thread
/// that opened them, so the capture thread runs this itself.
pub type OpenSource = Box<dyn FnOnce() -> Result<Box<dyn FrameSource>, CameraError> + Send>;

pub trait CameraProvider: Send + Sync {
    fn has_camera(&self, facing: LensFacing) -> Result<bool, CameraError>;

    fn open(&self, facing: LensFacing, request: CaptureRequest) -> Result<OpenSource, CameraError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Native,
    Synthetic,
}

pub fn create_provider(settings: &CameraSettings) -> Result<Arc<dyn CameraProvider>, CameraError> {
    match settings.provider {
        ProviderKind::Synthetic => {
            tracing::info!("Using synthetic camera provider");
            Ok(Arc::new(SyntheticCameraProvider::new(
                settings.synthetic_front,
                settings.synthetic_back,
            )))
        }
        ProviderKind::Native => native_provider(settings),
    }
}

#[cfg(feature = "camera")]
fn native_provider(settings: &CameraSettings) -> Result<Arc<dyn CameraProvider>, CameraError> {
    tracing::info!(
        "Using native camera provider (front index {}, back index {})",
        settings.front_index,
        settings.back_index
    );
    Ok(Arc::new(crate::camera::native::NativeCameraProvider::new(
        settings.front_index,
        settings.back_index,
    )))
}

#[cfg(not(feature = "camera"))]
fn native_provider(_settings: &CameraSettings) -> Result<Arc<dyn CameraProvider>, CameraError> {
    Err(CameraError::BackendUnavailable)
}
