pub mod aspect_ratio;
pub mod lease;
pub mod lens;
#[cfg(feature = "camera")]
pub mod native;
pub mod provider;
pub mod session;
pub mod synthetic;

pub use aspect_ratio::AspectRatio;
pub use lease::FrameLease;
pub use lens::{select_initial_facing, toggle_available, LensFacing};
pub use provider::{
    create_provider, CameraProvider, CaptureRequest, FrameSource, OpenSource, ProviderKind,
};
pub use session::{CameraSession, SessionState};
pub use synthetic::SyntheticCameraProvider;
