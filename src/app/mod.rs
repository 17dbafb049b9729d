pub mod controller;
pub mod indicator;
pub mod mask_detector_app;
pub mod views;

pub use controller::{CameraController, CameraControllerBuilder, PermissionStatus};
pub use indicator::{Indicator, IndicatorColor};
pub use mask_detector_app::MaskDetectorApp;
