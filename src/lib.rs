//! Live face-mask detection on a camera feed.
//!
//! The default build carries no hardware or inference backend: the camera
//! (`nokhwa`) and the classifier (`ort`) sit behind the `camera` and `onnx`
//! features. Run the app with
//!
//! ```text
//! cargo run --features full
//! ```
//!
//! Without them only `camera.provider = "synthetic"` works, and loading the
//! model fails with a message naming the missing feature.

pub mod app;
pub mod camera;
pub mod classifier;
pub mod common;
pub mod config;
pub mod error;
pub mod pipeline;

pub use error::{AppError, CameraError, FrameError, ModelError};
