use thiserror::Error;

use crate::camera::LensFacing;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Permission not granted")]
    PermissionDenied,
    #[error("Camera Error: {0}")]
    Camera(#[from] CameraError),
    #[error("Model Error: {0}")]
    Model(#[from] ModelError),
    #[error("Frame Error: {0}")]
    Frame(#[from] FrameError),
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Pipeline Error: {0}")]
    Pipeline(String),
    #[error("UI Error: {0}")]
    Ui(String),
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("No Camera Available")]
    NoCameraAvailable,
    #[error("Camera info unavailable for {0} camera: {1}")]
    InfoUnavailable(LensFacing, String),
    #[error("No {0} camera on this device")]
    MissingLens(LensFacing),
    #[error("Use case binding failure: {0}")]
    Binding(String),
    #[error("Failed to capture frame: {0}")]
    Capture(String),
    #[error("The capture thread stopped before reporting its state")]
    CaptureThreadLost,
    #[error("This build has no native camera backend, rebuild with `--features camera` or `--features full`")]
    BackendUnavailable,
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to load model from '{path}': {reason}")]
    Load { path: String, reason: String },
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Model produced {scores} scores for {labels} labels")]
    LabelMismatch { labels: usize, scores: usize },
    #[error("Classifier lock poisoned")]
    Poisoned,
    #[error("This build has no inference backend, rebuild with `--features onnx` or `--features full`")]
    BackendUnavailable,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame of {width}x{height} needs {expected} bytes, got {actual}")]
    ShortBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("Frame dimensions must be non-zero, got {0}x{1}")]
    InvalidDimensions(u32, u32),
    #[error("Rotation must be a multiple of 90 degrees, got {0}")]
    InvalidRotation(i32),
}
