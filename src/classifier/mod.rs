//! Pretrained mask classifier behind a small trait, so the analysis stream
//! does not care which inference runtime sits underneath.

mod category;
#[cfg(feature = "onnx")]
pub mod onnx;
mod preprocess;

use serde::Deserialize;

pub use category::{Category, Classification};
pub use preprocess::{image_to_tensor, softmax};

use image::RgbImage;

use crate::config::ModelSettings;
use crate::error::ModelError;

pub const WITHOUT_MASK_LABEL: &str = "without_mask";

pub trait Classifier: Send {
    /// Runs one image through the model. Categories come back sorted by
    /// descending confidence.
    fn classify(&mut self, image: &RgbImage) -> Result<Classification, ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelDevice {
    Cpu,
    #[default]
    Gpu,
}

/// Memory order the model expects for its float input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    #[default]
    Nhwc,
    Nchw,
}

/// Execution settings fixed when the model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelOptions {
    pub device: ModelDevice,
    pub num_threads: usize,
}

impl From<&ModelSettings> for ModelOptions {
    fn from(settings: &ModelSettings) -> Self {
        Self {
            device: settings.device,
            num_threads: settings.num_threads,
        }
    }
}

/// Loads the configured model. Failure here is fatal for the application.
#[cfg(feature = "onnx")]
pub fn load_classifier(settings: &ModelSettings) -> Result<Box<dyn Classifier>, ModelError> {
    Ok(Box::new(onnx::OnnxClassifier::load(settings)?))
}

#[cfg(not(feature = "onnx"))]
pub fn load_classifier(_settings: &ModelSettings) -> Result<Box<dyn Classifier>, ModelError> {
    Err(ModelError::BackendUnavailable)
}
