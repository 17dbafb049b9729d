use std::fmt::Display;

use image::RgbImage;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::Session;
use ort::value::Tensor;

use crate::classifier::{
    image_to_tensor, softmax, Classification, Classifier, ModelDevice, ModelOptions, TensorLayout,
};
use crate::config::ModelSettings;
use crate::error::ModelError;

/// ONNX Runtime session for the bundled mask model.
pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    output_name: String,
    labels: Vec<String>,
    input_size: u32,
    layout: TensorLayout,
    apply_softmax: bool,
}

fn load_error(path: &str, reason: impl Display) -> ModelError {
    ModelError::Load {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn inference_error(reason: impl Display) -> ModelError {
    ModelError::Inference(reason.to_string())
}

impl OnnxClassifier {
    pub fn load(settings: &ModelSettings) -> Result<Self, ModelError> {
        let path = settings.path.as_str();
        let options = ModelOptions::from(settings);

        let builder = Session::builder()
            .map_err(|e| load_error(path, e))?
            .with_intra_threads(options.num_threads)
            .map_err(|e| load_error(path, e))?;
        let builder = match options.device {
            // Falls back to CPU when no accelerator is registered.
            ModelDevice::Gpu => builder.with_execution_providers([
                CUDAExecutionProvider::default().build(),
                CPUExecutionProvider::default().build(),
            ]),
            ModelDevice::Cpu => {
                builder.with_execution_providers([CPUExecutionProvider::default().build()])
            }
        }
        .map_err(|e| load_error(path, e))?;
        let session = builder
            .commit_from_file(path)
            .map_err(|e| load_error(path, e))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| load_error(path, "model has no inputs"))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| load_error(path, "model has no outputs"))?;

        tracing::info!(
            "Loaded model '{}' on {:?} with {} threads",
            path,
            options.device,
            options.num_threads
        );

        Ok(Self {
            session,
            input_name,
            output_name,
            labels: settings.labels.clone(),
            input_size: settings.input_size,
            layout: settings.layout,
            apply_softmax: settings.apply_softmax,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&mut self, image: &RgbImage) -> Result<Classification, ModelError> {
        let (shape, data) = image_to_tensor(image, self.input_size, self.layout);
        let tensor = Tensor::from_array((shape, data)).map_err(inference_error)?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(inference_error)?;
        let (_shape, scores) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;

        let scores = if self.apply_softmax {
            softmax(scores)
        } else {
            scores.to_vec()
        };
        Classification::from_scores(&self.labels, &scores)
    }
}
