use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use tower::Service;
use uuid::Uuid;

use crate::camera::FrameLease;
use crate::classifier::{Classification, Classifier};
use crate::error::{AppError, ModelError};
use crate::pipeline::YuvConverter;

/// The classifier is created once and shared by every analysis binding.
pub type SharedClassifier = Arc<Mutex<Box<dyn Classifier>>>;

pub fn share_classifier(classifier: Box<dyn Classifier>) -> SharedClassifier {
    Arc::new(Mutex::new(classifier))
}

#[derive(Debug, Clone)]
pub struct ClassifiedFrame {
    pub frame_id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub classification: Classification,
}

/// Converts a leased frame to RGB and runs it through the classifier.
///
/// Frames that cannot be converted or classified produce `Ok(None)`; the
/// presentation keeps showing the previous result. The lease is released as
/// soon as the frame has been processed.
pub struct AnalysisService {
    converter: YuvConverter,
    classifier: SharedClassifier,
}

impl AnalysisService {
    pub fn new(classifier: SharedClassifier) -> Self {
        Self {
            converter: YuvConverter::new(),
            classifier,
        }
    }

    pub fn converter(&self) -> &YuvConverter {
        &self.converter
    }

    fn analyze(&mut self, lease: &FrameLease) -> Result<Option<ClassifiedFrame>, AppError> {
        let frame = lease.frame();
        let Some(image) = self.converter.convert(frame) else {
            tracing::debug!("No bitmap for frame {}, skipping", frame.id());
            return Ok(None);
        };

        let mut classifier = self.classifier.lock().map_err(|_| ModelError::Poisoned)?;
        match classifier.classify(&image) {
            Ok(classification) if !classification.is_empty() => Ok(Some(ClassifiedFrame {
                frame_id: frame.id(),
                captured_at: frame.captured_at(),
                classification,
            })),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::debug!("No result for frame {}: {}", frame.id(), e);
                Ok(None)
            }
        }
    }
}

impl Service<FrameLease> for AnalysisService {
    type Response = Option<ClassifiedFrame>;
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, lease: FrameLease) -> Self::Future {
        let result = self.analyze(&lease);
        lease.close();
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::testing::ScriptedClassifier;
    use crate::common::{Frame, PixelLayout, Rotation};
    use tokio::sync::oneshot::error::TryRecvError;

    fn frame(width: u32, height: u32, rotation: Rotation) -> Frame {
        Frame::new(
            width,
            height,
            PixelLayout::Nv12,
            vec![128u8; PixelLayout::Nv12.frame_len(width, height)],
            rotation,
        )
        .unwrap()
    }

    fn shared(classifier: ScriptedClassifier) -> SharedClassifier {
        share_classifier(Box::new(classifier))
    }

    #[tokio::test]
    async fn classifies_the_upright_frame_and_releases_it() {
        let classifier = ScriptedClassifier::constant(vec![0.9, 0.1]);
        let seen = classifier.seen();
        let mut service = AnalysisService::new(shared(classifier));

        let (lease, mut released) = FrameLease::new(frame(8, 4, Rotation::Deg270));
        let result = service.call(lease).await.unwrap().unwrap();

        assert_eq!(result.classification.top().unwrap().label, "with_mask");
        assert_eq!(seen.lock().unwrap().as_slice(), &[(4, 8)]);
        assert_eq!(released.try_recv(), Ok(()));
        assert_eq!(service.converter().buffer_dimensions(), Some((8, 4)));
    }

    #[tokio::test]
    async fn inference_failure_yields_no_result() {
        let classifier = ScriptedClassifier::new(vec![Err("boom".to_string())]);
        let mut service = AnalysisService::new(shared(classifier));

        let (lease, mut released) = FrameLease::new(frame(4, 4, Rotation::Deg0));
        assert!(service.call(lease).await.unwrap().is_none());
        assert_ne!(released.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn buffer_is_reused_across_frames() {
        let mut service =
            AnalysisService::new(shared(ScriptedClassifier::constant(vec![0.3, 0.7])));
        for _ in 0..3 {
            let (lease, _released) = FrameLease::new(frame(6, 4, Rotation::Deg0));
            let result = service.call(lease).await.unwrap().unwrap();
            assert_eq!(result.classification.top().unwrap().label, "without_mask");
        }
        assert_eq!(service.converter().allocations(), 1);
    }
}
