use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tower_layer::Layer;

use crate::camera::{
    select_initial_facing, toggle_available, AspectRatio, CameraProvider, CameraSession,
    CaptureRequest, LensFacing, SessionState,
};
use crate::classifier::Classifier;
use crate::common::{Frame, Rotation};
use crate::config::CameraSettings;
use crate::error::AppError;
use crate::pipeline::{
    share_classifier, AnalysisService, AnalysisStats, AnalysisStatsLayer, Analyzer,
    ClassifiedFrame, SharedClassifier, StatsSnapshot,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Drives the camera lifecycle: permission outcome, lens selection, use-case
/// binding and rebinding. Owns the classifier for as long as it lives.
pub struct CameraController {
    session: CameraSession,
    classifier: SharedClassifier,
    stats: Arc<AnalysisStats>,
    result_tx: mpsc::Sender<ClassifiedFrame>,
    lens_facing: LensFacing,
    lens_toggle_enabled: bool,
    camera_ready: bool,
    display_size: (u32, u32),
    rotation: Rotation,
    errors: Vec<AppError>,
}

impl CameraController {
    pub fn lens_facing(&self) -> LensFacing {
        self.lens_facing
    }

    pub fn lens_toggle_enabled(&self) -> bool {
        self.lens_toggle_enabled
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn subscribe_preview(&self) -> broadcast::Receiver<Frame> {
        self.session.subscribe_preview()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Non-fatal failures since the last call, for the error log.
    pub fn take_errors(&mut self) -> Vec<AppError> {
        std::mem::take(&mut self.errors)
    }

    /// A denied permission ends the application before the camera is touched.
    pub fn on_permission_result(&mut self, status: PermissionStatus) -> Result<(), AppError> {
        match status {
            PermissionStatus::Granted => self.setup_camera(),
            PermissionStatus::Denied => {
                tracing::warn!("Camera permission denied");
                Err(AppError::PermissionDenied)
            }
        }
    }

    /// Picks the starting lens and binds. Having no camera at all is fatal.
    pub fn setup_camera(&mut self) -> Result<(), AppError> {
        self.lens_facing = select_initial_facing(self.session.provider())?;
        self.camera_ready = true;
        tracing::info!("Starting with the {} camera", self.lens_facing);
        self.setup_controllers();
        self.setup_use_cases();
        Ok(())
    }

    pub fn toggle_lens(&mut self) {
        if !self.lens_toggle_enabled {
            tracing::debug!("Lens toggle ignored, only one camera available");
            return;
        }
        self.lens_facing = self.lens_facing.toggled();
        self.setup_use_cases();
    }

    /// Window metrics changed; re-evaluate the lens controls. The next bind
    /// picks up the new aspect ratio. Cameras are not queried before
    /// `setup_camera` has run.
    pub fn on_configuration_changed(&mut self, width: u32, height: u32) {
        self.display_size = (width, height);
        if self.camera_ready {
            self.setup_controllers();
        }
    }

    fn setup_controllers(&mut self) {
        self.lens_toggle_enabled = toggle_available(self.session.provider());
    }

    fn setup_use_cases(&mut self) {
        let (width, height) = self.display_size;
        let request = CaptureRequest {
            resolution: AspectRatio::from_dimensions(width, height).target_resolution(),
            rotation: self.rotation,
        };
        let service = AnalysisStatsLayer::new(self.stats.clone())
            .layer(AnalysisService::new(self.classifier.clone()));

        let bound = Analyzer::spawn(service, self.result_tx.clone()).and_then(|analyzer| {
            self.session
                .bind(self.lens_facing, request, analyzer)
                .map_err(AppError::from)
        });
        if let Err(e) = bound {
            tracing::error!("Use case binding failure: {}", e);
            self.errors.push(e);
        }
    }
}

pub struct CameraControllerBuilder {
    provider: Arc<dyn CameraProvider>,
    classifier: Box<dyn Classifier>,
    display_size: (u32, u32),
    rotation: Rotation,
    preview_buffer_size: usize,
    result_buffer_size: usize,
}

impl CameraControllerBuilder {
    pub fn new(provider: Arc<dyn CameraProvider>, classifier: Box<dyn Classifier>) -> Self {
        let defaults = CameraSettings::default();
        Self {
            provider,
            classifier,
            display_size: (640, 480),
            rotation: Rotation::Deg0,
            preview_buffer_size: defaults.preview_buffer_size,
            result_buffer_size: defaults.result_buffer_size,
        }
    }

    // Applies rotation and buffer sizes from the camera settings.
    pub fn camera_settings(mut self, settings: &CameraSettings) -> Result<Self, AppError> {
        self.rotation = Rotation::from_degrees(settings.rotation_degrees)?;
        self.preview_buffer_size = settings.preview_buffer_size;
        self.result_buffer_size = settings.result_buffer_size;
        Ok(self)
    }

    // Initial display metrics used to pick the capture aspect ratio.
    pub fn display_size(mut self, width: u32, height: u32) -> Self {
        self.display_size = (width, height);
        self
    }

    pub fn build(self) -> (CameraController, mpsc::Receiver<ClassifiedFrame>) {
        let (result_tx, result_rx) = mpsc::channel(self.result_buffer_size.max(1));
        let controller = CameraController {
            session: CameraSession::new(self.provider, self.preview_buffer_size),
            classifier: share_classifier(self.classifier),
            stats: Arc::new(AnalysisStats::new()),
            result_tx,
            lens_facing: LensFacing::Front,
            lens_toggle_enabled: false,
            camera_ready: false,
            display_size: self.display_size,
            rotation: self.rotation,
            errors: Vec::new(),
        };
        (controller, result_rx)
    }
}
