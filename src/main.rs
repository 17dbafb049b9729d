use facemask_detector::app::MaskDetectorApp;
use facemask_detector::camera::create_provider;
use facemask_detector::classifier::load_classifier;
use facemask_detector::config::{LoggingSettings, Settings};
use facemask_detector::error::AppError;
use tracing::{info, Level};

fn init_logging(settings: &LoggingSettings) {
    let level = settings.level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn main() -> Result<(), AppError> {
    let settings = Settings::load()?;
    init_logging(&settings.logging);

    // The model is needed no matter what the permission prompt decides.
    let classifier = load_classifier(&settings.model)?;
    info!("Loaded model from {}", settings.model.path);
    let provider = create_provider(&settings.camera)?;

    MaskDetectorApp::start_gui(&settings, provider, classifier)
}
