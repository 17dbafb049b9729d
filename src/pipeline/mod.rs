pub mod analysis_service;
pub mod analyzer;
pub mod converter;
pub mod stats;

pub use analysis_service::{share_classifier, AnalysisService, ClassifiedFrame, SharedClassifier};
pub use analyzer::Analyzer;
pub use converter::YuvConverter;
pub use stats::{AnalysisStats, AnalysisStatsLayer, StatsSnapshot};
