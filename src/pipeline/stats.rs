use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tower::Service;
use tower_layer::Layer;

use crate::camera::FrameLease;
use crate::pipeline::ClassifiedFrame;

const NO_CONFIDENCE: u32 = u32::MAX;

/// Counters shared between the analysis worker and the UI.
#[derive(Debug)]
pub struct AnalysisStats {
    frames_analyzed: AtomicU64,
    frames_skipped: AtomicU64,
    confidence_sum_micros: AtomicU64,
    last_latency_us: AtomicU64,
    last_confidence: AtomicU32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub frames_analyzed: u64,
    pub frames_skipped: u64,
    pub average_confidence: f32,
    pub last_latency: Duration,
    pub last_confidence: Option<f32>,
}

impl Default for AnalysisStats {
    fn default() -> Self {
        Self {
            frames_analyzed: AtomicU64::new(0),
            frames_skipped: AtomicU64::new(0),
            confidence_sum_micros: AtomicU64::new(0),
            last_latency_us: AtomicU64::new(0),
            last_confidence: AtomicU32::new(NO_CONFIDENCE),
        }
    }
}

impl AnalysisStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_classified(&self, latency: Duration, confidence: f32) {
        self.frames_analyzed.fetch_add(1, Ordering::Relaxed);
        self.confidence_sum_micros
            .fetch_add((confidence * 1_000_000.0) as u64, Ordering::Relaxed);
        self.last_latency_us
            .store(latency.as_micros() as u64, Ordering::Relaxed);
        self.last_confidence
            .store(confidence.to_bits(), Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let frames_analyzed = self.frames_analyzed.load(Ordering::Relaxed);
        let confidence_sum = self.confidence_sum_micros.load(Ordering::Relaxed);
        let average_confidence = if frames_analyzed == 0 {
            0.0
        } else {
            (confidence_sum as f64 / 1_000_000.0 / frames_analyzed as f64) as f32
        };
        let last_confidence = match self.last_confidence.load(Ordering::Relaxed) {
            NO_CONFIDENCE => None,
            bits => Some(f32::from_bits(bits)),
        };
        StatsSnapshot {
            frames_analyzed,
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            average_confidence,
            last_latency: Duration::from_micros(self.last_latency_us.load(Ordering::Relaxed)),
            last_confidence,
        }
    }
}

/// Wraps an analysis service and records per-frame outcomes.
#[derive(Clone)]
pub struct AnalysisStatsLayer {
    stats: Arc<AnalysisStats>,
}

impl AnalysisStatsLayer {
    pub fn new(stats: Arc<AnalysisStats>) -> Self {
        Self { stats }
    }
}

impl<S> Layer<S> for AnalysisStatsLayer {
    type Service = StatsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StatsService {
            inner,
            stats: self.stats.clone(),
        }
    }
}

pub struct StatsService<S> {
    inner: S,
    stats: Arc<AnalysisStats>,
}

impl<S, E> Service<FrameLease> for StatsService<S>
where
    S: Service<FrameLease, Response = Option<ClassifiedFrame>, Error = E>,
    S::Future: Send + 'static,
    E: Send + 'static,
{
    type Response = Option<ClassifiedFrame>;
    type Error = E;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, lease: FrameLease) -> Self::Future {
        let stats = self.stats.clone();
        let started = Instant::now();
        let future = self.inner.call(lease);
        Box::pin(async move {
            let result = future.await;
            match &result {
                Ok(Some(classified)) => {
                    let confidence = classified
                        .classification
                        .top()
                        .map(|category| category.score)
                        .unwrap_or_default();
                    stats.record_classified(started.elapsed(), confidence);
                }
                _ => stats.record_skipped(),
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_have_no_confidence() {
        let snapshot = AnalysisStats::new().snapshot();
        assert_eq!(snapshot.frames_analyzed, 0);
        assert_eq!(snapshot.last_confidence, None);
        assert_eq!(snapshot.average_confidence, 0.0);
    }

    #[test]
    fn classified_frames_update_averages() {
        let stats = AnalysisStats::new();
        stats.record_classified(Duration::from_millis(4), 0.5);
        stats.record_classified(Duration::from_millis(6), 1.0);
        stats.record_skipped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_analyzed, 2);
        assert_eq!(snapshot.frames_skipped, 1);
        assert!((snapshot.average_confidence - 0.75).abs() < 1e-6);
        assert_eq!(snapshot.last_latency, Duration::from_millis(6));
        assert_eq!(snapshot.last_confidence, Some(1.0));
    }
}
