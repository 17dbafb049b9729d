use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::camera::{CameraProvider, CaptureRequest, FrameLease, LensFacing, OpenSource};
use crate::common::Frame;
use crate::error::CameraError;
use crate::pipeline::Analyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unbound,
    Binding,
    Bound,
}

struct Binding {
    cancel_token: CancellationToken,
    capture_thread: Option<JoinHandle<()>>,
    analyzer: Option<Analyzer>,
}

impl Binding {
    // The capture thread goes first: it holds the other frame sender.
    fn stop(&mut self) {
        self.cancel_token.cancel();
        if let Some(thread) = self.capture_thread.take() {
            if thread.join().is_err() {
                tracing::error!("Capture thread panicked");
            }
        }
        if let Some(analyzer) = self.analyzer.take() {
            analyzer.join();
        }
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The camera with its preview and analysis use-cases.
///
/// Preview subscribers see every captured frame. The analyzer sees one frame
/// at a time: a new lease is only issued once the previous one came back.
pub struct CameraSession {
    provider: Arc<dyn CameraProvider>,
    state: SessionState,
    facing: Option<LensFacing>,
    preview_tx: broadcast::Sender<Frame>,
    binding: Option<Binding>,
}

impl CameraSession {
    pub fn new(provider: Arc<dyn CameraProvider>, preview_capacity: usize) -> Self {
        let (preview_tx, _) = broadcast::channel(preview_capacity.max(1));
        Self {
            provider,
            state: SessionState::Unbound,
            facing: None,
            preview_tx,
            binding: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The lens of the current binding.
    pub fn facing(&self) -> Option<LensFacing> {
        self.facing
    }

    pub fn provider(&self) -> &dyn CameraProvider {
        self.provider.as_ref()
    }

    pub fn subscribe_preview(&self) -> broadcast::Receiver<Frame> {
        self.preview_tx.subscribe()
    }

    /// Replaces whatever is bound with fresh preview and analysis use-cases on
    /// `facing`. On failure the session is left unbound.
    pub fn bind(
        &mut self,
        facing: LensFacing,
        request: CaptureRequest,
        analyzer: Analyzer,
    ) -> Result<(), CameraError> {
        self.unbind_all();
        self.state = SessionState::Binding;
        tracing::info!(
            "Binding {} camera at {}x{}",
            facing,
            request.resolution.0,
            request.resolution.1
        );

        match self.start(facing, request, analyzer) {
            Ok(binding) => {
                self.binding = Some(binding);
                self.facing = Some(facing);
                self.state = SessionState::Bound;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Unbound;
                Err(e)
            }
        }
    }

    /// Stops frame delivery. A frame already handed to the analyzer finishes
    /// before this returns.
    pub fn unbind_all(&mut self) {
        if let Some(mut binding) = self.binding.take() {
            tracing::info!("Unbinding camera use cases");
            binding.stop();
        }
        self.facing = None;
        self.state = SessionState::Unbound;
    }

    fn start(
        &self,
        facing: LensFacing,
        request: CaptureRequest,
        analyzer: Analyzer,
    ) -> Result<Binding, CameraError> {
        let open = self.provider.open(facing, request)?;
        let cancel_token = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();

        let capture = CaptureLoop {
            analysis_tx: analyzer.sender(),
            preview_tx: self.preview_tx.clone(),
            cancel_token: cancel_token.clone(),
        };
        let capture_thread = std::thread::Builder::new()
            .name(format!("capture-{}", facing))
            .spawn(move || capture.run(open, ready_tx))
            .map_err(|e| CameraError::Binding(e.to_string()))?;

        match futures::executor::block_on(ready_rx) {
            Ok(Ok(())) => Ok(Binding {
                cancel_token,
                capture_thread: Some(capture_thread),
                analyzer: Some(analyzer),
            }),
            Ok(Err(e)) => {
                let _ = capture_thread.join();
                Err(e)
            }
            Err(_) => Err(CameraError::CaptureThreadLost),
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

struct CaptureLoop {
    analysis_tx: mpsc::Sender<FrameLease>,
    preview_tx: broadcast::Sender<Frame>,
    cancel_token: CancellationToken,
}

impl CaptureLoop {
    fn run(self, open: OpenSource, ready_tx: oneshot::Sender<Result<(), CameraError>>) {
        let mut source = match open() {
            Ok(source) => {
                let _ = ready_tx.send(Ok(()));
                source
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let mut outstanding: Option<oneshot::Receiver<()>> = None;
        let mut analysis_open = true;

        while !self.cancel_token.is_cancelled() {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!("Camera stopped delivering frames: {}", e);
                    break;
                }
            };

            // No preview subscriber is fine.
            let _ = self.preview_tx.send(frame.clone());

            if !analysis_open || Self::still_leased(&mut outstanding) {
                continue;
            }
            let (lease, released) = FrameLease::new(frame);
            match self.analysis_tx.try_send(lease) {
                Ok(_) => outstanding = Some(released),
                Err(TrySendError::Full(_)) => {
                    tracing::debug!("Analyzer busy, frame goes to preview only");
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::warn!("Analysis stream closed, continuing with preview only");
                    analysis_open = false;
                }
            }
        }
        tracing::debug!("Capture loop stopped");
    }

    fn still_leased(outstanding: &mut Option<oneshot::Receiver<()>>) -> bool {
        let Some(released) = outstanding.as_mut() else {
            return false;
        };
        match released.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => true,
            // Released, or the lease was dropped with the analyzer.
            _ => {
                *outstanding = None;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use chrono::{TimeDelta, Utc};

    use super::*;
    use crate::camera::SyntheticCameraProvider;
    use crate::classifier::testing::ScriptedClassifier;
    use crate::common::Rotation;
    use crate::error::AppError;
    use crate::pipeline::{share_classifier, AnalysisService, ClassifiedFrame};

    fn request() -> CaptureRequest {
        CaptureRequest {
            resolution: (16, 12),
            rotation: Rotation::Deg0,
        }
    }

    fn analyzer() -> (Analyzer, mpsc::Receiver<ClassifiedFrame>) {
        let (result_tx, result_rx) = mpsc::channel(64);
        let service = AnalysisService::new(share_classifier(Box::new(
            ScriptedClassifier::constant(vec![0.2, 0.8]),
        )));
        (Analyzer::spawn(service, result_tx).unwrap(), result_rx)
    }

    fn provider() -> SyntheticCameraProvider {
        SyntheticCameraProvider::new(true, true).with_frame_interval(Duration::from_millis(2))
    }

    fn wait_for<T>(mut poll: impl FnMut() -> Option<T>) -> T {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(value) = poll() {
                return value;
            }
            assert!(Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn binding_feeds_preview_and_analysis() {
        let mut session = CameraSession::new(Arc::new(provider()), 4);
        let mut preview_rx = session.subscribe_preview();
        let (analyzer, mut result_rx) = analyzer();
        assert_eq!(session.state(), SessionState::Unbound);

        session.bind(LensFacing::Front, request(), analyzer).unwrap();
        assert_eq!(session.state(), SessionState::Bound);
        assert_eq!(session.facing(), Some(LensFacing::Front));

        let result = wait_for(|| result_rx.try_recv().ok());
        assert_eq!(result.classification.top().unwrap().label, "without_mask");
        let frame = wait_for(|| preview_rx.try_recv().ok());
        assert_eq!((frame.width(), frame.height()), (16, 12));

        session.unbind_all();
        assert_eq!(session.state(), SessionState::Unbound);
        assert_eq!(session.facing(), None);
    }

    #[test]
    fn rebinding_switches_lens() {
        let provider = provider();
        let mut session = CameraSession::new(Arc::new(provider.clone()), 4);
        session.bind(LensFacing::Front, request(), analyzer().0).unwrap();
        session.bind(LensFacing::Back, request(), analyzer().0).unwrap();
        assert_eq!(session.facing(), Some(LensFacing::Back));
        assert_eq!(provider.open_count(), 2);
    }

    #[test]
    fn binding_failure_leaves_session_unbound() {
        let provider = SyntheticCameraProvider::new(true, true).with_failing_open();
        let mut session = CameraSession::new(Arc::new(provider), 4);
        let err = session
            .bind(LensFacing::Front, request(), analyzer().0)
            .unwrap_err();
        assert!(matches!(err, CameraError::Binding(_)));
        assert_eq!(session.state(), SessionState::Unbound);
    }

    #[test]
    fn missing_lens_cannot_be_bound() {
        let provider = SyntheticCameraProvider::new(true, false);
        let mut session = CameraSession::new(Arc::new(provider), 4);
        assert!(matches!(
            session.bind(LensFacing::Back, request(), analyzer().0),
            Err(CameraError::MissingLens(LensFacing::Back))
        ));
    }

    #[test]
    fn analysis_waits_for_the_lease_to_come_back() {
        const HOLD: Duration = Duration::from_millis(50);
        let mut session = CameraSession::new(Arc::new(provider()), 4);
        let mut preview_rx = session.subscribe_preview();

        // (frame captured, analysis started) per call.
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let slow_analysis = tower::service_fn(move |lease: FrameLease| {
            seen.lock()
                .unwrap()
                .push((lease.frame().captured_at(), Utc::now()));
            std::thread::sleep(HOLD);
            drop(lease);
            futures::future::ready(Ok::<Option<ClassifiedFrame>, AppError>(None))
        });
        let (result_tx, _result_rx) = mpsc::channel(1);
        let analyzer = Analyzer::spawn(slow_analysis, result_tx).unwrap();

        let started = Instant::now();
        session.bind(LensFacing::Front, request(), analyzer).unwrap();
        std::thread::sleep(Duration::from_millis(300));
        session.unbind_all();
        let elapsed = started.elapsed();

        let mut previews = 0u64;
        loop {
            match preview_rx.try_recv() {
                Ok(_) => previews += 1,
                Err(broadcast::error::TryRecvError::Lagged(n)) => previews += n,
                Err(_) => break,
            }
        }

        let calls = calls.lock().unwrap();
        assert!(!calls.is_empty());
        assert!(calls.len() as u128 <= elapsed.as_millis() / HOLD.as_millis() + 1);
        assert!(previews > calls.len() as u64);
        // Every analysed frame was captured well after the previous analysis
        // began, so none sat queued while a lease was out.
        for pair in calls.windows(2) {
            let (_, previous_started) = pair[0];
            let (captured, _) = pair[1];
            assert!(captured >= previous_started + TimeDelta::milliseconds(25));
        }
    }

    #[test]
    fn empty_buffers_are_skipped_without_stopping_capture() {
        let provider = provider().with_empty_frames(5);
        let mut session = CameraSession::new(Arc::new(provider), 4);
        let mut preview_rx = session.subscribe_preview();
        let (analyzer, mut result_rx) = analyzer();

        session.bind(LensFacing::Front, request(), analyzer).unwrap();

        wait_for(|| preview_rx.try_recv().ok());
        let result = wait_for(|| result_rx.try_recv().ok());
        assert_eq!(result.classification.top().unwrap().label, "without_mask");
        assert_eq!(session.state(), SessionState::Bound);
    }
}
