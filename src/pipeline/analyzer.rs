use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tower::{Service, ServiceExt};

use crate::camera::FrameLease;
use crate::error::AppError;
use crate::pipeline::ClassifiedFrame;

/// The analysis use-case: one dedicated worker thread that takes leased
/// frames one at a time, runs them through the analysis service and
/// publishes results for the UI.
pub struct Analyzer {
    frame_tx: mpsc::Sender<FrameLease>,
    worker: JoinHandle<()>,
}

impl Analyzer {
    pub fn spawn<S>(service: S, result_tx: mpsc::Sender<ClassifiedFrame>) -> Result<Self, AppError>
    where
        S: Service<FrameLease, Response = Option<ClassifiedFrame>, Error = AppError>
            + Send
            + 'static,
    {
        // A single slot: the source holds the next frame until this one is
        // released anyway.
        let (frame_tx, frame_rx) = mpsc::channel(1);
        let worker = std::thread::Builder::new()
            .name("frame-analysis".to_string())
            .spawn(move || Self::run(service, frame_rx, result_tx))
            .map_err(|e| AppError::Pipeline(format!("Failed to start analysis worker: {}", e)))?;
        Ok(Self { frame_tx, worker })
    }

    /// Where the capture side delivers frames for analysis.
    pub fn sender(&self) -> mpsc::Sender<FrameLease> {
        self.frame_tx.clone()
    }

    /// Closes this handle's side of the frame channel and waits for the worker
    /// to drain. The worker only stops once every sender is gone.
    pub fn join(self) {
        let Analyzer { frame_tx, worker } = self;
        drop(frame_tx);
        if worker.join().is_err() {
            tracing::error!("Analysis worker panicked");
        }
    }

    fn run<S>(
        mut service: S,
        mut frame_rx: mpsc::Receiver<FrameLease>,
        result_tx: mpsc::Sender<ClassifiedFrame>,
    ) where
        S: Service<FrameLease, Response = Option<ClassifiedFrame>, Error = AppError>,
    {
        tracing::debug!("Analysis worker started");
        while let Some(lease) = frame_rx.blocking_recv() {
            let outcome = futures::executor::block_on(async {
                service.ready().await?.call(lease).await
            });
            match outcome {
                Ok(Some(classified)) => match result_tx.try_send(classified) {
                    Ok(_) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!("Dropping classification: UI is not keeping up");
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::info!("Result channel closed, stopping analysis worker");
                        break;
                    }
                },
                Ok(None) => {}
                Err(e) => tracing::error!("Analysis failed: {}", e),
            }
        }
        tracing::debug!("Analysis worker stopped");
    }
}
