use tokio::sync::oneshot;

use crate::common::Frame;

/// A delivered frame that must be handed back before the source produces
/// the next one. Releasing happens on [`FrameLease::close`] or on drop.
#[derive(Debug)]
pub struct FrameLease {
    frame: Frame,
    release: Option<oneshot::Sender<()>>,
}

impl FrameLease {
    pub fn new(frame: Frame) -> (Self, oneshot::Receiver<()>) {
        let (release, released) = oneshot::channel();
        (
            Self {
                frame,
                release: Some(release),
            },
            released,
        )
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            // The source may already be gone after an unbind.
            let _ = release.send(());
        }
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        self.release();
    }
}
