use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::camera::{CameraProvider, CaptureRequest, FrameSource, LensFacing, OpenSource};
use crate::common::{frame::chroma_dimensions, Frame, PixelLayout};
use crate::error::CameraError;

const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// A camera that renders a moving NV12 test pattern. Handy on machines
/// without a webcam and in tests.
#[derive(Debug, Clone)]
pub struct SyntheticCameraProvider {
    front: bool,
    back: bool,
    failing_queries: bool,
    failing_open: bool,
    frame_interval: Duration,
    empty_frames: usize,
    opened: Arc<AtomicUsize>,
    queries: Arc<AtomicUsize>,
}

impl SyntheticCameraProvider {
    pub fn new(front: bool, back: bool) -> Self {
        Self {
            front,
            back,
            failing_queries: false,
            failing_open: false,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            empty_frames: 0,
            opened: Arc::new(AtomicUsize::new(0)),
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Capability queries report the camera info as unavailable.
    pub fn with_failing_queries(mut self) -> Self {
        self.failing_queries = true;
        self
    }

    /// Sources fail to start, as a camera held by another process would.
    pub fn with_failing_open(mut self) -> Self {
        self.failing_open = true;
        self
    }

    pub fn with_frame_interval(mut self, frame_interval: Duration) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    /// Each new source first reports `n` empty buffers, like a camera that is
    /// still warming up.
    pub fn with_empty_frames(mut self, n: usize) -> Self {
        self.empty_frames = n;
        self
    }

    /// How many sources were successfully started.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// How many capability queries were made, including those done by `open`.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl CameraProvider for SyntheticCameraProvider {
    fn has_camera(&self, facing: LensFacing) -> Result<bool, CameraError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing_queries {
            return Err(CameraError::InfoUnavailable(
                facing,
                "synthetic query failure".to_string(),
            ));
        }
        Ok(match facing {
            LensFacing::Front => self.front,
            LensFacing::Back => self.back,
        })
    }

    fn open(&self, facing: LensFacing, request: CaptureRequest) -> Result<OpenSource, CameraError> {
        if !self.has_camera(facing)? {
            return Err(CameraError::MissingLens(facing));
        }
        let failing_open = self.failing_open;
        let frame_interval = self.frame_interval;
        let empty_frames = self.empty_frames;
        let opened = self.opened.clone();
        Ok(Box::new(move || {
            if failing_open {
                return Err(CameraError::Binding(format!(
                    "synthetic {} camera refused to start",
                    facing
                )));
            }
            opened.fetch_add(1, Ordering::SeqCst);
            let mut source = TestPatternSource::new(facing, request, frame_interval);
            source.empty_frames = empty_frames;
            let source: Box<dyn FrameSource> = Box::new(source);
            Ok(source)
        }))
    }
}

struct TestPatternSource {
    facing: LensFacing,
    request: CaptureRequest,
    frame_interval: Duration,
    empty_frames: usize,
    tick: u32,
}

impl TestPatternSource {
    fn new(facing: LensFacing, request: CaptureRequest, frame_interval: Duration) -> Self {
        Self {
            facing,
            request,
            frame_interval,
            empty_frames: 0,
            tick: 0,
        }
    }

    fn render(&self) -> Vec<u8> {
        let (width, height) = self.request.resolution;
        let (chroma_width, chroma_height) = chroma_dimensions(width, height);
        let mut data = Vec::with_capacity(PixelLayout::Nv12.frame_len(width, height));

        // Diagonal luma ramp that scrolls with every tick.
        for y in 0..height {
            for x in 0..width {
                data.push(((x + y + self.tick) % 220 + 16) as u8);
            }
        }

        // The two lenses get different tints so switching is visible.
        let (u, v) = match self.facing {
            LensFacing::Front => (100u8, 160u8),
            LensFacing::Back => (160u8, 100u8),
        };
        for _ in 0..chroma_height {
            for _ in 0..chroma_width {
                data.push(u);
                data.push(v);
            }
        }
        data
    }
}

impl FrameSource for TestPatternSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        if !self.frame_interval.is_zero() {
            std::thread::sleep(self.frame_interval);
        }
        if self.empty_frames > 0 {
            self.empty_frames -= 1;
            return Ok(None);
        }
        let (width, height) = self.request.resolution;
        let frame = Frame::new(
            width,
            height,
            PixelLayout::Nv12,
            self.render(),
            self.request.rotation,
        )
        .map_err(|e| CameraError::Capture(e.to_string()))?;
        self.tick = self.tick.wrapping_add(1);
        Ok(Some(frame))
    }
}
