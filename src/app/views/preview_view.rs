use egui::{Color32, TextureHandle, TextureOptions};
use image::RgbImage;
use tokio::sync::broadcast;
use tracing::warn;

use crate::app::views::View;
use crate::common::Frame;
use crate::pipeline::YuvConverter;

/// Live camera preview framed by the current result color. Fed straight from
/// the capture broadcast, so it never waits on analysis.
pub struct PreviewView {
    frame_rx: broadcast::Receiver<Frame>,
    converter: YuvConverter,
    texture: Option<TextureHandle>,
    border_color: Color32,
    frames_shown: u64,
}

impl PreviewView {
    pub fn new(frame_rx: broadcast::Receiver<Frame>) -> Self {
        Self {
            frame_rx,
            converter: YuvConverter::new(),
            texture: None,
            border_color: Color32::GRAY,
            frames_shown: 0,
        }
    }

    pub fn set_border_color(&mut self, color: Color32) {
        self.border_color = color;
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    /// Drains pending frames and converts only the newest one.
    pub fn poll_latest(&mut self) -> Option<RgbImage> {
        let mut latest = None;
        loop {
            match self.frame_rx.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Preview lagged behind, skipping {} frames", n);
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
        let image = self.converter.convert(&latest?)?;
        self.frames_shown += 1;
        Some(image)
    }

    fn upload(&mut self, ctx: &egui::Context, image: &RgbImage) {
        let color_image = egui::ColorImage::from_rgb(
            [image.width() as usize, image.height() as usize],
            image.as_raw().as_slice(),
        );
        match self.texture.as_mut() {
            Some(texture) => texture.set(color_image, TextureOptions::default()),
            None => {
                self.texture =
                    Some(ctx.load_texture("camera_preview", color_image, TextureOptions::default()));
            }
        }
    }
}

impl View for PreviewView {
    fn draw(&mut self, ui: &mut egui::Ui) {
        if let Some(image) = self.poll_latest() {
            let ctx = ui.ctx().clone();
            self.upload(&ctx, &image);
        }

        egui::Frame::default()
            .stroke(egui::Stroke::new(4.0, self.border_color))
            .show(ui, |ui| match &self.texture {
                Some(texture) => {
                    ui.add(egui::Image::new(texture).shrink_to_fit());
                }
                None => {
                    ui.label("Waiting for camera...");
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PixelLayout, Rotation};

    fn frame(width: u32, height: u32) -> Frame {
        Frame::new(
            width,
            height,
            PixelLayout::Nv21,
            vec![16u8; PixelLayout::Nv21.frame_len(width, height)],
            Rotation::Deg0,
        )
        .unwrap()
    }

    #[test]
    fn only_the_newest_frame_is_converted() {
        let (tx, rx) = broadcast::channel(8);
        let mut view = PreviewView::new(rx);
        assert!(view.poll_latest().is_none());

        tx.send(frame(4, 4)).unwrap();
        tx.send(frame(6, 2)).unwrap();
        let image = view.poll_latest().unwrap();

        assert_eq!(image.dimensions(), (6, 2));
        assert_eq!(view.frames_shown(), 1);
        assert!(view.poll_latest().is_none());
    }

    #[test]
    fn lagging_behind_still_shows_a_frame() {
        let (tx, rx) = broadcast::channel(2);
        let mut view = PreviewView::new(rx);
        for _ in 0..5 {
            tx.send(frame(4, 4)).unwrap();
        }
        assert!(view.poll_latest().is_some());
    }
}
