use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info};

use crate::app::controller::{CameraController, CameraControllerBuilder, PermissionStatus};
use crate::app::views::{PreviewView, ResultView, View};
use crate::camera::CameraProvider;
use crate::classifier::Classifier;
use crate::config::Settings;
use crate::error::AppError;
use crate::pipeline::ClassifiedFrame;

const TERMINATE_DELAY: Duration = Duration::from_secs(2);
// A window size must hold this long before the lens controls are re-evaluated.
const RESIZE_SETTLE: Duration = Duration::from_millis(300);

/// Error that ended the application, handed back to `main` once the window
/// has closed.
pub type ExitSlot = Arc<Mutex<Option<AppError>>>;

enum Screen {
    RequestingPermission,
    Running,
    Terminating { message: String, since: Instant },
}

pub struct MaskDetectorApp {
    controller: CameraController,
    result_rx: mpsc::Receiver<ClassifiedFrame>,
    preview: PreviewView,
    result: ResultView,
    screen: Screen,
    window_size: (u32, u32),
    pending_size: Option<((u32, u32), Instant)>,
    exit: ExitSlot,
    errors: Vec<AppError>,
}

impl MaskDetectorApp {
    pub fn new(
        controller: CameraController,
        result_rx: mpsc::Receiver<ClassifiedFrame>,
        auto_grant_permission: bool,
        exit: ExitSlot,
    ) -> Self {
        let preview = PreviewView::new(controller.subscribe_preview());
        let mut app = Self {
            controller,
            result_rx,
            preview,
            result: ResultView::new(),
            screen: Screen::RequestingPermission,
            window_size: (0, 0),
            pending_size: None,
            exit,
            errors: Vec::new(),
        };
        if auto_grant_permission {
            app.handle_permission(PermissionStatus::Granted);
        }
        app
    }

    pub fn start_gui(
        settings: &Settings,
        provider: Arc<dyn CameraProvider>,
        classifier: Box<dyn Classifier>,
    ) -> Result<(), AppError> {
        let (controller, result_rx) = CameraControllerBuilder::new(provider, classifier)
            .camera_settings(&settings.camera)?
            .display_size(settings.ui.width as u32, settings.ui.height as u32)
            .build();

        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size(egui::vec2(settings.ui.width, settings.ui.height))
                .with_title(settings.ui.title.clone()),
            ..Default::default()
        };

        let exit: ExitSlot = Arc::new(Mutex::new(None));
        let app_exit = exit.clone();
        let auto_grant = settings.camera.auto_grant_permission;
        eframe::run_native(
            &settings.ui.title,
            options,
            Box::new(move |_cc| {
                Ok(Box::new(MaskDetectorApp::new(
                    controller, result_rx, auto_grant, app_exit,
                )))
            }),
        )
        .map_err(|e| AppError::Ui(e.to_string()))?;

        let fatal = exit
            .lock()
            .map_err(|_| AppError::Ui("Exit slot poisoned".to_string()))?
            .take();
        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn handle_permission(&mut self, status: PermissionStatus) {
        match self.controller.on_permission_result(status) {
            Ok(()) => {
                info!("Camera running");
                self.screen = Screen::Running;
            }
            Err(e) => self.terminate(e),
        }
    }

    fn terminate(&mut self, e: AppError) {
        error!("Terminating: {}", e);
        self.screen = Screen::Terminating {
            message: e.to_string(),
            since: Instant::now(),
        };
        if let Ok(mut slot) = self.exit.lock() {
            *slot = Some(e);
        }
    }

    /// Applies every classification that arrived since the last repaint.
    fn drain_results(&mut self) {
        loop {
            match self.result_rx.try_recv() {
                Ok(classified) => {
                    debug!(
                        "Result for frame {} captured at {}",
                        classified.frame_id, classified.captured_at
                    );
                    self.result.apply(&classified);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.errors
                        .push(AppError::Ui("Result channel disconnected".to_string()));
                    break;
                }
            }
        }
        if let Some(indicator) = self.result.indicator() {
            self.preview.set_border_color(indicator.border_color());
        }
        self.errors.extend(self.controller.take_errors());
    }

    fn track_window_size(&mut self, ctx: &egui::Context) {
        let size = ctx.screen_rect().size();
        self.note_window_size((size.x as u32, size.y as u32), Instant::now());
    }

    /// Forwards a size change to the controller once it has settled. Nothing
    /// is forwarded until the camera is running.
    fn note_window_size(&mut self, size: (u32, u32), now: Instant) {
        if !matches!(self.screen, Screen::Running) {
            return;
        }
        if size == self.window_size {
            self.pending_size = None;
            return;
        }
        let since = match self.pending_size {
            Some((pending, since)) if pending == size => since,
            _ => {
                self.pending_size = Some((size, now));
                now
            }
        };
        if now.duration_since(since) >= RESIZE_SETTLE {
            self.window_size = size;
            self.pending_size = None;
            self.controller.on_configuration_changed(size.0, size.1);
        }
    }

    fn draw_permission_prompt(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading("Camera access");
                ui.label("The detector needs the camera to check for face masks.");
                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Allow").clicked() {
                        self.handle_permission(PermissionStatus::Granted);
                    }
                    if ui.button("Deny").clicked() {
                        self.handle_permission(PermissionStatus::Denied);
                    }
                });
            });
        });
    }

    fn draw_running(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("error_panel")
            .resizable(true)
            .show(ctx, |ui| {
                ui.heading("Error Log");
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for error in self.errors.iter().rev() {
                        ui.label(format!("[ERROR] {}", error));
                    }
                });
            });

        egui::TopBottomPanel::bottom("result_panel").show(ctx, |ui| {
            self.result.draw(ui);
            ui.separator();

            ui.horizontal(|ui| {
                let facing = self.controller.lens_facing();
                let toggle = ui.add_enabled(
                    self.controller.lens_toggle_enabled(),
                    egui::Button::new(facing.toggle_icon()),
                );
                if toggle.clicked() {
                    self.controller.toggle_lens();
                }
                ui.label(format!("Camera: {}", facing));
            });

            ui.collapsing("Analysis Statistics", |ui| {
                let stats = self.controller.stats();
                ui.label(format!("Frames Analyzed: {}", stats.frames_analyzed));
                ui.label(format!("Frames Skipped: {}", stats.frames_skipped));
                ui.label(format!("Frames Shown: {}", self.preview.frames_shown()));
                match stats.last_confidence {
                    Some(confidence) => {
                        ui.label(format!("Last Confidence: {:.2}", confidence));
                    }
                    None => {
                        ui.label("Last Confidence: -");
                    }
                }
                ui.label(format!(
                    "Average Confidence: {:.2}",
                    stats.average_confidence
                ));
                ui.label(format!("Last Inference: {:?}", stats.last_latency));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.preview.draw(ui);
        });
    }

    fn draw_terminating(&self, ctx: &egui::Context, message: &str) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading(message);
            });
        });
    }
}

impl eframe::App for MaskDetectorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Screen::Terminating { message, since } = &self.screen {
            self.draw_terminating(ctx, message);
            if since.elapsed() >= TERMINATE_DELAY {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
            ctx.request_repaint_after(Duration::from_millis(100));
            return;
        }

        match self.screen {
            Screen::RequestingPermission => self.draw_permission_prompt(ctx),
            _ => {
                self.track_window_size(ctx);
                self.drain_results();
                self.draw_running(ctx);
            }
        }
        ctx.request_repaint();
    }
}
