pub mod preview_view;
pub mod result_view;

pub use preview_view::PreviewView;
pub use result_view::ResultView;

pub trait View {
    fn draw(&mut self, ui: &mut egui::Ui);
}
