use chrono::{DateTime, Utc};

use crate::app::indicator::Indicator;
use crate::app::views::View;
use crate::pipeline::ClassifiedFrame;

/// Label and confidence bar for the most recent classification.
#[derive(Default)]
pub struct ResultView {
    indicator: Option<Indicator>,
    captured_at: Option<DateTime<Utc>>,
}

impl ResultView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indicator(&self) -> Option<&Indicator> {
        self.indicator.as_ref()
    }

    /// When the frame behind the shown result was captured.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    /// Results without categories leave the previous indicator in place.
    pub fn apply(&mut self, classified: &ClassifiedFrame) {
        if let Some(top) = classified.classification.top() {
            self.indicator = Some(Indicator::from_category(top));
            self.captured_at = Some(classified.captured_at);
        }
    }
}

impl View for ResultView {
    fn draw(&mut self, ui: &mut egui::Ui) {
        let Some(indicator) = &self.indicator else {
            ui.label("No result yet");
            return;
        };

        ui.label(
            egui::RichText::new(&indicator.label)
                .size(28.0)
                .strong()
                .color(indicator.text_color()),
        );
        ui.add(
            egui::ProgressBar::new(indicator.progress_fraction())
                .fill(indicator.progress_tint())
                .text(format!("{}%", indicator.progress)),
        );
        if let Some(captured_at) = self.captured_at {
            ui.small(format!("Frame captured {}", captured_at.format("%H:%M:%S%.3f")));
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::app::indicator::IndicatorColor;
    use crate::classifier::Classification;

    fn classified(scores: &[f32]) -> ClassifiedFrame {
        classified_at(scores, Utc::now())
    }

    fn classified_at(scores: &[f32], captured_at: DateTime<Utc>) -> ClassifiedFrame {
        let labels = vec!["with_mask".to_string(), "without_mask".to_string()];
        ClassifiedFrame {
            frame_id: Uuid::new_v4(),
            captured_at,
            classification: Classification::from_scores(&labels, scores).unwrap(),
        }
    }

    #[test]
    fn shows_the_top_category() {
        let mut view = ResultView::new();
        assert!(view.indicator().is_none());

        view.apply(&classified(&[0.25, 0.75]));
        let indicator = view.indicator().unwrap();
        assert_eq!(indicator.label, "without_mask");
        assert_eq!(indicator.color, IndicatorColor::Alert);
        assert_eq!(indicator.progress, 75);

        view.apply(&classified(&[0.5, 0.25]));
        assert_eq!(view.indicator().unwrap().color, IndicatorColor::Safe);
    }

    #[test]
    fn empty_results_keep_the_previous_frame() {
        let mut view = ResultView::new();
        let first = Utc::now();
        view.apply(&classified_at(&[0.5, 0.25], first));

        let empty = ClassifiedFrame {
            frame_id: Uuid::new_v4(),
            captured_at: Utc::now(),
            classification: Classification::default(),
        };
        view.apply(&empty);

        assert_eq!(view.captured_at(), Some(first));
        assert_eq!(view.indicator().unwrap().label, "with_mask");
    }
}
