use egui::Color32;

use crate::classifier::{Category, WITHOUT_MASK_LABEL};

const RED: Color32 = Color32::from_rgb(0xE5, 0x39, 0x35);
const GREEN: Color32 = Color32::from_rgb(0x43, 0xA0, 0x47);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Alert,
    Safe,
}

impl IndicatorColor {
    pub fn for_label(label: &str) -> Self {
        if label == WITHOUT_MASK_LABEL {
            IndicatorColor::Alert
        } else {
            IndicatorColor::Safe
        }
    }

    pub fn color(&self) -> Color32 {
        match self {
            IndicatorColor::Alert => RED,
            IndicatorColor::Safe => GREEN,
        }
    }
}

/// Everything the screen shows for the top category: label text and its
/// color, the preview border, and the tinted confidence bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub label: String,
    pub color: IndicatorColor,
    pub progress: u8,
}

impl Indicator {
    pub fn from_category(category: &Category) -> Self {
        Self {
            label: category.label.clone(),
            color: IndicatorColor::for_label(&category.label),
            progress: (category.score * 100.0).clamp(0.0, 100.0) as u8,
        }
    }

    pub fn text_color(&self) -> Color32 {
        self.color.color()
    }

    pub fn border_color(&self) -> Color32 {
        self.color.color()
    }

    pub fn progress_tint(&self) -> Color32 {
        self.color.color()
    }

    pub fn progress_fraction(&self) -> f32 {
        self.progress as f32 / 100.0
    }
}
