const RATIO_4_3_VALUE: f64 = 4.0 / 3.0;
const RATIO_16_9_VALUE: f64 = 16.0 / 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    Ratio4x3,
    Ratio16x9,
}

impl AspectRatio {
    /// Picks whichever standard ratio is closer to the surface, ties going to
    /// 4:3. Orientation does not matter.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        let (long, short) = (width.max(height), width.min(height));
        if short == 0 {
            return AspectRatio::default();
        }
        let ratio = long as f64 / short as f64;
        if (ratio - RATIO_4_3_VALUE).abs() <= (ratio - RATIO_16_9_VALUE).abs() {
            AspectRatio::Ratio4x3
        } else {
            AspectRatio::Ratio16x9
        }
    }

    /// Capture resolution requested from the camera for this ratio.
    pub fn target_resolution(&self) -> (u32, u32) {
        match self {
            AspectRatio::Ratio4x3 => (640, 480),
            AspectRatio::Ratio16x9 => (1280, 720),
        }
    }
}
