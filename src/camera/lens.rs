use std::fmt;

use crate::camera::CameraProvider;
use crate::error::CameraError;

/// Which physical camera is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LensFacing {
    Front,
    Back,
}

impl LensFacing {
    pub fn toggled(self) -> Self {
        match self {
            LensFacing::Front => LensFacing::Back,
            LensFacing::Back => LensFacing::Front,
        }
    }

    /// The toggle button advertises the camera it would switch to.
    pub fn toggle_icon(self) -> &'static str {
        match self {
            LensFacing::Front => "Use rear camera",
            LensFacing::Back => "Use front camera",
        }
    }
}

impl fmt::Display for LensFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
        }
    }
}

fn has_camera(provider: &dyn CameraProvider, facing: LensFacing) -> bool {
    match provider.has_camera(facing) {
        Ok(present) => present,
        Err(e) => {
            tracing::warn!("Could not query {} camera: {}", facing, e);
            false
        }
    }
}

/// Prefers the front camera, falls back to the back one, and fails when
/// neither exists.
pub fn select_initial_facing(provider: &dyn CameraProvider) -> Result<LensFacing, CameraError> {
    if has_camera(provider, LensFacing::Front) {
        Ok(LensFacing::Front)
    } else if has_camera(provider, LensFacing::Back) {
        Ok(LensFacing::Back)
    } else {
        Err(CameraError::NoCameraAvailable)
    }
}

/// Switching lenses only makes sense with both cameras present. A failed
/// capability query disables the toggle rather than failing the caller.
pub fn toggle_available(provider: &dyn CameraProvider) -> bool {
    let query = || -> Result<bool, CameraError> {
        Ok(provider.has_camera(LensFacing::Back)? && provider.has_camera(LensFacing::Front)?)
    };
    match query() {
        Ok(available) => available,
        Err(e) => {
            tracing::warn!("Disabling lens toggle: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::SyntheticCameraProvider;

    #[test]
    fn toggling_twice_restores_facing() {
        for facing in [LensFacing::Front, LensFacing::Back] {
            assert_ne!(facing.toggled(), facing);
            assert_eq!(facing.toggled().toggled(), facing);
        }
    }

    #[test]
    fn front_camera_is_preferred() {
        let provider = SyntheticCameraProvider::new(true, true);
        assert_eq!(select_initial_facing(&provider).unwrap(), LensFacing::Front);
    }

    #[test]
    fn back_camera_is_the_fallback() {
        let provider = SyntheticCameraProvider::new(false, true);
        assert_eq!(select_initial_facing(&provider).unwrap(), LensFacing::Back);
        assert!(!toggle_available(&provider));
    }

    #[test]
    fn no_camera_fails_fast() {
        let provider = SyntheticCameraProvider::new(false, false);
        assert!(matches!(
            select_initial_facing(&provider),
            Err(CameraError::NoCameraAvailable)
        ));
    }

    #[test]
    fn capability_errors_disable_the_toggle() {
        let provider = SyntheticCameraProvider::new(true, true).with_failing_queries();
        assert!(!toggle_available(&provider));
    }

    #[test]
    fn toggle_needs_both_cameras() {
        assert!(toggle_available(&SyntheticCameraProvider::new(true, true)));
        assert!(!toggle_available(&SyntheticCameraProvider::new(true, false)));
    }
}
