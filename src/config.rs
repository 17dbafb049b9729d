use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::camera::ProviderKind;
use crate::classifier::{ModelDevice, TensorLayout};

pub const DEFAULT_CONFIG_FILE: &str = "facemask.toml";
pub const CONFIG_PATH_ENV: &str = "FACEMASK_CONFIG";
const ENV_PREFIX: &str = "FACEMASK";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub camera: CameraSettings,
    pub model: ModelSettings,
    pub ui: UiSettings,
}

impl Settings {
    /// Loads settings from the config file named by `FACEMASK_CONFIG` (or
    /// `facemask.toml`), then applies `FACEMASK__SECTION__KEY` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("model.labels")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub provider: ProviderKind,
    pub front_index: u32,
    pub back_index: u32,
    // Sensor mounting angle reported with every frame.
    pub rotation_degrees: i32,
    pub auto_grant_permission: bool,
    pub preview_buffer_size: usize,
    pub result_buffer_size: usize,
    pub synthetic_front: bool,
    pub synthetic_back: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            front_index: 0,
            back_index: 1,
            rotation_degrees: 0,
            auto_grant_permission: false,
            preview_buffer_size: 4,
            result_buffer_size: 16,
            synthetic_front: true,
            synthetic_back: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub path: String,
    pub labels: Vec<String>,
    pub input_size: u32,
    pub layout: TensorLayout,
    pub apply_softmax: bool,
    pub device: ModelDevice,
    pub num_threads: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: "model/face_mask_detection.onnx".to_string(),
            labels: vec!["with_mask".to_string(), "without_mask".to_string()],
            input_size: 224,
            layout: TensorLayout::default(),
            apply_softmax: false,
            device: ModelDevice::default(),
            num_threads: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub title: String,
    pub width: f32,
    pub height: f32,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            title: "Face Mask Detector".to_string(),
            width: 480.0,
            height: 800.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::load_from("does/not/exist/facemask.toml").unwrap();
        assert_eq!(settings.model.num_threads, 5);
        assert_eq!(settings.model.device, ModelDevice::Gpu);
        assert_eq!(settings.model.labels, vec!["with_mask", "without_mask"]);
        assert_eq!(settings.camera.provider, ProviderKind::Native);
        assert!(!settings.camera.auto_grant_permission);
    }

    #[test]
    fn file_values_override_defaults() {
        let path = std::env::temp_dir().join(format!("facemask-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
[camera]
provider = "synthetic"
synthetic_back = false

[model]
device = "cpu"
num_threads = 2
"#,
        )
        .unwrap();

        let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.camera.provider, ProviderKind::Synthetic);
        assert!(!settings.camera.synthetic_back);
        assert!(settings.camera.synthetic_front);
        assert_eq!(settings.model.device, ModelDevice::Cpu);
        assert_eq!(settings.model.num_threads, 2);
        assert_eq!(settings.model.input_size, 224);
    }
}
