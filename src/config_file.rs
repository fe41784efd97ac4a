use crate::config::EncodeConfigBuilder;
use crate::error::{Result, VidscrubError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Settings file format that can be serialized to YAML/JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    /// Video codec for re-encoding passes
    pub video_codec: Option<String>,
    /// Encoder preset for obscure passes
    pub quality_preset: Option<String>,
    /// CRF for obscure passes
    pub quality_crf: Option<u32>,
    /// Encoder preset for cut passes
    pub throughput_preset: Option<String>,
    /// CRF for cut passes
    pub throughput_crf: Option<u32>,
    /// Audio codec
    pub audio_codec: Option<String>,
    /// Audio bitrate
    pub audio_bitrate: Option<String>,
    /// FFmpeg thread count
    pub threads: Option<u32>,
    /// Seconds of padding before each detected mute interval
    pub mute_padding_before: Option<f64>,
    /// Seconds of padding after each detected mute interval
    pub mute_padding_after: Option<f64>,
    /// Directory for the processing status document
    pub status_dir: Option<PathBuf>,
    /// Enable progress indicators by default
    pub show_progress: Option<bool>,
}

impl SettingsFile {
    /// Load settings from a YAML file
    pub async fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).await.map_err(|e| {
            VidscrubError::FileSystem {
                source: e,
                path: path.as_ref().to_path_buf(),
            }
        })?;

        serde_yaml::from_str(&contents).map_err(|e| VidscrubError::Config {
            field: "config_file".to_string(),
            message: format!("Failed to parse YAML config: {}", e),
        })
    }

    /// Load settings from a JSON file
    pub async fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).await.map_err(|e| {
            VidscrubError::FileSystem {
                source: e,
                path: path.as_ref().to_path_buf(),
            }
        })?;

        serde_json::from_str(&contents).map_err(|e| VidscrubError::Config {
            field: "config_file".to_string(),
            message: format!("Failed to parse JSON config: {}", e),
        })
    }

    /// Auto-detect and load settings based on extension
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Self::load_yaml(path).await,
            Some("json") => Self::load_json(path).await,
            _ => Err(VidscrubError::Config {
                field: "config_file".to_string(),
                message: "Config file must have .yaml, .yml, or .json extension".to_string(),
            }),
        }
    }

    /// Save settings to a YAML file
    pub async fn save_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml_content = serde_yaml::to_string(self).map_err(|e| VidscrubError::Config {
            field: "config_file".to_string(),
            message: format!("Failed to serialize config to YAML: {}", e),
        })?;

        fs::write(path.as_ref(), yaml_content)
            .await
            .map_err(|e| VidscrubError::FileSystem {
                source: e,
                path: path.as_ref().to_path_buf(),
            })
    }

    /// Get default config file paths to search
    pub fn default_config_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from(".vidscrub.yaml"),
            PathBuf::from(".vidscrub.yml"),
            PathBuf::from(".vidscrub.json"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("vidscrub")
                .join("config.yaml"),
        ]
    }

    /// Try to load settings from default locations
    pub async fn load_from_default_locations() -> Option<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::load(&path).await {
                    Ok(config) => {
                        log::info!("Loaded configuration from: {}", path.display());
                        return Some(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", path.display(), e);
                    }
                }
            }
        }
        None
    }

    /// Apply this settings file to an EncodeConfigBuilder
    pub fn apply_to_builder(&self, mut builder: EncodeConfigBuilder) -> Result<EncodeConfigBuilder> {
        if let Some(ref codec) = self.video_codec {
            builder = builder.video_codec(codec.clone());
        }
        if let Some(ref preset) = self.quality_preset {
            builder = builder.quality_preset(preset.clone());
        }
        if let Some(crf) = self.quality_crf {
            builder = builder.quality_crf(crf)?;
        }
        if let Some(ref preset) = self.throughput_preset {
            builder = builder.throughput_preset(preset.clone());
        }
        if let Some(crf) = self.throughput_crf {
            builder = builder.throughput_crf(crf)?;
        }
        if let Some(ref codec) = self.audio_codec {
            builder = builder.audio_codec(codec.clone());
        }
        if let Some(ref bitrate) = self.audio_bitrate {
            builder = builder.audio_bitrate(bitrate.clone());
        }
        if let Some(threads) = self.threads {
            builder = builder.threads(threads)?;
        }
        if self.mute_padding_before.is_some() || self.mute_padding_after.is_some() {
            builder = builder.mute_padding(
                self.mute_padding_before.unwrap_or(0.5),
                self.mute_padding_after.unwrap_or(0.5),
            )?;
        }
        Ok(builder)
    }

    /// The directory the status document lives in
    pub fn resolved_status_dir(&self) -> PathBuf {
        self.status_dir.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("vidscrub")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncodeConfig;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_settings_yaml_round_trip() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("test.yaml");

        let original = SettingsFile {
            video_codec: Some("libx265".to_string()),
            quality_crf: Some(18),
            threads: Some(4),
            ..Default::default()
        };

        original.save_yaml(&config_path).await.unwrap();
        let loaded = SettingsFile::load_yaml(&config_path).await.unwrap();

        assert_eq!(original.video_codec, loaded.video_codec);
        assert_eq!(original.quality_crf, loaded.quality_crf);
        assert_eq!(original.threads, loaded.threads);
    }

    #[tokio::test]
    async fn test_settings_json_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("test.json");
        std::fs::write(
            &config_path,
            r#"{"throughput_preset": "ultrafast", "mute_padding_before": 0.3}"#,
        )
        .unwrap();

        let loaded = SettingsFile::load(&config_path).await.unwrap();
        assert_eq!(loaded.throughput_preset.as_deref(), Some("ultrafast"));
        assert_eq!(loaded.mute_padding_before, Some(0.3));
    }

    #[tokio::test]
    async fn test_settings_rejects_unknown_extension() {
        assert!(SettingsFile::load("config.toml").await.is_err());
    }

    #[test]
    fn test_apply_to_builder() {
        let settings = SettingsFile {
            video_codec: Some("libx265".to_string()),
            quality_crf: Some(18),
            audio_bitrate: Some("256k".to_string()),
            ..Default::default()
        };

        let config = settings
            .apply_to_builder(EncodeConfig::builder())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.video_codec, "libx265");
        assert_eq!(config.quality_crf, 18);
        assert_eq!(config.audio_bitrate, "256k");
        // Untouched fields keep defaults
        assert_eq!(config.throughput_preset, "veryfast");
    }

    #[test]
    fn test_apply_rejects_invalid_values() {
        let settings = SettingsFile {
            quality_crf: Some(99),
            ..Default::default()
        };
        assert!(settings.apply_to_builder(EncodeConfig::builder()).is_err());
    }
}
