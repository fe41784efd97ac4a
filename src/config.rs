use crate::compiler::PresetClass;
use crate::engine::CodecDirective;
use crate::error::{config_error, Result};

/// Encode settings for engine invocations.
///
/// Two preset tiers exist: the quality tier for obscure passes (picture
/// content is being altered in place) and the throughput tier for cut passes
/// (frames are only re-arranged).
#[derive(Debug, Clone)]
pub struct EncodeConfig {
    pub video_codec: String,
    pub quality_preset: String,
    pub quality_crf: u32,
    pub throughput_preset: String,
    pub throughput_crf: u32,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub threads: u32,
    pub mute_padding_before: f64,
    pub mute_padding_after: f64,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            quality_preset: "medium".to_string(),
            quality_crf: 20,
            throughput_preset: "veryfast".to_string(),
            throughput_crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            threads: 2,
            mute_padding_before: 0.5,
            mute_padding_after: 0.5,
        }
    }
}

impl EncodeConfig {
    pub fn builder() -> EncodeConfigBuilder {
        EncodeConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.video_codec.trim().is_empty() {
            return Err(config_error("video_codec", "Video codec cannot be empty"));
        }
        if self.quality_crf > 51 {
            return Err(config_error(
                "quality_crf",
                format!("CRF must be between 0 and 51, got {}", self.quality_crf),
            ));
        }
        if self.throughput_crf > 51 {
            return Err(config_error(
                "throughput_crf",
                format!("CRF must be between 0 and 51, got {}", self.throughput_crf),
            ));
        }
        if self.threads == 0 {
            return Err(config_error("threads", "Thread count must be at least 1"));
        }
        if self.mute_padding_before < 0.0 || self.mute_padding_after < 0.0 {
            return Err(config_error(
                "mute_padding",
                "Mute padding cannot be negative",
            ));
        }
        Ok(())
    }

    /// The codec directive for a pass: stream-copy unless re-encoding, in
    /// which case the preset class picks the encoder tier.
    pub fn directive_for(&self, reencode: bool, preset: PresetClass) -> CodecDirective {
        if !reencode {
            return CodecDirective::Copy;
        }
        match preset {
            PresetClass::Quality => CodecDirective::Reencode {
                codec: self.video_codec.clone(),
                preset: self.quality_preset.clone(),
                crf: self.quality_crf,
            },
            PresetClass::Throughput => CodecDirective::Reencode {
                codec: self.video_codec.clone(),
                preset: self.throughput_preset.clone(),
                crf: self.throughput_crf,
            },
        }
    }
}

/// Builder pattern for EncodeConfig
#[derive(Debug, Default)]
pub struct EncodeConfigBuilder {
    video_codec: Option<String>,
    quality_preset: Option<String>,
    quality_crf: Option<u32>,
    throughput_preset: Option<String>,
    throughput_crf: Option<u32>,
    audio_codec: Option<String>,
    audio_bitrate: Option<String>,
    threads: Option<u32>,
    mute_padding_before: Option<f64>,
    mute_padding_after: Option<f64>,
}

impl EncodeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = Some(codec.into());
        self
    }

    pub fn quality_preset(mut self, preset: impl Into<String>) -> Self {
        self.quality_preset = Some(preset.into());
        self
    }

    pub fn quality_crf(mut self, crf: u32) -> Result<Self> {
        if crf > 51 {
            return Err(config_error(
                "quality_crf",
                format!("CRF must be between 0 and 51, got {}", crf),
            ));
        }
        self.quality_crf = Some(crf);
        Ok(self)
    }

    pub fn throughput_preset(mut self, preset: impl Into<String>) -> Self {
        self.throughput_preset = Some(preset.into());
        self
    }

    pub fn throughput_crf(mut self, crf: u32) -> Result<Self> {
        if crf > 51 {
            return Err(config_error(
                "throughput_crf",
                format!("CRF must be between 0 and 51, got {}", crf),
            ));
        }
        self.throughput_crf = Some(crf);
        Ok(self)
    }

    pub fn audio_codec(mut self, codec: impl Into<String>) -> Self {
        self.audio_codec = Some(codec.into());
        self
    }

    pub fn audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = Some(bitrate.into());
        self
    }

    pub fn threads(mut self, threads: u32) -> Result<Self> {
        if threads == 0 {
            return Err(config_error("threads", "Thread count must be at least 1"));
        }
        self.threads = Some(threads);
        Ok(self)
    }

    pub fn mute_padding(mut self, before: f64, after: f64) -> Result<Self> {
        if before < 0.0 || after < 0.0 {
            return Err(config_error(
                "mute_padding",
                "Mute padding cannot be negative",
            ));
        }
        self.mute_padding_before = Some(before);
        self.mute_padding_after = Some(after);
        Ok(self)
    }

    pub fn build(self) -> Result<EncodeConfig> {
        let defaults = EncodeConfig::default();
        let config = EncodeConfig {
            video_codec: self.video_codec.unwrap_or(defaults.video_codec),
            quality_preset: self.quality_preset.unwrap_or(defaults.quality_preset),
            quality_crf: self.quality_crf.unwrap_or(defaults.quality_crf),
            throughput_preset: self
                .throughput_preset
                .unwrap_or(defaults.throughput_preset),
            throughput_crf: self.throughput_crf.unwrap_or(defaults.throughput_crf),
            audio_codec: self.audio_codec.unwrap_or(defaults.audio_codec),
            audio_bitrate: self.audio_bitrate.unwrap_or(defaults.audio_bitrate),
            threads: self.threads.unwrap_or(defaults.threads),
            mute_padding_before: self
                .mute_padding_before
                .unwrap_or(defaults.mute_padding_before),
            mute_padding_after: self
                .mute_padding_after
                .unwrap_or(defaults.mute_padding_after),
        };

        config.validate()?;
        Ok(config)
    }
}
