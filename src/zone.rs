use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::error::{validation_error, VidscrubError, Result};

/// How a skip zone modifies the video during its time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneMode {
    /// Remove the frames entirely, shortening the output
    Cut,
    /// Blur the picture, duration unchanged
    Blur,
    /// Fill the picture with opaque black, duration unchanged
    Black,
}

impl ZoneMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneMode::Cut => "cut",
            ZoneMode::Blur => "blur",
            ZoneMode::Black => "black",
        }
    }

    /// Whether this mode obscures the picture in place (blur or black).
    pub fn is_obscure(&self) -> bool {
        matches!(self, ZoneMode::Blur | ZoneMode::Black)
    }
}

impl std::str::FromStr for ZoneMode {
    type Err = VidscrubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cut" => Ok(ZoneMode::Cut),
            "blur" => Ok(ZoneMode::Blur),
            "black" => Ok(ZoneMode::Black),
            _ => Err(validation_error(
                "mode",
                format!("Invalid zone mode '{}'. Valid options: cut, blur, black", s),
            )),
        }
    }
}

/// A user-authored time range carrying an obscuring or removal intent.
///
/// Unlike detected mute segments, zones keep their identity and are never
/// merged with each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipZone {
    pub id: String,
    pub start: f64,
    pub end: f64,
    pub start_display: String,
    pub end_display: String,
    pub description: String,
    pub mode: ZoneMode,
    #[serde(default)]
    pub audio_suppress: bool,
}

impl SkipZone {
    /// Build a zone from raw seconds, generating its id and display strings.
    pub fn new(
        start: f64,
        end: f64,
        description: impl Into<String>,
        mode: ZoneMode,
        audio_suppress: bool,
    ) -> Result<Self> {
        let zone = Self {
            id: Uuid::new_v4().to_string(),
            start,
            end,
            start_display: format_timestamp(start),
            end_display: format_timestamp(end),
            description: description.into(),
            mode,
            audio_suppress,
        };
        zone.validate()?;
        Ok(zone)
    }

    /// Build a zone from user-entered timestamp strings.
    pub fn from_timestamps(
        start: &str,
        end: &str,
        description: impl Into<String>,
        mode: ZoneMode,
        audio_suppress: bool,
    ) -> Result<Self> {
        let (start_secs, end_secs, start_display, end_display) =
            validate_zone_timestamps(start, end)?;
        let zone = Self {
            id: Uuid::new_v4().to_string(),
            start: start_secs,
            end: end_secs,
            start_display,
            end_display,
            description: description.into(),
            mode,
            audio_suppress,
        };
        zone.validate()?;
        Ok(zone)
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Authoring-time validation. A removed interval cannot also be muted,
    /// so `audio_suppress` is only legal on obscure modes.
    pub fn validate(&self) -> Result<()> {
        if self.end <= self.start {
            return Err(validation_error(
                "end",
                format!(
                    "Zone end ({}) must be after start ({})",
                    self.end, self.start
                ),
            ));
        }
        if self.audio_suppress && self.mode == ZoneMode::Cut {
            return Err(validation_error(
                "audio_suppress",
                "Audio suppression can only be enabled on blur or black zones",
            ));
        }
        Ok(())
    }
}

/// The zones attached to one video, owned by the scene-editing collaborator
/// and loaded fresh at compile time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoZoneSet {
    pub video_path: String,
    pub title: String,
    #[serde(default)]
    pub zones: Vec<SkipZone>,
    pub last_modified: DateTime<Utc>,
}

impl VideoZoneSet {
    pub fn new(video_path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            video_path: video_path.into(),
            title: title.into(),
            zones: Vec::new(),
            last_modified: Utc::now(),
        }
    }

    pub fn add_zone(&mut self, zone: SkipZone) {
        self.zones.push(zone);
        self.last_modified = Utc::now();
    }

    /// Remove a zone by id. Returns true if something was removed.
    pub fn remove_zone(&mut self, zone_id: &str) -> bool {
        let before = self.zones.len();
        self.zones.retain(|z| z.id != zone_id);
        if self.zones.len() < before {
            self.last_modified = Utc::now();
            true
        } else {
            false
        }
    }

    pub fn get_zone(&self, zone_id: &str) -> Option<&SkipZone> {
        self.zones.iter().find(|z| z.id == zone_id)
    }

    /// Replace a zone by id, keeping the original id. Returns true if found.
    pub fn update_zone(&mut self, zone_id: &str, mut updated: SkipZone) -> bool {
        for zone in self.zones.iter_mut() {
            if zone.id == zone_id {
                updated.id = zone_id.to_string();
                *zone = updated;
                self.last_modified = Utc::now();
                return true;
            }
        }
        false
    }

    pub fn zones_by_mode(&self, mode: ZoneMode) -> Vec<&SkipZone> {
        self.zones.iter().filter(|z| z.mode == mode).collect()
    }

    pub fn audio_suppressed_zones(&self) -> Vec<&SkipZone> {
        self.zones.iter().filter(|z| z.audio_suppress).collect()
    }

    /// Validate every zone in the set before compilation.
    pub fn validate(&self) -> Result<()> {
        for zone in &self.zones {
            zone.validate()?;
        }
        Ok(())
    }

    /// Load a zone set document from JSON.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).await.map_err(|e| {
            VidscrubError::FileSystem {
                source: e,
                path: path.as_ref().to_path_buf(),
            }
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            validation_error(
                "zone_set",
                format!("Failed to parse zone set JSON: {}", e),
            )
        })
    }

    /// Save the zone set document as JSON.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            validation_error(
                "zone_set",
                format!("Failed to serialize zone set: {}", e),
            )
        })?;
        fs::write(path.as_ref(), json).await.map_err(|e| {
            VidscrubError::FileSystem {
                source: e,
                path: path.as_ref().to_path_buf(),
            }
        })
    }

    pub fn default_zone_path(video_path: &Path) -> PathBuf {
        let mut path = video_path.to_path_buf();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("video")
            .to_string();
        path.set_file_name(format!("{}.zones.json", stem));
        path
    }
}

/// Parse `H:MM:SS`, `MM:SS` or `SS` (components may be fractional) to seconds.
pub fn parse_timestamp(timestamp: &str) -> Result<f64> {
    let parts: Vec<&str> = timestamp.trim().split(':').collect();

    let parse_part = |part: &str| -> Result<f64> {
        part.parse::<f64>().map_err(|_| {
            validation_error(
                "timestamp",
                format!("Invalid timestamp format: {}", timestamp),
            )
        })
    };

    match parts.as_slice() {
        [hours, minutes, seconds] => {
            Ok(parse_part(hours)? * 3600.0 + parse_part(minutes)? * 60.0 + parse_part(seconds)?)
        }
        [minutes, seconds] => Ok(parse_part(minutes)? * 60.0 + parse_part(seconds)?),
        [seconds] => parse_part(seconds),
        _ => Err(validation_error(
            "timestamp",
            format!("Invalid timestamp format: {}", timestamp),
        )),
    }
}

/// Render seconds as zero-padded `MM:SS`, or `HH:MM:SS` once hours appear.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Parse a zone's timestamp pair and return seconds plus canonical displays.
pub fn validate_zone_timestamps(start: &str, end: &str) -> Result<(f64, f64, String, String)> {
    let start_secs = parse_timestamp(start)?;
    let end_secs = parse_timestamp(end)?;

    if end_secs <= start_secs {
        return Err(validation_error(
            "end",
            "End timestamp must be after start timestamp",
        ));
    }

    Ok((
        start_secs,
        end_secs,
        format_timestamp(start_secs),
        format_timestamp(end_secs),
    ))
}
