use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::error::{engine_error, Result};

/// Longest stderr excerpt recorded on an engine failure.
const STDERR_EXCERPT_LEN: usize = 2000;

/// Video codec handling for one invocation. Filtering and stream-copy are
/// mutually exclusive: any video filter forces a re-encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecDirective {
    Copy,
    Reencode { codec: String, preset: String, crf: u32 },
}

/// Everything needed for one engine invocation, rendered to argv
/// deterministically.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    pub input: PathBuf,
    pub filter_complex: Option<String>,
    pub audio_filter: Option<String>,
    pub maps: Vec<String>,
    pub video_codec: CodecDirective,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub threads: u32,
    pub output: PathBuf,
    pub overwrite: bool,
}

impl InvocationSpec {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            self.input.to_string_lossy().into_owned(),
            "-threads".to_string(),
            self.threads.to_string(),
        ];

        if let Some(ref filter) = self.filter_complex {
            args.push("-filter_complex".to_string());
            args.push(filter.clone());
        }

        for map in &self.maps {
            args.push("-map".to_string());
            args.push(map.clone());
        }

        if let Some(ref af) = self.audio_filter {
            args.push("-af".to_string());
            args.push(af.clone());
        }

        args.push("-c:a".to_string());
        args.push(self.audio_codec.clone());
        args.push("-b:a".to_string());
        args.push(self.audio_bitrate.clone());

        match &self.video_codec {
            CodecDirective::Copy => {
                args.push("-c:v".to_string());
                args.push("copy".to_string());
            }
            CodecDirective::Reencode { codec, preset, crf } => {
                args.push("-c:v".to_string());
                args.push(codec.clone());
                args.push("-preset".to_string());
                args.push(preset.clone());
                args.push("-crf".to_string());
                args.push(crf.to_string());
            }
        }

        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push(self.output.to_string_lossy().into_owned());

        args
    }
}

/// Boundary to the external transcoding engine. The pipeline only talks
/// through this trait, so tests can substitute a scripted engine.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Run one invocation to completion. Blocks until the engine exits.
    async fn run(&self, spec: &InvocationSpec) -> Result<()>;

    /// Probe the duration in seconds of a media artifact.
    async fn probe_duration(&self, path: &Path) -> Result<f64>;
}

/// FFmpeg-backed engine using the system binaries.
pub struct FfmpegEngine {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }

    pub fn with_paths(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn run(&self, spec: &InvocationSpec) -> Result<()> {
        let args = spec.to_args();
        debug!("Invoking {} {}", self.ffmpeg_path, args.join(" "));

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                engine_error(
                    format!("Failed to execute {}: {}", self.ffmpeg_path, e),
                    None,
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(engine_error(
                format!(
                    "{} exited with {} for {:?}",
                    self.ffmpeg_path, output.status, spec.output
                ),
                Some(stderr_excerpt(&stderr)),
            ));
        }

        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let path_str = path.to_string_lossy();
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                path_str.as_ref(),
            ])
            .output()
            .await
            .map_err(|e| {
                engine_error(
                    format!("Failed to execute {}: {}", self.ffprobe_path, e),
                    None,
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(engine_error(
                format!("{} failed for {:?}", self.ffprobe_path, path),
                Some(stderr_excerpt(&stderr)),
            ));
        }

        let json_output = String::from_utf8(output.stdout)
            .map_err(|_| engine_error("ffprobe output is not valid UTF-8", None))?;

        let probe_data: serde_json::Value = serde_json::from_str(&json_output)
            .map_err(|e| engine_error(format!("Failed to parse ffprobe JSON: {}", e), None))?;

        let duration: f64 = probe_data
            .get("format")
            .and_then(|f| f.get("duration"))
            .and_then(|d| d.as_str())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                engine_error(format!("Could not read duration for {:?}", path), None)
            })?;

        debug!("Probed duration of {:?}: {:.2}s", path, duration);
        Ok(duration)
    }
}

/// Keep the tail of stderr, where FFmpeg prints the actual failure reason.
fn stderr_excerpt(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_EXCERPT_LEN {
        return trimmed.to_string();
    }
    let start = trimmed.len() - STDERR_EXCERPT_LEN;
    // Avoid slicing mid-codepoint
    let mut boundary = start;
    while !trimmed.is_char_boundary(boundary) {
        boundary += 1;
    }
    format!("...{}", &trimmed[boundary..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_spec() -> InvocationSpec {
        InvocationSpec {
            input: PathBuf::from("/media/in.mkv"),
            filter_complex: None,
            audio_filter: None,
            maps: vec!["0:v".to_string(), "0:a".to_string()],
            video_codec: CodecDirective::Copy,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            threads: 2,
            output: PathBuf::from("/media/out.mkv"),
            overwrite: true,
        }
    }

    #[test]
    fn test_args_copy_pass() {
        let args = base_spec().to_args();
        assert_eq!(
            args,
            vec![
                "-i", "/media/in.mkv", "-threads", "2", "-map", "0:v", "-map", "0:a",
                "-c:a", "aac", "-b:a", "192k", "-c:v", "copy", "-y", "/media/out.mkv",
            ]
        );
    }

    #[test]
    fn test_args_reencode_with_filters() {
        let mut spec = base_spec();
        spec.filter_complex = Some("[0:v]gblur=sigma=20:steps=1:enable='between(t,5,8)'[v]".to_string());
        spec.audio_filter = Some("volume=enable='between(t,5.000,8.000)':volume=0".to_string());
        spec.maps = vec!["[v]".to_string(), "0:a".to_string()];
        spec.video_codec = CodecDirective::Reencode {
            codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 20,
        };

        let args = spec.to_args();
        let filter_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        let af_pos = args.iter().position(|a| a == "-af").unwrap();
        let map_pos = args.iter().position(|a| a == "-map").unwrap();
        assert!(filter_pos < map_pos);
        assert!(map_pos < af_pos);
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-preset".to_string()));
        assert!(args.contains(&"medium".to_string()));
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"20".to_string()));
        assert!(!args.contains(&"copy".to_string()));
    }

    #[test]
    fn test_args_no_overwrite() {
        let mut spec = base_spec();
        spec.overwrite = false;
        let args = spec.to_args();
        assert!(!args.contains(&"-y".to_string()));
        assert_eq!(args.last().unwrap(), "/media/out.mkv");
    }

    #[test]
    fn test_stderr_excerpt_short_passthrough() {
        assert_eq!(stderr_excerpt("  boom  "), "boom");
    }

    #[test]
    fn test_stderr_excerpt_keeps_tail() {
        let long = "x".repeat(STDERR_EXCERPT_LEN + 100) + "tail-marker";
        let excerpt = stderr_excerpt(&long);
        assert!(excerpt.starts_with("..."));
        assert!(excerpt.ends_with("tail-marker"));
        assert!(excerpt.len() <= STDERR_EXCERPT_LEN + 3);
    }
}
