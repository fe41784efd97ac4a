//! Pass-plan compiler.
//!
//! Pure transform from a zone set plus detected mute segments into an ordered
//! sequence of engine passes. No process is spawned here; the plan value is
//! what makes the multi-pass control flow unit-testable.

use log::{debug, info};

use crate::error::{validation_error, Result};
use crate::filtergraph::{AudioMuteChain, CutGraph, ObscureChain, ObscureKind};
use crate::segment::{merge_segments, MuteSegment};
use crate::zone::{VideoZoneSet, ZoneMode};

/// Position of a pass within its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Single,
    FirstOfTwo,
    SecondOfTwo,
}

/// Encode preset class for a re-encoding pass. Obscure passes keep picture
/// quality; cut passes only re-arrange frames and favor throughput.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetClass {
    Quality,
    Throughput,
}

/// The video-filter half of a compiled pass.
///
/// Cut graphs keep their zone windows rather than rendered text: the second
/// pass of a two-pass plan is planned against the intermediate artifact's
/// re-probed duration at execution time.
#[derive(Debug, Clone)]
pub enum VideoFilterSpec {
    /// No video modification; the video stream can be copied
    None,
    /// In-place obscuring chain, rendered once at compile time
    Obscure(ObscureChain),
    /// Frame removal over the complement of these windows
    Cut { windows: Vec<(f64, f64)> },
}

impl VideoFilterSpec {
    pub fn is_none(&self) -> bool {
        matches!(self, VideoFilterSpec::None)
    }
}

/// One engine invocation worth of filtering.
#[derive(Debug, Clone)]
pub struct CompiledPass {
    pub kind: PassKind,
    pub video: VideoFilterSpec,
    pub audio: AudioMuteChain,
    pub reencode: bool,
    pub preset: PresetClass,
}

impl CompiledPass {
    /// Short human-readable description, used for job step names.
    pub fn describe(&self, counts: &AppliedCounts) -> String {
        match &self.video {
            VideoFilterSpec::Obscure(_) => {
                let mut kinds = Vec::new();
                if counts.blur_zones > 0 {
                    kinds.push(format!("{} blur", counts.blur_zones));
                }
                if counts.black_zones > 0 {
                    kinds.push(format!("{} black", counts.black_zones));
                }
                format!("Apply {} filter(s)", kinds.join(", "))
            }
            VideoFilterSpec::Cut { windows } => {
                format!("Cut {} skip zone(s)", windows.len())
            }
            VideoFilterSpec::None => {
                format!("Mute {} segment(s)", self.audio.segments().len())
            }
        }
    }
}

/// Zone and interval counts a plan will apply, reported on the final result
/// and mirrored into the job status document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedCounts {
    pub blur_zones: usize,
    pub black_zones: usize,
    pub cut_zones: usize,
    pub mute_segments: usize,
}

/// An ordered pass sequence for one video. An empty sequence means the video
/// is clean and the source can be copied directly.
#[derive(Debug, Clone)]
pub struct PassPlan {
    pub passes: Vec<CompiledPass>,
    pub counts: AppliedCounts,
    pub source_duration: f64,
}

impl PassPlan {
    pub fn is_clean(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn is_two_pass(&self) -> bool {
        self.passes.len() == 2
    }

    /// Passes that modify the picture (used for job step derivation).
    pub fn visual_pass_count(&self) -> usize {
        self.passes
            .iter()
            .filter(|p| !p.video.is_none())
            .count()
    }
}

/// Compile a zone set plus detected mute segments into a pass plan.
///
/// `duration` is the probed source duration in seconds; it anchors the
/// complement sweep for cut zones. Detections are taken as-is; padding and
/// upstream filtering belong to the caller.
pub fn compile(
    zone_set: &VideoZoneSet,
    detections: &[MuteSegment],
    duration: f64,
) -> Result<PassPlan> {
    // Zones are validated at authoring time, but re-check here so a
    // hand-edited zone document cannot reach the engine.
    zone_set.validate()?;

    let blur_zones = zone_set.zones_by_mode(ZoneMode::Blur);
    let black_zones = zone_set.zones_by_mode(ZoneMode::Black);
    let cut_zones = zone_set.zones_by_mode(ZoneMode::Cut);

    // Obscure chain: one stage per mode present, gated on the union of that
    // mode's zone windows.
    let mut obscure = ObscureChain::new();
    obscure.push_stage(
        ObscureKind::Blur,
        blur_zones.iter().map(|z| (z.start, z.end)).collect(),
    );
    obscure.push_stage(
        ObscureKind::Black,
        black_zones.iter().map(|z| (z.start, z.end)).collect(),
    );

    // Mute set: upstream detections plus any obscure zone that also asked for
    // audio suppression, merged into canonical form.
    let mut mute_pool: Vec<MuteSegment> = detections.to_vec();
    for zone in zone_set.audio_suppressed_zones() {
        mute_pool.push(MuteSegment {
            start: zone.start,
            end: zone.end,
            label: format!("zone:{}", zone.description),
            confidence: 1.0,
        });
    }
    let merged_mutes = merge_segments(mute_pool);
    let audio = AudioMuteChain::new(merged_mutes.clone());

    // Cut windows, validated against the source duration up front so a
    // degenerate plan fails before any engine call.
    let cut_windows: Vec<(f64, f64)> = cut_zones.iter().map(|z| (z.start, z.end)).collect();
    if !cut_windows.is_empty() {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(validation_error(
                "duration",
                format!("Cut zones require a positive source duration, got {}", duration),
            ));
        }
        CutGraph::plan(&cut_windows, duration)?;
    }

    let counts = AppliedCounts {
        blur_zones: blur_zones.len(),
        black_zones: black_zones.len(),
        cut_zones: cut_zones.len(),
        mute_segments: merged_mutes.len(),
    };

    let has_obscure = !obscure.is_empty();
    let has_cut = !cut_windows.is_empty();
    let has_audio = !audio.is_empty();

    let passes = match (has_obscure, has_cut) {
        (false, false) => {
            if has_audio {
                // Audio-only remediation: video stream is copied untouched.
                vec![CompiledPass {
                    kind: PassKind::Single,
                    video: VideoFilterSpec::None,
                    audio,
                    reencode: false,
                    preset: PresetClass::Throughput,
                }]
            } else {
                Vec::new()
            }
        }
        (true, false) => vec![CompiledPass {
            kind: PassKind::Single,
            video: VideoFilterSpec::Obscure(obscure),
            audio,
            reencode: true,
            preset: PresetClass::Quality,
        }],
        (false, true) => vec![CompiledPass {
            kind: PassKind::Single,
            video: VideoFilterSpec::Cut {
                windows: cut_windows,
            },
            audio,
            reencode: true,
            preset: PresetClass::Throughput,
        }],
        (true, true) => vec![
            // Pass 1 bakes obscuring and all muting into a temp artifact
            CompiledPass {
                kind: PassKind::FirstOfTwo,
                video: VideoFilterSpec::Obscure(obscure),
                audio,
                reencode: true,
                preset: PresetClass::Quality,
            },
            // Pass 2 cuts the temp artifact; audio is already baked in, and
            // its duration is re-probed at execution time
            CompiledPass {
                kind: PassKind::SecondOfTwo,
                video: VideoFilterSpec::Cut {
                    windows: cut_windows,
                },
                audio: AudioMuteChain::default(),
                reencode: true,
                preset: PresetClass::Throughput,
            },
        ],
    };

    if passes.is_empty() {
        info!("Compiled clean plan: nothing to remediate");
    } else {
        debug!(
            "Compiled {} pass(es): {} blur, {} black, {} cut, {} mute",
            passes.len(),
            counts.blur_zones,
            counts.black_zones,
            counts.cut_zones,
            counts.mute_segments
        );
    }

    Ok(PassPlan {
        passes,
        counts,
        source_duration: duration,
    })
}
