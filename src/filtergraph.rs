//! Structured filter-graph representation.
//!
//! Filter expressions are built from small typed pieces (stages, windows,
//! enable predicates) and rendered to FFmpeg syntax in one place, so a new
//! obscure mode is a new stage kind rather than string surgery.

use crate::error::{compilation_error, Result};
use crate::segment::MuteSegment;

/// Blur strength for obscure stages. gblur is single-pass and much faster
/// than boxblur; steps=1 trades approximation quality for speed.
pub const BLUR_SIGMA: u32 = 20;

/// Render the union of time windows as an FFmpeg enable predicate,
/// e.g. `between(t,45.5,47.25)+between(t,60,65.5)`.
fn enable_expr(windows: &[(f64, f64)]) -> String {
    windows
        .iter()
        .map(|(start, end)| format!("between(t,{},{})", start, end))
        .collect::<Vec<_>>()
        .join("+")
}

/// Video obscuring variants. Each renders as one filter stage gated on the
/// union of its zone windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObscureKind {
    Blur,
    Black,
}

/// One obscure stage: a kind plus the time windows it is enabled in.
#[derive(Debug, Clone)]
pub struct ObscureStage {
    pub kind: ObscureKind,
    pub windows: Vec<(f64, f64)>,
}

impl ObscureStage {
    fn render(&self) -> String {
        let enable = enable_expr(&self.windows);
        match self.kind {
            ObscureKind::Blur => {
                format!("gblur=sigma={}:steps=1:enable='{}'", BLUR_SIGMA, enable)
            }
            ObscureKind::Black => {
                // drawbox across the full frame, filled, full opacity
                format!(
                    "drawbox=x=0:y=0:w=iw:h=ih:c=black@1:t=fill:enable='{}'",
                    enable
                )
            }
        }
    }
}

/// In-place video obscuring chain. Stream duration is unchanged.
#[derive(Debug, Clone, Default)]
pub struct ObscureChain {
    stages: Vec<ObscureStage>,
}

impl ObscureChain {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Add a stage for the given kind; dropped silently when no windows exist.
    pub fn push_stage(&mut self, kind: ObscureKind, windows: Vec<(f64, f64)>) {
        if !windows.is_empty() {
            self.stages.push(ObscureStage { kind, windows });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[ObscureStage] {
        &self.stages
    }

    /// Render the comma-chained video filter expression.
    pub fn render(&self) -> String {
        self.stages
            .iter()
            .map(|s| s.render())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Audio silencing chain over merged mute segments.
#[derive(Debug, Clone, Default)]
pub struct AudioMuteChain {
    segments: Vec<MuteSegment>,
}

impl AudioMuteChain {
    pub fn new(segments: Vec<MuteSegment>) -> Self {
        Self { segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[MuteSegment] {
        &self.segments
    }

    /// Render the comma-chained `-af` expression silencing every segment.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(|s| {
                format!(
                    "volume=enable='between(t,{:.3},{:.3})':volume=0",
                    s.start, s.end
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Frame-removal graph: the complement ("keep") intervals of the cut zones,
/// trimmed, re-timestamped and concatenated into one continuous stream.
#[derive(Debug, Clone)]
pub struct CutGraph {
    keeps: Vec<(f64, f64)>,
    duration: f64,
}

impl CutGraph {
    /// Sweep the cut windows over `[0, duration]` and keep the gaps.
    ///
    /// Removing the entire timeline is a compilation error, not a valid plan.
    pub fn plan(cut_windows: &[(f64, f64)], duration: f64) -> Result<Self> {
        let mut sorted = cut_windows.to_vec();
        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        let mut keeps = Vec::new();
        let mut last_end = 0.0_f64;

        for (start, end) in sorted {
            if start > last_end {
                keeps.push((last_end, start));
            }
            last_end = last_end.max(end);
        }
        if last_end < duration {
            keeps.push((last_end, duration));
        }

        if keeps.is_empty() {
            return Err(compilation_error(
                "Cut zones cover the entire video; nothing would remain",
            ));
        }

        Ok(Self { keeps, duration })
    }

    pub fn keep_segments(&self) -> &[(f64, f64)] {
        &self.keeps
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Total output duration once the cut zones are removed.
    pub fn kept_duration(&self) -> f64 {
        self.keeps.iter().map(|(s, e)| e - s).sum()
    }

    /// Render the complete filter_complex expression, producing `[outv]` and
    /// `[outa]` labels.
    ///
    /// When an audio mute chain is supplied it is applied to `[0:a]` before
    /// the atrim split, so mute windows stay expressed in source timestamps.
    pub fn render(&self, audio_mutes: Option<&AudioMuteChain>) -> String {
        let mut parts = Vec::new();

        let audio_input = match audio_mutes {
            Some(chain) if !chain.is_empty() => {
                parts.push(format!("[0:a]{}[amute]", chain.render()));
                "[amute]".to_string()
            }
            _ => "[0:a]".to_string(),
        };

        let n = self.keeps.len();
        for (i, (start, end)) in self.keeps.iter().enumerate() {
            let idx = i + 1;
            if i == n - 1 && *end >= self.duration {
                // Tail segment runs to the end of the stream, trim stays open
                parts.push(format!(
                    "[0:v]trim=start={},setpts=PTS-STARTPTS[v{}]",
                    start, idx
                ));
                parts.push(format!(
                    "{}atrim=start={},asetpts=PTS-STARTPTS[a{}]",
                    audio_input, start, idx
                ));
            } else {
                parts.push(format!(
                    "[0:v]trim=start={}:end={},setpts=PTS-STARTPTS[v{}]",
                    start, end, idx
                ));
                parts.push(format!(
                    "{}atrim=start={}:end={},asetpts=PTS-STARTPTS[a{}]",
                    audio_input, start, end, idx
                ));
            }
        }

        let concat_inputs: String = (1..=n).map(|i| format!("[v{}][a{}]", i, i)).collect();
        parts.push(format!("{}concat=n={}:v=1:a=1[outv][outa]", concat_inputs, n));

        parts.join("; ")
    }
}
