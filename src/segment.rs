use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{validation_error, Result};

/// Default maximum gap (seconds) under which two segments are fused anyway.
pub const ADJACENCY_TOLERANCE: f64 = 0.1;

fn default_confidence() -> f64 {
    1.0
}

/// A time range whose audio must be silenced, produced by upstream detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MuteSegment {
    pub start: f64,
    pub end: f64,
    pub label: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl MuteSegment {
    pub fn new(
        start: f64,
        end: f64,
        label: impl Into<String>,
        confidence: f64,
    ) -> Result<Self> {
        if start < 0.0 {
            return Err(validation_error(
                "start",
                format!("Start time cannot be negative: {}", start),
            ));
        }
        if end <= start {
            return Err(validation_error(
                "end",
                format!("End time ({}) must be > start time ({})", end, start),
            ));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(validation_error(
                "confidence",
                format!("Confidence must be between 0 and 1, got {}", confidence),
            ));
        }
        Ok(Self {
            start,
            end,
            label: label.into(),
            confidence,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &MuteSegment) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Adjacency uses the minimum of the two one-sided gaps between the
    /// pair, not the signed start-to-end distance.
    pub fn is_adjacent(&self, other: &MuteSegment, tolerance: f64) -> bool {
        let gap = (self.end - other.start)
            .abs()
            .min((other.end - self.start).abs());
        gap <= tolerance
    }

    /// Merge with another segment, spanning both. Labels concatenate,
    /// confidence takes the minimum of the pair.
    pub fn merge_with(&self, other: &MuteSegment) -> MuteSegment {
        MuteSegment {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            label: format!("{}+{}", self.label, other.label),
            confidence: self.confidence.min(other.confidence),
        }
    }

    /// New segment with padding applied, clamped at zero on the left.
    pub fn with_padding(&self, before: f64, after: f64) -> MuteSegment {
        MuteSegment {
            start: (self.start - before).max(0.0),
            end: self.end + after,
            label: self.label.clone(),
            confidence: self.confidence,
        }
    }
}

/// Merge overlapping or adjacent-within-tolerance mute segments.
///
/// Output is sorted by start time and pairwise non-overlapping. Idempotent:
/// merging an already-merged list is a no-op.
pub fn merge_segments(segments: Vec<MuteSegment>) -> Vec<MuteSegment> {
    if segments.is_empty() {
        return Vec::new();
    }

    let mut sorted = segments;
    sorted.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap());

    let input_count = sorted.len();
    let mut merged: Vec<MuteSegment> = Vec::with_capacity(input_count);
    merged.push(sorted[0].clone());

    for current in sorted.into_iter().skip(1) {
        let previous = merged.last_mut().unwrap();
        if current.overlaps(previous) || current.is_adjacent(previous, ADJACENCY_TOLERANCE) {
            *previous = previous.merge_with(&current);
        } else {
            merged.push(current);
        }
    }

    debug!("Merged {} mute segments into {}", input_count, merged.len());
    merged
}

/// Pad every segment, then re-merge since padding may create new overlaps.
pub fn pad_segments(segments: Vec<MuteSegment>, before: f64, after: f64) -> Vec<MuteSegment> {
    let padded = segments
        .into_iter()
        .map(|s| s.with_padding(before, after))
        .collect();
    merge_segments(padded)
}
