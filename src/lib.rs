// Core modules
pub mod compiler;
pub mod config;
pub mod config_file;
pub mod dependencies;
pub mod engine;
pub mod error;
pub mod filtergraph;
pub mod pipeline;
pub mod progress;
pub mod resources;
pub mod segment;
pub mod status;
pub mod zone;

// Re-export commonly used types
pub use compiler::{compile, AppliedCounts, CompiledPass, PassKind, PassPlan, PresetClass};
pub use config::{EncodeConfig, EncodeConfigBuilder};
pub use config_file::SettingsFile;
pub use engine::{CodecDirective, FfmpegEngine, InvocationSpec, TranscodeEngine};
pub use error::{Result, VidscrubError};
pub use filtergraph::{AudioMuteChain, CutGraph, ObscureChain, ObscureKind};
pub use pipeline::{Pipeline, PipelineResult, PipelineState};
pub use progress::{ProgressOperation, ProgressTracker};
pub use resources::TempArtifact;
pub use segment::{merge_segments, pad_segments, MuteSegment};
pub use status::{JobStatus, ProcessingJob, StatusDocument, StatusTracker, StepStatus};
pub use zone::{format_timestamp, parse_timestamp, SkipZone, VideoZoneSet, ZoneMode};
