//! Pipeline orchestration.
//!
//! Drives a compiled pass plan against the transcoding engine: one blocking
//! invocation per pass, intermediate artifacts threaded between passes, job
//! status updated at every boundary. One pipeline instance processes one
//! video at a time; there are no automatic retries. A failed pass fails the
//! whole video and retry policy belongs to the batch driver.

use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::compiler::{self, AppliedCounts, CompiledPass, PassKind, PassPlan, VideoFilterSpec};
use crate::config::EncodeConfig;
use crate::engine::{InvocationSpec, TranscodeEngine};
use crate::error::{engine_error, Result, VidscrubError};
use crate::filtergraph::CutGraph;
use crate::resources::TempArtifact;
use crate::segment::{pad_segments, MuteSegment};
use crate::status::{StatusDocument, StatusTracker, StepStatus};
use crate::zone::VideoZoneSet;

/// Observable pipeline state, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Compiling,
    Executing { pass: usize, total: usize },
    Finalizing,
    Succeeded,
    Failed,
}

/// Outcome of processing one video.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub success: bool,
    /// True when the plan was clean and the source was copied directly
    pub skipped: bool,
    pub applied: AppliedCounts,
    pub error: Option<String>,
    pub output: Option<PathBuf>,
}

impl PipelineResult {
    fn succeeded(applied: AppliedCounts, skipped: bool, output: PathBuf) -> Self {
        Self {
            success: true,
            skipped,
            applied,
            error: None,
            output: Some(output),
        }
    }

    fn failed(applied: AppliedCounts, error: &VidscrubError) -> Self {
        Self {
            success: false,
            skipped: false,
            applied,
            error: Some(error.to_string()),
            output: None,
        }
    }
}

/// Executes pass plans against an injected engine and status tracker.
pub struct Pipeline {
    engine: Box<dyn TranscodeEngine>,
    status: StatusTracker,
    config: EncodeConfig,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(
        engine: Box<dyn TranscodeEngine>,
        status: StatusTracker,
        config: EncodeConfig,
    ) -> Self {
        Self {
            engine,
            status,
            config,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Snapshot of the job status document for pollers.
    pub fn status_document(&self) -> StatusDocument {
        self.status.status()
    }

    /// Compile a plan for a video. Exposed separately so the batch driver can
    /// inspect the plan (or skip clean videos) before committing to execute.
    pub fn compile(
        &mut self,
        zone_set: &VideoZoneSet,
        detections: &[MuteSegment],
        duration: f64,
    ) -> Result<PassPlan> {
        self.transition(PipelineState::Compiling);
        compiler::compile(zone_set, detections, duration)
    }

    /// Process one video end to end: probe, pad detections, compile, execute.
    pub async fn process(
        &mut self,
        source: &Path,
        destination: &Path,
        zone_set: &VideoZoneSet,
        detections: Vec<MuteSegment>,
    ) -> PipelineResult {
        let duration = match self.engine.probe_duration(source).await {
            Ok(duration) => duration,
            Err(e) => return PipelineResult::failed(AppliedCounts::default(), &e),
        };

        let padded = pad_segments(
            detections,
            self.config.mute_padding_before,
            self.config.mute_padding_after,
        );

        let plan = match self.compile(zone_set, &padded, duration) {
            Ok(plan) => plan,
            Err(e) => {
                self.transition(PipelineState::Failed);
                return PipelineResult::failed(AppliedCounts::default(), &e);
            }
        };

        self.execute(source, destination, &plan).await
    }

    /// Execute a compiled plan: source in, destination out.
    pub async fn execute(
        &mut self,
        source: &Path,
        destination: &Path,
        plan: &PassPlan,
    ) -> PipelineResult {
        self.status.start(&source.to_string_lossy(), plan);

        if let Some(parent) = destination.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                let err = crate::error::fs_error(e, parent.to_path_buf());
                self.fail(None, &err);
                return PipelineResult::failed(plan.counts, &err);
            }
        }

        if plan.is_clean() {
            return self.copy_clean(source, destination, plan).await;
        }

        let total = plan.passes.len();
        let mut artifacts: Vec<TempArtifact> = Vec::new();

        for (index, pass) in plan.passes.iter().enumerate() {
            let is_last = index == total - 1;
            let input: PathBuf = match artifacts.last() {
                Some(artifact) => artifact.path().to_path_buf(),
                None => source.to_path_buf(),
            };
            let output: PathBuf = if is_last {
                destination.to_path_buf()
            } else {
                let artifact = TempArtifact::for_pass(source, index + 1);
                let path = artifact.path().to_path_buf();
                artifacts.push(artifact);
                path
            };

            self.transition(PipelineState::Executing {
                pass: index + 1,
                total,
            });
            self.status.update_step(index, StepStatus::Running);

            let result = self.run_pass(pass, plan, &input, &output).await;
            if let Err(e) = result {
                self.status.update_step(index, StepStatus::Failed);
                self.fail(Some(destination), &e);
                return PipelineResult::failed(plan.counts, &e);
            }

            self.status.update_step(index, StepStatus::Complete);
        }

        self.transition(PipelineState::Finalizing);
        for artifact in artifacts {
            if let Err(e) = artifact.cleanup() {
                // Cleanup failure never retracts a finished output
                warn!("Leaving temporary artifact behind: {}", e);
            }
        }

        self.status.complete(true);
        self.transition(PipelineState::Succeeded);
        info!(
            "Remediated {:?}: {} blur, {} black, {} cut, {} mute",
            destination,
            plan.counts.blur_zones,
            plan.counts.black_zones,
            plan.counts.cut_zones,
            plan.counts.mute_segments
        );
        PipelineResult::succeeded(plan.counts, false, destination.to_path_buf())
    }

    /// One engine invocation, including the duration re-probe a second pass
    /// needs because pass 1 may have altered timing.
    async fn run_pass(
        &mut self,
        pass: &CompiledPass,
        plan: &PassPlan,
        input: &Path,
        output: &Path,
    ) -> Result<()> {
        let duration = match pass.kind {
            PassKind::SecondOfTwo => self.engine.probe_duration(input).await?,
            _ => plan.source_duration,
        };

        let spec = self.build_invocation(pass, input, output, duration)?;
        debug!(
            "Pass input {:?} -> output {:?} (reencode: {})",
            input, output, pass.reencode
        );
        self.engine.run(&spec).await?;

        if !output.exists() {
            return Err(engine_error(
                format!("Engine reported success but produced no output at {:?}", output),
                None,
            ));
        }
        Ok(())
    }

    /// Translate one compiled pass into an engine invocation.
    fn build_invocation(
        &self,
        pass: &CompiledPass,
        input: &Path,
        output: &Path,
        duration: f64,
    ) -> Result<InvocationSpec> {
        let (filter_complex, audio_filter, maps) = match &pass.video {
            VideoFilterSpec::None => {
                let af = if pass.audio.is_empty() {
                    None
                } else {
                    Some(pass.audio.render())
                };
                (None, af, vec!["0:v".to_string(), "0:a".to_string()])
            }
            VideoFilterSpec::Obscure(chain) => {
                let complex = format!("[0:v]{}[v]", chain.render());
                let af = if pass.audio.is_empty() {
                    None
                } else {
                    Some(pass.audio.render())
                };
                (Some(complex), af, vec!["[v]".to_string(), "0:a".to_string()])
            }
            VideoFilterSpec::Cut { windows } => {
                let graph = CutGraph::plan(windows, duration)?;
                let mutes = if pass.audio.is_empty() {
                    None
                } else {
                    Some(&pass.audio)
                };
                // Mutes ride inside the complex graph, in source timestamps
                (
                    Some(graph.render(mutes)),
                    None,
                    vec!["[outv]".to_string(), "[outa]".to_string()],
                )
            }
        };

        Ok(InvocationSpec {
            input: input.to_path_buf(),
            filter_complex,
            audio_filter,
            maps,
            video_codec: self.config.directive_for(pass.reencode, pass.preset),
            audio_codec: self.config.audio_codec.clone(),
            audio_bitrate: self.config.audio_bitrate.clone(),
            threads: self.config.threads,
            output: output.to_path_buf(),
            overwrite: true,
        })
    }

    /// Clean plan: nothing to remediate, copy the source through.
    async fn copy_clean(
        &mut self,
        source: &Path,
        destination: &Path,
        plan: &PassPlan,
    ) -> PipelineResult {
        self.status.update_step(0, StepStatus::Running);
        if let Err(e) = tokio::fs::copy(source, destination).await {
            let err = crate::error::fs_error(e, source.to_path_buf());
            self.status.update_step(0, StepStatus::Failed);
            self.fail(Some(destination), &err);
            return PipelineResult::failed(plan.counts, &err);
        }

        self.status.update_step(0, StepStatus::Complete);
        self.status.complete(true);
        self.transition(PipelineState::Succeeded);
        info!("Video is clean, copied source to {:?}", destination);
        PipelineResult::succeeded(plan.counts, true, destination.to_path_buf())
    }

    /// Record a failure: job status, state, and no half-written destination.
    fn fail(&mut self, destination: Option<&Path>, error: &VidscrubError) {
        warn!("Pipeline failed: {}", error);
        self.status.complete(false);
        self.transition(PipelineState::Failed);

        if let Some(destination) = destination {
            if destination.exists() {
                if let Err(e) = std::fs::remove_file(destination) {
                    warn!(
                        "Failed to remove partial destination {:?}: {}",
                        destination, e
                    );
                }
            }
        }
    }

    fn transition(&mut self, state: PipelineState) {
        debug!("Pipeline state: {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CodecDirective;
    use crate::zone::{SkipZone, ZoneMode};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Scripted engine: records invocations, writes fake outputs, can be told
    /// to fail a given pass. Call/probe logs are shared with the test.
    struct MockEngine {
        calls: Arc<Mutex<Vec<InvocationSpec>>>,
        probes: Arc<Mutex<Vec<PathBuf>>>,
        fail_on_call: Option<usize>,
        skip_output_on_call: Option<usize>,
        probed_duration: f64,
    }

    impl MockEngine {
        fn new(probed_duration: f64) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                probes: Arc::new(Mutex::new(Vec::new())),
                fail_on_call: None,
                skip_output_on_call: None,
                probed_duration,
            }
        }

        fn call_log(&self) -> Arc<Mutex<Vec<InvocationSpec>>> {
            Arc::clone(&self.calls)
        }

        fn probe_log(&self) -> Arc<Mutex<Vec<PathBuf>>> {
            Arc::clone(&self.probes)
        }
    }

    #[async_trait]
    impl TranscodeEngine for MockEngine {
        async fn run(&self, spec: &InvocationSpec) -> Result<()> {
            let call_index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(spec.clone());
                calls.len() - 1
            };
            if self.fail_on_call == Some(call_index) {
                return Err(engine_error(
                    "ffmpeg exited with code 1",
                    Some("Invalid filter graph".to_string()),
                ));
            }
            if self.skip_output_on_call != Some(call_index) {
                std::fs::write(&spec.output, b"video-data").unwrap();
            }
            Ok(())
        }

        async fn probe_duration(&self, path: &Path) -> Result<f64> {
            self.probes.lock().unwrap().push(path.to_path_buf());
            Ok(self.probed_duration)
        }
    }

    fn zone_set(zones: Vec<SkipZone>) -> VideoZoneSet {
        let mut set = VideoZoneSet::new("/media/movie.mkv", "Movie");
        for zone in zones {
            set.add_zone(zone);
        }
        set
    }

    fn detection(start: f64, end: f64) -> MuteSegment {
        MuteSegment::new(start, end, "word", 0.9).unwrap()
    }

    struct Fixture {
        source: PathBuf,
        destination: PathBuf,
        status_dir: PathBuf,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("movie.mkv");
        std::fs::write(&source, b"source-data").unwrap();
        Fixture {
            source,
            destination: dir.path().join("out").join("movie.mkv"),
            status_dir: dir.path().join("status"),
            _dir: dir,
        }
    }

    fn pipeline_with(engine: MockEngine, status_dir: &Path) -> Pipeline {
        Pipeline::new(
            Box::new(engine),
            StatusTracker::open(status_dir).unwrap(),
            EncodeConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_clean_plan_copies_source() {
        let f = fixture();
        let mut pipeline = pipeline_with(MockEngine::new(100.0), &f.status_dir);

        let plan = compiler::compile(&zone_set(vec![]), &[], 100.0).unwrap();
        let result = pipeline.execute(&f.source, &f.destination, &plan).await;

        assert!(result.success);
        assert!(result.skipped);
        assert_eq!(pipeline.state(), PipelineState::Succeeded);
        assert_eq!(
            std::fs::read(&f.destination).unwrap(),
            b"source-data".to_vec()
        );
        assert!(pipeline.status_document().current_job.is_none());
    }

    #[tokio::test]
    async fn test_single_obscure_pass_invokes_engine_once() {
        let f = fixture();
        let zones = vec![SkipZone::new(5.0, 8.0, "scene", ZoneMode::Blur, true).unwrap()];
        let plan = compiler::compile(&zone_set(zones), &[detection(50.0, 51.0)], 100.0).unwrap();

        let engine = MockEngine::new(100.0);
        let calls = engine.call_log();
        let mut pipeline = pipeline_with(engine, &f.status_dir);
        let result = pipeline.execute(&f.source, &f.destination, &plan).await;

        assert!(result.success);
        assert!(!result.skipped);
        assert_eq!(result.applied.blur_zones, 1);
        assert_eq!(result.applied.mute_segments, 2);
        assert!(f.destination.exists());
        assert_eq!(pipeline.state(), PipelineState::Succeeded);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_two_pass_threads_temp_artifact() {
        let f = fixture();
        let zones = vec![
            SkipZone::new(5.0, 8.0, "scene", ZoneMode::Blur, false).unwrap(),
            SkipZone::new(30.0, 40.0, "scene", ZoneMode::Cut, false).unwrap(),
        ];
        let plan = compiler::compile(&zone_set(zones), &[], 100.0).unwrap();
        assert!(plan.is_two_pass());

        let engine = MockEngine::new(100.0);
        let calls = engine.call_log();
        let probes = engine.probe_log();
        let mut pipeline = pipeline_with(engine, &f.status_dir);
        let result = pipeline.execute(&f.source, &f.destination, &plan).await;
        assert!(result.success);

        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);

        // Pass 1 reads the source, writes a temp artifact
        assert_eq!(calls[0].input, f.source);
        assert_ne!(calls[0].output, f.destination);
        let temp_name = calls[0]
            .output
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(temp_name.starts_with("vidscrub_movie_pass1_"));

        // Pass 2 reads the temp artifact, writes the destination
        assert_eq!(calls[1].input, calls[0].output);
        assert_eq!(calls[1].output, f.destination);

        // The second pass re-probed the temp artifact's duration
        assert_eq!(probes.lock().unwrap().clone(), vec![calls[0].output.clone()]);

        // Temp artifact was removed in finalization
        assert!(!calls[0].output.exists());
        assert!(f.destination.exists());
    }

    #[tokio::test]
    async fn test_pass_presets_follow_plan() {
        let f = fixture();
        let zones = vec![
            SkipZone::new(5.0, 8.0, "scene", ZoneMode::Blur, false).unwrap(),
            SkipZone::new(30.0, 40.0, "scene", ZoneMode::Cut, false).unwrap(),
        ];
        let plan = compiler::compile(&zone_set(zones), &[], 100.0).unwrap();

        let engine = MockEngine::new(100.0);
        let calls = engine.call_log();
        let mut pipeline = pipeline_with(engine, &f.status_dir);
        assert!(pipeline.execute(&f.source, &f.destination, &plan).await.success);

        let calls = calls.lock().unwrap().clone();
        match &calls[0].video_codec {
            CodecDirective::Reencode { preset, .. } => assert_eq!(preset, "medium"),
            other => panic!("Expected re-encode, got {:?}", other),
        }
        match &calls[1].video_codec {
            CodecDirective::Reencode { preset, .. } => assert_eq!(preset, "veryfast"),
            other => panic!("Expected re-encode, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mute_only_pass_copies_video_stream() {
        let f = fixture();
        let plan = compiler::compile(&zone_set(vec![]), &[detection(5.0, 6.0)], 100.0).unwrap();

        let engine = MockEngine::new(100.0);
        let calls = engine.call_log();
        let mut pipeline = pipeline_with(engine, &f.status_dir);
        assert!(pipeline.execute(&f.source, &f.destination, &plan).await.success);

        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].video_codec, CodecDirective::Copy);
        assert!(calls[0].filter_complex.is_none());
        assert!(calls[0].audio_filter.as_ref().unwrap().contains("volume=0"));
    }

    #[tokio::test]
    async fn test_failed_pass_aborts_and_removes_destination() {
        let f = fixture();
        let zones = vec![
            SkipZone::new(5.0, 8.0, "scene", ZoneMode::Blur, false).unwrap(),
            SkipZone::new(30.0, 40.0, "scene", ZoneMode::Cut, false).unwrap(),
        ];
        let plan = compiler::compile(&zone_set(zones), &[], 100.0).unwrap();

        let mut engine = MockEngine::new(100.0);
        engine.fail_on_call = Some(0);
        let calls = engine.call_log();
        let mut pipeline = pipeline_with(engine, &f.status_dir);
        let result = pipeline.execute(&f.source, &f.destination, &plan).await;

        assert!(!result.success);
        assert!(result.error.as_ref().unwrap().contains("Invalid filter graph"));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(!f.destination.exists());

        // Second pass never ran
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(pipeline.status_document().current_job.is_none());
    }

    #[tokio::test]
    async fn test_missing_output_is_engine_failure() {
        let f = fixture();
        let zones = vec![SkipZone::new(5.0, 8.0, "scene", ZoneMode::Blur, false).unwrap()];
        let plan = compiler::compile(&zone_set(zones), &[], 100.0).unwrap();

        let mut engine = MockEngine::new(100.0);
        engine.skip_output_on_call = Some(0);
        let mut pipeline = pipeline_with(engine, &f.status_dir);
        let result = pipeline.execute(&f.source, &f.destination, &plan).await;

        assert!(!result.success);
        assert!(result.error.as_ref().unwrap().contains("no output"));
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[tokio::test]
    async fn test_process_pads_and_compiles() {
        let f = fixture();
        let engine = MockEngine::new(100.0);
        let calls = engine.call_log();
        let mut pipeline = pipeline_with(engine, &f.status_dir);

        // Two detections 0.8s apart fuse once 0.5s padding is applied
        let detections = vec![detection(10.0, 11.0), detection(11.8, 12.5)];
        let result = pipeline
            .process(&f.source, &f.destination, &zone_set(vec![]), detections)
            .await;

        assert!(result.success);
        assert_eq!(result.applied.mute_segments, 1);
        let calls = calls.lock().unwrap().clone();
        let af = calls[0].audio_filter.as_ref().unwrap();
        assert!(af.contains("between(t,9.500,13.000)"));
    }

    #[tokio::test]
    async fn test_process_surfaces_compilation_error() {
        let f = fixture();
        let mut pipeline = pipeline_with(MockEngine::new(100.0), &f.status_dir);

        let zones = vec![SkipZone::new(0.0, 100.0, "all", ZoneMode::Cut, false).unwrap()];
        let result = pipeline
            .process(&f.source, &f.destination, &zone_set(zones), vec![])
            .await;

        assert!(!result.success);
        assert!(result.error.as_ref().unwrap().contains("entire video"));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(!f.destination.exists());
    }
}
