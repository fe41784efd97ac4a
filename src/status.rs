//! Persisted job status tracking.
//!
//! One tracker instance is owned by the orchestrator that drives it; there is
//! no process-wide singleton. Every mutation is flushed to a JSON document
//! that dashboards poll, replaced atomically so concurrent readers never see
//! a torn write.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::compiler::{AppliedCounts, PassPlan};
use crate::error::{fs_error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
    /// Reloaded from disk while still marked processing: the engine
    /// invocation did not survive the process, outcome unknown.
    Interrupted,
}

/// Single step in video processing, shown in the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStep {
    pub name: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobStep {
    fn pending(name: String) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.status, StepStatus::Pending | StepStatus::Running)
    }
}

/// Single video processing job with steps and counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub video_path: String,
    pub video_name: String,
    pub status: JobStatus,
    pub steps: Vec<JobStep>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub counts: AppliedCountsRecord,
}

/// Counts mirrored into the status document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCountsRecord {
    pub blur: usize,
    pub black: usize,
    pub cut: usize,
    pub mute: usize,
}

impl From<&AppliedCounts> for AppliedCountsRecord {
    fn from(counts: &AppliedCounts) -> Self {
        Self {
            blur: counts.blur_zones,
            black: counts.black_zones,
            cut: counts.cut_zones,
            mute: counts.mute_segments,
        }
    }
}

/// The polled document shape: current job plus the pending queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDocument {
    pub current_job: Option<ProcessingJob>,
    pub pending_count: usize,
    pub pending_jobs: Vec<ProcessingJob>,
}

/// Tracks the single in-flight job and persists every change.
#[derive(Debug)]
pub struct StatusTracker {
    status_path: PathBuf,
    current_job: Option<ProcessingJob>,
    pending_jobs: Vec<ProcessingJob>,
}

impl StatusTracker {
    /// Open a tracker backed by `<config_dir>/processing_status.json`.
    ///
    /// Any previously persisted job is reloaded for display only; an
    /// in-flight job found here is surfaced as interrupted, never resumed.
    pub fn open(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir)
            .map_err(|e| fs_error(e, config_dir.to_path_buf()))?;

        let mut tracker = Self {
            status_path: config_dir.join("processing_status.json"),
            current_job: None,
            pending_jobs: Vec::new(),
        };
        tracker.load();
        Ok(tracker)
    }

    /// Start a new job for a compiled plan, replacing any previous job.
    ///
    /// Derives one visible step per pass; a clean plan gets a single copy
    /// step so the dashboard still shows activity.
    pub fn start(&mut self, video_path: &str, plan: &PassPlan) {
        let mut steps = Vec::new();
        let mut pass_number = 0;
        for pass in &plan.passes {
            if pass.video.is_none() {
                steps.push(JobStep::pending(pass.describe(&plan.counts)));
            } else {
                pass_number += 1;
                steps.push(JobStep::pending(format!(
                    "Pass {}: {}",
                    pass_number,
                    pass.describe(&plan.counts)
                )));
            }
        }
        if steps.is_empty() {
            steps.push(JobStep::pending("Copy clean source".to_string()));
        }

        let video_name = Path::new(video_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| video_path.to_string());

        self.current_job = Some(ProcessingJob {
            video_path: video_path.to_string(),
            video_name,
            status: JobStatus::Processing,
            steps,
            started_at: Some(Utc::now()),
            completed_at: None,
            counts: AppliedCountsRecord::from(&plan.counts),
        });
        self.save();
    }

    /// Update one step's status. Out-of-range indices are a no-op.
    pub fn update_step(&mut self, step_index: usize, status: StepStatus) {
        let Some(job) = self.current_job.as_mut() else {
            return;
        };
        let Some(step) = job.steps.get_mut(step_index) else {
            return;
        };

        step.status = status;
        match status {
            StepStatus::Running => step.started_at = Some(Utc::now()),
            StepStatus::Complete | StepStatus::Failed => {
                step.completed_at = Some(Utc::now())
            }
            StepStatus::Pending => {}
        }
        self.save();
    }

    /// Mark the current job finished and clear it. Steps still open are
    /// forced to match the overall outcome.
    pub fn complete(&mut self, success: bool) {
        let Some(job) = self.current_job.as_mut() else {
            return;
        };

        close_job(job, success);
        self.save();

        // The next start() owns the slot; pollers see the cleared document.
        self.current_job = None;
        self.save();
    }

    /// Pre-load the pending queue for dashboards.
    pub fn queue_pending(&mut self, video_paths: &[String]) {
        for video_path in video_paths {
            let video_name = Path::new(video_path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| video_path.clone());
            self.pending_jobs.push(ProcessingJob {
                video_path: video_path.clone(),
                video_name,
                status: JobStatus::Pending,
                steps: Vec::new(),
                started_at: None,
                completed_at: None,
                counts: AppliedCountsRecord::default(),
            });
        }
        self.save();
    }

    pub fn clear_pending(&mut self) {
        self.pending_jobs.clear();
        self.save();
    }

    pub fn current_job(&self) -> Option<&ProcessingJob> {
        self.current_job.as_ref()
    }

    /// Snapshot of the polled document.
    pub fn status(&self) -> StatusDocument {
        StatusDocument {
            current_job: self.current_job.clone(),
            pending_count: self.pending_jobs.len(),
            pending_jobs: self.pending_jobs.clone(),
        }
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    /// Flush the document. Whole-document replacement via temp file + rename
    /// so pollers always read a complete JSON value. A persistence failure is
    /// logged but never fails the processing run.
    fn save(&self) {
        let document = self.status();
        let json = match serde_json::to_string_pretty(&document) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize processing status: {}", e);
                return;
            }
        };

        let tmp_path = self.status_path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp_path, json) {
            warn!("Failed to write processing status: {}", e);
            return;
        }
        if let Err(e) = std::fs::rename(&tmp_path, &self.status_path) {
            warn!("Failed to replace processing status: {}", e);
        }
    }

    fn load(&mut self) {
        if !self.status_path.exists() {
            return;
        }

        let document: StatusDocument = match std::fs::read_to_string(&self.status_path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
        {
            Ok(document) => document,
            Err(e) => {
                warn!("Failed to load processing status, starting clean: {}", e);
                return;
            }
        };

        self.current_job = document.current_job;
        self.pending_jobs = document.pending_jobs;

        // A job persisted mid-flight cannot be resumed: the engine process is
        // gone and its outcome is unknown.
        if let Some(job) = self.current_job.as_mut() {
            if job.status == JobStatus::Processing {
                warn!(
                    "Found interrupted job for '{}'; surfacing as indeterminate",
                    job.video_name
                );
                job.status = JobStatus::Interrupted;
                self.save();
            }
        }
    }
}

/// Stamp a finished job: overall status from the outcome, any step still
/// pending or running forced to match it.
fn close_job(job: &mut ProcessingJob, success: bool) {
    job.status = if success {
        JobStatus::Complete
    } else {
        JobStatus::Failed
    };
    job.completed_at = Some(Utc::now());

    let forced = if success {
        StepStatus::Complete
    } else {
        StepStatus::Failed
    };
    for step in job.steps.iter_mut() {
        if step.is_open() {
            step.status = forced;
            if step.completed_at.is_none() {
                step.completed_at = Some(Utc::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::segment::MuteSegment;
    use crate::zone::{SkipZone, VideoZoneSet, ZoneMode};

    fn plan_with(blur: bool, cut: bool, mutes: bool) -> PassPlan {
        let mut set = VideoZoneSet::new("/media/movie.mkv", "Movie");
        if blur {
            set.add_zone(SkipZone::new(5.0, 8.0, "scene", ZoneMode::Blur, false).unwrap());
        }
        if cut {
            set.add_zone(SkipZone::new(30.0, 40.0, "scene", ZoneMode::Cut, false).unwrap());
        }
        let detections = if mutes {
            vec![MuteSegment::new(50.0, 51.0, "word", 0.9).unwrap()]
        } else {
            vec![]
        };
        compile(&set, &detections, 100.0).unwrap()
    }

    fn tracker() -> (StatusTracker, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let tracker = StatusTracker::open(dir.path()).unwrap();
        (tracker, dir)
    }

    #[test]
    fn test_start_derives_step_per_pass() {
        let (mut tracker, _dir) = tracker();
        tracker.start("/media/movie.mkv", &plan_with(true, true, false));

        let job = tracker.current_job().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.steps.len(), 2);
        assert!(job.steps[0].name.starts_with("Pass 1:"));
        assert!(job.steps[1].name.starts_with("Pass 2:"));
        assert_eq!(job.counts.blur, 1);
        assert_eq!(job.counts.cut, 1);
    }

    #[test]
    fn test_start_mute_only_gets_unnumbered_step() {
        let (mut tracker, _dir) = tracker();
        tracker.start("/media/movie.mkv", &plan_with(false, false, true));

        let job = tracker.current_job().unwrap();
        assert_eq!(job.steps.len(), 1);
        assert_eq!(job.steps[0].name, "Mute 1 segment(s)");
    }

    #[test]
    fn test_start_clean_plan_gets_copy_step() {
        let (mut tracker, _dir) = tracker();
        tracker.start("/media/movie.mkv", &plan_with(false, false, false));
        assert_eq!(
            tracker.current_job().unwrap().steps[0].name,
            "Copy clean source"
        );
    }

    #[test]
    fn test_update_step_stamps_timestamps() {
        let (mut tracker, _dir) = tracker();
        tracker.start("/media/movie.mkv", &plan_with(true, false, false));

        tracker.update_step(0, StepStatus::Running);
        let step = &tracker.current_job().unwrap().steps[0];
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.started_at.is_some());
        assert!(step.completed_at.is_none());

        tracker.update_step(0, StepStatus::Complete);
        let step = &tracker.current_job().unwrap().steps[0];
        assert!(step.completed_at.is_some());
    }

    #[test]
    fn test_update_step_out_of_range_is_noop() {
        let (mut tracker, _dir) = tracker();
        tracker.start("/media/movie.mkv", &plan_with(true, false, false));
        tracker.update_step(7, StepStatus::Running);
        assert_eq!(
            tracker.current_job().unwrap().steps[0].status,
            StepStatus::Pending
        );
    }

    #[test]
    fn test_complete_failure_forces_open_steps_and_clears() {
        let (mut tracker, dir) = tracker();
        tracker.start("/media/movie.mkv", &plan_with(true, true, false));
        tracker.update_step(0, StepStatus::Running);

        tracker.complete(false);
        assert!(tracker.current_job().is_none());

        // The persisted document shows the cleared slot
        let raw = std::fs::read_to_string(dir.path().join("processing_status.json")).unwrap();
        let document: StatusDocument = serde_json::from_str(&raw).unwrap();
        assert!(document.current_job.is_none());
    }

    #[test]
    fn test_close_job_forces_open_steps_to_outcome() {
        let (mut tracker, _dir) = tracker();
        tracker.start("/media/movie.mkv", &plan_with(true, true, false));
        tracker.update_step(0, StepStatus::Running);

        let mut job = tracker.current_job().unwrap().clone();
        close_job(&mut job, false);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.steps.iter().all(|s| s.status == StepStatus::Failed));
        assert!(job.steps.iter().all(|s| s.completed_at.is_some()));

        let mut job = tracker.current_job().unwrap().clone();
        job.steps[0].status = StepStatus::Complete;
        close_job(&mut job, true);
        assert_eq!(job.status, JobStatus::Complete);
        assert!(job
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Complete));
    }

    #[test]
    fn test_later_start_replaces_previous_job() {
        let (mut tracker, _dir) = tracker();
        tracker.start("/media/first.mkv", &plan_with(true, false, false));
        tracker.complete(true);
        tracker.start("/media/second.mkv", &plan_with(false, true, false));

        let job = tracker.current_job().unwrap();
        assert_eq!(job.video_name, "second.mkv");
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[test]
    fn test_reload_surfaces_interrupted_job() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut tracker = StatusTracker::open(dir.path()).unwrap();
            tracker.start("/media/movie.mkv", &plan_with(true, false, false));
            tracker.update_step(0, StepStatus::Running);
            // Dropped mid-flight, simulating process termination
        }

        let tracker = StatusTracker::open(dir.path()).unwrap();
        let job = tracker.current_job().unwrap();
        assert_eq!(job.status, JobStatus::Interrupted);
    }

    #[test]
    fn test_pending_queue_round_trip() {
        let (mut tracker, dir) = tracker();
        tracker.queue_pending(&[
            "/media/a.mkv".to_string(),
            "/media/b.mkv".to_string(),
        ]);

        let document = tracker.status();
        assert_eq!(document.pending_count, 2);
        assert_eq!(document.pending_jobs[0].video_name, "a.mkv");

        let reloaded = StatusTracker::open(dir.path()).unwrap();
        assert_eq!(reloaded.status().pending_count, 2);

        let mut tracker = reloaded;
        tracker.clear_pending();
        assert_eq!(tracker.status().pending_count, 0);
    }

    #[test]
    fn test_corrupt_status_file_starts_clean() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("processing_status.json"), "not json").unwrap();
        let tracker = StatusTracker::open(dir.path()).unwrap();
        assert!(tracker.current_job().is_none());
    }
}
