//! Single-flight job controller.
//!
//! Admission and the `Running` transition happen atomically under one lock,
//! so two near-simultaneous start calls can never both be admitted and a
//! poller can never observe a torn state (e.g. full progress with the phase
//! still `Running`).

use crate::config::DashboardConfig;
use crate::model::{AnalysisRequest, JobPhase, JobState};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Why a start request was rejected. Rejection happens synchronously,
/// before any background task is spawned.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("an analysis job is already running")]
    AlreadyRunning,
    #[error("invalid analysis request: {0}")]
    InvalidRequest(String),
    #[error("analysis command is not configured")]
    NoCommand,
}

/// Owns the process-wide [`JobState`] and serializes all mutations to it.
#[derive(Debug, Clone)]
pub struct JobOrchestrator {
    cfg: Arc<DashboardConfig>,
    state: Arc<Mutex<JobState>>,
    handle: Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl JobOrchestrator {
    pub fn new(cfg: Arc<DashboardConfig>) -> Self {
        Self {
            cfg,
            state: Arc::new(Mutex::new(JobState::default())),
            handle: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Admit and launch one analysis job, returning as soon as the external
    /// process has been scheduled.
    ///
    /// Rejected with [`JobError::AlreadyRunning`] while a job is in flight;
    /// the rejected call leaves the current state untouched. A failed or
    /// succeeded job does not block a new start.
    pub async fn start(&self, request: AnalysisRequest) -> Result<(), JobError> {
        let (condition, experiment) = request.validate().map_err(JobError::InvalidRequest)?;
        if self.cfg.analysis_command.is_empty() {
            return Err(JobError::NoCommand);
        }

        // Held across admission and spawn: once `start` returns, the handle
        // is in place and `wait_for_completion` cannot miss the job.
        let mut handle_slot = self.handle.lock().await;
        {
            let mut state = self.state.lock().expect("job state poisoned");
            if state.phase == JobPhase::Running {
                return Err(JobError::AlreadyRunning);
            }
            *state = JobState {
                phase: JobPhase::Running,
                progress: 0,
                message: "Starting analysis...".to_string(),
                started_at: Some(OffsetDateTime::now_utc()),
            };
        }

        info!(dataset = %request.dataset_id, "starting analysis job");
        let cfg = self.cfg.clone();
        let state = self.state.clone();
        let task = tokio::spawn(async move {
            let outcome = run_analysis(&cfg, &condition, &experiment, &request).await;
            // The final state write is the last thing this task does; only
            // after it lands is the orchestrator admissible again.
            let mut state = state.lock().expect("job state poisoned");
            match outcome {
                Ok(()) => {
                    info!(dataset = %request.dataset_id, "analysis complete");
                    state.phase = JobPhase::Succeeded;
                    state.progress = 100;
                    state.message = "Analysis complete!".to_string();
                }
                Err(message) => {
                    error!(dataset = %request.dataset_id, %message, "analysis failed");
                    state.phase = JobPhase::Failed;
                    state.message = format!("Error: {message}");
                }
            }
        });
        *handle_slot = Some(task);
        Ok(())
    }

    /// Snapshot of the current job state; safe to call at any time,
    /// including concurrently with an in-flight job.
    pub fn status(&self) -> JobState {
        self.state.lock().expect("job state poisoned").clone()
    }

    /// Wait for the in-flight job, if any, to reach a terminal state.
    ///
    /// Intended for graceful shutdown and for tests that need a
    /// deterministic completion point instead of polling. Any job whose
    /// `start` has returned is guaranteed to be observed here; a job still
    /// inside `start` is waited on by whichever of the two calls the handle
    /// lock serializes last.
    pub async fn wait_for_completion(&self) {
        let task = self.handle.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

/// Run the external analysis process to completion.
///
/// Returns the failure text on non-zero exit, launch failure, or timeout.
async fn run_analysis(
    cfg: &DashboardConfig,
    condition: &str,
    experiment: &str,
    request: &AnalysisRequest,
) -> Result<(), String> {
    let input_dir: PathBuf = cfg.data_root.join(condition).join(experiment);
    let output_dir: PathBuf = cfg.results_root.join(condition).join(experiment);

    let (program, leading) = cfg
        .analysis_command
        .split_first()
        .expect("command checked non-empty at admission");
    let mut command = Command::new(program);
    command
        .args(leading)
        .arg("--input")
        .arg(&input_dir)
        .arg("--output")
        .arg(&output_dir)
        .arg("--disk-size")
        .arg(request.disk_size.to_string())
        .arg("--time-interval")
        .arg(request.time_interval_hours.to_string())
        .arg("--visualize")
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = match cfg.process_timeout {
        Some(limit) => match tokio::time::timeout(limit, command.output()).await {
            Ok(result) => result,
            Err(_) => {
                return Err(format!(
                    "analysis timed out after {}",
                    humantime::format_duration(limit)
                ))
            }
        },
        None => command.output().await,
    };

    let output = output.map_err(|e| format!("failed to launch {program}: {e}"))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            Err(format!("analysis exited with {}", output.status))
        } else {
            Err(stdout.to_string())
        }
    } else {
        Err(stderr.to_string())
    }
}
