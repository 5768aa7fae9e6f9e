use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Accepted bounds for [`AnalysisRequest::disk_size`], in pixels.
pub const DISK_SIZE_RANGE: std::ops::RangeInclusive<u32> = 5..=20;
/// Accepted bounds for [`AnalysisRequest::time_interval_hours`].
pub const TIME_INTERVAL_RANGE: std::ops::RangeInclusive<f64> = 0.1..=1.0;

/// One raw input dataset, identified by condition and experiment id.
///
/// `analyzed` is derived by probing for the summary artifact and is
/// recomputed on every scan; it is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    /// `"condition/experiment"`, the id accepted by job start requests.
    pub id: String,
    pub condition: String,
    pub experiment: String,
    pub analyzed: bool,
}

impl DatasetRef {
    pub fn new(condition: &str, experiment: &str, analyzed: bool) -> Self {
        Self {
            id: format!("{condition}/{experiment}"),
            condition: condition.to_string(),
            experiment: experiment.to_string(),
            analyzed,
        }
    }
}

/// Summary metrics for one analyzed experiment.
///
/// Field names match the keys of the on-disk `*_summary.json` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_area_px: f64,
    pub final_area_px: f64,
    pub final_closure_pct: f64,
    pub healing_rate_px_per_hr: f64,
    /// Goodness of fit of the healing-rate regression, in `[0, 1]`.
    pub r_squared: f64,
    pub num_timepoints: u32,
    pub processing_time_sec: f64,
}

/// One row of the per-experiment time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub time_hours: f64,
    pub wound_area_px: f64,
    pub closure_pct: f64,
}

/// One fully analyzed experiment, assembled from its on-disk artifacts.
///
/// Exists only when both the summary record and the rendered plot resolve.
/// A missing time-series table leaves `csv_text`/`time_series` empty; missing
/// extracted frames leave the frame fields `None`.
#[derive(Debug, Clone)]
pub struct ExperimentResult {
    pub id: String,
    pub condition: String,
    pub metrics: SummaryMetrics,
    pub time_series: Vec<TimePoint>,
    pub csv_text: String,
    pub plot_png: Vec<u8>,
    pub first_frame_png: Option<Vec<u8>>,
    pub last_frame_png: Option<Vec<u8>>,
}

/// A per-experiment soft failure collected during an index scan.
#[derive(Debug, Clone, Serialize)]
pub struct IndexError {
    pub condition: String,
    pub experiment: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// The single process-wide analysis job record.
///
/// Owned exclusively by the orchestrator; readers always observe a complete
/// state, never a half-updated one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub phase: JobPhase,
    /// Percent complete, `0..=100`.
    pub progress: u8,
    pub message: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            phase: JobPhase::Idle,
            progress: 0,
            message: String::new(),
            started_at: None,
        }
    }
}

/// Poll-status wire shape consumed by the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub running: bool,
    pub progress: u8,
    pub status: String,
}

impl From<&JobState> for JobStatus {
    fn from(state: &JobState) -> Self {
        Self {
            running: state.phase == JobPhase::Running,
            progress: state.progress,
            status: state.message.clone(),
        }
    }
}

/// Request to start one analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// `"condition/experiment"`.
    pub dataset_id: String,
    pub disk_size: u32,
    pub time_interval_hours: f64,
}

impl AnalysisRequest {
    /// Validate the request and split the dataset id into its
    /// `(condition, experiment)` path segments.
    ///
    /// Rejects ids that would escape the configured roots when joined into a
    /// path, and numeric parameters outside the accepted input bounds.
    pub fn validate(&self) -> Result<(String, String), String> {
        let mut parts = self.dataset_id.split('/');
        let (condition, experiment) = match (parts.next(), parts.next(), parts.next()) {
            (Some(c), Some(e), None) => (c, e),
            _ => {
                return Err(format!(
                    "dataset id {:?} is not of the form condition/experiment",
                    self.dataset_id
                ))
            }
        };
        for segment in [condition, experiment] {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains(['\\', '\0'])
            {
                return Err(format!(
                    "dataset id {:?} contains an invalid path segment",
                    self.dataset_id
                ));
            }
        }
        if !DISK_SIZE_RANGE.contains(&self.disk_size) {
            return Err(format!(
                "disk size {} is outside {}..={}",
                self.disk_size,
                DISK_SIZE_RANGE.start(),
                DISK_SIZE_RANGE.end()
            ));
        }
        if !self.time_interval_hours.is_finite()
            || !TIME_INTERVAL_RANGE.contains(&self.time_interval_hours)
        {
            return Err(format!(
                "time interval {} is outside {}..={}",
                self.time_interval_hours,
                TIME_INTERVAL_RANGE.start(),
                TIME_INTERVAL_RANGE.end()
            ));
        }
        Ok((condition.to_string(), experiment.to_string()))
    }
}
