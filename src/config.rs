use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the dashboard core.
///
/// All fields have defaults matching the conventional on-disk layout, so a
/// partial config file (or none at all) is enough to get going.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Root of the raw dataset tree: `<data_root>/<condition>/<experiment>`.
    pub data_root: PathBuf,

    /// Root of the results tree the analysis process writes into.
    pub results_root: PathBuf,

    /// External analysis program plus fixed leading arguments; per-request
    /// flags (`--input`, `--output`, `--disk-size`, `--time-interval`,
    /// `--visualize`) are appended at launch.
    pub analysis_command: Vec<String>,

    /// Per-frame duration in hours, used to label the before/after frame
    /// comparison. The artifacts do not record the interval a run was
    /// actually analyzed with, so this may disagree with it; the assembler
    /// notes when a label is derived from this value.
    pub frame_interval_hours: f64,

    /// Optional hard cap on the external process. On expiry the child is
    /// killed and the job is marked failed.
    #[serde(with = "humantime_serde")]
    pub process_timeout: Option<Duration>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data/raw/real_dataset"),
            results_root: PathBuf::from("results/real_data"),
            analysis_command: vec!["python".to_string(), "src/batch_analysis.py".to_string()],
            frame_interval_hours: 0.25,
            process_timeout: None,
        }
    }
}
