//! Read-only access to the on-disk artifact layout.
//!
//! Per experiment the analysis process writes, under the results root:
//! `csv/<exp>_summary.json`, `csv/<exp>_timeseries.csv`,
//! `plots/<exp>_analysis.png`, and optionally `_extracted_frames/*.png`.
//! This module resolves those conventional paths and reads them; it never
//! writes, and a corrupt artifact is reported to the caller rather than
//! propagated as a hard error.

use crate::config::DashboardConfig;
use crate::model::{DatasetRef, SummaryMetrics, TimePoint};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// The artifact kinds an experiment can have under the results tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Summary,
    TimeSeries,
    Plot,
    FramesDir,
}

/// Resolve the canonical path for one artifact of one experiment.
///
/// Pure path construction; does not touch the filesystem.
pub fn artifact_path(
    results_root: &Path,
    condition: &str,
    experiment: &str,
    kind: ArtifactKind,
) -> PathBuf {
    let exp_dir = results_root.join(condition).join(experiment);
    match kind {
        ArtifactKind::Summary => exp_dir.join("csv").join(format!("{experiment}_summary.json")),
        ArtifactKind::TimeSeries => exp_dir
            .join("csv")
            .join(format!("{experiment}_timeseries.csv")),
        ArtifactKind::Plot => exp_dir
            .join("plots")
            .join(format!("{experiment}_analysis.png")),
        ArtifactKind::FramesDir => exp_dir.join("_extracted_frames"),
    }
}

/// Read-only accessor for the artifact and dataset trees.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    cfg: Arc<DashboardConfig>,
}

impl ArtifactStore {
    pub fn new(cfg: Arc<DashboardConfig>) -> Self {
        Self { cfg }
    }

    fn path(&self, condition: &str, experiment: &str, kind: ArtifactKind) -> PathBuf {
        artifact_path(&self.cfg.results_root, condition, experiment, kind)
    }

    /// Enumerate raw datasets, lexicographically by condition then
    /// experiment, marking each as analyzed iff its summary artifact exists.
    ///
    /// A missing data root yields an empty list.
    pub fn list_datasets(&self) -> Vec<DatasetRef> {
        let mut datasets = Vec::new();
        for condition in sorted_subdirs(&self.cfg.data_root) {
            let cond_path = self.cfg.data_root.join(&condition);
            for experiment in sorted_subdirs(&cond_path) {
                let analyzed = self
                    .path(&condition, &experiment, ArtifactKind::Summary)
                    .is_file();
                datasets.push(DatasetRef::new(&condition, &experiment, analyzed));
            }
        }
        datasets
    }

    /// Enumerate `(condition, experiment)` pairs that have a summary
    /// artifact under the results tree, in lexicographic order.
    pub fn list_summarized(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for condition in sorted_subdirs(&self.cfg.results_root) {
            let cond_path = self.cfg.results_root.join(&condition);
            for experiment in sorted_subdirs(&cond_path) {
                if self
                    .path(&condition, &experiment, ArtifactKind::Summary)
                    .is_file()
                {
                    pairs.push((condition.clone(), experiment));
                }
            }
        }
        pairs
    }

    /// Read and parse the summary record.
    ///
    /// `Ok(None)` means the artifact does not exist; a present but unreadable
    /// or malformed record is an error the caller collects per experiment.
    pub fn read_summary(&self, condition: &str, experiment: &str) -> Result<Option<SummaryMetrics>> {
        let path = self.path(condition, experiment, ArtifactKind::Summary);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading summary {}", path.display()))?;
        let metrics = serde_json::from_str(&text)
            .with_context(|| format!("parsing summary {}", path.display()))?;
        Ok(Some(metrics))
    }

    /// Read the rendered analysis plot.
    ///
    /// `Ok(None)` means the artifact does not exist.
    pub fn read_plot(&self, condition: &str, experiment: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(condition, experiment, ArtifactKind::Plot);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes =
            fs::read(&path).with_context(|| format!("reading plot {}", path.display()))?;
        Ok(Some(bytes))
    }

    /// Read the time-series table as raw CSV text plus parsed rows.
    ///
    /// Absence, unreadability, and parse failures all yield `None`: one
    /// corrupt table degrades that experiment's chart, it never blocks the
    /// rest of the index. The analysis process may be writing this file
    /// concurrently, so a half-written table is expected here.
    pub fn read_time_series(
        &self,
        condition: &str,
        experiment: &str,
    ) -> Option<(String, Vec<TimePoint>)> {
        let path = self.path(condition, experiment, ArtifactKind::TimeSeries);
        if !path.is_file() {
            return None;
        }
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable time series");
                return None;
            }
        };
        match parse_time_series(&text) {
            Ok(points) => Some((text, points)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed time series");
                None
            }
        }
    }

    /// First extracted frame by sort order, if any.
    pub fn read_first_frame(&self, condition: &str, experiment: &str) -> Option<Vec<u8>> {
        self.read_frame(condition, experiment, false)
    }

    /// Last extracted frame by sort order, if any.
    pub fn read_last_frame(&self, condition: &str, experiment: &str) -> Option<Vec<u8>> {
        self.read_frame(condition, experiment, true)
    }

    fn read_frame(&self, condition: &str, experiment: &str, last: bool) -> Option<Vec<u8>> {
        let dir = self.path(condition, experiment, ArtifactKind::FramesDir);
        let mut frames: Vec<PathBuf> = fs::read_dir(&dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        // A lone frame cannot stand for both the start and the end of the
        // sequence, so the before/after pair needs at least two.
        if frames.len() < 2 {
            return None;
        }
        frames.sort();
        let path = if last { frames.last()? } else { frames.first()? };
        match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable frame");
                None
            }
        }
    }
}

/// Parse the fixed three-column time-series table.
///
/// Extra columns are tolerated; a missing expected column or an unparsable
/// numeric cell fails the whole table.
fn parse_time_series(text: &str) -> Result<Vec<TimePoint>> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let header = lines.next().context("empty table")?;
    let columns: Vec<&str> = header.split(',').map(str::trim).collect();
    let col = |name: &str| {
        columns
            .iter()
            .position(|c| *c == name)
            .with_context(|| format!("missing column {name:?}"))
    };
    let time_idx = col("time_hours")?;
    let area_idx = col("wound_area_px")?;
    let closure_idx = col("closure_percentage")?;

    let mut points = Vec::new();
    for (lineno, line) in lines.enumerate() {
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        let cell = |idx: usize| -> Result<f64> {
            cells
                .get(idx)
                .with_context(|| format!("row {}: missing cell {idx}", lineno + 2))?
                .parse::<f64>()
                .with_context(|| format!("row {}: bad numeric cell", lineno + 2))
        };
        points.push(TimePoint {
            time_hours: cell(time_idx)?,
            wound_area_px: cell(area_idx)?,
            closure_pct: cell(closure_idx)?,
        });
    }
    Ok(points)
}

/// Names of the immediate subdirectories of `dir`, sorted. Missing or
/// unreadable directories yield an empty list.
fn sorted_subdirs(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    const CSV: &str = "time_hours,wound_area_px,closure_percentage\n\
                       0.0,1000.0,0.0\n\
                       0.25,900.0,10.0\n";

    fn store(root: &Path) -> ArtifactStore {
        ArtifactStore::new(Arc::new(DashboardConfig {
            data_root: root.join("data"),
            results_root: root.join("results"),
            ..DashboardConfig::default()
        }))
    }

    fn write_artifact(root: &Path, condition: &str, experiment: &str, kind: ArtifactKind, bytes: &[u8]) {
        let path = artifact_path(&root.join("results"), condition, experiment, kind);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn paths_follow_the_conventional_layout() {
        let root = Path::new("/r");
        assert_eq!(
            artifact_path(root, "MDCK_Control", "exp1", ArtifactKind::Summary),
            Path::new("/r/MDCK_Control/exp1/csv/exp1_summary.json")
        );
        assert_eq!(
            artifact_path(root, "MDCK_Control", "exp1", ArtifactKind::TimeSeries),
            Path::new("/r/MDCK_Control/exp1/csv/exp1_timeseries.csv")
        );
        assert_eq!(
            artifact_path(root, "MDCK_Control", "exp1", ArtifactKind::Plot),
            Path::new("/r/MDCK_Control/exp1/plots/exp1_analysis.png")
        );
        assert_eq!(
            artifact_path(root, "MDCK_Control", "exp1", ArtifactKind::FramesDir),
            Path::new("/r/MDCK_Control/exp1/_extracted_frames")
        );
    }

    #[test]
    fn parse_time_series_accepts_extra_columns() {
        let text = "frame,time_hours,wound_area_px,closure_percentage\n1,0.0,1000.0,0.0\n";
        let points = parse_time_series(text).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].wound_area_px, 1000.0);
    }

    #[test]
    fn parse_time_series_rejects_missing_columns_and_bad_cells() {
        assert!(parse_time_series("time_hours,wound_area_px\n0.0,1.0\n").is_err());
        assert!(
            parse_time_series("time_hours,wound_area_px,closure_percentage\n0.0,oops,0.0\n")
                .is_err()
        );
        assert!(parse_time_series("").is_err());
    }

    #[test]
    fn list_datasets_is_sorted_and_marks_analyzed() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for dir in ["data/B_cond/exp2", "data/B_cond/exp1", "data/A_cond/exp1"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        write_artifact(root, "B_cond", "exp1", ArtifactKind::Summary, b"{}");

        let datasets = store(root).list_datasets();
        let ids: Vec<&str> = datasets.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["A_cond/exp1", "B_cond/exp1", "B_cond/exp2"]);
        assert!(!datasets[0].analyzed);
        assert!(datasets[1].analyzed);
        assert!(!datasets[2].analyzed);
    }

    #[test]
    fn list_datasets_tolerates_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(store(tmp.path()).list_datasets().is_empty());
    }

    #[test]
    fn read_summary_distinguishes_absent_from_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let store = store(root);
        assert!(store.read_summary("c", "e").unwrap().is_none());

        write_artifact(root, "c", "e", ArtifactKind::Summary, b"{not json");
        assert!(store.read_summary("c", "e").is_err());

        let summary = br#"{"initial_area_px": 1000.0, "final_area_px": 100.0,
            "final_closure_pct": 90.0, "healing_rate_px_per_hr": 45.0,
            "r_squared": 0.98, "num_timepoints": 40, "processing_time_sec": 120.0}"#;
        write_artifact(root, "c", "e", ArtifactKind::Summary, summary);
        let metrics = store.read_summary("c", "e").unwrap().unwrap();
        assert_eq!(metrics.num_timepoints, 40);
        assert_eq!(metrics.final_closure_pct, 90.0);
    }

    #[test]
    fn read_time_series_soft_fails_on_corruption() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let store = store(root);
        assert!(store.read_time_series("c", "e").is_none());

        write_artifact(root, "c", "e", ArtifactKind::TimeSeries, b"half,a,header");
        assert!(store.read_time_series("c", "e").is_none());

        write_artifact(root, "c", "e", ArtifactKind::TimeSeries, CSV.as_bytes());
        let (text, points) = store.read_time_series("c", "e").unwrap();
        assert_eq!(text, CSV);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].closure_pct, 10.0);
    }

    #[test]
    fn frames_resolve_first_and_last_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let store = store(root);
        assert!(store.read_first_frame("c", "e").is_none());

        let frames = artifact_path(&root.join("results"), "c", "e", ArtifactKind::FramesDir);
        fs::create_dir_all(&frames).unwrap();
        fs::write(frames.join("frame_010.png"), b"last").unwrap();
        fs::write(frames.join("frame_001.png"), b"first").unwrap();
        fs::write(frames.join("notes.txt"), b"ignored").unwrap();

        assert_eq!(store.read_first_frame("c", "e").unwrap(), b"first");
        assert_eq!(store.read_last_frame("c", "e").unwrap(), b"last");
    }

    #[test]
    fn a_single_frame_yields_no_before_after_pair() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let frames = artifact_path(&root.join("results"), "c", "e", ArtifactKind::FramesDir);
        fs::create_dir_all(&frames).unwrap();
        fs::write(frames.join("frame_000.png"), b"only").unwrap();

        let store = store(root);
        assert!(store.read_first_frame("c", "e").is_none());
        assert!(store.read_last_frame("c", "e").is_none());
    }
}
