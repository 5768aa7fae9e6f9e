//! Best-effort scan of the results tree into assembled experiment results.
//!
//! Each experiment either joins the index, degrades (optional artifacts
//! missing), is silently skipped (no plot yet), or lands in the error list.
//! One bad experiment never aborts the scan: the analysis process may be
//! writing artifacts while we read.

use crate::model::{ExperimentResult, IndexError};
use crate::store::ArtifactStore;
use tracing::warn;

/// Outcome of one full index scan.
#[derive(Debug, Default)]
pub struct IndexOutcome {
    /// Lexicographic by condition then experiment.
    pub results: Vec<ExperimentResult>,
    pub errors: Vec<IndexError>,
}

/// Joins per-experiment artifacts into [`ExperimentResult`]s.
///
/// Stateless: every call re-reads the tree so each dashboard view reflects
/// current disk state.
#[derive(Debug, Clone)]
pub struct ResultIndexer {
    store: ArtifactStore,
}

impl ResultIndexer {
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    /// Scan every summarized experiment under the results tree.
    ///
    /// An experiment is included iff both its summary record and rendered
    /// plot resolve. A summarized experiment without a plot is skipped
    /// without an error entry: the plot is rendered last, so its absence
    /// means the analysis has not finished with that experiment.
    pub fn build_index(&self) -> IndexOutcome {
        let mut outcome = IndexOutcome::default();
        for (condition, experiment) in self.store.list_summarized() {
            match self.assemble_one(&condition, &experiment) {
                Ok(Some(result)) => outcome.results.push(result),
                Ok(None) => {}
                Err(message) => {
                    warn!(%condition, %experiment, %message, "skipping experiment");
                    outcome.errors.push(IndexError {
                        condition,
                        experiment,
                        message,
                    });
                }
            }
        }
        outcome
    }

    /// Assemble one experiment. `Ok(None)` means a required artifact is
    /// absent (not yet produced); `Err` means one is present but unusable.
    fn assemble_one(
        &self,
        condition: &str,
        experiment: &str,
    ) -> Result<Option<ExperimentResult>, String> {
        let Some(metrics) = self
            .store
            .read_summary(condition, experiment)
            .map_err(|e| format!("{e:#}"))?
        else {
            return Ok(None);
        };
        let Some(plot_png) = self
            .store
            .read_plot(condition, experiment)
            .map_err(|e| format!("{e:#}"))?
        else {
            return Ok(None);
        };

        let (csv_text, time_series) = self
            .store
            .read_time_series(condition, experiment)
            .unwrap_or_default();

        Ok(Some(ExperimentResult {
            id: experiment.to_string(),
            condition: condition.to_string(),
            metrics,
            time_series,
            csv_text,
            plot_png,
            first_frame_png: self.store.read_first_frame(condition, experiment),
            last_frame_png: self.store.read_last_frame(condition, experiment),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use crate::store::{artifact_path, ArtifactKind};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    const SUMMARY: &str = r#"{"initial_area_px": 1000.0, "final_area_px": 100.0,
        "final_closure_pct": 90.0, "healing_rate_px_per_hr": 45.0,
        "r_squared": 0.98, "num_timepoints": 40, "processing_time_sec": 120.0}"#;
    const CSV: &str = "time_hours,wound_area_px,closure_percentage\n0.0,1000.0,0.0\n";

    fn indexer(root: &Path) -> ResultIndexer {
        ResultIndexer::new(ArtifactStore::new(Arc::new(DashboardConfig {
            data_root: root.join("data"),
            results_root: root.join("results"),
            ..DashboardConfig::default()
        })))
    }

    fn write(root: &Path, condition: &str, experiment: &str, kind: ArtifactKind, bytes: &[u8]) {
        let path = artifact_path(&root.join("results"), condition, experiment, kind);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn includes_experiment_iff_summary_and_plot_exist() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        // Complete pair.
        write(root, "MDCK_Control", "exp1", ArtifactKind::Summary, SUMMARY.as_bytes());
        write(root, "MDCK_Control", "exp1", ArtifactKind::Plot, b"png");
        // Summary only: silently excluded.
        write(root, "MDCK_Control", "exp2", ArtifactKind::Summary, SUMMARY.as_bytes());

        let outcome = indexer(root).build_index();
        assert_eq!(outcome.errors.len(), 0);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].id, "exp1");
        assert_eq!(outcome.results[0].condition, "MDCK_Control");
    }

    #[test]
    fn missing_time_series_degrades_instead_of_excluding() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "c", "e", ArtifactKind::Summary, SUMMARY.as_bytes());
        write(root, "c", "e", ArtifactKind::Plot, b"png");

        let outcome = indexer(root).build_index();
        assert_eq!(outcome.results.len(), 1);
        let result = &outcome.results[0];
        assert!(result.csv_text.is_empty());
        assert!(result.time_series.is_empty());
        assert!(result.first_frame_png.is_none());
        assert!(result.last_frame_png.is_none());
    }

    #[test]
    fn malformed_summary_is_collected_and_scan_continues() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(root, "a_cond", "bad", ArtifactKind::Summary, b"{broken");
        write(root, "a_cond", "bad", ArtifactKind::Plot, b"png");
        write(root, "b_cond", "good", ArtifactKind::Summary, SUMMARY.as_bytes());
        write(root, "b_cond", "good", ArtifactKind::Plot, b"png");
        write(root, "b_cond", "good", ArtifactKind::TimeSeries, CSV.as_bytes());

        let outcome = indexer(root).build_index();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].id, "good");
        assert_eq!(outcome.results[0].time_series.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].condition, "a_cond");
        assert_eq!(outcome.errors[0].experiment, "bad");
    }

    #[test]
    fn results_are_ordered_by_condition_then_experiment() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        for (condition, experiment) in
            [("z_cond", "exp1"), ("a_cond", "exp2"), ("a_cond", "exp1")]
        {
            write(root, condition, experiment, ArtifactKind::Summary, SUMMARY.as_bytes());
            write(root, condition, experiment, ArtifactKind::Plot, b"png");
        }

        let outcome = indexer(root).build_index();
        let order: Vec<(String, String)> = outcome
            .results
            .iter()
            .map(|r| (r.condition.clone(), r.id.clone()))
            .collect();
        assert_eq!(
            order,
            [
                ("a_cond".to_string(), "exp1".to_string()),
                ("a_cond".to_string(), "exp2".to_string()),
                ("z_cond".to_string(), "exp1".to_string()),
            ]
        );
    }
}
