//! Dashboard view assembly.
//!
//! Combines a fresh index scan with the current job status into the view
//! model the presentation layer renders. Binary artifacts are embedded as
//! base64 so the view is transport-safe as JSON.

use crate::config::DashboardConfig;
use crate::indexer::ResultIndexer;
use crate::model::{DatasetRef, ExperimentResult, IndexError, JobStatus, SummaryMetrics};
use crate::orchestrator::JobOrchestrator;
use crate::store::ArtifactStore;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Chart-ready series extracted from the time-series table.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSeries {
    pub time: Vec<f64>,
    pub area: Vec<f64>,
    pub closure: Vec<f64>,
}

/// One experiment as presented on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentView {
    pub id: String,
    pub condition: String,
    pub metrics: SummaryMetrics,
    /// `None` when the time-series table is missing or unparsable.
    pub chart: Option<ChartSeries>,
    /// Raw table text for client-side download; empty when absent.
    pub csv_text: String,
    /// Base64-encoded PNG.
    pub plot_png: String,
    pub first_frame_png: Option<String>,
    pub last_frame_png: Option<String>,
    /// Elapsed time label for the before/after comparison, present only when
    /// both frames are. Derived from the configured frame interval, which
    /// may differ from the interval the run was actually analyzed with.
    pub elapsed_hours: Option<f64>,
}

/// Aggregate statistics across all indexed experiments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub experiments: usize,
    pub conditions: usize,
    pub total_frames: u64,
    pub total_processing_minutes: f64,
}

/// The full view model consumed by the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub results: Vec<ExperimentView>,
    pub unanalyzed: Vec<DatasetRef>,
    pub stats: DashboardStats,
    pub job: JobStatus,
    pub index_errors: Vec<IndexError>,
}

/// Builds [`DashboardView`]s from the artifact tree and the job state.
///
/// Every call re-scans the tree; nothing is cached between calls, so a view
/// assembled after a job completes picks up the new artifacts.
#[derive(Debug, Clone)]
pub struct DashboardAssembler {
    store: ArtifactStore,
    indexer: ResultIndexer,
    jobs: JobOrchestrator,
    frame_interval_hours: f64,
}

impl DashboardAssembler {
    pub fn new(cfg: Arc<DashboardConfig>, jobs: JobOrchestrator) -> Self {
        let store = ArtifactStore::new(cfg.clone());
        Self {
            indexer: ResultIndexer::new(store.clone()),
            store,
            jobs,
            frame_interval_hours: cfg.frame_interval_hours,
        }
    }

    pub fn assemble(&self) -> DashboardView {
        let outcome = self.indexer.build_index();
        let stats = compute_stats(&outcome.results);
        let results = outcome
            .results
            .into_iter()
            .map(|r| self.render_experiment(r))
            .collect();
        let unanalyzed = self
            .store
            .list_datasets()
            .into_iter()
            .filter(|d| !d.analyzed)
            .collect();
        DashboardView {
            results,
            unanalyzed,
            stats,
            job: JobStatus::from(&self.jobs.status()),
            index_errors: outcome.errors,
        }
    }

    fn render_experiment(&self, result: ExperimentResult) -> ExperimentView {
        let chart = if result.time_series.is_empty() {
            None
        } else {
            Some(ChartSeries {
                time: result.time_series.iter().map(|p| p.time_hours).collect(),
                area: result.time_series.iter().map(|p| p.wound_area_px).collect(),
                closure: result.time_series.iter().map(|p| p.closure_pct).collect(),
            })
        };
        let first_frame_png = result.first_frame_png.map(|b| BASE64.encode(b));
        let last_frame_png = result.last_frame_png.map(|b| BASE64.encode(b));
        let elapsed_hours = match (&first_frame_png, &last_frame_png) {
            (Some(_), Some(_)) => {
                debug!(
                    experiment = %result.id,
                    interval = self.frame_interval_hours,
                    "labeling frame comparison with configured frame interval"
                );
                Some(f64::from(result.metrics.num_timepoints) * self.frame_interval_hours)
            }
            _ => None,
        };
        ExperimentView {
            id: result.id,
            condition: result.condition,
            metrics: result.metrics,
            chart,
            csv_text: result.csv_text,
            plot_png: BASE64.encode(result.plot_png),
            first_frame_png,
            last_frame_png,
            elapsed_hours,
        }
    }
}

fn compute_stats(results: &[ExperimentResult]) -> DashboardStats {
    let conditions: BTreeSet<&str> = results.iter().map(|r| r.condition.as_str()).collect();
    DashboardStats {
        experiments: results.len(),
        conditions: conditions.len(),
        total_frames: results
            .iter()
            .map(|r| u64::from(r.metrics.num_timepoints))
            .sum(),
        total_processing_minutes: results
            .iter()
            .map(|r| r.metrics.processing_time_sec)
            .sum::<f64>()
            / 60.0,
    }
}
