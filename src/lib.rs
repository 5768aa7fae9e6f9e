//! Core of a wound-healing time-lapse dashboard.
//!
//! The image analysis itself is an external batch process; this crate owns
//! everything around it that has real state: a single-flight job
//! orchestrator that launches the process and exposes its progress to a
//! polling client, and a result indexer that joins the per-experiment
//! artifacts the process writes (summary metrics, time-series table,
//! rendered plot, extracted frames) into a consistent view model. Rendering
//! that model is left to an external presentation layer.

pub mod config;
pub mod dashboard;
pub mod indexer;
pub mod model;
pub mod orchestrator;
pub mod store;

pub use config::DashboardConfig;
pub use dashboard::{DashboardAssembler, DashboardStats, DashboardView};
pub use indexer::{IndexOutcome, ResultIndexer};
pub use model::{AnalysisRequest, DatasetRef, ExperimentResult, JobPhase, JobState, JobStatus};
pub use orchestrator::{JobError, JobOrchestrator};
pub use store::ArtifactStore;
