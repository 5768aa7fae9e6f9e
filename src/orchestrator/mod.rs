//! Analysis job lifecycle.
//!
//! This module owns the single allowed concurrent analysis job: admission,
//! launching the external process off the request path, and the shared state
//! record that polling clients observe.

mod controller;

pub use controller::{JobError, JobOrchestrator};
