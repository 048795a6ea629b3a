//! Scan path
//!
//! The orchestrator admits scan requests (per-tenant concurrency quota,
//! full vs incremental decision), queues them, and drives each run through
//! the discovery pipeline, which walks the backend schema, samples values,
//! runs detection and persists the inventory and classifications.

mod discovery;
mod orchestrator;

pub use discovery::DiscoveryPipeline;
pub use orchestrator::ScanOrchestrator;
