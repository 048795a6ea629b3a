//! PIIGuard - PII Discovery and DSR Execution Engine
//!
//! PIIGuard connects to a tenant's data sources, discovers where personal
//! data lives, and executes data subject requests (access, erasure,
//! portability and friends) against every source that holds the subject's
//! data.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Scan Orchestrator                       │
//! │  - per-tenant concurrency quota                              │
//! │  - full / incremental decision                               │
//! │  - queue dispatch with redelivery guard                      │
//! └───────────────┬──────────────────────────────────────────────┘
//!                 │
//! ┌───────────────▼──────────────────────────────────────────────┐
//! │                     Discovery Pipeline                       │
//! │  schema walk → value sampling → detection → catalog          │
//! └───────────────┬──────────────────────────────────────────────┘
//!                 │ classifications
//! ┌───────────────▼──────────────────────────────────────────────┐
//! │                       DSR Executor                           │
//! │  approval fan-out → bounded task pool → outcome aggregation  │
//! └───────────────┬──────────────────────────────────────────────┘
//!                 │
//! ┌───────────────▼──────────────────────────────────────────────┐
//! │                    Connector Registry                        │
//! │      PostgreSQL        HTTP API        File upload           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Features
//!
//! ### PII Discovery
//! - Pluggable detection strategies (value patterns, field names)
//! - Weighted confidence merging with a configurable floor
//! - Incremental scans based on the last completed run
//!
//! ### DSR Execution
//! - Reviewed lifecycle with an explicit state machine
//! - One task per data source, run under a bounded pool
//! - Manual-deletion sources surface work instead of blocking the DSR
//!
//! ## Modules
//!
//! - [`model`]: Domain records (sources, scans, inventory, DSRs)
//! - [`connector`]: Backend connectors and their registry
//! - [`detect`]: Detection strategies and the composite detector
//! - [`scan`]: Scan orchestration and the discovery pipeline
//! - [`dsr`]: DSR lifecycle and task execution
//! - [`store`]: File-backed JSON repositories
//! - [`queue`]: Job queue with at-least-once delivery
//! - [`events`]: Lifecycle event publishing
//! - [`audit`]: Append-only audit trail
//! - [`config`]: Configuration management

pub mod audit;
pub mod config;
pub mod connector;
pub mod detect;
pub mod dsr;
pub mod error;
pub mod events;
pub mod model;
pub mod queue;
pub mod scan;
pub mod store;

pub use config::PiiGuardConfig;
pub use error::{Error, Result};
