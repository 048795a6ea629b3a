//! DSR execution path
//!
//! A data subject request moves through a reviewed lifecycle (pending,
//! optional identity verification, approval) before execution fans it out
//! into one task per data source. Tasks run concurrently under a bounded
//! pool; the DSR's terminal state is derived from its tasks.

mod executor;
mod task;

pub use executor::DsrExecutor;
