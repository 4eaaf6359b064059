//! Background processors.
//!
//! - `RetentionSweeper`: deletes events older than the configured TTL.

pub mod retention_sweeper;

pub use retention_sweeper::RetentionSweeper;
