//! registry-import library interface
//!
//! Bulk import of facility rows into a region's registry. Exposes the
//! pipeline components and the storage seam for integration testing and for
//! the `registry-import` binary.

pub mod db;
pub mod error;
pub mod models;
pub mod reader;
pub mod services;

pub use crate::error::{ImportError, ImportResult};
pub use crate::models::{ImportOutcome, ImportSession, RawRow};
pub use crate::services::WorkflowOrchestrator;
