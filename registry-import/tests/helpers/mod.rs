//! Test Helper Utilities
//!
//! Shared utilities for testing registry-import

pub mod db_utils;

// Re-export commonly used items
pub use db_utils::{
    create_test_db, create_test_orchestrator, facility_count, raw_row, seed_region, snapshots_for,
    test_period, test_settings,
};
