//! # Registry Common Library
//!
//! Shared code for the facility registry crates:
//! - Error type
//! - Configuration loading
//! - Region and facility geometry
//! - Database schema, models and initialization
//! - Event bus used for cache invalidation
//! - ISO week helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod geo;
pub mod time;

pub use error::{Error, Result};
pub use geo::{Boundary, GeoPoint, Polygon};
