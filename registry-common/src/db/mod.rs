//! Database models and queries

pub mod init;
pub mod models;
pub mod regions;

pub use init::*;
pub use models::*;
pub use regions::*;
