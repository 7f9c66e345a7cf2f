//! Input/output helpers.
//!
//! - measurement file ingest + validation (`ingest`)
//! - narrative notes ingest (`notes`)
//! - data file writes and CSV export (`export`)

pub mod export;
pub mod ingest;
pub mod notes;

pub use export::*;
pub use ingest::*;
pub use notes::*;
