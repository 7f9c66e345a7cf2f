//! Report assembly: the derived table, notes substitution, and formatting.

pub mod format;
pub mod notes;
pub mod table;

pub use format::*;
pub use notes::*;
pub use table::*;
