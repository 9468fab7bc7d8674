//! Terminal presentation: colors, status messages and summary tables.

pub mod output;
pub mod summary;
pub mod theme;
