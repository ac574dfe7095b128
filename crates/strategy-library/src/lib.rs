//! File-backed strategy library
//!
//! One pretty-printed JSON document per strategy, `<dir>/<name>.json`.
//! Every query reads the directory again; nothing is cached in memory.

pub mod library;
pub mod presets;
pub mod storage;

pub use library::{ImportFailure, ImportReport, StrategyFilter, StrategyLibrary};
pub use presets::predefined_strategies;
