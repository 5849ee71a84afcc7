//! File-based configuration for the biochem simulation.
//!
//! Reads `compounds`, `processes` and `species` data files written in RON,
//! TOML or JSON, resolves names into ids, and produces a frozen registry plus
//! the installed processor profiles. See [`loader::load_biochem_data`].

pub mod loader;
pub mod schema;

pub use loader::{BiochemData, DataLoadError, load_biochem_data};
