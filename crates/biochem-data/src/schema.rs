//! Serde data file structs for biochemistry definitions.
//!
//! These structs define the on-disk format for compounds, processes and
//! species. They are deserialized from RON, JSON, or TOML data files and then
//! resolved into engine types by the loader.

use serde::Deserialize;

// ===========================================================================
// Compounds
// ===========================================================================

/// A compound definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct CompoundData {
    pub name: String,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub environmental: Option<bool>,
}

// ===========================================================================
// Processes
// ===========================================================================

/// A process definition in a data file. Inputs and outputs are
/// `(compound_name, ratio)` pairs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessData {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<(String, f64)>,
    #[serde(default)]
    pub outputs: Vec<(String, f64)>,
    pub base_rate: f64,
}

// ===========================================================================
// Species
// ===========================================================================

/// A species (processor profile) definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesData {
    pub name: String,
    /// `(process_name, capacity)` pairs, run in the listed order.
    #[serde(default)]
    pub processes: Vec<(String, f64)>,
    #[serde(default)]
    pub thresholds: Vec<ThresholdData>,
}

/// Per-compound thresholds for a species. Omitted fields keep their defaults
/// (no reserve, no saturation cap, no venting).
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdData {
    pub compound: String,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub vent: Option<f64>,
}

// ===========================================================================
// TOML wrappers
// ===========================================================================

/// TOML files hold lists under a top-level key (`[[compounds]]`).
#[derive(Debug, Clone, Deserialize)]
pub struct TomlCompounds {
    pub compounds: Vec<CompoundData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlProcesses {
    pub processes: Vec<ProcessData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlSpecies {
    pub species: Vec<SpeciesData>,
}
