//! Data-driven registry loading from JSON.
//!
//! Feature-gated behind `data-loader`. Provides JSON deserialization into
//! [`RegistryBuilder`] for compound and process tables defined in data files.
//! Profiles and multi-format loading live in the `biochem-data` crate.

use crate::registry::{CompoundDef, RatioEntry, RegistryBuilder, RegistryError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("unknown compound reference: {0}")]
    UnknownCompoundRef(String),
}

// ---------------------------------------------------------------------------
// JSON data structures
// ---------------------------------------------------------------------------

/// Top-level registry data structure for JSON deserialization.
#[derive(Debug, serde::Deserialize)]
pub struct RegistryData {
    #[serde(default)]
    pub compounds: Vec<CompoundData>,
    #[serde(default)]
    pub processes: Vec<ProcessData>,
}

/// JSON representation of a compound type.
#[derive(Debug, serde::Deserialize)]
pub struct CompoundData {
    pub name: String,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default)]
    pub environmental: bool,
}

fn default_volume() -> f64 {
    1.0
}

/// JSON representation of a process.
#[derive(Debug, serde::Deserialize)]
pub struct ProcessData {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<RatioData>,
    #[serde(default)]
    pub outputs: Vec<RatioData>,
    pub base_rate: f64,
}

/// JSON representation of a process input/output entry.
#[derive(Debug, serde::Deserialize)]
pub struct RatioData {
    pub compound: String, // references compound by name
    pub ratio: f64,
}

// ---------------------------------------------------------------------------
// Loading functions
// ---------------------------------------------------------------------------

/// Load a registry from a JSON string.
pub fn load_registry_json(json: &str) -> Result<RegistryBuilder, DataLoadError> {
    let data: RegistryData = serde_json::from_str(json)?;
    build_registry(data)
}

/// Load a registry from JSON bytes.
pub fn load_registry_json_bytes(bytes: &[u8]) -> Result<RegistryBuilder, DataLoadError> {
    let data: RegistryData = serde_json::from_slice(bytes)?;
    build_registry(data)
}

fn resolve_ratios(builder: &RegistryBuilder, entries: &[RatioData]) -> Result<Vec<RatioEntry>, DataLoadError> {
    entries
        .iter()
        .map(|entry| {
            builder
                .compound_id(&entry.compound)
                .map(|id| RatioEntry::new(id, entry.ratio))
                .ok_or_else(|| DataLoadError::UnknownCompoundRef(entry.compound.clone()))
        })
        .collect()
}

fn build_registry(data: RegistryData) -> Result<RegistryBuilder, DataLoadError> {
    let mut builder = RegistryBuilder::new();

    // Phase 1: Register all compounds
    for compound in data.compounds {
        builder.register_compound(CompoundDef {
            name: compound.name,
            volume: compound.volume,
            is_environmental: compound.environmental,
        });
    }

    // Phase 2: Register all processes (resolve compound refs by name)
    for process in &data.processes {
        let inputs = resolve_ratios(&builder, &process.inputs)?;
        let outputs = resolve_ratios(&builder, &process.outputs)?;
        builder.register_process(&process.name, inputs, outputs, process.base_rate);
    }

    Ok(builder)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_empty_json() {
        let builder = load_registry_json(r#"{"compounds": [], "processes": []}"#).unwrap();
        let reg = builder.build().unwrap();
        assert_eq!(reg.compound_count(), 0);
        assert_eq!(reg.process_count(), 0);
    }

    #[test]
    fn load_compounds_only() {
        let json = r#"{"compounds": [{"name": "glucose"}, {"name": "oxygen", "environmental": true}]}"#;
        let reg = load_registry_json(json).unwrap().build().unwrap();
        assert_eq!(reg.compound_count(), 2);
        let oxygen = reg.compound_id("oxygen").unwrap();
        assert!(reg.compound(oxygen).unwrap().is_environmental);
        assert_eq!(reg.compound(oxygen).unwrap().volume, 1.0);
    }

    #[test]
    fn load_process_references_compounds_by_name() {
        let json = r#"{
            "compounds": [{"name": "glucose"}, {"name": "atp"}],
            "processes": [{
                "name": "glycolysis",
                "inputs": [{"compound": "glucose", "ratio": 1.0}],
                "outputs": [{"compound": "atp", "ratio": 2.0}],
                "base_rate": 1.5
            }]
        }"#;
        let reg = load_registry_json(json).unwrap().build().unwrap();
        let def = reg.process(reg.process_id("glycolysis").unwrap()).unwrap();
        assert_eq!(def.inputs[0].compound, reg.compound_id("glucose").unwrap());
        assert_eq!(def.outputs[0].ratio, 2.0);
        assert_eq!(def.base_rate, 1.5);
    }

    #[test]
    fn load_unknown_compound_fails() {
        let json = r#"{
            "compounds": [{"name": "glucose"}],
            "processes": [{"name": "bad", "inputs": [{"compound": "nonexistent", "ratio": 1.0}], "base_rate": 1.0}]
        }"#;
        assert!(matches!(
            load_registry_json(json),
            Err(DataLoadError::UnknownCompoundRef(name)) if name == "nonexistent"
        ));
    }

    #[test]
    fn load_invalid_json_fails() {
        assert!(matches!(
            load_registry_json("not valid json {{{"),
            Err(DataLoadError::JsonParse(_))
        ));
    }

    #[test]
    fn load_from_bytes() {
        let bytes = br#"{"compounds": [{"name": "a"}]}"#;
        let reg = load_registry_json_bytes(bytes).unwrap().build().unwrap();
        assert_eq!(reg.compound_count(), 1);
    }
}
