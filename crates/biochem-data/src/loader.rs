//! Resolution pipeline: reads data files, resolves cross-references, builds
//! the registry and installs species profiles.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers used by [`load_biochem_data`].

use crate::schema::{CompoundData, ProcessData, SpeciesData};
use biochem_core::id::{CompoundId, ProcessId};
use biochem_core::profile::{ConfigurationError, ProfileBuilder, ProfileTable};
use biochem_core::registry::{CompoundDef, RatioEntry, Registry, RegistryBuilder, RegistryError};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The compound/process tables failed validation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A species failed profile validation. Nothing was installed.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = &found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(path: &Path, toml_key: &str) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(map: &HashMap<String, V>, name: &str, file: &Path) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Pipeline
// ===========================================================================

/// Everything loaded from a data directory: frozen tables plus the installed
/// species profiles (keyed by species name, which is also the owner kind).
#[derive(Debug)]
pub struct BiochemData {
    pub registry: Arc<Registry>,
    pub profiles: ProfileTable,
}

/// Load `compounds` and `processes` (required) and `species` (optional) from
/// `dir`, in whichever of RON/TOML/JSON each is written in.
///
/// Any unresolved name, duplicate, invalid ratio or invalid species aborts the
/// whole load; no partially built table is returned.
pub fn load_biochem_data(dir: &Path) -> Result<BiochemData, DataLoadError> {
    let compounds_path = require_data_file(dir, "compounds")?;
    let processes_path = require_data_file(dir, "processes")?;
    let species_path = find_data_file(dir, "species")?;

    let compounds: Vec<CompoundData> = deserialize_list(&compounds_path, "compounds")?;
    let processes: Vec<ProcessData> = deserialize_list(&processes_path, "processes")?;

    let mut builder = RegistryBuilder::new();

    // Phase 1: compounds.
    let mut compound_ids: HashMap<String, CompoundId> = HashMap::new();
    for compound in compounds {
        check_duplicate(&compound_ids, &compound.name, &compounds_path)?;
        let mut def = CompoundDef::new(&compound.name);
        if let Some(volume) = compound.volume {
            def.volume = volume;
        }
        def.is_environmental = compound.environmental.unwrap_or(false);
        let id = builder.register_compound(def);
        compound_ids.insert(compound.name, id);
    }

    // Phase 2: processes (resolve compound names).
    let mut process_ids: HashMap<String, ProcessId> = HashMap::new();
    for process in &processes {
        check_duplicate(&process_ids, &process.name, &processes_path)?;
        let resolve = |entries: &[(String, f64)]| -> Result<Vec<RatioEntry>, DataLoadError> {
            entries
                .iter()
                .map(|(name, ratio)| {
                    let id = resolve_name(&compound_ids, name, &processes_path, "compound")?;
                    Ok(RatioEntry::new(*id, *ratio))
                })
                .collect()
        };
        let inputs = resolve(&process.inputs)?;
        let outputs = resolve(&process.outputs)?;
        let id = builder.register_process(&process.name, inputs, outputs, process.base_rate);
        process_ids.insert(process.name.clone(), id);
    }

    let registry = Arc::new(builder.build()?);

    // Phase 3: species (resolve process and compound names).
    let mut profiles = ProfileTable::new();
    if let Some(species_path) = species_path {
        let species: Vec<SpeciesData> = deserialize_list(&species_path, "species")?;
        let mut builders: Vec<ProfileBuilder> = Vec::with_capacity(species.len());
        for entry in &species {
            if builders.iter().any(|staged| staged.label() == entry.name) {
                return Err(DataLoadError::DuplicateName {
                    file: species_path.clone(),
                    name: entry.name.clone(),
                });
            }
            builders.push(species_builder(entry, &compound_ids, &process_ids, &species_path)?);
        }
        profiles.install_for(builders, &registry)?;
    }

    log::info!(
        "loaded {} compound(s), {} process(es), {} species from {}",
        registry.compound_count(),
        registry.process_count(),
        profiles.len(),
        dir.display()
    );

    Ok(BiochemData { registry, profiles })
}

fn species_builder(
    species: &SpeciesData,
    compound_ids: &HashMap<String, CompoundId>,
    process_ids: &HashMap<String, ProcessId>,
    file: &Path,
) -> Result<ProfileBuilder, DataLoadError> {
    let mut builder = ProfileBuilder::new(&species.name);
    for (name, capacity) in &species.processes {
        let process = resolve_name(process_ids, name, file, "process")?;
        builder.set_capacity(*process, *capacity);
    }
    for threshold in &species.thresholds {
        let compound = *resolve_name(compound_ids, &threshold.compound, file, "compound")?;
        if let Some(low) = threshold.low {
            builder.set_low_threshold(compound, low);
        }
        if let Some(high) = threshold.high {
            builder.set_high_threshold(compound, high);
        }
        if let Some(vent) = threshold.vent {
            builder.set_vent_threshold(compound, vent);
        }
    }
    Ok(builder)
}

// ===========================================================================
// Tests
// ===========================================================================
