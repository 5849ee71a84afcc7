use crate::id::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of registry versions. Every `build()` publishes a new version so
/// that tables from different startups are never confused.
static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// A compound type definition in the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundDef {
    pub name: String,
    /// Storage volume of one unit.
    pub volume: f64,
    /// Whether the compound is normally found dissolved in the environment
    /// (oxygen, carbon dioxide, sunlight) rather than only inside cells.
    pub is_environmental: bool,
}

impl CompoundDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            volume: 1.0,
            is_environmental: false,
        }
    }

    pub fn environmental(name: &str) -> Self {
        Self {
            is_environmental: true,
            ..Self::new(name)
        }
    }
}

/// A process input/output entry: units of `compound` per unit of rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioEntry {
    pub compound: CompoundId,
    pub ratio: f64,
}

impl RatioEntry {
    pub fn new(compound: CompoundId, ratio: f64) -> Self {
        Self { compound, ratio }
    }
}

/// A process definition: fixed-ratio conversion with a base rate per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessDef {
    pub name: String,
    pub inputs: Vec<RatioEntry>,
    pub outputs: Vec<RatioEntry>,
    pub base_rate: f64,
}

/// Builder for constructing an immutable Registry.
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    compounds: Vec<CompoundDef>,
    compound_name_to_id: HashMap<String, CompoundId>,
    processes: Vec<ProcessDef>,
    process_name_to_id: HashMap<String, ProcessId>,
    duplicates: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Register a compound type. Returns its ID.
    pub fn register_compound(&mut self, def: CompoundDef) -> CompoundId {
        let id = CompoundId(self.compounds.len() as u32);
        if self.compound_name_to_id.insert(def.name.clone(), id).is_some() {
            self.duplicates.push(def.name.clone());
        }
        self.compounds.push(def);
        id
    }

    /// Phase 1: Register a process. Returns its ID.
    pub fn register_process(
        &mut self,
        name: &str,
        inputs: Vec<RatioEntry>,
        outputs: Vec<RatioEntry>,
        base_rate: f64,
    ) -> ProcessId {
        let id = ProcessId(self.processes.len() as u32);
        if self.process_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(name.to_string());
        }
        self.processes.push(ProcessDef {
            name: name.to_string(),
            inputs,
            outputs,
            base_rate,
        });
        id
    }

    /// Phase 2: Mutate an existing process by name.
    pub fn mutate_process<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut ProcessDef),
    {
        let id = self
            .process_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.processes[id.0 as usize]);
        Ok(())
    }

    /// Lookup compound ID by name.
    pub fn compound_id(&self, name: &str) -> Option<CompoundId> {
        self.compound_name_to_id.get(name).copied()
    }

    /// Lookup process ID by name.
    pub fn process_id(&self, name: &str) -> Option<ProcessId> {
        self.process_name_to_id.get(name).copied()
    }

    /// Phase 3: Finalize and build the immutable registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        if let Some(name) = self.duplicates.into_iter().next() {
            return Err(RegistryError::DuplicateName(name));
        }

        for process in &self.processes {
            if !process.base_rate.is_finite() || process.base_rate < 0.0 {
                return Err(RegistryError::InvalidBaseRate {
                    process: process.name.clone(),
                    rate: process.base_rate,
                });
            }
            for entry in process.inputs.iter().chain(process.outputs.iter()) {
                if entry.compound.0 as usize >= self.compounds.len() {
                    return Err(RegistryError::InvalidCompoundRef(entry.compound));
                }
                if !entry.ratio.is_finite() || entry.ratio < 0.0 {
                    return Err(RegistryError::InvalidRatio {
                        process: process.name.clone(),
                        compound: entry.compound,
                        ratio: entry.ratio,
                    });
                }
            }
            // A compound may appear on both sides (a catalyst), but only
            // once per side.
            for side in [&process.inputs, &process.outputs] {
                for (i, entry) in side.iter().enumerate() {
                    if side[..i].iter().any(|prev| prev.compound == entry.compound) {
                        return Err(RegistryError::RepeatedCompound {
                            process: process.name.clone(),
                            compound: entry.compound,
                        });
                    }
                }
            }
        }

        Ok(Registry {
            version: NEXT_VERSION.fetch_add(1, Ordering::Relaxed),
            compounds: self.compounds,
            compound_name_to_id: self.compound_name_to_id,
            processes: self.processes,
            process_name_to_id: self.process_name_to_id,
        })
    }
}

/// Immutable registry. Frozen after build(). Thread-safe to share.
#[derive(Debug)]
pub struct Registry {
    version: u64,
    compounds: Vec<CompoundDef>,
    compound_name_to_id: HashMap<String, CompoundId>,
    processes: Vec<ProcessDef>,
    process_name_to_id: HashMap<String, ProcessId>,
}

impl Registry {
    /// Version assigned when this registry was published.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn compound(&self, id: CompoundId) -> Option<&CompoundDef> {
        self.compounds.get(id.0 as usize)
    }

    pub fn process(&self, id: ProcessId) -> Option<&ProcessDef> {
        self.processes.get(id.0 as usize)
    }

    /// The input ratios, output ratios and base rate of a process.
    pub fn ratios(&self, id: ProcessId) -> Option<(&[RatioEntry], &[RatioEntry], f64)> {
        self.process(id)
            .map(|p| (p.inputs.as_slice(), p.outputs.as_slice(), p.base_rate))
    }

    pub fn compound_id(&self, name: &str) -> Option<CompoundId> {
        self.compound_name_to_id.get(name).copied()
    }

    pub fn process_id(&self, name: &str) -> Option<ProcessId> {
        self.process_name_to_id.get(name).copied()
    }

    pub fn compound_count(&self) -> usize {
        self.compounds.len()
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Iterate over all compounds in ID order.
    pub fn compounds(&self) -> impl Iterator<Item = (CompoundId, &CompoundDef)> {
        self.compounds
            .iter()
            .enumerate()
            .map(|(i, def)| (CompoundId(i as u32), def))
    }

    /// Iterate over all processes in ID order.
    pub fn processes(&self) -> impl Iterator<Item = (ProcessId, &ProcessDef)> {
        self.processes
            .iter()
            .enumerate()
            .map(|(i, def)| (ProcessId(i as u32), def))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("invalid compound reference: {0:?}")]
    InvalidCompoundRef(CompoundId),
    #[error("process '{process}' has invalid ratio {ratio} for {compound:?}")]
    InvalidRatio {
        process: String,
        compound: CompoundId,
        ratio: f64,
    },
    #[error("process '{process}' has invalid base rate {rate}")]
    InvalidBaseRate { process: String, rate: f64 },
    #[error("process '{process}' lists {compound:?} more than once on one side")]
    RepeatedCompound { process: String, compound: CompoundId },
}
