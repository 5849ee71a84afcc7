//! Ambient compound supply.
//!
//! An [`EnvironmentSource`] answers one question for the step engine: how
//! much of each compound is freely available where an entity currently is.
//! Samples are snapshots; nothing in a tick writes to them.

use crate::id::{CompoundId, PatchId};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// EnvironmentSample
// ---------------------------------------------------------------------------

/// Ambient concentration per compound at one location.
///
/// Deserialization goes through [`set`](Self::set), so a decoded sample
/// holds the same values as one built in code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<CompoundId, f64>", into = "BTreeMap<CompoundId, f64>")]
pub struct EnvironmentSample {
    concentrations: BTreeMap<CompoundId, f64>,
}

impl EnvironmentSample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a concentration. NaN and negative values store as 0; positive
    /// infinity is kept and means an unlimited supply.
    pub fn set(&mut self, id: CompoundId, concentration: f64) {
        // f64::max returns the non-NaN operand.
        self.concentrations.insert(id, concentration.max(0.0));
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, id: CompoundId, concentration: f64) -> Self {
        self.set(id, concentration);
        self
    }

    /// Ambient concentration, 0 if absent.
    pub fn get(&self, id: CompoundId) -> f64 {
        self.concentrations.get(&id).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CompoundId, f64)> + '_ {
        self.concentrations.iter().map(|(id, v)| (*id, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.concentrations.is_empty()
    }
}

impl FromIterator<(CompoundId, f64)> for EnvironmentSample {
    fn from_iter<T: IntoIterator<Item = (CompoundId, f64)>>(iter: T) -> Self {
        let mut sample = Self::new();
        for (id, v) in iter {
            sample.set(id, v);
        }
        sample
    }
}

impl From<BTreeMap<CompoundId, f64>> for EnvironmentSample {
    fn from(concentrations: BTreeMap<CompoundId, f64>) -> Self {
        concentrations.into_iter().collect()
    }
}

impl From<EnvironmentSample> for BTreeMap<CompoundId, f64> {
    fn from(sample: EnvironmentSample) -> Self {
        sample.concentrations
    }
}

// ---------------------------------------------------------------------------
// EnvironmentSource
// ---------------------------------------------------------------------------

/// Supplies ambient concentrations for an entity's location.
///
/// Implementations must be `Sync`: with the `parallel` feature, samples are
/// taken from worker threads.
pub trait EnvironmentSource: Sync {
    type Location;

    fn sample(&self, location: &Self::Location) -> EnvironmentSample;
}

/// The same ambient supply everywhere.
#[derive(Debug, Clone, Default)]
pub struct UniformEnvironment {
    pub sample: EnvironmentSample,
}

impl UniformEnvironment {
    pub fn new(sample: EnvironmentSample) -> Self {
        Self { sample }
    }
}

impl EnvironmentSource for UniformEnvironment {
    type Location = ();

    fn sample(&self, _location: &()) -> EnvironmentSample {
        self.sample.clone()
    }
}

// ---------------------------------------------------------------------------
// PatchMap
// ---------------------------------------------------------------------------

/// A region of the world with its own dissolved compounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub name: String,
    pub sample: EnvironmentSample,
}

/// Table of patches addressed by generational [`PatchId`].
///
/// Removing a patch invalidates its id; entities still located there sample
/// an empty environment instead of reading a recycled slot.
#[derive(Debug, Clone, Default)]
pub struct PatchMap {
    patches: SlotMap<PatchId, Patch>,
    current: Option<PatchId>,
}

impl PatchMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_patch(&mut self, name: &str, sample: EnvironmentSample) -> PatchId {
        let id = self.patches.insert(Patch {
            name: name.to_string(),
            sample,
        });
        if self.current.is_none() {
            self.current = Some(id);
        }
        id
    }

    pub fn remove_patch(&mut self, id: PatchId) -> Option<Patch> {
        if self.current == Some(id) {
            self.current = None;
        }
        self.patches.remove(id)
    }

    pub fn get(&self, id: PatchId) -> Option<&Patch> {
        self.patches.get(id)
    }

    pub fn contains(&self, id: PatchId) -> bool {
        self.patches.contains_key(id)
    }

    /// Edit a concentration between ticks. Returns false for a dead patch.
    pub fn set_concentration(&mut self, id: PatchId, compound: CompoundId, value: f64) -> bool {
        match self.patches.get_mut(id) {
            Some(patch) => {
                patch.sample.set(compound, value);
                true
            }
            None => false,
        }
    }

    /// The patch the player currently occupies, if any.
    pub fn current_patch(&self) -> Option<PatchId> {
        self.current.filter(|id| self.patches.contains_key(*id))
    }

    /// Returns false (and changes nothing) for a dead patch.
    pub fn set_current_patch(&mut self, id: PatchId) -> bool {
        if self.patches.contains_key(id) {
            self.current = Some(id);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

impl EnvironmentSource for PatchMap {
    type Location = PatchId;

    fn sample(&self, location: &PatchId) -> EnvironmentSample {
        match self.patches.get(*location) {
            Some(patch) => patch.sample.clone(),
            None => {
                log::trace!("sampling dead patch {location:?}; no ambient supply");
                EnvironmentSample::new()
            }
        }
    }
}
