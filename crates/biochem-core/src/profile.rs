//! Processor profiles: which processes an entity kind runs, how fast, and
//! the per-compound throttling thresholds.
//!
//! Profiles are validated once by [`ProfileBuilder::build`] and then shared
//! as `Arc<ProcessorProfile>` by every stock of that kind. They have no
//! `&mut self` methods; an edit goes through [`ProcessorProfile::to_builder`]
//! and produces a new profile that callers repoint stocks at.

use crate::id::{CompoundId, ProcessId};
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A profile failed validation. Fatal to the profile being loaded.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("profile label must not be empty")]
    EmptyLabel,
    #[error("profile '{label}': invalid capacity {capacity} for {process:?}")]
    InvalidCapacity {
        label: String,
        process: ProcessId,
        capacity: f64,
    },
    #[error("profile '{label}': invalid threshold {value} for {compound:?}")]
    InvalidThreshold {
        label: String,
        compound: CompoundId,
        value: f64,
    },
    #[error("profile '{label}': low threshold {low} above high threshold {high} for {compound:?}")]
    LowAboveHigh {
        label: String,
        compound: CompoundId,
        low: f64,
        high: f64,
    },
    #[error("profile '{label}' references unknown process {process:?}")]
    UnknownProcess { label: String, process: ProcessId },
    #[error("profile '{label}' references unknown compound {compound:?}")]
    UnknownCompound { label: String, compound: CompoundId },
    #[error("duplicate profile label: {0}")]
    DuplicateLabel(String),
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Low / high / vent levels for one compound.
///
/// Invariant after validation: `0 <= low <= high`. `vent` is independent of
/// the other two and may sit below or above `high`. Unset levels are
/// unbounded (`f64::INFINITY`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundThresholds {
    /// Reserve kept back from processes.
    pub low: f64,
    /// Saturation level: processes whose every output is at or above its
    /// high threshold idle.
    pub high: f64,
    /// Anything above this is discarded at the end of a tick.
    pub vent: f64,
}

impl CompoundThresholds {
    pub fn new(low: f64, high: f64, vent: f64) -> Self {
        Self { low, high, vent }
    }
}

impl Default for CompoundThresholds {
    fn default() -> Self {
        Self {
            low: 0.0,
            high: f64::INFINITY,
            vent: f64::INFINITY,
        }
    }
}

// ---------------------------------------------------------------------------
// ProcessorProfile
// ---------------------------------------------------------------------------

/// Per-kind configuration: process capacities and compound thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorProfile {
    label: String,
    /// Capacity per process, in insertion order. The step engine runs
    /// processes in this order.
    capacities: Vec<(ProcessId, f64)>,
    thresholds: BTreeMap<CompoundId, CompoundThresholds>,
}

impl ProcessorProfile {
    /// The owner-kind label this profile was registered under.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Capacity for a process, 0 if the kind does not run it.
    pub fn capacity(&self, process: ProcessId) -> f64 {
        self.capacities
            .iter()
            .find(|(p, _)| *p == process)
            .map(|(_, c)| *c)
            .unwrap_or(0.0)
    }

    /// All configured capacities in insertion order (zeros included).
    pub fn capacities(&self) -> &[(ProcessId, f64)] {
        &self.capacities
    }

    pub fn thresholds(&self, compound: CompoundId) -> Option<&CompoundThresholds> {
        self.thresholds.get(&compound)
    }

    /// Iterate over every compound with configured thresholds, in ID order.
    pub fn all_thresholds(&self) -> impl Iterator<Item = (CompoundId, &CompoundThresholds)> {
        self.thresholds.iter().map(|(c, t)| (*c, t))
    }

    /// Low threshold, if configured.
    pub fn low(&self, compound: CompoundId) -> Option<f64> {
        self.thresholds.get(&compound).map(|t| t.low)
    }

    /// High threshold, if configured and bounded.
    pub fn high(&self, compound: CompoundId) -> Option<f64> {
        self.thresholds
            .get(&compound)
            .map(|t| t.high)
            .filter(|h| h.is_finite())
    }

    /// Vent threshold, if configured and bounded.
    pub fn vent(&self, compound: CompoundId) -> Option<f64> {
        self.thresholds
            .get(&compound)
            .map(|t| t.vent)
            .filter(|v| v.is_finite())
    }

    /// Start a builder pre-filled with this profile's contents. The profile
    /// itself is left untouched.
    pub fn to_builder(&self) -> ProfileBuilder {
        ProfileBuilder {
            label: self.label.clone(),
            capacities: self.capacities.clone(),
            thresholds: self.thresholds.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProfileBuilder
// ---------------------------------------------------------------------------

/// Collects capacities and thresholds, then validates them into a profile.
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    label: String,
    capacities: Vec<(ProcessId, f64)>,
    thresholds: BTreeMap<CompoundId, CompoundThresholds>,
}

impl ProfileBuilder {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            capacities: Vec::new(),
            thresholds: BTreeMap::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Set the capacity for a process. Re-setting keeps the original
    /// position in the run order.
    pub fn set_capacity(&mut self, process: ProcessId, capacity: f64) -> &mut Self {
        match self.capacities.iter_mut().find(|(p, _)| *p == process) {
            Some(entry) => entry.1 = capacity,
            None => self.capacities.push((process, capacity)),
        }
        self
    }

    pub fn set_threshold(&mut self, compound: CompoundId, low: f64, high: f64, vent: f64) -> &mut Self {
        self.thresholds
            .insert(compound, CompoundThresholds::new(low, high, vent));
        self
    }

    pub fn set_low_threshold(&mut self, compound: CompoundId, low: f64) -> &mut Self {
        self.thresholds.entry(compound).or_default().low = low;
        self
    }

    pub fn set_high_threshold(&mut self, compound: CompoundId, high: f64) -> &mut Self {
        self.thresholds.entry(compound).or_default().high = high;
        self
    }

    pub fn set_vent_threshold(&mut self, compound: CompoundId, vent: f64) -> &mut Self {
        self.thresholds.entry(compound).or_default().vent = vent;
        self
    }

    /// Drop all thresholds for a compound, making it unbounded again.
    pub fn clear_thresholds(&mut self, compound: CompoundId) -> &mut Self {
        self.thresholds.remove(&compound);
        self
    }

    /// Validate and freeze into a shareable profile.
    pub fn build(self) -> Result<Arc<ProcessorProfile>, ConfigurationError> {
        self.validate()?;
        Ok(Arc::new(ProcessorProfile {
            label: self.label,
            capacities: self.capacities,
            thresholds: self.thresholds,
        }))
    }

    /// Like [`build`](Self::build), but also rejects processes and compounds
    /// the registry does not know.
    pub fn build_for(self, registry: &Registry) -> Result<Arc<ProcessorProfile>, ConfigurationError> {
        for &(process, _) in &self.capacities {
            if registry.process(process).is_none() {
                return Err(ConfigurationError::UnknownProcess {
                    label: self.label.clone(),
                    process,
                });
            }
        }
        for &compound in self.thresholds.keys() {
            if registry.compound(compound).is_none() {
                return Err(ConfigurationError::UnknownCompound {
                    label: self.label.clone(),
                    compound,
                });
            }
        }
        self.build()
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.label.is_empty() {
            return Err(ConfigurationError::EmptyLabel);
        }

        for &(process, capacity) in &self.capacities {
            if !capacity.is_finite() || capacity < 0.0 {
                return Err(ConfigurationError::InvalidCapacity {
                    label: self.label.clone(),
                    process,
                    capacity,
                });
            }
        }

        for (&compound, t) in &self.thresholds {
            // Low must be a real number; high and vent may be unbounded.
            let low_ok = t.low.is_finite() && t.low >= 0.0;
            let bad = if !low_ok {
                Some(t.low)
            } else {
                [t.high, t.vent].into_iter().find(|v| v.is_nan() || *v < 0.0)
            };
            if let Some(value) = bad {
                return Err(ConfigurationError::InvalidThreshold {
                    label: self.label.clone(),
                    compound,
                    value,
                });
            }
            if t.low > t.high {
                return Err(ConfigurationError::LowAboveHigh {
                    label: self.label.clone(),
                    compound,
                    low: t.low,
                    high: t.high,
                });
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Resolves a stored owner-kind label back to a live profile.
pub trait ProfileLookup {
    fn resolve(&self, label: &str) -> Option<Arc<ProcessorProfile>>;
}

impl ProfileLookup for HashMap<String, Arc<ProcessorProfile>> {
    fn resolve(&self, label: &str) -> Option<Arc<ProcessorProfile>> {
        self.get(label).cloned()
    }
}

/// All live profiles, keyed by owner-kind label.
#[derive(Debug, Clone, Default)]
pub struct ProfileTable {
    profiles: HashMap<String, Arc<ProcessorProfile>>,
}

impl ProfileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and install a batch of profiles.
    ///
    /// All-or-nothing: if any builder fails validation, or two builders share
    /// a label, the table is left unchanged. Installing over an existing
    /// label replaces the table entry only; stocks still holding the old
    /// `Arc` keep seeing the old profile until they are repointed.
    pub fn install<I>(&mut self, builders: I) -> Result<Vec<Arc<ProcessorProfile>>, ConfigurationError>
    where
        I: IntoIterator<Item = ProfileBuilder>,
    {
        self.install_with(builders, ProfileBuilder::build)
    }

    /// Like [`install`](Self::install), validating references against a registry.
    pub fn install_for<I>(
        &mut self,
        builders: I,
        registry: &Registry,
    ) -> Result<Vec<Arc<ProcessorProfile>>, ConfigurationError>
    where
        I: IntoIterator<Item = ProfileBuilder>,
    {
        self.install_with(builders, |b| b.build_for(registry))
    }

    fn install_with<I, F>(&mut self, builders: I, build: F) -> Result<Vec<Arc<ProcessorProfile>>, ConfigurationError>
    where
        I: IntoIterator<Item = ProfileBuilder>,
        F: Fn(ProfileBuilder) -> Result<Arc<ProcessorProfile>, ConfigurationError>,
    {
        let mut staged: Vec<Arc<ProcessorProfile>> = Vec::new();
        for builder in builders {
            if staged.iter().any(|p| p.label() == builder.label()) {
                return Err(ConfigurationError::DuplicateLabel(builder.label().to_string()));
            }
            staged.push(build(builder)?);
        }

        for profile in &staged {
            self.profiles
                .insert(profile.label().to_string(), Arc::clone(profile));
        }
        log::info!("installed {} processor profile(s)", staged.len());
        Ok(staged)
    }

    pub fn get(&self, label: &str) -> Option<&Arc<ProcessorProfile>> {
        self.profiles.get(label)
    }

    pub fn remove(&mut self, label: &str) -> Option<Arc<ProcessorProfile>> {
        self.profiles.remove(label)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Iterate over installed labels (unordered).
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

impl ProfileLookup for ProfileTable {
    fn resolve(&self, label: &str) -> Option<Arc<ProcessorProfile>> {
        self.profiles.get(label).cloned()
    }
}
