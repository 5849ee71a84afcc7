use crate::id::CompoundId;
use crate::profile::ProcessorProfile;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-entity compound ledger bound to the profile of the entity's kind.
///
/// Amounts are never negative at rest. Raw `give`/`take` apply no capacity
/// or vent policy; only the step engine enforces thresholds.
#[derive(Debug, Clone)]
pub struct CompoundStock {
    compounds: BTreeMap<CompoundId, f64>,
    processor: Arc<ProcessorProfile>,
    owner_kind: String,
}

impl CompoundStock {
    /// Create an empty stock for an entity of kind `owner_kind`.
    pub fn new(processor: Arc<ProcessorProfile>, owner_kind: &str) -> Self {
        Self {
            compounds: BTreeMap::new(),
            processor,
            owner_kind: owner_kind.to_string(),
        }
    }

    /// Current amount of a compound, 0 if absent.
    pub fn amount(&self, id: CompoundId) -> f64 {
        self.compounds.get(&id).copied().unwrap_or(0.0)
    }

    /// Remove up to `requested`. Returns the amount actually removed.
    #[must_use = "returns the amount actually removed, which may be less than requested"]
    pub fn take(&mut self, id: CompoundId, requested: f64) -> f64 {
        if !requested.is_finite() || requested <= 0.0 {
            return 0.0;
        }
        match self.compounds.get_mut(&id) {
            Some(current) => {
                let removed = requested.min(*current);
                *current = (*current - removed).max(0.0);
                removed
            }
            None => 0.0,
        }
    }

    /// Add `amount`. Negative or non-finite amounts are ignored.
    pub fn give(&mut self, id: CompoundId, amount: f64) {
        if !amount.is_finite() || amount <= 0.0 {
            return;
        }
        *self.compounds.entry(id).or_insert(0.0) += amount;
    }

    /// How far the stock sits above its vent threshold. 0 without one.
    pub fn excess_amount(&self, id: CompoundId) -> f64 {
        match self.processor.vent(id) {
            Some(vent) => (self.amount(id) - vent).max(0.0),
            None => 0.0,
        }
    }

    /// How far the stock sits above its low threshold. Without a configured
    /// threshold there is no reserve and the whole amount counts.
    pub fn above_low_threshold(&self, id: CompoundId) -> f64 {
        let low = self.processor.low(id).unwrap_or(0.0);
        (self.amount(id) - low).max(0.0)
    }

    /// Put back a saved amount verbatim, zero entries included.
    pub(crate) fn restore_amount(&mut self, id: CompoundId, amount: f64) {
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        self.compounds.insert(id, amount);
    }

    /// Rebind the profile, e.g. when the entity's species changes.
    pub fn set_processor(&mut self, processor: Arc<ProcessorProfile>, owner_kind: &str) {
        self.processor = processor;
        self.owner_kind = owner_kind.to_string();
    }

    pub fn processor(&self) -> &Arc<ProcessorProfile> {
        &self.processor
    }

    pub fn owner_kind(&self) -> &str {
        &self.owner_kind
    }

    /// Iterate over all held compounds in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (CompoundId, f64)> + '_ {
        self.compounds.iter().map(|(id, amount)| (*id, *amount))
    }

    /// Sum of all held amounts.
    pub fn total(&self) -> f64 {
        self.compounds.values().sum()
    }

    /// Drop every held compound.
    pub fn clear(&mut self) {
        self.compounds.clear();
    }
}
