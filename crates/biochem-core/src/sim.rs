//! Simulation state, per-tick summaries and state hashing.

use crate::id::CompoundId;

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable simulation state tracked by the [`Simulation`](crate::simulation::Simulation).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Current tick counter. Incremented by 1 for each simulation step.
    pub tick: u64,
}

impl SimState {
    /// Create a new simulation state starting at tick 0.
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

// ---------------------------------------------------------------------------
// Tick summary
// ---------------------------------------------------------------------------

/// Aggregate of every entity's step report for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    /// Tick number that was just completed.
    pub tick: u64,
    /// Number of entities stepped.
    pub entities: usize,
    /// Number of (entity, process) pairs that ran.
    pub processes_run: usize,
    /// Total vented per compound across all entities.
    pub vented: Vec<(CompoundId, f64)>,
}

impl TickSummary {
    pub fn vented_of(&self, id: CompoundId) -> f64 {
        self.vented
            .iter()
            .find(|(c, _)| *c == id)
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    /// Start a new hash.
    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    /// Feed bytes into the hash.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    /// Feed a u64 into the hash.
    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    /// Feed a u32 into the hash.
    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Feed an f64 into the hash by bit pattern, so 0.0 and -0.0 differ.
    pub fn write_f64(&mut self, v: f64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    /// Feed a string into the hash, length-prefixed.
    pub fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write(s.as_bytes());
    }

    /// Finalize and return the hash value.
    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_state_starts_at_zero() {
        assert_eq!(SimState::new().tick, 0);
    }

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_u64(42);
        h1.write_f64(0.25);

        let mut h2 = StateHash::new();
        h2.write_u64(42);
        h2.write_f64(0.25);

        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_differs_for_different_floats() {
        let mut h1 = StateHash::new();
        h1.write_f64(1.0);

        let mut h2 = StateHash::new();
        h2.write_f64(1.0 + f64::EPSILON);

        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_order_matters() {
        let mut h1 = StateHash::new();
        h1.write_u32(1);
        h1.write_u32(2);

        let mut h2 = StateHash::new();
        h2.write_u32(2);
        h2.write_u32(1);

        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn string_prefix_is_unambiguous() {
        let mut h1 = StateHash::new();
        h1.write_str("ab");
        h1.write_str("c");

        let mut h2 = StateHash::new();
        h2.write_str("a");
        h2.write_str("bc");

        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn tick_summary_lookup() {
        let summary = TickSummary {
            vented: vec![(CompoundId(3), 1.5)],
            ..TickSummary::default()
        };
        assert_eq!(summary.vented_of(CompoundId(3)), 1.5);
        assert_eq!(summary.vented_of(CompoundId(4)), 0.0);
    }
}
