//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::id::*;
use crate::profile::{ProcessorProfile, ProfileBuilder};
use crate::registry::{CompoundDef, RatioEntry, Registry, RegistryBuilder};
use crate::stock::CompoundStock;
use std::sync::Arc;

// ===========================================================================
// Compound constructors (ids match `make_registry`)
// ===========================================================================

pub fn glucose() -> CompoundId {
    CompoundId(0)
}
pub fn oxygen() -> CompoundId {
    CompoundId(1)
}
pub fn atp() -> CompoundId {
    CompoundId(2)
}
pub fn carbon_dioxide() -> CompoundId {
    CompoundId(3)
}
pub fn sunlight() -> CompoundId {
    CompoundId(4)
}
pub fn ammonia() -> CompoundId {
    CompoundId(5)
}

// ===========================================================================
// Process constructors (ids match `make_registry`)
// ===========================================================================

/// glucose + 6 oxygen -> 36 atp + 6 carbon dioxide, base rate 0.5.
pub fn respiration() -> ProcessId {
    ProcessId(0)
}
/// 6 carbon dioxide + sunlight -> glucose + 6 oxygen, base rate 0.2.
pub fn photosynthesis() -> ProcessId {
    ProcessId(1)
}
/// glucose -> 2 atp, base rate 1.0.
pub fn glycolysis() -> ProcessId {
    ProcessId(2)
}

/// A small registry of cell chemistry used across tests.
pub fn make_registry() -> Registry {
    let mut b = RegistryBuilder::new();
    b.register_compound(CompoundDef::new("glucose"));
    b.register_compound(CompoundDef::environmental("oxygen"));
    b.register_compound(CompoundDef::new("atp"));
    b.register_compound(CompoundDef::environmental("carbon_dioxide"));
    b.register_compound(CompoundDef::environmental("sunlight"));
    b.register_compound(CompoundDef::new("ammonia"));

    b.register_process(
        "respiration",
        vec![RatioEntry::new(glucose(), 1.0), RatioEntry::new(oxygen(), 6.0)],
        vec![
            RatioEntry::new(atp(), 36.0),
            RatioEntry::new(carbon_dioxide(), 6.0),
        ],
        0.5,
    );
    b.register_process(
        "photosynthesis",
        vec![
            RatioEntry::new(carbon_dioxide(), 6.0),
            RatioEntry::new(sunlight(), 1.0),
        ],
        vec![RatioEntry::new(glucose(), 1.0), RatioEntry::new(oxygen(), 6.0)],
        0.2,
    );
    b.register_process(
        "glycolysis",
        vec![RatioEntry::new(glucose(), 1.0)],
        vec![RatioEntry::new(atp(), 2.0)],
        1.0,
    );
    b.build().expect("test registry is valid")
}

/// A respiring cell: keeps 1 glucose in reserve and vents atp above 50.
pub fn make_profile(registry: &Registry) -> Arc<ProcessorProfile> {
    let mut b = ProfileBuilder::new("cell");
    b.set_capacity(respiration(), 1.0)
        .set_threshold(glucose(), 1.0, 20.0, 100.0)
        .set_vent_threshold(atp(), 50.0);
    b.build_for(registry).expect("test profile is valid")
}

/// A photosynthesizing cell with both photosynthesis and respiration.
pub fn make_plant_profile(registry: &Registry) -> Arc<ProcessorProfile> {
    let mut b = ProfileBuilder::new("plant");
    b.set_capacity(photosynthesis(), 2.0)
        .set_capacity(respiration(), 0.5)
        .set_threshold(glucose(), 0.5, 10.0, 30.0)
        .set_vent_threshold(oxygen(), 40.0);
    b.build_for(registry).expect("test profile is valid")
}

/// A stock bound to `profile` (owner kind = profile label) seeded with amounts.
pub fn stock_with(profile: &Arc<ProcessorProfile>, amounts: &[(CompoundId, f64)]) -> CompoundStock {
    let mut stock = CompoundStock::new(Arc::clone(profile), profile.label());
    for &(id, amount) in amounts {
        stock.give(id, amount);
    }
    stock
}
