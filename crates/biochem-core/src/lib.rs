//! Biochem Core -- the per-entity compound economy of a cell simulation.
//!
//! Entities hold stocks of typed compounds. Processes attached through a
//! shared [`profile::ProcessorProfile`] continuously convert input compounds
//! into output compounds, throttled by capacity, low-stock reserves,
//! high-stock saturation and excess venting.
//!
//! # Tick Pipeline
//!
//! Each call to [`simulation::Simulation::step`] advances every entity by one
//! tick:
//!
//! 1. **Sample** -- Read the ambient concentrations at the entity's location.
//! 2. **Snapshot** -- Record how much of each input sits above its low
//!    threshold before anything runs.
//! 3. **Process** -- Run each process in capacity insertion order, consuming
//!    ambient supply first and the entity's reserve second.
//! 4. **Vent** -- Discard everything above each compound's vent threshold.
//! 5. **Bookkeeping** -- Increment the tick counter.
//!
//! Entities never read each other's stocks, so with the `parallel` feature
//! the per-entity work is spread across rayon worker threads.
//!
//! # Key Types
//!
//! - [`registry::Registry`] -- Immutable compound and process tables (frozen
//!   at startup).
//! - [`profile::ProcessorProfile`] -- Capacities and thresholds per entity
//!   kind, validated once, shared read-only.
//! - [`stock::CompoundStock`] -- Mutable per-entity compound ledger.
//! - [`environment::EnvironmentSource`] -- Ambient supply lookups.
//! - [`step::step_stock`] -- The single-entity step algorithm.
//! - [`simulation::Simulation`] -- Entity storage and the tick driver.
//! - [`serialize`] -- Versioned save/load of stocks and profiles via bitcode.

#[cfg(feature = "data-loader")]
pub mod data_loader;
pub mod environment;
pub mod id;
pub mod profile;
pub mod registry;
pub mod serialize;
pub mod sim;
pub mod simulation;
pub mod step;
pub mod stock;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
