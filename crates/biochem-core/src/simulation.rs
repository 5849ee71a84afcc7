//! The simulation: owns every live compound stock and drives the tick.
//!
//! # Architecture
//!
//! The `Simulation` owns:
//! - A shared, frozen [`Registry`] of compounds and processes
//! - Per-entity state: a [`CompoundStock`] and a location `L`, keyed by [`EntityId`]
//! - A [`SimState`] (tick counter)
//! - A [`StepConfig`] (tick length, rate epsilon)
//!
//! The host tells the simulation which entities exist (`spawn`/`despawn`)
//! and calls [`Simulation::step`] once per fixed tick with an
//! [`EnvironmentSource`] whose `Location` matches `L`.
//!
//! Each entity's stock is mutated only by its own update and profiles are
//! read-only during a tick, so with the `parallel` feature the per-entity
//! updates run on rayon worker threads. Results are identical to the serial
//! path because each entity's update depends only on its own state.

use crate::environment::EnvironmentSource;
use crate::id::EntityId;
use crate::registry::Registry;
use crate::sim::{SimState, StateHash, TickSummary};
use crate::step::{StepConfig, StepReport, step_stock};
use crate::stock::CompoundStock;
use slotmap::SlotMap;
use std::sync::Arc;

/// A live entity: its compound ledger and where it currently is.
#[derive(Debug, Clone)]
pub struct Entity<L> {
    pub stock: CompoundStock,
    pub location: L,
}

/// Entity storage and tick driver.
#[derive(Debug)]
pub struct Simulation<L> {
    pub(crate) registry: Arc<Registry>,
    pub(crate) config: StepConfig,
    pub(crate) sim_state: SimState,
    pub(crate) entities: SlotMap<EntityId, Entity<L>>,
}

impl<L> Simulation<L> {
    pub fn new(registry: Arc<Registry>, config: StepConfig) -> Self {
        Self {
            registry,
            config,
            sim_state: SimState::new(),
            entities: SlotMap::with_key(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Change tick length or epsilon. Takes effect on the next step.
    pub fn set_config(&mut self, config: StepConfig) {
        self.config = config;
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.sim_state.tick
    }

    /// Register an entity that gained a compound stock.
    pub fn spawn(&mut self, stock: CompoundStock, location: L) -> EntityId {
        self.entities.insert(Entity { stock, location })
    }

    /// Drop an entity's stock. Returns it so the host can inspect what was
    /// left (e.g. to spill compounds into the environment).
    pub fn despawn(&mut self, id: EntityId) -> Option<CompoundStock> {
        self.entities.remove(id).map(|e| e.stock)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn stock(&self, id: EntityId) -> Option<&CompoundStock> {
        self.entities.get(id).map(|e| &e.stock)
    }

    /// Mutable access for explicit give/take calls between ticks.
    pub fn stock_mut(&mut self, id: EntityId) -> Option<&mut CompoundStock> {
        self.entities.get_mut(id).map(|e| &mut e.stock)
    }

    pub fn location(&self, id: EntityId) -> Option<&L> {
        self.entities.get(id).map(|e| &e.location)
    }

    /// Move an entity. Returns false if the entity is gone.
    pub fn set_location(&mut self, id: EntityId, location: L) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.location = location;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate over live entities and their stocks.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &CompoundStock)> {
        self.entities.iter().map(|(id, e)| (id, &e.stock))
    }

    /// Deterministic hash of the tick counter and every stock's contents.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.sim_state.tick);
        h.write_u64(self.entities.len() as u64);
        for (_, entity) in &self.entities {
            h.write_str(entity.stock.owner_kind());
            for (compound, amount) in entity.stock.iter() {
                h.write_u32(compound.0);
                h.write_f64(amount);
            }
        }
        h.finish()
    }
}

impl<L: Send> Simulation<L> {
    /// Advance every entity by one tick and return the aggregate summary.
    pub fn step<S>(&mut self, source: &S) -> TickSummary
    where
        S: EnvironmentSource<Location = L>,
    {
        let reports = self.step_detailed(source);

        let mut summary = TickSummary {
            tick: self.sim_state.tick,
            entities: reports.len(),
            ..TickSummary::default()
        };
        for (_, report) in &reports {
            summary.processes_run += report.running_count();
            for &(compound, amount) in &report.vented {
                match summary.vented.iter_mut().find(|(c, _)| *c == compound) {
                    Some(entry) => entry.1 += amount,
                    None => summary.vented.push((compound, amount)),
                }
            }
        }
        summary
    }

    /// Advance every entity by one tick and return each entity's report.
    pub fn step_detailed<S>(&mut self, source: &S) -> Vec<(EntityId, StepReport)>
    where
        S: EnvironmentSource<Location = L>,
    {
        #[cfg(feature = "parallel")]
        let reports = self.step_parallel(source);
        #[cfg(not(feature = "parallel"))]
        let reports = self.step_serial(source);

        self.sim_state.tick += 1;
        reports
    }

    /// One entity after another, in slotmap order. Does not advance the tick.
    #[cfg(any(test, not(feature = "parallel")))]
    fn step_serial<S>(&mut self, source: &S) -> Vec<(EntityId, StepReport)>
    where
        S: EnvironmentSource<Location = L>,
    {
        let registry: &Registry = &self.registry;
        let config = self.config;
        self.entities
            .iter_mut()
            .map(|(id, entity)| (id, step_entity(registry, entity, source, &config)))
            .collect()
    }

    /// Entities spread over the rayon pool; reports come back in slotmap
    /// order. Does not advance the tick.
    #[cfg(feature = "parallel")]
    fn step_parallel<S>(&mut self, source: &S) -> Vec<(EntityId, StepReport)>
    where
        S: EnvironmentSource<Location = L>,
    {
        use rayon::prelude::*;
        let registry: &Registry = &self.registry;
        let config = self.config;
        let mut entries: Vec<(EntityId, &mut Entity<L>)> = self.entities.iter_mut().collect();
        entries
            .par_iter_mut()
            .map(|(id, entity)| (*id, step_entity(registry, entity, source, &config)))
            .collect()
    }
}

fn step_entity<L, S>(registry: &Registry, entity: &mut Entity<L>, source: &S, config: &StepConfig) -> StepReport
where
    S: EnvironmentSource<Location = L>,
{
    let sample = source.sample(&entity.location);
    step_stock(registry, &mut entity.stock, &sample, config)
}
