use crate::environment::EnvironmentSample;
use crate::id::{CompoundId, ProcessId};
use crate::profile::ProcessorProfile;
use crate::registry::{ProcessDef, Registry};
use crate::stock::CompoundStock;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for one simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StepConfig {
    /// Length of one tick in process-rate time units. A process at capacity
    /// 1 converts at most `base_rate * tick_length` units per tick.
    pub tick_length: f64,
    /// Rates below this are treated as exactly zero.
    pub rate_epsilon: f64,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            tick_length: 1.0,
            rate_epsilon: 1e-6,
        }
    }
}

// ---------------------------------------------------------------------------
// Step outcome
// ---------------------------------------------------------------------------

/// Why a process did nothing this tick. Idling is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IdleReason {
    /// Some required input is neither above its low threshold nor ambient.
    MissingInputs,
    /// Every output already sits at or above its high threshold.
    Saturated,
    /// Capacity times base rate is below the rate epsilon.
    ZeroRate,
    /// The registry has no definition for the process.
    UnknownProcess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProcessStatus {
    Running,
    Idle(IdleReason),
}

/// What one process did during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub process: ProcessId,
    /// Achieved rate (units of the process per tick). 0 when idle.
    pub rate: f64,
    pub status: ProcessStatus,
}

/// The outcome of a single tick for one stock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// One entry per process with non-zero capacity, in run order.
    pub outcomes: Vec<ProcessOutcome>,
    /// Total input consumed per compound (ambient and reserve together).
    pub consumed: Vec<(CompoundId, f64)>,
    /// Part of `consumed` that came from the ambient environment.
    pub environment_used: Vec<(CompoundId, f64)>,
    /// Output produced per compound.
    pub produced: Vec<(CompoundId, f64)>,
    /// Amount discarded by venting per compound.
    pub vented: Vec<(CompoundId, f64)>,
}

impl StepReport {
    pub fn consumed_of(&self, id: CompoundId) -> f64 {
        lookup(&self.consumed, id)
    }

    pub fn produced_of(&self, id: CompoundId) -> f64 {
        lookup(&self.produced, id)
    }

    pub fn vented_of(&self, id: CompoundId) -> f64 {
        lookup(&self.vented, id)
    }

    pub fn environment_used_of(&self, id: CompoundId) -> f64 {
        lookup(&self.environment_used, id)
    }

    /// Number of processes that ran this tick.
    pub fn running_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == ProcessStatus::Running)
            .count()
    }

    pub fn outcome(&self, process: ProcessId) -> Option<&ProcessOutcome> {
        self.outcomes.iter().find(|o| o.process == process)
    }
}

fn lookup(list: &[(CompoundId, f64)], id: CompoundId) -> f64 {
    list.iter()
        .find(|(c, _)| *c == id)
        .map(|(_, v)| *v)
        .unwrap_or(0.0)
}

fn accumulate(list: &mut Vec<(CompoundId, f64)>, id: CompoundId, amount: f64) {
    if amount <= 0.0 {
        return;
    }
    match list.iter_mut().find(|(c, _)| *c == id) {
        Some(entry) => entry.1 += amount,
        None => list.push((id, amount)),
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// A process resolved against the registry before anything runs.
struct Plan<'r> {
    process: ProcessId,
    capacity: f64,
    def: Option<&'r ProcessDef>,
    saturated: bool,
}

/// Resolve every enabled process and snapshot the reserve available to it.
///
/// The returned budget is the pre-tick amount above the low threshold for
/// every input compound. Production during the tick never adds to it.
fn plan<'r>(
    registry: &'r Registry,
    profile: &ProcessorProfile,
    stock: &CompoundStock,
) -> (Vec<Plan<'r>>, BTreeMap<CompoundId, f64>) {
    let mut plans = Vec::with_capacity(profile.capacities().len());
    let mut budget = BTreeMap::new();

    for &(process, capacity) in profile.capacities() {
        if capacity <= 0.0 {
            continue;
        }
        let def = registry.process(process);
        let mut saturated = false;
        if let Some(def) = def {
            for input in &def.inputs {
                budget
                    .entry(input.compound)
                    .or_insert_with(|| stock.above_low_threshold(input.compound));
            }
            saturated = !def.outputs.is_empty()
                && def.outputs.iter().all(|out| {
                    profile
                        .high(out.compound)
                        .is_some_and(|high| stock.amount(out.compound) >= high)
                });
        }
        plans.push(Plan {
            process,
            capacity,
            def,
            saturated,
        });
    }

    (plans, budget)
}

// ---------------------------------------------------------------------------
// step_stock
// ---------------------------------------------------------------------------

/// Advance one stock by one tick.
///
/// Runs every process with non-zero capacity in the profile's insertion
/// order, then vents every compound above its vent threshold.
///
/// # Arguments
/// * `registry`    - process definitions (ratios and base rates)
/// * `stock`       - the entity's ledger; its profile supplies capacities and thresholds
/// * `environment` - ambient supply at the entity's location, never depleted
/// * `config`      - tick length and rate epsilon
pub fn step_stock(
    registry: &Registry,
    stock: &mut CompoundStock,
    environment: &EnvironmentSample,
    config: &StepConfig,
) -> StepReport {
    let profile = std::sync::Arc::clone(stock.processor());
    let mut report = StepReport::default();
    let (plans, mut budget) = plan(registry, &profile, stock);

    for plan in plans {
        let Some(def) = plan.def else {
            report.outcomes.push(idle(plan.process, IdleReason::UnknownProcess));
            continue;
        };
        if plan.saturated {
            report.outcomes.push(idle(plan.process, IdleReason::Saturated));
            continue;
        }

        let max_rate = plan.capacity * def.base_rate * config.tick_length;
        if max_rate < config.rate_epsilon {
            report.outcomes.push(idle(plan.process, IdleReason::ZeroRate));
            continue;
        }

        // Input-limited rate: the scarcest input (reserve budget plus ambient
        // supply, divided by its ratio) bounds the whole process. A zero
        // ratio places no constraint.
        let input_limit = def
            .inputs
            .iter()
            .filter(|input| input.ratio > 0.0)
            .map(|input| {
                let reserve = budget.get(&input.compound).copied().unwrap_or(0.0);
                (reserve + environment.get(input.compound)) / input.ratio
            })
            .fold(f64::INFINITY, f64::min);

        let rate = max_rate.min(input_limit).max(0.0);
        if rate < config.rate_epsilon {
            report.outcomes.push(idle(plan.process, IdleReason::MissingInputs));
            continue;
        }

        // Consume: ambient supply first, then the entity's reserve.
        for input in def.inputs.iter().filter(|input| input.ratio > 0.0) {
            let needed = rate * input.ratio;
            let from_environment = needed.min(environment.get(input.compound));
            let from_reserve = needed - from_environment;
            let mut taken = 0.0;
            if from_reserve > 0.0 {
                taken = stock.take(input.compound, from_reserve);
                if let Some(left) = budget.get_mut(&input.compound) {
                    *left = (*left - taken).max(0.0);
                }
            }
            accumulate(&mut report.environment_used, input.compound, from_environment);
            accumulate(&mut report.consumed, input.compound, from_environment + taken);
        }

        // Produce.
        for output in &def.outputs {
            let amount = rate * output.ratio;
            stock.give(output.compound, amount);
            accumulate(&mut report.produced, output.compound, amount);
        }

        report.outcomes.push(ProcessOutcome {
            process: plan.process,
            rate,
            status: ProcessStatus::Running,
        });
    }

    vent(&profile, stock, &mut report);
    report
}

fn idle(process: ProcessId, reason: IdleReason) -> ProcessOutcome {
    ProcessOutcome {
        process,
        rate: 0.0,
        status: ProcessStatus::Idle(reason),
    }
}

/// Discard everything above each compound's vent threshold.
fn vent(profile: &ProcessorProfile, stock: &mut CompoundStock, report: &mut StepReport) {
    for (compound, thresholds) in profile.all_thresholds() {
        if !thresholds.vent.is_finite() {
            continue;
        }
        let excess = stock.excess_amount(compound);
        if excess > 0.0 {
            let removed = stock.take(compound, excess);
            accumulate(&mut report.vented, compound, removed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileBuilder;
    use crate::registry::{CompoundDef, RatioEntry, RegistryBuilder};

    fn a() -> CompoundId {
        CompoundId(0)
    }
    fn b() -> CompoundId {
        CompoundId(1)
    }
    fn c() -> CompoundId {
        CompoundId(2)
    }

    /// P: A -> B at 1:1, base rate 5. Q: A -> C at 1:1, base rate 5.
    fn registry() -> Registry {
        let mut r = RegistryBuilder::new();
        r.register_compound(CompoundDef::new("a"));
        r.register_compound(CompoundDef::new("b"));
        r.register_compound(CompoundDef::new("c"));
        r.register_process("p", vec![RatioEntry::new(a(), 1.0)], vec![RatioEntry::new(b(), 1.0)], 5.0);
        r.register_process("q", vec![RatioEntry::new(a(), 1.0)], vec![RatioEntry::new(c(), 1.0)], 5.0);
        r.build().unwrap()
    }

    fn stock(configure: impl FnOnce(&mut ProfileBuilder)) -> CompoundStock {
        let mut builder = ProfileBuilder::new("cell");
        configure(&mut builder);
        CompoundStock::new(builder.build().unwrap(), "cell")
    }

    #[test]
    fn low_threshold_throttles_reserve() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0).set_low_threshold(a(), 2.0);
        });
        s.give(a(), 10.0);

        let report = step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());

        assert_eq!(s.amount(a()), 5.0);
        assert_eq!(s.amount(b()), 5.0);
        assert_eq!(report.consumed_of(a()), 5.0);
        assert_eq!(report.produced_of(b()), 5.0);
        assert_eq!(report.running_count(), 1);
    }

    #[test]
    fn reserve_limits_rate_below_base() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0).set_low_threshold(a(), 2.0);
        });
        s.give(a(), 5.0);

        step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());

        assert_eq!(s.amount(a()), 2.0);
        assert_eq!(s.amount(b()), 3.0);
    }

    #[test]
    fn venting_after_processes() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0)
                .set_low_threshold(a(), 2.0)
                .set_vent_threshold(b(), 3.0);
        });
        s.give(a(), 10.0);

        let report = step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());

        assert_eq!(s.amount(a()), 5.0);
        assert_eq!(s.amount(b()), 3.0);
        assert_eq!(report.vented_of(b()), 2.0);
    }

    #[test]
    fn unlimited_environment_runs_at_base_rate() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0);
        });
        s.give(a(), 4.0);
        let env = EnvironmentSample::new().with(a(), f64::INFINITY);

        let report = step_stock(&reg, &mut s, &env, &StepConfig::default());

        assert_eq!(report.running_count(), 1);
        assert_eq!(report.environment_used_of(a()), 5.0);
        assert_eq!(s.amount(a()), 4.0);
        assert_eq!(s.amount(b()), 5.0);
    }

    #[test]
    fn environment_supplies_without_touching_reserve() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0).set_low_threshold(a(), 0.0);
        });
        let env = EnvironmentSample::new().with(a(), 100.0);

        let report = step_stock(&reg, &mut s, &env, &StepConfig::default());

        assert_eq!(s.amount(a()), 0.0);
        assert_eq!(s.amount(b()), 5.0);
        assert_eq!(report.environment_used_of(a()), 5.0);
        assert_eq!(env.get(a()), 100.0);
    }

    #[test]
    fn environment_first_then_reserve() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0);
        });
        s.give(a(), 10.0);
        let env = EnvironmentSample::new().with(a(), 2.0);

        let report = step_stock(&reg, &mut s, &env, &StepConfig::default());

        assert_eq!(report.environment_used_of(a()), 2.0);
        assert_eq!(report.consumed_of(a()), 5.0);
        assert_eq!(s.amount(a()), 7.0);
    }

    #[test]
    fn zero_capacity_contributes_nothing() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 0.0);
        });
        s.give(a(), 10.0);

        let report = step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());

        assert!(report.outcomes.is_empty());
        assert_eq!(s.amount(a()), 10.0);
        assert_eq!(s.amount(b()), 0.0);
    }

    #[test]
    fn capacity_scales_maximum_rate() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 2.0);
        });
        s.give(a(), 100.0);

        step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());

        assert_eq!(s.amount(b()), 10.0);
        assert_eq!(s.amount(a()), 90.0);
    }

    #[test]
    fn tick_length_scales_rate() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0);
        });
        s.give(a(), 100.0);
        let config = StepConfig {
            tick_length: 0.5,
            ..StepConfig::default()
        };

        step_stock(&reg, &mut s, &EnvironmentSample::new(), &config);

        assert_eq!(s.amount(b()), 2.5);
    }

    #[test]
    fn idle_without_inputs() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0).set_low_threshold(a(), 4.0);
        });
        s.give(a(), 4.0);

        let report = step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());

        assert_eq!(
            report.outcome(ProcessId(0)).unwrap().status,
            ProcessStatus::Idle(IdleReason::MissingInputs)
        );
        assert_eq!(s.amount(a()), 4.0);
        assert_eq!(s.amount(b()), 0.0);
    }

    #[test]
    fn competing_processes_share_the_snapshot_budget() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0).set_capacity(ProcessId(1), 1.0);
        });
        s.give(a(), 7.0);

        step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());

        // First process takes its full 5, the second gets the remaining 2.
        assert_eq!(s.amount(b()), 5.0);
        assert_eq!(s.amount(c()), 2.0);
        assert_eq!(s.amount(a()), 0.0);
    }

    #[test]
    fn outputs_do_not_feed_processes_in_the_same_tick() {
        let mut r = RegistryBuilder::new();
        r.register_compound(CompoundDef::new("a"));
        r.register_compound(CompoundDef::new("b"));
        r.register_compound(CompoundDef::new("c"));
        r.register_process("ab", vec![RatioEntry::new(a(), 1.0)], vec![RatioEntry::new(b(), 1.0)], 5.0);
        r.register_process("bc", vec![RatioEntry::new(b(), 1.0)], vec![RatioEntry::new(c(), 1.0)], 5.0);
        let reg = r.build().unwrap();

        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0).set_capacity(ProcessId(1), 1.0);
        });
        s.give(a(), 5.0);

        let report = step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());
        assert_eq!(s.amount(b()), 5.0);
        assert_eq!(s.amount(c()), 0.0);
        assert_eq!(
            report.outcome(ProcessId(1)).unwrap().status,
            ProcessStatus::Idle(IdleReason::MissingInputs)
        );

        // Next tick the intermediate is available.
        step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());
        assert_eq!(s.amount(c()), 5.0);
    }

    #[test]
    fn saturated_outputs_idle_the_process() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0).set_high_threshold(b(), 4.0);
        });
        s.give(a(), 10.0);
        s.give(b(), 4.0);

        let report = step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());

        assert_eq!(
            report.outcome(ProcessId(0)).unwrap().status,
            ProcessStatus::Idle(IdleReason::Saturated)
        );
        assert_eq!(s.amount(a()), 10.0);
    }

    #[test]
    fn unknown_process_is_idle() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(42), 1.0);
        });
        let report = step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());
        assert_eq!(
            report.outcomes[0].status,
            ProcessStatus::Idle(IdleReason::UnknownProcess)
        );
    }

    #[test]
    fn tiny_rates_snap_to_zero() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_capacity(ProcessId(0), 1.0);
        });
        s.give(a(), 1e-9);

        let report = step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());

        assert_eq!(report.running_count(), 0);
        assert_eq!(s.amount(a()), 1e-9);
    }

    #[test]
    fn venting_applies_even_when_idle() {
        let reg = registry();
        let mut s = stock(|p| {
            p.set_vent_threshold(b(), 1.0);
        });
        s.give(b(), 6.0);

        let report = step_stock(&reg, &mut s, &EnvironmentSample::new(), &StepConfig::default());

        assert_eq!(s.amount(b()), 1.0);
        assert_eq!(report.vented_of(b()), 5.0);
    }
}
