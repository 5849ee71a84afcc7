use std::path::Path;
use std::sync::Arc;

use biochem_core::environment::{EnvironmentSample, PatchMap};
use biochem_core::id::PatchId;
use biochem_core::simulation::Simulation;
use biochem_core::step::StepConfig;
use biochem_core::stock::CompoundStock;
use biochem_data::load_biochem_data;

fn pond_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data/pond"))
}

#[test]
fn pond_data_loads() {
    let data = load_biochem_data(pond_dir()).unwrap();
    assert_eq!(data.registry.compound_count(), 6);
    assert_eq!(data.registry.process_count(), 3);
    assert_eq!(data.profiles.len(), 2);

    let alga = data.profiles.get("alga").unwrap();
    let photosynthesis = data.registry.process_id("photosynthesis").unwrap();
    let respiration = data.registry.process_id("respiration").unwrap();
    assert_eq!(alga.capacities(), &[(photosynthesis, 2.0), (respiration, 0.5)]);

    let oxygen = data.registry.compound_id("oxygen").unwrap();
    assert_eq!(alga.vent(oxygen), Some(40.0));
    assert_eq!(alga.low(oxygen), Some(0.0));
}

#[test]
fn pond_first_tick_is_exact() {
    let data = load_biochem_data(pond_dir()).unwrap();
    let reg = &data.registry;
    let glucose = reg.compound_id("glucose").unwrap();
    let oxygen = reg.compound_id("oxygen").unwrap();
    let atp = reg.compound_id("atp").unwrap();

    let amoeba = Arc::clone(data.profiles.get("amoeba").unwrap());
    let mut stock = CompoundStock::new(amoeba, "amoeba");
    stock.give(glucose, 30.0);

    let mut patches = PatchMap::new();
    let shallows = patches.add_patch("shallows", EnvironmentSample::new().with(oxygen, 20.0));

    let mut sim = Simulation::new(Arc::clone(reg), StepConfig::default());
    let id = sim.spawn(stock, shallows);
    let reports = sim.step_detailed(&patches);

    // Respiration at its base rate (0.5), then glycolysis at 0.25 from the
    // remaining reserve budget.
    let (_, report) = &reports[0];
    assert_eq!(report.running_count(), 2);
    assert_eq!(report.environment_used_of(oxygen), 3.0);

    let stock = sim.stock(id).unwrap();
    assert_eq!(stock.amount(glucose), 29.25);
    assert_eq!(stock.amount(atp), 18.5);
    assert_eq!(stock.amount(oxygen), 0.0);
}

#[test]
fn pond_survives_save_and_reload() {
    let data = load_biochem_data(pond_dir()).unwrap();
    let reg = Arc::clone(&data.registry);
    let glucose = reg.compound_id("glucose").unwrap();
    let oxygen = reg.compound_id("oxygen").unwrap();
    let carbon_dioxide = reg.compound_id("carbon_dioxide").unwrap();
    let sunlight = reg.compound_id("sunlight").unwrap();

    let mut patches = PatchMap::new();
    let surface = patches.add_patch(
        "surface",
        EnvironmentSample::new()
            .with(oxygen, 10.0)
            .with(carbon_dioxide, 60.0)
            .with(sunlight, 8.0),
    );

    let mut sim: Simulation<PatchId> = Simulation::new(Arc::clone(&reg), StepConfig::default());
    for (label, seed) in [("alga", 1.0), ("amoeba", 25.0), ("alga", 3.0)] {
        let profile = Arc::clone(data.profiles.get(label).unwrap());
        let mut stock = CompoundStock::new(profile, label);
        stock.give(glucose, seed);
        sim.spawn(stock, surface);
    }

    for _ in 0..15 {
        sim.step(&patches);
    }

    let blob = sim.save().unwrap();
    let (mut reloaded, report) = Simulation::<PatchId>::load(&blob, Arc::clone(&reg), &data.profiles).unwrap();
    assert_eq!(report.restored.len(), 3);
    assert_eq!(reloaded.state_hash(), sim.state_hash());

    for _ in 0..15 {
        sim.step(&patches);
        reloaded.step(&patches);
    }
    assert_eq!(reloaded.state_hash(), sim.state_hash());
    assert_eq!(reloaded.tick(), 30);
}
