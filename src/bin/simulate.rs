//! Demo CLI: builds a single stand from an inline scenario, steps it
//! forward, and prints a pool summary. Mirrors the teacher's
//! `src/bin/trainer.rs` + `clap`/`env_logger` wiring, scaled down from a
//! training pipeline to a one-stand simulation run.

use anyhow::Context;
use clap::Parser;
use cbm_kernel::classifiers::ClassifierKey;
use cbm_kernel::growth::{VolumeCurve, VolumeCurveSet, VolumePoint, YieldCurveEntry};
use cbm_kernel::layout::{default_flux_indicators, default_pool_names, PoolLayout};
use cbm_kernel::params::{
    BiomassConversionCoefficients, DecayParameter, ParameterBundle, ParameterStore, SpatialUnitParameters, TurnoverParameter,
};
use cbm_kernel::pools::{FluxMatrix, PoolSet, Population};
use cbm_kernel::state::StandState;
use cbm_kernel::{Engine, StandInputs};

#[derive(Parser)]
#[command(author, version, about = "run a single-stand CBM-style simulation")]
struct Args {
    /// number of annual steps to run after spinup
    #[arg(long, default_value_t = 50)]
    steps: u32,

    /// stand's starting age (post-spinup)
    #[arg(long, default_value_t = 0)]
    age: u32,

    /// smooth the volume-to-biomass growth curve
    #[arg(long, default_value_t = true)]
    smoothed: bool,
}

fn inline_scenario() -> anyhow::Result<(Engine, StandState, Population, FluxMatrix, ClassifierKey)> {
    let pools = PoolSet::new(default_pool_names()).context("building pool set")?;

    let decay_pools = [
        "AboveGroundFastDOM",
        "BelowGroundFastDOM",
        "StemSnag",
        "BranchSnag",
        "MediumDOM",
        "AboveGroundSlowDOM",
        "BelowGroundSlowDOM",
    ];
    let spatial_unit = SpatialUnitParameters {
        spatial_unit: 1,
        mean_annual_temperature: 2.0,
        random_return_interval: 125.0,
        slow_mixing_rate: 0.006,
        turnover: TurnoverParameter {
            foliage_fall: 0.95,
            branch_fall: 0.03,
            stem_fall: 0.01,
            root_fall: 0.02,
            branch_snag_split: 0.25,
            above_to_below_fast: 0.5,
            stem_snag_rate: 0.1,
            branch_snag_rate: 0.1,
        },
        decay: decay_pools
            .iter()
            .map(|name| DecayParameter {
                pool: name.to_string(),
                base_rate: 0.05,
                q10: 2.3,
                reference_temperature: 2.0,
                max_rate: 1.0,
                prop_to_atmosphere: 0.4,
            })
            .collect(),
    };

    let bundle = ParameterBundle {
        spatial_units: vec![spatial_unit],
        disturbance_types: vec![],
        disturbance_matrices: vec![],
        biomass_coefficients: vec![BiomassConversionCoefficients {
            species: 1,
            merch_to_foliage: 0.1,
            merch_to_other: 0.2,
            merch_to_coarse_root: 0.05,
            merch_to_fine_root: 0.05,
        }],
        afforestation_soil: vec![],
        volume_curves: VolumeCurveSet {
            entries: vec![YieldCurveEntry {
                pattern: vec![cbm_kernel::classifiers::WILDCARD],
                softwood: Some(VolumeCurve {
                    species: 1,
                    points: vec![
                        VolumePoint { age: 0, volume: 0.0 },
                        VolumePoint { age: 50, volume: 150.0 },
                        VolumePoint { age: 100, volume: 250.0 },
                        VolumePoint { age: 150, volume: 280.0 },
                    ],
                }),
                hardwood: None,
            }],
        },
        min_rotations: 3,
        max_rotations: 30,
    };

    let store = ParameterStore::build(bundle).context("building parameter store")?;
    let layout = PoolLayout::resolve(&pools).context("resolving pool layout")?;
    let indicators = default_flux_indicators(&layout);
    let engine = Engine::new(pools, store, indicators).context("constructing engine")?;

    let population = Population::from_rows(1, engine.pools.len(), vec![0.0; engine.pools.len()])?;
    let flux = FluxMatrix::zeros(1, 0);
    let state = StandState::default();
    let classifiers = ClassifierKey::new(vec![1]);

    Ok((engine, state, population, flux, classifiers))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let (mut engine, mut state, mut population, mut flux, classifiers) =
        inline_scenario().context("setting up the demo scenario")?;
    state.age = args.age;

    let input = StandInputs {
        classifiers: &classifiers,
        species: 1,
        spatial_unit: 1,
        disturbance_type: 0,
        delay_years: 0,
        smoothed_growth: args.smoothed,
        temperature_override: None,
    };

    log::info!("running {} steps from age {}", args.steps, state.age);
    for _ in 0..args.steps {
        engine
            .step(&mut population, &mut flux, std::slice::from_mut(&mut state), std::slice::from_ref(&input))
            .context("stepping the stand")?;
    }

    let row = population.row(0);
    println!("final age: {}", state.age);
    for (name, &value) in engine.pools.names().iter().zip(row.iter()) {
        println!("{name:>20}: {value:.4}");
    }
    Ok(())
}
