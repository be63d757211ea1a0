//! a concrete pool layout used by the providers (growth/turnover/decay/
//! disturbance) and by the demo/test scenarios. the kernel itself (§4.A)
//! and the operation store (§4.B) know nothing about pool *names* — only
//! the providers need a name-to-role mapping, resolved once against
//! whatever [`crate::pools::PoolSet`] the caller constructed.

use crate::error::EngineResult;
use crate::growth::BiomassPools;
use crate::ops::{FluxIndicator, FluxIndicatorSet, Process};
use crate::pools::PoolSet;

/// the default pool names this crate ships, matching the CBM-CFS3
/// convention (spec §9 glossary: live biomass, DOM, atmosphere,
/// products). live biomass is modelled as one dominant-species group per
/// stand (see DESIGN.md) rather than separate softwood/hardwood pools.
pub fn default_pool_names() -> Vec<String> {
    [
        "Input",
        "Merch",
        "Foliage",
        "Other",
        "CoarseRoots",
        "FineRoots",
        "AboveGroundFastDOM",
        "BelowGroundFastDOM",
        "StemSnag",
        "BranchSnag",
        "MediumDOM",
        "AboveGroundSlowDOM",
        "BelowGroundSlowDOM",
        "CO2",
        "ProductsSoftwood",
        "ProductsHardwood",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct PoolLayout {
    pub input: usize,
    pub merch: usize,
    pub foliage: usize,
    pub other: usize,
    pub coarse_root: usize,
    pub fine_root: usize,
    pub above_ground_fast_dom: usize,
    pub below_ground_fast_dom: usize,
    pub stem_snag: usize,
    pub branch_snag: usize,
    pub medium_dom: usize,
    pub above_ground_slow_dom: usize,
    pub below_ground_slow_dom: usize,
    pub co2: usize,
    pub products_softwood: usize,
    pub products_hardwood: usize,
}

impl PoolLayout {
    pub fn resolve(pools: &PoolSet) -> EngineResult<Self> {
        Ok(Self {
            input: pools.index("Input")?,
            merch: pools.index("Merch")?,
            foliage: pools.index("Foliage")?,
            other: pools.index("Other")?,
            coarse_root: pools.index("CoarseRoots")?,
            fine_root: pools.index("FineRoots")?,
            above_ground_fast_dom: pools.index("AboveGroundFastDOM")?,
            below_ground_fast_dom: pools.index("BelowGroundFastDOM")?,
            stem_snag: pools.index("StemSnag")?,
            branch_snag: pools.index("BranchSnag")?,
            medium_dom: pools.index("MediumDOM")?,
            above_ground_slow_dom: pools.index("AboveGroundSlowDOM")?,
            below_ground_slow_dom: pools.index("BelowGroundSlowDOM")?,
            co2: pools.index("CO2")?,
            products_softwood: pools.index("ProductsSoftwood")?,
            products_hardwood: pools.index("ProductsHardwood")?,
        })
    }

    pub fn biomass_pools(&self) -> BiomassPools {
        BiomassPools {
            merch: self.merch,
            foliage: self.foliage,
            other: self.other,
            coarse_root: self.coarse_root,
            fine_root: self.fine_root,
        }
    }

    pub fn dom_pools_for_decay(&self) -> Vec<usize> {
        vec![
            self.above_ground_fast_dom,
            self.below_ground_fast_dom,
            self.stem_snag,
            self.branch_snag,
            self.medium_dom,
        ]
    }

    pub fn slow_pools(&self) -> (usize, usize) {
        (self.above_ground_slow_dom, self.below_ground_slow_dom)
    }
}

/// the flux indicators the engine ships with by default, matching what the
/// original `cbm_defaults` parameter database defines out of the box
/// (SPEC_FULL §14): the three disturbance-production terms the rule-based
/// event processor's `MERCHCSORT_*` sorts are named after, plus one
/// indicator per other process so growth/turnover/decay are observable
/// without a caller having to hand-assemble a `FluxIndicatorSet`. Under
/// this crate's single-dominant-species layout (see DESIGN.md) the three
/// disturbance terms share the same biomass/DOM source rows and differ
/// only by sink.
pub fn default_flux_indicators(layout: &PoolLayout) -> FluxIndicatorSet {
    let biomass = vec![layout.merch, layout.foliage, layout.other, layout.coarse_root, layout.fine_root];
    let dom = layout.dom_pools_for_decay();
    let (ags, bgs) = layout.slow_pools();
    let dom_and_slow: Vec<usize> = dom.iter().copied().chain([ags, bgs]).collect();

    let indicators = vec![
        FluxIndicator::new("DisturbanceSoftProduction", Process::Disturbance, biomass.clone(), vec![layout.products_softwood]),
        FluxIndicator::new("DisturbanceHardProduction", Process::Disturbance, biomass.clone(), vec![layout.products_hardwood]),
        FluxIndicator::new(
            "DisturbanceDOMProduction",
            Process::Disturbance,
            dom_and_slow,
            vec![layout.products_softwood, layout.products_hardwood],
        ),
        FluxIndicator::new("GrossGrowth", Process::Growth, vec![layout.input], biomass.clone()),
        FluxIndicator::new("BiomassTurnover", Process::Turnover, biomass, dom.clone()),
        FluxIndicator::new("DOMDecayToAir", Process::Decay, dom, vec![layout.co2]),
        FluxIndicator::new("SlowDecayToAir", Process::Decay, vec![ags, bgs], vec![layout.co2]),
    ];
    FluxIndicatorSet::new(indicators).expect("default flux indicators always carry non-empty names")
}
