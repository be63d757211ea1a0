//! the rule-based event processor (spec §4.I, component I): matches
//! classifier/state/pool filters, ranks eligible stands, and splits
//! records to meet sorted area, merchantable-carbon, or proportion
//! targets exactly.

pub mod expr;
pub mod target;

use crate::classifiers::{ClassifierAggregate, ClassifierKey};
use crate::error::{EngineError, EngineResult};
use crate::layout::PoolLayout;
use crate::ops::Entry;
use crate::params::{DisturbanceTypeId, SpeciesId};
use crate::pools::PoolSet;
use expr::{EvalContext, Expr};
use rand::rngs::SmallRng;
use rand::Rng;
use target::{disturbance_production, effective_target, sorted_disturbance_target, Candidate, EventOutcome, SortType, TargetType};

/// one event definition (spec §7 "Event input"): classifier pattern plus
/// eligibility expressions, a target, a sort, and the disturbance to
/// apply to whatever it selects.
pub struct EventRecord {
    pub classifier_pattern: ClassifierKey,
    /// additional filter conditions: the value at `aggregate.classifier_index`
    /// in the stand's classifier key must belong to `aggregate` (spec §3
    /// "Classifier aggregates are named sets of values used as filter
    /// conditions"). evaluated alongside the wildcard pattern match, not
    /// instead of it — a stand must satisfy both.
    pub classifier_aggregates: Vec<ClassifierAggregate>,
    pub age_eligibility: Option<Expr>,
    pub pool_expression: Option<Expr>,
    pub state_expression: Option<Expr>,
    pub sort_type: SortType,
    pub target_type: TargetType,
    pub target_value: f64,
    pub disturbance_type: DisturbanceTypeId,
    pub efficiency: f64,
}

/// everything the filter/sort evaluator needs to know about one candidate
/// stand, gathered by the caller from its own column storage.
pub struct StandView<'a> {
    pub classifiers: &'a ClassifierKey,
    pub age: u32,
    pub area: f64,
    pub species: SpeciesId,
    pub pools: &'a [f64],
    pub time_since_last_disturbance: u32,
}

struct StandContext<'a> {
    view: &'a StandView<'a>,
    pools: &'a PoolSet,
}

impl<'a> EvalContext for StandContext<'a> {
    fn column(&self, name: &str) -> EngineResult<f64> {
        match name {
            "age" => Ok(self.view.age as f64),
            "area" => Ok(self.view.area),
            "species" => Ok(self.view.species as f64),
            "time_since_last_disturbance" => Ok(self.view.time_since_last_disturbance as f64),
            _ => {
                let idx = self.pools.index(name)?;
                Ok(self.view.pools[idx])
            }
        }
    }

    fn param(&self, name: &str) -> EngineResult<f64> {
        // no per-event parameter substitution table reaches this far by
        // default; a caller with `{param}` expressions supplies one via a
        // richer context wrapping this one.
        Err(EngineError::domain("StandContext::param", format!("undefined parameter {{{name}}}")))
    }
}

/// does `view` pass this event's combined classifier + expression filter?
pub fn is_eligible(event: &EventRecord, view: &StandView, pools: &PoolSet) -> EngineResult<bool> {
    if !view.classifiers.matches(&event.classifier_pattern) {
        return Ok(false);
    }
    for aggregate in &event.classifier_aggregates {
        let value = *view.classifiers.0.get(aggregate.classifier_index).ok_or_else(|| {
            EngineError::domain("is_eligible", format!("aggregate {} indexes classifier {} out of range", aggregate.name, aggregate.classifier_index))
        })?;
        if !aggregate.contains(value) {
            return Ok(false);
        }
    }
    let ctx = StandContext { view, pools };
    for expr in [&event.age_eligibility, &event.pool_expression, &event.state_expression].into_iter().flatten() {
        if !expr.eval_bool(&ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// per-candidate sort value, dispatched by sort type (spec §4.I). non
/// production sorts read directly off the stand view; production sorts
/// need the disturbance matrix entries that would apply to this stand, so
/// the caller supplies them (already resolved by the disturbance provider
/// for this event's disturbance type and the stand's spatial unit).
pub fn sort_value(
    sort_type: SortType,
    view: &StandView,
    layout: &PoolLayout,
    matrix_entries: Option<&[Entry]>,
    rng: &mut SmallRng,
) -> EngineResult<f64> {
    match sort_type {
        SortType::ProportionOfEveryRecord | SortType::Svoid => Ok(0.0),
        SortType::SortBySwAge | SortType::SortByHwAge => Ok(view.age as f64),
        SortType::TotalStemSnag | SortType::SwStemSnag | SortType::HwStemSnag => {
            Ok(view.pools[layout.stem_snag] + view.pools[layout.branch_snag])
        }
        SortType::RandomSort => Ok(rng.random::<f64>()),
        SortType::MerchCSortTotal | SortType::MerchCSortSw | SortType::MerchCSortHw => {
            let entries = matrix_entries
                .ok_or_else(|| EngineError::domain("sort_value", "production-based sort requires disturbance matrix entries"))?;
            Ok(disturbance_production(layout, entries, view.pools))
        }
    }
}

/// runs one event end to end (spec §4.I points 1-5): filters eligible
/// stands, computes sort values, and greedily splits to hit the target.
/// `production_matrix` is consulted only for production-based sort types.
pub fn run_event<'a>(
    event: &EventRecord,
    views: &[StandView<'a>],
    pools: &PoolSet,
    layout: &PoolLayout,
    production_matrix: impl Fn(usize) -> EngineResult<Vec<Entry>>,
    rng: &mut SmallRng,
) -> EngineResult<EventOutcome> {
    let mut candidates = Vec::new();
    let mut total_eligible_area = 0.0;
    for (index, view) in views.iter().enumerate() {
        if !is_eligible(event, view, pools)? {
            continue;
        }
        total_eligible_area += view.area;
        let entries = if event.sort_type.is_production_based() { Some(production_matrix(index)?) } else { None };
        let sv = sort_value(event.sort_type, view, layout, entries.as_deref(), rng)?;
        let target_var = match event.target_type {
            TargetType::Area | TargetType::Proportion => view.area,
            TargetType::Merch => {
                let entries = entries.ok_or_else(|| {
                    EngineError::domain("run_event", "merch target requires a production-based sort")
                })?;
                view.area * disturbance_production(layout, &entries, view.pools) * event.efficiency
            }
        };
        candidates.push(Candidate { index, sort_value: sv, target_var });
    }
    let target = effective_target(event.target_type, event.target_value, total_eligible_area);
    let mut outcome = sorted_disturbance_target(candidates, target)?;
    // spec §4.I point 5: "for production-based merch targets multiply the
    // proportion by efficiency" — applied to every emitted row, full or
    // partial, after the generic greedy split, mirroring the original's
    // `merch_target` wrapper (`result.area_proportions = result.area_proportions * efficiency`).
    if event.target_type == TargetType::Merch {
        for split in &mut outcome.splits {
            split.proportion *= event.efficiency;
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::WILDCARD;
    use crate::layout::{default_pool_names, PoolLayout};
    use rand::SeedableRng;

    fn layout() -> PoolLayout {
        PoolLayout::resolve(&PoolSet::new(default_pool_names()).unwrap()).unwrap()
    }

    fn view<'a>(classifiers: &'a ClassifierKey, age: u32, area: f64, pools: &'a [f64]) -> StandView<'a> {
        StandView { classifiers, age, area, species: 1, pools, time_since_last_disturbance: age }
    }

    #[test]
    fn classifier_wildcard_and_age_filter_combine() {
        let pattern = ClassifierKey::new(vec![1, WILDCARD]);
        let event = EventRecord {
            classifier_pattern: pattern,
            classifier_aggregates: vec![],
            age_eligibility: Some(Expr::parse("age >= 60").unwrap()),
            pool_expression: None,
            state_expression: None,
            sort_type: SortType::SortBySwAge,
            target_type: TargetType::Area,
            target_value: 1.0,
            disturbance_type: 1,
            efficiency: 1.0,
        };
        let pools = PoolSet::new(default_pool_names()).unwrap();
        let row = vec![1.0; pools.len()];
        let key_match = ClassifierKey::new(vec![1, 99]);
        let key_miss = ClassifierKey::new(vec![2, 99]);
        assert!(is_eligible(&event, &view(&key_match, 60, 1.0, &row), &pools).unwrap());
        assert!(!is_eligible(&event, &view(&key_match, 59, 1.0, &row), &pools).unwrap());
        assert!(!is_eligible(&event, &view(&key_miss, 60, 1.0, &row), &pools).unwrap());
    }

    #[test]
    fn aggregate_membership_narrows_the_wildcard_pattern() {
        let pools = PoolSet::new(default_pool_names()).unwrap();
        let row = vec![1.0; pools.len()];
        let event = EventRecord {
            classifier_pattern: ClassifierKey::new(vec![WILDCARD]),
            classifier_aggregates: vec![ClassifierAggregate { name: "Softwood".into(), classifier_index: 0, values: vec![1, 2] }],
            age_eligibility: None,
            pool_expression: None,
            state_expression: None,
            sort_type: SortType::SortBySwAge,
            target_type: TargetType::Area,
            target_value: 1.0,
            disturbance_type: 1,
            efficiency: 1.0,
        };
        let member = ClassifierKey::new(vec![2]);
        let non_member = ClassifierKey::new(vec![3]);
        assert!(is_eligible(&event, &view(&member, 10, 1.0, &row), &pools).unwrap());
        assert!(!is_eligible(&event, &view(&non_member, 10, 1.0, &row), &pools).unwrap());
    }

    #[test]
    fn sorted_area_target_end_to_end() {
        let layout = layout();
        let pools = PoolSet::new(default_pool_names()).unwrap();
        let key = ClassifierKey::new(vec![WILDCARD]);
        let pattern = ClassifierKey::new(vec![WILDCARD]);
        let ages = [0u32, 20, 10, 30];
        let areas = [1.5, 2.0, 2.0, 3.0];
        let row = vec![0.0; pools.len()];
        let views: Vec<StandView> = ages.iter().zip(areas.iter()).map(|(&a, &ar)| view(&key, a, ar, &row)).collect();
        let event = EventRecord {
            classifier_pattern: pattern,
            classifier_aggregates: vec![],
            age_eligibility: None,
            pool_expression: None,
            state_expression: None,
            sort_type: SortType::SortBySwAge,
            target_type: TargetType::Area,
            target_value: 5.1,
            disturbance_type: 1,
            efficiency: 1.0,
        };
        let mut rng = SmallRng::seed_from_u64(0);
        let outcome = run_event(&event, &views, &pools, &layout, |_| Ok(Vec::new()), &mut rng).unwrap();
        let indices: Vec<usize> = outcome.splits.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![3, 1, 2]);
        assert_eq!(outcome.num_splits, 1);
    }
}
