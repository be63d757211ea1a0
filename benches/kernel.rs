use cbm_kernel::ops::{FluxIndicator, FluxIndicatorSet, Operation, Process, SparseMatrix};
use cbm_kernel::pools::{FluxMatrix, Population};

const STANDS: usize = 4_096;
const COLS: usize = 16;

fn population() -> Population {
    let data: Vec<f64> = (0..STANDS * COLS).map(|i| (i % 7) as f64).collect();
    Population::from_rows(STANDS, COLS, data).unwrap()
}

fn chain_ops() -> Vec<Operation> {
    let growth = SparseMatrix::new(vec![(1, 1, 0.9), (1, 2, 0.1), (0, 0, 1.0)]);
    let decay = SparseMatrix::new(vec![(2, 2, 0.8), (2, 6, 0.1), (2, 13, 0.1)]);
    vec![
        Operation::from_matrix_list(Process::Growth, vec![growth], vec![0; STANDS]).unwrap(),
        Operation::from_matrix_list(Process::Decay, vec![decay], vec![0; STANDS]).unwrap(),
    ]
}

fn bench_compute_pools(c: &mut criterion::Criterion) {
    let ops = chain_ops();
    let op_refs: Vec<&Operation> = ops.iter().collect();
    c.bench_function("compute_pools/4096 stands", |b| {
        b.iter_batched(
            population,
            |mut p| cbm_kernel::kernel::compute_pools(&op_refs, &mut p, None).unwrap(),
            criterion::BatchSize::LargeInput,
        )
    });
}

fn bench_compute_flux(c: &mut criterion::Criterion) {
    let ops = chain_ops();
    let op_refs: Vec<&Operation> = ops.iter().collect();
    let indicators = FluxIndicatorSet::new(vec![
        FluxIndicator::new("growth_to_other", Process::Growth, vec![1], vec![2]),
        FluxIndicator::new("decay_to_atmosphere", Process::Decay, vec![2], vec![6]),
    ])
    .unwrap();
    c.bench_function("compute_flux/4096 stands", |b| {
        b.iter_batched(
            || (population(), FluxMatrix::zeros(STANDS, indicators.len())),
            |(mut p, mut f)| cbm_kernel::kernel::compute_flux(&op_refs, &mut p, &mut f, &indicators, None).unwrap(),
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default().without_plots().sample_size(20).measurement_time(std::time::Duration::from_secs(2));
    targets = bench_compute_pools, bench_compute_flux
}
criterion::criterion_main!(benches);
