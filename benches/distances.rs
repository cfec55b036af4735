use std::hint::black_box;

use burn::backend::NdArray;
use burn::prelude::*;
use burn::tensor::Distribution;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use shinglenet::Redux;
use shinglenet::scoring::{PaddedBatch, distances};

type BenchBackend = NdArray;

const QUERIES: usize = 8;
const CANDIDATES: usize = 64;
const DIM: usize = 512;

fn unit_embeddings(items: usize, shingles: usize) -> Tensor<BenchBackend, 3> {
    let z = Tensor::<BenchBackend, 3>::random(
        [items, shingles, DIM],
        Distribution::Normal(0.0, 1.0),
        &Default::default(),
    );
    let norm = z.clone().powf_scalar(2.0).sum_dim(2).sqrt();
    z / norm
}

fn bench_distances(c: &mut Criterion) {
    let mut group = c.benchmark_group("distances");
    for shingles in [4_usize, 16] {
        let q = unit_embeddings(QUERIES, shingles);
        let cand = unit_embeddings(CANDIDATES, shingles);
        for redux in [Redux::Min, Redux::Mean] {
            group.bench_with_input(
                BenchmarkId::new(redux.to_string(), shingles),
                &(q.clone(), cand.clone()),
                |b, (q, cand)| {
                    b.iter(|| {
                        distances(q.clone(), cand.clone(), None, None, Some(black_box(redux)))
                            .expect("distances")
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_pack(c: &mut Criterion) {
    let items: Vec<Vec<Vec<f32>>> = (0..CANDIDATES)
        .map(|i| vec![vec![0.5_f32; DIM]; 1 + i % 12])
        .collect();
    c.bench_with_input(
        BenchmarkId::new("pack", CANDIDATES),
        &items,
        |b, items| {
            b.iter(|| PaddedBatch::pack(black_box(items), DIM).expect("pack"));
        },
    );
}

criterion_group!(benches, bench_distances, bench_pack);
criterion_main!(benches);
