//! Benchmarks for cutout sampling, augmentation and ranking.
//!
//! Run with: cargo bench -p clipguide-core

use clipguide_core::cutouts::pool::adaptive_avg_pool2d;
use clipguide_core::{AugmentationPipeline, LabelEmbeddings, MakeCutouts, SemanticRanker};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{Array2, Array3, Array4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn test_image(height: usize, width: usize) -> Array4<f32> {
    Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
        ((c * 31 + y * 7 + x * 3) % 255) as f32 / 255.0
    })
}

fn benchmark_pool(c: &mut Criterion) {
    let crop = Array3::from_elem((3, 512, 512), 0.5f32);

    c.bench_function("adaptive_avg_pool_512_to_224", |b| {
        b.iter(|| adaptive_avg_pool2d(black_box(&crop.view()), 224, 224))
    });
}

fn benchmark_sample_cutouts(c: &mut Criterion) {
    let image = test_image(512, 768);
    let sampler = MakeCutouts::new(224, 16, 1.0, false).unwrap();
    let mut rng = StdRng::seed_from_u64(0);

    c.bench_function("sample_16_cutouts_no_augs", |b| {
        b.iter(|| sampler.sample(black_box(&image), &mut rng).unwrap())
    });
}

fn benchmark_augmentations(c: &mut Criterion) {
    let pipeline = AugmentationPipeline::standard();
    let batch = Array4::from_elem((16, 3, 224, 224), 0.5f32);
    let mut rng = StdRng::seed_from_u64(1);

    c.bench_function("augment_16x224", |b| {
        b.iter(|| {
            let mut work = batch.clone();
            pipeline.apply(black_box(&mut work), &mut rng);
            work
        })
    });
}

fn benchmark_ranking(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let labels: Vec<String> = (0..1000).map(|i| format!("class {i}")).collect();
    let matrix = Array2::from_shape_fn((1000, 512), |_| rng.gen_range(-1.0..1.0));
    let embeddings = LabelEmbeddings::from_matrix(labels, matrix).unwrap();
    let query = Array2::from_shape_fn((1, 512), |_| rng.gen_range(-1.0f32..1.0));
    let ranker = SemanticRanker::default();

    c.bench_function("rank_1000_labels", |b| {
        b.iter(|| {
            ranker
                .top_n_encoded(black_box(&query), &embeddings, Some(5))
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    benchmark_pool,
    benchmark_sample_cutouts,
    benchmark_augmentations,
    benchmark_ranking,
);
criterion_main!(benches);
