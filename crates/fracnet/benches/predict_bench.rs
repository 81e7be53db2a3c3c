//! Benchmarks for the predict-and-explain cycle.
//!
//! Run with: cargo bench --bench predict_bench

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use fracnet::explain::GradCamConfig;
use fracnet::models::{BackboneConfig, ClassifierConfig, WeightsConfig};
use fracnet::vision::{PreprocessConfig, Preprocessor, XRayImage};
use fracnet::{FracnetConfig, FracturePipeline};

type BenchBackend = Autodiff<NdArray>;

/// Create a synthetic grayscale X-ray for benchmarking.
fn synthetic_xray(width: u32, height: u32) -> XRayImage {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let image = RgbImage::from_fn(width, height, |_, _| {
        let v = rng.gen::<u8>();
        Rgb([v, v, v])
    });
    XRayImage::from_rgb(image).unwrap()
}

fn small_config() -> FracnetConfig {
    FracnetConfig::default()
        .with_model(ClassifierConfig::new(BackboneConfig::new(16, vec![16, 32, 64])).with_head_hidden(32))
        .with_weights(WeightsConfig::new("target/bench-weights/absent.mpk"))
}

fn bench_preprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocess");
    let preprocessor = Preprocessor::new(PreprocessConfig::default()).unwrap();
    let device = Default::default();

    for size in [224u32, 512, 1024].iter() {
        let image = synthetic_xray(*size, *size);
        group.bench_with_input(BenchmarkId::new("prepare", size), &image, |b, image| {
            b.iter(|| black_box(preprocessor.prepare::<NdArray>(image, &device).unwrap()));
        });
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    group.sample_size(10);
    let image = synthetic_xray(512, 512);

    for layer in ["stem", "stage1", "stage3"].iter() {
        let config = small_config().with_explain(GradCamConfig::default().with_layer(*layer));
        let pipeline = FracturePipeline::<BenchBackend>::new(config, Default::default()).unwrap();
        // build outside the timed loop
        pipeline.classifier().unwrap();

        group.bench_with_input(BenchmarkId::new("explain", layer), &image, |b, image| {
            b.iter(|| black_box(pipeline.predict(image).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_preprocess, bench_predict);
criterion_main!(benches);
