use criterion::{black_box, criterion_group, criterion_main, Criterion};
use screenshotter::{CacheKey, CaptureOptions, ClipRect, Config, RenderParams, TemplateRenderer};
use std::time::Duration;

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

fn sample_params(clip: bool) -> RenderParams {
    RenderParams {
        url: "https://example.com/some/long/path?with=query&and=more".to_string(),
        filename: "example.png".to_string(),
        width: 1024,
        height: 768,
        clip: clip.then_some(ClipRect {
            width: 400,
            height: 300,
        }),
        wait_ms: 1000,
    }
}

fn benchmark_param_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_params");
    configure_fast_group(&mut group);

    let config = Config::default();
    let options = CaptureOptions {
        width: Some(800),
        clip_width: Some(400),
        clip_height: Some(300),
        ..Default::default()
    };

    group.bench_function("merge", |b| {
        b.iter(|| {
            let params = RenderParams::merge(
                black_box("https://example.com"),
                black_box("example.png"),
                &options,
                &config,
            );
            black_box(params);
        });
    });

    group.finish();
}

fn benchmark_cache_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_key");
    configure_fast_group(&mut group);

    let plain = sample_params(false);
    let clipped = sample_params(true);

    group.bench_function("derive", |b| {
        b.iter(|| black_box(CacheKey::derive(black_box(&plain))));
    });

    group.bench_function("derive_with_clip", |b| {
        b.iter(|| black_box(CacheKey::derive(black_box(&clipped))));
    });

    group.finish();
}

fn benchmark_template_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("template");
    configure_fast_group(&mut group);

    let renderer = TemplateRenderer::builtin().expect("built-in template parses");
    let params = sample_params(true);

    group.bench_function("render", |b| {
        b.iter(|| {
            let script = renderer.render(black_box(&params)).expect("render");
            black_box(script);
        });
    });

    group.finish();
}

fn benchmark_format_utilities(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_utilities");
    configure_fast_group(&mut group);

    let test_durations = vec![Duration::from_millis(100), Duration::from_secs(5)];
    let test_byte_sizes = vec![1024u64, 1048576];

    group.bench_function("format_duration", |b| {
        b.iter(|| {
            for duration in &test_durations {
                let formatted = screenshotter::format_duration(*duration);
                black_box(formatted);
            }
        });
    });

    group.bench_function("format_bytes", |b| {
        b.iter(|| {
            for size in &test_byte_sizes {
                let formatted = screenshotter::format_bytes(*size);
                black_box(formatted);
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_param_merge,
    benchmark_cache_key,
    benchmark_template_render,
    benchmark_format_utilities
);
criterion_main!(benches);
