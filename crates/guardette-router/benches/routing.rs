//! Routing benchmarks.
//!
//! Run with: `cargo bench -p guardette-router`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use guardette_router::Router;
use http::Method;

fn build_router(num_routes: usize) -> Router<usize> {
    let mut router = Router::new();

    for i in 0..num_routes / 2 {
        router
            .insert_route(&format!("GET /api/v1/resource{i}/{{id:int}}.json"), i)
            .unwrap();
    }

    for i in 0..num_routes / 2 {
        router
            .insert_route(&format!("GET /api/v1/org/{{org}}/resource{i}/{{rest:path}}"), i)
            .unwrap();
    }

    router
}

fn bench_first_match(c: &mut Criterion) {
    let router = build_router(100);

    c.bench_function("first_match", |b| {
        b.iter(|| {
            black_box(router.match_route(&Method::GET, "/api/v1/resource0/12345.json"));
        });
    });
}

fn bench_last_match(c: &mut Criterion) {
    let router = build_router(100);

    c.bench_function("last_match", |b| {
        b.iter(|| {
            black_box(router.match_route(
                &Method::GET,
                "/api/v1/org/acme-corp/resource49/a/b/c",
            ));
        });
    });
}

fn bench_miss(c: &mut Criterion) {
    let router = build_router(100);

    c.bench_function("miss", |b| {
        b.iter(|| {
            black_box(router.match_route(&Method::GET, "/api/v1/nonexistent/path"));
        });
    });
}

fn bench_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scaling");

    for num_routes in [10, 50, 100, 500] {
        let router = build_router(num_routes);

        group.bench_with_input(
            BenchmarkId::new("middle_match", num_routes),
            &num_routes,
            |b, &n| {
                let path = format!("/api/v1/resource{}/12345.json", n / 4);
                b.iter(|| black_box(router.match_route(&Method::GET, &path)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_first_match,
    bench_last_match,
    bench_miss,
    bench_scaling
);
criterion_main!(benches);
