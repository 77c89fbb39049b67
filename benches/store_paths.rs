//! Store path benchmarks.
//!
//! Run with: `cargo bench --bench store_paths`
//! Compare baselines: `cargo bench --bench store_paths -- --baseline main`
//!
//! Covers the per-mutation render (add), the full scrape render
//! (write_all) at several corpus sizes, and label projection.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use state_metrics::aggregation::get_labels_by_name;
use state_metrics::{
    by_labels, by_namespace_and_owner, Family, FamilyGenerator, Metric, MetricType, MetricsStore, ObjectMeta,
    OwnerReference, StoreSchema,
};

fn pod(i: usize) -> ObjectMeta {
    ObjectMeta::new(format!("ns-{}", i % 8), format!("pod-{}", i))
        .with_uid(format!("uid-{}", i))
        .with_owner(OwnerReference::new("ReplicaSet", format!("rs-{}", i % 32)).with_controller(true))
}

fn store() -> MetricsStore<ObjectMeta> {
    let generators = vec![
        FamilyGenerator::new("kube_pod_info", "Pod info.", MetricType::Gauge, |obj: &ObjectMeta| {
            Family::new(vec![Metric::new(
                ["namespace", "pod", "uid"],
                [obj.namespace.as_str(), obj.name.as_str(), obj.uid.as_str()],
                1.0,
            )])
        })
        .with_aggregation("owner", by_namespace_and_owner(&[])),
        FamilyGenerator::new("kube_pod_status_phase", "Pod phase.", MetricType::Gauge, |obj: &ObjectMeta| {
            Family::new(
                ["Pending", "Running", "Succeeded", "Failed", "Unknown"]
                    .iter()
                    .map(|&phase| {
                        let value = if phase == "Running" { 1.0 } else { 0.0 };
                        Metric::new(["uid", "phase"], [obj.uid.as_str(), phase], value)
                    })
                    .collect(),
            )
        })
        .with_aggregation("phase", by_labels(&["phase"])),
    ];
    MetricsStore::new(StoreSchema::from_generators(generators))
}

/// Benchmark MetricsStore::add - generate, validate and render one object
fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("add");
    group.throughput(Throughput::Elements(1));

    let store = store();
    let objects: Vec<ObjectMeta> = (0..1024).map(pod).collect();
    let mut i = 0;
    group.bench_function("replace_existing", |b| {
        b.iter(|| {
            let obj = &objects[i % objects.len()];
            i += 1;
            store.add(black_box(&obj.uid), black_box(obj)).unwrap()
        })
    });

    group.finish();
}

/// Benchmark MetricsStore::write_all - the scrape path
fn bench_write_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_all");

    for size in [100, 1_000, 10_000] {
        let store = store();
        for i in 0..size {
            let obj = pod(i);
            store.add(&obj.uid, &obj).unwrap();
        }
        let mut buf = Vec::with_capacity(size * 512);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                buf.clear();
                store.write_all(black_box(&mut buf)).unwrap();
            })
        });
    }

    group.finish();
}

/// Benchmark get_labels_by_name - per metric, per aggregation
fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");
    group.throughput(Throughput::Elements(1));

    let metric = Metric::new(
        ["namespace", "pod", "uid", "node", "phase", "reason"],
        ["ns", "p", "u", "n", "Running", "Started"],
        1.0,
    );
    group.bench_function("present", |b| {
        b.iter(|| get_labels_by_name(black_box(&metric), black_box(&["namespace", "phase"])))
    });
    group.bench_function("absent", |b| {
        b.iter(|| get_labels_by_name(black_box(&metric), black_box(&["container"])))
    });

    group.finish();
}

criterion_group!(benches, bench_add, bench_write_all, bench_projection);

criterion_main!(benches);
