//! Benchmarks for the planning half of an install
//!
//! This benchmark suite measures:
//! - Suffix-based format detection over a mix of package names
//! - Backend lookup through the shared registry
//! - Version comparison as used by `installium info`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use installium::registry::{BackendOptions, BackendRegistry};
use installium::version::compare_versions;
use installium::{detect, find_backend, DistroFamily, PackageFormat};
use std::path::PathBuf;

const PACKAGE_NAMES: [&str; 6] = [
    "hello_2.10-3_amd64.deb",
    "htop-3.3.0-1.fc40.x86_64.rpm",
    "ripgrep-14.1.0-1-x86_64.pkg.tar.zst",
    "linux-6.9.arch1-1-x86_64.pkg.tar.xz",
    "busybox-1.36.1-r29.apk",
    "release-notes.txt",
];

fn bench_detect(c: &mut Criterion) {
    let paths: Vec<PathBuf> = PACKAGE_NAMES
        .iter()
        .map(|name| PathBuf::from("/var/cache/downloads").join(name))
        .collect();

    let mut group = c.benchmark_group("detect");
    for path in &paths {
        let label = path.file_name().unwrap().to_string_lossy().to_string();
        group.bench_with_input(BenchmarkId::from_parameter(label), path, |b, path| {
            b.iter(|| detect(black_box(path)))
        });
    }
    group.finish();
}

fn bench_find_backend(c: &mut Criterion) {
    c.bench_function("find_backend_all_pairs", |b| {
        b.iter(|| {
            let mut hits = 0;
            for format in PackageFormat::SUPPORTED {
                for distro in DistroFamily::ALL {
                    if find_backend(black_box(format), black_box(distro)).is_some() {
                        hits += 1;
                    }
                }
            }
            hits
        })
    });

    c.bench_function("registry_builtin", |b| {
        let options = BackendOptions::default();
        b.iter(|| BackendRegistry::builtin(black_box(&options)))
    });
}

fn bench_compare_versions(c: &mut Criterion) {
    let pairs = [
        ("2.10-3", "2.10-2"),
        ("1:1.0", "2.0"),
        ("1.36.1-r29", "1.36.1-r3"),
        ("14.1.0-1", "14.1.0-1"),
    ];

    c.bench_function("compare_versions", |b| {
        b.iter(|| {
            pairs
                .iter()
                .map(|(a, b)| compare_versions(black_box(a), black_box(b)))
                .collect::<Vec<_>>()
        })
    });
}

criterion_group!(
    benches,
    bench_detect,
    bench_find_backend,
    bench_compare_versions
);
criterion_main!(benches);
