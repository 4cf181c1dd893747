// SPDX-License-Identifier: MPL-2.0

//! This bench monitors the cost of conflict handling and unwinding.
//!
//! Dependencies are chained so that every version of every package in the
//! chain must be trialed and rewound before the fallback succeeds.

use criterion::*;
use spindle::{resolve, DefaultUi, DependencyGraph, OfflineSpecificationProvider, Ranges};

fn backtracking_chain(c: &mut Criterion, package_count: u32, version_count: u32) {
    let mut provider = OfflineSpecificationProvider::<u32, u32>::new();

    provider.add_dependencies(0u32, 0u32, [(1u32, Ranges::full())]);
    provider.add_dependencies(1u32, 0u32, []);

    for n in 1..package_count {
        for v in 1..version_count {
            provider.add_dependencies(n, v, [(n + 1, Ranges::singleton(v))]);
        }
    }
    // The terminal package only exists at a version nothing in the chain
    // accepts, so every chain prefix conflicts and unwinds.
    provider.add_dependencies(package_count, 0u32, []);

    c.bench_function("backtracking_chain", |b| {
        b.iter(|| {
            let _ = resolve(
                &provider,
                &DefaultUi,
                [(0u32, Ranges::full())],
                &DependencyGraph::new(),
            );
        })
    });
}

fn bench_group(c: &mut Criterion) {
    backtracking_chain(c, 20, 20);
}

criterion_group!(benches, bench_group);
criterion_main!(benches);
