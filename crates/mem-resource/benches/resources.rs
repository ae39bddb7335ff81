// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks comparing allocate/deallocate pairs on the host resource and
//! the binary-page resource across power-of-two sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mem_resource::{BinaryPageMemoryResource, HostMemoryResource, MemoryResource};

const SIZES: [usize; 6] = [256, 1 << 12, 1 << 16, 1 << 20, 1 << 22, 1 << 24];

fn bench_host(c: &mut Criterion) {
    let host = HostMemoryResource;
    let mut group = c.benchmark_group("host");
    for size in SIZES {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let ptr = host.allocate(size, 1).unwrap();
                unsafe { host.deallocate(ptr, size, 1) };
            });
        });
    }
    group.finish();
}

fn bench_binary_page(c: &mut Criterion) {
    let host = HostMemoryResource;
    let mut group = c.benchmark_group("binary_page");
    for size in SIZES {
        let pages = BinaryPageMemoryResource::new(&host);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let ptr = pages.allocate(size, 1).unwrap();
                unsafe { pages.deallocate(ptr, size, 1) };
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_host, bench_binary_page);
criterion_main!(benches);
