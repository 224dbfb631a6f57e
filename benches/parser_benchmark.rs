//! Parser and Differ Performance Benchmarks for netrm
//!
//! This benchmark suite covers the hot paths of a resource run:
//!
//! 1. FACT PARSING:
//!    - Interface blocks scaled by device size
//!    - Global and per-interface spanning-tree lines
//!    - Nested BGP address families
//!
//! 2. COMMAND GENERATION:
//!    - Merged and overridden runs against large fact trees
//!    - Idempotent runs (no commands expected)
//!
//! 3. RANGE SETS:
//!    - Canonicalisation and unions of VLAN range strings
//!
//! Run with: cargo bench --bench parser_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use netrm::prelude::*;
use netrm::resource::ranges;

// ============================================================================
// TEST DATA GENERATORS
// ============================================================================

/// Running configuration with `count` interfaces
fn generate_interfaces_config(count: usize) -> String {
    let mut out = String::new();
    for i in 0..count {
        out.push_str(&format!("interface GigabitEthernet1/0/{}\n", i));
        out.push_str(&format!(" description port {}\n", i));
        out.push_str(" mtu 9000\n");
        if i % 3 == 0 {
            out.push_str(" shutdown\n");
        }
    }
    out
}

/// Spanning-tree configuration with `count` interfaces
fn generate_spanning_tree_config(count: usize) -> String {
    let mut out = String::from(
        "spanning-tree mode rapid-pvst\nspanning-tree extend system-id\nspanning-tree vlan 1-100 priority 8192\n",
    );
    for i in 0..count {
        out.push_str(&format!("interface GigabitEthernet1/0/{}\n", i));
        out.push_str(&format!(" spanning-tree vlan {}-{} cost 100\n", i + 1, i + 10));
        out.push_str(" spanning-tree portfast\n");
    }
    out
}

/// BGP configuration with `count` neighbors in one address family
fn generate_bgp_config(count: usize) -> String {
    let mut out = String::from("router bgp 65000\n address-family ipv4\n");
    for i in 0..count {
        let peer = format!("10.{}.{}.1", i / 250, i % 250);
        out.push_str(&format!("  neighbor {} activate\n", peer));
        out.push_str(&format!("  neighbor {} route-map RM-IN in\n", peer));
    }
    out.push_str(" exit-address-family\n");
    out
}

fn parse(resource: &dyn Resource, text: &str) -> RunResult {
    run(resource, State::Parsed, None, Some(text), || Ok(String::new())).unwrap()
}

// ============================================================================
// FACT PARSING
// ============================================================================

fn bench_fact_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("fact_parsing");

    for size in [10, 100, 500] {
        let interfaces = generate_interfaces_config(size);
        group.throughput(Throughput::Bytes(interfaces.len() as u64));
        group.bench_with_input(BenchmarkId::new("interfaces", size), &interfaces, |b, text| {
            b.iter(|| parse(&Interfaces, black_box(text)))
        });

        let stp = generate_spanning_tree_config(size);
        group.throughput(Throughput::Bytes(stp.len() as u64));
        group.bench_with_input(BenchmarkId::new("spanning_tree", size), &stp, |b, text| {
            b.iter(|| parse(&SpanningTree, black_box(text)))
        });

        let bgp = generate_bgp_config(size);
        group.throughput(Throughput::Bytes(bgp.len() as u64));
        group.bench_with_input(BenchmarkId::new("bgp_address_family", size), &bgp, |b, text| {
            b.iter(|| parse(&BgpAddressFamily, black_box(text)))
        });
    }

    group.finish();
}

// ============================================================================
// COMMAND GENERATION
// ============================================================================

fn bench_command_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_generation");

    for size in [10, 100, 500] {
        let running = generate_interfaces_config(size);
        let want = json!([{"name": "GigabitEthernet1/0/1", "description": "changed", "mtu": 1500}]);

        group.bench_with_input(BenchmarkId::new("interfaces_merged", size), &running, |b, text| {
            b.iter(|| {
                let text = text.clone();
                run(&Interfaces, State::Merged, Some(black_box(&want)), None, move || Ok(text)).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("interfaces_overridden", size), &running, |b, text| {
            b.iter(|| {
                let text = text.clone();
                run(&Interfaces, State::Overridden, Some(black_box(&want)), None, move || Ok(text)).unwrap()
            })
        });

        let facts = parse(&Interfaces, &running)
            .parsed
            .map(|n| n.to_json())
            .unwrap_or_default();
        group.bench_with_input(BenchmarkId::new("interfaces_idempotent", size), &running, |b, text| {
            b.iter(|| {
                let text = text.clone();
                run(&Interfaces, State::Replaced, Some(black_box(&facts)), None, move || Ok(text)).unwrap()
            })
        });
    }

    let stp = generate_spanning_tree_config(100);
    let want = json!({"interfaces": [{"name": "GigabitEthernet1/0/5", "cost": [{"value": 100, "vlan": "200-300"}]}]});
    group.bench_function("spanning_tree_merged_100", |b| {
        b.iter(|| {
            let text = stp.clone();
            run(&SpanningTree, State::Merged, Some(black_box(&want)), None, move || Ok(text)).unwrap()
        })
    });

    group.finish();
}

// ============================================================================
// RANGE SETS
// ============================================================================

fn bench_ranges(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranges");

    let scattered: String = (1..2000)
        .filter(|n| n % 3 != 0)
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",");

    group.bench_function("canonical_scattered", |b| {
        b.iter(|| ranges::canonical(black_box(&scattered)).unwrap())
    });

    group.bench_function("union_all", |b| {
        b.iter(|| ranges::union_all(black_box(["1-1000", "500-2000", "3000,3002,3004"])).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_fact_parsing, bench_command_generation, bench_ranges);
criterion_main!(benches);
