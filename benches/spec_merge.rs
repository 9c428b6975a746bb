//! Benchmarks for the per-request spec merge path
//!
//! Every create and update merges overrides over the kind defaults and
//! then sums the result, so both run once per request.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fabric_deployer::config::ComponentDefaults;
use fabric_deployer::crd::{ComponentKind, ResourceRequirements};
use fabric_deployer::domain::{ComponentSchema, SlotContext};
use fabric_deployer::lifecycle::{merge_json, merge_resources, total_resources};
use serde_json::json;
use std::collections::BTreeMap;

fn peer_overrides() -> BTreeMap<String, ResourceRequirements> {
    let mut overrides = BTreeMap::new();
    overrides.insert("peer".to_string(), ResourceRequirements::symmetric("500m", "1Gi"));
    overrides.insert("couchdb".to_string(), ResourceRequirements::symmetric("1", "2Gi"));
    overrides
}

fn bench_merge_resources(c: &mut Criterion) {
    let mut group = c.benchmark_group("spec_merge");
    group.throughput(Throughput::Elements(1));

    let defaults = ComponentDefaults::builtin(ComponentKind::Peer);
    let overrides = peer_overrides();
    let schema = ComponentSchema::for_kind(ComponentKind::Peer);
    let active = schema.active_slots(&SlotContext::new("2.2.1-3", Some("couchdb")));

    group.bench_function("merge_peer_resources", |b| {
        b.iter(|| {
            merge_resources(
                black_box(&defaults.resources),
                black_box(Some(&overrides)),
                &active,
            )
        });
    });

    let merged = merge_resources(&defaults.resources, Some(&overrides), &active);
    group.bench_function("total_peer_resources", |b| {
        b.iter(|| total_resources(black_box(merged.values())));
    });

    group.finish();
}

fn bench_merge_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("spec_merge");
    group.throughput(Throughput::Elements(1));

    let base = json!({
        "peer": {"gossip": {"bootstrap": "peer0:7051", "useLeaderElection": true}},
        "chaincode": {"startuptimeout": "300s", "executetimeout": "30s"},
        "ledger": {"state": {"stateDatabase": "CouchDB"}}
    });
    let patch = json!({
        "peer": {"gossip": {"useLeaderElection": null, "orgLeader": true}},
        "chaincode": {"executetimeout": "60s"}
    });

    group.bench_function("merge_config_override", |b| {
        b.iter(|| {
            let mut target = base.clone();
            merge_json(&mut target, black_box(&patch));
            target
        });
    });

    group.finish();
}

criterion_group!(benches, bench_merge_resources, bench_merge_json);
criterion_main!(benches);
