//! # Merkle Log Benchmarks
//!
//! | Area | Operation | Expectation |
//! |------|-----------|-------------|
//! | Tree building | append a batch to an existing tree | O(batch + log n) hashes |
//! | Proofs | inclusion / consistency generation | O(log n) node reads |
//! | Verification | client-side proof checks | O(log n) hashes |
//! | Sequencing | one full round through the service | dominated by hashing + commit |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use merkle_log::algorithms::{leaf_hash, ProofComputer, TreeBuilder};
use merkle_log::{
    verify_consistency, verify_inclusion, Ed25519LogSigner, Hash, InMemoryKVStore, LogApi,
    LogConfig, LogLeaf, LogService, ManualTimeSource, NodeId, Timestamp, TreeMode,
};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn random_leaves(n: usize) -> Vec<Hash> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| {
            let value: [u8; 32] = rng.gen();
            leaf_hash(&value)
        })
        .collect()
}

fn committed_tree(leaves: &[Hash]) -> HashMap<NodeId, Hash> {
    let empty: HashMap<NodeId, Hash> = HashMap::new();
    let mut builder = TreeBuilder::new(&empty);
    builder
        .extend(0, leaves)
        .expect("tree builds")
        .into_iter()
        .collect()
}

// ============================================================================
// Tree building
// ============================================================================

fn bench_tree_extend(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree-extend");
    let base = committed_tree(&random_leaves(10_000));

    for batch in [1usize, 64, 1024] {
        let leaves = random_leaves(batch);
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("append", batch), &leaves, |b, leaves| {
            b.iter(|| {
                let mut builder = TreeBuilder::new(&base);
                let created = builder.extend(10_000, leaves).expect("extend");
                black_box(builder.root_at(10_000 + leaves.len() as u64).expect("root"));
                black_box(created.len())
            })
        });
    }

    group.finish();
}

// ============================================================================
// Proof generation and verification
// ============================================================================

fn bench_proofs(c: &mut Criterion) {
    let mut group = c.benchmark_group("proofs");
    group.measurement_time(Duration::from_secs(5));

    for size in [1_000u64, 100_000] {
        let leaves = random_leaves(size as usize);
        let nodes = committed_tree(&leaves);
        let builder = TreeBuilder::new(&nodes);
        let root = builder.root_at(size).expect("root");
        let proofs = ProofComputer::new(&builder);

        let index = size / 3;
        group.bench_with_input(BenchmarkId::new("inclusion", size), &size, |b, &size| {
            b.iter(|| black_box(proofs.inclusion_proof(index, size, size).expect("proof")))
        });

        let first = size / 2 + 1;
        group.bench_with_input(BenchmarkId::new("consistency", size), &size, |b, &size| {
            b.iter(|| black_box(proofs.consistency_proof(first, size, size).expect("proof")))
        });

        let inclusion = proofs.inclusion_proof(index, size, size).expect("proof");
        let leaf = leaves[index as usize];
        group.bench_with_input(BenchmarkId::new("verify-inclusion", size), &size, |b, &size| {
            b.iter(|| black_box(verify_inclusion(index, size, &leaf, &inclusion.hashes, &root).is_ok()))
        });

        let old_root = builder.root_at(first).expect("root");
        let consistency = proofs.consistency_proof(first, size, size).expect("proof");
        group.bench_with_input(BenchmarkId::new("verify-consistency", size), &size, |b, &size| {
            b.iter(|| {
                black_box(
                    verify_consistency(first, size, &consistency.hashes, &old_root, &root).is_ok(),
                )
            })
        });
    }

    group.finish();
}

// ============================================================================
// Sequencing through the service
// ============================================================================

fn bench_sequencing_round(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("sequencing");
    group.sample_size(20);

    for batch in [16usize, 256] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_function(BenchmarkId::new("queue-and-sequence", batch), |b| {
            let mut config = LogConfig::default();
            config.sequencer_batch_size = batch;
            let service = LogService::new(
                InMemoryKVStore::new(),
                Arc::new(Ed25519LogSigner::from_seed([7u8; 32])),
                Arc::new(ManualTimeSource::new(Timestamp::from_secs(1_700_000_000))),
                config,
            );
            let log_id = runtime.block_on(async {
                let tree = service.create_tree(TreeMode::Log, "bench").await.expect("tree");
                service.init_log(tree.log_id).await.expect("init");
                tree.log_id
            });

            let mut counter = 0u64;
            b.iter(|| {
                let leaves: Vec<LogLeaf> = (0..batch)
                    .map(|_| {
                        counter += 1;
                        LogLeaf::new(counter.to_be_bytes().to_vec())
                    })
                    .collect();
                runtime
                    .block_on(service.queue_leaves(log_id, leaves))
                    .expect("queue");
                black_box(service.sequencer().sequence(log_id).expect("sequence"))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tree_extend, bench_proofs, bench_sequencing_round);
criterion_main!(benches);
