//! # Concurrency Tests
//!
//! Parallel submitters racing on shared identities while sequencers run.
//!
//! ## Invariants Checked
//!
//! - Each identity is integrated exactly once
//! - Indices are dense: `0..size` with no gaps or repeats
//! - Concurrent sequencing runs never fork the tree

#[cfg(test)]
mod tests {
    use crate::integration::{make_log, make_service};
    use merkle_log::{
        InMemoryKVStore, LogApi, LogConfig, LogLeaf, LogService, StatusCode, TreeMode,
    };
    use std::collections::HashSet;
    use std::sync::Arc;

    const SUBMITTERS: usize = 8;
    const VALUES_PER_SUBMITTER: usize = 40;
    const DISTINCT_VALUES: usize = 120;

    async fn drain(service: &LogService<InMemoryKVStore>, log_id: merkle_log::LogId) {
        loop {
            let outcome = service.sequencer().sequence(log_id).unwrap();
            if outcome.leaves_integrated == 0 && outcome.duplicates_collapsed == 0 {
                break;
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_submitters_integrate_each_identity_once() {
        let service = Arc::new(make_service(InMemoryKVStore::new(), LogConfig::for_testing()));
        let log_id = make_log(service.as_ref(), TreeMode::Log).await;

        let mut tasks = Vec::new();
        for submitter in 0..SUBMITTERS {
            let service = Arc::clone(&service);
            tasks.push(tokio::spawn(async move {
                let mut accepted = 0usize;
                for i in 0..VALUES_PER_SUBMITTER {
                    // Submitters overlap heavily on the same values
                    let value = (submitter * 17 + i * 3) % DISTINCT_VALUES;
                    let result = service
                        .queue_leaf(log_id, LogLeaf::new(format!("v{}", value).into_bytes()))
                        .await
                        .unwrap();
                    match result.status {
                        StatusCode::Ok => accepted += 1,
                        StatusCode::AlreadyExists => {}
                        other => panic!("unexpected status {:?}", other),
                    }
                    tokio::task::yield_now().await;
                }
                accepted
            }));
        }

        let sequencer = {
            let service = Arc::clone(&service);
            tokio::task::spawn_blocking(move || {
                for _ in 0..50 {
                    // Busy rounds are expected while another run holds the log
                    let _ = service.sequencer().try_sequence(log_id);
                    std::thread::yield_now();
                }
            })
        };

        let mut accepted = 0;
        for task in tasks {
            accepted += task.await.unwrap();
        }
        sequencer.await.unwrap();
        drain(&service, log_id).await;

        let size = service.get_sequenced_leaf_count(log_id).await.unwrap();
        assert_eq!(size as usize, accepted);

        // Reads are capped per request, so page through
        let mut leaves = Vec::new();
        while (leaves.len() as u64) < size {
            let page = service
                .get_leaves_by_range(log_id, leaves.len() as u64, size)
                .await
                .unwrap();
            assert!(!page.is_empty());
            leaves.extend(page);
        }
        assert_eq!(leaves.len() as u64, size);

        let mut identities = HashSet::new();
        for (i, leaf) in leaves.iter().enumerate() {
            assert_eq!(leaf.leaf_index, Some(i as u64));
            assert!(identities.insert(leaf.leaf_identity_hash), "identity integrated twice");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_sequencers_do_not_fork_the_tree() {
        let mut config = LogConfig::for_testing();
        config.sequencer_batch_size = 7;
        let service = Arc::new(make_service(InMemoryKVStore::new(), config));
        let log_id = make_log(service.as_ref(), TreeMode::Log).await;

        let leaves: Vec<LogLeaf> = (0..90u32)
            .map(|i| LogLeaf::new(i.to_be_bytes().to_vec()))
            .collect();
        service.queue_leaves(log_id, leaves).await.unwrap();

        let mut runners = Vec::new();
        for _ in 0..4 {
            let service = Arc::clone(&service);
            runners.push(tokio::task::spawn_blocking(move || {
                let mut integrated = 0usize;
                for _ in 0..20 {
                    integrated += service.sequencer().sequence(log_id).unwrap().leaves_integrated;
                }
                integrated
            }));
        }

        let mut integrated = 0;
        for runner in runners {
            integrated += runner.await.unwrap();
        }
        assert_eq!(integrated, 90);

        let latest = service.get_latest_signed_log_root(log_id, 0).await.unwrap();
        assert_eq!(latest.signed_log_root.tree_size(), 90);
        // 90 leaves in batches of 7: 13 growth rounds after the initial root
        assert_eq!(latest.signed_log_root.revision(), 13);

        // Every intermediate root is a prefix of the final one
        for size in [7u64, 14, 49, 84] {
            let old = service.get_signed_root_at(log_id, size).await.unwrap();
            let proof = service
                .get_consistency_proof(log_id, size, 90)
                .await
                .unwrap();
            merkle_log::verify_consistency(
                size,
                90,
                &proof.proof.hashes,
                old.root_hash(),
                latest.signed_log_root.root_hash(),
            )
            .unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_logs_sequence_independently() {
        let service = Arc::new(make_service(InMemoryKVStore::new(), LogConfig::for_testing()));
        let mut logs = Vec::new();
        for _ in 0..5 {
            logs.push(make_log(service.as_ref(), TreeMode::Log).await);
        }

        let mut tasks = Vec::new();
        for (n, log_id) in logs.iter().copied().enumerate() {
            let service = Arc::clone(&service);
            tasks.push(tokio::spawn(async move {
                let leaves = (0..=n).map(|i| LogLeaf::new(vec![n as u8, i as u8])).collect();
                service.queue_leaves(log_id, leaves).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let outcomes = service.sequencer().sequence_all().unwrap();
        assert_eq!(outcomes.len(), 5);
        for (n, log_id) in logs.iter().enumerate() {
            let size = service.get_sequenced_leaf_count(*log_id).await.unwrap();
            assert_eq!(size, n as u64 + 1);
        }
    }
}
