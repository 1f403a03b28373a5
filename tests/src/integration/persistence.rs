//! # Persistence Tests
//!
//! File-backed storage across restarts: roots, leaves, pending queue and
//! tree nodes must all come back exactly as committed.

#[cfg(test)]
mod tests {
    use crate::integration::{make_log, make_service};
    use log_node::{LogNode, NodeConfig, StorageBackend};
    use merkle_log::domain::errors::KVStoreError;
    use merkle_log::{
        verify_consistency, verify_signed_root, FileBackedKVStore, LogApi, LogConfig, LogLeaf,
        TreeMode, TreeState,
    };
    use std::path::Path;

    fn open(path: &Path) -> FileBackedKVStore {
        FileBackedKVStore::open(path).unwrap()
    }

    #[tokio::test]
    async fn test_log_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.db");

        let (log_id, old_root) = {
            let service = make_service(open(&path), LogConfig::for_testing());
            let log_id = make_log(&service, TreeMode::Log).await;
            let leaves = (0..11u8).map(|i| LogLeaf::new(vec![i])).collect();
            service.queue_leaves(log_id, leaves).await.unwrap();
            service.sequencer().sequence(log_id).unwrap();
            let root = service.get_latest_signed_log_root(log_id, 0).await.unwrap();
            (log_id, root.signed_log_root)
        };

        let service = make_service(open(&path), LogConfig::for_testing());
        let reloaded = service.get_latest_signed_log_root(log_id, 0).await.unwrap();
        assert_eq!(reloaded.signed_log_root, old_root);
        assert!(verify_signed_root(&service.public_key(), &reloaded.signed_log_root).is_ok());

        // Duplicates are still recognised after the restart
        let again = service
            .queue_leaf(log_id, LogLeaf::new(vec![4]))
            .await
            .unwrap();
        assert_eq!(again.leaf.leaf_index, Some(4));

        let more = (11..20u8).map(|i| LogLeaf::new(vec![i])).collect();
        service.queue_leaves(log_id, more).await.unwrap();
        service.sequencer().sequence(log_id).unwrap();

        let latest = service.get_latest_signed_log_root(log_id, 11).await.unwrap();
        assert_eq!(latest.signed_log_root.tree_size(), 20);
        verify_consistency(
            11,
            20,
            &latest.proof.unwrap().hashes,
            old_root.root_hash(),
            latest.signed_log_root.root_hash(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_pending_queue_and_tree_state_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.db");

        let (queued_log, frozen_log) = {
            let service = make_service(open(&path), LogConfig::for_testing());
            let queued_log = make_log(&service, TreeMode::Log).await;
            let frozen_log = make_log(&service, TreeMode::Log).await;
            service
                .queue_leaves(queued_log, vec![LogLeaf::new(b"waiting".to_vec())])
                .await
                .unwrap();
            service
                .set_tree_state(frozen_log, TreeState::Frozen)
                .await
                .unwrap();
            (queued_log, frozen_log)
        };

        let service = make_service(open(&path), LogConfig::for_testing());
        assert!(service.get_tree(frozen_log).await.unwrap().is_frozen());
        assert_eq!(service.get_sequenced_leaf_count(queued_log).await.unwrap(), 0);

        let outcomes = service.sequencer().sequence_all().unwrap();
        assert_eq!(outcomes.len(), 1);
        let leaves = service.get_leaves_by_index(queued_log, &[0]).await.unwrap();
        assert_eq!(leaves[0].leaf_value, b"waiting".to_vec());

        // Fresh ids continue after the stored ones
        let next = service.create_tree(TreeMode::Log, "later").await.unwrap();
        assert!(next.log_id > frozen_log);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.db");
        // Declares a 255-byte key but ends immediately
        std::fs::write(&path, [0xff, 0x00, 0x00, 0x00, 0x01]).unwrap();

        assert!(matches!(
            FileBackedKVStore::open(&path),
            Err(KVStoreError::CorruptionError { .. })
        ));
    }

    #[tokio::test]
    async fn test_node_restart_on_same_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            data_dir: dir.path().to_path_buf(),
            storage: StorageBackend::File,
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            sequence_interval_ms: 10,
            signing_key: "42".repeat(32),
            dev_mode: false,
            log: LogConfig::for_testing(),
        };

        let log_id = {
            let node = LogNode::new(config.clone()).unwrap();
            let service = node.service();
            let log_id = make_log(service.as_ref(), TreeMode::Log).await;
            service
                .queue_leaves(log_id, vec![LogLeaf::new(b"persisted".to_vec())])
                .await
                .unwrap();
            let stats = node.run_round().await.unwrap();
            assert_eq!(stats.leaves_integrated, 1);
            log_id
        };

        // Dropping the node released the lease
        let node = LogNode::new(config).unwrap();
        let count = node
            .service()
            .get_sequenced_leaf_count(log_id)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
