//! # End-to-End Log Tests
//!
//! A client that trusts nothing but the public key:
//!
//! ```text
//! [Submitter] ──QueueLeaves──→ [LogService] ──queue──→ [Sequencer]
//!                                                          │
//!                                                   SignedLogRoot
//!                                                          │
//! [Auditor] ←──proofs + roots──────────────────────────────┘
//!     verifies signature, consistency with its last root, inclusion
//! ```
//!
//! ## Test Categories
//!
//! 1. **Auditor Flow**: roots only ever extend what the auditor has seen
//! 2. **Mirror Log**: a PREORDERED_LOG copy reproduces the source roots
//! 3. **Wire Flow**: JSON requests through the handler

#[cfg(test)]
mod tests {
    use crate::integration::{make_log, make_service};
    use merkle_log::{
        verify_consistency, verify_inclusion, verify_signed_root, InMemoryKVStore, LogApi,
        LogConfig, LogLeaf, LogRequest, LogRequestHandler, LogResponse, SignedLogRoot,
        StatusCode, TreeMode,
    };
    use merkle_log::algorithms::hasher::leaf_hash;
    use std::sync::Arc;

    /// Client-side state: the last root it verified.
    struct Auditor {
        public_key: Vec<u8>,
        trusted: Option<SignedLogRoot>,
    }

    impl Auditor {
        fn accept(&mut self, root: SignedLogRoot, consistency: Option<&[[u8; 32]]>) {
            verify_signed_root(&self.public_key, &root).expect("root signature");
            if let Some(old) = &self.trusted {
                assert!(root.tree_size() >= old.tree_size());
                assert!(root.revision() >= old.revision());
                if old.tree_size() > 0 {
                    verify_consistency(
                        old.tree_size(),
                        root.tree_size(),
                        consistency.expect("consistency proof"),
                        old.root_hash(),
                        root.root_hash(),
                    )
                    .expect("consistency");
                }
            }
            self.trusted = Some(root);
        }
    }

    #[tokio::test]
    async fn test_two_leaf_log_walkthrough() {
        let service = make_service(InMemoryKVStore::new(), LogConfig::for_testing());
        let tree = service.create_tree(TreeMode::Log, "walkthrough").await.unwrap();
        let log_id = tree.log_id;

        let root0 = service.init_log(log_id).await.unwrap();
        assert_eq!(root0.tree_size(), 0);

        service
            .queue_leaf(log_id, LogLeaf::new(b"a".to_vec()))
            .await
            .unwrap();
        service.sequencer().sequence(log_id).unwrap();
        let root1 = service
            .get_latest_signed_log_root(log_id, 0)
            .await
            .unwrap()
            .signed_log_root;
        assert_eq!(root1.tree_size(), 1);

        service
            .queue_leaf(log_id, LogLeaf::new(b"b".to_vec()))
            .await
            .unwrap();
        service.sequencer().sequence(log_id).unwrap();
        let root2 = service
            .get_latest_signed_log_root(log_id, 0)
            .await
            .unwrap()
            .signed_log_root;
        assert_eq!(root2.tree_size(), 2);

        let consistency = service.get_consistency_proof(log_id, 1, 2).await.unwrap();
        assert_eq!(consistency.proof.hashes.len(), 1);
        verify_consistency(
            1,
            2,
            &consistency.proof.hashes,
            root1.root_hash(),
            root2.root_hash(),
        )
        .unwrap();

        let inclusion = service.get_inclusion_proof(log_id, 0, 2).await.unwrap();
        verify_inclusion(
            0,
            2,
            &leaf_hash(b"a"),
            &inclusion.proof.hashes,
            root2.root_hash(),
        )
        .unwrap();

        let public_key = service.public_key();
        verify_signed_root(&public_key, &root1).unwrap();
        verify_signed_root(&public_key, &root2).unwrap();
    }

    #[tokio::test]
    async fn test_auditor_follows_growing_log() {
        let service = make_service(InMemoryKVStore::new(), LogConfig::for_testing());
        let log_id = make_log(&service, TreeMode::Log).await;
        let mut auditor = Auditor {
            public_key: service.public_key(),
            trusted: None,
        };

        let mut written = Vec::new();
        for round in 0..6 {
            let batch: Vec<LogLeaf> = (0..round * 3 + 1)
                .map(|i| LogLeaf::new(format!("r{}-{}", round, i).into_bytes()))
                .collect();
            written.extend(batch.iter().map(|l| l.leaf_value.clone()));
            service.queue_leaves(log_id, batch).await.unwrap();
            service.sequencer().sequence(log_id).unwrap();

            let first = auditor.trusted.as_ref().map_or(0, |r| r.tree_size());
            let latest = service
                .get_latest_signed_log_root(log_id, first)
                .await
                .unwrap();
            let proof = latest.proof.as_ref().map(|p| p.hashes.as_slice());
            auditor.accept(latest.signed_log_root.clone(), proof);
        }

        let root = auditor.trusted.clone().unwrap();
        assert_eq!(root.tree_size(), written.len() as u64);

        for (index, value) in written.iter().enumerate() {
            let entry = service
                .get_entry_and_proof(log_id, index as u64, root.tree_size())
                .await
                .unwrap();
            assert_eq!(&entry.leaf.leaf_value, value);
            verify_inclusion(
                index as u64,
                root.tree_size(),
                &entry.leaf.merkle_leaf_hash,
                &entry.proof.hashes,
                root.root_hash(),
            )
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_historical_inclusion_against_old_root() {
        let service = make_service(InMemoryKVStore::new(), LogConfig::for_testing());
        let log_id = make_log(&service, TreeMode::Log).await;

        let first: Vec<LogLeaf> = (0..5).map(|i| LogLeaf::new(vec![b'a', i])).collect();
        service.queue_leaves(log_id, first).await.unwrap();
        service.sequencer().sequence(log_id).unwrap();
        let old_root = service.get_signed_root_at(log_id, 5).await.unwrap();

        let second: Vec<LogLeaf> = (0..9).map(|i| LogLeaf::new(vec![b'b', i])).collect();
        service.queue_leaves(log_id, second).await.unwrap();
        service.sequencer().sequence(log_id).unwrap();

        let result = service.get_inclusion_proof(log_id, 3, 5).await.unwrap();
        assert_eq!(result.signed_log_root.tree_size(), 14);
        verify_inclusion(
            3,
            5,
            &merkle_log::algorithms::leaf_hash(&[b'a', 3]),
            &result.proof.hashes,
            old_root.root_hash(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_preordered_mirror_reproduces_source_roots() {
        let service = make_service(InMemoryKVStore::new(), LogConfig::for_testing());
        let source = make_log(&service, TreeMode::Log).await;
        let mirror = make_log(&service, TreeMode::PreorderedLog).await;

        let values: Vec<Vec<u8>> = (0..23u8).map(|i| vec![i; (i as usize % 4) + 1]).collect();
        service
            .queue_leaves(source, values.iter().cloned().map(LogLeaf::new).collect())
            .await
            .unwrap();
        service.sequencer().sequence(source).unwrap();

        // Copy in two out-of-order batches; the second waits for the first
        let copied = service.get_leaves_by_range(source, 0, 23).await.unwrap();
        let to_mirror = |range: std::ops::Range<usize>| -> Vec<LogLeaf> {
            copied[range]
                .iter()
                .map(|l| {
                    LogLeaf::new(l.leaf_value.clone())
                        .with_index(l.leaf_index.unwrap())
                })
                .collect()
        };
        service.add_sequenced_leaves(mirror, to_mirror(10..23)).await.unwrap();
        service.sequencer().sequence(mirror).unwrap();
        assert_eq!(service.get_sequenced_leaf_count(mirror).await.unwrap(), 0);

        service.add_sequenced_leaves(mirror, to_mirror(0..10)).await.unwrap();
        service.sequencer().sequence(mirror).unwrap();

        let a = service.get_latest_signed_log_root(source, 0).await.unwrap();
        let b = service.get_latest_signed_log_root(mirror, 0).await.unwrap();
        assert_eq!(b.signed_log_root.tree_size(), 23);
        assert_eq!(a.signed_log_root.root_hash(), b.signed_log_root.root_hash());
    }

    #[tokio::test]
    async fn test_json_requests_through_handler() {
        let service = Arc::new(make_service(InMemoryKVStore::new(), LogConfig::for_testing()));
        let log_id = make_log(service.as_ref(), TreeMode::Log).await;
        let handler = LogRequestHandler::new(service.clone());

        let call = |json: String| {
            let handler = &handler;
            async move {
                let request: LogRequest = serde_json::from_str(&json).unwrap();
                let response = handler.handle(request).await;
                // Responses survive a JSON round trip
                let encoded = serde_json::to_string(&response).unwrap();
                let decoded: LogResponse = serde_json::from_str(&encoded).unwrap();
                assert_eq!(decoded, response);
                response
            }
        };

        let queued = call(format!(
            r#"{{"method":"queue_leaves","log_id":{},"leaves":[{{"leaf_value":[1,2,3]}}]}}"#,
            log_id.0
        ))
        .await;
        assert!(queued.is_ok());

        service.sequencer().sequence(log_id).unwrap();

        let proof = call(format!(
            r#"{{"method":"get_inclusion_proof","log_id":{},"leaf_index":0,"tree_size":1}}"#,
            log_id.0
        ))
        .await;
        assert!(proof.is_ok());

        let negative = call(format!(
            r#"{{"method":"get_entry_and_proof","log_id":{},"leaf_index":-1,"tree_size":1}}"#,
            log_id.0
        ))
        .await;
        assert_eq!(negative.status.code, StatusCode::InvalidArgument);

        let too_far = call(format!(
            r#"{{"method":"get_consistency_proof","log_id":{},"first_tree_size":1,"second_tree_size":2}}"#,
            log_id.0
        ))
        .await;
        assert_eq!(too_far.status.code, StatusCode::OutOfRange);
    }
}
