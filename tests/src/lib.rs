//! # Verifiable Log Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (append, proofs)
//! └── src/integration/  # Cross-crate flows
//!     ├── e2e.rs          # Client view: queue, sequence, verify
//!     ├── concurrency.rs  # Parallel submitters and sequencers
//!     └── persistence.rs  # File-backed restart and recovery
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p log-tests
//! cargo test -p log-tests integration::concurrency
//! cargo bench -p log-tests
//! ```

#![allow(dead_code)]

pub mod integration;
