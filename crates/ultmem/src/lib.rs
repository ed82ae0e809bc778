//! ultmem - tiered memory storage with hybrid retrieval
//!
//! Memories are stored across three tiers (an in-process L0, a per-file L1
//! and an L2 archive directory), addressed through an `ult://` namespace,
//! and retrieved by merging hash-vector similarity with keyword search. A
//! lightweight knowledge graph built from extracted entities supports
//! bounded multi-hop reasoning.
//!
//! [`UltMemory`] is the entry point.

pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod knowledge;
pub mod logging;
pub mod memory;
pub mod namespace;
pub mod storage;
pub mod testing;

pub use config::Config;
pub use engine::{AddOptions, UltMemory};
pub use error::{Result, UltError};
