#![forbid(unsafe_code)]
//! cogroup-exec: local runner and metrics hook.
//!
//! The runner partitions records on the rollup prefix of their group key,
//! sorts each partition by the byte comparator and walks it with one rollup
//! engine and one handler per partition. Partitions run one after another.

pub mod metrics;
pub mod partition;
pub mod runtime;

pub use partition::Partitioner;
pub use runtime::{ExecError, LocalRunner, PartitionSummary, RunSummary};
