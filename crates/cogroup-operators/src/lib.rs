#![forbid(unsafe_code)]
//! cogroup-operators: everything that runs per record once a plan exists.
//!
//! - `compare`: sort/group comparators over tuples and over serialized records.
//! - `stream`: the `SortedGroups` pull contract and an adapter for sorted iterators.
//! - `handler`: the `GroupHandler` capability, group-key views and element iterators.
//! - `rollup`: the boundary engine emitting nested open/close events.
//! - `registry`: named custom comparators and handler factories.
//!
//! Synchronous and single-threaded per worker; comparators and registries are
//! immutable and can be shared across workers.

pub mod compare;
pub mod handler;
pub mod registry;
pub mod rollup;
pub mod stream;

pub use compare::{GroupComparator, SortComparator};
pub use handler::{
    GroupContext, GroupElements, GroupHandler, GroupKey, HandlerError, HandlerResult,
};
pub use registry::{ComparatorRegistry, FieldComparator, HandlerFactory, Registry};
pub use rollup::{RollupEngine, RollupError, RollupState, RollupStats};
pub use stream::{GroupedTuples, SortedGroups};
