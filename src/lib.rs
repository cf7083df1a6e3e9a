#![forbid(unsafe_code)]
//! cogroup: co-group tuples of several sources by a shared key, sort them
//! within each group, and walk the groups with nested rollup events.
//!
//! The member crates are re-exported as is; [`prelude`] pulls in what a
//! typical job needs.

pub use cogroup_codec;
pub use cogroup_core;
pub use cogroup_exec;
pub use cogroup_operators;
pub use cogroup_planner;

pub mod prelude {
    pub use cogroup_codec::{ObjectCodec, ObjectCodecs, TupleDeserializer, TupleSerializer};
    pub use cogroup_core::prelude::*;
    pub use cogroup_exec::{ExecError, LocalRunner, RunSummary};
    pub use cogroup_operators::{
        ComparatorRegistry, GroupContext, GroupElements, GroupHandler, GroupKey, HandlerResult,
        Registry, RollupEngine, SortComparator,
    };
    pub use cogroup_planner::GroupingPlan;
}
