#![forbid(unsafe_code)]
//! cogroup-planner: per-source schemas + sort order → `GroupingPlan`.
//!
//! Design:
//! - `projector` is a pure function from a `GroupingConfig` to the common and
//!   specific schemas. It fails fast on every configuration error.
//! - `plan` adds what the run-time crates need on top: index translations from
//!   each source schema into the derived layouts, resolved comparison criteria,
//!   rollup depths and a config fingerprint.
//!
//! The codec and comparator crates take an `Arc<GroupingPlan>` and never look at
//! the raw config again.

pub mod plan;
pub mod projector;

pub use plan::{Criterion, GroupingPlan, Slot, SourcePlan};
pub use projector::{project, Projection, COMMON_SCHEMA_NAME};
