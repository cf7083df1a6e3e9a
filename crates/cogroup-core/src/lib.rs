#![forbid(unsafe_code)]
//! cogroup-core: the data model shared by every cogroup crate.
//!
//! Schemas, sort specifications, and configs are built once and then shared
//! read-only. Tuples and values are the per-record runtime types. No codec,
//! comparator, or IO logic lives here.

pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod prelude;
pub mod schema;
pub mod sort;
pub mod types;
