//! Convenient re-exports for downstream crates.

pub use crate::config::{GroupingConfig, RuntimeConfig};
pub use crate::error::{Error, Result};
pub use crate::hash::Hash256;
pub use crate::id::{PartitionId, SourceId};
pub use crate::schema::{DataType, EnumType, Field, Schema, SourceSchema, SOURCE_ID_FIELD};
pub use crate::sort::{Order, SortElement, SortSpec};
pub use crate::types::{EnumValue, Tuple, Value};
