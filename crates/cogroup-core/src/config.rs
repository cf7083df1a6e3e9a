//! Configuration surfaces that downstream crates can serialize/deserialize.
//!
//! `GroupingConfig` is the user-facing description of a co-grouping job. It is
//! plain data; `cogroup-planner` validates it and derives the wire layout.
//! `RuntimeConfig` carries per-worker knobs and can be read from the environment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::id::SourceId;
use crate::schema::{Schema, SourceSchema};
use crate::sort::SortSpec;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Per-source schemas; ids and schema names must be unique.
    pub sources: Vec<SourceSchema>,

    /// Common sort order shared by every source.
    pub order_by: SortSpec,

    /// Optional per-source secondary orders over fields outside the common order.
    #[serde(default)]
    pub secondary_order_by: BTreeMap<SourceId, SortSpec>,

    /// Group boundaries; must be a prefix of `order_by`.
    pub group_by: Vec<String>,

    /// Shallowest group-by field this job opens/closes rollup groups for.
    #[serde(default)]
    pub rollup_from: Option<String>,

    /// Registry key of the group handler to instantiate per worker.
    #[serde(default)]
    pub handler: Option<String>,
}

impl GroupingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, id: SourceId, schema: Schema) -> Self {
        self.sources.push(SourceSchema::new(id, schema));
        self
    }

    pub fn with_order_by(mut self, spec: SortSpec) -> Self {
        self.order_by = spec;
        self
    }

    pub fn with_secondary_order_by(mut self, id: SourceId, spec: SortSpec) -> Self {
        self.secondary_order_by.insert(id, spec);
        self
    }

    pub fn with_group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rollup_from(mut self, field: impl Into<String>) -> Self {
        self.rollup_from = Some(field.into());
        self
    }

    pub fn with_handler(mut self, key: impl Into<String>) -> Self {
        self.handler = Some(key.into());
        self
    }

    pub fn source(&self, id: SourceId) -> Option<&SourceSchema> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn source_by_name(&self, name: &str) -> Option<&SourceSchema> {
        self.sources.iter().find(|s| s.schema.name == name)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of disjoint key-range partitions the local runner splits work into.
    pub num_partitions: usize,

    /// Initial capacity of per-worker scratch/output buffers.
    pub scratch_capacity: usize,

    /// Upper bound on a single decoded string/object length; guards against corrupt input.
    pub max_field_bytes: usize,

    /// Optional seed mixed into partition hashing.
    pub seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_partitions: 1,
            scratch_capacity: 4 * 1024,
            max_field_bytes: 64 * 1024 * 1024, // 64 MiB sanity limit
            seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `COGROUP_NUM_PARTITIONS`: number of partitions (min 1)
    /// - `COGROUP_SCRATCH_CAPACITY`: initial scratch buffer capacity in bytes
    /// - `COGROUP_MAX_FIELD_BYTES`: max decoded string/object length
    /// - `COGROUP_SEED`: partition hashing seed
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("COGROUP_NUM_PARTITIONS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.num_partitions = v.max(1);
            }
        }

        if let Ok(s) = std::env::var("COGROUP_SCRATCH_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.scratch_capacity = v;
            }
        }

        if let Ok(s) = std::env::var("COGROUP_MAX_FIELD_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_field_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("COGROUP_SEED") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.seed = Some(v);
            }
        }

        cfg
    }

    pub fn with_partitions(mut self, n: usize) -> Self {
        self.num_partitions = n.max(1);
        self
    }
}
