//! Hash partitioning on the rollup prefix of the group key.
//!
//! Every tuple whose group-by fields `0..=min_depth` are equal lands in the
//! same partition, so each partition can open and close its rollup groups on
//! its own.

use std::sync::Arc;

use cogroup_codec::FieldCodec;
use cogroup_core::error::{Error, Result};
use cogroup_core::hash::hash_seeded;
use cogroup_core::id::PartitionId;
use cogroup_core::types::Tuple;
use cogroup_planner::{GroupingPlan, Slot};

#[derive(Debug, Clone)]
pub struct Partitioner {
    plan: Arc<GroupingPlan>,
    codec: Arc<FieldCodec>,
    num_partitions: usize,
    seed: Option<u64>,
}

impl Partitioner {
    /// Fails when more than one partition is requested and a prefix field uses
    /// a custom comparator: values it deems equal may differ in bytes.
    pub fn new(
        plan: Arc<GroupingPlan>,
        codec: Arc<FieldCodec>,
        num_partitions: usize,
        seed: Option<u64>,
    ) -> Result<Self> {
        let num_partitions = num_partitions.max(1);
        if num_partitions > 1 {
            let prefix = &plan.common_criteria()[..=plan.min_depth()];
            if let Some(c) = prefix.iter().find(|c| c.comparator.is_some()) {
                return Err(Error::Config(format!(
                    "can't hash-partition on '{}': it uses custom comparator '{}'",
                    c.name,
                    c.comparator.as_deref().unwrap_or_default()
                )));
            }
        }
        Ok(Self {
            plan,
            codec,
            num_partitions,
            seed,
        })
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// Partition of `tuple`; `scratch` and `buf` are reused between calls.
    pub fn partition_of(
        &self,
        tuple: &Tuple,
        scratch: &mut Vec<u8>,
        buf: &mut Vec<u8>,
    ) -> Result<PartitionId> {
        if self.num_partitions == 1 {
            return Ok(PartitionId::new(0));
        }
        let source = self.plan.source_for_schema(&tuple.schema().name)?;
        buf.clear();
        for depth in 0..=self.plan.min_depth() {
            let Slot::Field(pos) = source.common_translation[depth] else {
                return Err(Error::Invariant("source id inside the group-by prefix".into()));
            };
            let field = &self.plan.common_schema().fields[depth];
            let value = tuple.get(pos).ok_or_else(|| {
                Error::Invariant(format!("tuple of '{}' has no position {pos}", source.name()))
            })?;
            self.codec.encode(field, value, scratch, buf)?;
        }
        let h = hash_seeded(self.seed, buf);
        Ok(PartitionId::new(
            (h.prefix_u64() % self.num_partitions as u64) as u32,
        ))
    }
}
