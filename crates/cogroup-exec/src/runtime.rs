//! Local runner: stands in for the distributed shuffle on one machine.
//!
//! Steps per run:
//! - serialize every tuple with the plan's layout;
//! - hash-partition on the rollup prefix of its group key;
//! - sort each partition with the byte comparator;
//! - group each partition with the group comparator and walk it with a
//!   rollup engine driving one handler per partition.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use cogroup_codec::{field_codec_for, ObjectCodecs, TupleDeserializer, TupleSerializer};
use cogroup_core::config::{GroupingConfig, RuntimeConfig};
use cogroup_core::error::Error;
use cogroup_core::id::PartitionId;
use cogroup_core::types::Tuple;
use cogroup_operators::{
    ComparatorRegistry, GroupContext, GroupHandler, GroupedTuples, Registry, RollupEngine,
    RollupError, RollupStats, SortComparator,
};
use cogroup_planner::GroupingPlan;

use crate::metrics::emit_span;
use crate::partition::Partitioner;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("handler registry: {0}")]
    Registry(String),

    #[error(transparent)]
    Engine(#[from] Error),

    #[error("partition {partition}: {source}")]
    Rollup {
        partition: PartitionId,
        #[source]
        source: RollupError,
    },

    #[error("summary serialization: {0}")]
    Summary(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionSummary {
    pub partition: PartitionId,
    pub records: u64,
    pub bytes: u64,
    pub rollup: RollupStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Hex fingerprint of the plan's configuration.
    pub fingerprint: String,
    pub records: u64,
    pub partitions: Vec<PartitionSummary>,
}

impl RunSummary {
    pub fn groups(&self) -> u64 {
        self.partitions.iter().map(|p| p.rollup.groups).sum()
    }

    pub fn to_json(&self) -> Result<String, ExecError> {
        serde_json::to_string(self).map_err(|e| ExecError::Summary(e.to_string()))
    }
}

pub struct LocalRunner {
    plan: Arc<GroupingPlan>,
    runtime: RuntimeConfig,
    serializer: TupleSerializer,
    deserializer: TupleDeserializer,
    sort: SortComparator,
    partitioner: Partitioner,
    handlers: Registry,
}

impl LocalRunner {
    /// Build the plan and every shared run-time object. All configuration
    /// errors surface here, before any record is read.
    pub fn new(
        config: GroupingConfig,
        runtime: RuntimeConfig,
        comparators: &ComparatorRegistry,
        objects: ObjectCodecs,
        handlers: Registry,
    ) -> Result<Self, ExecError> {
        let plan = Arc::new(GroupingPlan::build(config)?);
        if let Some(key) = &plan.config().handler {
            if !handlers.contains(key) {
                return Err(ExecError::Registry(format!("unknown handler key '{key}'")));
            }
        }

        let codec = Arc::new(field_codec_for(
            &plan,
            Arc::new(objects),
            runtime.max_field_bytes,
        )?);
        let sort = SortComparator::new(plan.clone(), codec.clone(), comparators)?;
        let partitioner =
            Partitioner::new(plan.clone(), codec.clone(), runtime.num_partitions, runtime.seed)?;

        Ok(Self {
            serializer: TupleSerializer::new(plan.clone(), codec.clone()),
            deserializer: TupleDeserializer::new(plan.clone(), codec),
            plan,
            runtime,
            sort,
            partitioner,
            handlers,
        })
    }

    pub fn plan(&self) -> &Arc<GroupingPlan> {
        &self.plan
    }

    pub fn serializer(&self) -> &TupleSerializer {
        &self.serializer
    }

    pub fn deserializer(&self) -> &TupleDeserializer {
        &self.deserializer
    }

    pub fn sort_comparator(&self) -> &SortComparator {
        &self.sort
    }

    /// Run with a fresh instance of the handler named by the configuration for
    /// every partition.
    pub fn run<I>(&self, tuples: I) -> Result<RunSummary, ExecError>
    where
        I: IntoIterator<Item = Tuple>,
    {
        let key = self
            .plan
            .config()
            .handler
            .clone()
            .ok_or_else(|| ExecError::Registry("configuration names no handler".into()))?;
        self.run_with(tuples, |_| {
            self.handlers
                .make(&key)
                .ok_or_else(|| ExecError::Registry(format!("unknown handler key '{key}'")))
        })
    }

    /// Run with handlers produced by `make_handler`, one per partition.
    pub fn run_with<I, F>(&self, tuples: I, mut make_handler: F) -> Result<RunSummary, ExecError>
    where
        I: IntoIterator<Item = Tuple>,
        F: FnMut(PartitionId) -> Result<Box<dyn GroupHandler>, ExecError>,
    {
        let (records, partitions) = self.partition(tuples)?;
        let mut summaries = Vec::with_capacity(partitions.len());
        for (i, part) in partitions.into_iter().enumerate() {
            let pid = PartitionId::new(i as u32);
            let mut handler = make_handler(pid)?;
            summaries.push(self.walk_partition(pid, part, handler.as_mut())?);
        }
        Ok(self.summary(records, summaries))
    }

    /// Run every partition, in partition order, through the same `handler`.
    pub fn run_into<I>(&self, tuples: I, handler: &mut dyn GroupHandler) -> Result<RunSummary, ExecError>
    where
        I: IntoIterator<Item = Tuple>,
    {
        let (records, partitions) = self.partition(tuples)?;
        let mut summaries = Vec::with_capacity(partitions.len());
        for (i, part) in partitions.into_iter().enumerate() {
            summaries.push(self.walk_partition(PartitionId::new(i as u32), part, handler)?);
        }
        Ok(self.summary(records, summaries))
    }

    fn partition<I>(&self, tuples: I) -> Result<(u64, Vec<Vec<Vec<u8>>>), ExecError>
    where
        I: IntoIterator<Item = Tuple>,
    {
        let mut partitions = vec![Vec::new(); self.partitioner.num_partitions()];
        let mut scratch = Vec::with_capacity(self.runtime.scratch_capacity);
        let mut key_buf = Vec::with_capacity(self.runtime.scratch_capacity);
        let mut records = 0u64;

        for tuple in tuples {
            let pid = self
                .partitioner
                .partition_of(&tuple, &mut scratch, &mut key_buf)?;
            let mut out = Vec::new();
            self.serializer.serialize(&tuple, &mut scratch, &mut out)?;
            partitions[pid.get() as usize].push(out);
            records += 1;
        }
        Ok((records, partitions))
    }

    fn walk_partition(
        &self,
        pid: PartitionId,
        mut records: Vec<Vec<u8>>,
        handler: &mut dyn GroupHandler,
    ) -> Result<PartitionSummary, ExecError> {
        let mut failure = None;
        records.sort_by(|a, b| match self.sort.compare_bytes(a, b) {
            Ok(ord) => ord,
            Err(e) => {
                failure.get_or_insert(e);
                Ordering::Equal
            }
        });
        if let Some(e) = failure {
            return Err(e.into());
        }
        let bytes: u64 = records.iter().map(|r| r.len() as u64).sum();

        #[cfg(feature = "tracing")]
        tracing::debug!(partition = %pid, records = records.len(), bytes, "partition sorted");

        let group = self.sort.group_comparator();
        let mut input = GroupedTuples::new(
            records.iter().map(|r| self.deserializer.deserialize(r)),
            group.clone(),
        );
        let ctx = GroupContext::new(self.plan.clone(), pid);
        let rollup = RollupEngine::new(group)
            .run(&mut input, handler, &ctx)
            .map_err(|source| ExecError::Rollup {
                partition: pid,
                source,
            })?;

        emit_span(
            "partition_done",
            &[
                ("partition", pid.get().to_string()),
                ("records", records.len().to_string()),
                ("groups", rollup.groups.to_string()),
            ],
        );

        Ok(PartitionSummary {
            partition: pid,
            records: records.len() as u64,
            bytes,
            rollup,
        })
    }

    fn summary(&self, records: u64, partitions: Vec<PartitionSummary>) -> RunSummary {
        let summary = RunSummary {
            fingerprint: self.plan.fingerprint().to_hex(),
            records,
            partitions,
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            records = summary.records,
            partitions = summary.partitions.len(),
            groups = summary.groups(),
            fingerprint = %summary.fingerprint,
            "run finished"
        );

        summary
    }
}
