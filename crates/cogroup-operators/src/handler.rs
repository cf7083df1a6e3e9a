//! Group handler capability and the values handed to it.

use std::fmt;
use std::sync::Arc;

use cogroup_core::error::{Error, Result};
use cogroup_core::id::PartitionId;
use cogroup_core::types::{Tuple, Value};
use cogroup_planner::{GroupingPlan, Slot};

use crate::stream::SortedGroups;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// What a handler gets to know about the worker it runs in.
#[derive(Debug, Clone)]
pub struct GroupContext {
    plan: Arc<GroupingPlan>,
    partition: PartitionId,
}

impl GroupContext {
    pub fn new(plan: Arc<GroupingPlan>, partition: PartitionId) -> Self {
        Self { plan, partition }
    }

    pub fn plan(&self) -> &Arc<GroupingPlan> {
        &self.plan
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }
}

/// Read-only view of a group's key tuple restricted to the group-by fields.
#[derive(Debug, Clone)]
pub struct GroupKey {
    tuple: Tuple,
    positions: Vec<usize>,
    plan: Arc<GroupingPlan>,
}

impl GroupKey {
    pub fn new(plan: Arc<GroupingPlan>, tuple: Tuple) -> Result<Self> {
        let source = plan.source_for_schema(&tuple.schema().name)?;
        let positions = source.common_translation[..plan.group_by().len()]
            .iter()
            .map(|slot| match slot {
                Slot::Field(p) => Ok(*p),
                Slot::SourceId => Err(Error::Invariant(
                    "group-by prefix contains the source id".into(),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            tuple,
            positions,
            plan,
        })
    }

    /// Number of group-by fields.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn field_name(&self, depth: usize) -> Option<&str> {
        self.plan.group_by().get(depth).map(String::as_str)
    }

    /// Value of the group-by field at `depth`.
    pub fn get(&self, depth: usize) -> Option<&Value> {
        self.positions.get(depth).and_then(|p| self.tuple.get(*p))
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let depth = self.plan.group_by().iter().position(|g| g == name)?;
        self.get(depth)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.positions.iter().filter_map(|p| self.tuple.get(*p))
    }

    /// Name of the source schema the key tuple came from.
    pub fn source_name(&self) -> &str {
        &self.tuple.schema().name
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.values().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}

/// Single-pass iterator over the detail tuples of the current group.
pub struct GroupElements<'a> {
    input: &'a mut dyn SortedGroups,
    done: bool,
    yielded: u64,
}

impl<'a> GroupElements<'a> {
    pub(crate) fn new(input: &'a mut dyn SortedGroups) -> Self {
        Self {
            input,
            done: false,
            yielded: 0,
        }
    }

    /// Tuples handed out so far, including drained ones.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Consume whatever the handler left behind; returns how many were skipped.
    pub(crate) fn drain(&mut self) -> Result<u64> {
        let mut skipped = 0;
        while let Some(t) = self.next() {
            t?;
            skipped += 1;
        }
        Ok(skipped)
    }
}

impl Iterator for GroupElements<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.input.next_value() {
            Ok(Some(t)) => {
                self.yielded += 1;
                Some(Ok(t))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// User callbacks driven by the rollup engine. Selected by name through
/// [`crate::registry::Registry`].
pub trait GroupHandler: Send {
    fn setup(&mut self, _ctx: &GroupContext) -> HandlerResult {
        Ok(())
    }

    fn on_open_group(&mut self, _depth: usize, _field: &str, _key: &GroupKey) -> HandlerResult {
        Ok(())
    }

    fn on_close_group(&mut self, _depth: usize, _field: &str, _key: &GroupKey) -> HandlerResult {
        Ok(())
    }

    /// Called once per leaf group. Elements not consumed here are skipped by
    /// the engine afterwards.
    fn on_group_elements(&mut self, key: &GroupKey, elements: &mut GroupElements<'_>)
        -> HandlerResult;

    fn cleanup(&mut self, _ctx: &GroupContext) -> HandlerResult {
        Ok(())
    }
}
