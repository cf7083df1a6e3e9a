//! Rollup boundary engine.
//!
//! Walks a grouped stream once. For every new leaf group it finds the
//! shallowest group-by depth at which the key differs from the previous one,
//! closes the previous groups from the deepest level up to that depth, opens
//! the new ones back down, and hands the leaf's tuples to the handler.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use cogroup_core::error::Error;
use cogroup_planner::GroupingPlan;

use crate::compare::GroupComparator;
use crate::handler::{GroupContext, GroupElements, GroupHandler, GroupKey, HandlerError};
use crate::stream::SortedGroups;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupState {
    AwaitingFirstGroup,
    InGroup,
    Done,
}

#[derive(Debug, Error)]
pub enum RollupError {
    #[error("group handler failed: {0}")]
    Handler(#[source] HandlerError),

    #[error("grouped input failed: {0}")]
    Input(#[from] Error),

    #[error("rollup engine already finished")]
    Finished,
}

/// Counters of one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RollupStats {
    pub groups: u64,
    pub elements: u64,
    pub drained: u64,
    pub opened: u64,
    pub closed: u64,
}

pub struct RollupEngine {
    group: GroupComparator,
    min_depth: usize,
    max_depth: usize,
    state: RollupState,
    previous: Option<GroupKey>,
    stats: RollupStats,
}

impl RollupEngine {
    /// Depths come from the comparator's plan (rollup-from field and group-by length).
    pub fn new(group: GroupComparator) -> Self {
        let plan = group.plan();
        let (min_depth, max_depth) = (plan.min_depth(), plan.max_depth());
        Self {
            group,
            min_depth,
            max_depth,
            state: RollupState::AwaitingFirstGroup,
            previous: None,
            stats: RollupStats::default(),
        }
    }

    pub fn state(&self) -> RollupState {
        self.state
    }

    pub fn min_depth(&self) -> usize {
        self.min_depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn stats(&self) -> RollupStats {
        self.stats
    }

    fn plan(&self) -> Arc<GroupingPlan> {
        self.group.plan().clone()
    }

    /// Drive `handler` over the whole of `input`. Handler errors stop the walk
    /// and are returned as [`RollupError::Handler`].
    pub fn run(
        &mut self,
        input: &mut dyn SortedGroups,
        handler: &mut dyn GroupHandler,
        ctx: &GroupContext,
    ) -> Result<RollupStats, RollupError> {
        if self.state == RollupState::Done {
            return Err(RollupError::Finished);
        }
        handler.setup(ctx).map_err(RollupError::Handler)?;

        while let Some(tuple) = input.next_key()? {
            let key = GroupKey::new(self.plan(), tuple)?;
            self.on_key(key, input, handler)?;
        }
        self.finish(handler)?;

        handler.cleanup(ctx).map_err(RollupError::Handler)?;
        Ok(self.stats)
    }

    fn on_key(
        &mut self,
        key: GroupKey,
        input: &mut dyn SortedGroups,
        handler: &mut dyn GroupHandler,
    ) -> Result<(), RollupError> {
        let previous = self.previous.take();
        let mismatch = match (self.state, previous) {
            (RollupState::InGroup, Some(prev)) => {
                let mismatch = self.mismatch_depth(&prev, &key)?;
                for depth in (mismatch..=self.max_depth).rev() {
                    self.close(depth, &prev, handler)?;
                }
                mismatch
            }
            _ => {
                self.state = RollupState::InGroup;
                self.min_depth
            }
        };

        for depth in mismatch..=self.max_depth {
            let field = self.group.field_name(depth).to_string();
            #[cfg(feature = "tracing")]
            tracing::trace!(depth, field = %field, key = %key, "open group");
            handler
                .on_open_group(depth, &field, &key)
                .map_err(RollupError::Handler)?;
            self.stats.opened += 1;
        }

        let mut elements = GroupElements::new(input);
        handler
            .on_group_elements(&key, &mut elements)
            .map_err(RollupError::Handler)?;
        let drained = elements.drain()?;
        self.stats.groups += 1;
        self.stats.elements += elements.yielded();
        self.stats.drained += drained;

        self.previous = Some(key);
        Ok(())
    }

    fn finish(&mut self, handler: &mut dyn GroupHandler) -> Result<(), RollupError> {
        if let Some(prev) = self.previous.take() {
            for depth in (self.min_depth..=self.max_depth).rev() {
                self.close(depth, &prev, handler)?;
            }
        }
        self.state = RollupState::Done;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            groups = self.stats.groups,
            elements = self.stats.elements,
            drained = self.stats.drained,
            "rollup finished"
        );
        Ok(())
    }

    fn close(
        &mut self,
        depth: usize,
        key: &GroupKey,
        handler: &mut dyn GroupHandler,
    ) -> Result<(), RollupError> {
        let field = self.group.field_name(depth).to_string();
        #[cfg(feature = "tracing")]
        tracing::trace!(depth, field = %field, key = %key, "close group");
        handler
            .on_close_group(depth, &field, key)
            .map_err(RollupError::Handler)?;
        self.stats.closed += 1;
        Ok(())
    }

    /// Shallowest depth where the keys differ, raised to `min_depth`: a change
    /// above the rollup range still closes and reopens every rolled-up level.
    /// `max_depth + 1` when no depth differs, which leaves only the leaf.
    fn mismatch_depth(&self, prev: &GroupKey, key: &GroupKey) -> Result<usize, RollupError> {
        for depth in 0..=self.max_depth {
            let (a, b) = match (prev.get(depth), key.get(depth)) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(Error::Invariant(format!("group key lacks depth {depth}")).into())
                }
            };
            if !self.group.field_eq(depth, a, b)? {
                return Ok(depth.max(self.min_depth));
            }
        }
        Ok(self.max_depth + 1)
    }
}
