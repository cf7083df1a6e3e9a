//! Pull contract over a sorted, grouped stream, plus an adapter building one
//! from any sorted tuple iterator.

use std::cmp::Ordering;

use cogroup_core::error::{Error, Result};
use cogroup_core::types::Tuple;

use crate::compare::GroupComparator;

/// A stream sorted by the sort comparator and split into groups by the group
/// comparator.
///
/// `next_key` may only be called before the first group or once `next_value`
/// has returned `None` for the current group.
pub trait SortedGroups {
    /// Advance to the next group and return its key tuple (the group's first
    /// tuple); `None` when the stream is exhausted.
    fn next_key(&mut self) -> Result<Option<Tuple>>;

    /// Next detail tuple of the current group; `None` at the group's end.
    fn next_value(&mut self) -> Result<Option<Tuple>>;
}

/// Groups a sorted tuple iterator on the fly with one tuple of look-ahead.
pub struct GroupedTuples<I> {
    inner: I,
    group: GroupComparator,
    key: Option<Tuple>,
    pending: Option<Tuple>,
    in_group: bool,
    exhausted: bool,
}

impl<I> GroupedTuples<I>
where
    I: Iterator<Item = Result<Tuple>>,
{
    pub fn new(inner: I, group: GroupComparator) -> Self {
        Self {
            inner,
            group,
            key: None,
            pending: None,
            in_group: false,
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        if self.pending.is_none() && !self.exhausted {
            match self.inner.next().transpose()? {
                Some(t) => self.pending = Some(t),
                None => self.exhausted = true,
            }
        }
        Ok(())
    }
}

impl<I> SortedGroups for GroupedTuples<I>
where
    I: Iterator<Item = Result<Tuple>>,
{
    fn next_key(&mut self) -> Result<Option<Tuple>> {
        if self.in_group {
            return Err(Error::Invariant(
                "next_key called before the current group was drained".into(),
            ));
        }
        self.fill()?;
        let Some(first) = &self.pending else {
            self.key = None;
            return Ok(None);
        };
        if let Some(prev) = &self.key {
            if self.group.compare(prev, first)? == Ordering::Greater {
                return Err(Error::Invariant(format!(
                    "input is not sorted: group {first} follows {prev}"
                )));
            }
        }
        self.key = Some(first.clone());
        self.in_group = true;
        Ok(self.key.clone())
    }

    fn next_value(&mut self) -> Result<Option<Tuple>> {
        if !self.in_group {
            return Ok(None);
        }
        self.fill()?;
        let same_group = match (&self.key, &self.pending) {
            (Some(key), Some(next)) => self.group.compare(key, next)? == Ordering::Equal,
            _ => false,
        };
        if same_group {
            Ok(self.pending.take())
        } else {
            self.in_group = false;
            Ok(None)
        }
    }
}
