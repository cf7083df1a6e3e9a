//! Sort and group comparators.
//!
//! Both work on typed tuples (`compare`) and on serialized records
//! (`compare_bytes`), and the two paths always agree in sign. The byte path
//! compares varints, floats and booleans as raw slices, strings by payload, and
//! only decodes fields that carry a custom comparator.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use cogroup_codec::field::{check_value, FieldCodec};
use cogroup_codec::read_source_id;
use cogroup_core::error::{Error, Result};
use cogroup_core::id::SourceId;
use cogroup_core::schema::DataType;
use cogroup_core::sort::Order;
use cogroup_core::types::{Tuple, Value};
use cogroup_planner::{Criterion, GroupingPlan, Slot, SourcePlan};

use crate::registry::{ComparatorRegistry, FieldComparator};

#[derive(Clone)]
struct Resolved {
    name: String,
    data_type: DataType,
    order: Order,
    is_source_id: bool,
    custom: Option<Arc<dyn FieldComparator>>,
}

impl Resolved {
    fn new(c: &Criterion, registry: &ComparatorRegistry) -> Result<Self> {
        let custom = c
            .comparator
            .as_deref()
            .map(|name| registry.get(name))
            .transpose()?;
        if custom.is_none() && !c.data_type.is_orderable() {
            return Err(Error::UnorderableField(c.name.clone()));
        }
        Ok(Self {
            name: c.name.clone(),
            data_type: c.data_type.clone(),
            order: c.order,
            is_source_id: c.name == cogroup_core::schema::SOURCE_ID_FIELD,
            custom,
        })
    }

    /// Unordered (direction not applied) comparison of two typed values.
    fn compare_values(&self, a: &Value, b: &Value) -> Result<Ordering> {
        check_value(&self.name, &self.data_type, a)?;
        check_value(&self.name, &self.data_type, b)?;
        if let Some(custom) = &self.custom {
            return Ok(custom.compare(a, b));
        }
        a.natural_cmp(b)
            .ok_or_else(|| Error::UnorderableField(self.name.clone()))
    }

    /// Unordered comparison of the encoded values at `pa` / `pb`; also returns
    /// both encoded lengths.
    fn compare_encoded(
        &self,
        codec: &FieldCodec,
        a: &[u8],
        pa: usize,
        b: &[u8],
        pb: usize,
    ) -> Result<(Ordering, usize, usize)> {
        if let Some(custom) = &self.custom {
            let (va, na) = codec.decode(a, pa, &self.data_type)?;
            let (vb, nb) = codec.decode(b, pb, &self.data_type)?;
            return Ok((custom.compare(&va, &vb), na, nb));
        }
        match &self.data_type {
            DataType::Utf8 => {
                let (sa, na) = codec.string_bytes(a, pa)?;
                let (sb, nb) = codec.string_bytes(b, pb)?;
                Ok((sa.cmp(sb), na, nb))
            }
            DataType::Object(_) => Err(Error::UnorderableField(self.name.clone())),
            dt => {
                let na = codec.skip(a, pa, dt)?;
                let nb = codec.skip(b, pb, dt)?;
                Ok((a[pa..pa + na].cmp(&b[pb..pb + nb]), na, nb))
            }
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

/// Full sort order: common criteria, then (same source only) that source's
/// secondary criteria.
#[derive(Debug, Clone)]
pub struct SortComparator {
    plan: Arc<GroupingPlan>,
    codec: Arc<FieldCodec>,
    common: Arc<[Resolved]>,
    secondary: Arc<BTreeMap<SourceId, Vec<Resolved>>>,
}

impl SortComparator {
    pub fn new(
        plan: Arc<GroupingPlan>,
        codec: Arc<FieldCodec>,
        registry: &ComparatorRegistry,
    ) -> Result<Self> {
        let common = plan
            .common_criteria()
            .iter()
            .map(|c| Resolved::new(c, registry))
            .collect::<Result<Vec<_>>>()?;
        let mut secondary = BTreeMap::new();
        for source in plan.sources() {
            let resolved = source
                .secondary_criteria
                .iter()
                .map(|c| Resolved::new(c, registry))
                .collect::<Result<Vec<_>>>()?;
            secondary.insert(source.id, resolved);
        }
        Ok(Self {
            plan,
            codec,
            common: common.into(),
            secondary: Arc::new(secondary),
        })
    }

    pub fn plan(&self) -> &Arc<GroupingPlan> {
        &self.plan
    }

    /// The comparator restricted to the group-by prefix.
    pub fn group_comparator(&self) -> GroupComparator {
        GroupComparator {
            sort: self.clone(),
            len: self.plan.group_by().len(),
        }
    }

    pub fn compare(&self, a: &Tuple, b: &Tuple) -> Result<Ordering> {
        self.compare_typed(a, b, self.common.len(), true)
    }

    pub fn compare_bytes(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        self.compare_raw(a, b, self.common.len(), true)
    }

    fn compare_typed(&self, a: &Tuple, b: &Tuple, len: usize, secondary: bool) -> Result<Ordering> {
        let sa = self.plan.source_for_schema(&a.schema().name)?;
        let sb = self.plan.source_for_schema(&b.schema().name)?;

        for (i, c) in self.common[..len].iter().enumerate() {
            let ord = match (sa.common_translation[i], sb.common_translation[i]) {
                (Slot::SourceId, Slot::SourceId) => sa.id.cmp(&sb.id),
                (Slot::Field(pa), Slot::Field(pb)) => {
                    c.compare_values(value(a, pa)?, value(b, pb)?)?
                }
                _ => {
                    return Err(Error::Invariant(format!(
                        "common position {i} maps to the source id in only one source"
                    )))
                }
            };
            let ord = c.order.apply(ord);
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }

        if !secondary || sa.id != sb.id {
            return Ok(Ordering::Equal);
        }
        for c in self.secondary_of(sa.id) {
            let pos = specific_position(sa, c)?;
            let ord = c.order.apply(c.compare_values(value(a, pos)?, value(b, pos)?)?);
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }

    fn compare_raw(&self, a: &[u8], b: &[u8], len: usize, secondary: bool) -> Result<Ordering> {
        let (mut pa, mut pb) = (0usize, 0usize);
        let (mut ida, mut idb) = (None, None);

        for c in &self.common[..len] {
            let ord = if c.is_source_id {
                let (x, na) = read_source_id(a, pa)?;
                let (y, nb) = read_source_id(b, pb)?;
                pa += na;
                pb += nb;
                ida = Some(x);
                idb = Some(y);
                x.cmp(&y)
            } else {
                let (ord, na, nb) = c.compare_encoded(&self.codec, a, pa, b, pb)?;
                pa += na;
                pb += nb;
                ord
            };
            let ord = c.order.apply(ord);
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }

        if !secondary {
            return Ok(Ordering::Equal);
        }
        let id = match (ida, idb) {
            (Some(x), Some(y)) if x != y => return Ok(Ordering::Equal),
            (Some(x), _) => x,
            _ => match self.plan.sources().next() {
                Some(only) if !self.plan.is_multi_source() => only.id,
                _ => return Ok(Ordering::Equal),
            },
        };
        for c in self.secondary_of(id) {
            let (ord, na, nb) = c.compare_encoded(&self.codec, a, pa, b, pb)?;
            pa += na;
            pb += nb;
            let ord = c.order.apply(ord);
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }

    fn secondary_of(&self, id: SourceId) -> &[Resolved] {
        self.secondary.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn value(t: &Tuple, pos: usize) -> Result<&Value> {
    t.get(pos).ok_or_else(|| {
        Error::Invariant(format!("tuple of '{}' has no position {pos}", t.schema().name))
    })
}

fn specific_position(source: &SourcePlan, c: &Resolved) -> Result<usize> {
    source
        .specific_schema
        .index_of(&c.name)
        .and_then(|i| source.specific_translation.get(i).copied())
        .ok_or_else(|| Error::Invariant(format!("'{}' is not specific to '{}'", c.name, source.name())))
}

/// Sort comparator restricted to the group-by prefix.
#[derive(Debug, Clone)]
pub struct GroupComparator {
    sort: SortComparator,
    len: usize,
}

impl GroupComparator {
    pub fn compare(&self, a: &Tuple, b: &Tuple) -> Result<Ordering> {
        self.sort.compare_typed(a, b, self.len, false)
    }

    pub fn compare_bytes(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        self.sort.compare_raw(a, b, self.len, false)
    }

    /// Number of group-by fields.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn field_name(&self, depth: usize) -> &str {
        &self.sort.common[depth].name
    }

    /// Whether two values of group-by field `depth` are equal under its
    /// custom or natural order.
    pub fn field_eq(&self, depth: usize, a: &Value, b: &Value) -> Result<bool> {
        let c = self.sort.common.get(depth).ok_or_else(|| {
            Error::Invariant(format!("group depth {depth} out of range"))
        })?;
        Ok(c.compare_values(a, b)? == Ordering::Equal)
    }

    pub fn plan(&self) -> &Arc<GroupingPlan> {
        &self.sort.plan
    }
}
