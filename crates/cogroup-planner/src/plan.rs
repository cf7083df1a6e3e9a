//! `GroupingPlan`: the immutable output of configuration assembly.
//!
//! Holds the projected schemas, the per-source index translations used by the
//! codec, and the resolved comparison criteria used by the comparators. Built
//! once, then shared read-only (`Arc`) by every worker.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use cogroup_core::config::GroupingConfig;
use cogroup_core::error::{Error, Result};
use cogroup_core::hash::{hash_serde, Hash256};
use cogroup_core::id::SourceId;
use cogroup_core::schema::{DataType, EnumType, Field, Schema};
use cogroup_core::sort::Order;

use crate::projector::{project, Projection};

/// Where the value of one target-schema position comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    /// Position in the source tuple.
    Field(usize),
    /// The synthetic source id.
    SourceId,
}

/// One comparison step: a field position in a derived schema plus how to order it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub position: usize,
    pub name: String,
    pub data_type: DataType,
    pub order: Order,
    pub comparator: Option<String>,
}

impl Criterion {
    fn from_field(position: usize, field: &Field, order: Order) -> Self {
        Self {
            position,
            name: field.name.clone(),
            data_type: field.data_type.clone(),
            order,
            comparator: field.comparator.clone(),
        }
    }
}

/// Per-source part of the plan.
#[derive(Debug, Clone)]
pub struct SourcePlan {
    pub id: SourceId,
    /// The source's own declared schema.
    pub schema: Arc<Schema>,
    pub specific_schema: Arc<Schema>,
    /// `common_translation[i]` feeds common position `i`.
    pub common_translation: Vec<Slot>,
    /// `specific_translation[i]` is the source position feeding specific position `i`.
    pub specific_translation: Vec<usize>,
    /// Criteria over the specific schema, applied between tuples of this source
    /// once the common criteria tie.
    pub secondary_criteria: Vec<Criterion>,
}

impl SourcePlan {
    pub fn name(&self) -> &str {
        &self.schema.name
    }
}

#[derive(Debug, Clone)]
pub struct GroupingPlan {
    config: GroupingConfig,
    common_schema: Arc<Schema>,
    sources: BTreeMap<SourceId, SourcePlan>,
    by_name: HashMap<String, SourceId>,
    common_criteria: Vec<Criterion>,
    group_by: Vec<String>,
    min_depth: usize,
    max_depth: usize,
    source_id_position: Option<usize>,
    enum_types: BTreeMap<String, EnumType>,
    fingerprint: Hash256,
}

impl GroupingPlan {
    /// Validate `config` and derive everything the codec and comparators need.
    pub fn build(config: GroupingConfig) -> Result<Self> {
        let Projection {
            common_schema,
            common_orders,
            specific_schemas,
            secondary_orders,
            group_by,
            min_depth,
            max_depth,
        } = project(&config)?;

        let enum_types = collect_enum_types(&config)?;
        let source_id_position = common_schema.index_of(cogroup_core::schema::SOURCE_ID_FIELD);
        let common_criteria: Vec<Criterion> = common_schema
            .fields
            .iter()
            .zip(common_orders.iter())
            .enumerate()
            .map(|(i, (f, o))| Criterion::from_field(i, f, *o))
            .collect();

        let mut sources = BTreeMap::new();
        let mut by_name = HashMap::new();
        for source in &config.sources {
            let specific = specific_schemas.get(&source.id).cloned().ok_or_else(|| {
                Error::Invariant(format!("no specific schema projected for {}", source.id))
            })?;
            let orders = secondary_orders.get(&source.id).cloned().unwrap_or_default();

            let common_translation = common_schema
                .fields
                .iter()
                .map(|f| {
                    if f.is_source_id() {
                        Ok(Slot::SourceId)
                    } else {
                        translate(&source.schema, &f.name).map(Slot::Field)
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            let specific_translation = specific
                .fields
                .iter()
                .map(|f| translate(&source.schema, &f.name))
                .collect::<Result<Vec<_>>>()?;
            let secondary_criteria = specific
                .fields
                .iter()
                .zip(orders.iter())
                .enumerate()
                .map(|(i, (f, o))| Criterion::from_field(i, f, *o))
                .collect();

            by_name.insert(source.schema.name.clone(), source.id);
            sources.insert(
                source.id,
                SourcePlan {
                    id: source.id,
                    schema: Arc::new(source.schema.clone()),
                    specific_schema: Arc::new(specific),
                    common_translation,
                    specific_translation,
                    secondary_criteria,
                },
            );
        }

        let fingerprint = hash_serde(&config)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            common = %common_schema,
            sources = sources.len(),
            group_by = ?group_by,
            min_depth,
            max_depth,
            fingerprint = %fingerprint,
            "grouping plan built"
        );

        Ok(Self {
            config,
            common_schema: Arc::new(common_schema),
            sources,
            by_name,
            common_criteria,
            group_by,
            min_depth,
            max_depth,
            source_id_position,
            enum_types,
            fingerprint,
        })
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    pub fn common_schema(&self) -> &Arc<Schema> {
        &self.common_schema
    }

    pub fn source(&self, id: SourceId) -> Option<&SourcePlan> {
        self.sources.get(&id)
    }

    /// Resolve the source a tuple belongs to from its schema name.
    pub fn source_for_schema(&self, name: &str) -> Result<&SourcePlan> {
        self.by_name
            .get(name)
            .and_then(|id| self.sources.get(id))
            .ok_or_else(|| Error::UnknownSource(name.to_string()))
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourcePlan> {
        self.sources.values()
    }

    pub fn is_multi_source(&self) -> bool {
        self.sources.len() >= 2
    }

    pub fn common_criteria(&self) -> &[Criterion] {
        &self.common_criteria
    }

    /// The prefix of the common criteria covering the group-by fields.
    pub fn group_criteria(&self) -> &[Criterion] {
        &self.common_criteria[..self.group_by.len()]
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn min_depth(&self) -> usize {
        self.min_depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn source_id_position(&self) -> Option<usize> {
        self.source_id_position
    }

    /// Stable hash of the configuration this plan was built from.
    pub fn fingerprint(&self) -> Hash256 {
        self.fingerprint
    }

    /// Every enum type used by any source, keyed by type name.
    pub fn enum_types(&self) -> &BTreeMap<String, EnumType> {
        &self.enum_types
    }
}

fn collect_enum_types(config: &GroupingConfig) -> Result<BTreeMap<String, EnumType>> {
    let mut out: BTreeMap<String, EnumType> = BTreeMap::new();
    for field in config.sources.iter().flat_map(|s| s.schema.fields.iter()) {
        let DataType::Enum(ty) = &field.data_type else {
            continue;
        };
        match out.get(&ty.name) {
            Some(seen) if seen != ty => {
                return Err(Error::Config(format!(
                    "enum '{}' is declared with different constants",
                    ty.name
                )));
            }
            Some(_) => {}
            None => {
                out.insert(ty.name.clone(), ty.clone());
            }
        }
    }
    Ok(out)
}

fn translate(schema: &Schema, field: &str) -> Result<usize> {
    schema
        .index_of(field)
        .ok_or_else(|| Error::UnknownField(format!("{}.{field}", schema.name)))
}
