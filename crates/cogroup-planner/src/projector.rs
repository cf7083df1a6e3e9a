//! Schema projection: per-source schemas + sort order → common/specific layouts.
//!
//! The common schema is the sort order's field list, each field checked to be
//! declared with one type by every source, plus the synthetic source-id field.
//! Whatever a source declares beyond that becomes its specific schema.

use std::collections::{BTreeMap, HashSet};

use cogroup_core::config::GroupingConfig;
use cogroup_core::error::{Error, Result};
use cogroup_core::id::SourceId;
use cogroup_core::schema::{Field, Schema, SourceSchema, SOURCE_ID_FIELD};
use cogroup_core::sort::{Order, SortElement, SortSpec};

pub const COMMON_SCHEMA_NAME: &str = "common";

/// Output of [`project`]. Pure data, built once per configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub common_schema: Schema,
    /// Directions of the common schema fields, position for position.
    pub common_orders: Vec<Order>,
    pub specific_schemas: BTreeMap<SourceId, Schema>,
    /// Per source, how many leading specific fields carry a secondary order.
    pub secondary_orders: BTreeMap<SourceId, Vec<Order>>,
    pub group_by: Vec<String>,
    pub min_depth: usize,
    pub max_depth: usize,
}

impl Projection {
    pub fn source_id_position(&self) -> Option<usize> {
        self.common_schema.index_of(SOURCE_ID_FIELD)
    }
}

/// Derive the common and specific schemas of `config`.
///
/// Errors are configuration errors; nothing here depends on records.
pub fn project(config: &GroupingConfig) -> Result<Projection> {
    validate_sources(&config.sources)?;
    let multi = config.sources.len() >= 2;

    let order_by = effective_order(config);
    if order_by.is_empty() {
        return Err(Error::Config("no sort order and no group-by fields".into()));
    }

    let (mut common_fields, mut common_orders) = common_prefix(&config.sources, &order_by)?;
    if multi && !order_by.has_source_id() {
        common_fields.push(Field::source_id());
        common_orders.push(Order::Asc);
    }
    let common_schema = Schema::derived(COMMON_SCHEMA_NAME, common_fields);

    let group_by = validate_group_by(&config.group_by, &common_schema)?;
    let max_depth = group_by.len() - 1;
    let min_depth = match &config.rollup_from {
        Some(field) => group_by.iter().position(|g| g == field).ok_or_else(|| {
            Error::Config(format!(
                "rollup-from field '{field}' is not a group-by field {group_by:?}"
            ))
        })?,
        None => max_depth,
    };

    for id in config.secondary_order_by.keys() {
        if !config.sources.iter().any(|s| s.id == *id) {
            return Err(Error::UnknownSource(id.to_string()));
        }
    }

    let mut specific_schemas = BTreeMap::new();
    let mut secondary_orders = BTreeMap::new();
    for source in &config.sources {
        let secondary = config.secondary_order_by.get(&source.id);
        let (schema, orders) = specific_schema(source, secondary, &common_schema)?;
        specific_schemas.insert(source.id, schema);
        secondary_orders.insert(source.id, orders);
    }

    Ok(Projection {
        common_schema,
        common_orders,
        specific_schemas,
        secondary_orders,
        group_by,
        min_depth,
        max_depth,
    })
}

fn validate_sources(sources: &[SourceSchema]) -> Result<()> {
    if sources.is_empty() {
        return Err(Error::Config("at least one source schema is required".into()));
    }
    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for s in sources {
        s.schema.validate()?;
        if !ids.insert(s.id) {
            return Err(Error::Config(format!("duplicate source id {}", s.id)));
        }
        if !names.insert(s.schema.name.as_str()) {
            return Err(Error::Config(format!(
                "duplicate source schema name '{}'",
                s.schema.name
            )));
        }
    }
    Ok(())
}

/// The sort order to project; group-by ascending when none was given.
fn effective_order(config: &GroupingConfig) -> SortSpec {
    if !config.order_by.is_empty() {
        return config.order_by.clone();
    }
    config
        .group_by
        .iter()
        .fold(SortSpec::new(), |spec, f| spec.add(f.clone(), Order::Asc))
}

fn common_prefix(sources: &[SourceSchema], order_by: &SortSpec) -> Result<(Vec<Field>, Vec<Order>)> {
    let multi = sources.len() >= 2;
    let mut fields = Vec::with_capacity(order_by.len() + 1);
    let mut orders = Vec::with_capacity(order_by.len() + 1);
    let mut seen = HashSet::new();

    for element in order_by.elements() {
        if !seen.insert(element.name().to_string()) {
            return Err(Error::Config(format!(
                "'{}' appears twice in the sort order",
                element.name()
            )));
        }
        match element {
            SortElement::SourceId { order } => {
                if !multi {
                    return Err(Error::InvalidSourceIdUsage(format!(
                        "sorting by '{SOURCE_ID_FIELD}' needs at least 2 sources, got {}",
                        sources.len()
                    )));
                }
                fields.push(Field::source_id());
                orders.push(*order);
            }
            SortElement::Field {
                name,
                order,
                comparator,
            } => {
                let field = common_field(sources, name, comparator.as_deref())?;
                fields.push(field);
                orders.push(*order);
            }
        }
    }
    Ok((fields, orders))
}

/// Check that every source declares `name` with one type and resolve its comparator.
fn common_field(sources: &[SourceSchema], name: &str, sort_comparator: Option<&str>) -> Result<Field> {
    let mut resolved: Option<&Field> = None;
    for source in sources {
        let field = source
            .schema
            .field_by_name(name)
            .ok_or_else(|| Error::MissingCommonField {
                field: name.to_string(),
                source_name: source.schema.name.clone(),
            })?;
        match resolved {
            None => resolved = Some(field),
            Some(first) => {
                if first.data_type != field.data_type {
                    return Err(Error::TypeMismatch {
                        field: name.to_string(),
                        first: first.data_type.to_string(),
                        second: field.data_type.to_string(),
                    });
                }
                if sort_comparator.is_none() && first.comparator != field.comparator {
                    return Err(Error::Config(format!(
                        "field '{name}' declares different comparators across sources"
                    )));
                }
            }
        }
    }
    let first = resolved.ok_or_else(|| Error::UnknownField(name.to_string()))?;
    let mut field = Field::new(name, first.data_type.clone());
    field.comparator = sort_comparator
        .map(str::to_string)
        .or_else(|| first.comparator.clone());
    check_orderable(&field)?;
    Ok(field)
}

fn check_orderable(field: &Field) -> Result<()> {
    if !field.data_type.is_orderable() && field.comparator.is_none() {
        return Err(Error::UnorderableField(field.name.clone()));
    }
    Ok(())
}

fn validate_group_by(group_by: &[String], common: &Schema) -> Result<Vec<String>> {
    if group_by.is_empty() {
        return Err(Error::Config("at least one group-by field is required".into()));
    }
    if group_by.iter().any(|g| g == SOURCE_ID_FIELD) {
        return Err(Error::InvalidSourceIdUsage(
            "the source id can't be a group-by field".into(),
        ));
    }
    let is_prefix = group_by.len() <= common.len()
        && group_by
            .iter()
            .zip(common.fields.iter())
            .all(|(g, f)| *g == f.name);
    if !is_prefix {
        return Err(Error::GroupByNotPrefix {
            group_by: group_by.to_vec(),
            common: common.field_names(),
        });
    }
    Ok(group_by.to_vec())
}

fn specific_schema(
    source: &SourceSchema,
    secondary: Option<&SortSpec>,
    common: &Schema,
) -> Result<(Schema, Vec<Order>)> {
    let mut fields = Vec::with_capacity(source.schema.len());
    let mut orders = Vec::new();

    if let Some(spec) = secondary {
        for element in spec.elements() {
            let SortElement::Field {
                name,
                order,
                comparator,
            } = element
            else {
                return Err(Error::InvalidSourceIdUsage(format!(
                    "'{SOURCE_ID_FIELD}' can't appear in the secondary sort of '{}'",
                    source.schema.name
                )));
            };
            if common.contains(name) {
                return Err(Error::SecondarySortOnCommonField {
                    field: name.clone(),
                    source_name: source.schema.name.clone(),
                });
            }
            if fields.iter().any(|f: &Field| f.name == *name) {
                return Err(Error::Config(format!(
                    "'{name}' appears twice in the secondary sort of '{}'",
                    source.schema.name
                )));
            }
            let declared = source.schema.field_by_name(name).ok_or_else(|| {
                Error::UnknownField(format!("{}.{name}", source.schema.name))
            })?;
            let mut field = declared.clone();
            if comparator.is_some() {
                field.comparator = comparator.clone();
            }
            check_orderable(&field)?;
            fields.push(field);
            orders.push(*order);
        }
    }

    for field in &source.schema.fields {
        if common.contains(&field.name) || fields.iter().any(|f| f.name == field.name) {
            continue;
        }
        fields.push(field.clone());
    }

    Ok((Schema::derived(source.schema.name.clone(), fields), orders))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages() -> Schema {
        Schema::parse("pages", "url:string, date:long, fetched:long, content:string").unwrap()
    }

    fn users() -> Schema {
        Schema::parse("users", "fetched:long, url:string, name:string").unwrap()
    }

    fn two_sources() -> GroupingConfig {
        GroupingConfig::new()
            .with_source(SourceId::new(0), pages())
            .with_source(SourceId::new(1), users())
    }

    #[test]
    fn common_type_mismatch_fails() {
        let cfg = GroupingConfig::new()
            .with_source(
                SourceId::new(0),
                Schema::parse("a", "url:string, fetched:long, content:string").unwrap(),
            )
            .with_source(
                SourceId::new(1),
                Schema::parse("b", "url:string, fetched:int, name:string").unwrap(),
            )
            .with_order_by(SortSpec::parse("url asc, fetched desc").unwrap())
            .with_group_by(["url"]);
        let err = project(&cfg).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref field, .. } if field == "fetched"));
        assert!(err.is_config());
    }

    #[test]
    fn source_id_needs_two_sources() {
        let cfg = GroupingConfig::new()
            .with_source(SourceId::new(0), pages())
            .with_order_by(SortSpec::parse("url asc, fetched desc, #source# desc").unwrap())
            .with_group_by(["url"]);
        assert!(matches!(
            project(&cfg).unwrap_err(),
            Error::InvalidSourceIdUsage(_)
        ));
    }

    #[test]
    fn source_id_appended_when_not_given() {
        let cfg = two_sources()
            .with_order_by(SortSpec::parse("url asc, fetched desc").unwrap())
            .with_group_by(["url"]);
        let p = project(&cfg).unwrap();
        assert_eq!(
            p.common_schema.to_string(),
            "url:string, fetched:long, #source#:int"
        );
        assert_eq!(p.source_id_position(), Some(2));
        assert_eq!(
            p.specific_schemas[&SourceId::new(0)].to_string(),
            "date:long, content:string"
        );
        assert_eq!(
            p.specific_schemas[&SourceId::new(1)].to_string(),
            "name:string"
        );
    }

    #[test]
    fn source_id_at_explicit_position() {
        let cfg = two_sources()
            .with_order_by(
                SortSpec::new()
                    .add("url", Order::Asc)
                    .add_source_id(Order::Asc)
                    .add("fetched", Order::Desc),
            )
            .with_group_by(["url"]);
        let p = project(&cfg).unwrap();
        assert_eq!(
            p.common_schema.to_string(),
            "url:string, #source#:int, fetched:long"
        );
        assert_eq!(p.common_orders, vec![Order::Asc, Order::Asc, Order::Desc]);
    }

    #[test]
    fn secondary_sort_may_differ_in_type() {
        let cfg = GroupingConfig::new()
            .with_source(SourceId::new(0), pages())
            .with_source(
                SourceId::new(1),
                Schema::parse("users", "fetched:int, url:string, name:string").unwrap(),
            )
            .with_order_by(
                SortSpec::new()
                    .add("url", Order::Desc)
                    .add_source_id(Order::Asc),
            )
            .with_secondary_order_by(SourceId::new(1), SortSpec::parse("fetched asc").unwrap())
            .with_group_by(["url"]);
        let p = project(&cfg).unwrap();
        assert_eq!(p.common_schema.to_string(), "url:string, #source#:int");
        assert_eq!(
            p.specific_schemas[&SourceId::new(0)].to_string(),
            "date:long, fetched:long, content:string"
        );
        assert_eq!(
            p.specific_schemas[&SourceId::new(1)].to_string(),
            "fetched:int, name:string"
        );
        assert_eq!(p.secondary_orders[&SourceId::new(1)], vec![Order::Asc]);
        assert!(p.secondary_orders[&SourceId::new(0)].is_empty());
    }

    #[test]
    fn secondary_sort_on_common_field_fails() {
        let cfg = two_sources()
            .with_order_by(SortSpec::parse("url desc, #source# asc").unwrap())
            .with_secondary_order_by(SourceId::new(1), SortSpec::parse("url asc").unwrap())
            .with_group_by(["url"]);
        assert!(matches!(
            project(&cfg).unwrap_err(),
            Error::SecondarySortOnCommonField { .. }
        ));
    }

    #[test]
    fn group_by_must_be_prefix() {
        let cfg = two_sources()
            .with_order_by(SortSpec::parse("url asc, fetched desc").unwrap())
            .with_group_by(["fetched"]);
        assert!(matches!(
            project(&cfg).unwrap_err(),
            Error::GroupByNotPrefix { .. }
        ));
    }

    #[test]
    fn missing_common_field_fails() {
        let cfg = two_sources()
            .with_order_by(SortSpec::parse("url asc, date asc").unwrap())
            .with_group_by(["url"]);
        assert!(matches!(
            project(&cfg).unwrap_err(),
            Error::MissingCommonField { ref source_name, .. } if source_name == "users"
        ));
    }

    #[test]
    fn object_fields_need_a_comparator() {
        let schema = Schema::parse("s", "k:object<json>, v:int").unwrap();
        let cfg = GroupingConfig::new()
            .with_source(SourceId::new(0), schema)
            .with_order_by(SortSpec::parse("k asc").unwrap())
            .with_group_by(["k"]);
        assert!(matches!(
            project(&cfg).unwrap_err(),
            Error::UnorderableField(_)
        ));

        let schema = Schema::parse("s", "k:object<json>, v:int").unwrap();
        let cfg = GroupingConfig::new()
            .with_source(SourceId::new(0), schema)
            .with_order_by(SortSpec::new().add_with_comparator("k", Order::Asc, "by_len"))
            .with_group_by(["k"]);
        let p = project(&cfg).unwrap();
        assert_eq!(p.common_schema.fields[0].comparator.as_deref(), Some("by_len"));
    }

    #[test]
    fn default_order_is_group_by_and_depths_follow_rollup() {
        let cfg = two_sources()
            .with_group_by(["url", "fetched"])
            .with_rollup_from("url");
        let p = project(&cfg).unwrap();
        assert_eq!(p.group_by, vec!["url".to_string(), "fetched".to_string()]);
        assert_eq!((p.min_depth, p.max_depth), (0, 1));

        let cfg = two_sources().with_group_by(["url", "fetched"]);
        let p = project(&cfg).unwrap();
        assert_eq!((p.min_depth, p.max_depth), (1, 1));
    }

    #[test]
    fn duplicate_source_ids_fail() {
        let cfg = GroupingConfig::new()
            .with_source(SourceId::new(0), pages())
            .with_source(SourceId::new(0), users())
            .with_group_by(["url"]);
        assert!(matches!(project(&cfg).unwrap_err(), Error::Config(_)));
    }
}
