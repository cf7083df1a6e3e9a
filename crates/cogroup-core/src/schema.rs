//! Field and schema model. Pure data plus validation; no codec logic here.
//!
//! A `Schema` is a named, ordered list of fields. Field order is the wire order
//! used by `cogroup-codec`, so it is significant.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::SourceId;

/// Reserved name of the synthetic source-id field placed in common schemas.
pub const SOURCE_ID_FIELD: &str = "#source#";

/// Ordered list of named constants backing an enum field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub symbols: Vec<String>,
}

impl EnumType {
    pub fn new<S: Into<String>>(name: impl Into<String>, symbols: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    pub fn ordinal_of(&self, symbol: &str) -> Option<u32> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|p| p as u32)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int32,
    Int64,
    Float32,
    Float64,
    Boolean,
    Utf8,
    Enum(EnumType),
    /// Opaque object; the string names the registered object codec.
    Object(String),
}

impl DataType {
    /// Parse the short textual type names used by [`Schema::parse`].
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "int" | "Int32" | "i32" => Ok(DataType::Int32),
            "long" | "Int64" | "i64" => Ok(DataType::Int64),
            "float" | "Float32" | "f32" => Ok(DataType::Float32),
            "double" | "Float64" | "f64" => Ok(DataType::Float64),
            "boolean" | "bool" | "Boolean" => Ok(DataType::Boolean),
            "string" | "utf8" | "Utf8" => Ok(DataType::Utf8),
            other => {
                if let Some(codec) = other
                    .strip_prefix("object<")
                    .and_then(|rest| rest.strip_suffix('>'))
                {
                    return Ok(DataType::Object(codec.trim().to_string()));
                }
                Err(Error::Schema(format!("unknown type '{other}'")))
            }
        }
    }

    /// Whether values of this type have an order usable without a custom comparator.
    pub fn is_orderable(&self) -> bool {
        !matches!(self, DataType::Object(_))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int32 => f.write_str("int"),
            DataType::Int64 => f.write_str("long"),
            DataType::Float32 => f.write_str("float"),
            DataType::Float64 => f.write_str("double"),
            DataType::Boolean => f.write_str("boolean"),
            DataType::Utf8 => f.write_str("string"),
            DataType::Enum(e) => write!(f, "enum<{}>", e.name),
            DataType::Object(codec) => write!(f, "object<{codec}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    /// Name of a registered custom comparator, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            comparator: None,
        }
    }

    pub fn with_comparator(mut self, comparator: impl Into<String>) -> Self {
        self.comparator = Some(comparator.into());
        self
    }

    /// The synthetic source-id field. Its values are `Int32` source ids.
    pub fn source_id() -> Self {
        Self::new(SOURCE_ID_FIELD, DataType::Int32)
    }

    pub fn is_source_id(&self) -> bool {
        self.name == SOURCE_ID_FIELD
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.data_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Schema {
    /// Build a schema, rejecting duplicate or reserved field names.
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Result<Self> {
        let schema = Self {
            name: name.into(),
            fields,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Build a derived schema that is allowed to carry the synthetic source-id field.
    pub fn derived(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Parse `"url:string, fetched:long, payload:object<json>"`.
    pub fn parse(name: impl Into<String>, spec: &str) -> Result<Self> {
        let mut fields = Vec::new();
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (field, ty) = part
                .split_once(':')
                .ok_or_else(|| Error::Schema(format!("expected 'name:type', got '{part}'")))?;
            fields.push(Field::new(field.trim(), DataType::parse(ty)?));
        }
        Self::new(name, fields)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Schema("schema name must not be empty".into()));
        }
        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(Error::Schema(format!(
                    "schema '{}' has a field with an empty name",
                    self.name
                )));
            }
            if field.is_source_id() {
                return Err(Error::Schema(format!(
                    "field name '{SOURCE_ID_FIELD}' is reserved (schema '{}')",
                    self.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Schema(format!(
                    "duplicate field '{}' in schema '{}'",
                    field.name, self.name
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

/// A schema bound to the source id it is declared under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSchema {
    pub id: SourceId,
    pub schema: Schema,
}

impl SourceSchema {
    pub fn new(id: SourceId, schema: Schema) -> Self {
        Self { id, schema }
    }
}
