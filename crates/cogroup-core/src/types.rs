//! Runtime values and tuples.
//!
//! A `Tuple` is positioned by a shared, immutable `Schema`. Tuples are mutable
//! and meant to be reused record after record by whoever owns them.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::{DataType, EnumType, Schema};

/// A resolved enum constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_name: Arc<str>,
    pub ordinal: u32,
    pub symbol: Arc<str>,
}

impl EnumValue {
    pub fn new(ty: &EnumType, symbol: &str) -> Result<Self> {
        let ordinal = ty.ordinal_of(symbol).ok_or_else(|| {
            Error::Schema(format!("'{symbol}' is not a constant of enum '{}'", ty.name))
        })?;
        Ok(Self {
            type_name: Arc::from(ty.name.as_str()),
            ordinal,
            symbol: Arc::from(symbol),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Only object fields may hold no value.
    Null,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Str(String),
    Enum(EnumValue),
    Object(serde_json::Value),
}

impl Value {
    /// Short type label used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int32(_) => "int",
            Value::Int64(_) => "long",
            Value::Float32(_) => "float",
            Value::Float64(_) => "double",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Enum(_) => "enum",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value may be stored in a field of type `dt`.
    pub fn conforms_to(&self, dt: &DataType) -> bool {
        match (self, dt) {
            (Value::Int32(_), DataType::Int32)
            | (Value::Int64(_), DataType::Int64)
            | (Value::Float32(_), DataType::Float32)
            | (Value::Float64(_), DataType::Float64)
            | (Value::Bool(_), DataType::Boolean)
            | (Value::Str(_), DataType::Utf8)
            | (Value::Null, DataType::Object(_))
            | (Value::Object(_), DataType::Object(_)) => true,
            (Value::Enum(e), DataType::Enum(ty)) => {
                *e.type_name == *ty.name && (e.ordinal as usize) < ty.symbols.len()
            }
            _ => false,
        }
    }

    /// Natural order: numeric, `false < true`, enum ordinal, byte-lexicographic
    /// strings, `total_cmp` for floats. `None` for objects and mixed kinds.
    pub fn natural_cmp(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Int32(a), Int32(b)) => Some(a.cmp(b)),
            (Int64(a), Int64(b)) => Some(a.cmp(b)),
            (Float32(a), Float32(b)) => Some(a.total_cmp(b)),
            (Float64(a), Float64(b)) => Some(a.total_cmp(b)),
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Str(a), Str(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Enum(a), Enum(b)) if a.type_name == b.type_name => Some(a.ordinal.cmp(&b.ordinal)),
            _ => None,
        }
    }

    /// Equality used for group boundaries. Floats compare by `total_cmp` so a
    /// NaN key equals itself.
    pub fn group_eq(&self, other: &Value) -> bool {
        match self.natural_cmp(other) {
            Some(ord) => ord == Ordering::Equal,
            None => self == other,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<EnumValue> for Value {
    fn from(v: EnumValue) -> Self {
        Value::Enum(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::Enum(e) => f.write_str(&e.symbol),
            Value::Object(o) => write!(f, "{o}"),
        }
    }
}

/// Ordered values laid out by a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Tuple {
    /// A tuple with every position unset (`Null`).
    pub fn new(schema: Arc<Schema>) -> Self {
        let values = vec![Value::Null; schema.len()];
        Self { schema, values }
    }

    pub fn from_values(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(Error::Schema(format!(
                "schema '{}' has {} fields but {} values were given",
                schema.name,
                schema.len(),
                values.len()
            )));
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, pos: usize) -> Option<&Value> {
        self.values.get(pos)
    }

    pub fn get_by_name(&self, field: &str) -> Option<&Value> {
        self.schema.index_of(field).and_then(|i| self.values.get(i))
    }

    pub fn set(&mut self, pos: usize, value: impl Into<Value>) -> Result<()> {
        let slot = self.values.get_mut(pos).ok_or_else(|| {
            Error::UnknownField(format!("position {pos} of schema '{}'", self.schema.name))
        })?;
        *slot = value.into();
        Ok(())
    }

    pub fn set_by_name(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let pos = self
            .schema
            .index_of(field)
            .ok_or_else(|| Error::UnknownField(format!("{}.{field}", self.schema.name)))?;
        self.values[pos] = value.into();
        Ok(())
    }

    /// Reset every position to `Null`, keeping the allocation.
    pub fn clear(&mut self) {
        for v in self.values.iter_mut() {
            *v = Value::Null;
        }
    }

    /// Re-target this tuple at another schema, reusing the value buffer.
    pub fn reset_schema(&mut self, schema: Arc<Schema>) {
        if !Arc::ptr_eq(&self.schema, &schema) {
            self.values.clear();
            self.values.resize(schema.len(), Value::Null);
            self.schema = schema;
        } else {
            self.clear();
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}
