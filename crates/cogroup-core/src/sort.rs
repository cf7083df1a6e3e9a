//! Sort specifications: ordered `(field, direction, comparator)` entries with an
//! optional "sort by source id here" marker.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::SOURCE_ID_FIELD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    /// Apply this direction to a natural-order result.
    pub fn apply(self, ord: Ordering) -> Ordering {
        match self {
            Order::Asc => ord,
            Order::Desc => ord.reverse(),
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            other => Err(Error::Config(format!("unknown sort order '{other}'"))),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Order::Asc => f.write_str("asc"),
            Order::Desc => f.write_str("desc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SortElement {
    Field {
        name: String,
        order: Order,
        /// Registered comparator overriding the field's own, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comparator: Option<String>,
    },
    SourceId {
        order: Order,
    },
}

impl SortElement {
    pub fn name(&self) -> &str {
        match self {
            SortElement::Field { name, .. } => name,
            SortElement::SourceId { .. } => SOURCE_ID_FIELD,
        }
    }

    pub fn order(&self) -> Order {
        match self {
            SortElement::Field { order, .. } | SortElement::SourceId { order } => *order,
        }
    }

    pub fn comparator(&self) -> Option<&str> {
        match self {
            SortElement::Field { comparator, .. } => comparator.as_deref(),
            SortElement::SourceId { .. } => None,
        }
    }

    pub fn is_source_id(&self) -> bool {
        matches!(self, SortElement::SourceId { .. })
    }
}

impl fmt::Display for SortElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.order())?;
        if let Some(c) = self.comparator() {
            write!(f, " using {c}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortSpec {
    elements: Vec<SortElement>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: impl Into<String>, order: Order) -> Self {
        self.elements.push(SortElement::Field {
            name: name.into(),
            order,
            comparator: None,
        });
        self
    }

    pub fn add_with_comparator(
        mut self,
        name: impl Into<String>,
        order: Order,
        comparator: impl Into<String>,
    ) -> Self {
        self.elements.push(SortElement::Field {
            name: name.into(),
            order,
            comparator: Some(comparator.into()),
        });
        self
    }

    pub fn add_source_id(mut self, order: Order) -> Self {
        self.elements.push(SortElement::SourceId { order });
        self
    }

    /// Parse `"url asc, fetched desc, #source# asc"`. A missing direction means asc.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut out = Self::new();
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let mut words = part.split_whitespace();
            let name = words
                .next()
                .ok_or_else(|| Error::Config(format!("empty sort entry in '{spec}'")))?;
            let order = match words.next() {
                Some(o) => Order::parse(o)?,
                None => Order::Asc,
            };
            if let Some(extra) = words.next() {
                return Err(Error::Config(format!(
                    "unexpected '{extra}' in sort entry '{part}'"
                )));
            }
            out = if name == SOURCE_ID_FIELD {
                out.add_source_id(order)
            } else {
                out.add(name, order)
            };
        }
        Ok(out)
    }

    pub fn elements(&self) -> &[SortElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn has_source_id(&self) -> bool {
        self.elements.iter().any(SortElement::is_source_id)
    }

    pub fn contains_field(&self, name: &str) -> bool {
        self.elements
            .iter()
            .any(|e| !e.is_source_id() && e.name() == name)
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_marker() {
        let spec = SortSpec::parse("url asc, #source# desc, fetched").unwrap();
        assert_eq!(spec.len(), 3);
        assert!(spec.elements()[1].is_source_id());
        assert_eq!(spec.elements()[1].order(), Order::Desc);
        assert_eq!(spec.elements()[2].order(), Order::Asc);
        assert!(spec.contains_field("fetched"));
        assert!(!spec.contains_field(SOURCE_ID_FIELD));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(SortSpec::parse("url sideways").is_err());
        assert!(SortSpec::parse("url asc please").is_err());
    }

    #[test]
    fn desc_reverses() {
        assert_eq!(Order::Desc.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(Order::Asc.apply(Ordering::Less), Ordering::Less);
    }
}
