//! Ordinal → constant lookup for enum fields, built once per plan.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use cogroup_core::error::{Error, Result};
use cogroup_core::schema::EnumType;
use cogroup_core::types::EnumValue;

#[derive(Debug, Clone, Default)]
pub struct EnumCache {
    constants: HashMap<String, Arc<[EnumValue]>>,
}

impl EnumCache {
    pub fn new(types: &BTreeMap<String, EnumType>) -> Result<Self> {
        let mut constants = HashMap::with_capacity(types.len());
        for (name, ty) in types {
            let values = ty
                .symbols
                .iter()
                .map(|s| EnumValue::new(ty, s))
                .collect::<Result<Vec<_>>>()?;
            constants.insert(name.clone(), Arc::from(values));
        }
        Ok(Self { constants })
    }

    /// The constant with `ordinal` in enum `type_name`.
    pub fn resolve(&self, type_name: &str, ordinal: usize) -> Result<EnumValue> {
        let values = self
            .constants
            .get(type_name)
            .ok_or_else(|| Error::Codec(format!("enum '{type_name}' is not part of the plan")))?;
        values.get(ordinal).cloned().ok_or_else(|| {
            Error::Codec(format!(
                "ordinal {ordinal} out of range for enum '{type_name}' ({} constants)",
                values.len()
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }
}
