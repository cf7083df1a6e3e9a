//! Tuple → record bytes.
//!
//! Record layout: the common schema's fields (the source id written as a
//! varint at its common position, multi-source plans only) followed by the
//! specific schema's fields of the tuple's source.

use std::sync::Arc;

use cogroup_core::error::{Error, Result};
use cogroup_core::id::SourceId;
use cogroup_core::schema::{DataType, Schema};
use cogroup_core::types::{Tuple, Value};
use cogroup_planner::{GroupingPlan, Slot};

use crate::enums::EnumCache;
use crate::field::FieldCodec;
use crate::object::ObjectCodecs;
use crate::varint::write_varint;

/// Build the shared field codec for `plan`, checking every object codec is registered.
pub fn field_codec_for(
    plan: &GroupingPlan,
    objects: Arc<ObjectCodecs>,
    max_field_bytes: usize,
) -> Result<FieldCodec> {
    for source in plan.sources() {
        for field in &source.schema.fields {
            if let DataType::Object(codec) = &field.data_type {
                objects.get(codec)?;
            }
        }
    }
    let enums = EnumCache::new(plan.enum_types())?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        enums = enums.len(),
        objects = ?objects,
        max_field_bytes,
        "field codec ready"
    );

    Ok(FieldCodec::new(enums, objects, max_field_bytes))
}

/// Write the fields of `target` taken from `tuple` through `translation`.
pub fn encode(
    codec: &FieldCodec,
    tuple: &Tuple,
    target: &Schema,
    translation: &[Slot],
    source: SourceId,
    scratch: &mut Vec<u8>,
    out: &mut Vec<u8>,
) -> Result<()> {
    if translation.len() != target.len() {
        return Err(Error::Invariant(format!(
            "translation for '{}' has {} slots, schema has {} fields",
            target.name,
            translation.len(),
            target.len()
        )));
    }
    for (field, slot) in target.fields.iter().zip(translation) {
        match slot {
            Slot::SourceId => write_varint(out, i64::from(source.get())),
            Slot::Field(pos) => codec.encode(field, value_at(tuple, *pos)?, scratch, out)?,
        }
    }
    Ok(())
}

fn value_at(tuple: &Tuple, pos: usize) -> Result<&Value> {
    tuple.get(pos).ok_or_else(|| {
        Error::Invariant(format!(
            "tuple of '{}' has no position {pos}",
            tuple.schema().name
        ))
    })
}

#[derive(Debug, Clone)]
pub struct TupleSerializer {
    plan: Arc<GroupingPlan>,
    codec: Arc<FieldCodec>,
}

impl TupleSerializer {
    pub fn new(plan: Arc<GroupingPlan>, codec: Arc<FieldCodec>) -> Self {
        Self { plan, codec }
    }

    pub fn plan(&self) -> &Arc<GroupingPlan> {
        &self.plan
    }

    pub fn codec(&self) -> &Arc<FieldCodec> {
        &self.codec
    }

    /// Append the record for `tuple` to `out`. `scratch` is reused for object blobs.
    pub fn serialize(&self, tuple: &Tuple, scratch: &mut Vec<u8>, out: &mut Vec<u8>) -> Result<()> {
        let source = self.plan.source_for_schema(&tuple.schema().name)?;
        if tuple.len() != source.schema.len() {
            return Err(Error::Schema(format!(
                "tuple has {} values but source '{}' declares {} fields",
                tuple.len(),
                source.name(),
                source.schema.len()
            )));
        }

        encode(
            &self.codec,
            tuple,
            self.plan.common_schema(),
            &source.common_translation,
            source.id,
            scratch,
            out,
        )?;
        for (field, pos) in source
            .specific_schema
            .fields
            .iter()
            .zip(&source.specific_translation)
        {
            self.codec.encode(field, value_at(tuple, *pos)?, scratch, out)?;
        }
        Ok(())
    }

    /// Convenience: a fresh buffer holding the record for `tuple`.
    pub fn to_bytes(&self, tuple: &Tuple) -> Result<Vec<u8>> {
        let mut scratch = Vec::new();
        let mut out = Vec::new();
        self.serialize(tuple, &mut scratch, &mut out)?;
        Ok(out)
    }
}
