//! Record bytes → tuple of the record's own source schema.

use std::sync::Arc;

use cogroup_core::error::{Error, Result};
use cogroup_core::id::SourceId;
use cogroup_core::schema::DataType;
use cogroup_core::types::{Tuple, Value};
use cogroup_planner::{GroupingPlan, Slot, SourcePlan};

use crate::field::FieldCodec;
use crate::varint::read_varint;

/// Decode one value; returns `(value, bytes consumed)`.
pub fn decode(
    codec: &FieldCodec,
    bytes: &[u8],
    offset: usize,
    data_type: &DataType,
) -> Result<(Value, usize)> {
    codec.decode(bytes, offset, data_type)
}

/// Read the source id varint at `pos`.
pub fn read_source_id(bytes: &[u8], pos: usize) -> Result<(SourceId, usize)> {
    let (v, n) = read_varint(bytes, pos)?;
    let id = u32::try_from(v)
        .map_err(|_| Error::Codec(format!("source id {v} at offset {pos} is out of range")))?;
    Ok((SourceId::new(id), n))
}

#[derive(Debug, Clone)]
pub struct TupleDeserializer {
    plan: Arc<GroupingPlan>,
    codec: Arc<FieldCodec>,
}

impl TupleDeserializer {
    pub fn new(plan: Arc<GroupingPlan>, codec: Arc<FieldCodec>) -> Self {
        Self { plan, codec }
    }

    pub fn plan(&self) -> &Arc<GroupingPlan> {
        &self.plan
    }

    /// The source a record belongs to. Multi-source records are scanned up to
    /// the source id; single-source records carry none.
    pub fn source_of(&self, bytes: &[u8]) -> Result<&SourcePlan> {
        let Some(sid_pos) = self.plan.source_id_position() else {
            return self
                .plan
                .sources()
                .next()
                .ok_or_else(|| Error::Invariant("plan has no sources".into()));
        };
        let mut pos = 0;
        for field in &self.plan.common_schema().fields[..sid_pos] {
            pos += self.codec.skip(bytes, pos, &field.data_type)?;
        }
        let (id, _) = read_source_id(bytes, pos)?;
        self.plan
            .source(id)
            .ok_or_else(|| Error::UnknownSource(id.to_string()))
    }

    /// Decode `bytes` into `tuple`, re-targeting it at the record's source schema.
    pub fn deserialize_into(&self, bytes: &[u8], tuple: &mut Tuple) -> Result<()> {
        let source = self.source_of(bytes)?;
        tuple.reset_schema(source.schema.clone());

        let mut pos = 0;
        for (field, slot) in self
            .plan
            .common_schema()
            .fields
            .iter()
            .zip(&source.common_translation)
        {
            match slot {
                Slot::SourceId => pos += read_source_id(bytes, pos)?.1,
                Slot::Field(target) => {
                    let (v, n) = self.codec.decode(bytes, pos, &field.data_type)?;
                    tuple.set(*target, v)?;
                    pos += n;
                }
            }
        }
        for (field, target) in source
            .specific_schema
            .fields
            .iter()
            .zip(&source.specific_translation)
        {
            let (v, n) = self.codec.decode(bytes, pos, &field.data_type)?;
            tuple.set(*target, v)?;
            pos += n;
        }

        if pos != bytes.len() {
            return Err(Error::Codec(format!(
                "{} trailing bytes after record of '{}'",
                bytes.len() - pos,
                source.name()
            )));
        }
        Ok(())
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<Tuple> {
        let source = self.source_of(bytes)?;
        let mut tuple = Tuple::new(source.schema.clone());
        self.deserialize_into(bytes, &mut tuple)?;
        Ok(tuple)
    }
}
