//! Per-field wire format.
//!
//! | type          | bytes                                              |
//! |---------------|----------------------------------------------------|
//! | int / long    | ordered varint                                     |
//! | float/double  | 4/8 bytes, big-endian, order-mapped                |
//! | boolean       | 1 byte, 0 or 1                                     |
//! | string        | varint length + UTF-8                              |
//! | enum          | varint ordinal                                     |
//! | object        | varint length (-1 = null) + codec blob             |
//!
//! Every encoding is self-describing in length, so a reader can skip a field
//! without decoding it.

use std::sync::Arc;

use cogroup_core::error::{Error, Result};
use cogroup_core::schema::{DataType, Field};
use cogroup_core::types::Value;

use crate::enums::EnumCache;
use crate::object::ObjectCodecs;
use crate::varint::{read_len, read_varint, read_varint_i32, varint_len, write_varint};

const NULL_OBJECT_LEN: i64 = -1;

/// Map float bits so unsigned big-endian order equals `total_cmp`.
pub fn f64_to_ordered(v: f64) -> [u8; 8] {
    let bits = v.to_bits();
    let mapped = if bits >> 63 == 1 { !bits } else { bits ^ (1 << 63) };
    mapped.to_be_bytes()
}

pub fn f64_from_ordered(bytes: [u8; 8]) -> f64 {
    let mapped = u64::from_be_bytes(bytes);
    let bits = if mapped >> 63 == 1 { mapped ^ (1 << 63) } else { !mapped };
    f64::from_bits(bits)
}

pub fn f32_to_ordered(v: f32) -> [u8; 4] {
    let bits = v.to_bits();
    let mapped = if bits >> 31 == 1 { !bits } else { bits ^ (1 << 31) };
    mapped.to_be_bytes()
}

pub fn f32_from_ordered(bytes: [u8; 4]) -> f32 {
    let mapped = u32::from_be_bytes(bytes);
    let bits = if mapped >> 31 == 1 { mapped ^ (1 << 31) } else { !mapped };
    f32::from_bits(bits)
}

fn take<'a>(buf: &'a [u8], pos: usize, len: usize) -> Result<&'a [u8]> {
    buf.get(pos..pos + len).ok_or_else(|| {
        Error::Codec(format!(
            "need {len} bytes at offset {pos}, buffer has {}",
            buf.len()
        ))
    })
}

/// Check that `value` may be stored in field `name` of type `data_type`.
pub fn check_value(name: &str, data_type: &DataType, value: &Value) -> Result<()> {
    if value.conforms_to(data_type) {
        return Ok(());
    }
    if value.is_null() {
        return Err(Error::NullNotAllowed(name.to_string()));
    }
    Err(Error::FieldTypeMismatch {
        field: name.to_string(),
        expected: data_type.to_string(),
        found: value.kind().to_string(),
    })
}

/// Encodes, decodes and skips single field values. Immutable; share it freely.
#[derive(Debug, Clone)]
pub struct FieldCodec {
    enums: EnumCache,
    objects: Arc<ObjectCodecs>,
    max_field_bytes: usize,
}

impl FieldCodec {
    pub fn new(enums: EnumCache, objects: Arc<ObjectCodecs>, max_field_bytes: usize) -> Self {
        Self {
            enums,
            objects,
            max_field_bytes,
        }
    }

    pub fn enums(&self) -> &EnumCache {
        &self.enums
    }

    pub fn objects(&self) -> &ObjectCodecs {
        &self.objects
    }

    pub fn max_field_bytes(&self) -> usize {
        self.max_field_bytes
    }

    /// Append the encoding of `value` to `out`. Object blobs are staged in
    /// `scratch`, which is cleared first.
    pub fn encode(
        &self,
        field: &Field,
        value: &Value,
        scratch: &mut Vec<u8>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        check_value(&field.name, &field.data_type, value)?;
        match (value, &field.data_type) {
            (Value::Int32(v), _) => write_varint(out, i64::from(*v)),
            (Value::Int64(v), _) => write_varint(out, *v),
            (Value::Float32(v), _) => out.extend_from_slice(&f32_to_ordered(*v)),
            (Value::Float64(v), _) => out.extend_from_slice(&f64_to_ordered(*v)),
            (Value::Bool(v), _) => out.push(u8::from(*v)),
            (Value::Str(s), _) => {
                if s.len() > self.max_field_bytes {
                    return Err(Error::Codec(format!(
                        "field '{}' holds {} bytes, limit is {}",
                        field.name,
                        s.len(),
                        self.max_field_bytes
                    )));
                }
                write_varint(out, s.len() as i64);
                out.extend_from_slice(s.as_bytes());
            }
            (Value::Enum(e), _) => write_varint(out, i64::from(e.ordinal)),
            (Value::Null, DataType::Object(_)) => write_varint(out, NULL_OBJECT_LEN),
            (Value::Object(o), DataType::Object(codec)) => {
                scratch.clear();
                self.objects.get(codec)?.encode(o, scratch)?;
                write_varint(out, scratch.len() as i64);
                out.extend_from_slice(scratch);
            }
            _ => {
                return Err(Error::Invariant(format!(
                    "value {} passed the type check for field '{}' but has no encoding",
                    value.kind(),
                    field.name
                )))
            }
        }
        Ok(())
    }

    /// Decode one value of type `data_type` at `pos`; returns `(value, bytes consumed)`.
    pub fn decode(&self, buf: &[u8], pos: usize, data_type: &DataType) -> Result<(Value, usize)> {
        match data_type {
            DataType::Int32 => {
                let (v, n) = read_varint_i32(buf, pos)?;
                Ok((Value::Int32(v), n))
            }
            DataType::Int64 => {
                let (v, n) = read_varint(buf, pos)?;
                Ok((Value::Int64(v), n))
            }
            DataType::Float32 => {
                let mut b = [0u8; 4];
                b.copy_from_slice(take(buf, pos, 4)?);
                Ok((Value::Float32(f32_from_ordered(b)), 4))
            }
            DataType::Float64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(take(buf, pos, 8)?);
                Ok((Value::Float64(f64_from_ordered(b)), 8))
            }
            DataType::Boolean => match take(buf, pos, 1)?[0] {
                0 => Ok((Value::Bool(false), 1)),
                1 => Ok((Value::Bool(true), 1)),
                other => Err(Error::Codec(format!(
                    "invalid boolean byte {other} at offset {pos}"
                ))),
            },
            DataType::Utf8 => {
                let (payload, n) = self.string_bytes(buf, pos)?;
                let s = std::str::from_utf8(payload)
                    .map_err(|e| Error::Codec(format!("invalid UTF-8 at offset {pos}: {e}")))?;
                Ok((Value::Str(s.to_string()), n))
            }
            DataType::Enum(ty) => {
                let (ordinal, n) = read_len(buf, pos, u32::MAX as usize)?;
                Ok((Value::Enum(self.enums.resolve(&ty.name, ordinal)?), n))
            }
            DataType::Object(codec) => {
                let (len, n) = read_varint(buf, pos)?;
                if len == NULL_OBJECT_LEN {
                    return Ok((Value::Null, n));
                }
                let (len, n) = read_len(buf, pos, self.max_field_bytes)?;
                let blob = take(buf, pos + n, len)?;
                let value = self.objects.get(codec)?.decode(blob)?;
                Ok((Value::Object(value), n + len))
            }
        }
    }

    /// Length of the encoded value at `pos`, reading only its length prefix.
    pub fn skip(&self, buf: &[u8], pos: usize, data_type: &DataType) -> Result<usize> {
        let n = match data_type {
            DataType::Int32 | DataType::Int64 | DataType::Enum(_) => varint_len(buf, pos)?,
            DataType::Float32 => 4,
            DataType::Float64 => 8,
            DataType::Boolean => 1,
            DataType::Utf8 => self.string_bytes(buf, pos)?.1,
            DataType::Object(_) => {
                let (len, n) = read_varint(buf, pos)?;
                if len == NULL_OBJECT_LEN {
                    n
                } else {
                    let (len, n) = read_len(buf, pos, self.max_field_bytes)?;
                    n + len
                }
            }
        };
        take(buf, pos, n)?;
        Ok(n)
    }

    /// Payload of the string at `pos` and the total encoded length.
    pub fn string_bytes<'a>(&self, buf: &'a [u8], pos: usize) -> Result<(&'a [u8], usize)> {
        let (len, n) = read_len(buf, pos, self.max_field_bytes)?;
        Ok((take(buf, pos + n, len)?, n + len))
    }
}
