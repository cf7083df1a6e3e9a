#![forbid(unsafe_code)]
//! cogroup-codec: the record wire format.
//!
//! Records are laid out per the `GroupingPlan`: common fields first, then the
//! source's specific fields. Every field encoding keeps unsigned byte order
//! equal to the field's natural order (objects excepted), which is what lets
//! `cogroup-operators` compare records without decoding them.
//!
//! Serializers, deserializers and the field codec are immutable; callers own
//! the scratch/output buffers and the tuples they decode into.

pub mod deserializer;
pub mod enums;
pub mod field;
pub mod object;
pub mod serializer;
pub mod varint;

pub use deserializer::{decode, read_source_id, TupleDeserializer};
pub use enums::EnumCache;
pub use field::FieldCodec;
pub use object::{JsonObjectCodec, ObjectCodec, ObjectCodecs};
pub use serializer::{encode, field_codec_for, TupleSerializer};
