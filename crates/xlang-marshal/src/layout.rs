//! Native fixed layout of value structs
//!
//! Value structs cross the ABI by value in C layout:
//!
//! - primitives align to their natural size (1, 2, 4 or 8 bytes)
//! - enums are stored as their 4-byte underlying integer
//! - nested structs align to their largest member
//! - the total size is padded to the struct's alignment
//!
//! All integers are little-endian. Padding bytes are written as zero and
//! ignored on read.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::sync::Arc;

use crate::error::{MarshalError, Result};
use crate::structs::{EnumRepr, FieldKind, FieldValue, PrimitiveKind, StructType, StructValue};

/// Padding needed to bring `position` to a multiple of `alignment`
#[inline]
pub fn align_padding(position: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return 0;
    }
    let remainder = position % alignment;
    if remainder == 0 {
        0
    } else {
        alignment - remainder
    }
}

impl PrimitiveKind {
    /// Size in bytes, equal to the alignment
    pub fn size(self) -> usize {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::Int8 | PrimitiveKind::UInt8 => 1,
            PrimitiveKind::Int16 | PrimitiveKind::UInt16 | PrimitiveKind::Char16 => 2,
            PrimitiveKind::Int32 | PrimitiveKind::UInt32 | PrimitiveKind::Float32 => 4,
            PrimitiveKind::Int64 | PrimitiveKind::UInt64 | PrimitiveKind::Float64 => 8,
        }
    }
}

impl FieldKind {
    pub fn size(&self) -> usize {
        match self {
            FieldKind::Primitive(p) => p.size(),
            FieldKind::Struct(ty) => ty.size(),
            FieldKind::Enum { .. } => 4,
        }
    }

    pub fn alignment(&self) -> usize {
        match self {
            FieldKind::Primitive(p) => p.size(),
            FieldKind::Struct(ty) => ty.alignment(),
            FieldKind::Enum { .. } => 4,
        }
    }
}

impl StructType {
    /// Alignment of the struct (its largest member's)
    pub fn alignment(&self) -> usize {
        self.fields()
            .iter()
            .map(|f| f.kind.alignment())
            .max()
            .unwrap_or(1)
    }

    /// Byte offset of every field
    pub fn offsets(&self) -> Vec<usize> {
        let mut position = 0;
        self.fields()
            .iter()
            .map(|f| {
                position += align_padding(position, f.kind.alignment());
                let offset = position;
                position += f.kind.size();
                offset
            })
            .collect()
    }

    /// Size in bytes including trailing padding
    pub fn size(&self) -> usize {
        let end = match (self.offsets().last(), self.fields().last()) {
            (Some(offset), Some(field)) => offset + field.kind.size(),
            _ => 0,
        };
        end + align_padding(end, self.alignment())
    }

    /// Decode an instance from its native bytes
    pub fn from_native(self: &Arc<Self>, bytes: &[u8]) -> Result<StructValue> {
        let needed = self.size();
        if bytes.len() < needed {
            return Err(MarshalError::BufferUnderflow {
                needed,
                have: bytes.len(),
            });
        }
        let mut buf = &bytes[..needed];
        let mut position = 0;
        let value = read_struct(self, &mut buf, &mut position)?;
        if position != needed {
            return Err(MarshalError::Layout(format!(
                "{} decoded {} bytes, expected {}",
                self.name(),
                position,
                needed
            )));
        }
        Ok(value)
    }
}

impl StructValue {
    /// Encode to native bytes
    pub fn to_native(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.struct_type().size());
        write_struct(self, &mut buf);
        buf.freeze()
    }
}

fn pad<B: BufMut>(buf: &mut B, count: usize) {
    for _ in 0..count {
        buf.put_u8(0);
    }
}

fn write_struct(value: &StructValue, buf: &mut BytesMut) {
    let ty = value.struct_type();
    for (def, field) in ty.fields().iter().zip(value.values()) {
        pad(buf, align_padding(buf.len(), def.kind.alignment()));
        match field {
            FieldValue::Struct(nested) => write_struct(nested, buf),
            other => write_primitive(other, buf),
        }
    }
    pad(buf, align_padding(buf.len(), ty.alignment()));
}

fn write_primitive(value: &FieldValue, buf: &mut BytesMut) {
    match *value {
        FieldValue::Bool(v) => buf.put_u8(v as u8),
        FieldValue::Int8(v) => buf.put_i8(v),
        FieldValue::UInt8(v) => buf.put_u8(v),
        FieldValue::Int16(v) => buf.put_i16_le(v),
        FieldValue::UInt16(v) | FieldValue::Char16(v) => buf.put_u16_le(v),
        FieldValue::Int32(v) => buf.put_i32_le(v),
        FieldValue::UInt32(v) => buf.put_u32_le(v),
        FieldValue::Int64(v) => buf.put_i64_le(v),
        FieldValue::UInt64(v) => buf.put_u64_le(v),
        FieldValue::Float32(v) => buf.put_f32_le(v),
        FieldValue::Float64(v) => buf.put_f64_le(v),
        FieldValue::Enum(v) => buf.put_u32_le(v as u32),
        FieldValue::Struct(_) => {}
    }
}

fn read_struct(ty: &Arc<StructType>, buf: &mut &[u8], position: &mut usize) -> Result<StructValue> {
    let mut values = Vec::with_capacity(ty.fields().len());
    for def in ty.fields() {
        skip(buf, position, align_padding(*position, def.kind.alignment()))?;
        let value = match &def.kind {
            FieldKind::Primitive(p) => read_primitive(*p, buf, position)?,
            FieldKind::Struct(nested) => FieldValue::Struct(read_struct(nested, buf, position)?),
            FieldKind::Enum { underlying, .. } => {
                ensure(buf, 4)?;
                *position += 4;
                let raw = buf.get_u32_le();
                FieldValue::Enum(match underlying {
                    EnumRepr::Int32 => i64::from(raw as i32),
                    EnumRepr::UInt32 => i64::from(raw),
                })
            }
        };
        values.push(value);
    }
    skip(buf, position, align_padding(*position, ty.alignment()))?;
    StructValue::from_parts(ty.clone(), values)
}

fn ensure(buf: &&[u8], needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(MarshalError::BufferUnderflow {
            needed,
            have: buf.remaining(),
        });
    }
    Ok(())
}

fn skip(buf: &mut &[u8], position: &mut usize, count: usize) -> Result<()> {
    ensure(buf, count)?;
    buf.advance(count);
    *position += count;
    Ok(())
}

fn read_primitive(kind: PrimitiveKind, buf: &mut &[u8], position: &mut usize) -> Result<FieldValue> {
    ensure(buf, kind.size())?;
    *position += kind.size();
    Ok(match kind {
        PrimitiveKind::Bool => FieldValue::Bool(buf.get_u8() != 0),
        PrimitiveKind::Int8 => FieldValue::Int8(buf.get_i8()),
        PrimitiveKind::UInt8 => FieldValue::UInt8(buf.get_u8()),
        PrimitiveKind::Int16 => FieldValue::Int16(buf.get_i16_le()),
        PrimitiveKind::UInt16 => FieldValue::UInt16(buf.get_u16_le()),
        PrimitiveKind::Char16 => FieldValue::Char16(buf.get_u16_le()),
        PrimitiveKind::Int32 => FieldValue::Int32(buf.get_i32_le()),
        PrimitiveKind::UInt32 => FieldValue::UInt32(buf.get_u32_le()),
        PrimitiveKind::Int64 => FieldValue::Int64(buf.get_i64_le()),
        PrimitiveKind::UInt64 => FieldValue::UInt64(buf.get_u64_le()),
        PrimitiveKind::Float32 => FieldValue::Float32(buf.get_f32_le()),
        PrimitiveKind::Float64 => FieldValue::Float64(buf.get_f64_le()),
    })
}
