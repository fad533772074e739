//! Value marshaling for the xlang component ABI
//!
//! This crate converts between host values and the value types that cross
//! the native ABI by value:
//!
//! - **Value structs** with primitive, nested struct and enum fields, built
//!   from positional, named or map input ([`StructType`], [`StructBuilder`])
//! - **Native layout**: natural alignment, little-endian, trailing padding
//!   ([`layout`])
//! - **Rigid Rust mirrors** of native structs and enums
//!   ([`native_struct!`], [`native_enum!`])
//! - **Boxed values** tagged with their property type ([`PropertyValue`])
//!
//! # Example
//!
//! ```
//! use xlang_marshal::{FieldDef, HostValue, PrimitiveKind, StructType};
//!
//! let rational = StructType::new(
//!     "Sample.Numerics.Rational",
//!     vec![
//!         FieldDef::primitive("Numerator", PrimitiveKind::UInt32),
//!         FieldDef::primitive("Denominator", PrimitiveKind::UInt32),
//!     ],
//! );
//!
//! let a = rational.builder().positional(3u32).named("Denominator", 6u32).build().unwrap();
//! let b = rational
//!     .builder()
//!     .positional(HostValue::map([("Numerator", 3u32), ("Denominator", 6u32)]))
//!     .build()
//!     .unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.to_native().len(), 8);
//! ```

mod error;
pub mod foundation;
pub mod layout;
pub mod native;
pub mod property_value;
pub mod structs;

pub use error::{ArgumentError, MarshalError, Result};
pub use foundation::{DateTime, Point, Rect, Size, TimeSpan};
pub use native::{Char16, FieldType, NativeStruct};
pub use property_value::{PropertyType, PropertyValue};
pub use structs::{
    EnumRepr, FieldDef, FieldKind, FieldValue, HostValue, PrimitiveKind, StructBuilder, StructType,
    StructValue,
};

/// Re-export bytes for convenience
pub use bytes::Bytes;
