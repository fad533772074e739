//! Strongly typed value structs and enums
//!
//! [`native_struct!`](crate::native_struct) and
//! [`native_enum!`](crate::native_enum) declare `#[repr(C)]` Rust types that
//! mirror native value types field for field. They are rigid: flexible host
//! input is resolved by the [`StructType`] describing the type (see
//! [`NativeStruct::construct`] and [`NativeStruct::from_host`]) and only a
//! fully converted value reaches the Rust type.
//!
//! ```
//! use xlang_marshal::{native_enum, native_struct, HostValue, NativeStruct};
//!
//! native_enum! {
//!     pub enum PixelFormat("Sample.DirectX.PixelFormat"): i32 {
//!         Unknown = 0,
//!         R8G8B8A8 = 28,
//!     }
//! }
//!
//! native_struct! {
//!     pub struct Surface("Sample.DirectX.Surface") {
//!         pub width: i32 => "Width",
//!         pub height: i32 => "Height",
//!         pub format: PixelFormat => "Format",
//!     }
//! }
//!
//! let s = Surface::construct(vec![4.into(), 8.into()], vec![("Format".into(), 28.into())]).unwrap();
//! assert_eq!(s.format, PixelFormat::R8G8B8A8);
//! assert_eq!(Surface::struct_type().size(), 12);
//! ```

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

use crate::error::{ArgumentError, Result};
use crate::structs::{
    host_char16, EnumRepr, FieldKind, FieldValue, HostValue, PrimitiveKind, StructType, StructValue,
};

/// A Rust type laid out like a native value struct
pub trait NativeStruct: Sized {
    /// Runtime description shared by all instances
    fn struct_type() -> Arc<StructType>;

    /// Convert to the runtime representation
    fn to_value(&self) -> StructValue;

    /// Convert from the runtime representation
    fn from_value(value: &StructValue) -> Result<Self>;

    /// Build from positional and named host arguments
    fn construct(positional: Vec<HostValue>, named: Vec<(String, HostValue)>) -> Result<Self> {
        Self::from_value(&Self::struct_type().construct(positional, named)?)
    }

    /// Accept an instance, a map of field names or a positional list
    fn from_host(value: HostValue) -> Result<Self> {
        let ty = Self::struct_type();
        let label = ty.name().to_string();
        Self::from_value(&ty.coerce(&label, value)?)
    }

    /// Encode to native bytes
    fn to_native(&self) -> Bytes {
        self.to_value().to_native()
    }

    /// Decode from native bytes
    fn from_native(bytes: &[u8]) -> Result<Self> {
        Self::from_value(&Self::struct_type().from_native(bytes)?)
    }
}

/// A Rust type usable as a field of a [`NativeStruct`]
pub trait FieldType: Sized {
    fn field_kind() -> FieldKind;
    fn to_field(&self) -> FieldValue;
    /// `None` when the value is of another kind
    fn from_field(value: &FieldValue) -> Option<Self>;
}

/// Underlying integer of a [`native_enum!`](crate::native_enum) type
pub trait EnumUnderlying: Copy + Into<i64> + TryFrom<i64> {
    const REPR: EnumRepr;
}

impl EnumUnderlying for i32 {
    const REPR: EnumRepr = EnumRepr::Int32;
}

impl EnumUnderlying for u32 {
    const REPR: EnumRepr = EnumRepr::UInt32;
}

macro_rules! impl_field_primitive {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl FieldType for $ty {
                fn field_kind() -> FieldKind {
                    FieldKind::Primitive(PrimitiveKind::$kind)
                }

                fn to_field(&self) -> FieldValue {
                    FieldValue::$kind(*self)
                }

                fn from_field(value: &FieldValue) -> Option<Self> {
                    match value {
                        FieldValue::$kind(v) => Some(*v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_field_primitive! {
    bool => Bool,
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

/// A UTF-16 code unit, distinct from `u16` numbers
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Char16(pub u16);

impl Char16 {
    /// The code unit as a `char`, if it is not a surrogate
    pub fn to_char(self) -> Option<char> {
        char::from_u32(u32::from(self.0))
    }

    /// Accept a code unit or a one-unit string
    pub fn from_host(label: &str, value: &HostValue) -> Result<Self> {
        host_char16(label, value).map(Self)
    }
}

impl From<Char16> for HostValue {
    fn from(value: Char16) -> Self {
        HostValue::Char16(value.0)
    }
}

impl fmt::Debug for Char16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_char() {
            Some(c) => write!(f, "Char16({:?})", c),
            None => write!(f, "Char16(0x{:04X})", self.0),
        }
    }
}

impl FieldType for Char16 {
    fn field_kind() -> FieldKind {
        FieldKind::Primitive(PrimitiveKind::Char16)
    }

    fn to_field(&self) -> FieldValue {
        FieldValue::Char16(self.0)
    }

    fn from_field(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Char16(v) => Some(Self(*v)),
            _ => None,
        }
    }
}

#[doc(hidden)]
pub fn __missing_kind(ty: &str, field: &str, expected: &str) -> crate::MarshalError {
    ArgumentError::WrongKind {
        field: format!("{}.{}", ty, field),
        expected: expected.to_string(),
        actual: "field value",
    }
    .into()
}

/// Declare a `#[repr(C)]` value struct mirroring a native type
///
/// Each field names its Rust type and its native field name. Field types
/// must implement [`FieldType`]: primitives, [`Char16`], other
/// `native_struct!` types and `native_enum!` types.
#[macro_export]
macro_rules! native_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($abi_name:literal) {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $fty:ty => $fname:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Debug, Clone, PartialEq, Default)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $fty,
            )*
        }

        impl $crate::NativeStruct for $name {
            fn struct_type() -> ::std::sync::Arc<$crate::StructType> {
                static TYPE: ::std::sync::OnceLock<::std::sync::Arc<$crate::StructType>> =
                    ::std::sync::OnceLock::new();
                TYPE.get_or_init(|| {
                    $crate::StructType::new(
                        $abi_name,
                        vec![$(
                            $crate::FieldDef::new($fname, <$fty as $crate::FieldType>::field_kind()),
                        )*],
                    )
                })
                .clone()
            }

            fn to_value(&self) -> $crate::StructValue {
                $crate::StructValue::from_parts_unchecked(
                    <Self as $crate::NativeStruct>::struct_type(),
                    vec![$( $crate::FieldType::to_field(&self.$field), )*],
                )
            }

            fn from_value(value: &$crate::StructValue) -> $crate::Result<Self> {
                value.expect_type($abi_name)?;
                Ok(Self {
                    $(
                        $field: <$fty as $crate::FieldType>::from_field(value.field($fname)?)
                            .ok_or_else(|| {
                                $crate::native::__missing_kind($abi_name, $fname, stringify!($fty))
                            })?,
                    )*
                })
            }
        }

        impl $crate::FieldType for $name {
            fn field_kind() -> $crate::FieldKind {
                $crate::FieldKind::Struct(<Self as $crate::NativeStruct>::struct_type())
            }

            fn to_field(&self) -> $crate::FieldValue {
                $crate::FieldValue::Struct($crate::NativeStruct::to_value(self))
            }

            fn from_field(value: &$crate::FieldValue) -> Option<Self> {
                match value {
                    $crate::FieldValue::Struct(v) => {
                        <Self as $crate::NativeStruct>::from_value(v).ok()
                    }
                    _ => None,
                }
            }
        }

        impl From<$name> for $crate::HostValue {
            fn from(value: $name) -> Self {
                $crate::HostValue::Struct($crate::NativeStruct::to_value(&value))
            }
        }
    };
}

/// Declare a native enum as a transparent integer newtype
///
/// Named members become associated constants. Any code of the underlying
/// type is a valid value, including codes with no named member.
#[macro_export]
macro_rules! native_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident($abi_name:literal): $repr:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name(pub $repr);

        #[allow(non_upper_case_globals)]
        impl $name {
            $(
                $(#[$vmeta])*
                pub const $variant: Self = Self($value);
            )*

            /// The integral code
            pub const fn code(self) -> $repr {
                self.0
            }

            /// Name of the matching member, if any
            pub fn name(self) -> Option<&'static str> {
                $(
                    if self == Self::$variant {
                        return Some(stringify!($variant));
                    }
                )*
                None
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self.name() {
                    Some(member) => write!(f, "{}::{}", stringify!($name), member),
                    None => write!(f, "{}({})", stringify!($name), self.0),
                }
            }
        }

        impl From<$repr> for $name {
            fn from(code: $repr) -> Self {
                Self(code)
            }
        }

        impl From<$name> for $crate::HostValue {
            fn from(value: $name) -> Self {
                $crate::HostValue::from(value.0)
            }
        }

        impl $crate::FieldType for $name {
            fn field_kind() -> $crate::FieldKind {
                $crate::FieldKind::Enum {
                    name: $abi_name.to_string(),
                    underlying: <$repr as $crate::native::EnumUnderlying>::REPR,
                }
            }

            fn to_field(&self) -> $crate::FieldValue {
                $crate::FieldValue::Enum(::std::convert::Into::<i64>::into(self.0))
            }

            fn from_field(value: &$crate::FieldValue) -> Option<Self> {
                match value {
                    $crate::FieldValue::Enum(code) => <$repr>::try_from(*code).ok().map(Self),
                    _ => None,
                }
            }
        }
    };
}
