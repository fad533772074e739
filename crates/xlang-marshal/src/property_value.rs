//! Boxed property values
//!
//! A [`PropertyValue`] is a scalar or a homogeneous array tagged with its
//! [`PropertyType`]. The discriminant codes follow the native numbering;
//! every array kind is its element kind plus 1024.
//!
//! | Code | Kind       | Code | Kind        |
//! |------|------------|------|-------------|
//! | 0    | Empty      | 11   | Boolean     |
//! | 1    | UInt8      | 12   | String      |
//! | 2    | Int16      | 13   | Inspectable |
//! | 3    | UInt16     | 14   | DateTime    |
//! | 4    | Int32      | 15   | TimeSpan    |
//! | 5    | UInt32     | 16   | Guid        |
//! | 6    | Int64      | 17   | Point       |
//! | 7    | UInt64     | 18   | Size        |
//! | 8    | Single     | 19   | Rect        |
//! | 9    | Double     | 20   | OtherType   |
//! | 10   | Char16     |      |             |
//!
//! Accessors never coerce: reading a value as a kind it does not hold fails
//! with [`MarshalError::TypeMismatch`].

use std::fmt;

use xlang_pal::Guid;

use crate::error::{ArgumentError, MarshalError, Result};
use crate::foundation::{DateTime, Point, Rect, Size, TimeSpan};
use crate::native::{Char16, NativeStruct};
use crate::structs::{host_bool, host_float, host_integer, wrong_kind, HostValue};

const ARRAY_FLAG: i32 = 1024;

macro_rules! property_types {
    ($( $scalar:ident = $code:expr, $array:ident; )*) => {
        /// Discriminant of a boxed value
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum PropertyType {
            Empty = 0,
            $( $scalar = $code, )*
            $( $array = $code + ARRAY_FLAG, )*
        }

        impl PropertyType {
            /// Look up a native discriminant code
            pub fn from_code(code: i32) -> Option<Self> {
                match code {
                    0 => Some(PropertyType::Empty),
                    $(
                        c if c == $code => Some(PropertyType::$scalar),
                        c if c == $code + ARRAY_FLAG => Some(PropertyType::$array),
                    )*
                    _ => None,
                }
            }
        }
    };
}

property_types! {
    UInt8 = 1, UInt8Array;
    Int16 = 2, Int16Array;
    UInt16 = 3, UInt16Array;
    Int32 = 4, Int32Array;
    UInt32 = 5, UInt32Array;
    Int64 = 6, Int64Array;
    UInt64 = 7, UInt64Array;
    Single = 8, SingleArray;
    Double = 9, DoubleArray;
    Char16 = 10, Char16Array;
    Boolean = 11, BooleanArray;
    String = 12, StringArray;
    Inspectable = 13, InspectableArray;
    DateTime = 14, DateTimeArray;
    TimeSpan = 15, TimeSpanArray;
    Guid = 16, GuidArray;
    Point = 17, PointArray;
    Size = 18, SizeArray;
    Rect = 19, RectArray;
    OtherType = 20, OtherTypeArray;
}

impl PropertyType {
    /// Native discriminant code
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_array(self) -> bool {
        self.code() >= ARRAY_FLAG
    }

    /// Element kind of an array kind
    pub fn element_type(self) -> Option<Self> {
        if self.is_array() {
            Self::from_code(self.code() - ARRAY_FLAG)
        } else {
            None
        }
    }

    /// Array kind of a scalar kind
    pub fn array_of(self) -> Option<Self> {
        if self.is_array() || self == PropertyType::Empty {
            None
        } else {
            Self::from_code(self.code() + ARRAY_FLAG)
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Scalar types that can be boxed
trait Element: Sized {
    const KIND: PropertyType;
    fn from_host(value: HostValue) -> Result<Self>;
    fn to_host(&self) -> HostValue;
}

fn label(kind: PropertyType) -> String {
    format!("PropertyValue({})", kind)
}

macro_rules! integer_elements {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const KIND: PropertyType = PropertyType::$kind;

                fn from_host(value: HostValue) -> Result<Self> {
                    host_integer(&label(Self::KIND), stringify!($kind), &value)
                }

                fn to_host(&self) -> HostValue {
                    HostValue::from(*self)
                }
            }
        )*
    };
}

integer_elements! {
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
}

impl Element for f32 {
    const KIND: PropertyType = PropertyType::Single;

    fn from_host(value: HostValue) -> Result<Self> {
        host_float(&label(Self::KIND), "Single", &value).map(|v| v as f32)
    }

    fn to_host(&self) -> HostValue {
        HostValue::from(*self)
    }
}

impl Element for f64 {
    const KIND: PropertyType = PropertyType::Double;

    fn from_host(value: HostValue) -> Result<Self> {
        host_float(&label(Self::KIND), "Double", &value)
    }

    fn to_host(&self) -> HostValue {
        HostValue::Float(*self)
    }
}

impl Element for Char16 {
    const KIND: PropertyType = PropertyType::Char16;

    fn from_host(value: HostValue) -> Result<Self> {
        Char16::from_host(&label(Self::KIND), &value)
    }

    fn to_host(&self) -> HostValue {
        HostValue::Char16(self.0)
    }
}

impl Element for bool {
    const KIND: PropertyType = PropertyType::Boolean;

    fn from_host(value: HostValue) -> Result<Self> {
        host_bool(&label(Self::KIND), &value)
    }

    fn to_host(&self) -> HostValue {
        HostValue::Bool(*self)
    }
}

impl Element for String {
    const KIND: PropertyType = PropertyType::String;

    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Str(s) => Ok(s),
            other => Err(wrong_kind(&label(Self::KIND), "String", &other)),
        }
    }

    fn to_host(&self) -> HostValue {
        HostValue::Str(self.clone())
    }
}

impl Element for Guid {
    const KIND: PropertyType = PropertyType::Guid;

    fn from_host(value: HostValue) -> Result<Self> {
        match value {
            HostValue::Guid(g) => Ok(g),
            HostValue::Str(ref s) => Guid::parse(s).map_err(|e| {
                ArgumentError::WrongKind {
                    field: label(Self::KIND),
                    expected: format!("Guid ({})", e),
                    actual: "str",
                }
                .into()
            }),
            other => Err(wrong_kind(&label(Self::KIND), "Guid", &other)),
        }
    }

    fn to_host(&self) -> HostValue {
        HostValue::Guid(*self)
    }
}

// Time values also accept a bare tick count
macro_rules! tick_elements {
    ($($ty:ident => $field:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const KIND: PropertyType = PropertyType::$ty;

                fn from_host(value: HostValue) -> Result<Self> {
                    match value {
                        HostValue::Int(_) | HostValue::UInt(_) => {
                            host_integer(&label(Self::KIND), "Int64", &value).map(|$field| Self { $field })
                        }
                        other => <$ty as NativeStruct>::from_host(other),
                    }
                }

                fn to_host(&self) -> HostValue {
                    HostValue::Struct(self.to_value())
                }
            }
        )*
    };
}

tick_elements! {
    DateTime => universal_time,
    TimeSpan => duration,
}

macro_rules! struct_elements {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const KIND: PropertyType = PropertyType::$ty;

                fn from_host(value: HostValue) -> Result<Self> {
                    <$ty as NativeStruct>::from_host(value)
                }

                fn to_host(&self) -> HostValue {
                    HostValue::Struct(self.to_value())
                }
            }
        )*
    };
}

struct_elements!(Point, Size, Rect);

macro_rules! property_values {
    ($( $scalar:ident($ty:ty), $array:ident, $get:ident, $get_array:ident; )*) => {
        /// Boxed scalar or array value
        #[derive(Debug, Clone, PartialEq, Default)]
        pub enum PropertyValue {
            #[default]
            Empty,
            $(
                $scalar($ty),
                $array(Vec<$ty>),
            )*
        }

        impl PropertyValue {
            /// Discriminant of the held value
            pub fn property_type(&self) -> PropertyType {
                match self {
                    PropertyValue::Empty => PropertyType::Empty,
                    $(
                        PropertyValue::$scalar(_) => PropertyType::$scalar,
                        PropertyValue::$array(_) => PropertyType::$array,
                    )*
                }
            }

            /// Box a host value as the given kind, converting with range checks
            pub fn boxed(value: HostValue, kind: PropertyType) -> Result<Self> {
                match kind {
                    $(
                        PropertyType::$scalar => <$ty as Element>::from_host(value).map(PropertyValue::$scalar),
                        PropertyType::$array => match value {
                            HostValue::List(items) => items
                                .into_iter()
                                .map(<$ty as Element>::from_host)
                                .collect::<Result<Vec<_>>>()
                                .map(PropertyValue::$array),
                            other => Err(wrong_kind(&label(kind), "list", &other)),
                        },
                    )*
                    other => Err(MarshalError::Unsupported(other)),
                }
            }

            /// Read the value back as host input, failing unless it holds `kind`
            pub fn unbox_as(&self, kind: PropertyType) -> Result<HostValue> {
                let actual = self.property_type();
                if actual != kind {
                    return Err(MarshalError::TypeMismatch { expected: kind, actual });
                }
                match self {
                    PropertyValue::Empty => Err(MarshalError::Unsupported(PropertyType::Empty)),
                    $(
                        PropertyValue::$scalar(v) => Ok(v.to_host()),
                        PropertyValue::$array(items) => {
                            Ok(HostValue::List(items.iter().map(Element::to_host).collect()))
                        }
                    )*
                }
            }

            $(
                pub fn $get(&self) -> Result<$ty> {
                    match self {
                        PropertyValue::$scalar(v) => Ok(v.clone()),
                        other => Err(MarshalError::TypeMismatch {
                            expected: PropertyType::$scalar,
                            actual: other.property_type(),
                        }),
                    }
                }

                pub fn $get_array(&self) -> Result<&[$ty]> {
                    match self {
                        PropertyValue::$array(v) => Ok(v),
                        other => Err(MarshalError::TypeMismatch {
                            expected: PropertyType::$array,
                            actual: other.property_type(),
                        }),
                    }
                }
            )*
        }

        $(
            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    PropertyValue::$scalar(value)
                }
            }

            impl From<Vec<$ty>> for PropertyValue {
                fn from(value: Vec<$ty>) -> Self {
                    PropertyValue::$array(value)
                }
            }
        )*
    };
}

property_values! {
    UInt8(u8), UInt8Array, get_uint8, get_uint8_array;
    Int16(i16), Int16Array, get_int16, get_int16_array;
    UInt16(u16), UInt16Array, get_uint16, get_uint16_array;
    Int32(i32), Int32Array, get_int32, get_int32_array;
    UInt32(u32), UInt32Array, get_uint32, get_uint32_array;
    Int64(i64), Int64Array, get_int64, get_int64_array;
    UInt64(u64), UInt64Array, get_uint64, get_uint64_array;
    Single(f32), SingleArray, get_single, get_single_array;
    Double(f64), DoubleArray, get_double, get_double_array;
    Char16(Char16), Char16Array, get_char16, get_char16_array;
    Boolean(bool), BooleanArray, get_boolean, get_boolean_array;
    String(String), StringArray, get_string, get_string_array;
    Guid(Guid), GuidArray, get_guid, get_guid_array;
    DateTime(DateTime), DateTimeArray, get_date_time, get_date_time_array;
    TimeSpan(TimeSpan), TimeSpanArray, get_time_span, get_time_span_array;
    Point(Point), PointArray, get_point, get_point_array;
    Size(Size), SizeArray, get_size, get_size_array;
    Rect(Rect), RectArray, get_rect, get_rect_array;
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl PropertyValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, PropertyValue::Empty)
    }

    /// Number of elements of an array value
    pub fn array_len(&self) -> Option<usize> {
        if !self.property_type().is_array() {
            return None;
        }
        match self.unbox_as(self.property_type()) {
            Ok(HostValue::List(items)) => Some(items.len()),
            _ => None,
        }
    }
}
