//! Value struct definitions and flexible construction
//!
//! A [`StructType`] is the runtime description of a native value struct: an
//! ordered list of named fields, each a primitive, a nested struct or an
//! enum stored as its integral code. Instances are [`StructValue`]s.
//!
//! Host input arrives in three shapes which may be mixed:
//!
//! - positional: `Rational(3, 6)`
//! - named: `Rational(Numerator = 3, Denominator = 6)`
//! - map: `Rational({"Numerator": 3, "Denominator": 6})`
//!
//! [`StructBuilder`] resolves all of them to one value. A single positional
//! map with no named arguments is always map construction.

use std::fmt;
use std::sync::Arc;

use tracing::trace;
use xlang_pal::Guid;

use crate::error::{ArgumentError, MarshalError, Result};

/// Primitive field kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Char16,
}

impl PrimitiveKind {
    /// Name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "Boolean",
            PrimitiveKind::Int8 => "Int8",
            PrimitiveKind::UInt8 => "UInt8",
            PrimitiveKind::Int16 => "Int16",
            PrimitiveKind::UInt16 => "UInt16",
            PrimitiveKind::Int32 => "Int32",
            PrimitiveKind::UInt32 => "UInt32",
            PrimitiveKind::Int64 => "Int64",
            PrimitiveKind::UInt64 => "UInt64",
            PrimitiveKind::Float32 => "Single",
            PrimitiveKind::Float64 => "Double",
            PrimitiveKind::Char16 => "Char16",
        }
    }

    fn zero(self) -> FieldValue {
        match self {
            PrimitiveKind::Bool => FieldValue::Bool(false),
            PrimitiveKind::Int8 => FieldValue::Int8(0),
            PrimitiveKind::UInt8 => FieldValue::UInt8(0),
            PrimitiveKind::Int16 => FieldValue::Int16(0),
            PrimitiveKind::UInt16 => FieldValue::UInt16(0),
            PrimitiveKind::Int32 => FieldValue::Int32(0),
            PrimitiveKind::UInt32 => FieldValue::UInt32(0),
            PrimitiveKind::Int64 => FieldValue::Int64(0),
            PrimitiveKind::UInt64 => FieldValue::UInt64(0),
            PrimitiveKind::Float32 => FieldValue::Float32(0.0),
            PrimitiveKind::Float64 => FieldValue::Float64(0.0),
            PrimitiveKind::Char16 => FieldValue::Char16(0),
        }
    }
}

/// Underlying integral type of an enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumRepr {
    Int32,
    UInt32,
}

/// Kind of a struct field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Primitive(PrimitiveKind),
    Struct(Arc<StructType>),
    Enum { name: String, underlying: EnumRepr },
}

/// One named field of a struct
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn primitive(name: impl Into<String>, kind: PrimitiveKind) -> Self {
        Self::new(name, FieldKind::Primitive(kind))
    }

    pub fn nested(name: impl Into<String>, ty: Arc<StructType>) -> Self {
        Self::new(name, FieldKind::Struct(ty))
    }

    pub fn enumeration(name: impl Into<String>, enum_name: impl Into<String>, underlying: EnumRepr) -> Self {
        Self::new(
            name,
            FieldKind::Enum {
                name: enum_name.into(),
                underlying,
            },
        )
    }
}

/// Runtime description of a native value struct
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    name: String,
    fields: Vec<FieldDef>,
}

impl StructType {
    /// Define a struct type
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            fields,
        })
    }

    /// Fully qualified type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Position of a field by name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Start building an instance
    pub fn builder(self: &Arc<Self>) -> StructBuilder {
        StructBuilder {
            ty: self.clone(),
            positional: Vec::new(),
            named: Vec::new(),
        }
    }

    /// Build from positional and named arguments in one call
    pub fn construct(
        self: &Arc<Self>,
        positional: Vec<HostValue>,
        named: Vec<(String, HostValue)>,
    ) -> Result<StructValue> {
        StructBuilder {
            ty: self.clone(),
            positional,
            named,
        }
        .build()
    }

    /// Build from a map of field names to values
    ///
    /// Every field must be present; keys that name no field are rejected.
    pub fn from_map(self: &Arc<Self>, entries: Vec<(String, HostValue)>) -> Result<StructValue> {
        let mut slots: Vec<Option<HostValue>> = vec![None; self.fields.len()];
        for (key, value) in entries {
            let index = self.field_index(&key).ok_or_else(|| ArgumentError::UnknownField {
                ty: self.name.clone(),
                field: key.clone(),
            })?;
            if slots[index].is_some() {
                return Err(self.ambiguous(&key));
            }
            slots[index] = Some(value);
        }
        self.resolve(slots)
    }

    /// The default instance: every primitive zero, every enum code zero
    pub fn zeroed(self: &Arc<Self>) -> StructValue {
        let values = self
            .fields
            .iter()
            .map(|f| match &f.kind {
                FieldKind::Primitive(kind) => kind.zero(),
                FieldKind::Struct(nested) => FieldValue::Struct(nested.zeroed()),
                FieldKind::Enum { .. } => FieldValue::Enum(0),
            })
            .collect();
        StructValue {
            ty: self.clone(),
            values,
        }
    }

    /// Accept a host value standing for an instance of this type: an
    /// instance, a map of field names or a positional list
    pub fn coerce(self: &Arc<Self>, label: &str, value: HostValue) -> Result<StructValue> {
        match value {
            HostValue::Struct(v) if Arc::ptr_eq(&v.ty, self) || *v.ty == **self => Ok(v),
            HostValue::Map(entries) => self.from_map(entries),
            HostValue::List(items) => self.construct(items, Vec::new()),
            other => Err(wrong_kind(label, &self.name, &other)),
        }
    }

    fn ambiguous(&self, field: &str) -> MarshalError {
        ArgumentError::Ambiguous {
            ty: self.name.clone(),
            field: field.to_string(),
        }
        .into()
    }

    fn resolve(self: &Arc<Self>, slots: Vec<Option<HostValue>>) -> Result<StructValue> {
        let mut values = Vec::with_capacity(slots.len());
        for (def, slot) in self.fields.iter().zip(slots) {
            let value = slot.ok_or_else(|| ArgumentError::MissingField {
                ty: self.name.clone(),
                field: def.name.clone(),
            })?;
            let label = format!("{}.{}", self.name, def.name);
            values.push(convert_field(&label, &def.kind, value)?);
        }
        Ok(StructValue {
            ty: self.clone(),
            values,
        })
    }
}

/// Collects construction arguments for one struct instance
#[derive(Debug, Clone)]
pub struct StructBuilder {
    ty: Arc<StructType>,
    positional: Vec<HostValue>,
    named: Vec<(String, HostValue)>,
}

impl StructBuilder {
    /// Append a positional argument
    pub fn positional(mut self, value: impl Into<HostValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Add a named argument
    pub fn named(mut self, name: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    /// Resolve the arguments and convert every field
    pub fn build(mut self) -> Result<StructValue> {
        let ty = self.ty;
        trace!(
            "Building {} from {} positional and {} named arguments",
            ty.name,
            self.positional.len(),
            self.named.len()
        );

        if self.named.is_empty() && matches!(self.positional.as_slice(), [HostValue::Map(_)]) {
            if let Some(HostValue::Map(entries)) = self.positional.pop() {
                return ty.from_map(entries);
            }
        }

        if self.positional.len() > ty.fields.len() {
            return Err(ArgumentError::TooManyArguments {
                ty: ty.name.clone(),
                max: ty.fields.len(),
                given: self.positional.len(),
            }
            .into());
        }

        let mut slots: Vec<Option<HostValue>> = vec![None; ty.fields.len()];
        for (slot, value) in slots.iter_mut().zip(self.positional) {
            *slot = Some(value);
        }
        for (name, value) in self.named {
            let index = ty.field_index(&name).ok_or_else(|| ArgumentError::UnknownField {
                ty: ty.name.clone(),
                field: name.clone(),
            })?;
            if slots[index].is_some() {
                return Err(ty.ambiguous(&name));
            }
            slots[index] = Some(value);
        }

        ty.resolve(slots)
    }
}

/// Host-side input value
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char16(u16),
    Str(String),
    Guid(Guid),
    Struct(StructValue),
    Map(Vec<(String, HostValue)>),
    List(Vec<HostValue>),
}

impl HostValue {
    /// Build a map value from key/value pairs
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<HostValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        HostValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Build a list value
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<HostValue>,
        I: IntoIterator<Item = V>,
    {
        HostValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Kind name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) | HostValue::UInt(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Char16(_) => "char16",
            HostValue::Str(_) => "str",
            HostValue::Guid(_) => "guid",
            HostValue::Struct(_) => "struct",
            HostValue::Map(_) => "map",
            HostValue::List(_) => "list",
        }
    }
}

macro_rules! host_from {
    ($variant:ident: $($ty:ty => $conv:ty),* $(,)?) => {
        $(
            impl From<$ty> for HostValue {
                fn from(value: $ty) -> Self {
                    HostValue::$variant(<$conv>::from(value))
                }
            }
        )*
    };
}

host_from!(Int: i8 => i64, i16 => i64, i32 => i64, i64 => i64);
host_from!(UInt: u8 => u64, u16 => u64, u32 => u64, u64 => u64);
host_from!(Float: f32 => f64, f64 => f64);
host_from!(Bool: bool => bool);
host_from!(Str: String => String, &str => String);
host_from!(Guid: Guid => Guid);
host_from!(Struct: StructValue => StructValue);

/// A converted field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Char16(u16),
    /// Enum code, whatever the underlying type
    Enum(i64),
    Struct(StructValue),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer or enum code, widened
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::Int8(v) => Some(v.into()),
            FieldValue::UInt8(v) => Some(v.into()),
            FieldValue::Int16(v) => Some(v.into()),
            FieldValue::UInt16(v) => Some(v.into()),
            FieldValue::Int32(v) => Some(v.into()),
            FieldValue::UInt32(v) => Some(v.into()),
            FieldValue::Int64(v) | FieldValue::Enum(v) => Some(v),
            FieldValue::UInt64(v) => i64::try_from(v).ok(),
            FieldValue::Char16(v) => Some(v.into()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Float32(v) => Some(v.into()),
            FieldValue::Float64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            FieldValue::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Convert back to host input form
    pub fn to_host(&self) -> HostValue {
        match self {
            FieldValue::Bool(v) => HostValue::Bool(*v),
            FieldValue::Int8(v) => HostValue::from(*v),
            FieldValue::UInt8(v) => HostValue::from(*v),
            FieldValue::Int16(v) => HostValue::from(*v),
            FieldValue::UInt16(v) => HostValue::from(*v),
            FieldValue::Int32(v) => HostValue::from(*v),
            FieldValue::UInt32(v) => HostValue::from(*v),
            FieldValue::Int64(v) | FieldValue::Enum(v) => HostValue::Int(*v),
            FieldValue::UInt64(v) => HostValue::UInt(*v),
            FieldValue::Float32(v) => HostValue::from(*v),
            FieldValue::Float64(v) => HostValue::Float(*v),
            FieldValue::Char16(v) => HostValue::Char16(*v),
            FieldValue::Struct(v) => HostValue::Struct(v.clone()),
        }
    }
}

/// An instance of a [`StructType`]
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    ty: Arc<StructType>,
    values: Vec<FieldValue>,
}

impl StructValue {
    /// Assemble from already-converted values in field order
    pub fn from_parts(ty: Arc<StructType>, values: Vec<FieldValue>) -> Result<Self> {
        if values.len() != ty.fields.len() {
            return Err(MarshalError::Layout(format!(
                "{} has {} fields, {} values given",
                ty.name,
                ty.fields.len(),
                values.len()
            )));
        }
        Ok(Self { ty, values })
    }

    // Used by `native_struct!`, which always supplies one value per field
    #[doc(hidden)]
    pub fn from_parts_unchecked(ty: Arc<StructType>, values: Vec<FieldValue>) -> Self {
        debug_assert_eq!(values.len(), ty.fields.len());
        Self { ty, values }
    }

    pub fn struct_type(&self) -> &Arc<StructType> {
        &self.ty
    }

    /// Field value by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.ty.field_index(name).map(|i| &self.values[i])
    }

    /// Field value by name, failing on unknown names
    pub fn field(&self, name: &str) -> Result<&FieldValue> {
        self.get(name).ok_or_else(|| {
            ArgumentError::UnknownField {
                ty: self.ty.name.clone(),
                field: name.to_string(),
            }
            .into()
        })
    }

    /// `(name, value)` pairs in declaration order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.ty
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .zip(self.values.iter())
    }

    pub(crate) fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Convert to a host map of field names
    pub fn to_host_map(&self) -> HostValue {
        HostValue::Map(
            self.fields()
                .map(|(name, value)| (name.to_string(), value.to_host()))
                .collect(),
        )
    }

    /// Fail unless this value is an instance of the named type
    pub fn expect_type(&self, name: &str) -> Result<()> {
        if self.ty.name == name {
            Ok(())
        } else {
            Err(ArgumentError::WrongKind {
                field: self.ty.name.clone(),
                expected: name.to_string(),
                actual: "struct",
            }
            .into())
        }
    }
}

impl fmt::Display for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.ty.name)?;
        for (i, (name, value)) in self.fields().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match value {
                FieldValue::Struct(nested) => write!(f, "{}={}", name, nested)?,
                other => write!(f, "{}={:?}", name, other.to_host())?,
            }
        }
        write!(f, ")")
    }
}

pub(crate) fn wrong_kind(label: &str, expected: &str, actual: &HostValue) -> MarshalError {
    ArgumentError::WrongKind {
        field: label.to_string(),
        expected: expected.to_string(),
        actual: actual.kind_name(),
    }
    .into()
}

/// Range-checked integer conversion
pub(crate) fn host_integer<T: TryFrom<i128>>(label: &str, kind: &'static str, value: &HostValue) -> Result<T> {
    let wide = match *value {
        HostValue::Int(v) => i128::from(v),
        HostValue::UInt(v) => i128::from(v),
        ref other => return Err(wrong_kind(label, kind, other)),
    };
    T::try_from(wide).map_err(|_| {
        ArgumentError::OutOfRange {
            field: label.to_string(),
            value: wide.to_string(),
            kind,
        }
        .into()
    })
}

/// Floats accept integers and floats
pub(crate) fn host_float(label: &str, kind: &'static str, value: &HostValue) -> Result<f64> {
    match *value {
        HostValue::Float(v) => Ok(v),
        HostValue::Int(v) => Ok(v as f64),
        HostValue::UInt(v) => Ok(v as f64),
        ref other => Err(wrong_kind(label, kind, other)),
    }
}

pub(crate) fn host_bool(label: &str, value: &HostValue) -> Result<bool> {
    match *value {
        HostValue::Bool(v) => Ok(v),
        ref other => Err(wrong_kind(label, "Boolean", other)),
    }
}

/// A UTF-16 code unit, or a string of exactly one code unit
pub(crate) fn host_char16(label: &str, value: &HostValue) -> Result<u16> {
    match value {
        HostValue::Char16(v) => Ok(*v),
        HostValue::Str(s) => {
            let mut units = s.encode_utf16();
            match (units.next(), units.next()) {
                (Some(unit), None) => Ok(unit),
                _ => Err(wrong_kind(label, "Char16", value)),
            }
        }
        other => Err(wrong_kind(label, "Char16", other)),
    }
}

fn convert_primitive(label: &str, kind: PrimitiveKind, value: &HostValue) -> Result<FieldValue> {
    let name = kind.name();
    Ok(match kind {
        PrimitiveKind::Bool => FieldValue::Bool(host_bool(label, value)?),
        PrimitiveKind::Int8 => FieldValue::Int8(host_integer(label, name, value)?),
        PrimitiveKind::UInt8 => FieldValue::UInt8(host_integer(label, name, value)?),
        PrimitiveKind::Int16 => FieldValue::Int16(host_integer(label, name, value)?),
        PrimitiveKind::UInt16 => FieldValue::UInt16(host_integer(label, name, value)?),
        PrimitiveKind::Int32 => FieldValue::Int32(host_integer(label, name, value)?),
        PrimitiveKind::UInt32 => FieldValue::UInt32(host_integer(label, name, value)?),
        PrimitiveKind::Int64 => FieldValue::Int64(host_integer(label, name, value)?),
        PrimitiveKind::UInt64 => FieldValue::UInt64(host_integer(label, name, value)?),
        PrimitiveKind::Float32 => FieldValue::Float32(host_float(label, name, value)? as f32),
        PrimitiveKind::Float64 => FieldValue::Float64(host_float(label, name, value)?),
        PrimitiveKind::Char16 => FieldValue::Char16(host_char16(label, value)?),
    })
}

fn convert_field(label: &str, kind: &FieldKind, value: HostValue) -> Result<FieldValue> {
    match kind {
        FieldKind::Primitive(p) => convert_primitive(label, *p, &value),
        FieldKind::Struct(ty) => ty.coerce(label, value).map(FieldValue::Struct),
        // Codes are not checked against the enum's named members
        FieldKind::Enum { underlying, .. } => {
            let code = match underlying {
                EnumRepr::Int32 => i64::from(host_integer::<i32>(label, "Int32", &value)?),
                EnumRepr::UInt32 => i64::from(host_integer::<u32>(label, "UInt32", &value)?),
            };
            Ok(FieldValue::Enum(code))
        }
    }
}
