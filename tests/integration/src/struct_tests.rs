//! Struct Tests - Value Struct Construction and Native Layout
//!
//! These tests exercise value struct marshaling:
//! - Equivalence of positional, named, map and mixed construction
//! - Argument errors (ambiguity, missing and unknown fields, arity)
//! - Nested structs and enum fields
//! - Native layout round-trips for runtime and `native_struct!` types

mod common;

use common::*;
use xlang_marshal::{
    ArgumentError, FieldValue, HostValue, MarshalError, NativeStruct, StructValue,
};

fn surface(positional: Vec<HostValue>, named: Vec<(&str, HostValue)>) -> xlang_marshal::Result<StructValue> {
    let mut builder = surface_type().builder();
    for value in positional {
        builder = builder.positional(value);
    }
    for (name, value) in named {
        builder = builder.named(name, value);
    }
    builder.build()
}

fn nested(count: i32, quality: i32) -> HostValue {
    HostValue::map([("Count", count), ("Quality", quality)])
}

#[test]
fn test_construction_styles_are_equivalent() {
    init_logging();
    let positional = surface(vec![4.into(), 8.into(), 10.into(), nested(1, 2)], vec![]).unwrap();

    let named = surface(
        vec![],
        vec![
            ("MultisampleDescription", nested(1, 2)),
            ("Format", 10.into()),
            ("Height", 8.into()),
            ("Width", 4.into()),
        ],
    )
    .unwrap();

    let map = surface(
        vec![HostValue::map([
            ("Width", HostValue::from(4)),
            ("Height", HostValue::from(8)),
            ("Format", HostValue::from(10)),
            ("MultisampleDescription", nested(1, 2)),
        ])],
        vec![],
    )
    .unwrap();

    let mixed = surface(
        vec![4.into(), 8.into()],
        vec![
            ("Format", 10.into()),
            ("MultisampleDescription", HostValue::list([1, 2])),
        ],
    )
    .unwrap();

    assert_eq!(positional, named);
    assert_eq!(positional, map);
    assert_eq!(positional, mixed);
}

#[test]
fn test_nested_struct_and_enum_read_back() {
    init_logging();
    let value = surface(vec![4.into(), 8.into(), 10.into(), nested(1, 2)], vec![]).unwrap();

    assert_eq!(value.field("Width").unwrap().as_i64(), Some(4));
    assert_eq!(value.field("Height").unwrap().as_i64(), Some(8));
    assert_eq!(value.field("Format").unwrap(), &FieldValue::Enum(10));

    let inner = value.field("MultisampleDescription").unwrap().as_struct().unwrap();
    assert_eq!(inner.field("Count").unwrap().as_i64(), Some(1));
    assert_eq!(inner.field("Quality").unwrap().as_i64(), Some(2));

    // The typed mirror reads the same value
    let typed = SurfaceDescription::from_value(&value).unwrap();
    assert_eq!(typed.width, 4);
    assert_eq!(typed.height, 8);
    assert_eq!(typed.format, PixelFormat(10));
    assert_eq!(typed.multisample_description, MultisampleDescription { count: 1, quality: 2 });
}

#[test]
fn test_positional_and_named_for_same_field() {
    init_logging();
    let err = surface(vec![4.into()], vec![("Width", 4.into())]).unwrap_err();
    assert_eq!(
        err,
        MarshalError::Argument(ArgumentError::Ambiguous {
            ty: "Sample.DirectX.Direct3DSurfaceDescription".into(),
            field: "Width".into(),
        })
    );
}

#[test]
fn test_argument_errors() {
    init_logging();
    let missing = surface(vec![4.into(), 8.into()], vec![]).unwrap_err();
    assert!(matches!(
        missing,
        MarshalError::Argument(ArgumentError::MissingField { ref field, .. }) if field == "Format"
    ));

    let unknown = surface(
        vec![4.into(), 8.into(), 10.into(), nested(1, 2)],
        vec![("Depth", 3.into())],
    )
    .unwrap_err();
    assert!(matches!(
        unknown,
        MarshalError::Argument(ArgumentError::UnknownField { ref field, .. }) if field == "Depth"
    ));

    let too_many = surface(
        vec![4.into(), 8.into(), 10.into(), nested(1, 2), 5.into()],
        vec![],
    )
    .unwrap_err();
    assert!(matches!(
        too_many,
        MarshalError::Argument(ArgumentError::TooManyArguments { max: 4, given: 5, .. })
    ));

    let out_of_range = multisample_type()
        .construct(vec![HostValue::from(u64::MAX), 0.into()], vec![])
        .unwrap_err();
    assert!(matches!(
        out_of_range,
        MarshalError::Argument(ArgumentError::OutOfRange { .. })
    ));
}

#[test]
fn test_zeroed_default_instance() {
    init_logging();
    let zero = surface_type().zeroed();
    assert_eq!(zero.field("Width").unwrap().as_i64(), Some(0));
    assert_eq!(zero.field("Format").unwrap(), &FieldValue::Enum(0));
    assert_eq!(SurfaceDescription::from_value(&zero).unwrap(), SurfaceDescription::default());
}

#[test]
fn test_native_layout_roundtrip() {
    init_logging();
    let value = surface(vec![640.into(), 480.into(), 87.into(), nested(4, 1)], vec![]).unwrap();
    let ty = surface_type();
    assert_eq!(ty.size(), 20);

    let bytes = value.to_native();
    assert_eq!(bytes.len(), 20);
    assert_eq!(&bytes[0..4], &640i32.to_le_bytes());
    assert_eq!(&bytes[8..12], &87i32.to_le_bytes());

    let back = ty.from_native(&bytes).unwrap();
    assert_eq!(back, value);

    // The typed mirror has the same bytes as its Rust layout
    let typed = SurfaceDescription::from_value(&value).unwrap();
    assert_eq!(typed.to_native(), bytes);
    assert_eq!(std::mem::size_of::<SurfaceDescription>(), 20);

    assert!(matches!(
        ty.from_native(&bytes[..12]),
        Err(MarshalError::BufferUnderflow { needed: 20, have: 12 })
    ));
}

#[test]
fn test_unnamed_enum_codes_pass_through() {
    init_logging();
    let typed = SurfaceDescription::construct(
        vec![1.into(), 1.into(), 12345.into(), MultisampleDescription::default().into()],
        vec![],
    )
    .unwrap();
    assert_eq!(typed.format.code(), 12345);
    assert_eq!(typed.format.name(), None);
    assert_eq!(format!("{:?}", typed.format), "PixelFormat(12345)");
    assert_eq!(format!("{:?}", PixelFormat::B8G8R8A8UIntNormalized), "PixelFormat::B8G8R8A8UIntNormalized");
}
