//! Property Value Tests - Boxed Scalars and Arrays
//!
//! These tests exercise boxed value typing:
//! - Discriminants for every boxable scalar and array kind
//! - Accessors failing closed on the wrong kind
//! - Foundation structs and time values inside boxes
//! - Boxed values carried through an async operation

mod common;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::*;
use xlang::component::async_operation;
use xlang::{AsyncOperation, Guid, HString};
use xlang_marshal::{
    Char16, DateTime, HostValue, MarshalError, NativeStruct, Point, PropertyType, PropertyValue, Rect, Size,
    TimeSpan,
};

#[test]
fn test_discriminants_for_every_kind() {
    init_logging();
    let cases: Vec<(HostValue, PropertyType)> = vec![
        (250u8.into(), PropertyType::UInt8),
        ((-2i16).into(), PropertyType::Int16),
        (2u16.into(), PropertyType::UInt16),
        ((-4i32).into(), PropertyType::Int32),
        (4u32.into(), PropertyType::UInt32),
        (i64::MIN.into(), PropertyType::Int64),
        (u64::MAX.into(), PropertyType::UInt64),
        (1.5f32.into(), PropertyType::Single),
        (2.25f64.into(), PropertyType::Double),
        (Char16(0x263A).into(), PropertyType::Char16),
        (true.into(), PropertyType::Boolean),
        ("text".into(), PropertyType::String),
        (Guid::from_u128(1).into(), PropertyType::Guid),
        (1000i64.into(), PropertyType::DateTime),
        (50i64.into(), PropertyType::TimeSpan),
        (Point::new(1.0, 2.0).into(), PropertyType::Point),
        (Size::new(3.0, 4.0).into(), PropertyType::Size),
        (Rect::new(0.0, 0.0, 5.0, 6.0).into(), PropertyType::Rect),
    ];

    for (value, kind) in cases {
        let boxed = PropertyValue::boxed(value, kind).unwrap();
        assert_eq!(boxed.property_type(), kind);
        assert!(boxed.unbox_as(kind).is_ok(), "unbox {} failed", kind);

        let array_kind = kind.array_of().unwrap();
        assert!(matches!(
            boxed.unbox_as(array_kind),
            Err(MarshalError::TypeMismatch { expected, actual }) if expected == array_kind && actual == kind
        ));
    }
}

#[test]
fn test_uint8_boxing_and_mismatch() {
    init_logging();
    let boxed = PropertyValue::boxed(250.into(), PropertyType::UInt8).unwrap();
    assert_eq!(boxed.property_type(), PropertyType::UInt8);
    assert_eq!(boxed.property_type().code(), 1);
    assert_eq!(boxed.get_uint8(), Ok(250));
    assert_eq!(
        boxed.unbox_as(PropertyType::Int32),
        Err(MarshalError::TypeMismatch {
            expected: PropertyType::Int32,
            actual: PropertyType::UInt8,
        })
    );
}

#[test]
fn test_uint8_array_roundtrip() {
    init_logging();
    let boxed = PropertyValue::boxed(HostValue::list([1u8, 2, 3, 4, 5]), PropertyType::UInt8Array).unwrap();
    assert_eq!(boxed.property_type().code(), 1025);
    assert_eq!(boxed.array_len(), Some(5));
    assert_eq!(
        boxed.unbox_as(PropertyType::UInt8Array).unwrap(),
        HostValue::list([1u8, 2, 3, 4, 5])
    );
    assert_eq!(boxed.get_uint8_array().unwrap(), &[1, 2, 3, 4, 5]);
}

#[test]
fn test_time_values() {
    init_logging();
    let moment = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let boxed = PropertyValue::from(DateTime::from(moment));
    let back = boxed.get_date_time().unwrap();
    assert_eq!(back.to_system_time(), Some(moment));

    assert!(DateTime::now().universal_time > DateTime::from(SystemTime::UNIX_EPOCH).universal_time);

    let span = PropertyValue::from(TimeSpan::from(Duration::from_millis(1500)));
    assert_eq!(span.get_time_span().unwrap().duration, 15_000_000);
    assert_eq!(span.get_time_span().unwrap().to_duration(), Some(Duration::from_millis(1500)));
}

#[test]
fn test_foundation_structs_in_boxes() {
    init_logging();
    let from_map = PropertyValue::boxed(
        HostValue::map([("X", 0.0), ("Y", 1.0), ("Width", 10.0), ("Height", 20.0)]),
        PropertyType::Rect,
    )
    .unwrap();
    let from_struct = PropertyValue::boxed(Rect::new(0.0, 1.0, 10.0, 20.0).into(), PropertyType::Rect).unwrap();
    assert_eq!(from_map, from_struct);
    assert_eq!(Rect::struct_type().size(), 16);

    let points = PropertyValue::from(vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)]);
    assert_eq!(points.property_type(), PropertyType::PointArray);
    assert_eq!(points.array_len(), Some(2));
    assert!(points.get_size_array().is_err());
}

#[tokio::test]
async fn test_boxed_value_through_async_result() {
    init_logging();
    // A string result carries the boxed value's text form, the way an
    // operation returning a property bag entry would
    let (operation, completer) = async_operation::<HString>().unwrap();
    let pending = AsyncOperation::<HString>::new(operation).unwrap();

    let boxed = PropertyValue::from("Ni!");
    completer.complete(HString::new(&boxed.get_string().unwrap()).unwrap());

    let text = pending.await.unwrap();
    let reboxed = PropertyValue::boxed(text.to_string().as_str().into(), PropertyType::String).unwrap();
    assert_eq!(reboxed, boxed);
}
