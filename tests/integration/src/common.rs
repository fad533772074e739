//! Shared fixtures for the integration suites
//!
//! - A counter class (`ICounter`) whose drop is observable
//! - Hosted registration helpers that count factory constructions
//! - Surface description types, both runtime-described and `native_struct!`

#![allow(dead_code)]

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use tracing_subscriber::EnvFilter;
use xlang::component::{register_class, ClassFactory};
use xlang::xlang_pal::object::{self, ComClass, InterfaceEntry, INSPECTABLE_BASE};
use xlang::xlang_pal::unknown::IInspectableVtbl;
use xlang::xlang_pal::hresult;
use xlang::{Guid, HResult, IInspectable, Interface, InterfaceRef};
use xlang_marshal::{native_enum, native_struct, EnumRepr, FieldDef, PrimitiveKind, StructType};

static LOGGING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Counter interface implemented by the fixture class
pub struct ICounter;

#[repr(C)]
pub struct ICounterVtbl {
    pub base: IInspectableVtbl,
    pub get_value: unsafe extern "system" fn(this: *mut c_void, value: *mut i32) -> HResult,
    pub increment: unsafe extern "system" fn(this: *mut c_void) -> HResult,
}

unsafe impl Interface for ICounter {
    const IID: Guid = Guid::from_u128(0x6D1E5C44_8B0A_4F3B_A2C7_19E0D3B4F5A6);
    const NAME: &'static str = "ICounter";
    type Vtable = ICounterVtbl;
}

/// Calls on a counter handle
pub trait CounterCalls {
    fn value(&self) -> xlang::Result<i32>;
    fn increment(&self) -> xlang::Result<()>;
}

impl CounterCalls for InterfaceRef<ICounter> {
    fn value(&self) -> xlang::Result<i32> {
        let mut value = 0;
        unsafe { (self.vtable().get_value)(self.as_raw().as_ptr(), &mut value) }.ok()?;
        Ok(value)
    }

    fn increment(&self) -> xlang::Result<()> {
        unsafe { (self.vtable().increment)(self.as_raw().as_ptr()) }.ok()?;
        Ok(())
    }
}

static COUNTER_VTBL: ICounterVtbl = ICounterVtbl {
    base: INSPECTABLE_BASE,
    get_value: counter_get_value,
    increment: counter_increment,
};

pub struct Counter {
    value: AtomicI32,
    released: Arc<AtomicBool>,
}

impl Drop for Counter {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

impl ComClass for Counter {
    const CLASS_NAME: &'static str = "Fixture.Counter";

    fn interfaces() -> &'static [InterfaceEntry] {
        static ENTRIES: [InterfaceEntry; 1] = [InterfaceEntry::new(ICounter::IID, &COUNTER_VTBL)];
        &ENTRIES
    }
}

unsafe extern "system" fn counter_get_value(this: *mut c_void, value: *mut i32) -> HResult {
    if value.is_null() {
        return hresult::E_POINTER;
    }
    *value = object::value_of::<Counter>(this).value.load(Ordering::SeqCst);
    hresult::S_OK
}

unsafe extern "system" fn counter_increment(this: *mut c_void) -> HResult {
    object::value_of::<Counter>(this).value.fetch_add(1, Ordering::SeqCst);
    hresult::S_OK
}

/// A fresh counter and a flag set when it is destroyed
pub fn counter(start: i32) -> (InterfaceRef<ICounter>, Arc<AtomicBool>) {
    let released = Arc::new(AtomicBool::new(false));
    let ptr = object::create_instance(
        Counter {
            value: AtomicI32::new(start),
            released: released.clone(),
        },
        &ICounter::IID,
    )
    .expect("create counter");
    (unsafe { InterfaceRef::from_raw(ptr) }, released)
}

fn counter_instance(start: i32) -> xlang::Result<InterfaceRef<IInspectable>> {
    let (counter, _) = counter(start);
    counter.cast::<IInspectable>()
}

/// Register a hosted counter class; the returned count tracks factory
/// constructions
pub fn register_counter_class(class_name: &str, start: i32) -> Arc<AtomicUsize> {
    let constructions = Arc::new(AtomicUsize::new(0));
    let seen = constructions.clone();
    register_class(class_name, move || {
        seen.fetch_add(1, Ordering::SeqCst);
        ClassFactory::new(move || counter_instance(start)).into_unknown()
    })
    .expect("register counter class");
    constructions
}

/// Register a hosted class that only exposes a factory
pub fn register_static_class(class_name: &str) {
    register_class(class_name, || ClassFactory::non_activatable().into_unknown())
        .expect("register static class");
}

native_enum! {
    pub enum PixelFormat("Sample.DirectX.DirectXPixelFormat"): i32 {
        Unknown = 0,
        R8G8B8A8UIntNormalized = 28,
        B8G8R8A8UIntNormalized = 87,
    }
}

native_struct! {
    pub struct MultisampleDescription("Sample.DirectX.Direct3DMultisampleDescription") {
        pub count: i32 => "Count",
        pub quality: i32 => "Quality",
    }
}

native_struct! {
    pub struct SurfaceDescription("Sample.DirectX.Direct3DSurfaceDescription") {
        pub width: i32 => "Width",
        pub height: i32 => "Height",
        pub format: PixelFormat => "Format",
        pub multisample_description: MultisampleDescription => "MultisampleDescription",
    }
}

/// Runtime description of the multisample struct
pub fn multisample_type() -> Arc<StructType> {
    StructType::new(
        "Sample.DirectX.Direct3DMultisampleDescription",
        vec![
            FieldDef::primitive("Count", PrimitiveKind::Int32),
            FieldDef::primitive("Quality", PrimitiveKind::Int32),
        ],
    )
}

/// Runtime description of the surface struct
pub fn surface_type() -> Arc<StructType> {
    StructType::new(
        "Sample.DirectX.Direct3DSurfaceDescription",
        vec![
            FieldDef::primitive("Width", PrimitiveKind::Int32),
            FieldDef::primitive("Height", PrimitiveKind::Int32),
            FieldDef::enumeration("Format", "Sample.DirectX.DirectXPixelFormat", EnumRepr::Int32),
            FieldDef::nested("MultisampleDescription", multisample_type()),
        ],
    )
}
