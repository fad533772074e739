//! Geolocation Demo
//!
//! A `Sample.Geolocation.Geolocator` runtime class consumed through the
//! projection core. The class itself is simulated in-process by
//! [`simulator`]; everything else in this crate is what a consumer of the
//! native class would write:
//!
//! - the value types crossing the ABI ([`BasicGeoposition`],
//!   [`PositionAccuracy`])
//! - the interface layouts ([`IGeolocator`], [`IGeoposition`])
//! - thin projected wrappers ([`Geolocator`], [`Geoposition`]), including
//!   the `PositionChanged` event and the recent-fix history

pub mod simulator;

use std::ffi::c_void;
use std::ptr;

use xlang::collections::Elements;
use xlang::component::delegate;
use xlang::xlang_pal::hresult;
use xlang::xlang_pal::unknown::IInspectableVtbl;
use xlang::{
    AbiType, Apartment, AsyncOperation, Error, EventRegistrationToken, Guid, HResult, IAsyncOperation, IIterable,
    Interface, InterfaceRef, Result,
};
use xlang_marshal::{native_enum, native_struct, DateTime};

/// Runtime class name of the geolocator
pub const GEOLOCATOR_CLASS: &str = "Sample.Geolocation.Geolocator";

native_struct! {
    /// A position in degrees and meters
    pub struct BasicGeoposition("Sample.Geolocation.BasicGeoposition") {
        pub latitude: f64 => "Latitude",
        pub longitude: f64 => "Longitude",
        pub altitude: f64 => "Altitude",
    }
}

native_enum! {
    pub enum PositionAccuracy("Sample.Geolocation.PositionAccuracy"): i32 {
        Default = 0,
        High = 1,
    }
}

/// Geolocator interface
pub struct IGeolocator;

#[repr(C)]
pub struct IGeolocatorVtbl {
    pub base: IInspectableVtbl,
    pub get_desired_accuracy: unsafe extern "system" fn(this: *mut c_void, value: *mut PositionAccuracy) -> HResult,
    pub put_desired_accuracy: unsafe extern "system" fn(this: *mut c_void, value: PositionAccuracy) -> HResult,
    pub get_geoposition_async: unsafe extern "system" fn(this: *mut c_void, operation: *mut *mut c_void) -> HResult,
    pub add_position_changed: unsafe extern "system" fn(
        this: *mut c_void,
        handler: *mut c_void,
        token: *mut EventRegistrationToken,
    ) -> HResult,
    pub remove_position_changed: unsafe extern "system" fn(this: *mut c_void, token: EventRegistrationToken) -> HResult,
    pub get_recent_positions: unsafe extern "system" fn(this: *mut c_void, positions: *mut *mut c_void) -> HResult,
}

unsafe impl Interface for IGeolocator {
    const IID: Guid = Guid::from_u128(0xA9C3E1B2_5D4F_4A6E_8B7C_0D1E2F3A4B5C);
    const NAME: &'static str = "IGeolocator";
    type Vtable = IGeolocatorVtbl;
}

/// A position fix
pub struct IGeoposition;

#[repr(C)]
pub struct IGeopositionVtbl {
    pub base: IInspectableVtbl,
    pub get_coordinate: unsafe extern "system" fn(this: *mut c_void, value: *mut BasicGeoposition) -> HResult,
    pub get_timestamp: unsafe extern "system" fn(this: *mut c_void, value: *mut DateTime) -> HResult,
}

unsafe impl Interface for IGeoposition {
    const IID: Guid = Guid::from_u128(0x3F2E1D0C_B9A8_4765_9432_10FEDCBA9876);
    const NAME: &'static str = "IGeoposition";
    type Vtable = IGeopositionVtbl;
}

/// Projected geolocator
#[derive(Clone, Debug)]
pub struct Geolocator(InterfaceRef<IGeolocator>);

impl Geolocator {
    /// Activate the default geolocator class
    pub fn new(apartment: &Apartment) -> Result<Self> {
        Self::activate_as(apartment, GEOLOCATOR_CLASS)
    }

    /// Activate a geolocator registered under another class name
    pub fn activate_as(apartment: &Apartment, class_name: &str) -> Result<Self> {
        apartment.activate::<IGeolocator>(class_name).map(Self)
    }

    pub fn desired_accuracy(&self) -> Result<PositionAccuracy> {
        let mut value = PositionAccuracy::Default;
        // SAFETY: the handle is live and value is a valid out slot
        unsafe { (self.0.vtable().get_desired_accuracy)(self.0.as_raw().as_ptr(), &mut value) }.ok()?;
        Ok(value)
    }

    pub fn set_desired_accuracy(&self, value: PositionAccuracy) -> Result<()> {
        // SAFETY: the handle is live
        unsafe { (self.0.vtable().put_desired_accuracy)(self.0.as_raw().as_ptr(), value) }.ok()?;
        Ok(())
    }

    /// Start a position fix
    pub fn geoposition_async(&self) -> Result<AsyncOperation<Geoposition>> {
        let mut raw = ptr::null_mut();
        // SAFETY: the handle is live and raw is a valid out slot
        unsafe { (self.0.vtable().get_geoposition_async)(self.0.as_raw().as_ptr(), &mut raw) }.ok()?;
        // SAFETY: success transferred one reference on the operation
        let operation = unsafe { InterfaceRef::<IAsyncOperation>::from_abi(raw) }?;
        AsyncOperation::new(operation)
    }

    /// Call `handler` with every new fix until the registration is removed
    pub fn on_position_changed<F>(&self, handler: F) -> Result<EventRegistrationToken>
    where
        F: Fn(Geoposition) + Send + Sync + 'static,
    {
        let handler = delegate(move |_sender, args| {
            let args = args.ok_or(Error::Native(hresult::E_POINTER))?;
            handler(Geoposition(args.cast::<IGeoposition>()?));
            Ok(())
        })?;
        let mut token = EventRegistrationToken::default();
        // SAFETY: the handle is live; the callee takes its own reference on handler
        unsafe {
            (self.0.vtable().add_position_changed)(self.0.as_raw().as_ptr(), handler.as_raw().as_ptr(), &mut token)
        }
        .ok()?;
        Ok(token)
    }

    pub fn remove_position_changed(&self, token: EventRegistrationToken) -> Result<()> {
        // SAFETY: the handle is live
        unsafe { (self.0.vtable().remove_position_changed)(self.0.as_raw().as_ptr(), token) }.ok()?;
        Ok(())
    }

    /// Fixes delivered so far, oldest first
    pub fn recent_positions(&self) -> Result<Elements<Geoposition>> {
        let mut raw = ptr::null_mut();
        // SAFETY: the handle is live and raw is a valid out slot
        unsafe { (self.0.vtable().get_recent_positions)(self.0.as_raw().as_ptr(), &mut raw) }.ok()?;
        // SAFETY: success transferred one reference on the sequence
        let positions = unsafe { InterfaceRef::<IIterable>::from_abi(raw) }?;
        positions.iter()
    }

    pub fn as_interface(&self) -> &InterfaceRef<IGeolocator> {
        &self.0
    }
}

/// Projected position fix
#[derive(Clone, Debug)]
pub struct Geoposition(InterfaceRef<IGeoposition>);

impl Geoposition {
    pub fn from_interface(interface: InterfaceRef<IGeoposition>) -> Self {
        Self(interface)
    }

    pub fn as_interface(&self) -> &InterfaceRef<IGeoposition> {
        &self.0
    }

    pub fn coordinate(&self) -> Result<BasicGeoposition> {
        let mut value = BasicGeoposition::default();
        // SAFETY: the handle is live and value is a valid out slot
        unsafe { (self.0.vtable().get_coordinate)(self.0.as_raw().as_ptr(), &mut value) }.ok()?;
        Ok(value)
    }

    pub fn timestamp(&self) -> Result<DateTime> {
        let mut value = DateTime::default();
        // SAFETY: as above
        unsafe { (self.0.vtable().get_timestamp)(self.0.as_raw().as_ptr(), &mut value) }.ok()?;
        Ok(value)
    }
}

impl AbiType for Geoposition {
    type Abi = *mut c_void;

    fn abi_default() -> Self::Abi {
        ptr::null_mut()
    }

    unsafe fn from_abi(abi: Self::Abi) -> Result<Self> {
        InterfaceRef::<IGeoposition>::from_abi(abi).map(Self)
    }

    fn to_abi(&self) -> Self::Abi {
        self.0.to_abi()
    }
}
