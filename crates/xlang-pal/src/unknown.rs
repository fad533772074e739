//! Base interface ABI
//!
//! Every interface pointer points at a location holding a vtable pointer.
//! The first three vtable slots are fixed:
//!
//! | Slot | Method           | Returns         |
//! |------|------------------|-----------------|
//! | 0    | `QueryInterface` | result code     |
//! | 1    | `AddRef`         | new count       |
//! | 2    | `Release`        | new count       |
//!
//! Runtime-class interfaces extend `IInspectable`, which appends
//! `GetIids`, `GetRuntimeClassName` and `GetTrustLevel`.

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use crate::error::{hresult, HResult, PalError, Result};
use crate::string::RawString;
use crate::Guid;

/// IUnknown interface identifier
pub const IID_IUNKNOWN: Guid = Guid::from_u128(0x00000000_0000_0000_C000_000000000046);

/// IInspectable interface identifier
pub const IID_IINSPECTABLE: Guid = Guid::from_u128(0xAF86E2E0_B12D_4C6A_9C5A_D7AA65101E90);

/// IActivationFactory interface identifier
pub const IID_IACTIVATION_FACTORY: Guid =
    Guid::from_u128(0x00000035_0000_0000_C000_000000000046);

/// IAgileObject marker interface identifier
pub const IID_IAGILE_OBJECT: Guid = Guid::from_u128(0x94EA2B94_E9CC_49E0_C0FF_EE64CA8F5B90);

/// IUnknown vtable (slots 0..=2)
#[repr(C)]
pub struct IUnknownVtbl {
    pub query_interface:
        unsafe extern "system" fn(this: *mut c_void, iid: *const Guid, object: *mut *mut c_void) -> HResult,
    pub add_ref: unsafe extern "system" fn(this: *mut c_void) -> u32,
    pub release: unsafe extern "system" fn(this: *mut c_void) -> u32,
}

/// IInspectable vtable (slots 0..=5)
#[repr(C)]
pub struct IInspectableVtbl {
    pub base: IUnknownVtbl,
    pub get_iids:
        unsafe extern "system" fn(this: *mut c_void, count: *mut u32, iids: *mut *mut Guid) -> HResult,
    pub get_runtime_class_name:
        unsafe extern "system" fn(this: *mut c_void, name: *mut RawString) -> HResult,
    pub get_trust_level: unsafe extern "system" fn(this: *mut c_void, level: *mut i32) -> HResult,
}

/// Read the vtable of an interface pointer
///
/// # Safety
///
/// `this` must be a live interface pointer whose vtable starts with `V`'s
/// layout.
#[inline]
pub unsafe fn vtable<'a, V>(this: NonNull<c_void>) -> &'a V {
    &**(this.as_ptr() as *const *const V)
}

/// Call `QueryInterface`; on success the caller owns one new reference
///
/// # Safety
///
/// `this` must be a live interface pointer.
pub unsafe fn query_interface(this: NonNull<c_void>, iid: &Guid) -> Result<NonNull<c_void>> {
    let vtbl = vtable::<IUnknownVtbl>(this);
    let mut out: *mut c_void = ptr::null_mut();
    let hr = (vtbl.query_interface)(this.as_ptr(), iid, &mut out);
    match hr {
        hresult::E_NOINTERFACE => Err(PalError::NoInterface(*iid)),
        hr if hr.is_err() => Err(PalError::from_hresult(hr)),
        _ => NonNull::new(out).ok_or(PalError::Native(hresult::E_POINTER)),
    }
}

/// Call `AddRef`, returning the new count
///
/// # Safety
///
/// `this` must be a live interface pointer.
#[inline]
pub unsafe fn add_ref(this: NonNull<c_void>) -> u32 {
    (vtable::<IUnknownVtbl>(this).add_ref)(this.as_ptr())
}

/// Call `Release`, returning the new count
///
/// # Safety
///
/// `this` must be a live interface pointer and the caller must own the
/// reference being released.
#[inline]
pub unsafe fn release(this: NonNull<c_void>) -> u32 {
    (vtable::<IUnknownVtbl>(this).release)(this.as_ptr())
}
