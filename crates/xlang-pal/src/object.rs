//! In-process native objects
//!
//! Components and delegates written in Rust are exposed through this module:
//! a value implementing [`ComClass`] is moved onto the heap next to an
//! [`ObjectHeader`] that owns the atomic reference count, and one
//! [`InterfaceSlot`] is laid out per implemented interface. An interface
//! pointer is the address of a slot, so the slot's first word is the vtable
//! pointer as the ABI requires.
//!
//! ```text
//!  interface ptr ──► InterfaceSlot { vtable, object } ──┐
//!                                                        ▼
//!                         NativeObject<T> { ObjectHeader { refs, slots, .. }, value: T }
//! ```
//!
//! Slot 0 is the identity slot answering `IUnknown` and `IInspectable`.
//! All slots share the header's count; the object is dropped when the last
//! reference is released through any of them.

use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, AtomicU32, Ordering};

use crate::error::{hresult, HResult, Result};
use crate::string::{create_string_utf8, RawString};
use crate::unknown::{self, IInspectableVtbl, IUnknownVtbl, IID_IAGILE_OBJECT, IID_IINSPECTABLE, IID_IUNKNOWN};
use crate::Guid;

/// One implemented interface: its id and a pointer to its static vtable
pub struct InterfaceEntry {
    pub iid: Guid,
    pub vtable: *const c_void,
}

// Entries only ever point at immutable statics
unsafe impl Sync for InterfaceEntry {}
unsafe impl Send for InterfaceEntry {}

impl InterfaceEntry {
    /// Pair an interface id with its vtable
    pub const fn new<V>(iid: Guid, vtable: &'static V) -> Self {
        Self {
            iid,
            vtable: vtable as *const V as *const c_void,
        }
    }
}

/// A Rust type that can live behind native interface pointers
pub trait ComClass: Send + Sync + Sized + 'static {
    /// Runtime class name reported through `IInspectable`
    const CLASS_NAME: &'static str;

    /// Interfaces beyond `IUnknown`/`IInspectable`, each with a vtable whose
    /// first member is [`IUnknownVtbl`] (usually via [`INSPECTABLE_BASE`])
    fn interfaces() -> &'static [InterfaceEntry];
}

/// Interface pointer target
#[repr(C)]
pub struct InterfaceSlot {
    vtable: *const c_void,
    object: *const ObjectHeader,
}

/// Shared state at the start of every native object
#[repr(C)]
pub struct ObjectHeader {
    refs: AtomicU32,
    class_name: &'static str,
    entries: &'static [InterfaceEntry],
    slots: Box<[InterfaceSlot]>,
    destroy: unsafe fn(*mut ObjectHeader),
}

#[repr(C)]
struct NativeObject<T> {
    header: ObjectHeader,
    value: T,
}

/// `IUnknown` slots shared by every object
pub const UNKNOWN_BASE: IUnknownVtbl = IUnknownVtbl {
    query_interface: object_query_interface,
    add_ref: object_add_ref,
    release: object_release,
};

/// `IInspectable` slots shared by every object
pub const INSPECTABLE_BASE: IInspectableVtbl = IInspectableVtbl {
    base: UNKNOWN_BASE,
    get_iids: object_get_iids,
    get_runtime_class_name: object_get_runtime_class_name,
    get_trust_level: object_get_trust_level,
};

static IDENTITY_VTBL: IInspectableVtbl = INSPECTABLE_BASE;

/// Move `value` into a new native object and return its identity pointer
///
/// The caller owns the single initial reference.
pub fn into_raw<T: ComClass>(value: T) -> NonNull<c_void> {
    let entries = T::interfaces();
    let raw = Box::into_raw(Box::new(NativeObject {
        header: ObjectHeader {
            refs: AtomicU32::new(1),
            class_name: T::CLASS_NAME,
            entries,
            slots: Box::new([]),
            destroy: destroy_object::<T>,
        },
        value,
    }));

    let header = raw as *const ObjectHeader;
    let mut slots = Vec::with_capacity(entries.len() + 1);
    slots.push(InterfaceSlot {
        vtable: &IDENTITY_VTBL as *const IInspectableVtbl as *const c_void,
        object: header,
    });
    slots.extend(entries.iter().map(|entry| InterfaceSlot {
        vtable: entry.vtable,
        object: header,
    }));

    // SAFETY: raw was just allocated and nothing else refers to it yet; the
    // boxed slice keeps slot addresses stable for the object's lifetime
    unsafe {
        (*raw).header.slots = slots.into_boxed_slice();
        let identity = &(*raw).header.slots[0] as *const InterfaceSlot as *mut c_void;
        NonNull::new_unchecked(identity)
    }
}

/// Create a native object and return it as interface `iid`
pub fn create_instance<T: ComClass>(value: T, iid: &Guid) -> Result<NonNull<c_void>> {
    let identity = into_raw(value);
    // SAFETY: identity is live and we own its initial reference
    unsafe {
        let result = unknown::query_interface(identity, iid);
        unknown::release(identity);
        result
    }
}

/// Borrow the Rust value behind an interface pointer of a `T` object
///
/// # Safety
///
/// `this` must be an interface pointer produced by [`into_raw::<T>`] (or a
/// `QueryInterface` on such an object) that is still alive.
pub unsafe fn value_of<'a, T: ComClass>(this: *mut c_void) -> &'a T {
    let object = raw_header_of(this) as *const NativeObject<T>;
    &(*object).value
}

/// Header pointer with the provenance of the whole allocation
#[inline]
unsafe fn raw_header_of(this: *mut c_void) -> *mut ObjectHeader {
    (*(this as *const InterfaceSlot)).object as *mut ObjectHeader
}

#[inline]
unsafe fn header_of<'a>(this: *mut c_void) -> &'a ObjectHeader {
    &*raw_header_of(this)
}

unsafe fn destroy_object<T>(header: *mut ObjectHeader) {
    drop(Box::from_raw(header as *mut NativeObject<T>));
}

unsafe extern "system" fn object_query_interface(
    this: *mut c_void,
    iid: *const Guid,
    object: *mut *mut c_void,
) -> HResult {
    if object.is_null() {
        return hresult::E_POINTER;
    }
    *object = ptr::null_mut();
    if iid.is_null() {
        return hresult::E_INVALIDARG;
    }

    let header = header_of(this);
    let iid = &*iid;
    let index = if *iid == IID_IUNKNOWN || *iid == IID_IINSPECTABLE || *iid == IID_IAGILE_OBJECT {
        Some(0)
    } else {
        header
            .entries
            .iter()
            .position(|entry| entry.iid == *iid)
            .map(|i| i + 1)
    };

    match index {
        Some(i) => {
            header.refs.fetch_add(1, Ordering::Relaxed);
            *object = &header.slots[i] as *const InterfaceSlot as *mut c_void;
            hresult::S_OK
        }
        None => hresult::E_NOINTERFACE,
    }
}

unsafe extern "system" fn object_add_ref(this: *mut c_void) -> u32 {
    header_of(this).refs.fetch_add(1, Ordering::Relaxed) + 1
}

unsafe extern "system" fn object_release(this: *mut c_void) -> u32 {
    let header = raw_header_of(this);
    let previous = (*header).refs.fetch_sub(1, Ordering::Release);
    if previous != 1 {
        return previous - 1;
    }
    fence(Ordering::Acquire);
    let destroy = (*header).destroy;
    destroy(header);
    0
}

unsafe extern "system" fn object_get_iids(
    _this: *mut c_void,
    count: *mut u32,
    iids: *mut *mut Guid,
) -> HResult {
    if count.is_null() || iids.is_null() {
        return hresult::E_POINTER;
    }
    *count = 0;
    *iids = ptr::null_mut();
    hresult::E_NOTIMPL
}

unsafe extern "system" fn object_get_runtime_class_name(
    this: *mut c_void,
    name: *mut RawString,
) -> HResult {
    if name.is_null() {
        return hresult::E_POINTER;
    }
    match create_string_utf8(header_of(this).class_name) {
        Ok(raw) => {
            *name = raw;
            hresult::S_OK
        }
        Err(e) => {
            *name = RawString::NULL;
            e.hresult()
        }
    }
}

unsafe extern "system" fn object_get_trust_level(_this: *mut c_void, level: *mut i32) -> HResult {
    if level.is_null() {
        return hresult::E_POINTER;
    }
    *level = 0;
    hresult::S_OK
}
