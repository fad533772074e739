//! Interface handles and reference counting
//!
//! [`InterfaceRef<I>`] owns exactly one native reference on an interface
//! pointer of interface `I`. Cloning calls `AddRef`, dropping calls
//! `Release`; there is no other way to add or drop a reference, so the
//! native count can neither leak nor underflow through safe code.
//!
//! Navigation between the interfaces of one object goes through
//! `QueryInterface` ([`InterfaceRef::cast`], [`InterfaceRef::query`]) and
//! always yields a new, independent handle.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use tracing::trace;
use xlang_pal::string::RawString;
use xlang_pal::unknown::{self, IInspectableVtbl, IUnknownVtbl, IID_IINSPECTABLE, IID_IUNKNOWN};
use xlang_pal::{Guid, HString, PalError};

use crate::error::{Error, Result};

/// A native interface type
///
/// # Safety
///
/// `Vtable` must describe the layout of the vtable of every interface
/// pointer answered for `IID`, and that layout must start with
/// [`IUnknownVtbl`].
pub unsafe trait Interface: Sized + 'static {
    /// Interface identifier
    const IID: Guid;
    /// Name used in logs and errors
    const NAME: &'static str;
    /// Vtable layout
    type Vtable;
}

/// The root interface every object implements
pub struct IUnknown;

unsafe impl Interface for IUnknown {
    const IID: Guid = IID_IUNKNOWN;
    const NAME: &'static str = "IUnknown";
    type Vtable = IUnknownVtbl;
}

/// Base of every runtime class interface
pub struct IInspectable;

unsafe impl Interface for IInspectable {
    const IID: Guid = IID_IINSPECTABLE;
    const NAME: &'static str = "IInspectable";
    type Vtable = IInspectableVtbl;
}

/// Owning, reference-counted handle to a native interface
pub struct InterfaceRef<I: Interface> {
    ptr: NonNull<c_void>,
    _marker: PhantomData<I>,
}

// Native objects keep atomic counts and are callable from any thread
unsafe impl<I: Interface> Send for InterfaceRef<I> {}
unsafe impl<I: Interface> Sync for InterfaceRef<I> {}

impl<I: Interface> InterfaceRef<I> {
    /// Take ownership of one reference
    ///
    /// # Safety
    ///
    /// `ptr` must be a live interface pointer for `I` and the caller must
    /// transfer one reference on it.
    pub unsafe fn from_raw(ptr: NonNull<c_void>) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    /// Create a handle holding a new reference on a borrowed pointer
    ///
    /// # Safety
    ///
    /// `ptr` must be a live interface pointer for `I`.
    pub unsafe fn from_raw_borrowed(ptr: &NonNull<c_void>) -> Self {
        unknown::add_ref(*ptr);
        Self::from_raw(*ptr)
    }

    /// The interface pointer, still owned by this handle
    pub fn as_raw(&self) -> NonNull<c_void> {
        self.ptr
    }

    /// Give up ownership of the reference
    pub fn into_raw(self) -> NonNull<c_void> {
        let ptr = self.ptr;
        mem::forget(self);
        ptr
    }

    /// The interface's vtable
    pub fn vtable(&self) -> &I::Vtable {
        // SAFETY: guaranteed by the Interface implementation for I
        unsafe { unknown::vtable(self.ptr) }
    }

    /// Navigate to another interface of the same object
    ///
    /// Fails with [`Error::NotSupported`] if the object does not implement
    /// `J`; `self` is unaffected either way.
    pub fn cast<J: Interface>(&self) -> Result<InterfaceRef<J>> {
        // SAFETY: self holds a live reference; success transfers a new one
        match unsafe { unknown::query_interface(self.ptr, &J::IID) } {
            Ok(ptr) => Ok(unsafe { InterfaceRef::from_raw(ptr) }),
            Err(PalError::NoInterface(_)) => Err(Error::NotSupported {
                interface: J::NAME.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Navigate to an interface known only by its identifier
    pub fn query(&self, iid: &Guid) -> Result<InterfaceRef<IUnknown>> {
        // SAFETY: as in cast; the result is only used through IUnknown
        match unsafe { unknown::query_interface(self.ptr, iid) } {
            Ok(ptr) => Ok(unsafe { InterfaceRef::from_raw(ptr) }),
            Err(PalError::NoInterface(_)) => Err(Error::NotSupported {
                interface: iid.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Check whether two handles refer to the same object
    pub fn identity_eq<J: Interface>(&self, other: &InterfaceRef<J>) -> Result<bool> {
        let a = self.cast::<IUnknown>()?;
        let b = other.cast::<IUnknown>()?;
        Ok(a.ptr == b.ptr)
    }

    /// The object's runtime class name
    pub fn runtime_class_name(&self) -> Result<HString> {
        let inspectable = self.cast::<IInspectable>()?;
        let mut raw = RawString::NULL;
        // SAFETY: inspectable is live and raw is a valid out slot
        let hr = unsafe { (inspectable.vtable().get_runtime_class_name)(inspectable.ptr.as_ptr(), &mut raw) };
        hr.ok()?;
        // SAFETY: the callee transferred ownership of the string
        Ok(unsafe { HString::from_raw(raw) })
    }
}

impl<I: Interface> Clone for InterfaceRef<I> {
    fn clone(&self) -> Self {
        // SAFETY: self holds a live reference
        let count = unsafe { unknown::add_ref(self.ptr) };
        trace!("AddRef {} {:p} -> {}", I::NAME, self.ptr, count);
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<I: Interface> Drop for InterfaceRef<I> {
    fn drop(&mut self) {
        // SAFETY: self owns exactly one reference, released once here
        let count = unsafe { unknown::release(self.ptr) };
        trace!("Release {} {:p} -> {}", I::NAME, self.ptr, count);
    }
}

impl<I: Interface> fmt::Debug for InterfaceRef<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterfaceRef<{}>({:p})", I::NAME, self.ptr)
    }
}
