//! Iterable sequences
//!
//! `IIterable::First` hands out an `IIterator` positioned on the first
//! element. The element representation is fixed by the interface contract,
//! so the element type is chosen on the Rust side when iterating:
//!
//! ```text
//! iterable.iter::<i32>()?          First()
//!   next() ─► HasCurrent? ─► Current     (first call)
//!   next() ─► MoveNext()  ─► Current     (later calls)
//! ```

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use xlang_pal::unknown::IInspectableVtbl;
use xlang_pal::{hresult, Guid, HResult};

use crate::abi::AbiType;
use crate::error::{Error, Result};
use crate::interface::{Interface, InterfaceRef};

/// A sequence that can be iterated any number of times
pub struct IIterable;

#[repr(C)]
pub struct IIterableVtbl {
    pub base: IInspectableVtbl,
    pub first: unsafe extern "system" fn(this: *mut c_void, iterator: *mut *mut c_void) -> HResult,
}

unsafe impl Interface for IIterable {
    const IID: Guid = Guid::from_u128(0xFAA585EA_6214_4217_AFDA_7F46DE5869B3);
    const NAME: &'static str = "IIterable";
    type Vtable = IIterableVtbl;
}

/// A cursor over an [`IIterable`]
pub struct IIterator;

#[repr(C)]
pub struct IIteratorVtbl {
    pub base: IInspectableVtbl,
    pub get_current: unsafe extern "system" fn(this: *mut c_void, current: *mut c_void) -> HResult,
    pub get_has_current: unsafe extern "system" fn(this: *mut c_void, has_current: *mut u8) -> HResult,
    pub move_next: unsafe extern "system" fn(this: *mut c_void, has_current: *mut u8) -> HResult,
    pub get_many: unsafe extern "system" fn(
        this: *mut c_void,
        capacity: u32,
        items: *mut c_void,
        actual: *mut u32,
    ) -> HResult,
}

unsafe impl Interface for IIterator {
    const IID: Guid = Guid::from_u128(0x6A79E863_4300_459A_9966_CBB660963EE1);
    const NAME: &'static str = "IIterator";
    type Vtable = IIteratorVtbl;
}

impl InterfaceRef<IIterable> {
    /// A fresh iterator on the first element
    pub fn first(&self) -> Result<InterfaceRef<IIterator>> {
        let mut raw = ptr::null_mut();
        // SAFETY: self is live and raw is a valid out slot
        let hr = unsafe { (self.vtable().first)(self.as_raw().as_ptr(), &mut raw) };
        if hr.is_err() {
            return Err(Error::Native(hr));
        }
        NonNull::new(raw)
            // SAFETY: success transfers one reference
            .map(|p| unsafe { InterfaceRef::from_raw(p) })
            .ok_or(Error::Native(hresult::E_POINTER))
    }

    /// Iterate the elements as `T`
    pub fn iter<T: AbiType>(&self) -> Result<Elements<T>> {
        Ok(Elements {
            iterator: self.first()?,
            started: false,
            done: false,
            _marker: PhantomData,
        })
    }
}

impl InterfaceRef<IIterator> {
    pub fn has_current(&self) -> Result<bool> {
        let mut value = 0u8;
        // SAFETY: self is live and value is a valid out slot
        let hr = unsafe { (self.vtable().get_has_current)(self.as_raw().as_ptr(), &mut value) };
        if hr.is_err() {
            return Err(Error::Native(hr));
        }
        Ok(value != 0)
    }

    /// Advance; false once past the last element
    pub fn move_next(&self) -> Result<bool> {
        let mut value = 0u8;
        // SAFETY: as above
        let hr = unsafe { (self.vtable().move_next)(self.as_raw().as_ptr(), &mut value) };
        if hr.is_err() {
            return Err(Error::Native(hr));
        }
        Ok(value != 0)
    }

    /// The current element; `E_BOUNDS` past the end
    pub fn current<T: AbiType>(&self) -> Result<T> {
        let mut abi = T::abi_default();
        // SAFETY: abi matches the element type by contract
        let hr = unsafe {
            (self.vtable().get_current)(self.as_raw().as_ptr(), &mut abi as *mut T::Abi as *mut c_void)
        };
        if hr.is_err() {
            return Err(Error::Native(hr));
        }
        // SAFETY: success transfers ownership of the written value
        unsafe { T::from_abi(abi) }
    }

    /// Copy up to `capacity` elements from the current position and advance
    /// past them
    pub fn many<T: AbiType>(&self, capacity: usize) -> Result<Vec<T>> {
        let capacity = u32::try_from(capacity).unwrap_or(u32::MAX);
        let mut slots: Vec<T::Abi> = (0..capacity).map(|_| T::abi_default()).collect();
        let mut actual = 0u32;
        // SAFETY: slots holds capacity element slots
        let hr = unsafe {
            (self.vtable().get_many)(
                self.as_raw().as_ptr(),
                capacity,
                slots.as_mut_ptr() as *mut c_void,
                &mut actual,
            )
        };
        if hr.is_err() {
            return Err(Error::Native(hr));
        }
        slots
            .into_iter()
            .take(actual as usize)
            // SAFETY: the first `actual` slots were written and are owned now
            .map(|abi| unsafe { T::from_abi(abi) })
            .collect()
    }
}

/// Rust iterator over a native sequence
pub struct Elements<T> {
    iterator: InterfaceRef<IIterator>,
    started: bool,
    done: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: AbiType> Iterator for Elements<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let available = if self.started {
            self.iterator.move_next()
        } else {
            self.started = true;
            self.iterator.has_current()
        };
        match available {
            Ok(true) => Some(self.iterator.current()),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
