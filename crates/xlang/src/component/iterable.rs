//! Host sequences as native iterables

use std::ffi::c_void;
use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;
use xlang_pal::object::{self, ComClass, InterfaceEntry, INSPECTABLE_BASE};
use xlang_pal::{hresult, HResult};

use crate::abi::AbiType;
use crate::collections::{IIterable, IIterableVtbl, IIterator, IIteratorVtbl};
use crate::error::Result;
use crate::interface::{Interface, InterfaceRef};

/// Element storage with the element type erased
trait ElementSource: Send + Sync {
    fn len(&self) -> usize;

    /// Write an owned copy of element `index` into slot `slot` of `out`
    ///
    /// # Safety
    ///
    /// `out` must point at `slot + 1` element slots of this source's type.
    unsafe fn write(&self, index: usize, out: *mut c_void, slot: usize);
}

impl<T: AbiType + Send + Sync> ElementSource for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    unsafe fn write(&self, index: usize, out: *mut c_void, slot: usize) {
        ptr::write((out as *mut T::Abi).add(slot), self[index].to_abi());
    }
}

/// Expose `items` to native code as an `IIterable`
///
/// Every `First` call starts an independent iterator over the same
/// elements; each element read hands out an owned copy.
pub fn iterable<T, I>(items: I) -> Result<InterfaceRef<IIterable>>
where
    T: AbiType + Send + Sync + 'static,
    I: IntoIterator<Item = T>,
{
    let items: Vec<T> = items.into_iter().collect();
    trace!("Exposing {} host elements as IIterable", items.len());
    let ptr = object::create_instance(HostIterable { items: Arc::new(items) }, &IIterable::IID)?;
    // SAFETY: create_instance returned one reference on IIterable
    Ok(unsafe { InterfaceRef::from_raw(ptr) })
}

struct HostIterable {
    items: Arc<dyn ElementSource>,
}

static ITERABLE_VTBL: IIterableVtbl = IIterableVtbl {
    base: INSPECTABLE_BASE,
    first: iterable_first,
};

impl ComClass for HostIterable {
    const CLASS_NAME: &'static str = "xlang.Iterable";

    fn interfaces() -> &'static [InterfaceEntry] {
        static ENTRIES: [InterfaceEntry; 1] = [InterfaceEntry::new(IIterable::IID, &ITERABLE_VTBL)];
        &ENTRIES
    }
}

struct HostIterator {
    items: Arc<dyn ElementSource>,
    position: Mutex<usize>,
}

static ITERATOR_VTBL: IIteratorVtbl = IIteratorVtbl {
    base: INSPECTABLE_BASE,
    get_current: iterator_get_current,
    get_has_current: iterator_get_has_current,
    move_next: iterator_move_next,
    get_many: iterator_get_many,
};

impl ComClass for HostIterator {
    const CLASS_NAME: &'static str = "xlang.Iterator";

    fn interfaces() -> &'static [InterfaceEntry] {
        static ENTRIES: [InterfaceEntry; 1] = [InterfaceEntry::new(IIterator::IID, &ITERATOR_VTBL)];
        &ENTRIES
    }
}

unsafe extern "system" fn iterable_first(this: *mut c_void, iterator: *mut *mut c_void) -> HResult {
    if iterator.is_null() {
        return hresult::E_POINTER;
    }
    *iterator = ptr::null_mut();
    let source = object::value_of::<HostIterable>(this);
    let cursor = HostIterator {
        items: source.items.clone(),
        position: Mutex::new(0),
    };
    match object::create_instance(cursor, &IIterator::IID) {
        Ok(ptr) => {
            *iterator = ptr.as_ptr();
            hresult::S_OK
        }
        Err(e) => e.hresult(),
    }
}

unsafe extern "system" fn iterator_get_current(this: *mut c_void, current: *mut c_void) -> HResult {
    if current.is_null() {
        return hresult::E_POINTER;
    }
    let cursor = object::value_of::<HostIterator>(this);
    let position = *cursor.position.lock();
    if position >= cursor.items.len() {
        return hresult::E_BOUNDS;
    }
    cursor.items.write(position, current, 0);
    hresult::S_OK
}

unsafe extern "system" fn iterator_get_has_current(this: *mut c_void, has_current: *mut u8) -> HResult {
    if has_current.is_null() {
        return hresult::E_POINTER;
    }
    let cursor = object::value_of::<HostIterator>(this);
    *has_current = u8::from(*cursor.position.lock() < cursor.items.len());
    hresult::S_OK
}

unsafe extern "system" fn iterator_move_next(this: *mut c_void, has_current: *mut u8) -> HResult {
    if has_current.is_null() {
        return hresult::E_POINTER;
    }
    let cursor = object::value_of::<HostIterator>(this);
    let len = cursor.items.len();
    let mut position = cursor.position.lock();
    if *position < len {
        *position += 1;
    }
    *has_current = u8::from(*position < len);
    hresult::S_OK
}

unsafe extern "system" fn iterator_get_many(
    this: *mut c_void,
    capacity: u32,
    items: *mut c_void,
    actual: *mut u32,
) -> HResult {
    if actual.is_null() || (items.is_null() && capacity > 0) {
        return hresult::E_POINTER;
    }
    let cursor = object::value_of::<HostIterator>(this);
    let mut position = cursor.position.lock();
    let count = (capacity as usize).min(cursor.items.len() - *position);
    for slot in 0..count {
        cursor.items.write(*position + slot, items, slot);
    }
    *position += count;
    *actual = count as u32;
    hresult::S_OK
}
