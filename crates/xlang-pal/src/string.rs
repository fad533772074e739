//! Native string handles
//!
//! A native string is an immutable, length-prefixed UTF-16 buffer with a NUL
//! terminator. The allocation starts with a [`StringHeader`] carrying the
//! length and an atomic reference count so that duplication is cheap; the
//! code units follow the header directly.
//!
//! ```text
//! +-----------+---------+---------------------------+------+
//! | refs: u32 | len:u32 | len x u16 code units      | NUL  |
//! +-----------+---------+---------------------------+------+
//! ```
//!
//! The empty string is represented by the null handle and owns no memory.
//! [`HString`] is the owning wrapper; the free functions are the raw native
//! surface that other ABI participants (activation entry points, components)
//! call directly.

use std::alloc::{self, Layout};
use std::fmt;
use std::mem;
use std::ptr;
use std::slice;
use std::sync::atomic::{fence, AtomicU32, Ordering};

use crate::error::{PalError, Result};

/// Header preceding the code units of every native string
#[repr(C)]
pub struct StringHeader {
    refs: AtomicU32,
    len: u32,
}

const HEADER_SIZE: usize = mem::size_of::<StringHeader>();

/// Raw native string handle. Null is the empty string.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawString(*mut StringHeader);

// The buffer is immutable and its count is atomic
unsafe impl Send for RawString {}
unsafe impl Sync for RawString {}

impl RawString {
    /// The null (empty) handle
    pub const NULL: Self = Self(ptr::null_mut());

    /// Check for the null handle
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl Default for RawString {
    fn default() -> Self {
        Self::NULL
    }
}

fn layout_for(len: usize) -> Result<Layout> {
    let units = len
        .checked_add(1)
        .and_then(|n| n.checked_mul(mem::size_of::<u16>()))
        .and_then(|n| n.checked_add(HEADER_SIZE))
        .ok_or_else(|| PalError::InvalidArg(format!("string length {} overflows", len)))?;
    Layout::from_size_align(units, mem::align_of::<StringHeader>())
        .map_err(|_| PalError::InvalidArg(format!("string length {} overflows", len)))
}

#[inline]
unsafe fn data_ptr(header: *mut StringHeader) -> *mut u16 {
    (header as *mut u8).add(HEADER_SIZE) as *mut u16
}

/// Create a native string from UTF-16 code units
pub fn create_string_utf16(source: &[u16]) -> Result<RawString> {
    if source.is_empty() {
        return Ok(RawString::NULL);
    }
    if source.len() >= u32::MAX as usize {
        return Err(PalError::InvalidArg(format!(
            "string length {} exceeds the native limit",
            source.len()
        )));
    }

    let layout = layout_for(source.len())?;
    // SAFETY: layout has non-zero size (header plus terminator at least)
    let header = unsafe { alloc::alloc(layout) } as *mut StringHeader;
    if header.is_null() {
        return Err(PalError::OutOfMemory);
    }

    // SAFETY: the allocation holds the header, the code units and the NUL
    unsafe {
        ptr::write(
            header,
            StringHeader {
                refs: AtomicU32::new(1),
                len: source.len() as u32,
            },
        );
        let data = data_ptr(header);
        ptr::copy_nonoverlapping(source.as_ptr(), data, source.len());
        *data.add(source.len()) = 0;
    }

    Ok(RawString(header))
}

/// Create a native string from UTF-8 text
pub fn create_string_utf8(source: &str) -> Result<RawString> {
    let wide: Vec<u16> = source.encode_utf16().collect();
    create_string_utf16(&wide)
}

/// Borrow the code units of a native string (terminator excluded)
///
/// # Safety
///
/// `string` must be null or a live handle; the slice must not outlive the
/// reference it was read through.
pub unsafe fn string_buffer<'a>(string: RawString) -> &'a [u16] {
    if string.is_null() {
        return &[];
    }
    let len = (*string.0).len as usize;
    slice::from_raw_parts(data_ptr(string.0), len)
}

/// Add a reference to a native string, returning the handle for the new owner
///
/// # Safety
///
/// `string` must be null or a live handle.
pub unsafe fn duplicate_string(string: RawString) -> RawString {
    if !string.is_null() {
        (*string.0).refs.fetch_add(1, Ordering::Relaxed);
    }
    string
}

/// Release one reference to a native string, freeing it at zero
///
/// # Safety
///
/// `string` must be null or a live handle owned by the caller; the caller's
/// reference is consumed.
pub unsafe fn delete_string(string: RawString) {
    if string.is_null() {
        return;
    }
    if (*string.0).refs.fetch_sub(1, Ordering::Release) != 1 {
        return;
    }
    fence(Ordering::Acquire);
    let len = (*string.0).len as usize;
    if let Ok(layout) = layout_for(len) {
        alloc::dealloc(string.0 as *mut u8, layout);
    }
}

/// Current reference count of a native string (0 for null)
///
/// # Safety
///
/// `string` must be null or a live handle.
pub unsafe fn string_ref_count(string: RawString) -> u32 {
    if string.is_null() {
        0
    } else {
        (*string.0).refs.load(Ordering::Acquire)
    }
}

/// Decode a borrowed native string into host text
///
/// # Safety
///
/// `string` must be null or a live handle.
pub unsafe fn raw_to_string(string: RawString) -> String {
    String::from_utf16_lossy(string_buffer(string))
}

/// Owning native string handle
///
/// Holds exactly one reference; `Clone` adds one, `Drop` releases it.
pub struct HString(RawString);

impl HString {
    /// The empty string
    pub const fn empty() -> Self {
        Self(RawString::NULL)
    }

    /// Create from host text
    pub fn new(text: &str) -> Result<Self> {
        create_string_utf8(text).map(Self)
    }

    /// Create from UTF-16 code units
    pub fn from_wide(wide: &[u16]) -> Result<Self> {
        create_string_utf16(wide).map(Self)
    }

    /// Take ownership of a raw handle
    ///
    /// # Safety
    ///
    /// The caller transfers one reference on `raw`.
    pub unsafe fn from_raw(raw: RawString) -> Self {
        Self(raw)
    }

    /// Borrow the raw handle
    pub fn as_raw(&self) -> RawString {
        self.0
    }

    /// Give up ownership of the raw handle
    pub fn into_raw(self) -> RawString {
        let raw = self.0;
        mem::forget(self);
        raw
    }

    /// Zero-copy view of the code units
    pub fn as_wide(&self) -> &[u16] {
        // SAFETY: self owns a reference for as long as the borrow lasts
        unsafe { string_buffer(self.0) }
    }

    /// Length in UTF-16 code units
    pub fn len(&self) -> usize {
        self.as_wide().len()
    }

    /// Check for the empty string
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }

    /// Decode to host text, replacing unpaired surrogates
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_wide())
    }
}

impl Default for HString {
    fn default() -> Self {
        Self::empty()
    }
}

impl Clone for HString {
    fn clone(&self) -> Self {
        // SAFETY: self holds a live reference
        Self(unsafe { duplicate_string(self.0) })
    }
}

impl Drop for HString {
    fn drop(&mut self) {
        // SAFETY: self owns exactly one reference, released once here
        unsafe { delete_string(self.0) }
    }
}

impl PartialEq for HString {
    fn eq(&self, other: &Self) -> bool {
        self.as_wide() == other.as_wide()
    }
}

impl Eq for HString {}

impl PartialEq<str> for HString {
    fn eq(&self, other: &str) -> bool {
        self.as_wide().iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for HString {
    fn eq(&self, other: &&str) -> bool {
        <Self as PartialEq<str>>::eq(self, other)
    }
}

impl fmt::Display for HString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in char::decode_utf16(self.as_wide().iter().copied()) {
            write!(f, "{}", c.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl fmt::Debug for HString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HString({:?})", self.to_string_lossy())
    }
}
