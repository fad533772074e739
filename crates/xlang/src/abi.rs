//! Host values crossing the ABI
//!
//! [`AbiType`] pairs a Rust type with the representation native code reads
//! and writes: primitives cross as themselves, strings as raw handles and
//! interfaces as raw pointers. Values produced by native code (out
//! parameters, async results) are taken over with [`AbiType::from_abi`];
//! values handed to native code are produced with [`AbiType::to_abi`],
//! which always transfers a fresh owned copy.

use std::ffi::c_void;
use std::ptr::{self, NonNull};

use xlang_marshal::Char16;
use xlang_pal::string::{duplicate_string, RawString};
use xlang_pal::{hresult, Guid, HString};

use crate::error::{Error, Result};
use crate::interface::{Interface, InterfaceRef};

/// A Rust type with a native representation
pub trait AbiType: Sized {
    /// Native representation
    type Abi: Copy;

    /// Initial value for an out parameter
    fn abi_default() -> Self::Abi;

    /// Take ownership of a native value
    ///
    /// # Safety
    ///
    /// `abi` must have been produced by native code for this type and any
    /// resource it carries is transferred to the caller.
    unsafe fn from_abi(abi: Self::Abi) -> Result<Self>;

    /// Produce an owned native value
    fn to_abi(&self) -> Self::Abi;
}

macro_rules! impl_abi_copy {
    ($($ty:ty => $default:expr),* $(,)?) => {
        $(
            impl AbiType for $ty {
                type Abi = $ty;

                fn abi_default() -> Self::Abi {
                    $default
                }

                unsafe fn from_abi(abi: Self::Abi) -> Result<Self> {
                    Ok(abi)
                }

                fn to_abi(&self) -> Self::Abi {
                    *self
                }
            }
        )*
    };
}

impl_abi_copy! {
    i8 => 0,
    u8 => 0,
    i16 => 0,
    u16 => 0,
    i32 => 0,
    u32 => 0,
    i64 => 0,
    u64 => 0,
    f32 => 0.0,
    f64 => 0.0,
    Guid => Guid::ZERO,
    Char16 => Char16(0),
}

impl AbiType for () {
    type Abi = ();

    fn abi_default() -> Self::Abi {}

    unsafe fn from_abi(_abi: Self::Abi) -> Result<Self> {
        Ok(())
    }

    fn to_abi(&self) -> Self::Abi {}
}

// Booleans cross as one byte; any non-zero value is true
impl AbiType for bool {
    type Abi = u8;

    fn abi_default() -> Self::Abi {
        0
    }

    unsafe fn from_abi(abi: Self::Abi) -> Result<Self> {
        Ok(abi != 0)
    }

    fn to_abi(&self) -> Self::Abi {
        u8::from(*self)
    }
}

impl AbiType for HString {
    type Abi = RawString;

    fn abi_default() -> Self::Abi {
        RawString::NULL
    }

    unsafe fn from_abi(abi: Self::Abi) -> Result<Self> {
        Ok(HString::from_raw(abi))
    }

    fn to_abi(&self) -> Self::Abi {
        // SAFETY: self holds a live reference; the duplicate is owned by the receiver
        unsafe { duplicate_string(self.as_raw()) }
    }
}

impl<I: Interface> AbiType for InterfaceRef<I> {
    type Abi = *mut c_void;

    fn abi_default() -> Self::Abi {
        ptr::null_mut()
    }

    unsafe fn from_abi(abi: Self::Abi) -> Result<Self> {
        NonNull::new(abi)
            .map(|p| InterfaceRef::from_raw(p))
            .ok_or(Error::Native(hresult::E_POINTER))
    }

    fn to_abi(&self) -> Self::Abi {
        self.clone().into_raw().as_ptr()
    }
}

impl<I: Interface> AbiType for Option<InterfaceRef<I>> {
    type Abi = *mut c_void;

    fn abi_default() -> Self::Abi {
        ptr::null_mut()
    }

    unsafe fn from_abi(abi: Self::Abi) -> Result<Self> {
        Ok(NonNull::new(abi).map(|p| InterfaceRef::from_raw(p)))
    }

    fn to_abi(&self) -> Self::Abi {
        self.as_ref().map_or(ptr::null_mut(), |i| i.to_abi())
    }
}
