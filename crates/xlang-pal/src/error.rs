//! Platform error types and native result codes

use std::fmt;
use thiserror::Error;

use crate::Guid;

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PalError>;

/// Native result code (HRESULT layout: negative values are failures)
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HResult(pub i32);

impl HResult {
    /// Build from the unsigned spelling used in headers (`0x80004002`)
    pub const fn from_u32(code: u32) -> Self {
        Self(code as i32)
    }

    /// True for success codes, including `S_FALSE`
    #[inline]
    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    /// True for failure codes
    #[inline]
    pub const fn is_err(self) -> bool {
        self.0 < 0
    }

    /// Unsigned view of the code
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    /// Convert to a `Result`, mapping failures through [`PalError::from_hresult`]
    pub fn ok(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(PalError::from_hresult(self))
        }
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult(0x{:08X})", self.as_u32())
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.as_u32())
    }
}

/// Result codes used across the ABI
pub mod hresult {
    use super::HResult;

    /// Operation successful
    pub const S_OK: HResult = HResult(0);
    /// Operation successful, returning false (also: already initialized)
    pub const S_FALSE: HResult = HResult(1);
    /// Not implemented
    pub const E_NOTIMPL: HResult = HResult::from_u32(0x80004001);
    /// No such interface supported
    pub const E_NOINTERFACE: HResult = HResult::from_u32(0x80004002);
    /// Invalid pointer
    pub const E_POINTER: HResult = HResult::from_u32(0x80004003);
    /// Operation aborted
    pub const E_ABORT: HResult = HResult::from_u32(0x80004004);
    /// Unspecified error
    pub const E_FAIL: HResult = HResult::from_u32(0x80004005);
    /// General access denied
    pub const E_ACCESSDENIED: HResult = HResult::from_u32(0x80070005);
    /// Out of memory
    pub const E_OUTOFMEMORY: HResult = HResult::from_u32(0x8007000E);
    /// Invalid argument
    pub const E_INVALIDARG: HResult = HResult::from_u32(0x80070057);
    /// Index past the end of a sequence
    pub const E_BOUNDS: HResult = HResult::from_u32(0x8000000B);
    /// Method called at an unexpected time
    pub const E_ILLEGAL_METHOD_CALL: HResult = HResult::from_u32(0x8000000E);
    /// Delegate was already assigned
    pub const E_ILLEGAL_DELEGATE_ASSIGNMENT: HResult = HResult::from_u32(0x80000018);
    /// Size exceeds what the allocator accepts
    pub const E_INVALID_SIZE: HResult = HResult::from_u32(0x80080011);
    /// Class is not available from any loaded module
    pub const CLASS_E_CLASSNOTAVAILABLE: HResult = HResult::from_u32(0x80040111);
    /// Apartment already initialized with a different mode
    pub const RPC_E_CHANGED_MODE: HResult = HResult::from_u32(0x80010106);
    /// Operation was canceled
    pub const ERROR_CANCELLED: HResult = HResult::from_u32(0x800704C7);
}

/// Platform errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PalError {
    /// Malformed identifier or text
    #[error("parse error: {0}")]
    Parse(String),

    /// Native allocation failed
    #[error("out of memory")]
    OutOfMemory,

    /// Argument rejected by the native layer
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Requested interface not implemented by the object
    #[error("no such interface: {0}")]
    NoInterface(Guid),

    /// No module provides the class
    #[error("class not available: {0}")]
    ClassNotAvailable(String),

    /// Apartment already initialized in another mode
    #[error("apartment already initialized with a different threading mode")]
    ChangedMode,

    /// Any other native failure code
    #[error("native call failed: {0}")]
    Native(HResult),
}

impl PalError {
    /// Map a failure code onto the matching error kind
    pub fn from_hresult(code: HResult) -> Self {
        match code {
            hresult::E_OUTOFMEMORY => PalError::OutOfMemory,
            hresult::E_INVALIDARG => PalError::InvalidArg(format!("native code {}", code)),
            hresult::E_NOINTERFACE => PalError::NoInterface(Guid::ZERO),
            hresult::CLASS_E_CLASSNOTAVAILABLE => PalError::ClassNotAvailable(String::new()),
            hresult::RPC_E_CHANGED_MODE => PalError::ChangedMode,
            other => PalError::Native(other),
        }
    }

    /// The native code that best represents this error
    pub fn hresult(&self) -> HResult {
        match self {
            PalError::Parse(_) | PalError::InvalidArg(_) => hresult::E_INVALIDARG,
            PalError::OutOfMemory => hresult::E_OUTOFMEMORY,
            PalError::NoInterface(_) => hresult::E_NOINTERFACE,
            PalError::ClassNotAvailable(_) => hresult::CLASS_E_CLASSNOTAVAILABLE,
            PalError::ChangedMode => hresult::RPC_E_CHANGED_MODE,
            PalError::Native(code) => *code,
        }
    }
}
