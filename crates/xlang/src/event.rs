//! Events and delegates
//!
//! An event is a pair of vtable slots on the source interface,
//! `add_X(handler, *mut token)` and `remove_X(token)`. Handlers are
//! [`IEventHandler`] delegates receiving the sender and an argument object.
//! The token returned by `add_X` is the only way to unregister.

use std::ffi::c_void;
use std::fmt;
use std::ptr;

use xlang_pal::unknown::IUnknownVtbl;
use xlang_pal::{Guid, HResult};

use crate::error::{Error, Result};
use crate::interface::{IInspectable, Interface, InterfaceRef};

/// Identifies one handler registration on one event
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct EventRegistrationToken {
    pub value: i64,
}

impl fmt::Display for EventRegistrationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.value)
    }
}

/// Event handler delegate
pub struct IEventHandler;

#[repr(C)]
pub struct IEventHandlerVtbl {
    pub base: IUnknownVtbl,
    pub invoke: unsafe extern "system" fn(this: *mut c_void, sender: *mut c_void, args: *mut c_void) -> HResult,
}

unsafe impl Interface for IEventHandler {
    const IID: Guid = Guid::from_u128(0x9DE1C535_6AE1_11E0_84E1_18A905BCC53F);
    const NAME: &'static str = "IEventHandler";
    type Vtable = IEventHandlerVtbl;
}

impl InterfaceRef<IEventHandler> {
    /// Call the handler; either object may be absent
    pub fn invoke(
        &self,
        sender: Option<&InterfaceRef<IInspectable>>,
        args: Option<&InterfaceRef<IInspectable>>,
    ) -> Result<()> {
        let sender = sender.map_or(ptr::null_mut(), |s| s.as_raw().as_ptr());
        let args = args.map_or(ptr::null_mut(), |a| a.as_raw().as_ptr());
        // SAFETY: the handler is live; sender and args are borrowed for the call
        let hr = unsafe { (self.vtable().invoke)(self.as_raw().as_ptr(), sender, args) };
        if hr.is_err() {
            return Err(Error::Native(hr));
        }
        Ok(())
    }
}
