//! Activation entry point
//!
//! Components make their classes available by registering a module entry
//! point under a namespace. [`get_activation_factory`] resolves a class by
//! asking the modules of its enclosing namespaces, most specific first:
//!
//! ```text
//! Sample.Geolocation.Geolocator
//!   -> module "Sample.Geolocation"
//!   -> module "Sample"
//! ```
//!
//! A module that does not know the class answers
//! `CLASS_E_CLASSNOTAVAILABLE` and the walk continues; any other failure
//! stops the walk and is reported as-is.

use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::sync::OnceLock;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{hresult, HResult, PalError, Result};
use crate::string::{HString, RawString};
use crate::Guid;

/// Module entry point: resolve `class_name` to a factory implementing `iid`
///
/// The class name is borrowed for the duration of the call. On success the
/// callee stores one owned reference in `factory`.
pub type LibGetActivationFactory = unsafe extern "system" fn(
    class_name: RawString,
    iid: *const Guid,
    factory: *mut *mut c_void,
) -> HResult;

fn modules() -> &'static RwLock<HashMap<String, LibGetActivationFactory>> {
    static MODULES: OnceLock<RwLock<HashMap<String, LibGetActivationFactory>>> = OnceLock::new();
    MODULES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a module entry point for a namespace
///
/// Returns the entry point previously registered for the namespace, if any.
pub fn register_module(
    namespace: &str,
    entry: LibGetActivationFactory,
) -> Result<Option<LibGetActivationFactory>> {
    if namespace.is_empty() {
        return Err(PalError::InvalidArg("empty module namespace".into()));
    }
    debug!("Registering activation module for namespace {}", namespace);
    Ok(modules().write().insert(namespace.to_string(), entry))
}

/// Remove the module registered for a namespace
pub fn unregister_module(namespace: &str) -> bool {
    let removed = modules().write().remove(namespace).is_some();
    if removed {
        debug!("Unregistered activation module for namespace {}", namespace);
    }
    removed
}

/// The namespace enclosing `name`, or `None` at the root
pub fn enclosing_namespace(name: &str) -> Option<&str> {
    name.rfind('.').map(|dot| &name[..dot])
}

/// Resolve the activation factory of `class_name` under interface `iid`
///
/// The caller owns one reference on the returned pointer.
pub fn get_activation_factory(class_name: &HString, iid: &Guid) -> Result<NonNull<c_void>> {
    if class_name.is_empty() {
        return Err(PalError::InvalidArg("empty class name".into()));
    }
    let name = class_name.to_string_lossy();

    let mut namespace = enclosing_namespace(&name);
    while let Some(ns) = namespace {
        // Copy the entry point out so the module runs without the table lock
        let entry = modules().read().get(ns).copied();
        if let Some(entry) = entry {
            trace!("Asking module {} for {}", ns, name);
            let mut factory: *mut c_void = ptr::null_mut();
            // SAFETY: class_name outlives the call and factory is a valid out slot
            let hr = unsafe { entry(class_name.as_raw(), iid, &mut factory) };
            match hr {
                hresult::CLASS_E_CLASSNOTAVAILABLE => {}
                hresult::E_NOINTERFACE => return Err(PalError::NoInterface(*iid)),
                hr if hr.is_err() => return Err(PalError::from_hresult(hr)),
                _ => {
                    debug!("Module {} provided factory for {}", ns, name);
                    return NonNull::new(factory).ok_or(PalError::Native(hresult::E_POINTER));
                }
            }
        }
        namespace = enclosing_namespace(ns);
    }

    Err(PalError::ClassNotAvailable(name))
}
