//! In-process components
//!
//! Rust code can provide runtime classes to the activation path the same
//! way a native module does. [`register_class`] records a factory
//! constructor under the class name and registers a shared module entry
//! point for the class's enclosing namespace:
//!
//! ```text
//! get_activation_factory("Sample.Geolocation.Geolocator", iid)
//!   └─ module "Sample.Geolocation" = hosted entry
//!        ├─ class table lookup      unknown → CLASS_E_CLASSNOTAVAILABLE
//!        ├─ constructor()           new factory object
//!        └─ QueryInterface(iid)     factory or statics interface
//! ```

mod async_source;
mod event;
mod factory;
mod iterable;

use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use xlang_pal::activation::enclosing_namespace;
use xlang_pal::string::{raw_to_string, RawString};
use xlang_pal::{hresult, Guid, HResult, PalError};

use crate::error::{Error, Result};
use crate::interface::{IUnknown, InterfaceRef};

pub use async_source::{async_operation, AsyncCompleter};
pub use event::{delegate, EventSource};
pub use factory::ClassFactory;
pub use iterable::iterable;

/// Produces a new factory object for a hosted class
pub type FactoryConstructor = Arc<dyn Fn() -> Result<InterfaceRef<IUnknown>> + Send + Sync>;

fn classes() -> &'static RwLock<HashMap<String, FactoryConstructor>> {
    static CLASSES: OnceLock<RwLock<HashMap<String, FactoryConstructor>>> = OnceLock::new();
    CLASSES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Make a class activatable by name
///
/// `make_factory` runs on every factory resolution; callers that cache
/// factories (the activation registry does by default) call it once.
pub fn register_class<F>(class_name: &str, make_factory: F) -> Result<()>
where
    F: Fn() -> Result<InterfaceRef<IUnknown>> + Send + Sync + 'static,
{
    let namespace = enclosing_namespace(class_name).ok_or_else(|| {
        Error::Pal(PalError::InvalidArg(format!("class name {} has no namespace", class_name)))
    })?;

    classes()
        .write()
        .insert(class_name.to_string(), Arc::new(make_factory));
    let previous = xlang_pal::register_module(namespace, hosted_get_activation_factory)?;
    if previous.is_some_and(|entry| entry as usize != hosted_get_activation_factory as usize) {
        warn!("Replaced a foreign activation module for namespace {}", namespace);
    }
    debug!("Registered class {}", class_name);
    Ok(())
}

/// Remove a hosted class; returns whether it was registered
pub fn unregister_class(class_name: &str) -> bool {
    let removed = classes().write().remove(class_name).is_some();
    if removed {
        debug!("Unregistered class {}", class_name);
    }
    removed
}

unsafe extern "system" fn hosted_get_activation_factory(
    class_name: RawString,
    iid: *const Guid,
    factory: *mut *mut c_void,
) -> HResult {
    if factory.is_null() || iid.is_null() {
        return hresult::E_POINTER;
    }
    *factory = ptr::null_mut();

    let name = raw_to_string(class_name);
    // Clone the constructor out so it runs without the table lock
    let constructor = classes().read().get(&name).cloned();
    let constructor = match constructor {
        Some(c) => c,
        None => return hresult::CLASS_E_CLASSNOTAVAILABLE,
    };

    trace!("Constructing factory for {}", name);
    let object = match constructor() {
        Ok(object) => object,
        Err(e) => {
            warn!("Factory constructor for {} failed: {}", name, e);
            return e.hresult();
        }
    };

    match object.query(&*iid) {
        Ok(requested) => {
            *factory = requested.into_raw().as_ptr();
            hresult::S_OK
        }
        Err(e) => e.hresult(),
    }
}
