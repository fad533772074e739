//! Default activation factory for hosted classes

use std::ffi::c_void;

use tracing::{debug, warn};
use xlang_pal::object::{self, ComClass, InterfaceEntry, INSPECTABLE_BASE};
use xlang_pal::{hresult, HResult};

use crate::activation::{IActivationFactory, IActivationFactoryVtbl};
use crate::error::Result;
use crate::interface::{IInspectable, IUnknown, Interface, InterfaceRef};

type Activator = Box<dyn Fn() -> Result<InterfaceRef<IInspectable>> + Send + Sync>;

/// An `IActivationFactory` backed by a Rust closure
pub struct ClassFactory {
    activator: Option<Activator>,
}

static FACTORY_VTBL: IActivationFactoryVtbl = IActivationFactoryVtbl {
    base: INSPECTABLE_BASE,
    activate_instance: factory_activate_instance,
};

impl ComClass for ClassFactory {
    const CLASS_NAME: &'static str = "xlang.ClassFactory";

    fn interfaces() -> &'static [InterfaceEntry] {
        static ENTRIES: [InterfaceEntry; 1] = [InterfaceEntry::new(IActivationFactory::IID, &FACTORY_VTBL)];
        &ENTRIES
    }
}

impl ClassFactory {
    /// A factory creating instances with `activator`
    pub fn new<F>(activator: F) -> Self
    where
        F: Fn() -> Result<InterfaceRef<IInspectable>> + Send + Sync + 'static,
    {
        Self {
            activator: Some(Box::new(activator)),
        }
    }

    /// A factory for a class that only exposes statics
    pub fn non_activatable() -> Self {
        Self { activator: None }
    }

    pub fn into_factory(self) -> Result<InterfaceRef<IActivationFactory>> {
        let ptr = object::create_instance(self, &IActivationFactory::IID)?;
        // SAFETY: create_instance returned one reference on the factory interface
        Ok(unsafe { InterfaceRef::from_raw(ptr) })
    }

    pub fn into_unknown(self) -> Result<InterfaceRef<IUnknown>> {
        let ptr = object::create_instance(self, &IUnknown::IID)?;
        // SAFETY: as above, on the identity interface
        Ok(unsafe { InterfaceRef::from_raw(ptr) })
    }
}

unsafe extern "system" fn factory_activate_instance(this: *mut c_void, instance: *mut *mut c_void) -> HResult {
    if instance.is_null() {
        return hresult::E_POINTER;
    }
    *instance = std::ptr::null_mut();

    let factory = object::value_of::<ClassFactory>(this);
    let activator = match &factory.activator {
        Some(a) => a,
        None => return hresult::E_NOTIMPL,
    };
    match activator() {
        Ok(object) => {
            debug!("Activated instance through hosted factory");
            *instance = object.into_raw().as_ptr();
            hresult::S_OK
        }
        Err(e) => {
            warn!("Activation failed: {}", e);
            e.hresult()
        }
    }
}
