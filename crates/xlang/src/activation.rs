//! Class activation
//!
//! The registry resolves a class name to its activation factory through the
//! platform entry point and caches the factory per (class name, factory
//! interface) for the lifetime of the owning apartment.
//!
//! ```text
//! activate::<I>("Sample.Geolocation.Geolocator")
//!   ├─ factory::<IActivationFactory>(..)   cached, resolved at most once
//!   ├─ ActivateInstance()                  new object, one reference
//!   └─ QueryInterface(I)                   navigate to the requested interface
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, trace};
use xlang_pal::unknown::{IInspectableVtbl, IID_IACTIVATION_FACTORY};
use xlang_pal::{apartment, hresult, Guid, HResult, HString, PalError};

use crate::error::{ActivationFailure, Error, Result};
use crate::interface::{IInspectable, IUnknown, Interface, InterfaceRef};

/// Factory interface for default activation
pub struct IActivationFactory;

#[repr(C)]
pub struct IActivationFactoryVtbl {
    pub base: IInspectableVtbl,
    pub activate_instance: unsafe extern "system" fn(this: *mut c_void, instance: *mut *mut c_void) -> HResult,
}

unsafe impl Interface for IActivationFactory {
    const IID: Guid = IID_IACTIVATION_FACTORY;
    const NAME: &'static str = "IActivationFactory";
    type Vtable = IActivationFactoryVtbl;
}

impl InterfaceRef<IActivationFactory> {
    /// Create a default instance of the factory's class
    pub fn activate_instance(&self) -> Result<InterfaceRef<IInspectable>> {
        let mut instance: *mut c_void = ptr::null_mut();
        // SAFETY: self is live and instance is a valid out slot
        let hr = unsafe { (self.vtable().activate_instance)(self.as_raw().as_ptr(), &mut instance) };
        if hr.is_err() {
            return Err(Error::Native(hr));
        }
        NonNull::new(instance)
            // SAFETY: success transfers one reference
            .map(|p| unsafe { InterfaceRef::from_raw(p) })
            .ok_or(Error::Native(hresult::E_POINTER))
    }
}

/// Per-apartment cache of activation factories
///
/// Only an [`Apartment`](crate::Apartment) creates registries. Every
/// lookup requires the native apartment to be initialized and the owning
/// apartment not to be torn down.
pub struct ActivationRegistry {
    factories: RwLock<HashMap<(String, Guid), InterfaceRef<IUnknown>>>,
    cache_factories: bool,
    torn_down: AtomicBool,
}

impl ActivationRegistry {
    pub(crate) fn new(cache_factories: bool) -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            cache_factories,
            torn_down: AtomicBool::new(false),
        }
    }

    /// Activate a class and navigate to interface `I`
    pub fn activate<I: Interface>(&self, class_name: &str) -> Result<InterfaceRef<I>> {
        let factory = self.factory::<IActivationFactory>(class_name)?;
        let instance = factory.activate_instance().map_err(|e| match e {
            Error::Native(hresult::E_NOTIMPL) => Error::activation(class_name, ActivationFailure::NotActivatable),
            Error::Native(code) => Error::activation(class_name, ActivationFailure::Failed(code)),
            other => other,
        })?;
        debug!("Activated {} as {}", class_name, I::NAME);
        instance.cast::<I>()
    }

    /// Resolve a class's factory under factory or statics interface `F`
    pub fn factory<F: Interface>(&self, class_name: &str) -> Result<InterfaceRef<F>> {
        self.ensure_active(class_name)?;
        let key = (class_name.to_string(), F::IID);

        if self.cache_factories {
            if let Some(cached) = self.factories.read().get(&key) {
                trace!("Factory cache hit for {} ({})", class_name, F::NAME);
                // SAFETY: cached under F's IID, so the pointer is an F pointer
                return Ok(unsafe { InterfaceRef::from_raw_borrowed(&cached.as_raw()) });
            }
        }

        // Resolve outside the lock; module code may activate other classes
        let factory = self.resolve(class_name, &F::IID)?;
        debug!("Resolved factory for {} ({})", class_name, F::NAME);

        if !self.cache_factories {
            // SAFETY: resolved under F's IID
            return Ok(unsafe { InterfaceRef::from_raw(factory.into_raw()) });
        }

        let mut factories = self.factories.write();
        // Teardown may have run while resolving
        self.ensure_active(class_name)?;
        let kept = match factories.entry(key) {
            Entry::Occupied(existing) => {
                debug!("Lost factory race for {}, releasing duplicate", class_name);
                existing.get().clone()
            }
            Entry::Vacant(slot) => slot.insert(factory.clone()).clone(),
        };
        drop(factories);
        drop(factory);

        // SAFETY: every entry under this key was resolved under F's IID
        Ok(unsafe { InterfaceRef::from_raw(kept.into_raw()) })
    }

    /// Number of cached factories
    pub fn cached_factories(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Release every cached factory and refuse further activation
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let released: Vec<_> = self.factories.write().drain().collect();
        debug!("Registry torn down, releasing {} factories", released.len());
        // Released outside the lock
        drop(released);
    }

    fn ensure_active(&self, class_name: &str) -> Result<()> {
        if self.is_torn_down() {
            return Err(Error::Apartment(format!(
                "activation of {} after apartment teardown",
                class_name
            )));
        }
        if apartment::current().is_none() {
            return Err(Error::Apartment(format!(
                "activation of {} outside an initialized apartment",
                class_name
            )));
        }
        Ok(())
    }

    fn resolve(&self, class_name: &str, iid: &Guid) -> Result<InterfaceRef<IUnknown>> {
        let name = HString::new(class_name)?;
        let raw = xlang_pal::get_activation_factory(&name, iid).map_err(|e| {
            let reason = match e {
                PalError::ClassNotAvailable(_) => ActivationFailure::ClassNotFound,
                PalError::NoInterface(_) => ActivationFailure::FactoryUnsupported,
                other => ActivationFailure::Failed(other.hresult()),
            };
            Error::activation(class_name, reason)
        })?;
        // SAFETY: the entry point transferred one reference
        Ok(unsafe { InterfaceRef::from_raw(raw) })
    }
}

impl Drop for ActivationRegistry {
    fn drop(&mut self) {
        self.teardown();
    }
}
