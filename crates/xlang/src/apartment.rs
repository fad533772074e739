//! Apartment lifecycle
//!
//! An [`Apartment`] brackets all projection work: it initializes the
//! native apartment, owns the activation registry, and on
//! [`Apartment::uninit`] (or drop) releases every cached factory before
//! uninitializing the native apartment. Teardown runs exactly once.

use std::sync::Arc;

use tracing::{debug, info};
use xlang_pal::{apartment, hresult, ApartmentType};

use crate::activation::ActivationRegistry;
use crate::error::Result;
use crate::interface::{Interface, InterfaceRef};

/// Configuration for an apartment
#[derive(Clone, Debug)]
pub struct ApartmentConfig {
    /// Threading mode of the native apartment
    pub apartment_type: ApartmentType,
    /// Whether resolved factories are kept for reuse
    pub cache_factories: bool,
}

impl Default for ApartmentConfig {
    fn default() -> Self {
        Self {
            apartment_type: ApartmentType::MultiThreaded,
            cache_factories: true,
        }
    }
}

/// An initialized apartment and its activation registry
pub struct Apartment {
    config: ApartmentConfig,
    registry: Arc<ActivationRegistry>,
    active: bool,
}

impl Apartment {
    /// Initialize the native apartment and create an empty registry
    pub fn init(config: ApartmentConfig) -> Result<Self> {
        let hr = apartment::init(config.apartment_type)?;
        if hr == hresult::S_FALSE {
            debug!("Joining existing {} apartment", config.apartment_type);
        } else {
            info!("Initialized {} apartment", config.apartment_type);
        }
        Ok(Self {
            registry: Arc::new(ActivationRegistry::new(config.cache_factories)),
            config,
            active: true,
        })
    }

    /// Initialize with the default configuration
    pub fn multi_threaded() -> Result<Self> {
        Self::init(ApartmentConfig::default())
    }

    pub fn apartment_type(&self) -> ApartmentType {
        self.config.apartment_type
    }

    pub fn config(&self) -> &ApartmentConfig {
        &self.config
    }

    /// The activation registry, shareable with tasks
    pub fn registry(&self) -> &Arc<ActivationRegistry> {
        &self.registry
    }

    /// Activate a class through this apartment's registry
    pub fn activate<I: Interface>(&self, class_name: &str) -> Result<InterfaceRef<I>> {
        self.registry.activate(class_name)
    }

    /// Resolve a class's factory through this apartment's registry
    pub fn factory<F: Interface>(&self, class_name: &str) -> Result<InterfaceRef<F>> {
        self.registry.factory(class_name)
    }

    /// Tear down explicitly
    pub fn uninit(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.registry.teardown();
        apartment::uninit();
        info!("Apartment torn down ({})", self.config.apartment_type);
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        self.teardown();
    }
}
