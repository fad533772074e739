//! Lifecycle Tests - Activation Outside the Apartment Window
//!
//! The apartment is process state, so this suite runs as its own binary
//! with a single test that controls the whole window:
//! - No apartment before the first init
//! - A registry refuses activation while the native apartment is down
//! - The same registry works again once the window is reopened

mod common;

use std::sync::atomic::Ordering;

use common::*;
use xlang::xlang_pal::apartment;
use xlang::{Apartment, ApartmentType, Error, IActivationFactory};

#[test]
fn test_activation_requires_initialized_apartment() {
    init_logging();
    let constructions = register_counter_class("LifecycleTests.Window.Counter", 9);
    assert_eq!(apartment::current(), None);

    let outer = Apartment::multi_threaded().unwrap();
    let registry = outer.registry().clone();

    // Close the native window underneath the registry
    apartment::uninit();
    assert_eq!(apartment::current(), None);

    assert!(matches!(
        registry.activate::<ICounter>("LifecycleTests.Window.Counter"),
        Err(Error::Apartment(_))
    ));
    assert!(matches!(
        registry.factory::<IActivationFactory>("LifecycleTests.Window.Counter"),
        Err(Error::Apartment(_))
    ));
    assert_eq!(constructions.load(Ordering::SeqCst), 0);
    assert_eq!(registry.cached_factories(), 0);

    // Reopen it; the registry was never torn down
    apartment::init(ApartmentType::MultiThreaded).unwrap();
    let counter = registry.activate::<ICounter>("LifecycleTests.Window.Counter").unwrap();
    assert_eq!(counter.value().unwrap(), 9);
    assert_eq!(constructions.load(Ordering::SeqCst), 1);

    drop(counter);
    outer.uninit();
    assert_eq!(apartment::current(), None);
    assert!(matches!(
        registry.activate::<ICounter>("LifecycleTests.Window.Counter"),
        Err(Error::Apartment(_))
    ));
}
