//! Activation Tests - Registry, Factories and Apartment Lifecycle
//!
//! These tests exercise class activation end to end:
//! - Factory caching under sequential and concurrent activation
//! - Enclosing-namespace walking across native modules
//! - Non-activatable classes and missing factory interfaces
//! - Apartment teardown and mode conflicts

mod common;

use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Barrier;

use common::*;
use xlang::xlang_pal::string::{raw_to_string, RawString};
use xlang::xlang_pal::unknown::IInspectableVtbl;
use xlang::xlang_pal::{hresult, PalError};
use xlang::{
    ActivationFailure, Apartment, ApartmentConfig, ApartmentType, Error, Guid, HResult, IActivationFactory,
    IInspectable, Interface,
};

#[test]
fn test_factory_resolved_once() {
    init_logging();
    let constructions = register_counter_class("ActivationTests.Cache.Counter", 3);
    let apartment = Apartment::multi_threaded().unwrap();

    for _ in 0..10 {
        let counter = apartment.activate::<ICounter>("ActivationTests.Cache.Counter").unwrap();
        assert_eq!(counter.value().unwrap(), 3);
    }

    println!("\n=== Factory Cache Test ===");
    println!("Activations: 10");
    println!("Factory constructions: {}", constructions.load(Ordering::SeqCst));

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert_eq!(apartment.registry().cached_factories(), 1);
    apartment.uninit();
}

#[test]
fn test_uncached_apartment_resolves_every_time() {
    init_logging();
    let constructions = register_counter_class("ActivationTests.NoCache.Counter", 0);
    let apartment = Apartment::init(ApartmentConfig {
        cache_factories: false,
        ..Default::default()
    })
    .unwrap();

    for _ in 0..4 {
        apartment.activate::<IInspectable>("ActivationTests.NoCache.Counter").unwrap();
    }
    assert_eq!(constructions.load(Ordering::SeqCst), 4);
    assert_eq!(apartment.registry().cached_factories(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_activation() {
    init_logging();
    let constructions = register_counter_class("ActivationTests.Race.Counter", 1);
    let apartment = Apartment::multi_threaded().unwrap();
    let registry = apartment.registry().clone();

    const NUM_TASKS: usize = 16;
    let barrier = Arc::new(Barrier::new(NUM_TASKS));

    let mut handles = Vec::new();
    for _ in 0..NUM_TASKS {
        let barrier = barrier.clone();
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let counter = registry.activate::<ICounter>("ActivationTests.Race.Counter")?;
            counter.value()
        }));
    }

    let results = join_all(handles).await;
    let success_count = results
        .iter()
        .filter(|r| matches!(r, Ok(Ok(1))))
        .count();

    println!("\n=== Concurrent Activation Test ===");
    println!("Tasks: {}", NUM_TASKS);
    println!("Successful: {}", success_count);
    println!("Factory constructions: {}", constructions.load(Ordering::SeqCst));

    assert_eq!(success_count, NUM_TASKS);
    // Racing resolutions may construct more than once, but only one is kept
    assert!(constructions.load(Ordering::SeqCst) >= 1);
    assert_eq!(registry.cached_factories(), 1);

    // Settled: no further constructions
    let settled = constructions.load(Ordering::SeqCst);
    registry.activate::<ICounter>("ActivationTests.Race.Counter").unwrap();
    assert_eq!(constructions.load(Ordering::SeqCst), settled);
}

static WALK_CALLS: AtomicUsize = AtomicUsize::new(0);

// Native module registered for the outermost namespace only
unsafe extern "system" fn walk_module(class_name: RawString, iid: *const Guid, factory: *mut *mut c_void) -> HResult {
    WALK_CALLS.fetch_add(1, Ordering::SeqCst);
    if raw_to_string(class_name) != "ActivationTests.Walk.Deep.Nested.Counter" {
        return hresult::CLASS_E_CLASSNOTAVAILABLE;
    }
    let made = xlang::component::ClassFactory::new(|| {
        let (counter, _) = counter(99);
        counter.cast::<IInspectable>()
    })
    .into_unknown()
    .and_then(|f| f.query(&*iid));
    match made {
        Ok(f) => {
            *factory = f.into_raw().as_ptr();
            hresult::S_OK
        }
        Err(e) => e.hresult(),
    }
}

#[test]
fn test_namespace_walk() {
    init_logging();
    xlang::xlang_pal::register_module("ActivationTests.Walk", walk_module).unwrap();
    let apartment = Apartment::multi_threaded().unwrap();

    let counter = apartment
        .activate::<ICounter>("ActivationTests.Walk.Deep.Nested.Counter")
        .unwrap();
    assert_eq!(counter.value().unwrap(), 99);
    assert_eq!(WALK_CALLS.load(Ordering::SeqCst), 1);

    let err = apartment
        .activate::<ICounter>("ActivationTests.Walk.Deep.Other")
        .unwrap_err();
    assert_eq!(
        err,
        Error::Activation {
            class: "ActivationTests.Walk.Deep.Other".into(),
            reason: ActivationFailure::ClassNotFound,
        }
    );
}

#[test]
fn test_non_activatable_class() {
    init_logging();
    register_static_class("ActivationTests.Statics.Helper");
    let apartment = Apartment::multi_threaded().unwrap();

    let err = apartment.activate::<IInspectable>("ActivationTests.Statics.Helper").unwrap_err();
    assert!(matches!(
        err,
        Error::Activation {
            reason: ActivationFailure::NotActivatable,
            ..
        }
    ));
    assert_eq!(err.hresult(), hresult::E_NOTIMPL);

    let factory = apartment
        .factory::<IActivationFactory>("ActivationTests.Statics.Helper")
        .unwrap();
    assert_eq!(factory.runtime_class_name().unwrap(), "xlang.ClassFactory");
}

#[test]
fn test_missing_statics_interface() {
    struct IHelperStatics;

    #[repr(C)]
    struct IHelperStaticsVtbl {
        base: IInspectableVtbl,
    }

    unsafe impl Interface for IHelperStatics {
        const IID: Guid = Guid::from_u128(0x0A1B2C3D_4E5F_4061_8273_8495A6B7C8D9);
        const NAME: &'static str = "IHelperStatics";
        type Vtable = IHelperStaticsVtbl;
    }

    init_logging();
    register_static_class("ActivationTests.NoStatics.Helper");
    let apartment = Apartment::multi_threaded().unwrap();
    let err = apartment
        .factory::<IHelperStatics>("ActivationTests.NoStatics.Helper")
        .unwrap_err();
    assert_eq!(
        err,
        Error::Activation {
            class: "ActivationTests.NoStatics.Helper".into(),
            reason: ActivationFailure::FactoryUnsupported,
        }
    );
}

#[test]
fn test_instance_without_requested_interface() {
    init_logging();
    register_class_without_counter();
    let apartment = Apartment::multi_threaded().unwrap();
    let err = apartment
        .activate::<ICounter>("ActivationTests.Plain.Thing")
        .unwrap_err();
    assert_eq!(
        err,
        Error::NotSupported {
            interface: "ICounter".into()
        }
    );
}

fn register_class_without_counter() {
    use xlang::xlang_pal::object::{self, ComClass, InterfaceEntry};

    struct Plain;

    impl ComClass for Plain {
        const CLASS_NAME: &'static str = "ActivationTests.Plain.Thing";

        fn interfaces() -> &'static [InterfaceEntry] {
            &[]
        }
    }

    xlang::component::register_class("ActivationTests.Plain.Thing", || {
        xlang::component::ClassFactory::new(|| {
            let ptr = object::create_instance(Plain, &IInspectable::IID)?;
            Ok(unsafe { xlang::InterfaceRef::from_raw(ptr) })
        })
        .into_unknown()
    })
    .unwrap();
}

#[test]
fn test_teardown_releases_factories() {
    init_logging();
    register_counter_class("ActivationTests.Teardown.Counter", 0);
    let apartment = Apartment::multi_threaded().unwrap();
    let registry = apartment.registry().clone();

    let factory = registry
        .factory::<IActivationFactory>("ActivationTests.Teardown.Counter")
        .unwrap();
    assert_eq!(registry.cached_factories(), 1);

    apartment.uninit();
    assert!(registry.is_torn_down());
    assert_eq!(registry.cached_factories(), 0);

    // Handles obtained before teardown stay valid on their own
    assert!(factory.activate_instance().is_ok());

    assert!(matches!(
        registry.activate::<ICounter>("ActivationTests.Teardown.Counter"),
        Err(Error::Apartment(_))
    ));
}

#[test]
fn test_apartment_mode_conflict() {
    init_logging();
    let mta = Apartment::multi_threaded().unwrap();
    assert_eq!(mta.apartment_type(), ApartmentType::MultiThreaded);

    let err = Apartment::init(ApartmentConfig {
        apartment_type: ApartmentType::SingleThreaded,
        ..Default::default()
    })
    .err()
    .expect("mode change must fail");
    assert_eq!(err, Error::Pal(PalError::ChangedMode));
    assert_eq!(err.hresult(), hresult::RPC_E_CHANGED_MODE);

    // Joining in the same mode is fine
    let joined = Apartment::multi_threaded().unwrap();
    drop(joined);
    drop(mta);
}
