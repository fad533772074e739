//! Reference Counting Tests - Interface Handle Ownership
//!
//! These tests exercise handle ownership across the ABI:
//! - Clone/drop balance for any number of handles
//! - Navigation handles sharing one object count
//! - Ownership transfer through raw pointers and ABI values
//! - Cross-thread clone/drop traffic
//! - Native string handles sharing one buffer

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Barrier;

use common::*;
use xlang::xlang_pal::string::{duplicate_string, string_ref_count};
use xlang::{AbiType, Error, HString, IInspectable, IUnknown, InterfaceRef};

#[test]
fn test_n_clones_release_once() {
    init_logging();
    for n in [0usize, 1, 5, 64] {
        let (original, released) = counter(0);
        let clones: Vec<_> = (0..n).map(|_| original.clone()).collect();

        // n clones plus the original: n + 1 drops
        drop(original);
        for clone in clones {
            assert!(!released.load(Ordering::SeqCst), "released early with n = {}", n);
            drop(clone);
        }
        assert!(released.load(Ordering::SeqCst), "not released with n = {}", n);
    }
}

#[test]
fn test_navigation_shares_the_object() {
    init_logging();
    let (counter, released) = counter(1);
    let inspectable = counter.cast::<IInspectable>().unwrap();
    let unknown = inspectable.cast::<IUnknown>().unwrap();
    let back = unknown.cast::<ICounter>().unwrap();

    back.increment().unwrap();
    assert_eq!(counter.value().unwrap(), 2);
    assert!(counter.identity_eq(&unknown).unwrap());

    drop(counter);
    drop(inspectable);
    drop(unknown);
    assert!(!released.load(Ordering::SeqCst));
    drop(back);
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn test_failed_navigation_keeps_source() {
    init_logging();
    struct IAbsent;
    unsafe impl xlang::Interface for IAbsent {
        const IID: xlang::Guid = xlang::Guid::from_u128(0xDEADBEEF_0000_4000_8000_000000000001);
        const NAME: &'static str = "IAbsent";
        type Vtable = xlang::xlang_pal::unknown::IUnknownVtbl;
    }

    let (counter, released) = counter(7);
    assert_eq!(
        counter.cast::<IAbsent>().unwrap_err(),
        Error::NotSupported {
            interface: "IAbsent".into()
        }
    );
    assert_eq!(counter.value().unwrap(), 7);
    drop(counter);
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn test_abi_transfer() {
    init_logging();
    let (counter, released) = counter(0);

    // to_abi hands out an owned reference
    let raw = counter.to_abi();
    drop(counter);
    assert!(!released.load(Ordering::SeqCst));

    let taken = unsafe { InterfaceRef::<ICounter>::from_abi(raw) }.unwrap();
    assert_eq!(taken.value().unwrap(), 0);
    drop(taken);
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cross_thread_clone_drop() {
    init_logging();
    let (counter, released) = counter(0);

    const NUM_TASKS: usize = 32;
    const CLONES_PER_TASK: usize = 100;
    let barrier = Arc::new(Barrier::new(NUM_TASKS));

    let mut handles = Vec::new();
    for _ in 0..NUM_TASKS {
        let barrier = barrier.clone();
        let counter = counter.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            for _ in 0..CLONES_PER_TASK {
                let c = counter.clone();
                c.increment().unwrap();
            }
        }));
    }

    let results = join_all(handles).await;
    assert!(results.iter().all(|r| r.is_ok()));

    println!("\n=== Cross-Thread Reference Test ===");
    println!("Tasks: {}", NUM_TASKS);
    println!("Increments: {}", counter.value().unwrap());

    assert_eq!(counter.value().unwrap(), (NUM_TASKS * CLONES_PER_TASK) as i32);
    assert!(!released.load(Ordering::SeqCst));
    drop(counter);
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn test_string_handles_share_buffer() {
    init_logging();
    let original = HString::new("Sample.Geolocation.Geolocator").unwrap();
    let copy = original.clone();
    assert_eq!(unsafe { string_ref_count(original.as_raw()) }, 2);
    assert_eq!(copy.as_wide().as_ptr(), original.as_wide().as_ptr());

    let dup = unsafe { HString::from_raw(duplicate_string(original.as_raw())) };
    assert_eq!(unsafe { string_ref_count(original.as_raw()) }, 3);

    drop(copy);
    drop(dup);
    assert_eq!(unsafe { string_ref_count(original.as_raw()) }, 1);
    assert_eq!(original.to_string(), "Sample.Geolocation.Geolocator");

    // Empty strings have no buffer at all
    let empty = HString::new("").unwrap();
    assert!(empty.as_raw().is_null());
    assert_eq!(empty.len(), 0);
}
