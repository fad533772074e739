//! Async Tests - Native Async Operations as Futures
//!
//! These tests exercise the async bridge:
//! - Exactly one terminal outcome per operation
//! - Awaiting a resolved operation again
//! - Completion from native threads
//! - Cooperative cancellation and error codes
//! - Tolerance of duplicate completion signals
//! - Many concurrent operations on a multi-threaded runtime

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use common::*;
use xlang::component::async_operation;
use xlang::xlang_pal::hresult;
use xlang::{AsyncOperation, AsyncStatus, Error, IInspectable, InterfaceRef};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Outcome {
    Complete,
    Cancel,
    Fail,
}

#[tokio::test]
async fn test_terminal_exclusivity() {
    init_logging();
    for outcome in [Outcome::Complete, Outcome::Cancel, Outcome::Fail] {
        let (operation, completer) = async_operation::<u32>().unwrap();
        let pending = AsyncOperation::<u32>::new(operation).unwrap();

        match outcome {
            Outcome::Complete => completer.complete(11),
            Outcome::Cancel => completer.canceled(),
            Outcome::Fail => completer.fail(hresult::E_INVALIDARG),
        }

        let first = pending.get().await;
        let second = pending.get().await;
        assert_eq!(first, second, "outcome changed for {:?}", outcome);

        match outcome {
            Outcome::Complete => assert_eq!(first, Ok(11)),
            Outcome::Cancel => assert_eq!(first, Err(Error::OperationCanceled)),
            Outcome::Fail => assert!(matches!(
                first,
                Err(Error::OperationFailed { code, .. }) if code == hresult::E_INVALIDARG
            )),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_completion_on_native_thread() {
    init_logging();
    let (operation, completer) = async_operation::<InterfaceRef<IInspectable>>().unwrap();
    let pending = AsyncOperation::<InterfaceRef<IInspectable>>::new(operation).unwrap();

    let (counter, released) = counter(5);
    let result = counter.cast::<IInspectable>().unwrap();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(25));
        completer.complete(result);
    });

    let instance = pending.get().await.unwrap();
    let back = instance.cast::<ICounter>().unwrap();
    assert_eq!(back.value().unwrap(), 5);
    assert!(back.identity_eq(&counter).unwrap());

    drop((instance, back, counter));
    drop(pending);
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancellation_path() {
    init_logging();
    let (operation, completer) = async_operation::<u64>().unwrap();
    let pending = AsyncOperation::<u64>::new(operation).unwrap();

    let worker = tokio::spawn(async move {
        let requested = tokio::time::timeout(Duration::from_secs(5), completer.cancel_requested()).await;
        if requested.is_ok() {
            completer.canceled();
        } else {
            completer.complete(0);
        }
    });

    // Cancellation is a request; nothing resolves until the operation says so
    pending.cancel().unwrap();
    worker.await.unwrap();

    assert_eq!(pending.get().await, Err(Error::OperationCanceled));
    assert_eq!(pending.status().unwrap(), AsyncStatus::Canceled);
}

#[tokio::test]
async fn test_completion_wins_over_late_cancel() {
    init_logging();
    let (operation, completer) = async_operation::<u32>().unwrap();
    let pending = AsyncOperation::<u32>::new(operation).unwrap();

    completer.complete(3);
    pending.cancel().unwrap();
    assert_eq!(pending.get().await, Ok(3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timed_out_await_then_completion() {
    init_logging();
    let (operation, completer) = async_operation::<u32>().unwrap();
    let pending = AsyncOperation::<u32>::new(operation).unwrap();

    // Several awaits abandoned before the signal
    for _ in 0..3 {
        let early = tokio::time::timeout(Duration::from_millis(10), pending.get()).await;
        assert!(early.is_err());
    }
    tokio::select! {
        _ = pending.get() => panic!("resolved before completion"),
        _ = tokio::time::sleep(Duration::from_millis(10)) => {}
    }
    assert!(!pending.is_resolved());

    let native = std::thread::spawn(move || completer.complete(42));
    assert_eq!(pending.get().await, Ok(42));
    native.join().unwrap();
    assert_eq!(pending.get().await, Ok(42));
    assert_eq!(pending.status().unwrap(), AsyncStatus::Completed);
}

#[tokio::test]
async fn test_duplicate_completion_signal() {
    init_logging();
    let (operation, completer) = async_operation::<u32>().unwrap();
    let pending = AsyncOperation::<u32>::new(operation.clone()).unwrap();
    completer.complete(1);

    // Misbehaving native side signals twice more with other states
    let handler = operation.completed().unwrap().expect("handler registered");
    handler.invoke(&operation, AsyncStatus::Error).unwrap();
    handler.invoke(&operation, AsyncStatus::Canceled).unwrap();

    assert_eq!(pending.get().await, Ok(1));
}

#[tokio::test]
async fn test_unknown_status_code() {
    init_logging();
    let (operation, _completer) = async_operation::<u32>().unwrap();
    let pending = AsyncOperation::<u32>::new(operation.clone()).unwrap();

    let handler = operation.completed().unwrap().expect("handler registered");
    unsafe {
        (handler.vtable().invoke)(handler.as_raw().as_ptr(), operation.as_raw().as_ptr(), 42);
    }
    assert_eq!(pending.get().await, Err(Error::UnexpectedStatus(42)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_operations() {
    init_logging();
    const NUM_OPERATIONS: usize = 200;
    const NUM_THREADS: usize = 4;

    let start = Instant::now();
    let completed = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    let mut completers = Vec::new();
    for i in 0..NUM_OPERATIONS {
        let (operation, completer) = async_operation::<u64>().unwrap();
        let op = AsyncOperation::<u64>::new(operation).unwrap();
        let completed = completed.clone();
        handles.push(tokio::spawn(async move {
            let value = op.await?;
            completed.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>((i as u64, value))
        }));
        completers.push((i as u64, completer));
    }

    // Complete in reverse order from a few native threads
    completers.reverse();
    let mut threads = Vec::new();
    let chunk_size = NUM_OPERATIONS / NUM_THREADS;
    while !completers.is_empty() {
        let chunk: Vec<_> = completers.drain(..chunk_size.min(completers.len())).collect();
        threads.push(std::thread::spawn(move || {
            for (i, completer) in chunk {
                completer.complete(i * 2);
            }
        }));
    }
    for t in threads {
        t.join().unwrap();
    }

    let results = join_all(handles).await;
    let success_count = results
        .iter()
        .filter(|r| matches!(r, Ok(Ok((i, v))) if *v == i * 2))
        .count();

    println!("\n=== Concurrent Async Operations Test ===");
    println!("Operations: {}", NUM_OPERATIONS);
    println!("Completed: {}", completed.load(Ordering::SeqCst));
    println!("Correct results: {}", success_count);
    println!("Duration: {:?}", start.elapsed());

    assert_eq!(success_count, NUM_OPERATIONS);
    assert_eq!(completed.load(Ordering::SeqCst), NUM_OPERATIONS);
}
