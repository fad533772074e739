//! Async operations implemented in Rust
//!
//! [`async_operation`] creates a native object implementing
//! `IAsyncOperation` and `IAsyncInfo` plus an [`AsyncCompleter`] that moves
//! it to a terminal state exactly once. The completion delegate is invoked
//! outside the state lock, on whichever thread completes the operation.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};
use xlang_pal::object::{self, ComClass, InterfaceEntry, INSPECTABLE_BASE};
use xlang_pal::{hresult, HResult};

use crate::abi::AbiType;
use crate::async_op::{
    AsyncStatus, IAsyncCompletedHandler, IAsyncInfo, IAsyncInfoVtbl, IAsyncOperation, IAsyncOperationVtbl,
};
use crate::error::Result;
use crate::interface::{Interface, InterfaceRef};

type ResultWriter = Box<dyn Fn(*mut c_void) + Send + Sync>;

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

struct State {
    status: AsyncStatus,
    error_code: HResult,
    handler: Option<InterfaceRef<IAsyncCompletedHandler>>,
    results: Option<ResultWriter>,
    cancel_requested: bool,
    closed: bool,
}

struct AsyncOperationSource {
    id: u32,
    state: Mutex<State>,
    cancel: Arc<Notify>,
}

static OPERATION_VTBL: IAsyncOperationVtbl = IAsyncOperationVtbl {
    base: INSPECTABLE_BASE,
    put_completed: source_put_completed,
    get_completed: source_get_completed,
    get_results: source_get_results,
};

static INFO_VTBL: IAsyncInfoVtbl = IAsyncInfoVtbl {
    base: INSPECTABLE_BASE,
    get_id: source_get_id,
    get_status: source_get_status,
    get_error_code: source_get_error_code,
    cancel: source_cancel,
    close: source_close,
};

impl ComClass for AsyncOperationSource {
    const CLASS_NAME: &'static str = "xlang.AsyncOperation";

    fn interfaces() -> &'static [InterfaceEntry] {
        static ENTRIES: [InterfaceEntry; 2] = [
            InterfaceEntry::new(IAsyncOperation::IID, &OPERATION_VTBL),
            InterfaceEntry::new(IAsyncInfo::IID, &INFO_VTBL),
        ];
        &ENTRIES
    }
}

/// Create a pending operation and the handle that completes it
pub fn async_operation<T>() -> Result<(InterfaceRef<IAsyncOperation>, AsyncCompleter<T>)>
where
    T: AbiType + Send + Sync + 'static,
{
    let cancel = Arc::new(Notify::new());
    let source = AsyncOperationSource {
        id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        state: Mutex::new(State {
            status: AsyncStatus::Started,
            error_code: hresult::S_OK,
            handler: None,
            results: None,
            cancel_requested: false,
            closed: false,
        }),
        cancel: cancel.clone(),
    };
    let id = source.id;
    let ptr = object::create_instance(source, &IAsyncOperation::IID)?;
    // SAFETY: create_instance returned one reference on IAsyncOperation
    let operation: InterfaceRef<IAsyncOperation> = unsafe { InterfaceRef::from_raw(ptr) };
    trace!("Created async operation {}", id);

    let completer = AsyncCompleter {
        operation: Some(operation.clone()),
        cancel,
        _marker: PhantomData,
    };
    Ok((operation, completer))
}

/// Moves an operation created by [`async_operation`] to its terminal state
///
/// Dropping a completer that never completed reports `Error(E_ABORT)`.
pub struct AsyncCompleter<T> {
    operation: Option<InterfaceRef<IAsyncOperation>>,
    cancel: Arc<Notify>,
    _marker: PhantomData<fn(T)>,
}

impl<T> AsyncCompleter<T>
where
    T: AbiType + Send + Sync + 'static,
{
    /// Complete with a result
    pub fn complete(mut self, value: T) {
        let writer: ResultWriter = Box::new(move |out| {
            // SAFETY: out points at a T::Abi slot supplied to GetResults
            unsafe { ptr::write(out as *mut T::Abi, value.to_abi()) }
        });
        self.finish(AsyncStatus::Completed, hresult::S_OK, Some(writer));
    }

    /// End in the error state with `code`
    pub fn fail(mut self, code: HResult) {
        self.finish(AsyncStatus::Error, code, None);
    }

    /// Acknowledge cancellation
    pub fn canceled(mut self) {
        self.finish(AsyncStatus::Canceled, hresult::ERROR_CANCELLED, None);
    }

    /// Whether the caller asked for cancellation
    pub fn is_cancel_requested(&self) -> bool {
        self.operation
            .as_ref()
            .map_or(false, |op| source_of(op).state.lock().cancel_requested)
    }

    /// Wait until the caller asks for cancellation
    pub async fn cancel_requested(&self) {
        if !self.is_cancel_requested() {
            self.cancel.notified().await;
        }
    }
}

impl<T> AsyncCompleter<T> {
    fn finish(&mut self, status: AsyncStatus, code: HResult, results: Option<ResultWriter>) {
        let operation = match self.operation.take() {
            Some(op) => op,
            None => return,
        };
        let source = source_of(&operation);
        let handler = {
            let mut state = source.state.lock();
            state.status = status;
            state.error_code = code;
            state.results = results;
            state.handler.clone()
        };
        debug!("Async operation {} finished: {}", source.id, status);

        if let Some(handler) = handler {
            if let Err(e) = handler.invoke(&operation, status) {
                warn!("Completion handler for operation {} failed: {}", source.id, e);
            }
        }
    }
}

impl<T> Drop for AsyncCompleter<T> {
    fn drop(&mut self) {
        if self.operation.is_some() {
            warn!("Async operation dropped without completing");
            self.finish(AsyncStatus::Error, hresult::E_ABORT, None);
        }
    }
}

fn source_of(operation: &InterfaceRef<IAsyncOperation>) -> &AsyncOperationSource {
    // SAFETY: only async_operation creates these handles, on a source object
    unsafe { object::value_of::<AsyncOperationSource>(operation.as_raw().as_ptr()) }
}

unsafe extern "system" fn source_put_completed(this: *mut c_void, handler: *mut c_void) -> HResult {
    let handler = match ptr::NonNull::new(handler) {
        Some(p) => InterfaceRef::<IAsyncCompletedHandler>::from_raw_borrowed(&p),
        None => return hresult::E_INVALIDARG,
    };
    let source = object::value_of::<AsyncOperationSource>(this);
    let status = {
        let mut state = source.state.lock();
        if state.handler.is_some() {
            return hresult::E_ILLEGAL_DELEGATE_ASSIGNMENT;
        }
        if state.closed {
            return hresult::E_ILLEGAL_METHOD_CALL;
        }
        state.handler = Some(handler.clone());
        state.status
    };

    // Late registration on a finished operation fires right away
    if status.is_terminal() {
        let this = match ptr::NonNull::new(this) {
            Some(p) => p,
            None => return hresult::E_POINTER,
        };
        let operation = InterfaceRef::<IAsyncOperation>::from_raw_borrowed(&this);
        if let Err(e) = handler.invoke(&operation, status) {
            warn!("Completion handler for operation {} failed: {}", source.id, e);
        }
    }
    hresult::S_OK
}

unsafe extern "system" fn source_get_completed(this: *mut c_void, handler: *mut *mut c_void) -> HResult {
    if handler.is_null() {
        return hresult::E_POINTER;
    }
    let source = object::value_of::<AsyncOperationSource>(this);
    *handler = source
        .state
        .lock()
        .handler
        .as_ref()
        .map_or(ptr::null_mut(), |h| h.clone().into_raw().as_ptr());
    hresult::S_OK
}

unsafe extern "system" fn source_get_results(this: *mut c_void, results: *mut c_void) -> HResult {
    if results.is_null() {
        return hresult::E_POINTER;
    }
    let source = object::value_of::<AsyncOperationSource>(this);
    let state = source.state.lock();
    match (state.status, &state.results) {
        (AsyncStatus::Completed, Some(write)) if !state.closed => {
            write(results);
            hresult::S_OK
        }
        (AsyncStatus::Error, _) => state.error_code,
        _ => hresult::E_ILLEGAL_METHOD_CALL,
    }
}

unsafe extern "system" fn source_get_id(this: *mut c_void, id: *mut u32) -> HResult {
    if id.is_null() {
        return hresult::E_POINTER;
    }
    *id = object::value_of::<AsyncOperationSource>(this).id;
    hresult::S_OK
}

unsafe extern "system" fn source_get_status(this: *mut c_void, status: *mut i32) -> HResult {
    if status.is_null() {
        return hresult::E_POINTER;
    }
    *status = object::value_of::<AsyncOperationSource>(this).state.lock().status as i32;
    hresult::S_OK
}

unsafe extern "system" fn source_get_error_code(this: *mut c_void, code: *mut HResult) -> HResult {
    if code.is_null() {
        return hresult::E_POINTER;
    }
    *code = object::value_of::<AsyncOperationSource>(this).state.lock().error_code;
    hresult::S_OK
}

unsafe extern "system" fn source_cancel(this: *mut c_void) -> HResult {
    let source = object::value_of::<AsyncOperationSource>(this);
    let mut state = source.state.lock();
    if state.status == AsyncStatus::Started && !state.cancel_requested {
        debug!("Cancellation requested for operation {}", source.id);
        state.cancel_requested = true;
        source.cancel.notify_one();
    }
    hresult::S_OK
}

unsafe extern "system" fn source_close(this: *mut c_void) -> HResult {
    let source = object::value_of::<AsyncOperationSource>(this);
    let (handler, results) = {
        let mut state = source.state.lock();
        if state.status == AsyncStatus::Started {
            return hresult::E_ILLEGAL_METHOD_CALL;
        }
        state.closed = true;
        (state.handler.take(), state.results.take())
    };
    // Released outside the lock
    drop(handler);
    drop(results);
    hresult::S_OK
}
