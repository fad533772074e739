//! Async operation bridge
//!
//! A native async operation reports completion by invoking a delegate
//! registered through `put_Completed`. [`AsyncOperation`] registers one
//! delegate whose only job is to send the reported status through a
//! `tokio::sync::oneshot` channel; the awaiting task receives it and
//! fetches the outcome itself:
//!
//! ```text
//!   native thread                         awaiting task
//!   ─────────────                         ─────────────
//!   Invoke(op, status) ──► oneshot ──►    status
//!                                           ├─ Completed → GetResults → T
//!                                           ├─ Canceled  → OperationCanceled
//!                                           ├─ Error     → ErrorCode → OperationFailed
//!                                           └─ other     → UnexpectedStatus
//! ```
//!
//! The first signal is authoritative and the outcome is cached, so awaiting
//! again returns the same result. Later signals are logged and ignored.
//! Dropping a pending `get()` (a timeout, a losing `select!` branch) leaves
//! the receiver in place for the next await.

use std::ffi::c_void;
use std::fmt;
use std::future::IntoFuture;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{oneshot, OnceCell};
use tracing::{debug, trace, warn};
use xlang_pal::object::{self, ComClass, InterfaceEntry, UNKNOWN_BASE};
use xlang_pal::unknown::{IInspectableVtbl, IUnknownVtbl};
use xlang_pal::{hresult, Guid, HResult};

use crate::abi::AbiType;
use crate::error::{Error, Result};
use crate::interface::{Interface, InterfaceRef};

/// State of an async operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AsyncStatus {
    Started = 0,
    Completed = 1,
    Canceled = 2,
    Error = 3,
}

impl AsyncStatus {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(AsyncStatus::Started),
            1 => Some(AsyncStatus::Completed),
            2 => Some(AsyncStatus::Canceled),
            3 => Some(AsyncStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != AsyncStatus::Started
    }
}

impl fmt::Display for AsyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Status and control of any async operation
pub struct IAsyncInfo;

#[repr(C)]
pub struct IAsyncInfoVtbl {
    pub base: IInspectableVtbl,
    pub get_id: unsafe extern "system" fn(this: *mut c_void, id: *mut u32) -> HResult,
    pub get_status: unsafe extern "system" fn(this: *mut c_void, status: *mut i32) -> HResult,
    pub get_error_code: unsafe extern "system" fn(this: *mut c_void, code: *mut HResult) -> HResult,
    pub cancel: unsafe extern "system" fn(this: *mut c_void) -> HResult,
    pub close: unsafe extern "system" fn(this: *mut c_void) -> HResult,
}

unsafe impl Interface for IAsyncInfo {
    const IID: Guid = Guid::from_u128(0x00000036_0000_0000_C000_000000000046);
    const NAME: &'static str = "IAsyncInfo";
    type Vtable = IAsyncInfoVtbl;
}

/// An async operation producing one result
///
/// `GetResults` writes the result's ABI value through an untyped out
/// pointer; the caller knows the result type.
pub struct IAsyncOperation;

#[repr(C)]
pub struct IAsyncOperationVtbl {
    pub base: IInspectableVtbl,
    pub put_completed: unsafe extern "system" fn(this: *mut c_void, handler: *mut c_void) -> HResult,
    pub get_completed: unsafe extern "system" fn(this: *mut c_void, handler: *mut *mut c_void) -> HResult,
    pub get_results: unsafe extern "system" fn(this: *mut c_void, results: *mut c_void) -> HResult,
}

unsafe impl Interface for IAsyncOperation {
    const IID: Guid = Guid::from_u128(0x9FC2B0BB_E446_44E2_AA61_9CAB8F636AF2);
    const NAME: &'static str = "IAsyncOperation";
    type Vtable = IAsyncOperationVtbl;
}

/// Completion delegate
pub struct IAsyncCompletedHandler;

#[repr(C)]
pub struct IAsyncCompletedHandlerVtbl {
    pub base: IUnknownVtbl,
    pub invoke: unsafe extern "system" fn(this: *mut c_void, operation: *mut c_void, status: i32) -> HResult,
}

unsafe impl Interface for IAsyncCompletedHandler {
    const IID: Guid = Guid::from_u128(0xFCDCF02C_E5D8_4478_915A_4D90B74B83A5);
    const NAME: &'static str = "IAsyncCompletedHandler";
    type Vtable = IAsyncCompletedHandlerVtbl;
}

impl InterfaceRef<IAsyncInfo> {
    pub fn id(&self) -> Result<u32> {
        let mut id = 0;
        // SAFETY: self is live and id is a valid out slot
        unsafe { (self.vtable().get_id)(self.as_raw().as_ptr(), &mut id) }.ok()?;
        Ok(id)
    }

    pub fn status(&self) -> Result<AsyncStatus> {
        let mut code = 0;
        // SAFETY: as above
        unsafe { (self.vtable().get_status)(self.as_raw().as_ptr(), &mut code) }.ok()?;
        AsyncStatus::from_code(code).ok_or(Error::UnexpectedStatus(code))
    }

    pub fn error_code(&self) -> Result<HResult> {
        let mut code = hresult::S_OK;
        // SAFETY: as above
        unsafe { (self.vtable().get_error_code)(self.as_raw().as_ptr(), &mut code) }.ok()?;
        Ok(code)
    }

    pub fn cancel(&self) -> Result<()> {
        // SAFETY: self is live
        unsafe { (self.vtable().cancel)(self.as_raw().as_ptr()) }.ok()?;
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        // SAFETY: self is live
        unsafe { (self.vtable().close)(self.as_raw().as_ptr()) }.ok()?;
        Ok(())
    }
}

impl InterfaceRef<IAsyncOperation> {
    /// Register the completion delegate
    pub fn set_completed(&self, handler: &InterfaceRef<IAsyncCompletedHandler>) -> Result<()> {
        // SAFETY: both pointers are live; the callee adds its own reference
        let hr = unsafe { (self.vtable().put_completed)(self.as_raw().as_ptr(), handler.as_raw().as_ptr()) };
        if hr.is_err() {
            return Err(Error::Native(hr));
        }
        Ok(())
    }

    /// The registered completion delegate, if any
    pub fn completed(&self) -> Result<Option<InterfaceRef<IAsyncCompletedHandler>>> {
        let mut handler = std::ptr::null_mut();
        // SAFETY: self is live and handler is a valid out slot
        unsafe { (self.vtable().get_completed)(self.as_raw().as_ptr(), &mut handler) }.ok()?;
        // SAFETY: the callee transferred one reference (or returned null)
        unsafe { Option::<InterfaceRef<IAsyncCompletedHandler>>::from_abi(handler) }
    }

    /// Fetch the result of a completed operation
    pub fn results<T: AbiType>(&self) -> Result<T> {
        let mut abi = T::abi_default();
        // SAFETY: abi matches the operation's result type by contract
        let hr = unsafe {
            (self.vtable().get_results)(self.as_raw().as_ptr(), &mut abi as *mut T::Abi as *mut c_void)
        };
        if hr.is_err() {
            return Err(Error::Native(hr));
        }
        // SAFETY: success transfers ownership of the written value
        unsafe { T::from_abi(abi) }
    }
}

impl InterfaceRef<IAsyncCompletedHandler> {
    /// Deliver a completion signal
    pub fn invoke(&self, operation: &InterfaceRef<IAsyncOperation>, status: AsyncStatus) -> Result<()> {
        // SAFETY: both pointers are live
        let hr = unsafe {
            (self.vtable().invoke)(self.as_raw().as_ptr(), operation.as_raw().as_ptr(), status as i32)
        };
        if hr.is_err() {
            return Err(Error::Native(hr));
        }
        Ok(())
    }
}

/// Native delegate forwarding the first status to the awaiting side
struct CompletionSignal {
    sender: Mutex<Option<oneshot::Sender<i32>>>,
}

static SIGNAL_VTBL: IAsyncCompletedHandlerVtbl = IAsyncCompletedHandlerVtbl {
    base: UNKNOWN_BASE,
    invoke: signal_invoke,
};

impl ComClass for CompletionSignal {
    const CLASS_NAME: &'static str = "xlang.AsyncCompletionSignal";

    fn interfaces() -> &'static [InterfaceEntry] {
        static ENTRIES: [InterfaceEntry; 1] = [InterfaceEntry::new(IAsyncCompletedHandler::IID, &SIGNAL_VTBL)];
        &ENTRIES
    }
}

unsafe extern "system" fn signal_invoke(this: *mut c_void, _operation: *mut c_void, status: i32) -> HResult {
    let signal = object::value_of::<CompletionSignal>(this);
    match signal.sender.lock().take() {
        Some(sender) => {
            trace!("Completion signal received, status {}", status);
            if sender.send(status).is_err() {
                debug!("Completion signal arrived after the awaiting side went away");
            }
        }
        None => warn!("Ignoring duplicate completion signal (status {})", status),
    }
    hresult::S_OK
}

/// A native async operation projected as an awaitable value
pub struct AsyncOperation<T: AbiType> {
    operation: InterfaceRef<IAsyncOperation>,
    info: InterfaceRef<IAsyncInfo>,
    receiver: tokio::sync::Mutex<oneshot::Receiver<i32>>,
    outcome: OnceCell<Result<T>>,
}

impl<T: AbiType + Clone> AsyncOperation<T> {
    /// Wrap an operation and register its completion delegate
    pub fn new(operation: InterfaceRef<IAsyncOperation>) -> Result<Self> {
        let info = operation.cast::<IAsyncInfo>()?;
        let (sender, receiver) = oneshot::channel();
        let signal = CompletionSignal {
            sender: Mutex::new(Some(sender)),
        };
        // SAFETY: create_instance returns one reference on the handler interface
        let handler: InterfaceRef<IAsyncCompletedHandler> =
            unsafe { InterfaceRef::from_raw(object::create_instance(signal, &IAsyncCompletedHandler::IID)?) };

        if let Err(e) = operation.set_completed(&handler) {
            warn!("Failed to register completion handler: {}", e);
            return Err(e);
        }
        trace!("Completion handler registered");

        Ok(Self {
            operation,
            info,
            receiver: tokio::sync::Mutex::new(receiver),
            outcome: OnceCell::new(),
        })
    }

    /// Wait for the operation and return its outcome
    ///
    /// Resolves once; every later call returns the cached outcome.
    pub async fn get(&self) -> Result<T> {
        self.outcome.get_or_init(|| self.resolve()).await.clone()
    }

    /// Request cancellation; the operation still reports its own outcome
    pub fn cancel(&self) -> Result<()> {
        debug!("Requesting cancellation");
        self.info.cancel()
    }

    pub fn status(&self) -> Result<AsyncStatus> {
        self.info.status()
    }

    pub fn id(&self) -> Result<u32> {
        self.info.id()
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.initialized()
    }

    /// The underlying operation
    pub fn operation(&self) -> &InterfaceRef<IAsyncOperation> {
        &self.operation
    }

    async fn resolve(&self) -> Result<T> {
        // Polled through the guard; nothing awaits after the status arrives,
        // so a received status always reaches the cache
        let mut receiver = self.receiver.lock().await;
        let status = (&mut *receiver).await.map_err(|_| Error::OperationFailed {
            code: hresult::E_ABORT,
            message: "completion handler released without a signal".to_string(),
        })?;
        drop(receiver);

        match AsyncStatus::from_code(status) {
            Some(AsyncStatus::Completed) => self.operation.results::<T>(),
            Some(AsyncStatus::Canceled) => Err(Error::OperationCanceled),
            Some(AsyncStatus::Error) => {
                let code = self.info.error_code()?;
                Err(Error::OperationFailed {
                    code,
                    message: format!("async operation failed with {}", code),
                })
            }
            _ => Err(Error::UnexpectedStatus(status)),
        }
    }
}

impl<T> IntoFuture for AsyncOperation<T>
where
    T: AbiType + Clone + Send + Sync + 'static,
{
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        async move { self.get().await }.boxed()
    }
}

impl<T: AbiType> fmt::Debug for AsyncOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOperation")
            .field("operation", &self.operation)
            .field("resolved", &self.outcome.initialized())
            .finish()
    }
}
