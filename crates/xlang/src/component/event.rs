//! Rust closures as event handlers, and the handler table behind an event

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use xlang_pal::object::{self, ComClass, InterfaceEntry, UNKNOWN_BASE};
use xlang_pal::{hresult, HResult};

use crate::error::Result;
use crate::event::{EventRegistrationToken, IEventHandler, IEventHandlerVtbl};
use crate::interface::{IInspectable, Interface, InterfaceRef};

type Handler = Box<dyn Fn(Option<InterfaceRef<IInspectable>>, Option<InterfaceRef<IInspectable>>) -> Result<()> + Send + Sync>;

struct ClosureDelegate {
    handler: Handler,
}

static DELEGATE_VTBL: IEventHandlerVtbl = IEventHandlerVtbl {
    base: UNKNOWN_BASE,
    invoke: delegate_invoke,
};

impl ComClass for ClosureDelegate {
    const CLASS_NAME: &'static str = "xlang.Delegate";

    fn interfaces() -> &'static [InterfaceEntry] {
        static ENTRIES: [InterfaceEntry; 1] = [InterfaceEntry::new(IEventHandler::IID, &DELEGATE_VTBL)];
        &ENTRIES
    }
}

unsafe extern "system" fn delegate_invoke(this: *mut c_void, sender: *mut c_void, args: *mut c_void) -> HResult {
    let delegate = object::value_of::<ClosureDelegate>(this);
    let sender = NonNull::new(sender).map(|p| InterfaceRef::<IInspectable>::from_raw_borrowed(&p));
    let args = NonNull::new(args).map(|p| InterfaceRef::<IInspectable>::from_raw_borrowed(&p));
    match (delegate.handler)(sender, args) {
        Ok(()) => hresult::S_OK,
        Err(e) => {
            debug!("Delegate returned an error: {}", e);
            e.hresult()
        }
    }
}

/// Wrap a closure as a native event handler
///
/// The closure receives its own references on the sender and argument
/// objects; an `Err` is reported to the caller as its native code.
pub fn delegate<F>(handler: F) -> Result<InterfaceRef<IEventHandler>>
where
    F: Fn(Option<InterfaceRef<IInspectable>>, Option<InterfaceRef<IInspectable>>) -> Result<()>
        + Send
        + Sync
        + 'static,
{
    let delegate = ClosureDelegate {
        handler: Box::new(handler),
    };
    let ptr = object::create_instance(delegate, &IEventHandler::IID)?;
    // SAFETY: create_instance returned one reference on IEventHandler
    Ok(unsafe { InterfaceRef::from_raw(ptr) })
}

/// Registered handlers for one event
///
/// Components keep one of these per event and forward their
/// `add_X`/`remove_X` slots to [`add`](Self::add) and
/// [`remove`](Self::remove). Tokens start at 1 and are never reused.
pub struct EventSource {
    handlers: RwLock<Vec<(EventRegistrationToken, InterfaceRef<IEventHandler>)>>,
    next_token: AtomicI64,
}

impl EventSource {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_token: AtomicI64::new(1),
        }
    }

    /// Register a handler
    pub fn add(&self, handler: InterfaceRef<IEventHandler>) -> EventRegistrationToken {
        let token = EventRegistrationToken {
            value: self.next_token.fetch_add(1, Ordering::Relaxed),
        };
        self.handlers.write().push((token, handler));
        trace!("Event handler {} added", token);
        token
    }

    /// Unregister; false when the token is unknown or already removed
    pub fn remove(&self, token: EventRegistrationToken) -> bool {
        let removed = {
            let mut handlers = self.handlers.write();
            handlers
                .iter()
                .position(|(t, _)| *t == token)
                .map(|index| handlers.remove(index))
        };
        match removed {
            Some(_) => {
                trace!("Event handler {} removed", token);
                true
            }
            None => {
                debug!("No event handler registered under {}", token);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Call every handler registered at the time of the call
    ///
    /// Handlers run outside the table lock, so they may add or remove
    /// registrations. A failing handler does not stop the others; the first
    /// failure is returned.
    pub fn invoke(
        &self,
        sender: Option<&InterfaceRef<IInspectable>>,
        args: Option<&InterfaceRef<IInspectable>>,
    ) -> Result<()> {
        let snapshot: Vec<_> = self.handlers.read().clone();
        let mut first_error = None;
        for (token, handler) in snapshot {
            if let Err(e) = handler.invoke(sender, args) {
                warn!("Event handler {} failed: {}", token, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for EventSource {
    fn default() -> Self {
        Self::new()
    }
}
