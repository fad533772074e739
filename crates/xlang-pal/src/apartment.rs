//! Process apartment state
//!
//! The apartment is process-wide and reference counted. The first
//! [`init`] fixes the threading mode; later calls in the same mode only
//! bump the count and report `S_FALSE`, calls in another mode fail with
//! [`PalError::ChangedMode`]. Each successful [`init`] is balanced by one
//! [`uninit`].

use parking_lot::{const_mutex, Mutex};
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{hresult, HResult, PalError, Result};

/// Threading mode of the apartment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ApartmentType {
    SingleThreaded = 0,
    #[default]
    MultiThreaded = 1,
}

impl fmt::Display for ApartmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApartmentType::SingleThreaded => write!(f, "STA"),
            ApartmentType::MultiThreaded => write!(f, "MTA"),
        }
    }
}

struct State {
    kind: Option<ApartmentType>,
    count: u32,
}

static STATE: Mutex<State> = const_mutex(State {
    kind: None,
    count: 0,
});

/// Initialize the apartment
///
/// Returns `S_OK` for the first initialization and `S_FALSE` when the
/// apartment was already initialized in the same mode.
pub fn init(kind: ApartmentType) -> Result<HResult> {
    let mut state = STATE.lock();
    match state.kind {
        None => {
            state.kind = Some(kind);
            state.count = 1;
            info!("Apartment initialized ({})", kind);
            Ok(hresult::S_OK)
        }
        Some(current) if current == kind => {
            state.count += 1;
            debug!("Apartment already initialized ({}), count {}", kind, state.count);
            Ok(hresult::S_FALSE)
        }
        Some(current) => {
            warn!("Apartment is {} but {} was requested", current, kind);
            Err(PalError::ChangedMode)
        }
    }
}

/// Balance one successful [`init`]
pub fn uninit() {
    let mut state = STATE.lock();
    match state.count {
        0 => warn!("Apartment uninit without matching init"),
        1 => {
            state.count = 0;
            if let Some(kind) = state.kind.take() {
                info!("Apartment uninitialized ({})", kind);
            }
        }
        _ => {
            state.count -= 1;
            debug!("Apartment count now {}", state.count);
        }
    }
}

/// Current mode, if initialized
pub fn current() -> Option<ApartmentType> {
    STATE.lock().kind
}
