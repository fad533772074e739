//! In-process simulation of the geolocator runtime class
//!
//! [`register`] hosts `Sample.Geolocation.Geolocator` in this process. A
//! position fix runs on its own native thread, so the projection sees the
//! completion arrive from outside the async runtime exactly as it would
//! from a real location service. Each successful fix is appended to the
//! instance's history and raised through `PositionChanged` before the
//! operation completes.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use xlang::component::{async_operation, iterable, register_class, AsyncCompleter, ClassFactory, EventSource};
use xlang::xlang_pal::hresult;
use xlang::xlang_pal::object::{self, ComClass, InterfaceEntry, INSPECTABLE_BASE};
use xlang::{EventRegistrationToken, HResult, IEventHandler, IInspectable, Interface, InterfaceRef, Result};
use xlang_marshal::DateTime;

use crate::{
    BasicGeoposition, Geoposition, IGeolocator, IGeolocatorVtbl, IGeoposition, IGeopositionVtbl, PositionAccuracy,
    GEOLOCATOR_CLASS,
};

const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Behavior of the simulated location service
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Reported position at high accuracy
    pub position: BasicGeoposition,
    /// Time to a fix
    pub delay: Duration,
    /// Fail every fix with this code instead of completing
    pub failure: Option<HResult>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            position: BasicGeoposition {
                latitude: 47.6062,
                longitude: -122.3321,
                altitude: 56.0,
            },
            delay: Duration::from_millis(100),
            failure: None,
        }
    }
}

/// Host the simulated geolocator under its default class name
pub fn register(config: SimulationConfig) -> Result<()> {
    register_as(GEOLOCATOR_CLASS, config)
}

/// Host the simulated geolocator under `class_name`
pub fn register_as(class_name: &str, config: SimulationConfig) -> Result<()> {
    let config = Arc::new(config);
    info!("Hosting simulated geolocator as {}", class_name);
    register_class(class_name, move || {
        let config = config.clone();
        ClassFactory::new(move || {
            let ptr = object::create_instance(
                SimulatedGeolocator {
                    config: config.clone(),
                    accuracy: AtomicI32::new(PositionAccuracy::Default.code()),
                    position_changed: Arc::new(EventSource::new()),
                    history: Arc::new(Mutex::new(Vec::new())),
                },
                &IInspectable::IID,
            )?;
            // SAFETY: create_instance returned one reference on IInspectable
            Ok(unsafe { InterfaceRef::from_raw(ptr) })
        })
        .into_unknown()
    })
}

struct SimulatedGeolocator {
    config: Arc<SimulationConfig>,
    accuracy: AtomicI32,
    position_changed: Arc<EventSource>,
    history: Arc<Mutex<Vec<Geoposition>>>,
}

/// What a running fix reports back to its geolocator
struct FixTarget {
    sender: Option<InterfaceRef<IInspectable>>,
    position_changed: Arc<EventSource>,
    history: Arc<Mutex<Vec<Geoposition>>>,
}

static GEOLOCATOR_VTBL: IGeolocatorVtbl = IGeolocatorVtbl {
    base: INSPECTABLE_BASE,
    get_desired_accuracy: geolocator_get_desired_accuracy,
    put_desired_accuracy: geolocator_put_desired_accuracy,
    get_geoposition_async: geolocator_get_geoposition_async,
    add_position_changed: geolocator_add_position_changed,
    remove_position_changed: geolocator_remove_position_changed,
    get_recent_positions: geolocator_get_recent_positions,
};

impl ComClass for SimulatedGeolocator {
    const CLASS_NAME: &'static str = "Sample.Geolocation.Geolocator";

    fn interfaces() -> &'static [InterfaceEntry] {
        static ENTRIES: [InterfaceEntry; 1] = [InterfaceEntry::new(IGeolocator::IID, &GEOLOCATOR_VTBL)];
        &ENTRIES
    }
}

unsafe extern "system" fn geolocator_get_desired_accuracy(this: *mut c_void, value: *mut PositionAccuracy) -> HResult {
    if value.is_null() {
        return hresult::E_POINTER;
    }
    let locator = object::value_of::<SimulatedGeolocator>(this);
    *value = PositionAccuracy(locator.accuracy.load(Ordering::SeqCst));
    hresult::S_OK
}

unsafe extern "system" fn geolocator_put_desired_accuracy(this: *mut c_void, value: PositionAccuracy) -> HResult {
    if value.name().is_none() {
        return hresult::E_INVALIDARG;
    }
    let locator = object::value_of::<SimulatedGeolocator>(this);
    locator.accuracy.store(value.code(), Ordering::SeqCst);
    hresult::S_OK
}

unsafe extern "system" fn geolocator_get_geoposition_async(this: *mut c_void, operation: *mut *mut c_void) -> HResult {
    if operation.is_null() {
        return hresult::E_POINTER;
    }
    *operation = ptr::null_mut();

    let locator = object::value_of::<SimulatedGeolocator>(this);
    let (pending, completer) = match async_operation::<Geoposition>() {
        Ok(pair) => pair,
        Err(e) => return e.hresult(),
    };
    let config = locator.config.clone();
    let accuracy = PositionAccuracy(locator.accuracy.load(Ordering::SeqCst));
    let target = FixTarget {
        sender: ptr::NonNull::new(this).map(|p| InterfaceRef::<IInspectable>::from_raw_borrowed(&p)),
        position_changed: locator.position_changed.clone(),
        history: locator.history.clone(),
    };

    let spawned = thread::Builder::new()
        .name("geolocator-fix".into())
        .spawn(move || run_fix(&config, accuracy, &target, completer));
    if let Err(e) = spawned {
        warn!("Failed to start position fix: {}", e);
        return hresult::E_FAIL;
    }

    *operation = pending.into_raw().as_ptr();
    hresult::S_OK
}

unsafe extern "system" fn geolocator_add_position_changed(
    this: *mut c_void,
    handler: *mut c_void,
    token: *mut EventRegistrationToken,
) -> HResult {
    if token.is_null() {
        return hresult::E_POINTER;
    }
    let handler = match ptr::NonNull::new(handler) {
        Some(p) => InterfaceRef::<IEventHandler>::from_raw_borrowed(&p),
        None => return hresult::E_INVALIDARG,
    };
    let locator = object::value_of::<SimulatedGeolocator>(this);
    *token = locator.position_changed.add(handler);
    hresult::S_OK
}

unsafe extern "system" fn geolocator_remove_position_changed(this: *mut c_void, token: EventRegistrationToken) -> HResult {
    // Unknown tokens are ignored
    object::value_of::<SimulatedGeolocator>(this).position_changed.remove(token);
    hresult::S_OK
}

unsafe extern "system" fn geolocator_get_recent_positions(this: *mut c_void, positions: *mut *mut c_void) -> HResult {
    if positions.is_null() {
        return hresult::E_POINTER;
    }
    let locator = object::value_of::<SimulatedGeolocator>(this);
    let snapshot = locator.history.lock().clone();
    match iterable(snapshot) {
        Ok(sequence) => {
            *positions = sequence.into_raw().as_ptr();
            hresult::S_OK
        }
        Err(e) => e.hresult(),
    }
}

fn run_fix(
    config: &SimulationConfig,
    accuracy: PositionAccuracy,
    target: &FixTarget,
    completer: AsyncCompleter<Geoposition>,
) {
    let deadline = Instant::now() + config.delay;
    while Instant::now() < deadline {
        if completer.is_cancel_requested() {
            debug!("Position fix canceled");
            completer.canceled();
            return;
        }
        thread::sleep(CANCEL_POLL.min(deadline.saturating_duration_since(Instant::now())));
    }

    if let Some(code) = config.failure {
        debug!("Position fix failed with {}", code);
        completer.fail(code);
        return;
    }

    let coordinate = match accuracy {
        PositionAccuracy::High => config.position.clone(),
        _ => coarse(&config.position),
    };
    let position = match position_object(coordinate) {
        Ok(position) => position,
        Err(e) => return completer.fail(e.hresult()),
    };
    target.history.lock().push(position.clone());
    match position.as_interface().cast::<IInspectable>() {
        Ok(args) => {
            // Handler failures are logged by the event source
            let _ = target.position_changed.invoke(target.sender.as_ref(), Some(&args));
        }
        Err(e) => warn!("Position fix is not inspectable: {}", e),
    }
    completer.complete(position);
}

/// Default accuracy reports roughly a kilometer grid
fn coarse(position: &BasicGeoposition) -> BasicGeoposition {
    let round = |v: f64| (v * 100.0).round() / 100.0;
    BasicGeoposition {
        latitude: round(position.latitude),
        longitude: round(position.longitude),
        altitude: position.altitude.round(),
    }
}

struct PositionFix {
    coordinate: BasicGeoposition,
    timestamp: DateTime,
}

static GEOPOSITION_VTBL: IGeopositionVtbl = IGeopositionVtbl {
    base: INSPECTABLE_BASE,
    get_coordinate: geoposition_get_coordinate,
    get_timestamp: geoposition_get_timestamp,
};

impl ComClass for PositionFix {
    const CLASS_NAME: &'static str = "Sample.Geolocation.Geoposition";

    fn interfaces() -> &'static [InterfaceEntry] {
        static ENTRIES: [InterfaceEntry; 1] = [InterfaceEntry::new(IGeoposition::IID, &GEOPOSITION_VTBL)];
        &ENTRIES
    }
}

fn position_object(coordinate: BasicGeoposition) -> Result<Geoposition> {
    let ptr = object::create_instance(
        PositionFix {
            coordinate,
            timestamp: DateTime::now(),
        },
        &IGeoposition::IID,
    )?;
    // SAFETY: create_instance returned one reference on IGeoposition
    Ok(Geoposition::from_interface(unsafe { InterfaceRef::from_raw(ptr) }))
}

unsafe extern "system" fn geoposition_get_coordinate(this: *mut c_void, value: *mut BasicGeoposition) -> HResult {
    if value.is_null() {
        return hresult::E_POINTER;
    }
    ptr::write(value, object::value_of::<PositionFix>(this).coordinate.clone());
    hresult::S_OK
}

unsafe extern "system" fn geoposition_get_timestamp(this: *mut c_void, value: *mut DateTime) -> HResult {
    if value.is_null() {
        return hresult::E_POINTER;
    }
    ptr::write(value, object::value_of::<PositionFix>(this).timestamp.clone());
    hresult::S_OK
}
