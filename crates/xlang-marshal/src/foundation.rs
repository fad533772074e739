//! Foundation value types carried by boxed values
//!
//! `DateTime` counts 100-nanosecond ticks since 1601-01-01 UTC and
//! `TimeSpan` counts 100-nanosecond ticks; both convert to and from the
//! standard library's time types.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::native_struct;

/// Ticks per second
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks between 1601-01-01 and 1970-01-01
pub const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;

const NANOS_PER_TICK: u128 = 100;

native_struct! {
    /// Point in 2D space
    pub struct Point("Windows.Foundation.Point") {
        pub x: f32 => "X",
        pub y: f32 => "Y",
    }
}

native_struct! {
    /// Width and height
    pub struct Size("Windows.Foundation.Size") {
        pub width: f32 => "Width",
        pub height: f32 => "Height",
    }
}

native_struct! {
    /// Axis-aligned rectangle
    pub struct Rect("Windows.Foundation.Rect") {
        pub x: f32 => "X",
        pub y: f32 => "Y",
        pub width: f32 => "Width",
        pub height: f32 => "Height",
    }
}

native_struct! {
    /// Instant in time
    pub struct DateTime("Windows.Foundation.DateTime") {
        pub universal_time: i64 => "UniversalTime",
    }
}

native_struct! {
    /// Length of time
    pub struct TimeSpan("Windows.Foundation.TimeSpan") {
        pub duration: i64 => "Duration",
    }
}

fn duration_to_ticks(d: Duration) -> i64 {
    i64::try_from(d.as_nanos() / NANOS_PER_TICK).unwrap_or(i64::MAX)
}

fn ticks_to_duration(ticks: u64) -> Duration {
    let secs = ticks / TICKS_PER_SECOND as u64;
    let sub = (ticks % TICKS_PER_SECOND as u64) as u32 * NANOS_PER_TICK as u32;
    Duration::new(secs, sub)
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl DateTime {
    pub fn from_ticks(universal_time: i64) -> Self {
        Self { universal_time }
    }

    /// Convert from a system time, saturating outside the representable range
    pub fn from_system_time(time: SystemTime) -> Self {
        let universal_time = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => UNIX_EPOCH_TICKS.saturating_add(duration_to_ticks(after)),
            Err(before) => UNIX_EPOCH_TICKS.saturating_sub(duration_to_ticks(before.duration())),
        };
        Self { universal_time }
    }

    /// Convert to a system time, `None` if the platform cannot represent it
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let offset = self.universal_time.checked_sub(UNIX_EPOCH_TICKS)?;
        if offset >= 0 {
            UNIX_EPOCH.checked_add(ticks_to_duration(offset.unsigned_abs()))
        } else {
            UNIX_EPOCH.checked_sub(ticks_to_duration(offset.unsigned_abs()))
        }
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }
}

impl From<SystemTime> for DateTime {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl TimeSpan {
    pub fn from_ticks(duration: i64) -> Self {
        Self { duration }
    }

    /// Convert from a duration, saturating at the largest span
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            duration: duration_to_ticks(duration),
        }
    }

    /// Convert to a duration, `None` for negative spans
    pub fn to_duration(&self) -> Option<Duration> {
        u64::try_from(self.duration).ok().map(ticks_to_duration)
    }
}

impl From<Duration> for TimeSpan {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}
