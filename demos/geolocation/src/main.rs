//! Geolocation Client
//!
//! Hosts the simulated geolocator, activates it through an apartment and
//! awaits one position fix while listening for `PositionChanged`.
//!
//! Run with: cargo run --bin geolocate -- --accuracy high --delay-ms 250

use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use geolocation_demo::simulator::{self, SimulationConfig};
use geolocation_demo::{BasicGeoposition, Geolocator, PositionAccuracy};
use xlang::xlang_pal::hresult;
use xlang::{Apartment, ApartmentConfig, ApartmentType, Error};
use xlang_marshal::{NativeStruct, PropertyValue};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Accuracy {
    Default,
    High,
}

#[derive(Parser)]
#[command(name = "geolocate")]
#[command(about = "Await a position fix from the simulated geolocator")]
struct Args {
    /// Requested accuracy
    #[arg(short, long, value_enum, default_value = "default")]
    accuracy: Accuracy,

    /// Simulated latitude in degrees
    #[arg(long, default_value = "47.6062", allow_hyphen_values = true)]
    latitude: f64,

    /// Simulated longitude in degrees
    #[arg(long, default_value = "-122.3321", allow_hyphen_values = true)]
    longitude: f64,

    /// Time to a fix in milliseconds
    #[arg(short, long, default_value = "100")]
    delay_ms: u64,

    /// Cancel the fix right after starting it
    #[arg(long)]
    cancel: bool,

    /// Make the location service deny access
    #[arg(long)]
    fail: bool,

    /// Use a single-threaded apartment
    #[arg(long)]
    sta: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder().with_max_level(args.log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    simulator::register(SimulationConfig {
        position: BasicGeoposition {
            latitude: args.latitude,
            longitude: args.longitude,
            ..SimulationConfig::default().position
        },
        delay: Duration::from_millis(args.delay_ms),
        failure: args.fail.then_some(hresult::E_ACCESSDENIED),
    })?;

    let apartment = Apartment::init(ApartmentConfig {
        apartment_type: if args.sta {
            ApartmentType::SingleThreaded
        } else {
            ApartmentType::MultiThreaded
        },
        ..ApartmentConfig::default()
    })?;

    let locator = Geolocator::new(&apartment)?;
    info!(
        "Activated {}",
        locator.as_interface().runtime_class_name()?.to_string()
    );
    locator.set_desired_accuracy(match args.accuracy {
        Accuracy::Default => PositionAccuracy::Default,
        Accuracy::High => PositionAccuracy::High,
    })?;

    let token = locator.on_position_changed(|position| match position.coordinate() {
        Ok(c) => info!("PositionChanged: {:.4}, {:.4}", c.latitude, c.longitude),
        Err(e) => error!("PositionChanged without a coordinate: {}", e),
    })?;

    let pending = locator.geoposition_async()?;
    info!("Started position fix {}", pending.id()?);
    if args.cancel {
        pending.cancel()?;
    }

    match pending.get().await {
        Ok(position) => {
            let coordinate = position.coordinate()?;
            info!(
                "Position: {:.4}, {:.4} at {:.0} m",
                coordinate.latitude, coordinate.longitude, coordinate.altitude
            );
            info!("Native layout: {} bytes", coordinate.to_native().len());

            let timestamp = PropertyValue::from(position.timestamp()?);
            info!("Timestamp: {:?}", timestamp.get_date_time()?.to_system_time());
        }
        Err(Error::OperationCanceled) => info!("Position fix canceled"),
        Err(e) => error!("Position fix failed: {} ({})", e, e.hresult()),
    }

    locator.remove_position_changed(token)?;
    info!("Fixes recorded: {}", locator.recent_positions()?.count());

    apartment.uninit();
    Ok(())
}
