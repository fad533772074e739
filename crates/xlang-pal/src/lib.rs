//! Native platform abstraction layer
//!
//! This crate is the native surface the projection core runs against: the
//! pieces of a reference-counted, vtable-based component model that sit
//! below any language projection.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Projection core (xlang crate)               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Identifiers     │  Strings         │  Result codes          │
//! │  - Guid codec    │  - HString       │  - HResult             │
//! │                  │  - raw handles   │  - PalError            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  IUnknown /      │  Activation      │  Apartment             │
//! │  IInspectable    │  - module table  │  - STA / MTA           │
//! │  - native objects│  - namespace walk│  - init / uninit       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use xlang_pal::{Guid, HString};
//!
//! let iid: Guid = "{00000000-0000-0000-C000-000000000046}".parse().unwrap();
//! assert_eq!(iid, xlang_pal::unknown::IID_IUNKNOWN);
//!
//! let name = HString::new("Sample.Geolocation.Geolocator").unwrap();
//! assert_eq!(name.len(), 29);
//! ```
//!
//! # Modules
//!
//! - [`guid`]: 128-bit identifier codec
//! - [`string`]: native string handles
//! - [`unknown`]: base interface ABI (`IUnknown`, `IInspectable`)
//! - [`object`]: in-process native objects
//! - [`activation`]: module table and factory resolution
//! - [`apartment`]: process apartment state

pub mod activation;
pub mod apartment;
pub mod error;
pub mod guid;
pub mod object;
pub mod string;
pub mod unknown;

pub use activation::{get_activation_factory, register_module, unregister_module, LibGetActivationFactory};
pub use apartment::ApartmentType;
pub use error::{hresult, HResult, PalError, Result};
pub use guid::Guid;
pub use object::{ComClass, InterfaceEntry};
pub use string::{HString, RawString};
