//! Projection core for the xlang component ABI
//!
//! This crate is the host-facing side of the component model: it owns
//! native references, activates classes, and turns native async
//! operations into Rust futures. Value conversion lives in
//! [`xlang_marshal`], the native surface in [`xlang_pal`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Host application                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Apartment       │  Activation      │  Async bridge          │
//! │  - init/uninit   │  - registry      │  - AsyncOperation<T>   │
//! │  - config        │  - factory cache │  - completion signal   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  InterfaceRef<I> (AddRef/Release, QueryInterface)  │ AbiType │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Components: hosted classes, factories, async sources       │
//! ├─────────────────────────────────────────────────────────────┤
//! │              xlang-pal        │        xlang-marshal        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use xlang::component::{register_class, ClassFactory};
//! use xlang::{ActivationFailure, Apartment, Error, IInspectable};
//!
//! register_class("Doc.Helpers.Statics", || ClassFactory::non_activatable().into_unknown()).unwrap();
//!
//! let apartment = Apartment::multi_threaded().unwrap();
//! let err = apartment.activate::<IInspectable>("Doc.Helpers.Statics").unwrap_err();
//! assert!(matches!(
//!     err,
//!     Error::Activation { reason: ActivationFailure::NotActivatable, .. }
//! ));
//! apartment.uninit();
//! ```
//!
//! # Modules
//!
//! - [`interface`]: owning interface handles
//! - [`abi`]: host types crossing the ABI
//! - [`activation`]: activation registry and factory interface
//! - [`apartment`]: apartment lifecycle
//! - [`async_op`]: async operations as futures
//! - [`collections`]: native iterables as Rust iterators
//! - [`event`]: event handler delegates and registration tokens
//! - [`component`]: classes, async operations, delegates and iterables
//!   implemented in Rust

pub mod abi;
pub mod activation;
pub mod apartment;
pub mod async_op;
pub mod collections;
pub mod component;
mod error;
pub mod event;
pub mod interface;

pub use abi::AbiType;
pub use activation::{ActivationRegistry, IActivationFactory};
pub use apartment::{Apartment, ApartmentConfig};
pub use async_op::{AsyncOperation, AsyncStatus, IAsyncInfo, IAsyncOperation};
pub use collections::{IIterable, IIterator};
pub use error::{ActivationFailure, Error, Result};
pub use event::{EventRegistrationToken, IEventHandler};
pub use interface::{IInspectable, IUnknown, Interface, InterfaceRef};

pub use xlang_marshal;
pub use xlang_pal;
pub use xlang_pal::{ApartmentType, Guid, HResult, HString};
