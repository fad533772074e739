//! Projection error types

use thiserror::Error;
use xlang_marshal::MarshalError;
use xlang_pal::{hresult, HResult, PalError};

/// Result type for projection operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a class could not be activated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationFailure {
    /// No registered module provides the class
    #[error("class not found")]
    ClassNotFound,

    /// The factory does not implement the requested interface
    #[error("factory does not implement the requested interface")]
    FactoryUnsupported,

    /// The factory refuses default activation
    #[error("class is not activatable")]
    NotActivatable,

    /// Any other native failure
    #[error("native failure {0}")]
    Failed(HResult),
}

/// Projection errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Native platform error
    #[error(transparent)]
    Pal(#[from] PalError),

    /// Value conversion error
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// Interface navigation found no such capability
    #[error("interface {interface} not supported")]
    NotSupported { interface: String },

    /// Class activation failed
    #[error("activation of {class} failed: {reason}")]
    Activation {
        class: String,
        reason: ActivationFailure,
    },

    /// Apartment lifecycle violation
    #[error("apartment error: {0}")]
    Apartment(String),

    /// Async operation ended in the error state
    #[error("async operation failed ({code}): {message}")]
    OperationFailed { code: HResult, message: String },

    /// Async operation was canceled
    #[error("async operation canceled")]
    OperationCanceled,

    /// Async operation reported a status outside the known set
    #[error("unexpected async status {0}")]
    UnexpectedStatus(i32),

    /// Native call failed
    #[error("native call failed: {0}")]
    Native(HResult),
}

impl Error {
    pub(crate) fn activation(class: &str, reason: ActivationFailure) -> Self {
        Error::Activation {
            class: class.to_string(),
            reason,
        }
    }

    /// The native code that best represents this error
    pub fn hresult(&self) -> HResult {
        match self {
            Error::Pal(e) => e.hresult(),
            Error::Marshal(_) => hresult::E_INVALIDARG,
            Error::NotSupported { .. } => hresult::E_NOINTERFACE,
            Error::Activation { reason, .. } => match reason {
                ActivationFailure::ClassNotFound => hresult::CLASS_E_CLASSNOTAVAILABLE,
                ActivationFailure::FactoryUnsupported => hresult::E_NOINTERFACE,
                ActivationFailure::NotActivatable => hresult::E_NOTIMPL,
                ActivationFailure::Failed(code) => *code,
            },
            Error::Apartment(_) => hresult::E_ILLEGAL_METHOD_CALL,
            Error::OperationFailed { code, .. } => *code,
            Error::OperationCanceled => hresult::ERROR_CANCELLED,
            Error::UnexpectedStatus(_) => hresult::E_FAIL,
            Error::Native(code) => *code,
        }
    }
}

impl From<HResult> for Error {
    fn from(code: HResult) -> Self {
        Error::Native(code)
    }
}
