use gtagcart_core::{PriceError, SinkError};
use thiserror::Error;

/// Why a formatter could not shape its input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
    #[error(transparent)]
    Price(#[from] PriceError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("event `{0}` is not supported")]
    NotSupported(String),
    #[error("formatter for `{0}` is already registered")]
    DuplicateFormatter(String),
    #[error("reporting sink is unavailable")]
    SinkUnavailable,
    #[error("formatting `{event}` failed: {source}")]
    Format {
        event: String,
        #[source]
        source: FormatError,
    },
    #[error("sink rejected `{event}`: {source}")]
    Sink {
        event: String,
        #[source]
        source: SinkError,
    },
}

pub type Result<T> = std::result::Result<T, DispatchError>;
