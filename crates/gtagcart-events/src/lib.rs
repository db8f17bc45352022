#![warn(clippy::unwrap_used, clippy::expect_used)]

//! GA4 event formatting and dispatch.
//!
//! A [`FormatterRegistry`] maps event names to formatters, a [`Dispatcher`]
//! runs the formatter for a named event and hands the payload to a
//! [`TagSink`](gtagcart_core::TagSink), and [`signals`] connects storefront
//! lifecycle signals to the dispatcher without tying it to any particular
//! pub/sub mechanism.

pub mod dispatch;
pub mod error;
pub mod formatters;
pub mod registry;
pub mod signals;

pub use dispatch::{Dispatcher, Outcome};
pub use error::{DispatchError, FormatError, Result};
pub use registry::{FormatResult, Formatter, FormatterRegistry};
pub use signals::{wire, SignalHub, SignalMap, SignalSource};
