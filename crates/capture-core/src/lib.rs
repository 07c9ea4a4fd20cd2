//! Core types and traits shared by the capture relay and its drivers.
//!
//! This crate defines the vocabulary of the relay without implementing any of
//! it: the error taxonomy ([`error::Error`], [`error::DriverError`]), the
//! device limits ([`limits`]), and the boundary with the vendor acquisition
//! driver ([`driver::ScopeDriver`] and its callback handler traits).
//!
//! Driver crates depend only on `capture-core`, never on `capture-relay`,
//! so the relay can be swapped or tested against a mock without a cycle.

pub mod buffers;
pub mod driver;
pub mod error;
pub mod limits;

pub use buffers::{shared_samples, SharedSamples};
pub use driver::{
    BlockHandler, BlockRequest, DeviceHandle, ScopeDriver, StreamingDelivery, StreamingHandler,
    UnitInfo,
};
pub use error::{DriverError, DriverErrorKind, Error, Result};
