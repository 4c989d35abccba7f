mod accumulator;
pub mod http;
pub mod trace;

pub use accumulator::{Accumulator, MemoryAccumulator};

#[macro_use]
extern crate tracing;

/// The basic error type, dynamically dispatched and safe to send across threads
pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The basic result type, defined in terms of [`Error`] and generic over `T`
pub type Result<T> = std::result::Result<T, Error>;
