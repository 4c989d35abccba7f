#![deny(clippy::print_stdout)]

pub mod config;
pub mod console;
pub mod sources;

#[macro_use]
extern crate tracing;

pub use framework::{Error, Result};
