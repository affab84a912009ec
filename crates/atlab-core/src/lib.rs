//! atlab-core: Core traits, types, and error definitions for atlab.
//!
//! This crate defines the family-agnostic abstractions that every module
//! driver implements. Test sequences depend on these types without pulling
//! in a specific command dialect.
//!
//! # Key types
//!
//! - [`CellularDevice`] -- the intent surface for driving a module
//! - [`Transport`] -- byte-level communication channel
//! - [`Error`] / [`Result`] -- error handling, with [`ErrorKind`] for retry policy

pub mod device;
pub mod error;
pub mod transport;
pub mod types;

pub use device::CellularDevice;
pub use error::{Error, ErrorKind, Result};
pub use transport::Transport;
pub use types::*;
