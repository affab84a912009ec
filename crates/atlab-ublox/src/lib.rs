//! u-blox SARA module backend for atlab.
//!
//! This crate maps the family-agnostic [`CellularDevice`](atlab_core::CellularDevice)
//! intents onto AT command templates. It provides:
//!
//! - **Device specs** ([`spec`]) -- the per-family template set, placeholder
//!   rendering, and TOML loading for families not built in.
//! - **Command helpers** ([`commands`]) -- fixed commands and parsers for the
//!   structured replies (identity, registration, socket handles, datagrams).
//! - **Family definitions** ([`models`]) -- SARA-N2 and SARA-R4.
//! - **Device driver** ([`device`]) -- [`AtDevice`], the trait implementation.
//! - **Builder** ([`builder`]) -- fluent construction of [`AtDevice`].
//!
//! # Example
//!
//! ```
//! use atlab_ublox::models::sara_n2;
//! use atlab_ublox::spec::{render, Intent};
//!
//! let spec = sara_n2();
//! let template = spec.template(Intent::CloseSocket).unwrap();
//! assert_eq!(render(template, &[("socket", &3)]).unwrap(), "AT+NSOCL=3");
//! ```

pub mod builder;
pub mod commands;
pub mod device;
pub mod models;
pub mod spec;

pub use builder::AtDeviceBuilder;
pub use device::AtDevice;
pub use spec::DeviceSpec;
