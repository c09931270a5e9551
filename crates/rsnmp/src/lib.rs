//! A pure Rust SNMP client for protocol versions 1, 2c and 3.
//!
//! The session type is [`Client`]; wire model and BER codec live in
//! [`rsnmp_msg`] (re-exported here) and the byte-exchange collaborator
//! in [`rsnmp_transport`].
//!
//! ```no_run
//! use rsnmp::{Client, ClientConfig, Oid};
//!
//! fn main() -> rsnmp::Result<()> {
//!     let client = Client::connect(ClientConfig {
//!         target: "192.0.2.7".to_string(),
//!         ..Default::default()
//!     })?;
//!     let sys_descr: Oid = ".1.3.6.1.2.1.1.1.0".parse()?;
//!     for vb in client.get(&[sys_descr])? {
//!         println!("{} = {:?}", vb.name, vb.value);
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod client;
pub mod crypto;
pub mod error;
pub mod security;
pub mod walk;

pub use client::{AppOptions, Client, ClientConfig};
pub use crypto::{AuthProtocol, CryptoError, PrivProtocol, set_password_caching};
pub use error::{ConfigError, Error};
pub use security::{EngineDriftPolicy, SecurityParameters, UsmConfig, UsmSecurity};
pub use walk::{WalkMode, WalkVisitor};

pub use rsnmp_msg::*;
pub use rsnmp_transport as transport;

/// SNMP client result type.
pub type Result<T> = std::result::Result<T, crate::Error>;
