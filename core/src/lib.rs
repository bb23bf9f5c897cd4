//! Synchronous single-handle HTTP client.
//!
//! # Overview
//! `HttpClient` wraps one transfer-engine handle. Callers set a URL, option
//! overrides and optionally a method with form parameters, then `execute`
//! blocks until the transfer completes and returns the response payload.
//!
//! # Design
//! - The engine is reached only through `TransferEngine` / `TransferHandle`,
//!   so tests can substitute a recording engine. `UreqEngine` is the bundled
//!   implementation.
//! - Baseline options live in an immutable `ClientConfig` owned by each
//!   client; environment overrides are read with figment on request.
//! - Options are named with `CURLOPT_*` strings and resolved to the closed
//!   `Opt` enum when a transfer runs.
//! - No pooling, retries, cookies or async: one client, one handle, one
//!   transfer at a time.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod options;
pub mod transport;

pub use client::HttpClient;
pub use config::{ClientConfig, Defaults};
pub use engine::{Payload, TransferEngine, TransferHandle, TransferInfo};
pub use error::{ClientError, ConfigError, TransferError};
pub use options::{Opt, OptionSet, OptionValue};
pub use transport::{UreqEngine, UreqHandle};
