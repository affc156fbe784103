//! # overlay-client
//!
//! Live side of the webchat overlay:
//!
//! - [`connection`]: connection lifecycle and the single-slot reconnect timer
//! - [`interpreter`]: frame classification and command routing into the store
//! - [`endpoints`], [`request`], [`settings`]: HTTP plumbing for window settings
//! - [`config`]: process configuration with env overrides
//! - [`runtime`]: the `select!` loop tying socket, sweeps and settings together

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod endpoints;
pub mod errors;
pub mod interpreter;
pub mod request;
pub mod runtime;
pub mod settings;

pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState, ReconnectTimer};
pub use endpoints::Endpoints;
pub use errors::{ClientError, EndpointError, RequestError};
pub use interpreter::{CommandInterpreter, Dispatch};
pub use runtime::{Overlay, OverlayView};
