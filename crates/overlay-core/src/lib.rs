//! # overlay-core
//!
//! Foundation types shared by every webchat overlay crate:
//!
//! - **IDs**: [`MessageId`] (server-assigned), [`MessageKey`] (store identity),
//!   [`ConnectionId`] (one per connection attempt)
//! - **Messages**: [`Message`] and the wire-side [`MessagePayload`]
//! - **Frames**: [`Inbound`] classification and the tagged [`Command`] enum
//! - **Config**: remote [`WindowSettings`] and the session [`OverlayConfig`]
//! - **Clock**: [`Clock`] capability with system and manual implementations
//! - **Errors**: [`OverlayError`] taxonomy via `thiserror`
//! - **Logging**: subscriber setup and test capture helpers

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod errors;
pub mod frame;
pub mod ids;
pub mod logging;
pub mod message;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{OverlayConfig, WindowSettings};
pub use errors::{FrameError, OverlayError};
pub use frame::{Command, Inbound};
pub use ids::{ConnectionId, MessageId, MessageKey};
pub use message::{Emote, Message, MessagePayload};
