//! # overlay-store
//!
//! The bounded, ordered message mirror behind the overlay.
//!
//! - [`MessageStore`]: insertion with front eviction, id/username bulk
//!   mutation, `clear` and `decay` sweeps
//! - [`Sanitizer`]: pluggable text transform applied before display
//! - [`DisplayMessage`]: the rendered view handed to renderers

#![deny(unsafe_code)]

pub mod sanitize;
pub mod store;
pub mod view;

pub use sanitize::{EmoteSanitizer, Sanitizer};
pub use store::MessageStore;
pub use view::DisplayMessage;
