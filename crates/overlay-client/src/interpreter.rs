//! Frame interpretation.
//!
//! [`CommandInterpreter`] classifies each inbound frame and applies it to
//! the [`MessageStore`] it is handed: chat frames are stamped and appended,
//! command frames run the matching bulk mutation, and `reload` is reported
//! back to the caller as [`Dispatch::Reload`]. Malformed frames and unknown
//! commands are logged and leave the store untouched.

use std::sync::Arc;

use overlay_core::{Clock, Command, FrameError, Inbound, Message, MessageKey, OverlayError};
use overlay_store::MessageStore;
use tracing::{debug, warn};

/// Outcome of dispatching one frame.
#[derive(Debug)]
pub enum Dispatch {
    /// A chat message was stored under this key.
    Appended(MessageKey),
    /// A store command ran and touched `affected` messages.
    Applied {
        /// Wire name of the command.
        command: &'static str,
        /// Messages removed or rewritten.
        affected: usize,
    },
    /// The server asked for a full reload.
    Reload,
    /// Frame carried no type.
    Ignored,
    /// Frame was malformed or named an unknown command.
    Rejected(OverlayError),
}

impl Dispatch {
    /// Whether the store changed.
    pub fn changed_store(&self) -> bool {
        match self {
            Self::Appended(_) => true,
            Self::Applied { affected, .. } => *affected > 0,
            Self::Reload | Self::Ignored | Self::Rejected(_) => false,
        }
    }
}

/// Routes frames to store operations.
#[derive(Clone)]
pub struct CommandInterpreter {
    clock: Arc<dyn Clock>,
}

impl CommandInterpreter {
    /// Interpreter stamping arrivals with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Decode raw frame text and dispatch it.
    pub fn dispatch_raw(&self, store: &mut MessageStore, text: &str) -> Dispatch {
        match Inbound::parse(text) {
            Ok(inbound) => self.dispatch(store, inbound),
            Err(err) => reject_malformed(err, text.len()),
        }
    }

    /// Apply a classified frame.
    pub fn dispatch(&self, store: &mut MessageStore, inbound: Inbound) -> Dispatch {
        match inbound {
            Inbound::Ignored => {
                debug!("frame without type ignored");
                Dispatch::Ignored
            }
            Inbound::Chat {
                message_type,
                payload,
            } => {
                let message = Message::arrived(payload, &message_type, self.clock.now());
                Dispatch::Appended(store.append(message))
            }
            Inbound::Command(command) => run_command(store, command),
        }
    }
}

impl std::fmt::Debug for CommandInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandInterpreter").finish_non_exhaustive()
    }
}

fn run_command(store: &mut MessageStore, command: Command) -> Dispatch {
    let (name, affected) = match command {
        Command::Reload => return Dispatch::Reload,
        Command::RemoveByUsers { users } => ("remove_by_users", store.remove_by_usernames(&users)),
        Command::RemoveByIds { messages } => ("remove_by_ids", store.remove_by_ids(&messages)),
        Command::ReplaceByUsers { users, text } => (
            "replace_by_users",
            store.replace_by_usernames(&users, &text),
        ),
        Command::ReplaceByIds { messages, text } => {
            ("replace_by_ids", store.replace_by_ids(&messages, &text))
        }
        Command::Unknown { name } => {
            warn!(command = %name, "got unknown command");
            return Dispatch::Rejected(OverlayError::UnknownCommand(name));
        }
    };
    debug!(command = name, affected, "command applied");
    Dispatch::Applied {
        command: name,
        affected,
    }
}

fn reject_malformed(err: FrameError, len: usize) -> Dispatch {
    let err = OverlayError::from(err);
    warn!(error = %err, kind = err.error_kind(), frame_len = len, "dropping malformed frame");
    Dispatch::Rejected(err)
}
