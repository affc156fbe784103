//! Bounded ordered message store.
//!
//! Messages are kept in arrival order. After every mutation the store holds
//! at most `capacity` messages (0 = unlimited); overflow evicts from the
//! front. Two sweeps age messages out:
//!
//! - `decay(now)` marks messages at least `decay_interval` old as `is_old`
//! - `clear(now)` removes messages at least `clear_interval` old, whether or
//!   not they decayed
//!
//! Both thresholds are inclusive. A disabled sweep is a no-op.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace};

use overlay_core::{Message, MessageId, MessageKey, OverlayConfig};

use crate::sanitize::Sanitizer;
use crate::view::DisplayMessage;

/// Ordered, bounded collection of messages. Sole owner of its messages.
#[derive(Debug)]
pub struct MessageStore {
    messages: VecDeque<Message>,
    capacity: usize,
    clear_interval: Option<TimeDelta>,
    decay_interval: Option<TimeDelta>,
    last_key: MessageKey,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(&OverlayConfig::default())
    }
}

impl MessageStore {
    /// Empty store configured from `config`.
    pub fn new(config: &OverlayConfig) -> Self {
        let mut store = Self {
            messages: VecDeque::new(),
            capacity: 0,
            clear_interval: None,
            decay_interval: None,
            last_key: MessageKey::default(),
        };
        let _ = store.configure(config);
        store
    }

    /// Apply new capacity and sweep intervals.
    ///
    /// Trims the front immediately if the new capacity is smaller than the
    /// current length. Returns the number of evicted messages.
    pub fn configure(&mut self, config: &OverlayConfig) -> usize {
        self.capacity = config.capacity;
        self.clear_interval = config.clear_interval.map(to_delta);
        self.decay_interval = config.decay_interval.map(to_delta);
        self.enforce_capacity()
    }

    /// Current capacity (0 = unlimited).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Look up a message by store identity.
    pub fn get(&self, key: MessageKey) -> Option<&Message> {
        self.messages.iter().find(|m| m.key == key)
    }

    /// Insert at the end, then evict from the front down to capacity.
    ///
    /// Assigns and returns the message's store key.
    pub fn append(&mut self, mut message: Message) -> MessageKey {
        self.last_key = self.last_key.next();
        message.key = self.last_key;
        self.messages.push_back(message);
        let _ = self.enforce_capacity();
        self.last_key
    }

    /// Remove one message by identity. No-op if absent.
    pub fn remove(&mut self, key: MessageKey) -> bool {
        match self.messages.iter().position(|m| m.key == key) {
            Some(index) => self.messages.remove(index).is_some(),
            None => false,
        }
    }

    /// Remove every message whose server id is in `ids`.
    pub fn remove_by_ids(&mut self, ids: &[MessageId]) -> usize {
        let ids: HashSet<&MessageId> = ids.iter().collect();
        self.remove_where(|m| m.id.as_ref().is_some_and(|id| ids.contains(id)))
    }

    /// Remove every message whose author is in `names`, ignoring case.
    pub fn remove_by_usernames(&mut self, names: &[String]) -> usize {
        let names = lowercase_set(names);
        self.remove_where(|m| names.contains(&m.user.to_lowercase()))
    }

    /// Replace text of messages whose id is in `ids`.
    ///
    /// Clears emotes and the `pm` flag of every match.
    pub fn replace_by_ids(&mut self, ids: &[MessageId], text: &str) -> usize {
        let ids: HashSet<&MessageId> = ids.iter().collect();
        let mut replaced = 0;
        for message in &mut self.messages {
            if message.id.as_ref().is_some_and(|id| ids.contains(id)) {
                message.text = text.to_owned();
                message.emotes.clear();
                message.pm = false;
                replaced += 1;
            }
        }
        replaced
    }

    /// Replace text of messages whose author is in `names`, ignoring case.
    ///
    /// Clears emotes; `pm` is left as is.
    pub fn replace_by_usernames(&mut self, names: &[String], text: &str) -> usize {
        let names = lowercase_set(names);
        let mut replaced = 0;
        for message in &mut self.messages {
            if names.contains(&message.user.to_lowercase()) {
                message.text = text.to_owned();
                message.emotes.clear();
                replaced += 1;
            }
        }
        replaced
    }

    /// Remove every message at least `clear_interval` old.
    pub fn clear(&mut self, now: DateTime<Utc>) -> usize {
        let Some(interval) = self.clear_interval else {
            return 0;
        };
        let removed = self.remove_where(|m| now.signed_duration_since(m.arrival_time) >= interval);
        if removed > 0 {
            debug!(removed, remaining = self.messages.len(), "clear sweep");
        }
        removed
    }

    /// Mark every fresh message at least `decay_interval` old.
    ///
    /// Never removes and never unmarks.
    pub fn decay(&mut self, now: DateTime<Utc>) -> usize {
        let Some(interval) = self.decay_interval else {
            return 0;
        };
        let mut decayed = 0;
        for message in self.messages.iter_mut().filter(|m| !m.is_old) {
            if now.signed_duration_since(message.arrival_time) >= interval {
                message.is_old = true;
                decayed += 1;
            }
        }
        if decayed > 0 {
            trace!(decayed, "decay sweep");
        }
        decayed
    }

    /// Sanitize one message for display.
    ///
    /// An empty result removes the message and yields `None`.
    pub fn sanitize(&mut self, key: MessageKey, sanitizer: &dyn Sanitizer) -> Option<String> {
        let text = sanitizer.sanitize(self.get(key)?);
        if text.is_empty() {
            let _ = self.remove(key);
            return None;
        }
        Some(text)
    }

    /// Sanitize every message in order and build the display view.
    ///
    /// Messages that sanitize to nothing are removed from the store.
    pub fn render(&mut self, sanitizer: &dyn Sanitizer) -> Vec<DisplayMessage> {
        let mut view = Vec::with_capacity(self.messages.len());
        self.messages.retain(|message| {
            let text = sanitizer.sanitize(message);
            if text.is_empty() {
                trace!(key = %message.key, "dropping message with empty display text");
                return false;
            }
            view.push(DisplayMessage::new(message, text));
            true
        });
        view
    }

    /// Drop every message. Keys keep increasing.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    fn remove_where(&mut self, mut predicate: impl FnMut(&Message) -> bool) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| !predicate(m));
        before - self.messages.len()
    }

    fn enforce_capacity(&mut self) -> usize {
        if self.capacity == 0 {
            return 0;
        }
        let mut evicted = 0;
        while self.messages.len() > self.capacity {
            if let Some(oldest) = self.messages.pop_front() {
                trace!(key = %oldest.key, "evicted oldest message");
                evicted += 1;
            }
        }
        evicted
    }
}

fn to_delta(interval: Duration) -> TimeDelta {
    TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX)
}

fn lowercase_set(names: &[String]) -> HashSet<String> {
    names.iter().map(|n| n.to_lowercase()).collect()
}
