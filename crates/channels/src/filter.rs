//! Inbound prefilter for the direct connection.
//!
//! The direct transport sees every frame on the account — our own sends,
//! status broadcasts, group chatter — not just externally pushed webhooks,
//! so frames are screened before normalization. Each predicate toggles
//! independently; self and broadcast are ignored by default.

use tracing::debug;

use crate::{jid, raw::RawMessageFrame};

/// Why a frame was dropped before routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SelfMessage,
    Broadcast,
    Group,
    Denylisted,
}

#[derive(Debug, Clone)]
pub struct MessageFilter {
    pub ignore_self: bool,
    pub ignore_broadcast: bool,
    pub ignore_groups: bool,
    pub denylist: Vec<String>,
}

impl Default for MessageFilter {
    fn default() -> Self {
        Self {
            ignore_self: true,
            ignore_broadcast: true,
            ignore_groups: false,
            denylist: Vec::new(),
        }
    }
}

impl MessageFilter {
    /// Decide whether a frame should be dropped, and why.
    pub fn verdict(&self, frame: &RawMessageFrame) -> Option<SkipReason> {
        let key = frame.key.as_ref();
        let jid = key.and_then(|k| k.remote_jid.as_deref()).unwrap_or("");

        if self.ignore_self && key.and_then(|k| k.from_me).unwrap_or(false) {
            debug!(jid, "skipping own message");
            return Some(SkipReason::SelfMessage);
        }
        if self.ignore_broadcast && jid::is_broadcast(jid) {
            debug!(jid, "skipping broadcast message");
            return Some(SkipReason::Broadcast);
        }
        if self.ignore_groups && jid::is_group(jid) {
            debug!(jid, "skipping group message");
            return Some(SkipReason::Group);
        }
        if !self.denylist.is_empty() {
            let channel = jid::derive_channel_id(jid);
            if self
                .denylist
                .iter()
                .any(|entry| entry == jid || *entry == channel)
            {
                debug!(jid, "skipping denylisted sender");
                return Some(SkipReason::Denylisted);
            }
        }
        None
    }
}
