//! Provider-agnostic channel building blocks.
//!
//! Each transport (direct Baileys connection, inbound webhooks, cloud API)
//! receives messages in its own wire shape. This crate holds what they
//! share: the permissively-parsed raw payload structs, the normalizer that
//! turns a raw frame into a domain [`courier_common::IncomingMessage`], the
//! JID → channel-id derivation, the configurable inbound prefilter, and the
//! two HTTP-based send channels.

pub mod cloud;
pub mod error;
pub mod filter;
pub mod jid;
pub mod normalize;
pub mod raw;
pub mod webhook;

pub use {
    cloud::CloudApiChannel,
    error::ChannelError,
    filter::{MessageFilter, SkipReason},
    jid::derive_channel_id,
    normalize::{normalize_frame, normalize_upsert},
    raw::{RawKey, RawMessageContent, RawMessageFrame, RawUpsertPayload},
    webhook::WebhookChannel,
};
