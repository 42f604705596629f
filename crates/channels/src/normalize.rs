//! Raw frame → domain message conversion.

use {
    chrono::{DateTime, Utc},
    courier_common::IncomingMessage,
    tracing::warn,
};

use crate::{
    jid,
    raw::{MESSAGES_UPSERT, RawMessageFrame, RawUpsertPayload},
};

/// Normalize a full webhook envelope.
///
/// Returns `None` (logging at warn) for payloads without the
/// `messages.upsert` event marker or without a message frame.
pub fn normalize_upsert(payload: &RawUpsertPayload) -> Option<IncomingMessage> {
    match payload.event.as_deref() {
        Some(MESSAGES_UPSERT) => {},
        other => {
            warn!(event = ?other, "ignoring payload without messages.upsert marker");
            return None;
        },
    }
    let Some(frame) = payload.data.as_ref() else {
        warn!("messages.upsert payload carried no data");
        return None;
    };
    normalize_frame(frame)
}

/// Normalize one message frame (used directly by the sidecar event loop,
/// which receives bare frames rather than webhook envelopes).
pub fn normalize_frame(frame: &RawMessageFrame) -> Option<IncomingMessage> {
    let Some(remote_jid) = frame
        .key
        .as_ref()
        .and_then(|k| k.remote_jid.as_deref())
        .filter(|j| !j.is_empty())
    else {
        warn!("message frame has no sender identifier, dropping");
        return None;
    };

    let id = frame
        .key
        .as_ref()
        .and_then(|k| k.id.clone())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(IncomingMessage::generated_id);

    let text = frame
        .message
        .as_ref()
        .map(|m| m.extract_text())
        .unwrap_or_else(|| "[unsupported message]".into());

    let timestamp = frame
        .message_timestamp
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    let mut metadata = courier_common::Metadata::new();
    metadata.insert("is_group".into(), jid::is_group(remote_jid).into());
    if let Some(name) = frame.push_name.clone() {
        metadata.insert("push_name".into(), name.into());
    }
    if let Some(from_me) = frame.key.as_ref().and_then(|k| k.from_me) {
        metadata.insert("from_me".into(), from_me.into());
    }

    Some(IncomingMessage {
        id,
        from: remote_jid.to_string(),
        channel_id: jid::derive_channel_id(remote_jid),
        text,
        timestamp,
        metadata,
    })
}
