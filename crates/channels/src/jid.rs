//! WhatsApp JID handling.
//!
//! JIDs look like `549112345678@s.whatsapp.net` (individual),
//! `120363041234567890@g.us` (group), or `status@broadcast`.

/// Suffix marking a group chat JID.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Suffix marking broadcast / status traffic.
pub const BROADCAST_SUFFIX: &str = "@broadcast";

/// Derive the routing key for a sender identifier.
///
/// Group JIDs are kept whole — the group itself is the conversation.
/// Individual JIDs are reduced to the leading numeric segment of the local
/// part, which strips device suffixes like `:12`.
pub fn derive_channel_id(jid: &str) -> String {
    if jid.ends_with(GROUP_SUFFIX) {
        return jid.to_string();
    }
    let local = jid.split('@').next().unwrap_or(jid);
    let digits: String = local.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        local.to_string()
    } else {
        digits
    }
}

pub fn is_group(jid: &str) -> bool {
    jid.ends_with(GROUP_SUFFIX)
}

pub fn is_broadcast(jid: &str) -> bool {
    jid.ends_with(BROADCAST_SUFFIX)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn individual_jid_reduces_to_number() {
        assert_eq!(derive_channel_id("549112345678@s.whatsapp.net"), "549112345678");
    }

    #[test]
    fn device_suffix_is_stripped() {
        assert_eq!(derive_channel_id("549112345678:12@s.whatsapp.net"), "549112345678");
    }

    #[test]
    fn group_jid_is_kept_whole() {
        let jid = "120363041234567890@g.us";
        assert_eq!(derive_channel_id(jid), jid);
        assert!(is_group(jid));
    }

    #[test]
    fn broadcast_is_detected() {
        assert!(is_broadcast("status@broadcast"));
        assert!(!is_broadcast("549112345678@s.whatsapp.net"));
    }

    #[test]
    fn non_numeric_local_part_passes_through() {
        assert_eq!(derive_channel_id("status@broadcast"), "status");
    }
}
