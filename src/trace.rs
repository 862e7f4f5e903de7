//! Trace filter: streams a gossip record source and emits only the
//! records that touch one particular node.

use std::collections::HashSet;

use log::warn;
use serde::Serialize;

use crate::errors::GossipError;
use crate::messages::{self, GossipMessage};

/// A decoded record tagged with whether it belongs to the trace.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TracedRecord {
    ChannelAnnouncement(crate::messages::ChannelAnnouncement),
    ChannelUpdate(crate::messages::ChannelUpdate),
    NodeAnnouncement(crate::messages::NodeAnnouncement),
}

/// Filters a sequence of raw gossip message bytes down to the ones that
/// touch `node_id`, preserving stream order.
///
/// `S`, the set of short channel ids this node is known to participate
/// in, grows monotonically as `ChannelAnnouncement`s are observed, so a
/// `ChannelUpdate` for a channel announced earlier in the stream is
/// still matched even though it carries no node id of its own.
pub struct TraceFilter {
    node_id: [u8; 33],
    scids: HashSet<u64>,
}

impl TraceFilter {
    pub fn new(node_id: [u8; 33]) -> Self {
        TraceFilter {
            node_id,
            scids: HashSet::new(),
        }
    }

    /// Feeds one raw message. A parse failure is logged and treated as a
    /// skip, not a fatal error: a single corrupt record shouldn't abort
    /// an otherwise-useful trace.
    pub fn feed(&mut self, raw: &[u8]) -> Option<TracedRecord> {
        match messages::parse(raw) {
            Ok(Some(message)) => self.apply(message),
            Ok(None) => None,
            Err(e) => {
                warn!("skipping unparseable record during trace: {}", e);
                None
            }
        }
    }

    fn apply(&mut self, message: GossipMessage) -> Option<TracedRecord> {
        match message {
            GossipMessage::ChannelAnnouncement(ann) => {
                let touches = ann.node_ids.iter().any(|id| *id == self.node_id);
                if touches {
                    self.scids.insert(ann.short_channel_id.as_u64());
                    Some(TracedRecord::ChannelAnnouncement(ann))
                } else {
                    None
                }
            }
            GossipMessage::ChannelUpdate(update) => {
                if self.scids.contains(&update.short_channel_id.as_u64()) {
                    Some(TracedRecord::ChannelUpdate(update))
                } else {
                    None
                }
            }
            GossipMessage::NodeAnnouncement(node) => {
                if node.node_id == self.node_id {
                    Some(TracedRecord::NodeAnnouncement(node))
                } else {
                    None
                }
            }
        }
    }
}

/// Runs the filter over an iterator of raw record results, surfacing a
/// hard container/framing error but swallowing per-record parse errors
/// (those are handled inside `feed`).
pub fn trace<I>(node_id: [u8; 33], records: I) -> Result<Vec<TracedRecord>, GossipError>
where
    I: IntoIterator<Item = Result<Vec<u8>, GossipError>>,
{
    let mut filter = TraceFilter::new(node_id);
    let mut out = Vec::new();
    for record in records {
        let raw = record?;
        if let Some(traced) = filter.feed(&raw) {
            out.push(traced);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::test_support::*;

    fn node(tag: u8) -> [u8; 33] {
        let mut id = [0u8; 33];
        id[0] = 0x02;
        id[32] = tag;
        id
    }

    #[test]
    fn channel_announcement_touching_node_is_emitted_and_registers_scid() {
        let a = node(0xAA);
        let b = node(0xBB);
        let mut filter = TraceFilter::new(a);
        let msg = build_channel_announcement(1, a, b);
        let traced = filter.feed(&msg);
        assert!(matches!(traced, Some(TracedRecord::ChannelAnnouncement(_))));
        assert!(filter.scids.contains(&1));
    }

    #[test]
    fn channel_announcement_not_touching_node_is_skipped() {
        let a = node(0xAA);
        let b = node(0xBB);
        let other = node(0xCC);
        let mut filter = TraceFilter::new(other);
        let msg = build_channel_announcement(1, a, b);
        assert!(filter.feed(&msg).is_none());
        assert!(filter.scids.is_empty());
    }

    #[test]
    fn channel_update_matches_after_announcement_registers_scid() {
        let a = node(0xAA);
        let b = node(0xBB);
        let mut filter = TraceFilter::new(a);
        filter.feed(&build_channel_announcement(42, a, b));
        let update = build_channel_update(42, 1000, 0, 1, 1, 1, None);
        assert!(matches!(filter.feed(&update), Some(TracedRecord::ChannelUpdate(_))));
    }

    #[test]
    fn channel_update_before_any_matching_announcement_is_skipped() {
        let a = node(0xAA);
        let mut filter = TraceFilter::new(a);
        let update = build_channel_update(42, 1000, 0, 1, 1, 1, None);
        assert!(filter.feed(&update).is_none());
    }

    #[test]
    fn node_announcement_matches_only_the_traced_node() {
        let a = node(0xAA);
        let mut filter = TraceFilter::new(a);
        let alias = [0u8; 32];
        let mine = build_node_announcement(a, 100, &alias);
        let other = build_node_announcement(node(0xBB), 100, &alias);
        assert!(filter.feed(&mine).is_some());
        assert!(filter.feed(&other).is_none());
    }

    #[test]
    fn unparseable_record_is_skipped_not_fatal() {
        let a = node(0xAA);
        let mut filter = TraceFilter::new(a);
        let garbage = vec![0x01u8, 0x00, 0xFF]; // claims channel_announcement, truncated
        assert!(filter.feed(&garbage).is_none());
    }

    #[test]
    fn trace_over_stream_preserves_order() {
        let a = node(0xAA);
        let b = node(0xBB);
        let records: Vec<Result<Vec<u8>, GossipError>> = vec![
            Ok(build_channel_announcement(7, a, b)),
            Ok(build_channel_update(7, 1000, 0, 1, 1, 1, None)),
            Ok(build_node_announcement(b, 500, &[0u8; 32])),
        ];
        let traced = trace(a, records).unwrap();
        assert_eq!(traced.len(), 2);
        assert!(matches!(traced[0], TracedRecord::ChannelAnnouncement(_)));
        assert!(matches!(traced[1], TracedRecord::ChannelUpdate(_)));
    }
}
