//! The time-machine reducer: folds a decoded gossip stream into a
//! consistent topology snapshot at a target timestamp.

use std::collections::HashMap;

use log::{debug, warn};
use serde::Serialize;

use crate::errors::GossipError;
use crate::messages::{ChannelAnnouncement, ChannelUpdate, GossipMessage, NodeAnnouncement};
use crate::scid::{Direction, DirectionalChannelKey, ShortChannelId};

const TWO_WEEKS_SECS: i64 = 14 * 86_400;

#[derive(Debug, Clone, Serialize)]
pub struct ChannelState {
    pub source: String,
    pub destination: String,
    pub features: String,
    pub timestamp: u32,
    pub fee_base_msat: Option<u32>,
    pub fee_proportional_millionths: Option<u32>,
    pub htlc_minimum_msat: Option<u64>,
    pub htlc_maximum_msat: Option<u64>,
    pub cltv_expiry_delta: Option<u16>,
}

impl ChannelState {
    fn from_announcement(source: [u8; 33], destination: [u8; 33], features: &[u8]) -> Self {
        ChannelState {
            source: hex::encode(source),
            destination: hex::encode(destination),
            features: hex::encode(features),
            timestamp: 0,
            fee_base_msat: None,
            fee_proportional_millionths: None,
            htlc_minimum_msat: None,
            htlc_maximum_msat: None,
            cltv_expiry_delta: None,
        }
    }

    fn apply_update(&mut self, update: &ChannelUpdate) {
        self.timestamp = update.timestamp;
        self.fee_base_msat = Some(update.fee_base_msat);
        self.fee_proportional_millionths = Some(update.fee_proportional_millionths);
        self.htlc_minimum_msat = Some(update.htlc_minimum_msat);
        self.cltv_expiry_delta = Some(update.cltv_expiry_delta);
        // htlc_maximum_msat is absent-distinct-from-zero: a later update
        // without the flag must not clear a value set by an earlier one.
        if let Some(max) = update.htlc_maximum_msat {
            self.htlc_maximum_msat = Some(max);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeState {
    pub id: String,
    pub timestamp: u32,
    pub features: String,
    pub rgb_color: String,
    pub alias: String,
    pub addresses: String,
    pub in_degree: u32,
    pub out_degree: u32,
}

/// Output encoding for the alias field: DOT can carry UTF-8, the other
/// target formats are restricted to ASCII.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasCodec {
    Utf8,
    Ascii,
}

impl NodeState {
    fn from_announcement(ann: &NodeAnnouncement, codec: AliasCodec) -> Self {
        let stripped: Vec<u8> = ann.alias.iter().copied().filter(|&b| b != 0).collect();
        let alias = match codec {
            AliasCodec::Utf8 => String::from_utf8_lossy(&stripped).into_owned(),
            AliasCodec::Ascii => stripped.iter().filter(|&&b| b.is_ascii()).map(|&b| b as char).collect(),
        };
        NodeState {
            id: hex::encode(ann.node_id),
            timestamp: ann.timestamp,
            features: hex::encode(&ann.features),
            rgb_color: hex::encode(ann.rgb_color),
            alias,
            addresses: ann
                .addresses
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(","),
            in_degree: 0,
            out_degree: 0,
        }
    }
}

/// The immutable result of a replay: every channel and node considered
/// alive at the target timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub channels: HashMap<String, ChannelState>,
    pub nodes: HashMap<String, NodeState>,
}

/// Accumulates decoded records in stream order and produces a `Snapshot`
/// once, at the end of the replay.
pub struct Reducer {
    target_timestamp: u32,
    cutoff: u32,
    alias_codec: AliasCodec,
    channels: HashMap<DirectionalChannelKey, ChannelState>,
    nodes: HashMap<String, NodeState>,
}

impl Reducer {
    pub fn new(target_timestamp: u32, alias_codec: AliasCodec) -> Self {
        let cutoff = (i64::from(target_timestamp) - TWO_WEEKS_SECS).max(0) as u32;
        Reducer {
            target_timestamp,
            cutoff,
            alias_codec,
            channels: HashMap::new(),
            nodes: HashMap::new(),
        }
    }

    pub fn cutoff(&self) -> u32 {
        self.cutoff
    }

    /// Feeds one decoded message into the reducer. `None` (an undecoded /
    /// unhandled message) is a no-op.
    pub fn apply(&mut self, message: Option<GossipMessage>) -> Result<(), GossipError> {
        match message {
            Some(GossipMessage::ChannelAnnouncement(ann)) => self.apply_announcement(&ann),
            Some(GossipMessage::ChannelUpdate(update)) => self.apply_update(&update)?,
            Some(GossipMessage::NodeAnnouncement(node)) => self.apply_node(&node),
            None => {}
        }
        Ok(())
    }

    fn apply_announcement(&mut self, ann: &ChannelAnnouncement) {
        let forward = DirectionalChannelKey::new(ann.short_channel_id, Direction::Forward);
        let reverse = DirectionalChannelKey::new(ann.short_channel_id, Direction::Reverse);
        self.channels.insert(
            forward,
            ChannelState::from_announcement(ann.node_ids[0], ann.node_ids[1], &ann.features),
        );
        self.channels.insert(
            reverse,
            ChannelState::from_announcement(ann.node_ids[1], ann.node_ids[0], &ann.features),
        );
    }

    fn apply_update(&mut self, update: &ChannelUpdate) -> Result<(), GossipError> {
        if update.timestamp > self.target_timestamp {
            return Ok(()); // future update
        }
        if update.timestamp < self.cutoff {
            return Ok(()); // cannot possibly keep the channel alive
        }

        let key = DirectionalChannelKey::new(update.short_channel_id, update.direction);
        let chan = self.channels.get_mut(&key).ok_or_else(|| GossipError::OrphanUpdate {
            scid: key.to_string(),
        })?;

        if chan.timestamp > update.timestamp {
            return Ok(()); // stale
        }

        chan.apply_update(update);
        Ok(())
    }

    fn apply_node(&mut self, ann: &NodeAnnouncement) {
        let id = hex::encode(ann.node_id);
        if let Some(existing) = self.nodes.get(&id) {
            if existing.timestamp > ann.timestamp {
                return; // stale
            }
        }
        let state = NodeState::from_announcement(ann, self.alias_codec);
        self.nodes.insert(id, state);
    }

    /// Prunes dead channels, computes degrees over the survivors, drops
    /// isolated nodes, and yields the final snapshot. Degrees are only
    /// ever computed here, once, since `apply` never sees a finalized
    /// snapshot to update incrementally.
    pub fn finalize(mut self) -> Result<Snapshot, GossipError> {
        let cutoff = self.cutoff;
        let dead_keys: Vec<DirectionalChannelKey> = self
            .channels
            .iter()
            .filter(|(_, chan)| chan.timestamp < cutoff)
            .map(|(key, _)| key.clone())
            .collect();

        for (key, chan) in self.channels.iter() {
            if chan.timestamp < cutoff {
                continue;
            }
            if let Some(source) = self.nodes.get_mut(&chan.source) {
                source.out_degree += 1;
            }
            if let Some(dest) = self.nodes.get_mut(&chan.destination) {
                dest.in_degree += 1;
            }
            debug!("keeping channel {} alive at timestamp {}", key, chan.timestamp);
        }

        for key in &dead_keys {
            self.channels.remove(key);
        }
        if dead_keys.is_empty() {
            debug!("pruning removed no channels");
        } else {
            debug!("pruning removed {} channels (cutoff={})", dead_keys.len(), cutoff);
        }

        if self.channels.is_empty() {
            warn!("no channels survived pruning for cutoff {}", cutoff);
            return Err(GossipError::EmptySnapshot);
        }

        self.nodes.retain(|_, n| n.in_degree > 0 || n.out_degree > 0);

        Ok(Snapshot {
            channels: self
                .channels
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            nodes: self.nodes,
        })
    }
}
