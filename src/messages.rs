//! Decodes the three gossip message types into typed records.
//!
//! Signatures are present on the wire but this crate never verifies them
//! (Non-goal: no cryptographic signature verification) -- they are read
//! only to skip past them to the fields the replay reducer actually uses.

use std::io::{Cursor, Read};

use serde::Serialize;

use crate::address::{parse_addresses, Address};
use crate::errors::GossipError;
use crate::scid::{Direction, ShortChannelId};

pub const TYPE_CHANNEL_ANNOUNCEMENT: u16 = 0x0100;
pub const TYPE_NODE_ANNOUNCEMENT: u16 = 0x0101;
pub const TYPE_CHANNEL_UPDATE: u16 = 0x0102;

#[derive(Debug, Clone, Serialize)]
pub struct ChannelAnnouncement {
    #[serde(with = "hex_bytes")]
    pub features: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub chain_hash: [u8; 32],
    pub short_channel_id: ShortChannelId,
    pub node_ids: [[u8; 33]; 2],
    pub bitcoin_keys: [[u8; 33]; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelUpdate {
    #[serde(with = "hex_bytes")]
    pub chain_hash: [u8; 32],
    pub short_channel_id: ShortChannelId,
    pub timestamp: u32,
    pub message_flags: u8,
    pub channel_flags: u8,
    pub direction: Direction,
    pub cltv_expiry_delta: u16,
    pub htlc_minimum_msat: u64,
    pub fee_base_msat: u32,
    pub fee_proportional_millionths: u32,
    pub htlc_maximum_msat: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeAnnouncement {
    #[serde(with = "hex_bytes")]
    pub features: Vec<u8>,
    pub timestamp: u32,
    pub node_id: [u8; 33],
    #[serde(with = "hex_bytes")]
    pub rgb_color: [u8; 3],
    #[serde(with = "hex_bytes")]
    pub alias: [u8; 32],
    #[serde(serialize_with = "serialize_addresses")]
    pub addresses: Vec<Address>,
}

fn serialize_addresses<S: serde::Serializer>(
    addrs: &[Address],
    s: S,
) -> Result<S::Ok, S::Error> {
    let joined = addrs
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(",");
    s.serialize_str(&joined)
}

mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer, T: AsRef<[u8]>>(bytes: T, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes.as_ref()))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GossipMessage {
    ChannelAnnouncement(ChannelAnnouncement),
    ChannelUpdate(ChannelUpdate),
    NodeAnnouncement(NodeAnnouncement),
}

/// Decodes a single gossip message from its full wire bytes (including the
/// 2-byte type header). Unknown types are not an error: they are reported
/// as "unhandled" and never reach the reducer.
pub fn parse(msg: &[u8]) -> Result<Option<GossipMessage>, GossipError> {
    if msg.len() < 2 {
        return Err(GossipError::TruncatedInput { offset: 0 });
    }
    let msg_type = u16::from_be_bytes([msg[0], msg[1]]);
    let body = &msg[2..];

    match msg_type {
        TYPE_CHANNEL_ANNOUNCEMENT => {
            Ok(Some(GossipMessage::ChannelAnnouncement(parse_channel_announcement(body)?)))
        }
        TYPE_NODE_ANNOUNCEMENT => {
            Ok(Some(GossipMessage::NodeAnnouncement(parse_node_announcement(body)?)))
        }
        TYPE_CHANNEL_UPDATE => {
            Ok(Some(GossipMessage::ChannelUpdate(parse_channel_update(body)?)))
        }
        _ => Ok(None),
    }
}

fn read_exact(cursor: &mut Cursor<&[u8]>, buf: &mut [u8]) -> Result<(), GossipError> {
    let offset = cursor.position();
    cursor
        .read_exact(buf)
        .map_err(|_| GossipError::TruncatedInput { offset })
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, GossipError> {
    let mut buf = [0u8; 2];
    read_exact(cursor, &mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, GossipError> {
    let mut buf = [0u8; 4];
    read_exact(cursor, &mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64(cursor: &mut Cursor<&[u8]>) -> Result<u64, GossipError> {
    let mut buf = [0u8; 8];
    read_exact(cursor, &mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, GossipError> {
    let mut buf = [0u8; 1];
    read_exact(cursor, &mut buf)?;
    Ok(buf[0])
}

fn skip(cursor: &mut Cursor<&[u8]>, n: usize) -> Result<(), GossipError> {
    let mut buf = vec![0u8; n];
    read_exact(cursor, &mut buf)
}

fn read_array<const N: usize>(cursor: &mut Cursor<&[u8]>) -> Result<[u8; N], GossipError> {
    let mut buf = [0u8; N];
    read_exact(cursor, &mut buf)?;
    Ok(buf)
}

fn parse_channel_announcement(body: &[u8]) -> Result<ChannelAnnouncement, GossipError> {
    let mut cursor = Cursor::new(body);
    skip(&mut cursor, 64 * 4)?; // node_signature_1/2, bitcoin_signature_1/2

    let feature_len = read_u16(&mut cursor)? as usize;
    let mut features = vec![0u8; feature_len];
    read_exact(&mut cursor, &mut features)?;

    let chain_hash = read_array::<32>(&mut cursor)?;
    let scid_bytes = read_array::<8>(&mut cursor)?;
    let short_channel_id = ShortChannelId::from_u64(u64::from_be_bytes(scid_bytes));

    let node_id_1 = read_array::<33>(&mut cursor)?;
    let node_id_2 = read_array::<33>(&mut cursor)?;
    let bitcoin_key_1 = read_array::<33>(&mut cursor)?;
    let bitcoin_key_2 = read_array::<33>(&mut cursor)?;

    Ok(ChannelAnnouncement {
        features,
        chain_hash,
        short_channel_id,
        node_ids: [node_id_1, node_id_2],
        bitcoin_keys: [bitcoin_key_1, bitcoin_key_2],
    })
}

fn parse_channel_update(body: &[u8]) -> Result<ChannelUpdate, GossipError> {
    let mut cursor = Cursor::new(body);
    skip(&mut cursor, 64)?; // signature

    let chain_hash = read_array::<32>(&mut cursor)?;
    let scid_bytes = read_array::<8>(&mut cursor)?;
    let short_channel_id = ShortChannelId::from_u64(u64::from_be_bytes(scid_bytes));
    let timestamp = read_u32(&mut cursor)?;
    let message_flags = read_u8(&mut cursor)?;
    let channel_flags = read_u8(&mut cursor)?;
    let direction = Direction::from_bit(channel_flags);
    let cltv_expiry_delta = read_u16(&mut cursor)?;
    let htlc_minimum_msat = read_u64(&mut cursor)?;
    let fee_base_msat = read_u32(&mut cursor)?;
    let fee_proportional_millionths = read_u32(&mut cursor)?;
    let htlc_maximum_msat = if message_flags & 0x01 != 0 {
        Some(read_u64(&mut cursor)?)
    } else {
        None
    };

    Ok(ChannelUpdate {
        chain_hash,
        short_channel_id,
        timestamp,
        message_flags,
        channel_flags,
        direction,
        cltv_expiry_delta,
        htlc_minimum_msat,
        fee_base_msat,
        fee_proportional_millionths,
        htlc_maximum_msat,
    })
}

fn parse_node_announcement(body: &[u8]) -> Result<NodeAnnouncement, GossipError> {
    let mut cursor = Cursor::new(body);
    skip(&mut cursor, 64)?; // signature

    let feature_len = read_u16(&mut cursor)? as usize;
    let mut features = vec![0u8; feature_len];
    read_exact(&mut cursor, &mut features)?;

    let timestamp = read_u32(&mut cursor)?;
    let node_id = read_array::<33>(&mut cursor)?;
    let rgb_color = read_array::<3>(&mut cursor)?;
    let alias = read_array::<32>(&mut cursor)?;

    let addr_len = read_u16(&mut cursor)? as usize;
    let mut addr_region = vec![0u8; addr_len];
    read_exact(&mut cursor, &mut addr_region)?;
    let addresses = parse_addresses(&addr_region)?;

    Ok(NodeAnnouncement {
        features,
        timestamp,
        node_id,
        rgb_color,
        alias,
        addresses,
    })
}
