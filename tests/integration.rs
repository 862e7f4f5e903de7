//! End-to-end pipeline tests: dataset container -> message parser ->
//! replay reducer -> export, and gossip_store -> trace filter. Built
//! entirely from in-memory byte buffers so no fixture files are needed.

use std::io::Cursor;

use lntopo::container::DatasetReader;
use lntopo::export::{render, ExportFormat};
use lntopo::snapshot::{AliasCodec, Reducer};
use lntopo::varint::bigsize_encode;

const MAGIC: &[u8] = b"GSP\x01";
const TYPE_CHANNEL_ANNOUNCEMENT: u16 = 0x0100;
const TYPE_CHANNEL_UPDATE: u16 = 0x0102;
const TYPE_NODE_ANNOUNCEMENT: u16 = 0x0101;

fn node_id(tag: u8) -> [u8; 33] {
    let mut id = [0u8; 33];
    id[0] = 0x02;
    id[32] = tag;
    id
}

fn scid(block: u64) -> u64 {
    block << 40
}

fn wire_channel_announcement(scid: u64, node1: [u8; 33], node2: [u8; 33]) -> Vec<u8> {
    let mut msg = TYPE_CHANNEL_ANNOUNCEMENT.to_be_bytes().to_vec();
    msg.extend_from_slice(&[0u8; 64 * 4]); // four signatures
    msg.extend_from_slice(&0u16.to_be_bytes()); // empty features
    msg.extend_from_slice(&[0u8; 32]); // chain_hash
    msg.extend_from_slice(&scid.to_be_bytes());
    msg.extend_from_slice(&node1);
    msg.extend_from_slice(&node2);
    msg.extend_from_slice(&[0u8; 33]);
    msg.extend_from_slice(&[0u8; 33]);
    msg
}

fn wire_channel_update(
    scid: u64,
    timestamp: u32,
    channel_flags: u8,
    fee_base_msat: u32,
    fee_proportional_millionths: u32,
    htlc_maximum_msat: Option<u64>,
) -> Vec<u8> {
    let message_flags: u8 = if htlc_maximum_msat.is_some() { 0x01 } else { 0x00 };
    let mut msg = TYPE_CHANNEL_UPDATE.to_be_bytes().to_vec();
    msg.extend_from_slice(&[0u8; 64]);
    msg.extend_from_slice(&[0u8; 32]);
    msg.extend_from_slice(&scid.to_be_bytes());
    msg.extend_from_slice(&timestamp.to_be_bytes());
    msg.push(message_flags);
    msg.push(channel_flags);
    msg.extend_from_slice(&40u16.to_be_bytes()); // cltv_expiry_delta
    msg.extend_from_slice(&1000u64.to_be_bytes()); // htlc_minimum_msat
    msg.extend_from_slice(&fee_base_msat.to_be_bytes());
    msg.extend_from_slice(&fee_proportional_millionths.to_be_bytes());
    if let Some(max) = htlc_maximum_msat {
        msg.extend_from_slice(&max.to_be_bytes());
    }
    msg
}

fn wire_node_announcement(node_id: [u8; 33], timestamp: u32, alias: &str) -> Vec<u8> {
    let mut alias_bytes = [0u8; 32];
    let bytes = alias.as_bytes();
    alias_bytes[..bytes.len()].copy_from_slice(bytes);

    let mut msg = TYPE_NODE_ANNOUNCEMENT.to_be_bytes().to_vec();
    msg.extend_from_slice(&[0u8; 64]);
    msg.extend_from_slice(&0u16.to_be_bytes());
    msg.extend_from_slice(&timestamp.to_be_bytes());
    msg.extend_from_slice(&node_id);
    msg.extend_from_slice(&[0u8; 3]);
    msg.extend_from_slice(&alias_bytes);
    msg.extend_from_slice(&0u16.to_be_bytes());
    msg
}

fn dataset_container(records: &[Vec<u8>]) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    for record in records {
        out.extend_from_slice(&bigsize_encode(record.len() as u64));
        out.extend_from_slice(record);
    }
    out
}

/// S1/S2 style end-to-end: a bidirectional channel with a node
/// announcement, replayed and exported in all four formats.
#[test]
fn replays_a_full_dataset_and_exports_every_format() {
    let alice = node_id(0xA1);
    let bob = node_id(0xB2);
    let channel = scid(100);

    let records = vec![
        wire_channel_announcement(channel, alice, bob),
        wire_channel_update(channel, 1000, 0x00, 1, 10, None),
        wire_channel_update(channel, 1000, 0x01, 2, 20, None),
        wire_node_announcement(alice, 900, "alice"),
    ];
    let bytes = dataset_container(&records);
    let reader = DatasetReader::new(Cursor::new(bytes)).unwrap();

    let mut reducer = Reducer::new(2000, AliasCodec::Utf8);
    for record in reader {
        let raw = record.unwrap();
        let message = lntopo::messages::parse(&raw).unwrap();
        reducer.apply(message).unwrap();
    }
    let snapshot = reducer.finalize().unwrap();

    assert_eq!(snapshot.channels.len(), 2);
    assert_eq!(snapshot.nodes.len(), 2);

    for format in [ExportFormat::Dot, ExportFormat::Gml, ExportFormat::GraphMl, ExportFormat::Json] {
        let rendered = render(&snapshot, format);
        assert!(!rendered.is_empty());
    }

    let json = render(&snapshot, ExportFormat::Json);
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["edges"].as_array().unwrap().len(), 2);
}

/// An update referencing a channel never announced is a hard decode error,
/// not a silent skip -- the reducer should fail the whole replay.
#[test]
fn orphan_update_fails_the_replay() {
    let channel = scid(200);
    let records = vec![wire_channel_update(channel, 1000, 0x00, 1, 1, None)];
    let bytes = dataset_container(&records);
    let reader = DatasetReader::new(Cursor::new(bytes)).unwrap();

    let mut reducer = Reducer::new(2000, AliasCodec::Utf8);
    let mut saw_error = false;
    for record in reader {
        let raw = record.unwrap();
        let message = lntopo::messages::parse(&raw).unwrap();
        if reducer.apply(message).is_err() {
            saw_error = true;
        }
    }
    assert!(saw_error);
}

/// A dataset whose only channel never clears the liveness cutoff yields
/// EmptySnapshot.
#[test]
fn entirely_stale_dataset_yields_empty_snapshot() {
    let alice = node_id(0x01);
    let bob = node_id(0x02);
    let channel = scid(300);
    let target = 30 * 86_400;

    let records = vec![
        wire_channel_announcement(channel, alice, bob),
        wire_channel_update(channel, 0, 0x00, 1, 1, None),
    ];
    let bytes = dataset_container(&records);
    let reader = DatasetReader::new(Cursor::new(bytes)).unwrap();

    let mut reducer = Reducer::new(target, AliasCodec::Utf8);
    for record in reader {
        let raw = record.unwrap();
        let message = lntopo::messages::parse(&raw).unwrap();
        reducer.apply(message).unwrap();
    }
    let err = reducer.finalize().unwrap_err();
    assert!(matches!(err, lntopo::errors::GossipError::EmptySnapshot));
}

/// A node_id trace over a gossip_store-shaped stream of raw messages
/// (container framing is irrelevant to the filter itself).
#[test]
fn trace_filter_follows_a_node_through_a_mixed_stream() {
    let target = node_id(0x10);
    let stranger = node_id(0x20);
    let channel = scid(400);

    let stream = vec![
        wire_channel_announcement(scid(999), stranger, node_id(0x21)),
        wire_channel_announcement(channel, target, stranger),
        wire_channel_update(channel, 1000, 0x00, 1, 1, None),
        wire_node_announcement(target, 1000, "target-node"),
    ];

    let mut filter = lntopo::trace::TraceFilter::new(target);
    let mut emitted = 0;
    for raw in &stream {
        if filter.feed(raw).is_some() {
            emitted += 1;
        }
    }
    // The unrelated announcement is skipped; the other three all touch `target`.
    assert_eq!(emitted, 3);
}
