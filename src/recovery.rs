//! Edge recovery: synthesizes the missing direction of a channel from a
//! cached or freshly-fetched policy when only one direction was ever
//! gossiped.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::errors::GossipError;
use crate::scid::{Direction, DirectionalChannelKey, ShortChannelId};
use crate::snapshot::{ChannelState, Snapshot};

/// A single node's routing policy as reported by an LN explorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveredPolicy {
    pub fee_base_msat: Option<u32>,
    pub fee_rate_milli_msat: Option<u32>,
    pub min_htlc: Option<u64>,
    pub time_lock_delta: Option<u16>,
}

impl RecoveredPolicy {
    /// A field counts as unusable if it's missing or falsy (zero), matching
    /// the `all(recovered_data.values())` truthiness check it's grounded on.
    fn is_usable(&self) -> bool {
        self.fee_base_msat.is_some_and(|v| v != 0)
            && self.fee_rate_milli_msat.is_some_and(|v| v != 0)
            && self.min_htlc.is_some_and(|v| v != 0)
            && self.time_lock_delta.is_some_and(|v| v != 0)
    }
}

/// The full explorer response for one (undirected) channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveredChannel {
    pub node1_policy: RecoveredPolicy,
    pub node2_policy: RecoveredPolicy,
}

/// Looks up and persists recovered channel data, independent of whatever
/// storage backs it (a CSV cache plus HTTP fallback in production, a
/// fake in tests).
pub trait RecoverySource {
    fn lookup(&mut self, scid: ShortChannelId) -> Result<Option<RecoveredChannel>, GossipError>;
    fn store(&mut self, scid: ShortChannelId, channel: &RecoveredChannel) -> Result<(), GossipError>;
}

/// CSV-backed cache in front of a blocking HTTP fallback to an LN explorer.
///
/// The cache is read fully into memory on first use and the entire map is
/// rewritten to disk on every `store`, so a crash mid-write never loses
/// previously cached entries.
pub struct HttpRecoverySource {
    cache_path: PathBuf,
    url_template: String,
    cache: Option<HashMap<String, RecoveredChannel>>,
    client: reqwest::blocking::Client,
}

impl HttpRecoverySource {
    pub fn new(cache_path: impl Into<PathBuf>, url_template: impl Into<String>) -> Self {
        HttpRecoverySource {
            cache_path: cache_path.into(),
            url_template: url_template.into(),
            cache: None,
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("building the recovery http client"),
        }
    }

    fn load(&mut self) -> Result<&mut HashMap<String, RecoveredChannel>, GossipError> {
        if self.cache.is_none() {
            self.cache = Some(read_cache(&self.cache_path)?);
        }
        Ok(self.cache.as_mut().unwrap())
    }
}

impl RecoverySource for HttpRecoverySource {
    fn lookup(&mut self, scid: ShortChannelId) -> Result<Option<RecoveredChannel>, GossipError> {
        let key = scid.to_string();
        if let Some(hit) = self.load()?.get(&key) {
            return Ok(Some(hit.clone()));
        }

        let url = self.url_template.replace("{scid}", &scid.as_u64().to_string());
        info!("fetching recovered channel data for {} from {}", scid, url);
        let response = self.client.get(&url).send().map_err(|e| GossipError::RecoveryFailed {
            scid: key.clone(),
            reason: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(GossipError::RecoveryFailed {
                scid: key,
                reason: format!("http status {}", response.status()),
            });
        }
        let channel: RecoveredChannel = response.json().map_err(|e| GossipError::RecoveryFailed {
            scid: scid.to_string(),
            reason: e.to_string(),
        })?;
        self.store(scid, &channel)?;
        Ok(Some(channel))
    }

    fn store(&mut self, scid: ShortChannelId, channel: &RecoveredChannel) -> Result<(), GossipError> {
        let key = scid.to_string();
        let channel = channel.clone();
        self.load()?.insert(key, channel);
        persist_cache(&self.cache_path, self.cache.as_ref().unwrap())
    }
}

fn read_cache(path: &Path) -> Result<HashMap<String, RecoveredChannel>, GossipError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut cache = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| GossipError::CacheCorrupt { line: e.to_string() })?;
        let scid = record.get(0).ok_or_else(|| GossipError::CacheCorrupt {
            line: "missing scid column".to_string(),
        })?;
        let json = record.get(1).ok_or_else(|| GossipError::CacheCorrupt {
            line: format!("missing payload column for {}", scid),
        })?;
        let channel: RecoveredChannel = serde_json::from_str(json).map_err(|e| GossipError::CacheCorrupt {
            line: format!("{}: {}", scid, e),
        })?;
        cache.insert(scid.to_string(), channel);
    }
    Ok(cache)
}

fn persist_cache(path: &Path, cache: &HashMap<String, RecoveredChannel>) -> Result<(), GossipError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("csv.tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        for (scid, channel) in cache {
            let json = serde_json::to_string(channel).expect("serializing a recovered channel");
            writer.write_record([scid.as_str(), json.as_str()])?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// How to handle channels that only ever had one direction gossiped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixMissing {
    /// Synthesize the missing direction from cached/fetched policy data.
    Recover,
    /// Drop the channel entirely rather than leave it one-directional.
    Filter,
}

/// Finds every channel whose opposite direction is absent from the snapshot.
fn find_unmatched(snapshot: &Snapshot) -> Vec<DirectionalChannelKey> {
    let keys: Vec<DirectionalChannelKey> = snapshot
        .channels
        .keys()
        .map(|s| parse_key(s))
        .collect();
    keys.iter()
        .filter(|key| !snapshot.channels.contains_key(&key.opposite().to_string()))
        .cloned()
        .collect()
}

fn parse_key(text: &str) -> DirectionalChannelKey {
    let (scid_text, direction_text) = text.split_once('/').expect("well-formed directional key");
    let scid: ShortChannelId = scid_text.parse().expect("well-formed scid");
    let bit: u8 = direction_text.parse().expect("well-formed direction bit");
    DirectionalChannelKey::new(scid, Direction::from_bit(bit))
}

fn drop_channel(snapshot: &mut Snapshot, key: &DirectionalChannelKey, removed: &mut Vec<ChannelState>) {
    let chan = match snapshot.channels.remove(&key.to_string()) {
        Some(c) => c,
        None => return,
    };
    if let Some(node) = snapshot.nodes.get_mut(&chan.source) {
        node.out_degree = node.out_degree.saturating_sub(1);
    }
    if let Some(node) = snapshot.nodes.get_mut(&chan.destination) {
        node.in_degree = node.in_degree.saturating_sub(1);
    }
    removed.push(chan);
}

/// Applies a `fix_missing` policy to a finalized snapshot, returning the
/// channels that ended up removed. `snapshot.nodes` that drop to zero
/// degree as a result are left in place; a caller that wants isolated
/// nodes dropped again should re-run the snapshot's own node filter.
pub fn fix_missing_edges(
    snapshot: &mut Snapshot,
    policy: FixMissing,
    source: &mut dyn RecoverySource,
) -> Result<Vec<ChannelState>, GossipError> {
    let unmatched = find_unmatched(snapshot);
    let mut removed = Vec::new();

    match policy {
        FixMissing::Filter => {
            for key in &unmatched {
                drop_channel(snapshot, key, &mut removed);
            }
        }
        FixMissing::Recover => {
            for key in &unmatched {
                recover_one(snapshot, key, source, &mut removed)?;
            }
        }
    }

    if !removed.is_empty() {
        warn!("{} channels removed from the graph due to missing edges", removed.len());
    }
    Ok(removed)
}

fn recover_one(
    snapshot: &mut Snapshot,
    key: &DirectionalChannelKey,
    source: &mut dyn RecoverySource,
    removed: &mut Vec<ChannelState>,
) -> Result<(), GossipError> {
    let existing = match snapshot.channels.get(&key.to_string()) {
        Some(c) => c.clone(),
        None => return Ok(()),
    };

    let recovered = source.lookup(key.scid)?.ok_or_else(|| GossipError::RecoveryFailed {
        scid: key.scid.to_string(),
        reason: "explorer had no record of this channel".to_string(),
    })?;

    // We have `key`'s direction; the missing one is its opposite, and its
    // policy comes from the *other* node's published policy.
    let missing_direction = key.direction.opposite();
    let policy = match missing_direction {
        Direction::Forward => &recovered.node1_policy,
        Direction::Reverse => &recovered.node2_policy,
    };

    if !policy.is_usable() {
        drop_channel(snapshot, key, removed);
        return Ok(());
    }

    let reverse_key = key.opposite();
    let reverse_state = ChannelState {
        source: existing.destination.clone(),
        destination: existing.source.clone(),
        features: existing.features.clone(),
        timestamp: existing.timestamp,
        fee_base_msat: policy.fee_base_msat,
        fee_proportional_millionths: policy.fee_rate_milli_msat,
        htlc_minimum_msat: policy.min_htlc,
        htlc_maximum_msat: None,
        cltv_expiry_delta: policy.time_lock_delta,
    };

    if let Some(node) = snapshot.nodes.get_mut(&reverse_state.source) {
        node.out_degree += 1;
    }
    if let Some(node) = snapshot.nodes.get_mut(&reverse_state.destination) {
        node.in_degree += 1;
    }
    snapshot.channels.insert(reverse_key.to_string(), reverse_state);
    Ok(())
}
