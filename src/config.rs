//! Runtime configuration for the `restore` and `nodes trace` subcommands.

use std::path::PathBuf;

use anyhow::{anyhow, Error};
use chrono::Utc;

use crate::export::ExportFormat;
use crate::recovery::FixMissing;

const DEFAULT_CACHE_FILE: &str = "./data/channels_cache.csv";
const DEFAULT_RECOVERY_URL: &str = "https://1ml.com/channel/{scid}/json";

/// Everything `restore` needs to replay a dataset into a snapshot and
/// export it.
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    pub dataset: PathBuf,
    pub target_timestamp: u32,
    pub format: ExportFormat,
    pub fix_missing: Option<FixMissing>,
    pub cache_file: PathBuf,
    pub recovery_url: String,
}

impl RestoreConfig {
    pub fn new(
        dataset: PathBuf,
        target_timestamp: Option<u32>,
        format: ExportFormat,
        fix_missing: Option<FixMissing>,
    ) -> Result<Self, Error> {
        let target_timestamp = match target_timestamp {
            Some(t) => t,
            None => u32::try_from(Utc::now().timestamp())
                .map_err(|_| anyhow!("system clock is out of the representable range"))?,
        };
        Ok(RestoreConfig {
            dataset,
            target_timestamp,
            format,
            fix_missing,
            cache_file: cache_file_from_env(),
            recovery_url: recovery_url_from_env(),
        })
    }
}

/// Everything `nodes trace` needs to scan a `gossip_store` for one node.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    pub node_id: [u8; 33],
    pub gossip_store: PathBuf,
}

impl TraceConfig {
    pub fn new(node_id_hex: &str, gossip_store: PathBuf) -> Result<Self, Error> {
        let bytes = hex::decode(node_id_hex)?;
        let node_id: [u8; 33] = bytes
            .try_into()
            .map_err(|_| anyhow!("node id must be exactly 33 bytes (66 hex characters)"))?;
        Ok(TraceConfig { node_id, gossip_store })
    }
}

fn cache_file_from_env() -> PathBuf {
    std::env::var("LNTOPO_CACHE_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_FILE))
}

fn recovery_url_from_env() -> String {
    std::env::var("LNTOPO_RECOVERY_URL").unwrap_or_else(|_| DEFAULT_RECOVERY_URL.to_string())
}
