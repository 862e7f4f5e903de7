use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::info;

use lntopo::config::{RestoreConfig, TraceConfig};
use lntopo::container::{DatasetReader, GossipStoreReader};
use lntopo::export::{self, ExportFormat};
use lntopo::messages::{self, GossipMessage};
use lntopo::recovery::{fix_missing_edges, FixMissing, HttpRecoverySource};
use lntopo::snapshot::{AliasCodec, Reducer};
use lntopo::trace::TraceFilter;

mod cli;

use cli::{Cli, Command, MessagesCommand, NodesCommand};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Restore { dataset, timestamp, fmt, fix_missing } => {
            let fix_missing = fix_missing.as_deref().map(parse_fix_missing).transpose()?;
            let format: ExportFormat = fmt.parse()?;
            let config = RestoreConfig::new(dataset, timestamp, format, fix_missing)?;
            restore(config)
        }
        Command::Nodes { command: NodesCommand::Trace { node_id, gossip_store } } => {
            let config = TraceConfig::new(&node_id, gossip_store)?;
            trace(config)
        }
        Command::Messages { command: MessagesCommand::Parse { hex: hex_msg } } => parse_message(&hex_msg),
    }
}

fn parse_fix_missing(s: &str) -> Result<FixMissing> {
    match s.to_ascii_lowercase().as_str() {
        "recover" => Ok(FixMissing::Recover),
        "filter" => Ok(FixMissing::Filter),
        other => Err(anyhow!("unknown --fix-missing policy '{}' (expected recover or filter)", other)),
    }
}

fn restore(config: RestoreConfig) -> Result<()> {
    info!("restoring {} to timestamp {}", config.dataset.display(), config.target_timestamp);
    let reader = DatasetReader::open(&config.dataset)
        .with_context(|| format!("opening dataset {}", config.dataset.display()))?;

    let alias_codec = match config.format {
        ExportFormat::Dot => AliasCodec::Utf8,
        ExportFormat::Gml | ExportFormat::GraphMl | ExportFormat::Json => AliasCodec::Ascii,
    };
    let mut reducer = Reducer::new(config.target_timestamp, alias_codec);
    for record in reader {
        let raw = record?;
        let message = messages::parse(&raw)?;
        reducer.apply(message)?;
    }
    let mut snapshot = reducer.finalize()?;

    if let Some(policy) = config.fix_missing {
        let mut source = HttpRecoverySource::new(config.cache_file.clone(), config.recovery_url.clone());
        let removed = fix_missing_edges(&mut snapshot, policy, &mut source)?;
        if !removed.is_empty() {
            eprintln!("WARNING: {} channels were removed from the graph due to missing edges", removed.len());
        }
        snapshot.nodes.retain(|_, n| n.in_degree > 0 || n.out_degree > 0);
    }

    println!("{}", export::render(&snapshot, config.format));
    Ok(())
}

fn trace(config: TraceConfig) -> Result<()> {
    let reader = GossipStoreReader::open(&config.gossip_store)
        .with_context(|| format!("opening gossip_store {}", config.gossip_store.display()))?;

    let mut filter = TraceFilter::new(config.node_id);
    for record in reader {
        let raw = record?;
        if let Some(traced) = filter.feed(&raw) {
            println!("{}", serde_json::to_string(&traced)?);
        }
    }
    Ok(())
}

fn parse_message(hex_msg: &str) -> Result<()> {
    let bytes = hex::decode(hex_msg).context("decoding message as hex")?;
    match messages::parse(&bytes)? {
        Some(GossipMessage::ChannelAnnouncement(ann)) => println!("{}", serde_json::to_string(&ann)?),
        Some(GossipMessage::ChannelUpdate(update)) => println!("{}", serde_json::to_string(&update)?),
        Some(GossipMessage::NodeAnnouncement(node)) => println!("{}", serde_json::to_string(&node)?),
        None => println!("null"),
    }
    Ok(())
}
