//! Streaming containers for the two gossip record framings.

pub mod dataset;
pub mod gossip_store;

pub use dataset::DatasetReader;
pub use gossip_store::GossipStoreReader;
