pub mod address;
pub mod config;
pub mod container;
pub mod errors;
pub mod export;
pub mod messages;
pub mod recovery;
pub mod scid;
pub mod snapshot;
pub mod trace;
pub mod varint;

pub use container::{DatasetReader, GossipStoreReader};
pub use errors::GossipError;
pub use messages::GossipMessage;
pub use scid::{Direction, DirectionalChannelKey, ShortChannelId};
pub use snapshot::{AliasCodec, Reducer, Snapshot};
