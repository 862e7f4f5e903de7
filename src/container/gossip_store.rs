//! The `gossip_store` container used by Core Lightning nodes: a 1-byte
//! version header followed by `(u32 length_and_flags, u32 crc, [crc2],
//! body)` records.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::errors::GossipError;

const DELETED_FLAG: u32 = 0x8000_0000;
const IMPORTANT_FLAG: u32 = 0x4000_0000;
const LENGTH_MASK: u32 = !(DELETED_FLAG | IMPORTANT_FLAG);

const PADDING_TYPE_RANGE: [u16; 3] = [4096, 4097, 4098];

/// A lazy sequence of raw message byte strings read from a `gossip_store`
/// file.
pub struct GossipStoreReader<R> {
    reader: BufReader<R>,
    version: u8,
}

impl GossipStoreReader<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GossipError> {
        GossipStoreReader::new(File::open(path)?)
    }
}

impl<R: Read> GossipStoreReader<R> {
    pub fn new(inner: R) -> Result<Self, GossipError> {
        let mut reader = BufReader::with_capacity(64 * 1024, inner);
        let mut version_byte = [0u8; 1];
        reader
            .read_exact(&mut version_byte)
            .map_err(|_| GossipError::TruncatedInput { offset: 0 })?;
        Ok(GossipStoreReader {
            reader,
            version: version_byte[0],
        })
    }
}

impl<R: Read> Iterator for GossipStoreReader<R> {
    type Item = Result<Vec<u8>, GossipError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut length_and_flags_buf = [0u8; 4];
        match self.reader.read(&mut length_and_flags_buf) {
            Ok(0) => return None,
            Ok(n) if n < 4 => {
                return Some(Err(GossipError::TruncatedInput { offset: 0 }));
            }
            Ok(_) => {}
            Err(e) => return Some(Err(GossipError::Io(e))),
        }
        let length_and_flags = u32::from_be_bytes(length_and_flags_buf);
        let length = (length_and_flags & LENGTH_MASK) as usize;

        let mut crc_buf = [0u8; 4];
        if let Err(e) = self.reader.read_exact(&mut crc_buf) {
            return Some(Err(eof_to_truncated(e)));
        }

        if self.version > 3 {
            let mut crc2_buf = [0u8; 4];
            if let Err(e) = self.reader.read_exact(&mut crc2_buf) {
                return Some(Err(eof_to_truncated(e)));
            }
        }

        let mut body = vec![0u8; length];
        if let Err(e) = self.reader.read_exact(&mut body) {
            return Some(Err(eof_to_truncated(e)));
        }

        if self.version <= 3 && body.len() >= 2 {
            let msg_type = u16::from_be_bytes([body[0], body[1]]);
            if PADDING_TYPE_RANGE.contains(&msg_type) && body.len() >= 4 {
                body.drain(0..4);
            }
        }

        Some(Ok(body))
    }
}

fn eof_to_truncated(e: std::io::Error) -> GossipError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        GossipError::TruncatedInput { offset: 0 }
    } else {
        GossipError::Io(e)
    }
}
