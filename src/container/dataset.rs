//! The `GSP1` dataset container: `magic "GSP" | version 0x01 | (BigSize
//! length, length bytes)*`, optionally bzip2-compressed end-to-end.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bzip2::read::BzDecoder;

use crate::errors::GossipError;
use crate::varint::bigsize_decode;

const MAGIC: &[u8; 3] = b"GSP";
const VERSION: u8 = 0x01;

/// A lazy sequence of raw message byte strings read from a `GSP1` container.
pub struct DatasetReader<R> {
    reader: BufReader<R>,
    offset: u64,
}

impl DatasetReader<Box<dyn Read>> {
    /// Opens `path`, transparently decompressing if it ends in `.bz2`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GossipError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let inner: Box<dyn Read> = if path.extension().and_then(|e| e.to_str()) == Some("bz2") {
            Box::new(BzDecoder::new(file))
        } else {
            Box::new(file)
        };
        DatasetReader::new(inner)
    }
}

impl<R: Read> DatasetReader<R> {
    pub fn new(inner: R) -> Result<Self, GossipError> {
        let mut reader = BufReader::with_capacity(64 * 1024, inner);
        let mut header = [0u8; 4];
        reader
            .read_exact(&mut header)
            .map_err(|_| GossipError::TruncatedInput { offset: 0 })?;
        if &header[0..3] != MAGIC || header[3] != VERSION {
            return Err(GossipError::TruncatedInput { offset: 0 });
        }
        Ok(DatasetReader { reader, offset: 4 })
    }
}

impl<R: Read> Iterator for DatasetReader<R> {
    type Item = Result<Vec<u8>, GossipError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record_offset = self.offset;
        let length = match bigsize_decode(&mut self.reader, record_offset) {
            Ok(None) => return None,
            Ok(Some(length)) => length,
            Err(e) => return Some(Err(e)),
        };

        let mut msg = vec![0u8; length as usize];
        if let Err(e) = self.reader.read_exact(&mut msg) {
            return Some(Err(if e.kind() == std::io::ErrorKind::UnexpectedEof {
                GossipError::TruncatedInput { offset: record_offset }
            } else {
                GossipError::Io(e)
            }));
        }

        self.offset += bigsize_width(length) as u64 + length;
        Some(Ok(msg))
    }
}

fn bigsize_width(length: u64) -> usize {
    match length {
        n if n < 0xFD => 1,
        n if n <= 0xFFFF => 3,
        n if n <= 0xFFFF_FFFF => 5,
        _ => 9,
    }
}
