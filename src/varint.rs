//! BigSize: Lightning's variable-length integer encoding, used by the GSP1
//! dataset container to prefix each record's length.

use std::io::{self, Read};

use crate::errors::GossipError;

const SINGLE_MAX: u8 = 0xFD;
const U16_PREFIX: u8 = 0xFD;
const U32_PREFIX: u8 = 0xFE;
const U64_PREFIX: u8 = 0xFF;

/// Reads one BigSize value from `r`.
///
/// Returns `Ok(None)` if the stream ended cleanly before the first byte of
/// the value (a valid record-boundary EOF). Any other truncation -- EOF
/// after the prefix byte but before the width it promises -- is a decode
/// error.
pub fn bigsize_decode(r: &mut impl Read, offset: u64) -> Result<Option<u64>, GossipError> {
    let mut prefix = [0u8; 1];
    match r.read(&mut prefix) {
        Ok(0) => return Ok(None),
        Ok(_) => {}
        Err(e) => return Err(io_to_truncated(e, offset)),
    }

    let value = match prefix[0] {
        p if p < SINGLE_MAX => u64::from(p),
        U16_PREFIX => {
            let mut buf = [0u8; 2];
            r.read_exact(&mut buf)
                .map_err(|e| io_to_truncated(e, offset))?;
            u64::from(u16::from_be_bytes(buf))
        }
        U32_PREFIX => {
            let mut buf = [0u8; 4];
            r.read_exact(&mut buf)
                .map_err(|e| io_to_truncated(e, offset))?;
            u64::from(u32::from_be_bytes(buf))
        }
        U64_PREFIX => {
            let mut buf = [0u8; 8];
            r.read_exact(&mut buf)
                .map_err(|e| io_to_truncated(e, offset))?;
            u64::from_be_bytes(buf)
        }
        _ => unreachable!("all byte values are covered by the three arms above"),
    };

    Ok(Some(value))
}

fn io_to_truncated(e: io::Error, offset: u64) -> GossipError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        GossipError::TruncatedInput { offset }
    } else {
        GossipError::Io(e)
    }
}

/// Encodes `n` using the narrowest BigSize representation. Only used by
/// tests to check the round-trip property; the dataset container is
/// read-only from this crate's perspective.
pub fn bigsize_encode(n: u64) -> Vec<u8> {
    if n < u64::from(SINGLE_MAX) {
        vec![n as u8]
    } else if n <= u64::from(u16::MAX) {
        let mut out = vec![U16_PREFIX];
        out.extend_from_slice(&(n as u16).to_be_bytes());
        out
    } else if n <= u64::from(u32::MAX) {
        let mut out = vec![U32_PREFIX];
        out.extend_from_slice(&(n as u32).to_be_bytes());
        out
    } else {
        let mut out = vec![U64_PREFIX];
        out.extend_from_slice(&n.to_be_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_across_every_width() {
        for &n in &[0u64, 1, 0xFC, 0xFD, 0xFFFF, 0x1_0000, 0xFFFF_FFFF, 0x1_0000_0000, u64::MAX] {
            let encoded = bigsize_encode(n);
            let mut cursor = Cursor::new(encoded.clone());
            let decoded = bigsize_decode(&mut cursor, 0).unwrap().unwrap();
            assert_eq!(decoded, n, "round trip failed for {}", n);

            let expected_len = match n {
                n if n < 0xFD => 1,
                n if n <= 0xFFFF => 3,
                n if n <= 0xFFFF_FFFF => 5,
                _ => 9,
            };
            assert_eq!(encoded.len(), expected_len, "width mismatch for {}", n);
        }
    }

    #[test]
    fn clean_eof_at_record_boundary_is_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(bigsize_decode(&mut cursor, 0).unwrap().is_none());
    }

    #[test]
    fn truncated_mid_number_is_an_error() {
        // 0xFD promises two more bytes but only one follows.
        let mut cursor = Cursor::new(vec![0xFDu8, 0x01]);
        let err = bigsize_decode(&mut cursor, 42).unwrap_err();
        match err {
            GossipError::TruncatedInput { offset } => assert_eq!(offset, 42),
            other => panic!("expected TruncatedInput, got {:?}", other),
        }
    }
}
