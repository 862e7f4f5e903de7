//! Short channel ids: packed `block x tx_index x output_index` identifiers.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::Serialize;

/// A Lightning short channel id, packed as `block << 40 | tx_index << 16 | output_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct ShortChannelId(u64);

impl From<ShortChannelId> for String {
    fn from(scid: ShortChannelId) -> String {
        scid.to_string()
    }
}

impl ShortChannelId {
    pub fn from_parts(block: u32, tx_index: u32, output_index: u16) -> Self {
        ShortChannelId(
            (u64::from(block) << 40) | (u64::from(tx_index) << 16) | u64::from(output_index),
        )
    }

    pub fn from_u64(v: u64) -> Self {
        ShortChannelId(v)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn block(&self) -> u32 {
        ((self.0 >> 40) & 0xFF_FFFF) as u32
    }

    pub fn tx_index(&self) -> u32 {
        ((self.0 >> 16) & 0xFF_FFFF) as u32
    }

    pub fn output_index(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Display for ShortChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{}x{}",
            self.block(),
            self.tx_index(),
            self.output_index()
        )
    }
}

impl FromStr for ShortChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut parts = s.split('x');
        let block: u32 = parts
            .next()
            .ok_or_else(|| anyhow!("malformed scid: {}", s))?
            .parse()?;
        let tx_index: u32 = parts
            .next()
            .ok_or_else(|| anyhow!("malformed scid: {}", s))?
            .parse()?;
        let output_index: u16 = parts
            .next()
            .ok_or_else(|| anyhow!("malformed scid: {}", s))?
            .parse()?;
        if parts.next().is_some() {
            return Err(anyhow!("malformed scid: {}", s));
        }
        Ok(ShortChannelId::from_parts(block, tx_index, output_index))
    }
}

/// The two orientations of a channel relative to the announced node ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum Direction {
    /// `node_ids[0] -> node_ids[1]`
    Forward,
    /// `node_ids[1] -> node_ids[0]`
    Reverse,
}

impl Direction {
    pub fn from_bit(bit: u8) -> Self {
        if bit & 0x01 == 0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    pub fn as_bit(&self) -> u8 {
        match self {
            Direction::Forward => 0,
            Direction::Reverse => 1,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_bit())
    }
}

impl From<Direction> for u8 {
    fn from(d: Direction) -> u8 {
        d.as_bit()
    }
}

/// `"<scid>/<direction>"`, used as the primary key into the channel map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectionalChannelKey {
    pub scid: ShortChannelId,
    pub direction: Direction,
}

impl DirectionalChannelKey {
    pub fn new(scid: ShortChannelId, direction: Direction) -> Self {
        DirectionalChannelKey { scid, direction }
    }

    pub fn opposite(&self) -> Self {
        DirectionalChannelKey {
            scid: self.scid,
            direction: self.direction.opposite(),
        }
    }
}

impl fmt::Display for DirectionalChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.scid, self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scid_round_trips_through_text() {
        for &(block, tx, out) in &[(0u32, 0u32, 0u16), (1, 1, 1), (0xFF_FFFF, 0xFF_FFFF, 0xFFFF)] {
            let scid = ShortChannelId::from_parts(block, tx, out);
            let text = scid.to_string();
            let parsed: ShortChannelId = text.parse().unwrap();
            assert_eq!(scid.as_u64(), parsed.as_u64());
        }
    }

    #[test]
    fn scid_u64_round_trips_via_text() {
        for s in [0u64, 1, u64::MAX, 0x0000_0100_0000_0001, 0x00FF_FFFF_FFFF_FFFF] {
            let scid = ShortChannelId::from_u64(s);
            let text = scid.to_string();
            let parsed: ShortChannelId = text.parse().unwrap();
            assert_eq!(scid.as_u64(), parsed.as_u64());
        }
    }

    #[test]
    fn scid_packs_fields_big_endian_style() {
        let scid = ShortChannelId::from_parts(1, 2, 3);
        assert_eq!(scid.as_u64(), (1u64 << 40) | (2u64 << 16) | 3u64);
        assert_eq!(scid.to_string(), "1x2x3");
    }

    #[test]
    fn direction_bit_round_trips() {
        assert_eq!(Direction::from_bit(0).as_bit(), 0);
        assert_eq!(Direction::from_bit(1).as_bit(), 1);
        assert_eq!(Direction::from_bit(0).opposite().as_bit(), 1);
    }

    #[test]
    fn directional_key_text_form() {
        let key = DirectionalChannelKey::new(ShortChannelId::from_parts(1, 2, 3), Direction::Forward);
        assert_eq!(key.to_string(), "1x2x3/0");
    }
}
