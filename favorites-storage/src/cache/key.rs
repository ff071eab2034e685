//! Byte layouts for the LMDB cache databases.
//!
//! The ordered index is kept as two databases: `index` maps an asset id to
//! its score, and `by_score` holds one empty-valued key per member whose
//! bytes sort in score order. Blobs carry an expiry prefix.

use favorites_core::{AssetId, Score};

/// Width of the encoded score prefix and of the blob expiry prefix.
const PREFIX_LEN: usize = 8;

/// Map an `f64` onto a `u64` whose big-endian bytes sort like the float.
fn sortable_bits(score: Score) -> u64 {
    let bits = score.to_bits();
    if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

fn from_sortable_bits(bits: u64) -> Score {
    if bits & (1 << 63) != 0 {
        Score::from_bits(bits & !(1 << 63))
    } else {
        Score::from_bits(!bits)
    }
}

/// Key of a `by_score` entry.
///
/// # Binary Format
///
/// - Bytes 0-7: score, sign-flipped big-endian so byte order is numeric order
/// - Bytes 8..: asset id as UTF-8
///
/// Equal scores fall back to id byte order, so a reverse scan yields the
/// highest score first and, within a score, the greatest id first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreKey {
    score: Score,
    id: AssetId,
}

impl ScoreKey {
    pub fn new(score: Score, id: impl Into<AssetId>) -> Self {
        Self {
            score,
            id: id.into(),
        }
    }

    pub fn score(&self) -> Score {
        self.score
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn into_id(self) -> AssetId {
        self.id
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PREFIX_LEN + self.id.len());
        bytes.extend_from_slice(&sortable_bits(self.score).to_be_bytes());
        bytes.extend_from_slice(self.id.as_bytes());
        bytes
    }

    /// Returns `None` when the prefix is short or the id is not UTF-8.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < PREFIX_LEN {
            return None;
        }
        let (prefix, id) = bytes.split_at(PREFIX_LEN);
        let bits = u64::from_be_bytes(prefix.try_into().ok()?);
        let id = std::str::from_utf8(id).ok()?;
        Some(Self::new(from_sortable_bits(bits), id))
    }
}

/// Encode a score value for the `index` database.
pub fn encode_score(score: Score) -> [u8; PREFIX_LEN] {
    score.to_le_bytes()
}

pub fn decode_score(bytes: &[u8]) -> Option<Score> {
    Some(Score::from_le_bytes(bytes.try_into().ok()?))
}

/// Frame a blob payload as `[expires_at millis: 8 bytes LE][payload]`.
pub fn frame_blob(expires_at_millis: i64, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(PREFIX_LEN + payload.len());
    bytes.extend_from_slice(&expires_at_millis.to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// Split a framed blob into its expiry and payload.
pub fn unframe_blob(bytes: &[u8]) -> Option<(i64, &[u8])> {
    if bytes.len() < PREFIX_LEN {
        return None;
    }
    let (prefix, payload) = bytes.split_at(PREFIX_LEN);
    Some((i64::from_le_bytes(prefix.try_into().ok()?), payload))
}
