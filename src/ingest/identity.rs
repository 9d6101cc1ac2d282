// src/ingest/identity.rs
//! Stable, time-correlated identifiers for stored items.
//!
//! A `StableId` is 12 bytes: big-endian epoch seconds (4 bytes) followed by an
//! 8-byte digest of the item's origin key. Byte-wise ordering therefore tracks
//! publish time first, which lets the store paginate by id alone.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

pub const STABLE_ID_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StableId([u8; STABLE_ID_LEN]);

impl StableId {
    pub const fn from_bytes(bytes: [u8; STABLE_ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_parts(epoch_secs: u32, digest: u64) -> Self {
        let mut b = [0u8; STABLE_ID_LEN];
        b[..4].copy_from_slice(&epoch_secs.to_be_bytes());
        b[4..].copy_from_slice(&digest.to_be_bytes());
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; STABLE_ID_LEN] {
        &self.0
    }

    pub fn epoch_secs(&self) -> u32 {
        let mut t = [0u8; 4];
        t.copy_from_slice(&self.0[..4]);
        u32::from_be_bytes(t)
    }

    pub fn digest(&self) -> u64 {
        let mut d = [0u8; 8];
        d.copy_from_slice(&self.0[4..]);
        u64::from_be_bytes(d)
    }

    /// Same time prefix, digest bumped by one. Used to step around a taken id.
    pub fn next_in_second(&self) -> Self {
        Self::from_parts(self.epoch_secs(), self.digest().wrapping_add(1))
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(STABLE_ID_LEN * 2);
        for b in self.0.iter() {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StableIdParseError {
    #[error("expected {expected} hex chars, got {got}")]
    BadLength { expected: usize, got: usize },
    #[error("not a hex string")]
    NotHex,
}

impl FromStr for StableId {
    type Err = StableIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != STABLE_ID_LEN * 2 {
            return Err(StableIdParseError::BadLength {
                expected: STABLE_ID_LEN * 2,
                got: s.len(),
            });
        }
        if !s.bytes().all(|c| c.is_ascii_hexdigit()) {
            return Err(StableIdParseError::NotHex);
        }
        let mut b = [0u8; STABLE_ID_LEN];
        for (i, slot) in b.iter_mut().enumerate() {
            *slot = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| StableIdParseError::NotHex)?;
        }
        Ok(Self(b))
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for StableId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for StableId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Derives the id an origin item is stored under. Pure; no side effects.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, source_name: &str, source_id: &str, epoch_secs: i64) -> StableId;
}

/// Time prefix + truncated SHA-256 of the origin key.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeDigestResolver;

impl IdentityResolver for TimeDigestResolver {
    fn resolve(&self, source_name: &str, source_id: &str, epoch_secs: i64) -> StableId {
        let secs = epoch_secs.clamp(0, u32::MAX as i64) as u32;
        let mut hasher = Sha256::new();
        hasher.update(source_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(source_id.as_bytes());
        let digest = hasher.finalize();
        let mut d = [0u8; 8];
        d.copy_from_slice(&digest[..8]);
        StableId::from_parts(secs, u64::from_be_bytes(d))
    }
}
