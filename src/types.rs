use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Global vertex id, unique and dense across the whole cluster.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Gvid(pub u32);

/// Global edge id. Under canonical edge numbering this is only meaningful
/// within the process that produced it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Geid(pub u32);

/// Local vertex id, dense in `[0, |V_local|)` within one fragment.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Lvid(pub u32);

/// Local edge id, dense in `[0, |E_local|)` within one fragment.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct Leid(pub u32);

/// Process rank in `[0, N)` for a fixed group of `N` peers.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct ProcId(pub u16);

/// Opaque per-vertex color assigned by an external coloring pass or by
/// [`crate::store::LocalStore::compute_coloring`].
pub type VertexColor = u32;

impl fmt::Display for Gvid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Geid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ProcId {
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl Lvid {
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl Leid {
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Bounds required of vertex and edge payload types.
///
/// Payloads are copied by value through the RPC boundary, so they must be
/// serializable; `Default` covers pre-sized record arrays at construction.
pub trait GraphData:
    Clone + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> GraphData for T where
    T: Clone + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

const MODIFIED_BIT: u64 = 1 << 63;
const SNAPSHOT_BIT: u64 = 1 << 62;
const VERSION_MASK: u64 = (1 << 62) - 1;

/// Packed per-object metadata word: a `modified` flag, a `snapshot_made`
/// flag, and a 62-bit monotone version counter.
///
/// Any version change invalidates the snapshot flag, so the two are always
/// updated through the same word.
#[derive(Copy, Clone, Default, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct VersionTag(u64);

impl VersionTag {
    pub fn version(self) -> u64 {
        self.0 & VERSION_MASK
    }

    /// Sets the version counter. Clears `snapshot_made`.
    pub fn assign_version(&mut self, version: u64) {
        self.0 = (self.0 & MODIFIED_BIT) | (version & VERSION_MASK);
    }

    /// Increments the version counter. Clears `snapshot_made`.
    pub fn increment_version(&mut self) {
        let next = (self.version() + 1) & VERSION_MASK;
        self.0 = (self.0 & MODIFIED_BIT) | next;
    }

    pub fn modified(self) -> bool {
        self.0 & MODIFIED_BIT != 0
    }

    pub fn set_modified(&mut self, modified: bool) {
        if modified {
            self.0 |= MODIFIED_BIT;
        } else {
            self.0 &= !MODIFIED_BIT;
        }
    }

    pub fn snapshot_made(self) -> bool {
        self.0 & SNAPSHOT_BIT != 0
    }

    pub fn set_snapshot_made(&mut self, snapshot_made: bool) {
        if snapshot_made {
            self.0 |= SNAPSHOT_BIT;
        } else {
            self.0 &= !SNAPSHOT_BIT;
        }
    }

    /// One-byte flag encoding used by the packed data files: bit 0 is
    /// `modified`, bit 1 is `snapshot_made`.
    pub fn flags_byte(self) -> u8 {
        (self.modified() as u8) | ((self.snapshot_made() as u8) << 1)
    }

    pub fn from_parts(flags: u8, version: u64) -> Self {
        let mut tag = VersionTag(version & VERSION_MASK);
        tag.set_modified(flags & 0x01 != 0);
        tag.set_snapshot_made(flags & 0x02 != 0);
        tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_starts_clean() {
        let tag = VersionTag::default();
        assert_eq!(tag.version(), 0);
        assert!(!tag.modified());
        assert!(!tag.snapshot_made());
    }

    #[test]
    fn version_change_clears_snapshot() {
        let mut tag = VersionTag::default();
        tag.set_snapshot_made(true);
        tag.increment_version();
        assert!(!tag.snapshot_made());
        assert_eq!(tag.version(), 1);

        tag.set_snapshot_made(true);
        tag.assign_version(41);
        assert!(!tag.snapshot_made());
        assert_eq!(tag.version(), 41);
    }

    #[test]
    fn modified_survives_version_changes() {
        let mut tag = VersionTag::default();
        tag.set_modified(true);
        tag.assign_version(7);
        tag.increment_version();
        assert!(tag.modified());
        assert_eq!(tag.version(), 8);
    }

    #[test]
    fn flags_byte_roundtrip() {
        let mut tag = VersionTag::default();
        tag.assign_version(123_456);
        tag.set_modified(true);
        tag.set_snapshot_made(true);
        let rebuilt = VersionTag::from_parts(tag.flags_byte(), tag.version());
        assert_eq!(rebuilt, tag);
    }

    #[test]
    fn version_is_masked_to_62_bits() {
        let mut tag = VersionTag::default();
        tag.set_modified(true);
        tag.assign_version(u64::MAX);
        assert_eq!(tag.version(), (1u64 << 62) - 1);
        assert!(tag.modified());
    }
}
