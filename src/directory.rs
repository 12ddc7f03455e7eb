//! Caching distributed hash table mapping global ids to owning processes.
//!
//! Each key has a home bucket at `hash(key) % N`; the owner writes the
//! authoritative entry there once, during fragment construction. Ownership
//! never changes afterwards, so cached entries never expire: a lookup can
//! only be wrong by answering "unknown" for a key that was never set.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};

use crate::error::{FragmentError, Result};
use crate::rpc::{decode, encode, MeshEndpoint, RpcHandle, RpcObject};
use crate::types::ProcId;

mod op {
    pub const SET: u16 = 0;
    pub const GET: u16 = 1;
}

/// One ownership namespace (vertices and edges each get their own
/// instance).
pub struct OwnerDirectory {
    rpc: RpcHandle,
    /// Authoritative entries whose home bucket is this process.
    shard: RwLock<FxHashMap<u32, ProcId>>,
    /// Read-through cache of entries homed elsewhere.
    cache: RwLock<FxHashMap<u32, ProcId>>,
}

impl OwnerDirectory {
    /// Creates and registers one directory instance. Must be called in the
    /// same order on every process so the instances pair up.
    pub fn register(endpoint: &Arc<MeshEndpoint>) -> Arc<Self> {
        MeshEndpoint::register_with(endpoint, |rpc| Self {
            rpc,
            shard: RwLock::new(FxHashMap::default()),
            cache: RwLock::new(FxHashMap::default()),
        })
    }

    fn home(&self, key: u32) -> ProcId {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        ProcId((hasher.finish() % self.rpc.num_procs() as u64) as u16)
    }

    /// Authoritative write; only the owner of `key` may call this, and only
    /// during construction.
    pub fn set(&self, key: u32, owner: ProcId) -> Result<()> {
        self.cache.write().insert(key, owner);
        let home = self.home(key);
        if home == self.rpc.proc_id() {
            self.shard.write().insert(key, owner);
            Ok(())
        } else {
            self.rpc.remote_call(home, op::SET, &(key, owner))
        }
    }

    /// Resolves `key` to its owner, consulting local tables first and the
    /// home bucket on a miss. `None` means the key was never set.
    pub fn get_cached(&self, key: u32) -> Result<Option<ProcId>> {
        if let Some(&owner) = self.shard.read().get(&key) {
            return Ok(Some(owner));
        }
        if let Some(&owner) = self.cache.read().get(&key) {
            return Ok(Some(owner));
        }
        let home = self.home(key);
        if home == self.rpc.proc_id() {
            // We are the home bucket; an absent entry is authoritative.
            return Ok(None);
        }
        let fetched: Option<ProcId> = self.rpc.remote_request(home, op::GET, &key)?;
        if let Some(owner) = fetched {
            self.cache.write().insert(key, owner);
        }
        Ok(fetched)
    }

    /// Resolves `key` or fails; routing a request for an id nobody owns is a
    /// protocol bug.
    pub fn owner_of(&self, key: u32) -> Result<ProcId> {
        self.get_cached(key)?
            .ok_or(FragmentError::OwnerUnknown(key))
    }
}

impl RpcObject for OwnerDirectory {
    fn dispatch(&self, _from: ProcId, method: u16, payload: &[u8]) -> Result<Vec<u8>> {
        match method {
            op::SET => {
                let (key, owner): (u32, ProcId) = decode(payload)?;
                self.shard.write().insert(key, owner);
                Ok(Vec::new())
            }
            op::GET => {
                let key: u32 = decode(payload)?;
                let owner = self.shard.read().get(&key).copied();
                encode(&owner)
            }
            _ => Err(FragmentError::Transport("unknown directory method")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::Mesh;
    use std::thread;

    fn cluster(n: usize) -> (Vec<Arc<MeshEndpoint>>, Vec<Arc<OwnerDirectory>>) {
        let endpoints = Mesh::create(n);
        let dirs = endpoints.iter().map(OwnerDirectory::register).collect();
        (endpoints, dirs)
    }

    fn barrier_all(endpoints: &[Arc<MeshEndpoint>]) {
        let handles: Vec<_> = endpoints
            .iter()
            .map(|ep| {
                let ep = Arc::clone(ep);
                thread::spawn(move || ep.comm_barrier())
            })
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
    }

    #[test]
    fn single_process_set_get() {
        let (_endpoints, dirs) = cluster(1);
        dirs[0].set(7, ProcId(0)).unwrap();
        assert_eq!(dirs[0].get_cached(7).unwrap(), Some(ProcId(0)));
        assert_eq!(dirs[0].get_cached(8).unwrap(), None);
    }

    #[test]
    fn entries_visible_from_every_process() {
        let (endpoints, dirs) = cluster(3);
        for key in 0..32u32 {
            let owner = ProcId((key % 3) as u16);
            dirs[owner.idx()].set(key, owner).unwrap();
        }
        barrier_all(&endpoints);
        for dir in &dirs {
            for key in 0..32u32 {
                let expected = ProcId((key % 3) as u16);
                assert_eq!(dir.get_cached(key).unwrap(), Some(expected));
            }
        }
    }

    #[test]
    fn unset_key_is_unknown_everywhere() {
        let (endpoints, dirs) = cluster(2);
        barrier_all(&endpoints);
        for dir in &dirs {
            assert_eq!(dir.get_cached(999).unwrap(), None);
            assert!(matches!(
                dir.owner_of(999),
                Err(FragmentError::OwnerUnknown(999))
            ));
        }
    }

    #[test]
    fn lookups_populate_the_cache() {
        let (endpoints, dirs) = cluster(2);
        dirs[0].set(5, ProcId(0)).unwrap();
        barrier_all(&endpoints);

        let before = endpoints[1].stats().requests_sent;
        assert_eq!(dirs[1].get_cached(5).unwrap(), Some(ProcId(0)));
        let after_first = endpoints[1].stats().requests_sent;
        assert_eq!(dirs[1].get_cached(5).unwrap(), Some(ProcId(0)));
        let after_second = endpoints[1].stats().requests_sent;

        // The second lookup must be served from the cache.
        assert!(after_first >= before);
        assert_eq!(after_second, after_first);
    }
}
