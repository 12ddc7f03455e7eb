//! Local storage for one process's fragment of the distributed graph.
//!
//! The store holds dense, local-id indexed arrays of vertex and edge
//! records plus the adjacency structure connecting them. It knows nothing
//! about global ids or ownership; that mapping lives one level up in the
//! fragment.

mod persist;

pub use persist::{edge_file_name, vertex_file_name};

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use smallvec::SmallVec;

use crate::error::{FragmentError, Result};
use crate::types::{GraphData, Leid, Lvid, VersionTag, VertexColor};

const INVALID_LVID: Lvid = Lvid(u32::MAX);

type AdjacencyList = SmallVec<[Leid; 4]>;

/// A payload record together with its packed version word.
#[derive(Debug, Default)]
struct Slot<T> {
    data: T,
    tag: VersionTag,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Endpoints {
    src: Lvid,
    dst: Lvid,
}

/// Dense local store for `|V_local|` vertices and `|E_local|` edges.
///
/// Structural operations (`add_edge`, `finalize`) require exclusive access
/// and happen once at construction. Data operations take the per-record
/// lock and are safe from any thread.
pub struct LocalStore<V, E> {
    vertices: Vec<RwLock<Slot<V>>>,
    edges: Vec<RwLock<Slot<E>>>,
    endpoints: Vec<Endpoints>,
    in_edges: Vec<AdjacencyList>,
    out_edges: Vec<AdjacencyList>,
    colors: Vec<AtomicU32>,
    finalized: bool,
}

impl<V: GraphData, E: GraphData> LocalStore<V, E> {
    pub fn new(num_vertices: usize, num_edges: usize) -> Self {
        Self {
            vertices: (0..num_vertices).map(|_| RwLock::new(Slot::default())).collect(),
            edges: (0..num_edges).map(|_| RwLock::new(Slot::default())).collect(),
            endpoints: vec![
                Endpoints {
                    src: INVALID_LVID,
                    dst: INVALID_LVID,
                };
                num_edges
            ],
            in_edges: vec![AdjacencyList::new(); num_vertices],
            out_edges: vec![AdjacencyList::new(); num_vertices],
            colors: (0..num_vertices).map(|_| AtomicU32::new(0)).collect(),
            finalized: true,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    fn check_vertex(&self, v: Lvid) -> Result<usize> {
        if v.idx() < self.vertices.len() {
            Ok(v.idx())
        } else {
            Err(FragmentError::IndexOutOfRange("local vertex id"))
        }
    }

    fn check_edge(&self, e: Leid) -> Result<usize> {
        if e.idx() < self.edges.len() {
            Ok(e.idx())
        } else {
            Err(FragmentError::IndexOutOfRange("local edge id"))
        }
    }

    pub fn num_in_neighbors(&self, v: Lvid) -> Result<usize> {
        Ok(self.in_edges[self.check_vertex(v)?].len())
    }

    pub fn num_out_neighbors(&self, v: Lvid) -> Result<usize> {
        Ok(self.out_edges[self.check_vertex(v)?].len())
    }

    pub fn in_edge_ids(&self, v: Lvid) -> Result<&[Leid]> {
        Ok(&self.in_edges[self.check_vertex(v)?])
    }

    pub fn out_edge_ids(&self, v: Lvid) -> Result<&[Leid]> {
        Ok(&self.out_edges[self.check_vertex(v)?])
    }

    pub fn source(&self, e: Leid) -> Result<Lvid> {
        Ok(self.endpoints[self.check_edge(e)?].src)
    }

    pub fn target(&self, e: Leid) -> Result<Lvid> {
        Ok(self.endpoints[self.check_edge(e)?].dst)
    }

    /// Connects `src -> dst` under edge id `e`. Both adjacency lists grow
    /// and the store becomes un-finalized until [`LocalStore::finalize`]
    /// restores the sorted order.
    pub fn add_edge(&mut self, e: Leid, src: Lvid, dst: Lvid) -> Result<()> {
        let ei = self.check_edge(e)?;
        self.check_vertex(src)?;
        self.check_vertex(dst)?;
        if src == dst {
            return Err(FragmentError::SelfLoopRejected(src.0));
        }
        self.endpoints[ei] = Endpoints { src, dst };
        self.in_edges[dst.idx()].push(e);
        self.out_edges[src.idx()].push(e);
        self.finalized = false;
        Ok(())
    }

    /// Sorts every adjacency list by the lexicographic `(src, dst)` order of
    /// the referenced edges. Idempotent; required before [`LocalStore::find`]
    /// may binary-search.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        let endpoints = &self.endpoints;
        let key = |e: &Leid| {
            let ep = endpoints[e.idx()];
            (ep.src, ep.dst)
        };
        for list in &mut self.in_edges {
            list.sort_unstable_by_key(key);
        }
        for list in &mut self.out_edges {
            list.sort_unstable_by_key(key);
        }
        self.finalized = true;
        tracing::debug!(
            vertices = self.vertices.len(),
            edges = self.edges.len(),
            "local store finalized"
        );
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Looks up the edge `src -> dst`, searching whichever of the two
    /// adjacency lists is shorter. `O(log deg)` once finalized, `O(deg)`
    /// before.
    pub fn find(&self, src: Lvid, dst: Lvid) -> Result<Option<Leid>> {
        self.check_vertex(src)?;
        self.check_vertex(dst)?;
        let ins = &self.in_edges[dst.idx()];
        let outs = &self.out_edges[src.idx()];
        if ins.is_empty() || outs.is_empty() {
            return Ok(None);
        }
        let list: &[Leid] = if ins.len() < outs.len() { ins } else { outs };
        if self.finalized {
            let found = list
                .binary_search_by(|&e| {
                    let ep = self.endpoints[e.idx()];
                    (ep.src, ep.dst).cmp(&(src, dst))
                })
                .ok()
                .map(|i| list[i]);
            Ok(found)
        } else {
            Ok(list.iter().copied().find(|&e| {
                let ep = self.endpoints[e.idx()];
                ep.src == src && ep.dst == dst
            }))
        }
    }

    /// Unsafe form of [`LocalStore::find`]: the edge must exist.
    pub fn edge_id(&self, src: Lvid, dst: Lvid) -> Result<Leid> {
        self.find(src, dst)?.ok_or(FragmentError::EdgeAbsent)
    }

    /// Returns the edge running in the opposite direction of `e`.
    pub fn rev_edge_id(&self, e: Leid) -> Result<Leid> {
        let ep = self.endpoints[self.check_edge(e)?];
        self.edge_id(ep.dst, ep.src)
    }

    // Vertex data ----------------------------------------------------------

    pub fn vertex_data(&self, v: Lvid) -> Result<MappedRwLockReadGuard<'_, V>> {
        let i = self.check_vertex(v)?;
        Ok(RwLockReadGuard::map(self.vertices[i].read(), |s| &s.data))
    }

    /// Raw mutable access to a vertex payload. Does not touch the version
    /// word; construction-time data loading is the intended caller.
    pub fn vertex_data_mut(&self, v: Lvid) -> Result<MappedRwLockWriteGuard<'_, V>> {
        let i = self.check_vertex(v)?;
        Ok(RwLockWriteGuard::map(self.vertices[i].write(), |s| &mut s.data))
    }

    pub fn get_vertex_data(&self, v: Lvid) -> Result<V> {
        Ok(self.vertex_data(v)?.clone())
    }

    pub fn vertex_version(&self, v: Lvid) -> Result<u64> {
        let i = self.check_vertex(v)?;
        Ok(self.vertices[i].read().tag.version())
    }

    pub fn set_vertex_version(&self, v: Lvid, version: u64) -> Result<()> {
        let i = self.check_vertex(v)?;
        self.vertices[i].write().tag.assign_version(version);
        Ok(())
    }

    pub fn increment_vertex_version(&self, v: Lvid) -> Result<()> {
        let i = self.check_vertex(v)?;
        self.vertices[i].write().tag.increment_version();
        Ok(())
    }

    pub fn vertex_modified(&self, v: Lvid) -> Result<bool> {
        let i = self.check_vertex(v)?;
        Ok(self.vertices[i].read().tag.modified())
    }

    pub fn set_vertex_modified(&self, v: Lvid, modified: bool) -> Result<()> {
        let i = self.check_vertex(v)?;
        self.vertices[i].write().tag.set_modified(modified);
        Ok(())
    }

    pub fn vertex_snapshot_made(&self, v: Lvid) -> Result<bool> {
        let i = self.check_vertex(v)?;
        Ok(self.vertices[i].read().tag.snapshot_made())
    }

    pub fn set_vertex_snapshot_made(&self, v: Lvid, snapshot_made: bool) -> Result<()> {
        let i = self.check_vertex(v)?;
        self.vertices[i].write().tag.set_snapshot_made(snapshot_made);
        Ok(())
    }

    /// Overwrites the payload and bumps the version, all under the record
    /// lock.
    pub fn increment_and_update_vertex(&self, v: Lvid, data: V) -> Result<()> {
        let i = self.check_vertex(v)?;
        let mut slot = self.vertices[i].write();
        slot.data = data;
        slot.tag.increment_version();
        Ok(())
    }

    /// Adopts `data` at `version` iff the local version is not newer.
    /// Clears the `modified` flag on adoption.
    pub fn conditional_update_vertex(&self, v: Lvid, data: V, version: u64) -> Result<()> {
        let i = self.check_vertex(v)?;
        let mut slot = self.vertices[i].write();
        if slot.tag.version() <= version {
            slot.data = data;
            slot.tag.assign_version(version);
            slot.tag.set_modified(false);
        }
        Ok(())
    }

    /// Owner-side half of the version-conditional exchange, in one lock
    /// scope: returns the authoritative `(payload, version)` when the local
    /// copy is strictly newer, absorbs the incoming payload when the remote
    /// copy is strictly newer, and does nothing on a tie.
    pub fn reconcile_vertex(
        &self,
        v: Lvid,
        incoming_version: u64,
        incoming: Option<V>,
    ) -> Result<Option<(V, u64)>> {
        let i = self.check_vertex(v)?;
        let mut slot = self.vertices[i].write();
        let local = slot.tag.version();
        if local > incoming_version {
            Ok(Some((slot.data.clone(), local)))
        } else if local < incoming_version {
            let data = incoming.ok_or(FragmentError::VersionConsistency(
                "replica claims a newer vertex but sent no payload",
            ))?;
            slot.data = data;
            slot.tag.assign_version(incoming_version);
            slot.tag.set_modified(false);
            Ok(None)
        } else {
            Ok(None)
        }
    }

    /// Replica-side request material: the current version, plus the payload
    /// iff this copy was locally modified since the last reconciliation.
    pub fn vertex_sync_parts(&self, v: Lvid) -> Result<(u64, Option<V>)> {
        let i = self.check_vertex(v)?;
        let slot = self.vertices[i].read();
        let data = slot.tag.modified().then(|| slot.data.clone());
        Ok((slot.tag.version(), data))
    }

    // Edge data ------------------------------------------------------------

    pub fn edge_data(&self, e: Leid) -> Result<MappedRwLockReadGuard<'_, E>> {
        let i = self.check_edge(e)?;
        Ok(RwLockReadGuard::map(self.edges[i].read(), |s| &s.data))
    }

    /// Raw mutable access to an edge payload; version word untouched.
    pub fn edge_data_mut(&self, e: Leid) -> Result<MappedRwLockWriteGuard<'_, E>> {
        let i = self.check_edge(e)?;
        Ok(RwLockWriteGuard::map(self.edges[i].write(), |s| &mut s.data))
    }

    pub fn get_edge_data(&self, e: Leid) -> Result<E> {
        Ok(self.edge_data(e)?.clone())
    }

    pub fn edge_data_by_pair(&self, src: Lvid, dst: Lvid) -> Result<MappedRwLockReadGuard<'_, E>> {
        let e = self.edge_id(src, dst)?;
        self.edge_data(e)
    }

    pub fn edge_version(&self, e: Leid) -> Result<u64> {
        let i = self.check_edge(e)?;
        Ok(self.edges[i].read().tag.version())
    }

    pub fn edge_version_by_pair(&self, src: Lvid, dst: Lvid) -> Result<u64> {
        self.edge_version(self.edge_id(src, dst)?)
    }

    pub fn set_edge_version(&self, e: Leid, version: u64) -> Result<()> {
        let i = self.check_edge(e)?;
        self.edges[i].write().tag.assign_version(version);
        Ok(())
    }

    pub fn increment_edge_version(&self, e: Leid) -> Result<()> {
        let i = self.check_edge(e)?;
        self.edges[i].write().tag.increment_version();
        Ok(())
    }

    pub fn increment_edge_version_by_pair(&self, src: Lvid, dst: Lvid) -> Result<()> {
        self.increment_edge_version(self.edge_id(src, dst)?)
    }

    pub fn edge_modified(&self, e: Leid) -> Result<bool> {
        let i = self.check_edge(e)?;
        Ok(self.edges[i].read().tag.modified())
    }

    pub fn set_edge_modified(&self, e: Leid, modified: bool) -> Result<()> {
        let i = self.check_edge(e)?;
        self.edges[i].write().tag.set_modified(modified);
        Ok(())
    }

    pub fn edge_snapshot_made(&self, e: Leid) -> Result<bool> {
        let i = self.check_edge(e)?;
        Ok(self.edges[i].read().tag.snapshot_made())
    }

    pub fn set_edge_snapshot_made(&self, e: Leid, snapshot_made: bool) -> Result<()> {
        let i = self.check_edge(e)?;
        self.edges[i].write().tag.set_snapshot_made(snapshot_made);
        Ok(())
    }

    pub fn increment_and_update_edge(&self, e: Leid, data: E) -> Result<()> {
        let i = self.check_edge(e)?;
        let mut slot = self.edges[i].write();
        slot.data = data;
        slot.tag.increment_version();
        Ok(())
    }

    pub fn conditional_update_edge(&self, e: Leid, data: E, version: u64) -> Result<()> {
        let i = self.check_edge(e)?;
        let mut slot = self.edges[i].write();
        if slot.tag.version() <= version {
            slot.data = data;
            slot.tag.assign_version(version);
            slot.tag.set_modified(false);
        }
        Ok(())
    }

    /// Owner-side half of the version-conditional exchange for an edge; see
    /// [`LocalStore::reconcile_vertex`].
    pub fn reconcile_edge(
        &self,
        e: Leid,
        incoming_version: u64,
        incoming: Option<E>,
    ) -> Result<Option<(E, u64)>> {
        let i = self.check_edge(e)?;
        let mut slot = self.edges[i].write();
        let local = slot.tag.version();
        if local > incoming_version {
            Ok(Some((slot.data.clone(), local)))
        } else if local < incoming_version {
            let data = incoming.ok_or(FragmentError::VersionConsistency(
                "replica claims a newer edge but sent no payload",
            ))?;
            slot.data = data;
            slot.tag.assign_version(incoming_version);
            slot.tag.set_modified(false);
            Ok(None)
        } else {
            Ok(None)
        }
    }

    pub fn edge_sync_parts(&self, e: Leid) -> Result<(u64, Option<E>)> {
        let i = self.check_edge(e)?;
        let slot = self.edges[i].read();
        let data = slot.tag.modified().then(|| slot.data.clone());
        Ok((slot.tag.version(), data))
    }

    // Colors ---------------------------------------------------------------

    pub fn color(&self, v: Lvid) -> Result<VertexColor> {
        let i = self.check_vertex(v)?;
        Ok(self.colors[i].load(Ordering::Relaxed))
    }

    pub fn set_color(&self, v: Lvid, color: VertexColor) -> Result<()> {
        let i = self.check_vertex(v)?;
        self.colors[i].store(color, Ordering::Relaxed);
        Ok(())
    }

    /// Greedy coloring heuristic: visit vertices by descending in-degree,
    /// give each the smallest color unused among its in-neighbors. Returns
    /// the number of colors used.
    pub fn compute_coloring(&self) -> usize {
        for c in &self.colors {
            c.store(0, Ordering::Relaxed);
        }
        let mut order: Vec<Lvid> = (0..self.vertices.len() as u32).map(Lvid).collect();
        order.sort_unstable_by_key(|v| std::cmp::Reverse(self.in_edges[v.idx()].len()));

        let mut max_color: VertexColor = 0;
        let mut neighbor_colors: BTreeSet<VertexColor> = BTreeSet::new();
        for v in order {
            neighbor_colors.clear();
            for &e in &self.in_edges[v.idx()] {
                let src = self.endpoints[e.idx()].src;
                neighbor_colors.insert(self.colors[src.idx()].load(Ordering::Relaxed));
            }
            let mut color: VertexColor = 0;
            for &taken in &neighbor_colors {
                if color != taken {
                    break;
                }
                color += 1;
            }
            self.colors[v.idx()].store(color, Ordering::Relaxed);
            max_color = max_color.max(color);
        }
        tracing::debug!(colors = max_color + 1, "greedy coloring computed");
        max_color as usize + 1
    }

    /// Verifies that no vertex shares a color with any of its in-neighbors.
    pub fn valid_coloring(&self) -> bool {
        for (vi, list) in self.in_edges.iter().enumerate() {
            let own = self.colors[vi].load(Ordering::Relaxed);
            for &e in list {
                let src = self.endpoints[e.idx()].src;
                if self.colors[src.idx()].load(Ordering::Relaxed) == own {
                    return false;
                }
            }
        }
        true
    }

    // Maintenance ----------------------------------------------------------

    /// Resets every payload to its default and every version word to zero.
    pub fn zero_all(&self) {
        for slot in &self.vertices {
            let mut slot = slot.write();
            slot.data = V::default();
            slot.tag = VersionTag::default();
        }
        for slot in &self.edges {
            let mut slot = slot.write();
            slot.data = E::default();
            slot.tag = VersionTag::default();
        }
    }

    /// Dumps the adjacency structure as `src, dst` text lines of local ids.
    pub fn save_adjacency(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for ep in &self.endpoints {
            writeln!(out, "{}, {}", ep.src.0, ep.dst.0)?;
        }
        out.flush()?;
        Ok(())
    }

    // Record access reserved for the packed data files.

    pub(crate) fn vertex_record_parts(&self, i: usize) -> (V, VersionTag) {
        let slot = self.vertices[i].read();
        (slot.data.clone(), slot.tag)
    }

    pub(crate) fn restore_vertex_record(&self, i: usize, data: V, tag: VersionTag) {
        let mut slot = self.vertices[i].write();
        slot.data = data;
        slot.tag = tag;
    }

    pub(crate) fn edge_record_parts(&self, i: usize) -> (E, VersionTag) {
        let slot = self.edges[i].read();
        (slot.data.clone(), slot.tag)
    }

    pub(crate) fn restore_edge_record(&self, i: usize, data: E, tag: VersionTag) {
        let mut slot = self.edges[i].write();
        slot.data = data;
        slot.tag = tag;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> LocalStore<u64, u64> {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3, 3 -> 0
        let mut store = LocalStore::new(4, 5);
        store.add_edge(Leid(0), Lvid(0), Lvid(1)).unwrap();
        store.add_edge(Leid(1), Lvid(0), Lvid(2)).unwrap();
        store.add_edge(Leid(2), Lvid(1), Lvid(3)).unwrap();
        store.add_edge(Leid(3), Lvid(2), Lvid(3)).unwrap();
        store.add_edge(Leid(4), Lvid(3), Lvid(0)).unwrap();
        store
    }

    #[test]
    fn find_before_and_after_finalize() {
        let mut store = diamond();
        assert_eq!(store.find(Lvid(0), Lvid(2)).unwrap(), Some(Leid(1)));
        assert_eq!(store.find(Lvid(2), Lvid(0)).unwrap(), None);
        store.finalize();
        assert_eq!(store.find(Lvid(0), Lvid(2)).unwrap(), Some(Leid(1)));
        assert_eq!(store.find(Lvid(1), Lvid(3)).unwrap(), Some(Leid(2)));
        assert_eq!(store.find(Lvid(3), Lvid(1)).unwrap(), None);
    }

    #[test]
    fn adjacency_sorted_after_finalize() {
        let mut store = diamond();
        store.finalize();
        let ins = store.in_edge_ids(Lvid(3)).unwrap();
        let pairs: Vec<_> = ins
            .iter()
            .map(|&e| (store.source(e).unwrap(), store.target(e).unwrap()))
            .collect();
        let mut sorted = pairs.clone();
        sorted.sort();
        assert_eq!(pairs, sorted);
    }

    #[test]
    fn rev_edge_round_trip() {
        let mut store: LocalStore<u64, u64> = LocalStore::new(2, 2);
        store.add_edge(Leid(0), Lvid(0), Lvid(1)).unwrap();
        store.add_edge(Leid(1), Lvid(1), Lvid(0)).unwrap();
        store.finalize();
        let rev = store.rev_edge_id(Leid(0)).unwrap();
        assert_eq!(rev, Leid(1));
        assert_eq!(store.rev_edge_id(rev).unwrap(), Leid(0));
    }

    #[test]
    fn rev_edge_absent() {
        let mut store = diamond();
        store.finalize();
        assert!(matches!(
            store.rev_edge_id(Leid(0)),
            Err(FragmentError::EdgeAbsent)
        ));
    }

    #[test]
    fn add_edge_rejects_self_loop() {
        let mut store: LocalStore<u64, u64> = LocalStore::new(2, 1);
        assert!(matches!(
            store.add_edge(Leid(0), Lvid(1), Lvid(1)),
            Err(FragmentError::SelfLoopRejected(1))
        ));
    }

    #[test]
    fn add_edge_rejects_out_of_range() {
        let mut store: LocalStore<u64, u64> = LocalStore::new(2, 1);
        assert!(matches!(
            store.add_edge(Leid(0), Lvid(0), Lvid(2)),
            Err(FragmentError::IndexOutOfRange(_))
        ));
        assert!(matches!(
            store.add_edge(Leid(1), Lvid(0), Lvid(1)),
            Err(FragmentError::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn data_access_bounds_checked() {
        let store: LocalStore<u64, u64> = LocalStore::new(1, 1);
        assert!(matches!(
            store.get_vertex_data(Lvid(5)),
            Err(FragmentError::IndexOutOfRange(_))
        ));
        assert!(matches!(
            store.edge_version(Leid(9)),
            Err(FragmentError::IndexOutOfRange(_))
        ));
    }

    #[test]
    fn increment_and_update_bumps_version() {
        let store: LocalStore<u64, u64> = LocalStore::new(1, 0);
        store.increment_and_update_vertex(Lvid(0), 11).unwrap();
        store.increment_and_update_vertex(Lvid(0), 12).unwrap();
        assert_eq!(*store.vertex_data(Lvid(0)).unwrap(), 12);
        assert_eq!(store.vertex_version(Lvid(0)).unwrap(), 2);
    }

    #[test]
    fn conditional_update_respects_newer_local() {
        let store: LocalStore<u64, u64> = LocalStore::new(1, 0);
        store.set_vertex_version(Lvid(0), 9).unwrap();
        store.conditional_update_vertex(Lvid(0), 5, 4).unwrap();
        assert_eq!(store.vertex_version(Lvid(0)).unwrap(), 9);
        assert_eq!(*store.vertex_data(Lvid(0)).unwrap(), 0);

        store.conditional_update_vertex(Lvid(0), 5, 9).unwrap();
        assert_eq!(*store.vertex_data(Lvid(0)).unwrap(), 5);
        assert_eq!(store.vertex_version(Lvid(0)).unwrap(), 9);
    }

    #[test]
    fn conditional_update_clears_modified() {
        let store: LocalStore<u64, u64> = LocalStore::new(1, 0);
        store.set_vertex_modified(Lvid(0), true).unwrap();
        store.conditional_update_vertex(Lvid(0), 5, 3).unwrap();
        assert!(!store.vertex_modified(Lvid(0)).unwrap());
    }

    #[test]
    fn reconcile_owner_newer_replies_payload() {
        let store: LocalStore<u64, u64> = LocalStore::new(1, 0);
        store.increment_and_update_vertex(Lvid(0), 7).unwrap();
        let reply = store.reconcile_vertex(Lvid(0), 0, None).unwrap();
        assert_eq!(reply, Some((7, 1)));
    }

    #[test]
    fn reconcile_replica_newer_absorbs() {
        let store: LocalStore<u64, u64> = LocalStore::new(1, 0);
        let reply = store.reconcile_vertex(Lvid(0), 5, Some(99)).unwrap();
        assert_eq!(reply, None);
        assert_eq!(*store.vertex_data(Lvid(0)).unwrap(), 99);
        assert_eq!(store.vertex_version(Lvid(0)).unwrap(), 5);
    }

    #[test]
    fn reconcile_tie_is_empty() {
        let store: LocalStore<u64, u64> = LocalStore::new(1, 0);
        store.set_vertex_version(Lvid(0), 3).unwrap();
        let reply = store.reconcile_vertex(Lvid(0), 3, None).unwrap();
        assert_eq!(reply, None);
        assert_eq!(store.vertex_version(Lvid(0)).unwrap(), 3);
    }

    #[test]
    fn reconcile_missing_payload_is_fatal() {
        let store: LocalStore<u64, u64> = LocalStore::new(1, 0);
        assert!(matches!(
            store.reconcile_vertex(Lvid(0), 5, None),
            Err(FragmentError::VersionConsistency(_))
        ));
    }

    #[test]
    fn sync_parts_carry_payload_only_when_modified() {
        let store: LocalStore<u64, u64> = LocalStore::new(1, 0);
        store.increment_and_update_vertex(Lvid(0), 21).unwrap();
        let (version, data) = store.vertex_sync_parts(Lvid(0)).unwrap();
        assert_eq!(version, 1);
        assert_eq!(data, None);

        store.set_vertex_modified(Lvid(0), true).unwrap();
        let (_, data) = store.vertex_sync_parts(Lvid(0)).unwrap();
        assert_eq!(data, Some(21));
    }

    #[test]
    fn coloring_is_valid_on_diamond() {
        let mut store = diamond();
        store.finalize();
        let n = store.compute_coloring();
        assert!(n >= 2);
        assert!(store.valid_coloring());
    }

    #[test]
    fn coloring_is_valid_on_random_graph() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let nverts = 64;
        let mut pairs = std::collections::BTreeSet::new();
        while pairs.len() < 200 {
            let src = rng.gen_range(0..nverts);
            let dst = rng.gen_range(0..nverts);
            if src != dst {
                pairs.insert((src, dst));
            }
        }
        let mut store: LocalStore<u64, u64> = LocalStore::new(nverts as usize, pairs.len());
        for (i, (src, dst)) in pairs.iter().enumerate() {
            store
                .add_edge(Leid(i as u32), Lvid(*src), Lvid(*dst))
                .unwrap();
        }
        store.finalize();
        store.compute_coloring();
        assert!(store.valid_coloring());
    }

    #[test]
    fn zero_all_resets_records() {
        let store: LocalStore<u64, u64> = LocalStore::new(2, 0);
        store.increment_and_update_vertex(Lvid(1), 5).unwrap();
        store.set_vertex_modified(Lvid(1), true).unwrap();
        store.zero_all();
        assert_eq!(*store.vertex_data(Lvid(1)).unwrap(), 0);
        assert_eq!(store.vertex_version(Lvid(1)).unwrap(), 0);
        assert!(!store.vertex_modified(Lvid(1)).unwrap());
    }
}
