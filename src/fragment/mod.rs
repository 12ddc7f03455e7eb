//! The distributed graph fragment: one process's partition plus its
//! boundary replicas, with every operation routed locally or to the owner.
//!
//! Routing is uniform: resolve the id against the local maps; serve reads
//! from the local store when the object is present (owner or ghost copy as
//! the operation allows), and otherwise resolve the owner through the
//! directory and forward.

mod build;
mod sync;

pub use build::StoreOptions;
pub use sync::{BlockSyncByEid, BlockSyncByPair, ConditionalStore};

use std::fmt;
use std::sync::atomic::AtomicUsize;

use parking_lot::MappedRwLockReadGuard;
use rustc_hash::FxHashMap;

use crate::directory::OwnerDirectory;
use crate::error::{FragmentError, Result};
use crate::rpc::{decode, encode, RpcHandle, RpcObject};
use crate::store::LocalStore;
use crate::types::{Geid, GraphData, Gvid, Leid, Lvid, ProcId, VertexColor};

use std::sync::Arc;

/// Method ids of the fragment's RPC surface.
pub(crate) mod op {
    pub const NUM_IN_NEIGHBORS: u16 = 0;
    pub const NUM_OUT_NEIGHBORS: u16 = 1;
    pub const FIND: u16 = 2;
    pub const REV_EDGE_ID: u16 = 3;
    pub const EDGE_SOURCE: u16 = 4;
    pub const EDGE_TARGET: u16 = 5;
    pub const IN_EDGE_IDS: u16 = 6;
    pub const OUT_EDGE_IDS: u16 = 7;
    pub const GET_VERTEX_DATA: u16 = 8;
    pub const SET_VERTEX_DATA: u16 = 9;
    pub const GET_EDGE_DATA_BY_PAIR: u16 = 10;
    pub const GET_EDGE_DATA_BY_ID: u16 = 11;
    pub const SET_EDGE_DATA_BY_PAIR: u16 = 12;
    pub const SET_EDGE_DATA_BY_ID: u16 = 13;
    pub const GET_COLOR: u16 = 14;
    pub const SET_COLOR: u16 = 15;
    pub const VERTEX_SYNC: u16 = 16;
    pub const VERTEX_SYNC_ASYNC: u16 = 17;
    pub const VERTEX_SYNC_REPLY: u16 = 18;
    pub const EDGE_SYNC_BY_ID: u16 = 19;
    pub const EDGE_SYNC_BY_ID_ASYNC: u16 = 20;
    pub const EDGE_SYNC_BY_ID_REPLY: u16 = 21;
    pub const EDGE_SYNC_BY_PAIR: u16 = 22;
    pub const EDGE_SYNC_BY_PAIR_ASYNC: u16 = 23;
    pub const EDGE_SYNC_BY_PAIR_REPLY: u16 = 24;
    pub const BLOCK_SYNC_BY_ID: u16 = 25;
    pub const BLOCK_SYNC_BY_ID_ASYNC: u16 = 26;
    pub const BLOCK_SYNC_BY_ID_REPLY: u16 = 27;
    pub const BLOCK_SYNC_BY_PAIR: u16 = 28;
    pub const BLOCK_SYNC_BY_PAIR_ASYNC: u16 = 29;
    pub const BLOCK_SYNC_BY_PAIR_REPLY: u16 = 30;
}

/// One process's view of the distributed graph.
pub struct GraphFragment<V: GraphData, E: GraphData> {
    pub(crate) rpc: RpcHandle,
    pub(crate) store: LocalStore<V, E>,
    pub(crate) g2l_vid: FxHashMap<Gvid, Lvid>,
    pub(crate) l2g_vid: Vec<Gvid>,
    pub(crate) g2l_eid: FxHashMap<Geid, Leid>,
    pub(crate) l2g_eid: Vec<Geid>,
    /// Owner of each locally present vertex; dense and hot, unlike the
    /// directory.
    pub(crate) local_vid_owner: Vec<ProcId>,
    pub(crate) vid_owners: Arc<OwnerDirectory>,
    pub(crate) eid_owners: Arc<OwnerDirectory>,
    pub(crate) canonical_edges: bool,
    pub(crate) global_vertices: usize,
    pub(crate) global_edges: usize,
    pub(crate) pending_async: AtomicUsize,
}

impl<V: GraphData, E: GraphData> GraphFragment<V, E> {
    // Resolution helpers ---------------------------------------------------

    pub(crate) fn me(&self) -> ProcId {
        self.rpc.proc_id()
    }

    pub(crate) fn lvid_of(&self, vid: Gvid) -> Option<Lvid> {
        self.g2l_vid.get(&vid).copied()
    }

    pub(crate) fn leid_of(&self, eid: Geid) -> Option<Leid> {
        self.g2l_eid.get(&eid).copied()
    }

    pub(crate) fn owned_locally(&self, l: Lvid) -> bool {
        self.local_vid_owner[l.idx()] == self.me()
    }

    pub(crate) fn vertex_owner(&self, vid: Gvid) -> Result<ProcId> {
        self.vid_owners.owner_of(vid.0)
    }

    pub(crate) fn edge_owner(&self, eid: Geid) -> Result<ProcId> {
        self.require_global_edge_ids()?;
        self.eid_owners.owner_of(eid.0)
    }

    pub(crate) fn require_global_edge_ids(&self) -> Result<()> {
        if self.canonical_edges {
            Err(FragmentError::RoutingRefused)
        } else {
            Ok(())
        }
    }

    fn local_vid(&self, vid: Gvid) -> Result<Lvid> {
        self.lvid_of(vid).ok_or(FragmentError::NotLocal)
    }

    fn local_eid(&self, eid: Geid) -> Result<Leid> {
        self.leid_of(eid).ok_or(FragmentError::NotLocal)
    }

    // Sizes and predicates -------------------------------------------------

    /// This process's rank in the group.
    pub fn proc_id(&self) -> ProcId {
        self.rpc.proc_id()
    }

    pub fn num_procs(&self) -> usize {
        self.rpc.num_procs()
    }

    /// Cluster-wide vertex count.
    pub fn num_vertices(&self) -> usize {
        self.global_vertices
    }

    /// Cluster-wide edge count.
    pub fn num_edges(&self) -> usize {
        self.global_edges
    }

    pub fn num_local_vertices(&self) -> usize {
        self.store.num_vertices()
    }

    pub fn num_local_edges(&self) -> usize {
        self.store.num_edges()
    }

    pub fn uses_canonical_edge_ids(&self) -> bool {
        self.canonical_edges
    }

    pub fn vertex_is_local(&self, vid: Gvid) -> bool {
        self.g2l_vid.contains_key(&vid)
    }

    pub fn edge_is_local(&self, eid: Geid) -> bool {
        self.g2l_eid.contains_key(&eid)
    }

    /// True iff `vid` is present here but owned by another process.
    pub fn is_ghost(&self, vid: Gvid) -> Result<bool> {
        let l = self.local_vid(vid)?;
        Ok(!self.owned_locally(l))
    }

    // Structure queries ----------------------------------------------------

    pub fn num_in_neighbors(&self, vid: Gvid) -> Result<usize> {
        if let Some(l) = self.lvid_of(vid) {
            if self.owned_locally(l) {
                return self.store.num_in_neighbors(l);
            }
        }
        let owner = self.vertex_owner(vid)?;
        self.rpc.remote_request(owner, op::NUM_IN_NEIGHBORS, &vid)
    }

    pub fn num_out_neighbors(&self, vid: Gvid) -> Result<usize> {
        if let Some(l) = self.lvid_of(vid) {
            if self.owned_locally(l) {
                return self.store.num_out_neighbors(l);
            }
        }
        let owner = self.vertex_owner(vid)?;
        self.rpc.remote_request(owner, op::NUM_OUT_NEIGHBORS, &vid)
    }

    /// Looks up the edge `source -> target`. If either endpoint is missing
    /// here, the owner of the target decides.
    pub fn find(&self, source: Gvid, target: Gvid) -> Result<Option<Geid>> {
        if let (Some(ls), Some(lt)) = (self.lvid_of(source), self.lvid_of(target)) {
            return Ok(self.store.find(ls, lt)?.map(|le| self.l2g_eid[le.idx()]));
        }
        let owner = self.vertex_owner(target)?;
        if owner == self.me() {
            // We own the target and still lack an endpoint: no such edge.
            return Ok(None);
        }
        self.rpc.remote_request(owner, op::FIND, &(source, target))
    }

    /// Unsafe form of [`GraphFragment::find`].
    pub fn edge_id(&self, source: Gvid, target: Gvid) -> Result<Geid> {
        self.find(source, target)?.ok_or(FragmentError::EdgeAbsent)
    }

    pub fn rev_edge_id(&self, eid: Geid) -> Result<Geid> {
        if let Some(le) = self.leid_of(eid) {
            // The boundary holds an edge iff it holds both endpoints, so the
            // reverse edge, if it exists at all, is local too.
            let rev = self.store.rev_edge_id(le)?;
            return Ok(self.l2g_eid[rev.idx()]);
        }
        let owner = self.edge_owner(eid)?;
        self.rpc.remote_request(owner, op::REV_EDGE_ID, &eid)
    }

    pub fn source(&self, eid: Geid) -> Result<Gvid> {
        if let Some(le) = self.leid_of(eid) {
            return Ok(self.l2g_vid[self.store.source(le)?.idx()]);
        }
        let owner = self.edge_owner(eid)?;
        self.rpc.remote_request(owner, op::EDGE_SOURCE, &eid)
    }

    pub fn target(&self, eid: Geid) -> Result<Gvid> {
        if let Some(le) = self.leid_of(eid) {
            return Ok(self.l2g_vid[self.store.target(le)?.idx()]);
        }
        let owner = self.edge_owner(eid)?;
        self.rpc.remote_request(owner, op::EDGE_TARGET, &eid)
    }

    /// Global ids of the edges arriving at `vid`. Served locally only by
    /// the owner; ghost adjacency is incomplete by construction.
    pub fn in_edge_ids(&self, vid: Gvid) -> Result<Vec<Geid>> {
        if let Some(l) = self.lvid_of(vid) {
            if self.owned_locally(l) {
                return self.local_in_edge_ids(l);
            }
        }
        let owner = self.vertex_owner(vid)?;
        self.rpc.remote_request(owner, op::IN_EDGE_IDS, &vid)
    }

    pub fn out_edge_ids(&self, vid: Gvid) -> Result<Vec<Geid>> {
        if let Some(l) = self.lvid_of(vid) {
            if self.owned_locally(l) {
                return self.local_out_edge_ids(l);
            }
        }
        let owner = self.vertex_owner(vid)?;
        self.rpc.remote_request(owner, op::OUT_EDGE_IDS, &vid)
    }

    fn local_in_edge_ids(&self, l: Lvid) -> Result<Vec<Geid>> {
        Ok(self
            .store
            .in_edge_ids(l)?
            .iter()
            .map(|&e| self.l2g_eid[e.idx()])
            .collect())
    }

    fn local_out_edge_ids(&self, l: Lvid) -> Result<Vec<Geid>> {
        Ok(self
            .store
            .out_edge_ids(l)?
            .iter()
            .map(|&e| self.l2g_eid[e.idx()])
            .collect())
    }

    // Vertex data ----------------------------------------------------------

    /// Reference accessor; the vertex must be present in this fragment.
    pub fn vertex_data(&self, vid: Gvid) -> Result<MappedRwLockReadGuard<'_, V>> {
        let l = self.local_vid(vid)?;
        self.store.vertex_data(l)
    }

    /// By-value read, served from the local replica (owner or ghost) when
    /// present and routed to the owner otherwise.
    pub fn get_vertex_data(&self, vid: Gvid) -> Result<V> {
        if let Some(l) = self.lvid_of(vid) {
            return self.store.get_vertex_data(l);
        }
        let owner = self.vertex_owner(vid)?;
        self.rpc.remote_request(owner, op::GET_VERTEX_DATA, &vid)
    }

    /// Synchronous write: applied at the owner under the record lock with a
    /// version increment.
    pub fn set_vertex_data(&self, vid: Gvid, data: V) -> Result<()> {
        if let Some(l) = self.lvid_of(vid) {
            if self.owned_locally(l) {
                return self.store.increment_and_update_vertex(l, data);
            }
        }
        let owner = self.vertex_owner(vid)?;
        self.rpc
            .remote_request::<_, ()>(owner, op::SET_VERTEX_DATA, &(vid, data))
    }

    /// Asynchronous write: returns once the request is enqueued.
    pub fn set_vertex_data_async(&self, vid: Gvid, data: V) -> Result<()> {
        if let Some(l) = self.lvid_of(vid) {
            if self.owned_locally(l) {
                return self.store.increment_and_update_vertex(l, data);
            }
        }
        let owner = self.vertex_owner(vid)?;
        self.rpc.remote_call(owner, op::SET_VERTEX_DATA, &(vid, data))
    }

    /// Version of the local replica of `vid`.
    pub fn vertex_version(&self, vid: Gvid) -> Result<u64> {
        let l = self.local_vid(vid)?;
        self.store.vertex_version(l)
    }

    /// Local write on whatever replica this fragment holds, marking it
    /// modified so the next synchronization pushes it to the owner. This is
    /// the entry point an execution engine uses inside a locked scope.
    pub fn update_local_vertex(&self, vid: Gvid, data: V) -> Result<()> {
        let l = self.local_vid(vid)?;
        self.store.increment_and_update_vertex(l, data)?;
        self.store.set_vertex_modified(l, true)
    }

    // Edge data ------------------------------------------------------------

    /// Reference accessor; both endpoints must be present in this fragment.
    pub fn edge_data(&self, source: Gvid, target: Gvid) -> Result<MappedRwLockReadGuard<'_, E>> {
        let ls = self.local_vid(source)?;
        let lt = self.local_vid(target)?;
        self.store.edge_data_by_pair(ls, lt)
    }

    /// Reference accessor; the edge must be present in this fragment.
    pub fn edge_data_by_id(&self, eid: Geid) -> Result<MappedRwLockReadGuard<'_, E>> {
        let le = self.local_eid(eid)?;
        self.store.edge_data(le)
    }

    pub fn get_edge_data(&self, source: Gvid, target: Gvid) -> Result<E> {
        if let (Some(ls), Some(lt)) = (self.lvid_of(source), self.lvid_of(target)) {
            return Ok(self.store.edge_data_by_pair(ls, lt)?.clone());
        }
        let owner = self.vertex_owner(target)?;
        self.rpc
            .remote_request(owner, op::GET_EDGE_DATA_BY_PAIR, &(source, target))
    }

    pub fn get_edge_data_by_id(&self, eid: Geid) -> Result<E> {
        if let Some(le) = self.leid_of(eid) {
            return self.store.get_edge_data(le);
        }
        let owner = self.edge_owner(eid)?;
        self.rpc.remote_request(owner, op::GET_EDGE_DATA_BY_ID, &eid)
    }

    pub fn set_edge_data(&self, source: Gvid, target: Gvid, data: E) -> Result<()> {
        if self.edge_write_applied_locally(source, target, &data)? {
            return Ok(());
        }
        let owner = self.vertex_owner(target)?;
        self.rpc
            .remote_request::<_, ()>(owner, op::SET_EDGE_DATA_BY_PAIR, &(source, target, data))
    }

    pub fn set_edge_data_async(&self, source: Gvid, target: Gvid, data: E) -> Result<()> {
        if self.edge_write_applied_locally(source, target, &data)? {
            return Ok(());
        }
        let owner = self.vertex_owner(target)?;
        self.rpc
            .remote_call(owner, op::SET_EDGE_DATA_BY_PAIR, &(source, target, data))
    }

    /// Applies the write if this process owns the edge (that is, the target
    /// vertex). Returns whether it did.
    fn edge_write_applied_locally(&self, source: Gvid, target: Gvid, data: &E) -> Result<bool> {
        if let (Some(ls), Some(lt)) = (self.lvid_of(source), self.lvid_of(target)) {
            if self.owned_locally(lt) {
                let le = self.store.edge_id(ls, lt)?;
                self.store.increment_and_update_edge(le, data.clone())?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn set_edge_data_by_id(&self, eid: Geid, data: E) -> Result<()> {
        if self.edge_write_by_id_applied_locally(eid, &data)? {
            return Ok(());
        }
        let owner = self.edge_owner(eid)?;
        self.rpc
            .remote_request::<_, ()>(owner, op::SET_EDGE_DATA_BY_ID, &(eid, data))
    }

    pub fn set_edge_data_by_id_async(&self, eid: Geid, data: E) -> Result<()> {
        if self.edge_write_by_id_applied_locally(eid, &data)? {
            return Ok(());
        }
        let owner = self.edge_owner(eid)?;
        self.rpc.remote_call(owner, op::SET_EDGE_DATA_BY_ID, &(eid, data))
    }

    fn edge_write_by_id_applied_locally(&self, eid: Geid, data: &E) -> Result<bool> {
        if let Some(le) = self.leid_of(eid) {
            let lt = self.store.target(le)?;
            if self.owned_locally(lt) {
                self.store.increment_and_update_edge(le, data.clone())?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Version of the local replica of `eid`.
    pub fn edge_version(&self, eid: Geid) -> Result<u64> {
        let le = self.local_eid(eid)?;
        self.store.edge_version(le)
    }

    /// Local edge write marking the replica modified; see
    /// [`GraphFragment::update_local_vertex`].
    pub fn update_local_edge(&self, eid: Geid, data: E) -> Result<()> {
        let le = self.local_eid(eid)?;
        self.store.increment_and_update_edge(le, data)?;
        self.store.set_edge_modified(le, true)
    }

    pub fn update_local_edge_by_pair(&self, source: Gvid, target: Gvid, data: E) -> Result<()> {
        let ls = self.local_vid(source)?;
        let lt = self.local_vid(target)?;
        let le = self.store.edge_id(ls, lt)?;
        self.store.increment_and_update_edge(le, data)?;
        self.store.set_edge_modified(le, true)
    }

    // Colors ---------------------------------------------------------------

    /// Color of a locally present vertex.
    pub fn color(&self, vid: Gvid) -> Result<VertexColor> {
        let l = self.local_vid(vid)?;
        self.store.color(l)
    }

    pub fn get_color(&self, vid: Gvid) -> Result<VertexColor> {
        if let Some(l) = self.lvid_of(vid) {
            return self.store.color(l);
        }
        let owner = self.vertex_owner(vid)?;
        self.rpc.remote_request(owner, op::GET_COLOR, &vid)
    }

    pub fn set_color(&self, vid: Gvid, color: VertexColor) -> Result<()> {
        if let Some(l) = self.lvid_of(vid) {
            if self.owned_locally(l) {
                return self.store.set_color(l, color);
            }
        }
        let owner = self.vertex_owner(vid)?;
        self.rpc
            .remote_request::<_, ()>(owner, op::SET_COLOR, &(vid, color))
    }

    pub fn set_color_async(&self, vid: Gvid, color: VertexColor) -> Result<()> {
        if let Some(l) = self.lvid_of(vid) {
            if self.owned_locally(l) {
                return self.store.set_color(l, color);
            }
        }
        let owner = self.vertex_owner(vid)?;
        self.rpc.remote_call(owner, op::SET_COLOR, &(vid, color))
    }

    /// Direct access to the local store, for embedders that operate on
    /// local ids (engines, snapshotters).
    pub fn local_store(&self) -> &LocalStore<V, E> {
        &self.store
    }

    // Owner-side serving ---------------------------------------------------

    fn owned_vid(&self, vid: Gvid) -> Result<Lvid> {
        let l = self.local_vid(vid)?;
        if self.owned_locally(l) {
            Ok(l)
        } else {
            Err(FragmentError::NotLocal)
        }
    }

    fn serve_set_vertex_data(&self, vid: Gvid, data: V) -> Result<()> {
        let l = self.owned_vid(vid)?;
        self.store.increment_and_update_vertex(l, data)
    }

    fn serve_set_edge_data_by_pair(&self, source: Gvid, target: Gvid, data: E) -> Result<()> {
        let ls = self.local_vid(source)?;
        let lt = self.owned_vid(target)?;
        let le = self.store.edge_id(ls, lt)?;
        self.store.increment_and_update_edge(le, data)
    }

    fn serve_set_edge_data_by_id(&self, eid: Geid, data: E) -> Result<()> {
        let le = self.local_eid(eid)?;
        let lt = self.store.target(le)?;
        if !self.owned_locally(lt) {
            return Err(FragmentError::NotLocal);
        }
        self.store.increment_and_update_edge(le, data)
    }
}

impl<V: GraphData, E: GraphData> RpcObject for GraphFragment<V, E> {
    fn dispatch(&self, from: ProcId, method: u16, payload: &[u8]) -> Result<Vec<u8>> {
        match method {
            op::NUM_IN_NEIGHBORS => {
                let vid: Gvid = decode(payload)?;
                encode(&self.store.num_in_neighbors(self.owned_vid(vid)?)?)
            }
            op::NUM_OUT_NEIGHBORS => {
                let vid: Gvid = decode(payload)?;
                encode(&self.store.num_out_neighbors(self.owned_vid(vid)?)?)
            }
            op::FIND => {
                let (source, target): (Gvid, Gvid) = decode(payload)?;
                encode(&self.find(source, target)?)
            }
            op::REV_EDGE_ID => {
                let eid: Geid = decode(payload)?;
                let le = self.local_eid(eid)?;
                encode(&self.l2g_eid[self.store.rev_edge_id(le)?.idx()])
            }
            op::EDGE_SOURCE => {
                let eid: Geid = decode(payload)?;
                let le = self.local_eid(eid)?;
                encode(&self.l2g_vid[self.store.source(le)?.idx()])
            }
            op::EDGE_TARGET => {
                let eid: Geid = decode(payload)?;
                let le = self.local_eid(eid)?;
                encode(&self.l2g_vid[self.store.target(le)?.idx()])
            }
            op::IN_EDGE_IDS => {
                let vid: Gvid = decode(payload)?;
                encode(&self.local_in_edge_ids(self.owned_vid(vid)?)?)
            }
            op::OUT_EDGE_IDS => {
                let vid: Gvid = decode(payload)?;
                encode(&self.local_out_edge_ids(self.owned_vid(vid)?)?)
            }
            op::GET_VERTEX_DATA => {
                let vid: Gvid = decode(payload)?;
                let l = self.local_vid(vid)?;
                encode(&self.store.get_vertex_data(l)?)
            }
            op::SET_VERTEX_DATA => {
                let (vid, data): (Gvid, V) = decode(payload)?;
                self.serve_set_vertex_data(vid, data)?;
                encode(&())
            }
            op::GET_EDGE_DATA_BY_PAIR => {
                let (source, target): (Gvid, Gvid) = decode(payload)?;
                let ls = self.local_vid(source)?;
                let lt = self.local_vid(target)?;
                encode(&self.store.edge_data_by_pair(ls, lt)?.clone())
            }
            op::GET_EDGE_DATA_BY_ID => {
                let eid: Geid = decode(payload)?;
                let le = self.local_eid(eid)?;
                encode(&self.store.get_edge_data(le)?)
            }
            op::SET_EDGE_DATA_BY_PAIR => {
                let (source, target, data): (Gvid, Gvid, E) = decode(payload)?;
                self.serve_set_edge_data_by_pair(source, target, data)?;
                encode(&())
            }
            op::SET_EDGE_DATA_BY_ID => {
                let (eid, data): (Geid, E) = decode(payload)?;
                self.serve_set_edge_data_by_id(eid, data)?;
                encode(&())
            }
            op::GET_COLOR => {
                let vid: Gvid = decode(payload)?;
                let l = self.local_vid(vid)?;
                encode(&self.store.color(l)?)
            }
            op::SET_COLOR => {
                let (vid, color): (Gvid, VertexColor) = decode(payload)?;
                let l = self.owned_vid(vid)?;
                self.store.set_color(l, color)?;
                encode(&())
            }
            _ => self.dispatch_sync(from, method, payload),
        }
    }
}

impl<V: GraphData, E: GraphData> fmt::Display for GraphFragment<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in 0..self.store.num_edges() as u32 {
            let le = Leid(e);
            let src = self.store.source(le).map_err(|_| fmt::Error)?;
            let dst = self.store.target(le).map_err(|_| fmt::Error)?;
            writeln!(
                f,
                "{}, {}",
                self.l2g_vid[src.idx()], self.l2g_vid[dst.idx()]
            )?;
        }
        Ok(())
    }
}
