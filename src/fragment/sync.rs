//! Version-conditional reconciliation between ghost replicas and owners.
//!
//! One round trip per sync: the replica sends its version plus, when
//! locally modified, its payload; the owner answers with its own payload
//! iff strictly newer, absorbs the replica's payload iff strictly older,
//! and stays silent on a tie. Batched forms bundle many objects per peer,
//! and scope sync groups a vertex's neighborhood by owner so each remote
//! peer sees at most one request.

use std::sync::atomic::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{FragmentError, Result};
use crate::rpc::{decode, encode};
use crate::types::{Geid, GraphData, Gvid, Leid, Lvid, ProcId};

use super::{op, GraphFragment};

/// Optionally populated payload-plus-version envelope used on both legs of
/// the exchange.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionalStore<T> {
    pub data: Option<(T, u64)>,
}

impl<T> ConditionalStore<T> {
    pub fn empty() -> Self {
        Self { data: None }
    }

    pub fn carrying(data: T, version: u64) -> Self {
        Self {
            data: Some((data, version)),
        }
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    fn from_reply(reply: Option<(T, u64)>) -> Self {
        Self { data: reply }
    }

    fn from_parts(version: u64, data: Option<T>) -> Self {
        Self {
            data: data.map(|d| (d, version)),
        }
    }

    fn into_payload(self) -> Option<T> {
        self.data.map(|(d, _)| d)
    }
}

impl<T> Default for ConditionalStore<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Batched sync request addressing edges by global id; parallel vectors,
/// answered in place. Version vectors are cleared from the reply to save
/// wire space.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockSyncByEid<V, E> {
    pub vids: Vec<Gvid>,
    pub vid_versions: Vec<u64>,
    pub vstores: Vec<ConditionalStore<V>>,
    pub eids: Vec<Geid>,
    pub eid_versions: Vec<u64>,
    pub estores: Vec<ConditionalStore<E>>,
}

impl<V, E> Default for BlockSyncByEid<V, E> {
    fn default() -> Self {
        Self {
            vids: Vec::new(),
            vid_versions: Vec::new(),
            vstores: Vec::new(),
            eids: Vec::new(),
            eid_versions: Vec::new(),
            estores: Vec::new(),
        }
    }
}

impl<V, E> BlockSyncByEid<V, E> {
    fn is_empty(&self) -> bool {
        self.vids.is_empty() && self.eids.is_empty()
    }
}

/// Batched sync request addressing edges by endpoint pair; the only edge
/// form usable under canonical numbering.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockSyncByPair<V, E> {
    pub vids: Vec<Gvid>,
    pub vid_versions: Vec<u64>,
    pub vstores: Vec<ConditionalStore<V>>,
    pub pairs: Vec<(Gvid, Gvid)>,
    pub eid_versions: Vec<u64>,
    pub estores: Vec<ConditionalStore<E>>,
}

impl<V, E> Default for BlockSyncByPair<V, E> {
    fn default() -> Self {
        Self {
            vids: Vec::new(),
            vid_versions: Vec::new(),
            vstores: Vec::new(),
            pairs: Vec::new(),
            eid_versions: Vec::new(),
            estores: Vec::new(),
        }
    }
}

impl<V, E> BlockSyncByPair<V, E> {
    fn is_empty(&self) -> bool {
        self.vids.is_empty() && self.pairs.is_empty()
    }
}

impl<V: GraphData, E: GraphData> GraphFragment<V, E> {
    // Replica-side single-object sync --------------------------------------

    /// Reconciles the local replica of `vid` with its owner. A no-op when
    /// this process owns the vertex.
    pub fn synchronize_vertex(&self, vid: Gvid) -> Result<()> {
        let Some((owner, version, cond)) = self.vertex_sync_request(vid)? else {
            return Ok(());
        };
        let reply: ConditionalStore<V> =
            self.rpc
                .remote_request(owner, op::VERTEX_SYNC, &(vid, version, cond))?;
        self.adopt_vertex_reply(vid, reply)
    }

    /// Asynchronous form; completion is observed through
    /// [`GraphFragment::wait_for_all_async_syncs`].
    pub fn synchronize_vertex_async(&self, vid: Gvid) -> Result<()> {
        let Some((owner, version, cond)) = self.vertex_sync_request(vid)? else {
            return Ok(());
        };
        self.pending_async.fetch_add(1, Ordering::SeqCst);
        let sent = self.rpc.remote_call(
            owner,
            op::VERTEX_SYNC_ASYNC,
            &(self.me(), vid, version, cond),
        );
        if sent.is_err() {
            self.pending_async.fetch_sub(1, Ordering::SeqCst);
        }
        sent
    }

    fn vertex_sync_request(
        &self,
        vid: Gvid,
    ) -> Result<Option<(ProcId, u64, ConditionalStore<V>)>> {
        let l = self.lvid_of(vid).ok_or(FragmentError::NotLocal)?;
        if self.owned_locally(l) {
            return Ok(None);
        }
        let owner = self.local_vid_owner[l.idx()];
        let (version, data) = self.store.vertex_sync_parts(l)?;
        Ok(Some((owner, version, ConditionalStore::from_parts(version, data))))
    }

    /// Reconciles the local replica of the edge `eid`. Under canonical
    /// numbering the id is only locally meaningful, so the wire request is
    /// addressed by endpoint pair instead.
    pub fn synchronize_edge(&self, eid: Geid) -> Result<()> {
        let Some((owner, le, version, cond)) = self.edge_sync_request(eid)? else {
            return Ok(());
        };
        let reply: ConditionalStore<E> = if self.canonical_edges {
            let pair = self.edge_pair_of(le)?;
            self.rpc
                .remote_request(owner, op::EDGE_SYNC_BY_PAIR, &(pair.0, pair.1, version, cond))?
        } else {
            self.rpc
                .remote_request(owner, op::EDGE_SYNC_BY_ID, &(eid, version, cond))?
        };
        self.adopt_edge_reply(eid, reply)
    }

    pub fn synchronize_edge_async(&self, eid: Geid) -> Result<()> {
        let Some((owner, le, version, cond)) = self.edge_sync_request(eid)? else {
            return Ok(());
        };
        self.pending_async.fetch_add(1, Ordering::SeqCst);
        let sent = if self.canonical_edges {
            let pair = match self.edge_pair_of(le) {
                Ok(pair) => pair,
                Err(err) => {
                    self.pending_async.fetch_sub(1, Ordering::SeqCst);
                    return Err(err);
                }
            };
            self.rpc.remote_call(
                owner,
                op::EDGE_SYNC_BY_PAIR_ASYNC,
                &(self.me(), pair.0, pair.1, version, cond),
            )
        } else {
            self.rpc.remote_call(
                owner,
                op::EDGE_SYNC_BY_ID_ASYNC,
                &(self.me(), eid, version, cond),
            )
        };
        if sent.is_err() {
            self.pending_async.fetch_sub(1, Ordering::SeqCst);
        }
        sent
    }

    /// Reconciles the edge `source -> target`; usable in either numbering
    /// mode.
    pub fn synchronize_edge_by_pair(&self, source: Gvid, target: Gvid) -> Result<()> {
        let ls = self.lvid_of(source).ok_or(FragmentError::NotLocal)?;
        let lt = self.lvid_of(target).ok_or(FragmentError::NotLocal)?;
        let le = self.store.edge_id(ls, lt)?;
        if self.owned_locally(lt) {
            return Ok(());
        }
        let owner = self.local_vid_owner[lt.idx()];
        let (version, data) = self.store.edge_sync_parts(le)?;
        let cond = ConditionalStore::from_parts(version, data);
        let reply: ConditionalStore<E> = self.rpc.remote_request(
            owner,
            op::EDGE_SYNC_BY_PAIR,
            &(source, target, version, cond),
        )?;
        if let Some((data, version)) = reply.data {
            self.store.conditional_update_edge(le, data, version)?;
        }
        Ok(())
    }

    fn edge_sync_request(
        &self,
        eid: Geid,
    ) -> Result<Option<(ProcId, Leid, u64, ConditionalStore<E>)>> {
        let le = self.leid_of(eid).ok_or(FragmentError::NotLocal)?;
        let lt = self.store.target(le)?;
        if self.owned_locally(lt) {
            return Ok(None);
        }
        let owner = self.local_vid_owner[lt.idx()];
        let (version, data) = self.store.edge_sync_parts(le)?;
        Ok(Some((
            owner,
            le,
            version,
            ConditionalStore::from_parts(version, data),
        )))
    }

    fn edge_pair_of(&self, le: Leid) -> Result<(Gvid, Gvid)> {
        let src = self.store.source(le)?;
        let dst = self.store.target(le)?;
        Ok((self.l2g_vid[src.idx()], self.l2g_vid[dst.idx()]))
    }

    // Replica-side reply application ---------------------------------------

    fn adopt_vertex_reply(&self, vid: Gvid, reply: ConditionalStore<V>) -> Result<()> {
        if let Some((data, version)) = reply.data {
            let l = self.lvid_of(vid).ok_or(FragmentError::NotLocal)?;
            self.store.conditional_update_vertex(l, data, version)?;
        }
        Ok(())
    }

    fn adopt_edge_reply(&self, eid: Geid, reply: ConditionalStore<E>) -> Result<()> {
        if let Some((data, version)) = reply.data {
            let le = self.leid_of(eid).ok_or(FragmentError::NotLocal)?;
            self.store.conditional_update_edge(le, data, version)?;
        }
        Ok(())
    }

    fn adopt_edge_reply_by_pair(
        &self,
        source: Gvid,
        target: Gvid,
        reply: ConditionalStore<E>,
    ) -> Result<()> {
        if let Some((data, version)) = reply.data {
            let ls = self.lvid_of(source).ok_or(FragmentError::NotLocal)?;
            let lt = self.lvid_of(target).ok_or(FragmentError::NotLocal)?;
            let le = self.store.edge_id(ls, lt)?;
            self.store.conditional_update_edge(le, data, version)?;
        }
        Ok(())
    }

    // Owner-side handlers --------------------------------------------------

    fn owner_vertex_sync(
        &self,
        vid: Gvid,
        incoming_version: u64,
        incoming: ConditionalStore<V>,
    ) -> Result<ConditionalStore<V>> {
        let l = self.lvid_of(vid).ok_or(FragmentError::NotLocal)?;
        let reply = self
            .store
            .reconcile_vertex(l, incoming_version, incoming.into_payload())?;
        Ok(ConditionalStore::from_reply(reply))
    }

    fn owner_edge_sync_by_id(
        &self,
        eid: Geid,
        incoming_version: u64,
        incoming: ConditionalStore<E>,
    ) -> Result<ConditionalStore<E>> {
        let le = self.leid_of(eid).ok_or(FragmentError::NotLocal)?;
        let reply = self
            .store
            .reconcile_edge(le, incoming_version, incoming.into_payload())?;
        Ok(ConditionalStore::from_reply(reply))
    }

    fn owner_edge_sync_by_pair(
        &self,
        source: Gvid,
        target: Gvid,
        incoming_version: u64,
        incoming: ConditionalStore<E>,
    ) -> Result<ConditionalStore<E>> {
        let ls = self.lvid_of(source).ok_or(FragmentError::NotLocal)?;
        let lt = self.lvid_of(target).ok_or(FragmentError::NotLocal)?;
        let le = self.store.edge_id(ls, lt)?;
        let reply = self
            .store
            .reconcile_edge(le, incoming_version, incoming.into_payload())?;
        Ok(ConditionalStore::from_reply(reply))
    }

    fn owner_block_sync_by_id(
        &self,
        mut request: BlockSyncByEid<V, E>,
    ) -> Result<BlockSyncByEid<V, E>> {
        for i in 0..request.vids.len() {
            let incoming = std::mem::take(&mut request.vstores[i]);
            request.vstores[i] =
                self.owner_vertex_sync(request.vids[i], request.vid_versions[i], incoming)?;
        }
        for i in 0..request.eids.len() {
            let incoming = std::mem::take(&mut request.estores[i]);
            request.estores[i] =
                self.owner_edge_sync_by_id(request.eids[i], request.eid_versions[i], incoming)?;
        }
        request.vid_versions.clear();
        request.eid_versions.clear();
        Ok(request)
    }

    fn owner_block_sync_by_pair(
        &self,
        mut request: BlockSyncByPair<V, E>,
    ) -> Result<BlockSyncByPair<V, E>> {
        for i in 0..request.vids.len() {
            let incoming = std::mem::take(&mut request.vstores[i]);
            request.vstores[i] =
                self.owner_vertex_sync(request.vids[i], request.vid_versions[i], incoming)?;
        }
        for i in 0..request.pairs.len() {
            let incoming = std::mem::take(&mut request.estores[i]);
            let (source, target) = request.pairs[i];
            request.estores[i] =
                self.owner_edge_sync_by_pair(source, target, request.eid_versions[i], incoming)?;
        }
        request.vid_versions.clear();
        request.eid_versions.clear();
        Ok(request)
    }

    fn adopt_block_reply_by_id(&self, reply: BlockSyncByEid<V, E>) -> Result<()> {
        for (vid, vstore) in reply.vids.into_iter().zip(reply.vstores) {
            self.adopt_vertex_reply(vid, vstore)?;
        }
        for (eid, estore) in reply.eids.into_iter().zip(reply.estores) {
            self.adopt_edge_reply(eid, estore)?;
        }
        Ok(())
    }

    fn adopt_block_reply_by_pair(&self, reply: BlockSyncByPair<V, E>) -> Result<()> {
        for (vid, vstore) in reply.vids.into_iter().zip(reply.vstores) {
            self.adopt_vertex_reply(vid, vstore)?;
        }
        for ((source, target), estore) in reply.pairs.into_iter().zip(reply.estores) {
            self.adopt_edge_reply_by_pair(source, target, estore)?;
        }
        Ok(())
    }

    // Scope sync -----------------------------------------------------------

    /// Refreshes `vid` plus every incident edge and far endpoint held
    /// locally, issuing at most one batched request per remote owner.
    pub fn synchronize_scope(&self, vid: Gvid) -> Result<()> {
        if self.canonical_edges {
            for (owner, request) in self.scope_batches_by_pair(vid)? {
                let reply: BlockSyncByPair<V, E> =
                    self.rpc
                        .remote_request(owner, op::BLOCK_SYNC_BY_PAIR, &request)?;
                self.adopt_block_reply_by_pair(reply)?;
            }
        } else {
            for (owner, request) in self.scope_batches_by_id(vid)? {
                let reply: BlockSyncByEid<V, E> =
                    self.rpc
                        .remote_request(owner, op::BLOCK_SYNC_BY_ID, &request)?;
                self.adopt_block_reply_by_id(reply)?;
            }
        }
        Ok(())
    }

    pub fn synchronize_scope_async(&self, vid: Gvid) -> Result<()> {
        if self.canonical_edges {
            for (owner, request) in self.scope_batches_by_pair(vid)? {
                self.pending_async.fetch_add(1, Ordering::SeqCst);
                let sent =
                    self.rpc
                        .remote_call(owner, op::BLOCK_SYNC_BY_PAIR_ASYNC, &(self.me(), request));
                if sent.is_err() {
                    self.pending_async.fetch_sub(1, Ordering::SeqCst);
                    return sent;
                }
            }
        } else {
            for (owner, request) in self.scope_batches_by_id(vid)? {
                self.pending_async.fetch_add(1, Ordering::SeqCst);
                let sent =
                    self.rpc
                        .remote_call(owner, op::BLOCK_SYNC_BY_ID_ASYNC, &(self.me(), request));
                if sent.is_err() {
                    self.pending_async.fetch_sub(1, Ordering::SeqCst);
                    return sent;
                }
            }
        }
        Ok(())
    }

    /// Collects the ghost objects in `vid`'s scope, grouped by owner.
    fn scope_ghosts(&self, vid: Gvid) -> Result<ScopeGhosts> {
        let l = self.lvid_of(vid).ok_or(FragmentError::NotLocal)?;
        let me = self.me();
        let mut ghosts = ScopeGhosts::default();
        let mut seen: FxHashSet<Lvid> = FxHashSet::default();
        seen.insert(l);

        if !self.owned_locally(l) {
            ghosts
                .vertices
                .push((self.local_vid_owner[l.idx()], l));
        }

        let incident: Vec<Leid> = self
            .store
            .in_edge_ids(l)?
            .iter()
            .chain(self.store.out_edge_ids(l)?.iter())
            .copied()
            .collect();
        for le in incident {
            let src = self.store.source(le)?;
            let dst = self.store.target(le)?;
            let edge_owner = self.local_vid_owner[dst.idx()];
            if edge_owner != me {
                ghosts.edges.push((edge_owner, le));
            }
            let far = if dst == l { src } else { dst };
            let far_owner = self.local_vid_owner[far.idx()];
            if far_owner != me && seen.insert(far) {
                ghosts.vertices.push((far_owner, far));
            }
        }
        Ok(ghosts)
    }

    fn scope_batches_by_id(
        &self,
        vid: Gvid,
    ) -> Result<FxHashMap<ProcId, BlockSyncByEid<V, E>>> {
        let ghosts = self.scope_ghosts(vid)?;
        let mut batches: FxHashMap<ProcId, BlockSyncByEid<V, E>> = FxHashMap::default();
        for (owner, l) in ghosts.vertices {
            let (version, data) = self.store.vertex_sync_parts(l)?;
            let batch = batches.entry(owner).or_default();
            batch.vids.push(self.l2g_vid[l.idx()]);
            batch.vid_versions.push(version);
            batch.vstores.push(ConditionalStore::from_parts(version, data));
        }
        for (owner, le) in ghosts.edges {
            let (version, data) = self.store.edge_sync_parts(le)?;
            let batch = batches.entry(owner).or_default();
            batch.eids.push(self.l2g_eid[le.idx()]);
            batch.eid_versions.push(version);
            batch.estores.push(ConditionalStore::from_parts(version, data));
        }
        batches.retain(|_, b| !b.is_empty());
        Ok(batches)
    }

    fn scope_batches_by_pair(
        &self,
        vid: Gvid,
    ) -> Result<FxHashMap<ProcId, BlockSyncByPair<V, E>>> {
        let ghosts = self.scope_ghosts(vid)?;
        let mut batches: FxHashMap<ProcId, BlockSyncByPair<V, E>> = FxHashMap::default();
        for (owner, l) in ghosts.vertices {
            let (version, data) = self.store.vertex_sync_parts(l)?;
            let batch = batches.entry(owner).or_default();
            batch.vids.push(self.l2g_vid[l.idx()]);
            batch.vid_versions.push(version);
            batch.vstores.push(ConditionalStore::from_parts(version, data));
        }
        for (owner, le) in ghosts.edges {
            let (version, data) = self.store.edge_sync_parts(le)?;
            let batch = batches.entry(owner).or_default();
            batch.pairs.push(self.edge_pair_of(le)?);
            batch.eid_versions.push(version);
            batch.estores.push(ConditionalStore::from_parts(version, data));
        }
        batches.retain(|_, b| !b.is_empty());
        Ok(batches)
    }

    // Quiescence -----------------------------------------------------------

    /// Spins (yielding) until every asynchronous sync issued by this
    /// process has been answered.
    pub fn wait_for_all_async_syncs(&self) {
        while self.pending_async.load(Ordering::SeqCst) != 0 {
            std::thread::yield_now();
        }
    }

    /// Number of asynchronous syncs still in flight.
    pub fn pending_async_updates(&self) -> usize {
        self.pending_async.load(Ordering::SeqCst)
    }

    // Dispatch of the sync surface -----------------------------------------

    pub(super) fn dispatch_sync(
        &self,
        _from: ProcId,
        method: u16,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        match method {
            op::VERTEX_SYNC => {
                let (vid, version, cond): (Gvid, u64, ConditionalStore<V>) = decode(payload)?;
                encode(&self.owner_vertex_sync(vid, version, cond)?)
            }
            op::VERTEX_SYNC_ASYNC => {
                let (src, vid, version, cond): (ProcId, Gvid, u64, ConditionalStore<V>) =
                    decode(payload)?;
                let reply = self.owner_vertex_sync(vid, version, cond)?;
                self.rpc
                    .remote_call(src, op::VERTEX_SYNC_REPLY, &(vid, reply))?;
                Ok(Vec::new())
            }
            op::VERTEX_SYNC_REPLY => {
                let (vid, reply): (Gvid, ConditionalStore<V>) = decode(payload)?;
                self.adopt_vertex_reply(vid, reply)?;
                self.pending_async.fetch_sub(1, Ordering::SeqCst);
                Ok(Vec::new())
            }
            op::EDGE_SYNC_BY_ID => {
                let (eid, version, cond): (Geid, u64, ConditionalStore<E>) = decode(payload)?;
                encode(&self.owner_edge_sync_by_id(eid, version, cond)?)
            }
            op::EDGE_SYNC_BY_ID_ASYNC => {
                let (src, eid, version, cond): (ProcId, Geid, u64, ConditionalStore<E>) =
                    decode(payload)?;
                let reply = self.owner_edge_sync_by_id(eid, version, cond)?;
                self.rpc
                    .remote_call(src, op::EDGE_SYNC_BY_ID_REPLY, &(eid, reply))?;
                Ok(Vec::new())
            }
            op::EDGE_SYNC_BY_ID_REPLY => {
                let (eid, reply): (Geid, ConditionalStore<E>) = decode(payload)?;
                self.adopt_edge_reply(eid, reply)?;
                self.pending_async.fetch_sub(1, Ordering::SeqCst);
                Ok(Vec::new())
            }
            op::EDGE_SYNC_BY_PAIR => {
                let (source, target, version, cond): (Gvid, Gvid, u64, ConditionalStore<E>) =
                    decode(payload)?;
                encode(&self.owner_edge_sync_by_pair(source, target, version, cond)?)
            }
            op::EDGE_SYNC_BY_PAIR_ASYNC => {
                let (src, source, target, version, cond): (
                    ProcId,
                    Gvid,
                    Gvid,
                    u64,
                    ConditionalStore<E>,
                ) = decode(payload)?;
                let reply = self.owner_edge_sync_by_pair(source, target, version, cond)?;
                self.rpc
                    .remote_call(src, op::EDGE_SYNC_BY_PAIR_REPLY, &(source, target, reply))?;
                Ok(Vec::new())
            }
            op::EDGE_SYNC_BY_PAIR_REPLY => {
                let (source, target, reply): (Gvid, Gvid, ConditionalStore<E>) = decode(payload)?;
                self.adopt_edge_reply_by_pair(source, target, reply)?;
                self.pending_async.fetch_sub(1, Ordering::SeqCst);
                Ok(Vec::new())
            }
            op::BLOCK_SYNC_BY_ID => {
                let request: BlockSyncByEid<V, E> = decode(payload)?;
                encode(&self.owner_block_sync_by_id(request)?)
            }
            op::BLOCK_SYNC_BY_ID_ASYNC => {
                let (src, request): (ProcId, BlockSyncByEid<V, E>) = decode(payload)?;
                let reply = self.owner_block_sync_by_id(request)?;
                self.rpc.remote_call(src, op::BLOCK_SYNC_BY_ID_REPLY, &reply)?;
                Ok(Vec::new())
            }
            op::BLOCK_SYNC_BY_ID_REPLY => {
                let reply: BlockSyncByEid<V, E> = decode(payload)?;
                self.adopt_block_reply_by_id(reply)?;
                self.pending_async.fetch_sub(1, Ordering::SeqCst);
                Ok(Vec::new())
            }
            op::BLOCK_SYNC_BY_PAIR => {
                let request: BlockSyncByPair<V, E> = decode(payload)?;
                encode(&self.owner_block_sync_by_pair(request)?)
            }
            op::BLOCK_SYNC_BY_PAIR_ASYNC => {
                let (src, request): (ProcId, BlockSyncByPair<V, E>) = decode(payload)?;
                let reply = self.owner_block_sync_by_pair(request)?;
                self.rpc
                    .remote_call(src, op::BLOCK_SYNC_BY_PAIR_REPLY, &reply)?;
                Ok(Vec::new())
            }
            op::BLOCK_SYNC_BY_PAIR_REPLY => {
                let reply: BlockSyncByPair<V, E> = decode(payload)?;
                self.adopt_block_reply_by_pair(reply)?;
                self.pending_async.fetch_sub(1, Ordering::SeqCst);
                Ok(Vec::new())
            }
            _ => Err(FragmentError::Transport("unknown fragment method")),
        }
    }
}

/// Ghost objects in one vertex's scope, tagged with their owners.
#[derive(Default)]
struct ScopeGhosts {
    vertices: Vec<(ProcId, Lvid)>,
    edges: Vec<(ProcId, Leid)>,
}
