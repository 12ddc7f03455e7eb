//! Fragment construction: one pass over this process's atoms.
//!
//! Process 0 partitions the atom index and broadcasts the assignment; every
//! process then merges its atoms' id maps, loads structure and data into a
//! fresh local store, publishes ownership into the directories, and meets
//! the group at a barrier before any cross-fragment traffic starts.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::atoms::{partition_atoms, AtomIndex, AtomResolver, AtomSource};
use crate::directory::OwnerDirectory;
use crate::error::{FragmentError, Result};
use crate::rpc::MeshEndpoint;
use crate::store::LocalStore;
use crate::types::{Geid, GraphData, Gvid, Leid, Lvid, ProcId};

use super::GraphFragment;

/// Construction-time options for the local store backing.
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    /// When set, the packed `vdata.<proc>` / `edata.<proc>` files are
    /// written here once loading completes.
    pub data_dir: Option<PathBuf>,
}

impl<V: GraphData, E: GraphData> GraphFragment<V, E> {
    /// Builds this process's fragment. Every process of the group must call
    /// this concurrently with the same index; the call participates in
    /// collective broadcasts and barriers.
    pub fn assemble(
        endpoint: Arc<MeshEndpoint>,
        index: &AtomIndex,
        resolver: &dyn AtomResolver<V, E>,
        options: StoreOptions,
    ) -> Result<Arc<Self>> {
        let me = endpoint.proc_id();
        let nprocs = endpoint.num_procs();

        let vid_owners = OwnerDirectory::register(&endpoint);
        let eid_owners = OwnerDirectory::register(&endpoint);
        // Everyone must have its directories reachable before any set().
        endpoint.comm_barrier()?;

        let partitions: Vec<Vec<usize>> = if me == ProcId(0) {
            let partitions = partition_atoms(index, nprocs);
            endpoint.broadcast_send(&partitions)?;
            partitions
        } else {
            endpoint.broadcast_recv()?
        };

        let mut atom_to_proc = vec![ProcId(0); index.atoms.len()];
        for (proc, atoms) in partitions.iter().enumerate() {
            for &atom in atoms {
                atom_to_proc[atom] = ProcId(proc as u16);
            }
        }

        tracing::info!(%me, atoms = partitions[me.idx()].len(), "loading id maps");
        let mut atoms: Vec<Box<dyn AtomSource<V, E>>> = partitions[me.idx()]
            .iter()
            .map(|&a| resolver.open(&index.atoms[a]))
            .collect::<Result<_>>()?;
        for atom in &mut atoms {
            atom.load_id_maps()?;
        }

        let canonical_edges = match atoms.first() {
            Some(atom) => atom.global_eids().is_empty(),
            None => {
                tracing::warn!(%me, "empty partition; assuming global edge ids");
                false
            }
        };
        if canonical_edges {
            tracing::warn!("canonical edge numbering in use; edge ids are only locally valid");
        }

        tracing::info!(%me, "generating mappings");
        let mut l2g_vid: Vec<Gvid> = atoms
            .iter()
            .flat_map(|a| a.global_vids().iter().copied())
            .collect();
        l2g_vid.sort_unstable();
        l2g_vid.dedup();
        let g2l_vid: FxHashMap<Gvid, Lvid> = l2g_vid
            .iter()
            .enumerate()
            .map(|(i, &g)| (g, Lvid(i as u32)))
            .collect();
        let mut local_vid_owner = vec![ProcId(0); l2g_vid.len()];

        let mut l2g_eid: Vec<Geid> = Vec::new();
        let mut g2l_eid: FxHashMap<Geid, Leid> = FxHashMap::default();
        if !canonical_edges {
            l2g_eid = atoms
                .iter()
                .flat_map(|a| a.global_eids().iter().copied())
                .collect();
            l2g_eid.sort_unstable();
            l2g_eid.dedup();
            g2l_eid = l2g_eid
                .iter()
                .enumerate()
                .map(|(i, &g)| (g, Leid(i as u32)))
                .collect();
        }

        tracing::info!(%me, "loading structure");
        for atom in &mut atoms {
            atom.load_structure()?;
        }
        // Dedup edges replicated across atoms by their global endpoint
        // pair; in canonical mode the assignment order of this map is the
        // local edge numbering.
        let mut pair_ids: BTreeMap<(Gvid, Gvid), Leid> = BTreeMap::new();
        for atom in &atoms {
            for &(s, d) in atom.edge_endpoints() {
                let pair = (
                    atom.global_vids()[s as usize],
                    atom.global_vids()[d as usize],
                );
                let next = Leid(pair_ids.len() as u32);
                pair_ids.entry(pair).or_insert(next);
            }
        }
        if canonical_edges {
            l2g_eid = (0..pair_ids.len() as u32).map(Geid).collect();
            g2l_eid = (0..pair_ids.len() as u32)
                .map(|i| (Geid(i), Leid(i)))
                .collect();
        }

        let num_local_edges = pair_ids.len().max(l2g_eid.len());
        let mut store: LocalStore<V, E> = LocalStore::new(l2g_vid.len(), num_local_edges);
        let mut edge_loaded = vec![false; num_local_edges];

        for atom in &atoms {
            for j in 0..atom.edge_endpoints().len() {
                let le =
                    resolve_local_eid(atom.as_ref(), j, canonical_edges, &pair_ids, &g2l_eid)?;
                if edge_loaded[le.idx()] {
                    continue;
                }
                let (s, d) = atom.edge_endpoints()[j];
                let lsrc = g2l_vid[&atom.global_vids()[s as usize]];
                let ldst = g2l_vid[&atom.global_vids()[d as usize]];
                store.add_edge(le, lsrc, ldst)?;
                edge_loaded[le.idx()] = true;
            }

            for (j, &color) in atom.vertex_colors().iter().enumerate() {
                let gvid = atom.global_vids()[j];
                let l = g2l_vid[&gvid];
                let owner = atom_to_proc[atom.owning_atom()[j] as usize];
                local_vid_owner[l.idx()] = owner;
                store.set_color(l, color)?;
                if owner == me {
                    vid_owners.set(gvid.0, me)?;
                }
            }
        }

        if !canonical_edges {
            tracing::info!(%me, "publishing edge ownership");
            for atom in &atoms {
                for (j, &geid) in atom.global_eids().iter().enumerate() {
                    let (_, d) = atom.edge_endpoints()[j];
                    let target = g2l_vid[&atom.global_vids()[d as usize]];
                    if local_vid_owner[target.idx()] == me {
                        eid_owners.set(geid.0, me)?;
                    }
                }
            }
        }

        tracing::info!(%me, "loading data");
        for atom in &mut atoms {
            atom.load_all()?;
            for (j, data) in atom.vertex_data().iter().enumerate() {
                let l = g2l_vid[&atom.global_vids()[j]];
                *store.vertex_data_mut(l)? = data.clone();
            }
            for (j, data) in atom.edge_data().iter().enumerate() {
                let le =
                    resolve_local_eid(atom.as_ref(), j, canonical_edges, &pair_ids, &g2l_eid)?;
                *store.edge_data_mut(le)? = data.clone();
            }
            atom.clear();
        }

        store.finalize();
        if let Some(dir) = &options.data_dir {
            store.save_data(dir, me)?;
        }

        let global_vertices = index.num_vertices;
        let global_edges = index.num_edges;
        let fragment = MeshEndpoint::register_with(&endpoint, move |rpc| GraphFragment {
            rpc,
            store,
            g2l_vid,
            l2g_vid,
            g2l_eid,
            l2g_eid,
            local_vid_owner,
            vid_owners,
            eid_owners,
            canonical_edges,
            global_vertices,
            global_edges,
            pending_async: AtomicUsize::new(0),
        });
        tracing::info!(%me, "fragment construction complete");
        fragment.rpc.comm_barrier()?;
        Ok(fragment)
    }
}

/// Maps an atom-local edge position to the fragment-local edge id, through
/// the global edge id in global numbering mode and through the endpoint
/// pair otherwise.
fn resolve_local_eid<V, E>(
    atom: &dyn AtomSource<V, E>,
    j: usize,
    canonical_edges: bool,
    pair_ids: &BTreeMap<(Gvid, Gvid), Leid>,
    g2l_eid: &FxHashMap<Geid, Leid>,
) -> Result<Leid> {
    if canonical_edges {
        let (s, d) = atom.edge_endpoints()[j];
        let pair = (
            atom.global_vids()[s as usize],
            atom.global_vids()[d as usize],
        );
        pair_ids
            .get(&pair)
            .copied()
            .ok_or(FragmentError::Corruption("edge pair missing from numbering"))
    } else {
        let geid = atom.global_eids()[j];
        g2l_eid
            .get(&geid)
            .copied()
            .ok_or(FragmentError::Corruption("edge id missing from mapping"))
    }
}
