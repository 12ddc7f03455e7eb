//! Construction inputs: the atom index and the atom loader contract.
//!
//! Atoms are subgraph pieces produced by an offline partitioner. The file
//! formats and readers live outside the substrate; construction consumes
//! them through [`AtomSource`] and resolves index entries to sources
//! through [`AtomResolver`].

use serde::{Deserialize, Serialize};

use crate::error::{FragmentError, Result};
use crate::types::{Geid, Gvid, VertexColor};

/// One entry of the atom index: an opaque locator an [`AtomResolver`] can
/// open.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AtomRef {
    pub protocol: String,
    pub locator: String,
}

/// The cluster-wide construction manifest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AtomIndex {
    pub num_vertices: usize,
    pub num_edges: usize,
    pub atoms: Vec<AtomRef>,
}

/// Loader contract for one atom. Loading happens in three stages so a
/// construction pass never holds more than it needs: id maps, then
/// structure, then payload data.
pub trait AtomSource<V, E> {
    fn load_id_maps(&mut self) -> Result<()>;

    /// Global ids of the atom's vertices, indexed by atom-local position.
    fn global_vids(&self) -> &[Gvid];

    /// Global ids of the atom's edges. Empty means the cluster runs under
    /// canonical edge numbering.
    fn global_eids(&self) -> &[Geid];

    fn load_structure(&mut self) -> Result<()>;

    /// Edge endpoints as atom-local vertex positions.
    fn edge_endpoints(&self) -> &[(u32, u32)];

    /// The atom id owning each vertex, indexed by atom-local position.
    fn owning_atom(&self) -> &[u32];

    fn vertex_colors(&self) -> &[VertexColor];

    fn load_all(&mut self) -> Result<()>;

    fn vertex_data(&self) -> &[V];

    fn edge_data(&self) -> &[E];

    /// Drops loaded payloads; construction keeps at most one atom's data
    /// resident at a time.
    fn clear(&mut self);
}

/// Opens index entries. Implemented by external loaders; the in-memory
/// implementation below serves tests and embedders that already hold the
/// graph.
pub trait AtomResolver<V, E> {
    fn open(&self, atom: &AtomRef) -> Result<Box<dyn AtomSource<V, E>>>;
}

/// Splits the index's atoms into `nprocs` balanced buckets. Process 0
/// computes this and broadcasts the result so every peer agrees.
pub fn partition_atoms(index: &AtomIndex, nprocs: usize) -> Vec<Vec<usize>> {
    let mut buckets = vec![Vec::new(); nprocs];
    for atom in 0..index.atoms.len() {
        buckets[atom % nprocs].push(atom);
    }
    buckets
}

/// A fully materialized atom.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InMemoryAtom<V, E> {
    pub global_vids: Vec<Gvid>,
    pub global_eids: Vec<Geid>,
    pub edge_endpoints: Vec<(u32, u32)>,
    pub owning_atom: Vec<u32>,
    pub vertex_colors: Vec<VertexColor>,
    pub vertex_data: Vec<V>,
    pub edge_data: Vec<E>,
}

impl<V, E> AtomSource<V, E> for InMemoryAtom<V, E> {
    fn load_id_maps(&mut self) -> Result<()> {
        Ok(())
    }

    fn global_vids(&self) -> &[Gvid] {
        &self.global_vids
    }

    fn global_eids(&self) -> &[Geid] {
        &self.global_eids
    }

    fn load_structure(&mut self) -> Result<()> {
        Ok(())
    }

    fn edge_endpoints(&self) -> &[(u32, u32)] {
        &self.edge_endpoints
    }

    fn owning_atom(&self) -> &[u32] {
        &self.owning_atom
    }

    fn vertex_colors(&self) -> &[VertexColor] {
        &self.vertex_colors
    }

    fn load_all(&mut self) -> Result<()> {
        Ok(())
    }

    fn vertex_data(&self) -> &[V] {
        &self.vertex_data
    }

    fn edge_data(&self) -> &[E] {
        &self.edge_data
    }

    fn clear(&mut self) {
        self.vertex_data.clear();
        self.edge_data.clear();
    }
}

/// Resolver over a set of in-memory atoms addressed by position.
pub struct InMemoryAtomSet<V, E> {
    atoms: Vec<InMemoryAtom<V, E>>,
    num_vertices: usize,
    num_edges: usize,
}

impl<V: Clone, E: Clone> InMemoryAtomSet<V, E> {
    pub fn new(atoms: Vec<InMemoryAtom<V, E>>, num_vertices: usize, num_edges: usize) -> Self {
        Self {
            atoms,
            num_vertices,
            num_edges,
        }
    }

    /// The index describing this set; locators are atom positions.
    pub fn index(&self) -> AtomIndex {
        AtomIndex {
            num_vertices: self.num_vertices,
            num_edges: self.num_edges,
            atoms: (0..self.atoms.len())
                .map(|i| AtomRef {
                    protocol: "mem".to_string(),
                    locator: i.to_string(),
                })
                .collect(),
        }
    }
}

impl<V: Clone, E: Clone> AtomResolver<V, E> for InMemoryAtomSet<V, E>
where
    V: 'static,
    E: 'static,
{
    fn open(&self, atom: &AtomRef) -> Result<Box<dyn AtomSource<V, E>>> {
        if atom.protocol != "mem" {
            return Err(FragmentError::Corruption("unknown atom protocol"));
        }
        let position: usize = atom
            .locator
            .parse()
            .map_err(|_| FragmentError::Corruption("malformed atom locator"))?;
        let source = self
            .atoms
            .get(position)
            .ok_or(FragmentError::Corruption("atom locator out of range"))?
            .clone();
        Ok(Box::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_is_balanced_and_complete() {
        let index = AtomIndex {
            num_vertices: 0,
            num_edges: 0,
            atoms: (0..10)
                .map(|i| AtomRef {
                    protocol: "mem".to_string(),
                    locator: i.to_string(),
                })
                .collect(),
        };
        let buckets = partition_atoms(&index, 3);
        assert_eq!(buckets.len(), 3);
        let mut all: Vec<usize> = buckets.iter().flatten().copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
        let sizes: Vec<usize> = buckets.iter().map(Vec::len).collect();
        assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    }

    #[test]
    fn resolver_rejects_bad_locators() {
        let set: InMemoryAtomSet<u64, u64> = InMemoryAtomSet::new(vec![], 0, 0);
        let err = match set.open(&AtomRef {
            protocol: "file".to_string(),
            locator: "0".to_string(),
        }) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(matches!(err, FragmentError::Corruption(_)));

        let err = match set.open(&AtomRef {
            protocol: "mem".to_string(),
            locator: "9".to_string(),
        }) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(matches!(err, FragmentError::Corruption(_)));
    }
}
