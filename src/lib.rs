pub mod atoms;
pub mod directory;
pub mod error;
pub mod fragment;
pub mod rpc;
pub mod store;
pub mod types;

pub use crate::atoms::{
    partition_atoms, AtomIndex, AtomRef, AtomResolver, AtomSource, InMemoryAtom, InMemoryAtomSet,
};
pub use crate::directory::OwnerDirectory;
pub use crate::error::{FragmentError, Result};
pub use crate::fragment::{
    BlockSyncByEid, BlockSyncByPair, ConditionalStore, GraphFragment, StoreOptions,
};
pub use crate::rpc::{Mesh, MeshEndpoint, MeshStats, RpcHandle, RpcObject};
pub use crate::store::LocalStore;
pub use crate::types::{Geid, GraphData, Gvid, Leid, Lvid, ProcId, VersionTag, VertexColor};
