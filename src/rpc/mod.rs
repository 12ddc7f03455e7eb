//! Object-bound typed messaging across a fixed group of peer processes.

mod frame;
mod mesh;

pub use frame::{control, decode, encode, Frame, ObjectId, CONTROL_OBJECT};
pub use mesh::{Mesh, MeshEndpoint, MeshStats};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::types::ProcId;

/// A dispatch target reachable from every peer. Implementors decode the
/// method id and payload, perform the operation, and encode the reply.
pub trait RpcObject: Send + Sync {
    fn dispatch(&self, from: ProcId, method: u16, payload: &[u8]) -> Result<Vec<u8>>;
}

/// A port binding one registered object to the transport. All traffic sent
/// through the handle lands on the same object id at the destination, which
/// is what lets several substrate instances coexist in one process.
#[derive(Clone)]
pub struct RpcHandle {
    endpoint: Arc<MeshEndpoint>,
    obj: ObjectId,
}

impl RpcHandle {
    pub fn new(endpoint: Arc<MeshEndpoint>, obj: ObjectId) -> Self {
        Self { endpoint, obj }
    }

    pub fn proc_id(&self) -> ProcId {
        self.endpoint.proc_id()
    }

    pub fn num_procs(&self) -> usize {
        self.endpoint.num_procs()
    }

    pub fn endpoint(&self) -> &Arc<MeshEndpoint> {
        &self.endpoint
    }

    /// Fire-and-forget invocation of `method` on the bound object at `dest`.
    pub fn remote_call<A: Serialize>(&self, dest: ProcId, method: u16, args: &A) -> Result<()> {
        self.endpoint.remote_call(dest, self.obj, method, encode(args)?)
    }

    /// Blocking invocation of `method` on the bound object at `dest`.
    pub fn remote_request<A: Serialize, R: DeserializeOwned>(
        &self,
        dest: ProcId,
        method: u16,
        args: &A,
    ) -> Result<R> {
        let reply = self
            .endpoint
            .remote_request(dest, self.obj, method, encode(args)?)?;
        decode(&reply)
    }

    pub fn comm_barrier(&self) -> Result<()> {
        self.endpoint.comm_barrier()
    }
}
