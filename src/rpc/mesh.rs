//! In-process transport joining a fixed group of peer endpoints.
//!
//! Every endpoint owns one incoming channel fed by every peer. A delivery
//! thread drains it, completing replies and broadcasts inline and handing
//! calls and requests to a single handler thread, which preserves the
//! per-(source, destination) FIFO the protocol relies on. Handlers must not
//! issue blocking requests of their own; nothing in the substrate does.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Barrier, Weak};
use std::thread;

use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FragmentError, Result};
use crate::types::ProcId;

use super::frame::{control, decode, encode, Frame, ObjectId, CONTROL_OBJECT};
use super::RpcObject;

type ReplyResult = std::result::Result<Vec<u8>, String>;

/// Outbound traffic counters, mostly useful in tests and diagnostics.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MeshStats {
    pub calls_sent: u64,
    pub requests_sent: u64,
}

pub struct Mesh;

impl Mesh {
    /// Creates `nprocs` connected endpoints and spawns their service
    /// threads. The threads hold only weak references and exit once every
    /// endpoint has been dropped.
    pub fn create(nprocs: usize) -> Vec<Arc<MeshEndpoint>> {
        assert!(nprocs > 0, "mesh needs at least one process");
        let barrier = Arc::new(Barrier::new(nprocs));

        let mut senders = Vec::with_capacity(nprocs);
        let mut receivers = Vec::with_capacity(nprocs);
        for _ in 0..nprocs {
            let (tx, rx) = mpsc::channel::<Frame>();
            senders.push(tx);
            receivers.push(rx);
        }

        let endpoints: Vec<Arc<MeshEndpoint>> = (0..nprocs)
            .map(|p| {
                Arc::new(MeshEndpoint {
                    proc: ProcId(p as u16),
                    nprocs,
                    peers: senders.clone(),
                    objects: RwLock::new(FxHashMap::default()),
                    next_object: AtomicU32::new(CONTROL_OBJECT + 1),
                    next_seq: AtomicU64::new(0),
                    pending: Mutex::new(FxHashMap::default()),
                    barrier: Arc::clone(&barrier),
                    bcast: Mutex::new(None),
                    bcast_ready: Condvar::new(),
                    calls_sent: AtomicU64::new(0),
                    requests_sent: AtomicU64::new(0),
                })
            })
            .collect();

        for (p, rx) in receivers.into_iter().enumerate() {
            let (handler_tx, handler_rx) = mpsc::channel::<Frame>();
            let weak = Arc::downgrade(&endpoints[p]);
            thread::Builder::new()
                .name(format!("mesh-deliver-{p}"))
                .spawn(move || delivery_loop(weak, rx, handler_tx))
                .expect("spawn delivery thread");

            let weak = Arc::downgrade(&endpoints[p]);
            thread::Builder::new()
                .name(format!("mesh-handle-{p}"))
                .spawn(move || handler_loop(weak, handler_rx))
                .expect("spawn handler thread");
        }

        endpoints
    }
}

/// One process's attachment to the group.
pub struct MeshEndpoint {
    proc: ProcId,
    nprocs: usize,
    peers: Vec<Sender<Frame>>,
    objects: RwLock<FxHashMap<ObjectId, Weak<dyn RpcObject>>>,
    next_object: AtomicU32,
    next_seq: AtomicU64,
    pending: Mutex<FxHashMap<u64, Sender<ReplyResult>>>,
    barrier: Arc<Barrier>,
    bcast: Mutex<Option<Vec<u8>>>,
    bcast_ready: Condvar,
    calls_sent: AtomicU64,
    requests_sent: AtomicU64,
}

impl MeshEndpoint {
    pub fn proc_id(&self) -> ProcId {
        self.proc
    }

    pub fn num_procs(&self) -> usize {
        self.nprocs
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats {
            calls_sent: self.calls_sent.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
        }
    }

    /// Binds a dispatch target and returns its group-wide id. Every process
    /// must register the same objects in the same order. The endpoint keeps
    /// only a weak reference; the caller owns the object's lifetime.
    pub fn register(&self, object: Arc<dyn RpcObject>) -> ObjectId {
        let id = self.next_object.fetch_add(1, Ordering::SeqCst);
        self.objects.write().insert(id, Arc::downgrade(&object));
        id
    }

    /// Allocates an object id, builds the object around the handle bound to
    /// that id, and registers it. For objects that route their own traffic.
    pub fn register_with<T, F>(endpoint: &Arc<MeshEndpoint>, build: F) -> Arc<T>
    where
        T: RpcObject + 'static,
        F: FnOnce(super::RpcHandle) -> T,
    {
        let id = endpoint.next_object.fetch_add(1, Ordering::SeqCst);
        let object = Arc::new(build(super::RpcHandle::new(Arc::clone(endpoint), id)));
        let as_dyn = Arc::clone(&object) as Arc<dyn RpcObject>;
        endpoint.objects.write().insert(id, Arc::downgrade(&as_dyn));
        object
    }

    fn send_frame(&self, dest: ProcId, frame: Frame) -> Result<()> {
        let sender = self
            .peers
            .get(dest.idx())
            .ok_or(FragmentError::Transport("destination out of range"))?;
        sender
            .send(frame)
            .map_err(|_| FragmentError::Transport("peer channel closed"))
    }

    /// Fire-and-forget invocation; returns once the frame is enqueued.
    pub fn remote_call(
        &self,
        dest: ProcId,
        obj: ObjectId,
        method: u16,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.calls_sent.fetch_add(1, Ordering::Relaxed);
        self.send_frame(
            dest,
            Frame::Call {
                from: self.proc,
                obj,
                method,
                payload,
            },
        )
    }

    /// Blocking invocation; waits for the peer's reply. A failure on the
    /// remote side surfaces here as [`FragmentError::RemoteFailed`].
    pub fn remote_request(
        &self,
        dest: ProcId,
        obj: ObjectId,
        method: u16,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>> {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel::<ReplyResult>();
        self.pending.lock().insert(seq, tx);

        let sent = self.send_frame(
            dest,
            Frame::Request {
                from: self.proc,
                seq,
                obj,
                method,
                payload,
            },
        );
        if let Err(err) = sent {
            self.pending.lock().remove(&seq);
            return Err(err);
        }

        match rx.recv() {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(message)) => Err(FragmentError::RemoteFailed(message)),
            Err(_) => Err(FragmentError::Transport("reply channel closed")),
        }
    }

    /// Collective barrier. Before parking, each process flushes its channel
    /// to every peer with a no-op request, so all calls issued before the
    /// barrier are handled before any process leaves it.
    pub fn comm_barrier(&self) -> Result<()> {
        for p in 0..self.nprocs {
            let dest = ProcId(p as u16);
            if dest != self.proc {
                self.remote_request(dest, CONTROL_OBJECT, control::PING, Vec::new())?;
            }
        }
        self.barrier.wait();
        Ok(())
    }

    /// Root side of a one-shot broadcast: ships `value` to every peer.
    pub fn broadcast_send<T: Serialize>(&self, value: &T) -> Result<()> {
        let payload = encode(value)?;
        for p in 0..self.nprocs {
            let dest = ProcId(p as u16);
            if dest != self.proc {
                self.send_frame(
                    dest,
                    Frame::Broadcast {
                        payload: payload.clone(),
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Receiver side of a one-shot broadcast: blocks until a root payload
    /// arrives.
    pub fn broadcast_recv<T: DeserializeOwned>(&self) -> Result<T> {
        let mut slot = self.bcast.lock();
        while slot.is_none() {
            self.bcast_ready.wait(&mut slot);
        }
        let payload = slot.take().expect("broadcast slot filled");
        drop(slot);
        decode(&payload)
    }

    fn complete(&self, seq: u64, result: ReplyResult) {
        match self.pending.lock().remove(&seq) {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => tracing::warn!(seq, "reply for unknown request sequence"),
        }
    }

    fn deliver_broadcast(&self, payload: Vec<u8>) {
        let mut slot = self.bcast.lock();
        *slot = Some(payload);
        self.bcast_ready.notify_all();
    }

    fn dispatch(&self, from: ProcId, obj: ObjectId, method: u16, payload: &[u8]) -> Result<Vec<u8>> {
        if obj == CONTROL_OBJECT {
            return match method {
                control::PING => Ok(Vec::new()),
                _ => Err(FragmentError::Transport("unknown control method")),
            };
        }
        let target = self
            .objects
            .read()
            .get(&obj)
            .and_then(Weak::upgrade)
            .ok_or(FragmentError::Transport("no such rpc object"))?;
        target.dispatch(from, method, payload)
    }
}

fn delivery_loop(endpoint: Weak<MeshEndpoint>, rx: Receiver<Frame>, handler: Sender<Frame>) {
    for frame in rx {
        let Some(endpoint) = endpoint.upgrade() else {
            return;
        };
        match frame {
            Frame::Reply { seq, result } => endpoint.complete(seq, result),
            Frame::Broadcast { payload } => endpoint.deliver_broadcast(payload),
            other => {
                if handler.send(other).is_err() {
                    return;
                }
            }
        }
    }
}

fn handler_loop(endpoint: Weak<MeshEndpoint>, rx: Receiver<Frame>) {
    for frame in rx {
        let Some(endpoint) = endpoint.upgrade() else {
            return;
        };
        match frame {
            Frame::Call {
                from,
                obj,
                method,
                payload,
            } => {
                if let Err(err) = endpoint.dispatch(from, obj, method, &payload) {
                    tracing::warn!(%from, obj, method, %err, "fire-and-forget handler failed");
                }
            }
            Frame::Request {
                from,
                seq,
                obj,
                method,
                payload,
            } => {
                let result = endpoint
                    .dispatch(from, obj, method, &payload)
                    .map_err(|e| e.to_string());
                if endpoint
                    .send_frame(from, Frame::Reply { seq, result })
                    .is_err()
                {
                    tracing::warn!(%from, seq, "requester vanished before reply");
                }
            }
            Frame::Reply { .. } | Frame::Broadcast { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Recorder {
        log: Mutex<Vec<u32>>,
        bumps: AtomicUsize,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                log: Mutex::new(Vec::new()),
                bumps: AtomicUsize::new(0),
            })
        }
    }

    impl RpcObject for Recorder {
        fn dispatch(&self, _from: ProcId, method: u16, payload: &[u8]) -> Result<Vec<u8>> {
            match method {
                0 => {
                    let value: u32 = decode(payload)?;
                    self.log.lock().push(value);
                    self.bumps.fetch_add(1, Ordering::SeqCst);
                    Ok(Vec::new())
                }
                1 => {
                    let value: u32 = decode(payload)?;
                    encode(&(value * 2))
                }
                2 => Err(FragmentError::NotLocal),
                _ => Err(FragmentError::Transport("unknown method")),
            }
        }
    }

    fn pair() -> (Vec<Arc<MeshEndpoint>>, Vec<Arc<Recorder>>) {
        let endpoints = Mesh::create(2);
        let objects: Vec<Arc<Recorder>> = endpoints
            .iter()
            .map(|ep| {
                let recorder = Recorder::new();
                ep.register(recorder.clone() as Arc<dyn RpcObject>);
                recorder
            })
            .collect();
        (endpoints, objects)
    }

    #[test]
    fn request_reply_round_trip() {
        let (endpoints, _objects) = pair();
        let obj = CONTROL_OBJECT + 1;
        let reply = endpoints[0]
            .remote_request(ProcId(1), obj, 1, encode(&21u32).unwrap())
            .unwrap();
        let doubled: u32 = decode(&reply).unwrap();
        assert_eq!(doubled, 42);
    }

    #[test]
    fn remote_failure_propagates() {
        let (endpoints, _objects) = pair();
        let obj = CONTROL_OBJECT + 1;
        let err = endpoints[0]
            .remote_request(ProcId(1), obj, 2, Vec::new())
            .unwrap_err();
        assert!(matches!(err, FragmentError::RemoteFailed(_)));
    }

    #[test]
    fn calls_are_fifo_per_pair() {
        let (endpoints, objects) = pair();
        let obj = CONTROL_OBJECT + 1;
        for i in 0..100u32 {
            endpoints[0]
                .remote_call(ProcId(1), obj, 0, encode(&i).unwrap())
                .unwrap();
        }
        // A request on the same channel flushes everything in front of it.
        endpoints[0]
            .remote_request(ProcId(1), obj, 1, encode(&0u32).unwrap())
            .unwrap();
        let log = objects[1].log.lock();
        assert_eq!(log.len(), 100);
        assert!(log.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn barrier_flushes_pending_calls() {
        let (endpoints, objects) = pair();
        let obj = CONTROL_OBJECT + 1;
        for i in 0..50u32 {
            endpoints[0]
                .remote_call(ProcId(1), obj, 0, encode(&i).unwrap())
                .unwrap();
        }
        let peer = Arc::clone(&endpoints[1]);
        let joiner = thread::spawn(move || peer.comm_barrier());
        endpoints[0].comm_barrier().unwrap();
        joiner.join().unwrap().unwrap();
        assert_eq!(objects[1].bumps.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn broadcast_reaches_all_peers() {
        let endpoints = Mesh::create(3);
        let payload = vec!["a".to_string(), "b".to_string()];
        endpoints[0].broadcast_send(&payload).unwrap();
        for ep in &endpoints[1..] {
            let got: Vec<String> = ep.broadcast_recv().unwrap();
            assert_eq!(got, payload);
        }
    }

    #[test]
    fn self_request_is_served() {
        let (endpoints, _objects) = pair();
        let obj = CONTROL_OBJECT + 1;
        let reply = endpoints[0]
            .remote_request(ProcId(0), obj, 1, encode(&5u32).unwrap())
            .unwrap();
        let doubled: u32 = decode(&reply).unwrap();
        assert_eq!(doubled, 10);
    }
}
