use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FragmentError>;

/// Error taxonomy of the substrate.
///
/// Only [`FragmentError::EdgeAbsent`] is a condition callers are expected to
/// recover from. Every other variant indicates a protocol or programmer
/// error; a cluster computation that observes one should halt rather than
/// continue on possibly corrupt replicas.
#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("corruption detected: {0}")]
    Corruption(&'static str),
    #[error("object not present in local fragment")]
    NotLocal,
    #[error("edge does not exist")]
    EdgeAbsent,
    #[error("remote edge request refused: canonical edge numbering in use")]
    RoutingRefused,
    #[error("index out of range: {0}")]
    IndexOutOfRange(&'static str),
    #[error("self-loop rejected at vertex {0}")]
    SelfLoopRejected(u32),
    #[error("version consistency violated: {0}")]
    VersionConsistency(&'static str),
    #[error("ownership unresolved for global id {0}")]
    OwnerUnknown(u32),
    #[error("transport failure: {0}")]
    Transport(&'static str),
    #[error("remote peer failed: {0}")]
    RemoteFailed(String),
}
