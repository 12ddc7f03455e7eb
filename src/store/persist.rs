//! Packed per-process data files backing the local store.
//!
//! Two files per process, `vdata.<proc>` and `edata.<proc>`, each a packed
//! sequence of records `{ payload bytes, 1-byte flags, 8-byte version }`.
//! The payload is length-prefixed so variable-width payload encodings
//! round-trip byte-identically.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FragmentError, Result};
use crate::types::{GraphData, ProcId, VersionTag};

use super::LocalStore;

pub fn vertex_file_name(proc: ProcId) -> String {
    format!("vdata.{proc}")
}

pub fn edge_file_name(proc: ProcId) -> String {
    format!("edata.{proc}")
}

fn write_record<T: Serialize>(out: &mut impl Write, data: &T, tag: VersionTag) -> Result<()> {
    let payload =
        bincode::serialize(data).map_err(|e| FragmentError::Serialization(e.to_string()))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| FragmentError::Serialization("record payload exceeds u32 length".into()))?;
    out.write_all(&len.to_be_bytes())?;
    out.write_all(&payload)?;
    out.write_all(&[tag.flags_byte()])?;
    out.write_all(&tag.version().to_be_bytes())?;
    Ok(())
}

fn read_record<T: DeserializeOwned>(input: &mut impl Read) -> Result<(T, VersionTag)> {
    let mut len_buf = [0u8; 4];
    input
        .read_exact(&mut len_buf)
        .map_err(|_| FragmentError::Corruption("data record truncated"))?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    input
        .read_exact(&mut payload)
        .map_err(|_| FragmentError::Corruption("data record payload truncated"))?;
    let data =
        bincode::deserialize(&payload).map_err(|e| FragmentError::Serialization(e.to_string()))?;
    let mut tail = [0u8; 9];
    input
        .read_exact(&mut tail)
        .map_err(|_| FragmentError::Corruption("data record tail truncated"))?;
    let flags = tail[0];
    let version = u64::from_be_bytes(tail[1..9].try_into().expect("fixed slice"));
    Ok((data, VersionTag::from_parts(flags, version)))
}

fn expect_eof(input: &mut impl Read) -> Result<()> {
    let mut probe = [0u8; 1];
    match input.read(&mut probe)? {
        0 => Ok(()),
        _ => Err(FragmentError::Corruption("trailing bytes in data file")),
    }
}

impl<V: GraphData, E: GraphData> LocalStore<V, E> {
    /// Writes every vertex record to `vdata.<proc>` and every edge record to
    /// `edata.<proc>` under `dir`.
    pub fn save_data(&self, dir: &Path, proc: ProcId) -> Result<()> {
        let mut vout = BufWriter::new(File::create(dir.join(vertex_file_name(proc)))?);
        for i in 0..self.num_vertices() {
            let (data, tag) = self.vertex_record_parts(i);
            write_record(&mut vout, &data, tag)?;
        }
        vout.flush()?;

        let mut eout = BufWriter::new(File::create(dir.join(edge_file_name(proc)))?);
        for i in 0..self.num_edges() {
            let (data, tag) = self.edge_record_parts(i);
            write_record(&mut eout, &data, tag)?;
        }
        eout.flush()?;
        Ok(())
    }

    /// Restores every payload and version word from the packed files. The
    /// store's shape must match what was saved.
    pub fn load_data(&self, dir: &Path, proc: ProcId) -> Result<()> {
        let mut vin = BufReader::new(File::open(dir.join(vertex_file_name(proc)))?);
        for i in 0..self.num_vertices() {
            let (data, tag) = read_record::<V>(&mut vin)?;
            self.restore_vertex_record(i, data, tag);
        }
        expect_eof(&mut vin)?;

        let mut ein = BufReader::new(File::open(dir.join(edge_file_name(proc)))?);
        for i in 0..self.num_edges() {
            let (data, tag) = read_record::<E>(&mut ein)?;
            self.restore_edge_record(i, data, tag);
        }
        expect_eof(&mut ein)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Leid, Lvid};

    fn populated_store() -> LocalStore<String, u64> {
        let mut store: LocalStore<String, u64> = LocalStore::new(3, 2);
        store.add_edge(Leid(0), Lvid(0), Lvid(1)).unwrap();
        store.add_edge(Leid(1), Lvid(1), Lvid(2)).unwrap();
        store.finalize();
        store
            .increment_and_update_vertex(Lvid(0), "alpha".into())
            .unwrap();
        store
            .increment_and_update_vertex(Lvid(1), "beta".into())
            .unwrap();
        store.set_vertex_modified(Lvid(1), true).unwrap();
        store.increment_and_update_edge(Leid(0), 17).unwrap();
        store.set_edge_snapshot_made(Leid(1), true).unwrap();
        store
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated_store();
        store.save_data(dir.path(), ProcId(0)).unwrap();

        let mut fresh: LocalStore<String, u64> = LocalStore::new(3, 2);
        fresh.add_edge(Leid(0), Lvid(0), Lvid(1)).unwrap();
        fresh.add_edge(Leid(1), Lvid(1), Lvid(2)).unwrap();
        fresh.finalize();
        fresh.load_data(dir.path(), ProcId(0)).unwrap();

        assert_eq!(*fresh.vertex_data(Lvid(0)).unwrap(), "alpha");
        assert_eq!(*fresh.vertex_data(Lvid(1)).unwrap(), "beta");
        assert!(fresh.vertex_modified(Lvid(1)).unwrap());
        assert_eq!(fresh.vertex_version(Lvid(1)).unwrap(), 1);
        assert_eq!(*fresh.edge_data(Leid(0)).unwrap(), 17);
        assert!(fresh.edge_snapshot_made(Leid(1)).unwrap());
    }

    #[test]
    fn saved_bytes_are_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated_store();
        store.save_data(dir.path(), ProcId(0)).unwrap();
        let first = std::fs::read(dir.path().join(vertex_file_name(ProcId(0)))).unwrap();

        store.load_data(dir.path(), ProcId(0)).unwrap();
        store.save_data(dir.path(), ProcId(0)).unwrap();
        let second = std::fs::read(dir.path().join(vertex_file_name(ProcId(0)))).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn truncated_file_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated_store();
        store.save_data(dir.path(), ProcId(0)).unwrap();

        let vpath = dir.path().join(vertex_file_name(ProcId(0)));
        let bytes = std::fs::read(&vpath).unwrap();
        std::fs::write(&vpath, &bytes[..bytes.len() - 4]).unwrap();

        let err = store.load_data(dir.path(), ProcId(0)).unwrap_err();
        assert!(matches!(err, FragmentError::Corruption(_)));
    }

    #[test]
    fn trailing_bytes_are_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = populated_store();
        store.save_data(dir.path(), ProcId(0)).unwrap();

        let epath = dir.path().join(edge_file_name(ProcId(0)));
        let mut bytes = std::fs::read(&epath).unwrap();
        bytes.push(0xAB);
        std::fs::write(&epath, &bytes).unwrap();

        let err = store.load_data(dir.path(), ProcId(0)).unwrap_err();
        assert!(matches!(err, FragmentError::Corruption(_)));
    }

    proptest::proptest! {
        #[test]
        fn record_codec_round_trips(payload in proptest::collection::vec(proptest::num::u8::ANY, 0..64),
                                    flags in 0u8..4,
                                    version in 0u64..(1 << 62)) {
            let tag = VersionTag::from_parts(flags, version);
            let mut buf = Vec::new();
            write_record(&mut buf, &payload, tag).unwrap();
            let mut cursor = std::io::Cursor::new(buf);
            let (decoded, decoded_tag): (Vec<u8>, VersionTag) = read_record(&mut cursor).unwrap();
            proptest::prop_assert_eq!(decoded, payload);
            proptest::prop_assert_eq!(decoded_tag, tag);
            expect_eof(&mut cursor).unwrap();
        }
    }
}
