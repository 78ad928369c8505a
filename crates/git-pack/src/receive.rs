//! Streaming pack receiver.
//!
//! Consumes an incoming pack byte stream (not pkt-lines — that framing is
//! stripped by the caller, see `git-protocol`'s side-band demuxer) in two
//! phases: phase 1 appends bytes to a file with no parsing at all; phase 2,
//! triggered by `finish`, reopens the file read-only and walks its entries
//! to reconstruct every object's hash and build the companion `.idx`.
//!
//! OFS_DELTA bases are resolved recursively against earlier offsets in the
//! same pack; REF_DELTA bases must already have been seen (thin packs,
//! where the base lives outside this pack, are not supported — see
//! `PackError::MissingBase`).

use std::collections::HashMap;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use flate2::{Decompress, FlushDecompress, Status};
use lru::LruCache;

use git_hash::hasher::Hasher;
use git_hash::{HashAlgorithm, ObjectId};
use git_object::ObjectType;

use crate::entry::parse_entry_header;
use crate::{PackEntryType, PackError, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION};

/// Default capacity of the reconstructed-base cache, in bytes of
/// uncompressed object data held at once.
pub const DEFAULT_CACHE_CAPACITY_BYTES: usize = 32 * 1024 * 1024;

/// Tuning knobs for the indexing phase.
#[derive(Debug, Clone)]
pub struct ReceiveConfig {
    /// Bound, in bytes, on the reconstructed-base cache.
    pub cache_capacity_bytes: usize,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            cache_capacity_bytes: DEFAULT_CACHE_CAPACITY_BYTES,
        }
    }
}

/// Outcome of a completed receive: both files are guaranteed to exist and
/// to have passed trailer verification once this is returned.
#[derive(Debug, Clone)]
pub struct ReceivedPack {
    pub pack_path: PathBuf,
    pub idx_path: PathBuf,
    pub checksum: ObjectId,
    pub num_objects: u32,
}

/// Phase-1 writer: appends raw pack bytes to disk without interpreting them.
pub struct StreamingPackReceiver {
    file: std::fs::File,
    path: PathBuf,
    bytes_written: u64,
}

impl StreamingPackReceiver {
    /// Create the receiver, truncating/creating the file at `pack_path`.
    pub fn new(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let path = pack_path.as_ref().to_path_buf();
        let file = std::fs::File::create(&path)?;
        Ok(Self {
            file,
            path,
            bytes_written: 0,
        })
    }

    /// Append a chunk of incoming pack bytes. No parsing happens here.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), PackError> {
        self.file.write_all(chunk)?;
        self.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Finish receiving: verify the trailer, index every object, write
    /// `idx_path`. On success both `self.pack_path()` and `idx_path` exist.
    pub fn finish(
        self,
        idx_path: impl AsRef<Path>,
        config: &ReceiveConfig,
    ) -> Result<ReceivedPack, PackError> {
        let pack_path = self.path.clone();
        drop(self.file);

        let (entries, checksum, num_objects) = index_pack_file(&pack_path, config)?;

        let idx_path = idx_path.as_ref().to_path_buf();
        let mut entries = entries;
        crate::write::build_pack_index(&idx_path, &mut entries, &checksum)?;

        Ok(ReceivedPack {
            pack_path,
            idx_path,
            checksum,
            num_objects,
        })
    }

    /// Finish receiving and install the result under `pack_dir` using the
    /// canonical `pack-<checksum>.{pack,idx}` naming (§4.G).
    pub fn finish_into_dir(
        self,
        pack_dir: impl AsRef<Path>,
        config: &ReceiveConfig,
    ) -> Result<ReceivedPack, PackError> {
        let pack_dir = pack_dir.as_ref();
        std::fs::create_dir_all(pack_dir)?;

        let tmp_idx = self.path.with_extension("idx.tmp");
        let received = self.finish(&tmp_idx, config)?;

        let final_pack = pack_dir.join(format!("pack-{}.pack", received.checksum));
        let final_idx = pack_dir.join(format!("pack-{}.idx", received.checksum));
        std::fs::rename(&received.pack_path, &final_pack)?;
        std::fs::rename(&received.idx_path, &final_idx)?;

        Ok(ReceivedPack {
            pack_path: final_pack,
            idx_path: final_idx,
            checksum: received.checksum,
            num_objects: received.num_objects,
        })
    }
}

/// Phase 2: reopen the pack read-only and index it entry by entry.
fn index_pack_file(
    pack_path: &Path,
    config: &ReceiveConfig,
) -> Result<(Vec<(ObjectId, u64, u32)>, ObjectId, u32), PackError> {
    let file = std::fs::File::open(pack_path)?;
    let data = unsafe { memmap2::Mmap::map(&file)? };
    let data: &[u8] = &data;

    if data.len() < PACK_HEADER_SIZE + 20 {
        return Err(PackError::InvalidHeader("pack too small".into()));
    }
    if &data[0..4] != PACK_SIGNATURE {
        return Err(PackError::InvalidHeader("bad PACK signature".into()));
    }
    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if version != PACK_VERSION {
        return Err(PackError::UnsupportedVersion(version));
    }
    let num_objects = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

    let content = &data[..data.len() - 20];
    let stored = ObjectId::from_bytes(&data[data.len() - 20..], HashAlgorithm::Sha1)
        .map_err(|_| PackError::InvalidHeader("invalid trailer bytes".into()))?;
    let mut trailer_hasher = Hasher::new(HashAlgorithm::Sha1);
    trailer_hasher.update(content);
    let computed = trailer_hasher.finalize().map_err(PackError::Hash)?;
    if computed != stored {
        return Err(PackError::ChecksumMismatch {
            expected: stored,
            actual: computed,
        });
    }

    let mut cache = BaseCache::new(config.cache_capacity_bytes);
    let mut offset_map: HashMap<ObjectId, u64> = HashMap::with_capacity(num_objects as usize);
    let mut entries: Vec<(ObjectId, u64, u32)> = Vec::with_capacity(num_objects as usize);

    let mut offset = PACK_HEADER_SIZE as u64;
    for _ in 0..num_objects {
        let entry_start = offset;
        let entry = parse_entry_header(&data[offset as usize..], offset)?;
        let compressed = &data[entry.data_offset as usize..];
        let (raw, consumed) = decompress_tracked(compressed, entry.uncompressed_size, offset)?;
        let next_offset = entry.data_offset + consumed as u64;

        let (obj_type, bytes) = match entry.entry_type {
            PackEntryType::Commit => (ObjectType::Commit, raw),
            PackEntryType::Tree => (ObjectType::Tree, raw),
            PackEntryType::Blob => (ObjectType::Blob, raw),
            PackEntryType::Tag => (ObjectType::Tag, raw),
            PackEntryType::OfsDelta { base_offset } => {
                let (base_type, base_bytes) = resolve_at(&data, base_offset, &mut cache)?;
                let applied = crate::delta::apply::apply_delta(&base_bytes, &raw)?;
                (base_type, applied)
            }
            PackEntryType::RefDelta { base_oid } => {
                let base_offset = *offset_map
                    .get(&base_oid)
                    .ok_or(PackError::MissingBase(base_oid))?;
                let (base_type, base_bytes) = resolve_at(&data, base_offset, &mut cache)?;
                let applied = crate::delta::apply::apply_delta(&base_bytes, &raw)?;
                (base_type, applied)
            }
        };

        let type_str = std::str::from_utf8(obj_type.as_bytes()).unwrap();
        let oid =
            Hasher::hash_object(HashAlgorithm::Sha1, type_str, &bytes).map_err(PackError::Hash)?;

        let mut crc = crc32fast::Hasher::new();
        crc.update(&data[entry_start as usize..next_offset as usize]);
        let crc_val = crc.finalize();

        offset_map.insert(oid, entry_start);
        cache.insert(entry_start, obj_type, bytes);
        entries.push((oid, entry_start, crc_val));

        offset = next_offset;
    }

    if offset + 20 != data.len() as u64 {
        return Err(PackError::InvalidHeader(
            "trailing bytes after last object".into(),
        ));
    }

    Ok((entries, computed, num_objects))
}

/// Resolve the object stored at `offset`, applying its delta chain if any.
/// Checks the cache first; on a miss, re-decompresses at `offset` directly
/// (recursing into its own base if it is itself an OFS delta).
fn resolve_at(
    data: &[u8],
    offset: u64,
    cache: &mut BaseCache,
) -> Result<(ObjectType, Vec<u8>), PackError> {
    if let Some(hit) = cache.get(offset) {
        return Ok(hit);
    }

    let entry = parse_entry_header(&data[offset as usize..], offset)?;
    let compressed = &data[entry.data_offset as usize..];
    let (raw, _consumed) = decompress_tracked(compressed, entry.uncompressed_size, offset)?;

    let resolved = match entry.entry_type {
        PackEntryType::Commit => (ObjectType::Commit, raw),
        PackEntryType::Tree => (ObjectType::Tree, raw),
        PackEntryType::Blob => (ObjectType::Blob, raw),
        PackEntryType::Tag => (ObjectType::Tag, raw),
        PackEntryType::OfsDelta { base_offset } => {
            let (base_type, base_bytes) = resolve_at(data, base_offset, cache)?;
            (base_type, crate::delta::apply::apply_delta(&base_bytes, &raw)?)
        }
        PackEntryType::RefDelta { base_oid } => {
            return Err(PackError::MissingBase(base_oid));
        }
    };

    cache.insert(offset, resolved.0, resolved.1.clone());
    Ok(resolved)
}

/// Inflate `compressed` into exactly `expected_size` bytes, reporting how
/// many input bytes the zlib stream actually consumed so the caller can
/// seek precisely to the next entry without scanning for it.
fn decompress_tracked(
    compressed: &[u8],
    expected_size: usize,
    offset: u64,
) -> Result<(Vec<u8>, usize), PackError> {
    let mut decompress = Decompress::new(true);
    let mut out = vec![0u8; expected_size];
    let status = decompress
        .decompress(compressed, &mut out, FlushDecompress::Finish)
        .map_err(|_| PackError::CorruptEntry(offset))?;

    let consumed = decompress.total_in() as usize;
    let produced = decompress.total_out() as usize;

    if produced != expected_size {
        return Err(PackError::CorruptEntry(offset));
    }
    if !matches!(status, Status::StreamEnd | Status::Ok) {
        return Err(PackError::CorruptEntry(offset));
    }

    out.truncate(produced);
    Ok((out, consumed))
}

/// Bounded cache of reconstructed object bytes keyed by pack offset.
///
/// Reads use `peek` (no recency bump) so that eviction order is purely
/// insertion order (FIFO), per §4.H — the point is to avoid re-inflating
/// bases that were *just* produced, not to model temporal locality.
struct BaseCache {
    capacity_bytes: usize,
    current_bytes: usize,
    map: LruCache<u64, (ObjectType, Vec<u8>)>,
}

impl BaseCache {
    fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            current_bytes: 0,
            map: LruCache::new(NonZeroUsize::new(usize::MAX >> 1).unwrap()),
        }
    }

    fn get(&self, offset: u64) -> Option<(ObjectType, Vec<u8>)> {
        self.map.peek(&offset).cloned()
    }

    fn insert(&mut self, offset: u64, obj_type: ObjectType, bytes: Vec<u8>) {
        if self.map.contains(&offset) {
            return;
        }
        let size = bytes.len();
        if size > self.capacity_bytes {
            // Too big to hold in the budget at all; callers fall back to
            // re-decompressing it on the next miss.
            return;
        }
        while self.current_bytes + size > self.capacity_bytes {
            match self.map.pop_lru() {
                Some((_, (_, evicted))) => self.current_bytes -= evicted.len(),
                None => break,
            }
        }
        self.current_bytes += size;
        self.map.put(offset, (obj_type, bytes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::encode_entry_header;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use git_object::ObjectType;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut enc = ZlibEncoder::new(&mut out, Compression::default());
        std::io::Write::write_all(&mut enc, data).unwrap();
        enc.finish().unwrap();
        out
    }

    fn build_raw_pack(objects: &[(u8, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(PACK_SIGNATURE);
        buf.extend_from_slice(&PACK_VERSION.to_be_bytes());
        buf.extend_from_slice(&(objects.len() as u32).to_be_bytes());
        for (type_num, content) in objects {
            buf.extend_from_slice(&encode_entry_header(*type_num, content.len() as u64));
            buf.extend_from_slice(&deflate(content));
        }
        let mut hasher = Hasher::new(HashAlgorithm::Sha1);
        hasher.update(&buf);
        let trailer = hasher.finalize().unwrap();
        buf.extend_from_slice(trailer.as_bytes());
        buf
    }

    #[test]
    fn receives_and_indexes_whole_objects() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("incoming.pack");

        let raw = build_raw_pack(&[(3, b"hello blob"), (2, b"tree-ish content")]);

        let mut receiver = StreamingPackReceiver::new(&pack_path).unwrap();
        for chunk in raw.chunks(7) {
            receiver.write_chunk(chunk).unwrap();
        }

        let idx_path = dir.path().join("incoming.idx");
        let received = receiver
            .finish(&idx_path, &ReceiveConfig::default())
            .unwrap();

        assert_eq!(received.num_objects, 2);
        assert!(received.pack_path.exists());
        assert!(received.idx_path.exists());

        let pack = crate::pack::PackFile::open(&received.pack_path).unwrap();
        let oid = Hasher::hash_object(HashAlgorithm::Sha1, "blob", b"hello blob").unwrap();
        let obj = pack.read_object(&oid).unwrap().unwrap();
        assert_eq!(obj.obj_type, ObjectType::Blob);
        assert_eq!(obj.data, b"hello blob");
    }

    #[test]
    fn resolves_ofs_delta_against_earlier_object() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("delta.pack");

        let base = b"AAAAAAAAAAAAAAAA".to_vec();
        let target = [base.clone(), b"BBBBBBBBBBBBBBBB".to_vec()].concat();
        let delta = crate::delta::compute::compute_delta(&base, &target);

        let mut buf = Vec::new();
        buf.extend_from_slice(PACK_SIGNATURE);
        buf.extend_from_slice(&PACK_VERSION.to_be_bytes());
        buf.extend_from_slice(&2u32.to_be_bytes());

        let base_offset = buf.len() as u64;
        buf.extend_from_slice(&encode_entry_header(3, base.len() as u64));
        buf.extend_from_slice(&deflate(&base));

        let delta_entry_offset = buf.len() as u64;
        buf.extend_from_slice(&encode_entry_header(6, delta.len() as u64));
        let negative_offset = delta_entry_offset - base_offset;
        buf.extend_from_slice(&crate::entry::encode_ofs_delta_offset(negative_offset));
        buf.extend_from_slice(&deflate(&delta));

        let mut hasher = Hasher::new(HashAlgorithm::Sha1);
        hasher.update(&buf);
        let trailer = hasher.finalize().unwrap();
        buf.extend_from_slice(trailer.as_bytes());

        let mut receiver = StreamingPackReceiver::new(&pack_path).unwrap();
        receiver.write_chunk(&buf).unwrap();

        let idx_path = dir.path().join("delta.idx");
        let received = receiver
            .finish(&idx_path, &ReceiveConfig::default())
            .unwrap();
        assert_eq!(received.num_objects, 2);

        let pack = crate::pack::PackFile::open(&received.pack_path).unwrap();
        let target_oid = Hasher::hash_object(HashAlgorithm::Sha1, "blob", &target).unwrap();
        let obj = pack.read_object(&target_oid).unwrap().unwrap();
        assert_eq!(obj.data, target);
    }

    #[test]
    fn rejects_truncated_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("bad.pack");
        let mut raw = build_raw_pack(&[(3, b"x")]);
        let last = raw.len() - 1;
        raw[last] ^= 0xff;

        let mut receiver = StreamingPackReceiver::new(&pack_path).unwrap();
        receiver.write_chunk(&raw).unwrap();
        let idx_path = dir.path().join("bad.idx");
        let err = receiver.finish(&idx_path, &ReceiveConfig::default());
        assert!(err.is_err());
    }
}
