//! PackFile: reading .pack files.
//!
//! A pack file contains a header, a sequence of compressed objects
//! (possibly deltified), and a trailing checksum.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use flate2::bufread::ZlibDecoder;
use git_hash::{HashAlgorithm, ObjectId};
use git_object::ObjectType;
use memmap2::Mmap;
use std::io::Read;

use crate::entry::{parse_entry_header, PackEntry};
use crate::index::PackIndex;
use crate::revindex::ReverseIndex;
use crate::{
    PackEntryType, PackError, PackedObject, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION,
    MAX_DELTA_CHAIN_DEPTH,
};

/// Enough of a commit or tag object to read its type, size, and headers
/// (tree/parents/tagger/etc.) without inflating the message body.
#[derive(Debug, Clone)]
pub struct ObjectHeaderPeek {
    pub obj_type: ObjectType,
    pub uncompressed_size: usize,
    /// Header lines only, up to (not including) the blank line separator.
    pub header_bytes: Vec<u8>,
}

/// A delta entry's still-compressed bytes, reusable in a new pack without
/// re-encoding, plus the id of the base it deltas against.
#[derive(Debug, Clone)]
pub struct DeltaReuse {
    pub base_id: ObjectId,
    pub raw_delta_bytes: Vec<u8>,
    /// Uncompressed size of the delta instruction stream, read straight off
    /// the entry header — lets a reusing writer size the new entry's header
    /// without inflating `raw_delta_bytes`.
    pub uncompressed_size: u64,
}

/// A memory-mapped packfile with its index.
pub struct PackFile {
    data: Mmap,
    index: PackIndex,
    pack_path: PathBuf,
    num_objects: u32,
    hash_algo: HashAlgorithm,
    reverse: OnceLock<ReverseIndex>,
}

impl PackFile {
    /// Open a pack file and its associated index.
    ///
    /// Given a `.pack` file path, opens both the pack and its `.idx` file.
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let pack_path = pack_path.as_ref().to_path_buf();

        // Derive .idx path from .pack path
        let idx_path = pack_path.with_extension("idx");

        let file = std::fs::File::open(&pack_path)?;
        let data = unsafe { Mmap::map(&file)? };

        // Validate pack header
        if data.len() < PACK_HEADER_SIZE {
            return Err(PackError::InvalidHeader("file too small".into()));
        }
        if &data[0..4] != PACK_SIGNATURE {
            return Err(PackError::InvalidHeader("bad PACK signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != PACK_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }
        let num_objects = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let index = PackIndex::open(&idx_path)?;

        // Validate object count matches between pack and index
        if index.num_objects() != num_objects {
            return Err(PackError::InvalidHeader(format!(
                "pack has {} objects but index has {}",
                num_objects,
                index.num_objects()
            )));
        }

        Ok(Self {
            data,
            index,
            pack_path,
            num_objects,
            hash_algo: HashAlgorithm::Sha1,
            reverse: OnceLock::new(),
        })
    }

    /// Read an object by OID.
    ///
    /// Returns `None` if the OID is not in this pack.
    pub fn read_object(&self, oid: &ObjectId) -> Result<Option<PackedObject>, PackError> {
        match self.index.lookup(oid) {
            Some(offset) => self.read_at_offset(offset).map(Some),
            None => Ok(None),
        }
    }

    /// Read an object at a known offset in the pack.
    ///
    /// Resolves delta chains iteratively (not recursively) to handle
    /// arbitrary chain depths safely.
    pub fn read_at_offset(&self, offset: u64) -> Result<PackedObject, PackError> {
        self.read_at_offset_with_resolver(offset, |_| None)
    }

    /// Read an object by OID, with an external resolver for cross-pack REF_DELTA bases.
    ///
    /// The resolver is called when a REF_DELTA references a base OID not found in this pack.
    /// It should return the resolved base object's type and data if found externally.
    pub fn read_object_with_resolver(
        &self,
        oid: &ObjectId,
        resolver: impl Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
    ) -> Result<Option<PackedObject>, PackError> {
        match self.index.lookup(oid) {
            Some(offset) => self.read_at_offset_with_resolver(offset, resolver).map(Some),
            None => Ok(None),
        }
    }

    /// Read an object at a known offset, with an external resolver for cross-pack REF_DELTA bases.
    fn read_at_offset_with_resolver(
        &self,
        offset: u64,
        resolver: impl Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
    ) -> Result<PackedObject, PackError> {
        // Build the delta chain (innermost delta first, base last)
        let mut chain: Vec<(PackEntry, Vec<u8>)> = Vec::new();
        let mut current_offset = offset;

        for depth in 0..MAX_DELTA_CHAIN_DEPTH {
            let entry = parse_entry_header(
                &self.data[current_offset as usize..],
                current_offset,
            )?;

            // Decompress the data
            let compressed = &self.data[entry.data_offset as usize..];
            let decompressed = decompress(compressed, entry.uncompressed_size, current_offset)?;

            match entry.entry_type {
                PackEntryType::Commit
                | PackEntryType::Tree
                | PackEntryType::Blob
                | PackEntryType::Tag => {
                    // Base object — resolve chain
                    let obj_type = entry
                        .entry_type
                        .to_object_type()
                        .expect("non-delta type");

                    // Apply delta chain in reverse order
                    let mut data = decompressed;
                    for (_, delta_data) in chain.iter().rev() {
                        data = crate::delta::apply::apply_delta(&data, delta_data)?;
                    }

                    return Ok(PackedObject {
                        obj_type,
                        data,
                    });
                }
                PackEntryType::OfsDelta { base_offset } => {
                    chain.push((entry, decompressed));
                    current_offset = base_offset;
                }
                PackEntryType::RefDelta { base_oid } => {
                    chain.push((entry, decompressed));
                    // Try the index within this pack first
                    if let Some(base_offset) = self.index.lookup(&base_oid) {
                        current_offset = base_offset;
                    } else if let Some((obj_type, base_data)) = resolver(&base_oid) {
                        // External resolver found the base — apply delta chain
                        let mut data = base_data;
                        for (_, delta_data) in chain.iter().rev() {
                            data = crate::delta::apply::apply_delta(&data, delta_data)?;
                        }
                        return Ok(PackedObject { obj_type, data });
                    } else {
                        return Err(PackError::MissingBase(base_oid));
                    }
                }
            }

            if depth + 1 >= MAX_DELTA_CHAIN_DEPTH {
                return Err(PackError::DeltaChainTooDeep {
                    offset,
                    max_depth: MAX_DELTA_CHAIN_DEPTH,
                });
            }
        }

        Err(PackError::DeltaChainTooDeep {
            offset,
            max_depth: MAX_DELTA_CHAIN_DEPTH,
        })
    }

    /// Check if this pack contains the given OID.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.index.lookup(oid).is_some()
    }

    /// Get the number of objects in this pack.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Get the pack index.
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Get the path to the .pack file.
    pub fn path(&self) -> &Path {
        &self.pack_path
    }

    /// Get the raw memory-mapped pack data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the hash algorithm used by this pack.
    pub fn hash_algo(&self) -> HashAlgorithm {
        self.hash_algo
    }

    /// Read a commit or tag's type, size, and header lines without
    /// inflating its message body. Non-commit/tag and delta entries fall
    /// back to a full read, since their header boundary isn't knowable
    /// from the entry header alone.
    pub fn peek_header(&self, oid: &ObjectId) -> Result<Option<ObjectHeaderPeek>, PackError> {
        let offset = match self.index.lookup(oid) {
            Some(o) => o,
            None => return Ok(None),
        };
        let entry = parse_entry_header(&self.data[offset as usize..], offset)?;
        match entry.entry_type {
            PackEntryType::Commit | PackEntryType::Tag => {
                let compressed = &self.data[entry.data_offset as usize..];
                let header_bytes =
                    decompress_until_blank_line(compressed, entry.uncompressed_size, offset)?;
                let obj_type = entry
                    .entry_type
                    .to_object_type()
                    .expect("non-delta type");
                Ok(Some(ObjectHeaderPeek {
                    obj_type,
                    uncompressed_size: entry.uncompressed_size,
                    header_bytes,
                }))
            }
            _ => {
                let full = self.read_at_offset(offset)?;
                let header_bytes = match full.data.windows(2).position(|w| w == b"\n\n") {
                    Some(pos) => full.data[..pos].to_vec(),
                    None => full.data.clone(),
                };
                Ok(Some(ObjectHeaderPeek {
                    obj_type: full.obj_type,
                    uncompressed_size: full.data.len(),
                    header_bytes,
                }))
            }
        }
    }

    /// If `oid` is stored as a delta in this pack, return its base id and
    /// still-compressed delta bytes straight off the mmap, without
    /// inflating them. Used by the pack writer to reuse an existing delta
    /// instead of recomputing one.
    pub fn get_delta_reuse(&self, oid: &ObjectId) -> Result<Option<DeltaReuse>, PackError> {
        let offset = match self.index.lookup(oid) {
            Some(o) => o,
            None => return Ok(None),
        };
        let entry = parse_entry_header(&self.data[offset as usize..], offset)?;
        let base_id = match entry.entry_type {
            PackEntryType::OfsDelta { base_offset } => {
                match self.reverse_index().lookup_offset(base_offset, &self.index) {
                    Some(id) => id,
                    None => return Ok(None),
                }
            }
            PackEntryType::RefDelta { base_oid } => base_oid,
            _ => return Ok(None),
        };
        let end = self
            .next_entry_offset(offset)
            .unwrap_or(self.data.len() as u64 - 20);
        let raw_delta_bytes = self.data[entry.data_offset as usize..end as usize].to_vec();
        Ok(Some(DeltaReuse {
            base_id,
            raw_delta_bytes,
            uncompressed_size: entry.uncompressed_size as u64,
        }))
    }

    fn reverse_index(&self) -> &ReverseIndex {
        self.reverse.get_or_init(|| ReverseIndex::build(&self.index))
    }

    /// Offset of the entry immediately following `offset`, if any.
    fn next_entry_offset(&self, offset: u64) -> Option<u64> {
        self.reverse_index()
            .iter()
            .map(|&(o, _)| o)
            .filter(|&o| o > offset)
            .min()
    }
}

/// Inflate just enough of `compressed` to find the blank-line boundary
/// between a commit/tag's header lines and its message body, stopping
/// early rather than decompressing the whole object.
fn decompress_until_blank_line(
    compressed: &[u8],
    expected_size: usize,
    offset: u64,
) -> Result<Vec<u8>, PackError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        let n = decoder
            .read(&mut chunk)
            .map_err(|_| PackError::CorruptEntry(offset))?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(2).position(|w| w == b"\n\n") {
            buf.truncate(pos);
            return Ok(buf);
        }
        if buf.len() >= expected_size {
            break;
        }
    }
    Ok(buf)
}

/// Decompress zlib data with an expected uncompressed size.
fn decompress(compressed: &[u8], expected_size: usize, offset: u64) -> Result<Vec<u8>, PackError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut buf = Vec::with_capacity(expected_size);
    decoder.read_to_end(&mut buf).map_err(|_| {
        PackError::CorruptEntry(offset)
    })?;
    Ok(buf)
}
