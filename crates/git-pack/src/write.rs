//! Pack generation: create .pack and .idx files.
//!
//! Provides `PackWriter` for creating new packfiles and
//! `build_pack_index` for generating .idx files from .pack files.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use git_hash::hasher::Hasher;
use git_hash::{HashAlgorithm, ObjectId};
use git_object::ObjectType;

use crate::entry::encode_entry_header;
use crate::{IDX_SIGNATURE, IDX_VERSION, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_VERSION, PackError};

/// A written pack entry, used for index construction.
struct PackWriterEntry {
    oid: ObjectId,
    offset: u64,
    crc32: u32,
}

/// Builder for creating new packfiles.
pub struct PackWriter {
    file: std::fs::File,
    hasher: Hasher,
    num_objects: u32,
    entries: Vec<PackWriterEntry>,
    path: PathBuf,
    /// When true, allow delta bases that reference objects not in this pack.
    thin: bool,
    /// Current write position (byte offset).
    position: u64,
}

impl PackWriter {
    /// Create a new pack writer at the given path.
    ///
    /// Writes the pack header immediately; call `add_object` / `add_delta`
    /// to append entries, then `finish` to write the trailer.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PackError> {
        let path = path.as_ref().to_path_buf();
        let mut file = std::fs::File::create(&path)?;
        let mut hasher = Hasher::new(HashAlgorithm::Sha1);

        // Write placeholder header (num_objects will be fixed in finish)
        let mut header = [0u8; PACK_HEADER_SIZE];
        header[0..4].copy_from_slice(PACK_SIGNATURE);
        header[4..8].copy_from_slice(&PACK_VERSION.to_be_bytes());
        header[8..12].copy_from_slice(&0u32.to_be_bytes()); // placeholder

        file.write_all(&header)?;
        hasher.update(&header);

        Ok(Self {
            file,
            hasher,
            num_objects: 0,
            entries: Vec::new(),
            path,
            thin: false,
            position: PACK_HEADER_SIZE as u64,
        })
    }

    /// Enable or disable thin pack mode.
    ///
    /// In thin pack mode, delta bases may reference objects not included
    /// in the pack. The receiver is expected to already have those objects.
    pub fn set_thin(&mut self, thin: bool) {
        self.thin = thin;
    }

    /// Add a full (non-delta) object to the pack.
    pub fn add_object(
        &mut self,
        obj_type: ObjectType,
        data: &[u8],
    ) -> Result<(), PackError> {
        let type_num = match obj_type {
            ObjectType::Commit => 1,
            ObjectType::Tree => 2,
            ObjectType::Blob => 3,
            ObjectType::Tag => 4,
        };

        let oid = Hasher::hash_object(
            HashAlgorithm::Sha1,
            std::str::from_utf8(obj_type.as_bytes()).unwrap(),
            data,
        )
        .map_err(PackError::Hash)?;

        let offset = self.position;
        let header = encode_entry_header(type_num, data.len() as u64);

        // Compress data
        let mut compressed = Vec::new();
        {
            let mut encoder = ZlibEncoder::new(&mut compressed, Compression::default());
            encoder.write_all(data)?;
            encoder.finish()?;
        }

        // CRC32 of header + compressed data
        let mut crc = crc32fast::Hasher::new();
        crc.update(&header);
        crc.update(&compressed);
        let crc_val = crc.finalize();

        // Write to file and hasher
        self.write_bytes(&header)?;
        self.write_bytes(&compressed)?;

        self.entries.push(PackWriterEntry {
            oid,
            offset,
            crc32: crc_val,
        });
        self.num_objects += 1;

        Ok(())
    }

    /// Add a REF_DELTA entry referencing a base object by OID.
    pub fn add_delta(
        &mut self,
        base_oid: ObjectId,
        target_oid: ObjectId,
        delta_data: &[u8],
    ) -> Result<(), PackError> {
        let offset = self.position;
        let header = encode_entry_header(7, delta_data.len() as u64); // REF_DELTA

        // Compress delta data
        let mut compressed = Vec::new();
        {
            let mut encoder = ZlibEncoder::new(&mut compressed, Compression::default());
            encoder.write_all(delta_data)?;
            encoder.finish()?;
        }

        // CRC32 of header + base_oid + compressed
        let mut crc = crc32fast::Hasher::new();
        crc.update(&header);
        crc.update(base_oid.as_bytes());
        crc.update(&compressed);
        let crc_val = crc.finalize();

        // Write to file and hasher
        self.write_bytes(&header)?;
        self.write_bytes(base_oid.as_bytes())?;
        self.write_bytes(&compressed)?;

        self.entries.push(PackWriterEntry {
            oid: target_oid,
            offset,
            crc32: crc_val,
        });
        self.num_objects += 1;

        Ok(())
    }

    /// Finish writing the pack: fix header, write checksum trailer.
    ///
    /// Returns the path to the .pack file and its checksum.
    pub fn finish(mut self) -> Result<(PathBuf, ObjectId), PackError> {
        // Fix the object count in the header
        use std::io::Seek;
        self.file.seek(std::io::SeekFrom::Start(0))?;

        let mut header = [0u8; PACK_HEADER_SIZE];
        header[0..4].copy_from_slice(PACK_SIGNATURE);
        header[4..8].copy_from_slice(&PACK_VERSION.to_be_bytes());
        header[8..12].copy_from_slice(&self.num_objects.to_be_bytes());

        self.file.write_all(&header)?;
        self.file.seek(std::io::SeekFrom::End(0))?;

        // Recompute hasher from scratch (since we modified the header)
        // Actually, let's fix the hasher — we stored the placeholder header
        // We need to recompute the hash. The simplest approach: re-read and hash.
        drop(self.file);

        // Read the pack file and compute proper checksum
        let pack_content = std::fs::read(&self.path)?;
        let mut hasher = Hasher::new(HashAlgorithm::Sha1);
        hasher.update(&pack_content);
        let checksum = hasher.finalize().map_err(PackError::Hash)?;

        // Append checksum to the file
        let mut file = std::fs::OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(checksum.as_bytes())?;

        Ok((self.path.clone(), checksum))
    }

    /// Get the entries written so far (for index building).
    pub fn entries(&self) -> impl Iterator<Item = (&ObjectId, u64, u32)> {
        self.entries
            .iter()
            .map(|e| (&e.oid, e.offset, e.crc32))
    }

    /// Append a whole object whose compressed bytes are already at hand
    /// (avoids recompressing data the caller compressed once already while
    /// scoring delta candidates against it).
    fn add_raw_whole(
        &mut self,
        obj_type: ObjectType,
        oid: ObjectId,
        uncompressed_len: u64,
        compressed: &[u8],
    ) -> Result<u64, PackError> {
        let type_num = match obj_type {
            ObjectType::Commit => 1,
            ObjectType::Tree => 2,
            ObjectType::Blob => 3,
            ObjectType::Tag => 4,
        };
        let offset = self.position;
        let header = encode_entry_header(type_num, uncompressed_len);

        let mut crc = crc32fast::Hasher::new();
        crc.update(&header);
        crc.update(compressed);
        let crc_val = crc.finalize();

        self.write_bytes(&header)?;
        self.write_bytes(compressed)?;

        self.entries.push(PackWriterEntry {
            oid,
            offset,
            crc32: crc_val,
        });
        self.num_objects += 1;
        Ok(offset)
    }

    /// Append an OFS_DELTA entry against a base already written at `base_offset`.
    fn add_ofs_delta(
        &mut self,
        base_offset: u64,
        target_oid: ObjectId,
        uncompressed_len: u64,
        compressed_delta: &[u8],
    ) -> Result<u64, PackError> {
        let offset = self.position;
        let negative_offset = offset - base_offset;
        let ofs_bytes = crate::entry::encode_ofs_delta_offset(negative_offset);
        let header = encode_entry_header(6, uncompressed_len);

        let mut crc = crc32fast::Hasher::new();
        crc.update(&header);
        crc.update(&ofs_bytes);
        crc.update(compressed_delta);
        let crc_val = crc.finalize();

        self.write_bytes(&header)?;
        self.write_bytes(&ofs_bytes)?;
        self.write_bytes(compressed_delta)?;

        self.entries.push(PackWriterEntry {
            oid: target_oid,
            offset,
            crc32: crc_val,
        });
        self.num_objects += 1;
        Ok(offset)
    }

    /// Append a REF_DELTA entry whose delta bytes are already zlib-compressed
    /// (reused verbatim from a source pack, per §4.G delta reuse).
    fn add_raw_ref_delta(
        &mut self,
        base_oid: ObjectId,
        target_oid: ObjectId,
        uncompressed_len: u64,
        compressed_delta: &[u8],
    ) -> Result<u64, PackError> {
        let offset = self.position;
        let header = encode_entry_header(7, uncompressed_len);

        let mut crc = crc32fast::Hasher::new();
        crc.update(&header);
        crc.update(base_oid.as_bytes());
        crc.update(compressed_delta);
        let crc_val = crc.finalize();

        self.write_bytes(&header)?;
        self.write_bytes(base_oid.as_bytes())?;
        self.write_bytes(compressed_delta)?;

        self.entries.push(PackWriterEntry {
            oid: target_oid,
            offset,
            crc32: crc_val,
        });
        self.num_objects += 1;
        Ok(offset)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), PackError> {
        self.file.write_all(data)?;
        self.hasher.update(data);
        self.position += data.len() as u64;
        Ok(())
    }
}

/// An object queued for inclusion in a new pack.
#[derive(Debug, Clone)]
pub struct ObjectToPack {
    pub oid: ObjectId,
    pub obj_type: ObjectType,
    pub data: Vec<u8>,
}

/// Tunables for the sliding-window delta-compression writer (§4.G).
#[derive(Debug, Clone)]
pub struct PackWriterConfig {
    /// How many of the most recently written entries are kept as delta
    /// base candidates.
    pub window: usize,
    /// Maximum delta chain depth (reused or freshly encoded).
    pub max_depth: usize,
    /// When false, every object is stored whole (no delta search at all).
    pub enable_delta: bool,
    /// When true, a companion `.idx` is written alongside the `.pack`.
    pub generate_index: bool,
    /// zlib compression level used for whole objects and freshly encoded deltas.
    pub compression_level: u32,
    /// Weight applied to a candidate's resulting chain depth when scoring
    /// (deeper chains cost more to resolve at read time).
    pub depth_penalty_factor: f64,
    /// A candidate is only considered if its size and the target's size are
    /// within this fraction of each other (of the larger of the two).
    pub size_bucket_ratio: f64,
    /// Upper bound on how many window candidates are probed per object.
    pub max_candidates_per_object: usize,
}

impl Default for PackWriterConfig {
    fn default() -> Self {
        Self {
            window: 10,
            max_depth: 50,
            enable_delta: true,
            generate_index: true,
            compression_level: 6,
            depth_penalty_factor: 4.0,
            size_bucket_ratio: 0.5,
            max_candidates_per_object: 10,
        }
    }
}

/// Outcome of a full planned pack write.
#[derive(Debug)]
pub struct PackWriteOutcome {
    pub pack_path: PathBuf,
    pub idx_path: Option<PathBuf>,
    pub checksum: ObjectId,
    pub num_objects: u32,
}

/// A previously written entry kept around as a possible delta base.
struct WindowEntry {
    oid: ObjectId,
    obj_type: ObjectType,
    data: Vec<u8>,
    offset: u64,
    depth: usize,
}

fn type_priority(t: ObjectType) -> u8 {
    match t {
        ObjectType::Commit => 0,
        ObjectType::Tree => 1,
        ObjectType::Blob => 2,
        ObjectType::Tag => 3,
    }
}

fn zlib_compress(data: &[u8], level: u32) -> Result<Vec<u8>, PackError> {
    let mut out = Vec::new();
    let mut encoder = ZlibEncoder::new(&mut out, Compression::new(level));
    encoder.write_all(data)?;
    encoder.finish()?;
    Ok(out)
}

/// Walk a delta-reuse chain across `source_packs` to find how deep `oid` is
/// already nested, so reuse doesn't silently blow past `max_depth`.
fn source_chain_depth(
    source_packs: &[&crate::pack::PackFile],
    oid: &ObjectId,
    max_depth: usize,
) -> usize {
    let mut current = *oid;
    let mut depth = 0;
    while depth <= max_depth {
        let mut next = None;
        for pack in source_packs {
            if let Ok(Some(reuse)) = pack.get_delta_reuse(&current) {
                next = Some(reuse.base_id);
                break;
            }
        }
        match next {
            Some(base_id) => {
                current = base_id;
                depth += 1;
            }
            // Not a delta in any source pack (stored whole, or unknown) —
            // the chain bottoms out here.
            None => return depth,
        }
    }
    depth
}

/// Build a new pack from `objects`, applying the sliding-window delta plan
/// of §4.G: reuse an existing delta when a source pack already has one,
/// otherwise search a bounded window of recently written objects for a
/// profitable delta base, falling back to storing the object whole.
///
/// `source_packs` are consulted for delta reuse; pass an empty slice to
/// disable reuse entirely. Objects are written to `pack_path` in sorted
/// order (`(type_priority, size desc)`); when `config.generate_index` is
/// set, a companion `.idx` is written at `pack_path` with its extension
/// swapped to `idx`.
pub fn write_pack_with_deltas(
    mut objects: Vec<ObjectToPack>,
    source_packs: &[&crate::pack::PackFile],
    config: &PackWriterConfig,
    pack_path: &Path,
) -> Result<PackWriteOutcome, PackError> {
    objects.sort_by(|a, b| {
        type_priority(a.obj_type)
            .cmp(&type_priority(b.obj_type))
            .then(b.data.len().cmp(&a.data.len()))
    });

    let object_set: std::collections::HashSet<ObjectId> =
        objects.iter().map(|o| o.oid).collect();

    let mut writer = PackWriter::new(pack_path)?;
    let mut window: std::collections::VecDeque<WindowEntry> =
        std::collections::VecDeque::with_capacity(config.window.max(1));

    for obj in objects {
        let compressed_full = zlib_compress(&obj.data, config.compression_level)?;
        let mut chosen: Option<(u64, u64, Vec<u8>, usize)> = None; // (offset_or_0, uncompressed_len, compressed_delta, depth)
        let mut reused_ref: Option<(ObjectId, u64, Vec<u8>, usize)> = None;

        if config.enable_delta {
            // (a) Delta reuse.
            for pack in source_packs {
                if let Ok(Some(reuse)) = pack.get_delta_reuse(&obj.oid) {
                    if !object_set.contains(&reuse.base_id) {
                        continue;
                    }
                    let base_depth = source_chain_depth(source_packs, &reuse.base_id, config.max_depth);
                    if base_depth + 1 > config.max_depth {
                        continue;
                    }
                    if (reuse.raw_delta_bytes.len() as u64) < compressed_full.len() as u64 {
                        reused_ref = Some((
                            reuse.base_id,
                            reuse.uncompressed_size,
                            reuse.raw_delta_bytes,
                            base_depth + 1,
                        ));
                        break;
                    }
                }
            }

            // (b)/(c) Window search, skipped when reuse already won.
            if reused_ref.is_none() {
                let mut best_score: Option<f64> = None;
                let abort_threshold = compressed_full.len() as f64 / 4.0;

                'search: for candidate in window.iter().rev().take(config.max_candidates_per_object) {
                    if candidate.obj_type != obj.obj_type {
                        continue;
                    }
                    if candidate.depth >= config.max_depth {
                        continue;
                    }
                    let larger = candidate.data.len().max(obj.data.len()) as f64;
                    if (candidate.data.len() as f64 - obj.data.len() as f64).abs()
                        > larger * config.size_bucket_ratio
                    {
                        continue;
                    }

                    let delta = crate::delta::compute::compute_delta(&candidate.data, &obj.data);
                    let compressed_delta = zlib_compress(&delta, config.compression_level)?;
                    let resulting_depth = candidate.depth + 1;
                    let score = compressed_delta.len() as f64
                        + resulting_depth as f64 * config.depth_penalty_factor;

                    let improves = match best_score {
                        Some(b) => score < b,
                        None => (compressed_delta.len() as u64) < compressed_full.len() as u64,
                    };
                    if improves {
                        best_score = Some(score);
                        chosen = Some((
                            candidate.offset,
                            delta.len() as u64,
                            compressed_delta,
                            resulting_depth,
                        ));
                    }
                    if score < abort_threshold {
                        break 'search;
                    }
                }
            }
        }

        let (offset, depth) = if let Some((base_oid, uncompressed_len, compressed_delta, depth)) =
            reused_ref
        {
            let offset =
                writer.add_raw_ref_delta(base_oid, obj.oid, uncompressed_len, &compressed_delta)?;
            (offset, depth)
        } else if let Some((base_offset, uncompressed_len, compressed_delta, depth)) = chosen {
            let offset = writer.add_ofs_delta(base_offset, obj.oid, uncompressed_len, &compressed_delta)?;
            (offset, depth)
        } else {
            let offset =
                writer.add_raw_whole(obj.obj_type, obj.oid, obj.data.len() as u64, &compressed_full)?;
            (offset, 0)
        };

        if window.len() == config.window.max(1) {
            window.pop_front();
        }
        window.push_back(WindowEntry {
            oid: obj.oid,
            obj_type: obj.obj_type,
            data: obj.data,
            offset,
            depth,
        });
    }

    let mut entries: Vec<(ObjectId, u64, u32)> = writer
        .entries()
        .map(|(oid, off, crc)| (*oid, off, crc))
        .collect();
    let num_objects = writer.num_objects;
    let (pack_path, checksum) = writer.finish()?;

    let idx_path = if config.generate_index {
        let idx_path = pack_path.with_extension("idx");
        Some(build_pack_index(&idx_path, &mut entries, &checksum)?)
    } else {
        None
    };

    Ok(PackWriteOutcome {
        pack_path,
        idx_path,
        checksum,
        num_objects,
    })
}

/// Build a v2 pack index (.idx) from a list of (OID, offset, CRC32) entries
/// and a pack checksum. Writes the index to the given path.
pub fn build_pack_index(
    idx_path: &Path,
    entries: &mut [(ObjectId, u64, u32)],
    pack_checksum: &ObjectId,
) -> Result<PathBuf, PackError> {
    // Sort by OID
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut buf = Vec::new();

    // Header
    buf.extend_from_slice(&IDX_SIGNATURE);
    buf.extend_from_slice(&IDX_VERSION.to_be_bytes());

    // Fanout table
    let mut fanout = [0u32; 256];
    for (oid, _, _) in entries.iter() {
        fanout[oid.first_byte() as usize] += 1;
    }
    for i in 1..256 {
        fanout[i] += fanout[i - 1];
    }
    for count in fanout {
        buf.extend_from_slice(&count.to_be_bytes());
    }

    // OIDs
    for (oid, _, _) in entries.iter() {
        buf.extend_from_slice(oid.as_bytes());
    }

    // CRC32
    for (_, _, crc) in entries.iter() {
        buf.extend_from_slice(&crc.to_be_bytes());
    }

    // Offsets — check if we need 64-bit table
    let mut large_offsets: Vec<u64> = Vec::new();
    for (_, offset, _) in entries.iter() {
        if *offset >= 0x8000_0000 {
            let idx = large_offsets.len() as u32;
            buf.extend_from_slice(&(0x8000_0000u32 | idx).to_be_bytes());
            large_offsets.push(*offset);
        } else {
            buf.extend_from_slice(&(*offset as u32).to_be_bytes());
        }
    }

    // 64-bit offset table
    for offset in &large_offsets {
        buf.extend_from_slice(&offset.to_be_bytes());
    }

    // Pack checksum
    buf.extend_from_slice(pack_checksum.as_bytes());

    // Index checksum
    let mut hasher = Hasher::new(HashAlgorithm::Sha1);
    hasher.update(&buf);
    let idx_checksum = hasher.finalize().map_err(PackError::Hash)?;
    buf.extend_from_slice(idx_checksum.as_bytes());

    let idx_path = idx_path.to_path_buf();
    std::fs::write(&idx_path, &buf)?;

    Ok(idx_path)
}

/// Convenience function: create a pack and its index from a set of objects.
///
/// Returns `(pack_path, idx_path, checksum)`.
pub fn create_pack(
    dir: &Path,
    name: &str,
    objects: &[(ObjectType, Vec<u8>)],
) -> Result<(PathBuf, PathBuf, ObjectId), PackError> {
    let pack_path = dir.join(format!("{name}.pack"));
    let idx_path = dir.join(format!("{name}.idx"));

    let mut writer = PackWriter::new(&pack_path)?;
    for (obj_type, data) in objects {
        writer.add_object(*obj_type, data)?;
    }

    // Collect entries before finishing
    let mut entries: Vec<(ObjectId, u64, u32)> = writer
        .entries()
        .map(|(oid, off, crc)| (*oid, off, crc))
        .collect();

    let (pack_path, checksum) = writer.finish()?;

    build_pack_index(&idx_path, &mut entries, &checksum)?;

    Ok((pack_path, idx_path, checksum))
}
