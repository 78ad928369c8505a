//! Compute deltas between objects.
//!
//! Implements git's diff-delta algorithm: a hash table of overlapping
//! fixed-size blocks from the source is probed at every target offset.
//! A hash hit only selects a bucket; the candidate is always verified
//! byte-for-byte before being trusted, since the mixing hash can collide.
//! Matching regions become copy instructions; non-matching regions become
//! insert instructions.

use std::collections::HashMap;

use super::{encode_copy, encode_insert, write_varint};

/// Block size used for hashing (matches git's `diff-delta.c`).
const BLOCK_SIZE: usize = 16;

/// Largest single copy instruction's size field (24 bits).
const MAX_COPY_SIZE: usize = 0x00ff_ffff;

/// Golden-ratio mixing hash over a block, folded into a 31-bit value.
///
/// `(h << 5) + h + byte`, i.e. `h * 33 + byte`, matches the multiplicative
/// constant git's delta generator uses to spread block contents across
/// hash buckets; it is a bucket selector only, never a proof of equality.
fn mix_hash(block: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &b in block {
        h = (h.wrapping_shl(5))
            .wrapping_add(h)
            .wrapping_add(b as u32);
    }
    h & 0x7fff_ffff
}

/// Compute a delta that transforms `source` into `target`.
///
/// Returns the raw delta byte stream that can be applied with `apply_delta`.
/// This always returns a delta, even one no smaller than `target` itself;
/// callers that care about size (the pack writer, §4.G) compare the result
/// against the compressed whole object and fall back to storing it whole.
pub fn compute_delta(source: &[u8], target: &[u8]) -> Vec<u8> {
    let mut delta = Vec::new();

    delta.extend_from_slice(&write_varint(source.len()));
    delta.extend_from_slice(&write_varint(target.len()));

    if target.is_empty() {
        return delta;
    }

    let index = build_block_index(source);

    let mut tpos = 0;
    let mut pending_insert: Vec<u8> = Vec::new();

    while tpos < target.len() {
        let remaining = target.len() - tpos;

        if remaining >= BLOCK_SIZE {
            let block = &target[tpos..tpos + BLOCK_SIZE];
            let h = mix_hash(block);
            if let Some(src_offset) = find_verified_match(&index, h, source, block) {
                let match_len = extend_match(source, src_offset, target, tpos);

                flush_insert(&mut delta, &mut pending_insert);
                emit_copy(&mut delta, src_offset, match_len);
                tpos += match_len;
                continue;
            }
        }

        pending_insert.push(target[tpos]);
        tpos += 1;

        if pending_insert.len() == 127 {
            flush_insert(&mut delta, &mut pending_insert);
        }
    }

    flush_insert(&mut delta, &mut pending_insert);

    delta
}

/// Compute a delta, but only return it when strictly smaller than
/// `compressed_full_size` — the size of storing `target` whole.
///
/// Used by the pack writer, which otherwise stores the object whole.
pub fn compute_delta_if_beneficial(
    source: &[u8],
    target: &[u8],
    compressed_full_size: usize,
) -> Option<Vec<u8>> {
    let delta = compute_delta(source, target);
    if delta.len() < compressed_full_size {
        Some(delta)
    } else {
        None
    }
}

/// Hash map from a mixing-hash bucket to every source offset that hashes
/// there. Buckets can collide; every candidate is re-verified byte-for-byte
/// by the caller before being trusted.
fn build_block_index(source: &[u8]) -> HashMap<u32, Vec<usize>> {
    let mut index: HashMap<u32, Vec<usize>> = HashMap::new();
    if source.len() < BLOCK_SIZE {
        return index;
    }
    for offset in 0..=source.len() - BLOCK_SIZE {
        let block = &source[offset..offset + BLOCK_SIZE];
        let h = mix_hash(block);
        // First occurrence of a given offset's bucket is tried first; keep
        // insertion order so earlier (lower-offset) matches are preferred.
        index.entry(h).or_default().push(offset);
    }
    index
}

/// Look up `h` in the index and return the first source offset whose block
/// bytes actually equal `block` — the hash alone is never trusted.
fn find_verified_match(
    index: &HashMap<u32, Vec<usize>>,
    h: u32,
    source: &[u8],
    block: &[u8],
) -> Option<usize> {
    let candidates = index.get(&h)?;
    for &offset in candidates {
        if &source[offset..offset + BLOCK_SIZE] == block {
            return Some(offset);
        }
    }
    None
}

/// Extend a match between source[src_off..] and target[tgt_off..] as far as
/// possible, capped so a single copy's span never exceeds the source or
/// target's remaining bytes, nor the largest representable match length.
fn extend_match(source: &[u8], src_off: usize, target: &[u8], tgt_off: usize) -> usize {
    let max_len = [
        source.len() - src_off,
        target.len() - tgt_off,
        (u32::MAX as usize).min(1 << 24),
    ]
    .into_iter()
    .min()
    .unwrap();
    let mut len = BLOCK_SIZE;
    while len < max_len && source[src_off + len] == target[tgt_off + len] {
        len += 1;
    }
    len
}

/// Flush pending insert bytes as one or more insert instructions.
fn flush_insert(delta: &mut Vec<u8>, pending: &mut Vec<u8>) {
    while !pending.is_empty() {
        let chunk_len = std::cmp::min(pending.len(), 127);
        let chunk: Vec<u8> = pending.drain(..chunk_len).collect();
        delta.extend_from_slice(&encode_insert(&chunk));
    }
}

/// Emit a copy instruction, splitting into multiple if needed (max copy size = 0xffffff).
fn emit_copy(delta: &mut Vec<u8>, offset: usize, mut size: usize) {
    let mut off = offset;
    while size > 0 {
        let chunk = std::cmp::min(size, MAX_COPY_SIZE);
        delta.extend_from_slice(&encode_copy(off as u64, chunk));
        off += chunk;
        size -= chunk;
    }
}
