//! Key to hash-slot mapping
//!
//! Implements the cluster hashing rule: CRC16 over the key (or its hash tag)
//! reduced modulo the fixed slot count. Keys that must live on the same shard
//! can force co-location with a `{tag}` substring.

use crc::{Crc, CRC_16_XMODEM};

/// Total number of hash slots, a fixed protocol constant.
pub const HASH_SLOTS: u16 = 16384;

/// A hash slot in `[0, HASH_SLOTS)`.
pub type Slot = u16;

/// CRC16 calculator (XMODEM variant, the cluster standard)
static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Compute the hash slot for a key.
///
/// If the key contains a `{` followed by a later `}` and the substring
/// between them is non-empty, only that substring is hashed (the "hash tag"
/// rule). An empty tag (`{}`) hashes the full literal key, braces included.
///
/// Only the first `}` after the first `{` closes the tag, so
/// `"{tes}t}xxx"` tags on `"tes"`.
pub fn slot_for(key: &[u8]) -> Slot {
    (CRC16.checksum(hash_input(key)) % HASH_SLOTS) as Slot
}

/// Check that every key in a set maps to the same slot.
///
/// An empty set has no defined slot and reports `false`; callers validating
/// multi-key commands must reject empty key lists before asking.
pub fn same_slot<K: AsRef<[u8]>>(keys: &[K]) -> bool {
    let mut slots = keys.iter().map(|k| slot_for(k.as_ref()));
    match slots.next() {
        Some(first) => slots.all(|s| s == first),
        None => false,
    }
}

fn hash_input(key: &[u8]) -> &[u8] {
    if let Some(open) = key.iter().position(|&b| b == b'{') {
        if let Some(close) = key[open + 1..].iter().position(|&b| b == b'}') {
            if close > 0 {
                return &key[open + 1..open + 1 + close];
            }
        }
    }
    key
}
