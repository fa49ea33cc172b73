//! Routing primitives for a slot-sharded key-value cluster
//!
//! Provides the pure pieces of cluster routing:
//! - Key to hash-slot mapping (CRC16, hash-tag aware)
//! - Slot range bookkeeping
//! - Endpoint identity

pub mod endpoint;
pub mod range;
pub mod slot;

// Re-export commonly used types
pub use endpoint::{Endpoint, InvalidEndpoint};
pub use range::SlotRange;
pub use slot::{same_slot, slot_for, Slot, HASH_SLOTS};
