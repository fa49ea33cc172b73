//! Command classification and routing rules
//!
//! Pure routing decisions: which class a command falls into, which slot a
//! keyed command targets, and the distributed cursor arithmetic used to scan
//! the whole cluster through per-node cursors. Everything here is I/O-free;
//! the client drives the actual exchanges.

use crate::error::{ClusterError, Result};
use redroute_core::{same_slot, slot_for, Slot};

/// How a command is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPolicy {
    /// Routed by the slot of its first positional argument.
    Keyed,
    /// Scripting command carrying an explicit key list that must share a slot.
    Script,
    /// Issued to every node, results concatenated in registry order.
    Scatter,
    /// Cursor-based enumeration stepped across nodes in registry order.
    ScatterCursor,
    /// Routed to one random node; the caller must pre-shard the batch.
    Random,
    /// No deterministic or meaningful per-shard target.
    Unsupported,
}

/// Classify a command by name (case-insensitive).
///
/// Unrecognized commands default to [`CommandPolicy::Keyed`] with the first
/// positional argument as the key.
pub fn policy_for(command: &str) -> CommandPolicy {
    match command.to_ascii_lowercase().as_str() {
        "keys" => CommandPolicy::Scatter,
        "scan" => CommandPolicy::ScatterCursor,
        "multi" | "exec" | "discard" | "pipelined" => CommandPolicy::Random,
        "info" | "config" | "shutdown" | "slaveof" => CommandPolicy::Unsupported,
        "eval" | "evalsha" => CommandPolicy::Script,
        _ => CommandPolicy::Keyed,
    }
}

/// Resolve the target slot for a node-routed command.
pub(crate) fn routing_slot(command: &str, args: &[String], policy: CommandPolicy) -> Result<Slot> {
    match policy {
        CommandPolicy::Keyed => {
            let key = args
                .first()
                .ok_or_else(|| ClusterError::KeysNotSpecified(command.to_string()))?;
            Ok(slot_for(key.as_bytes()))
        }
        CommandPolicy::Script => script_slot(command, args),
        _ => Err(ClusterError::CommandNotSupported(command.to_string())),
    }
}

/// Scripting commands take `script numkeys key [key ...] arg [arg ...]`; the
/// keys must all live on one slot because the store will not run a script
/// across shards.
fn script_slot(command: &str, args: &[String]) -> Result<Slot> {
    let numkeys: usize = args
        .get(1)
        .and_then(|n| n.parse().ok())
        .filter(|&n| n > 0)
        .ok_or_else(|| ClusterError::KeysNotSpecified(command.to_string()))?;

    let keys = 2usize
        .checked_add(numkeys)
        .and_then(|end| args.get(2..end))
        .ok_or_else(|| ClusterError::KeysNotSpecified(command.to_string()))?;
    if !same_slot(keys) {
        return Err(ClusterError::KeysNotAtSameSlot(keys.to_vec()));
    }
    Ok(slot_for(keys[0].as_bytes()))
}

/// Decode an external scan cursor into `(per_node_cursor, node_index)`.
///
/// The external cursor encodes both as `per_node * node_count + index`; a
/// full enumeration assumes a fixed node count and order, so a topology
/// reload mid-iteration invalidates outstanding cursors.
pub(crate) fn decode_cursor(cursor: u64, node_count: usize) -> (u64, usize) {
    let n = node_count as u64;
    (cursor / n, (cursor % n) as usize)
}

/// Combine a node's reported cursor with its registry index into the next
/// external cursor. A node reporting 0 is exhausted: advance to the next
/// node with a fresh per-node cursor, or report 0 once the last node wraps.
///
/// `None` when the node's cursor is too large to re-encode; cursors come off
/// the wire, so an absurd one must not panic the client.
pub(crate) fn next_cursor(node_cursor: u64, node_index: usize, node_count: usize) -> Option<u64> {
    let n = node_count as u64;
    if node_cursor == 0 {
        let next_index = node_index + 1;
        if next_index >= node_count {
            Some(0)
        } else {
            Some(next_index as u64)
        }
    } else {
        node_cursor
            .checked_mul(n)
            .and_then(|c| c.checked_add(node_index as u64))
    }
}
