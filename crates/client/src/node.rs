//! A single cluster member as seen by the client
//!
//! A node owns the slot ranges the last topology rebuild assigned to it and
//! one lazily-opened connection. Ranges are replaced wholesale on rebuild,
//! never merged; the connection survives rebuilds and is only closed by an
//! explicit reconnect.

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::connection::{Connection, ConnectionOptions, Connector};
use crate::error::{classify_store_error, ClusterError, Result};
use crate::value::Value;
use redroute_core::{Endpoint, Slot, SlotRange};

/// A known cluster member.
pub struct Node<C: Connection> {
    endpoint: Endpoint,
    ranges: RwLock<Vec<SlotRange>>,
    // Serializes exchanges on the single logical connection.
    connection: Mutex<Option<C>>,
}

impl<C: Connection> Node<C> {
    pub(crate) fn new(endpoint: Endpoint, ranges: Vec<SlotRange>) -> Self {
        Self {
            endpoint,
            ranges: RwLock::new(ranges),
            connection: Mutex::new(None),
        }
    }

    /// The member's identity.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Slot ranges currently assigned to this node.
    pub fn ranges(&self) -> Vec<SlotRange> {
        self.ranges.read().clone()
    }

    /// Replace the assigned ranges with exactly `ranges`.
    pub(crate) fn set_ranges(&self, ranges: Vec<SlotRange>) {
        *self.ranges.write() = ranges;
    }

    /// Whether this node serves `slot`.
    pub fn has_slot(&self, slot: Slot) -> bool {
        self.ranges.read().iter().any(|r| r.contains(slot))
    }

    /// Execute a command on this node, classifying any raw store error into
    /// the taxonomy (redirects, auth, generic) exactly once.
    pub(crate) fn execute<K>(
        &self,
        connector: &K,
        options: &ConnectionOptions,
        command: &str,
        args: &[String],
    ) -> Result<Value>
    where
        K: Connector<Conn = C>,
    {
        self.with_connection(connector, options, |conn| conn.execute(command, args))
            .map_err(classify)
    }

    /// Prime this node for one redirected command.
    pub(crate) fn asking<K>(&self, connector: &K, options: &ConnectionOptions) -> Result<()>
    where
        K: Connector<Conn = C>,
    {
        self.with_connection(connector, options, |conn| conn.asking())
            .map_err(classify)
    }

    /// Close the connection if one is open. The next exchange reopens lazily.
    pub(crate) fn close(&self) {
        if let Some(mut conn) = self.connection.lock().take() {
            debug!(endpoint = %self.endpoint, "closing connection");
            conn.close();
        }
    }

    fn with_connection<K, T>(
        &self,
        connector: &K,
        options: &ConnectionOptions,
        f: impl FnOnce(&mut C) -> Result<T>,
    ) -> Result<T>
    where
        K: Connector<Conn = C>,
    {
        let mut guard = self.connection.lock();
        let conn = match &mut *guard {
            Some(conn) => conn,
            slot => {
                debug!(endpoint = %self.endpoint, "opening connection");
                slot.insert(connector.connect(&self.endpoint, options)?)
            }
        };
        f(conn)
    }
}

fn classify(err: ClusterError) -> ClusterError {
    match err {
        ClusterError::Store(message) => classify_store_error(&message),
        other => other,
    }
}
