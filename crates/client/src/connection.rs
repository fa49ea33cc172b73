//! Transport capability traits
//!
//! The wire protocol and socket I/O live outside this crate; the routing
//! layer consumes them through these narrow traits. A [`Connector`] opens one
//! logical [`Connection`] per node, lazily, and the connection supports named
//! command execution plus two out-of-band primitives: the cluster topology
//! query and the `ASKING` prime used after a temporary redirect.
//!
//! Connections are not multiplexed by this layer; each node serializes access
//! to its connection with a mutex, one blocking exchange at a time. Callers
//! that need per-node parallelism must provide it underneath the transport.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::Value;
use redroute_core::{Endpoint, SlotRange};

/// Options passed through to the transport when opening a connection.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Per-exchange timeout enforced by the transport. Timeouts surface as
    /// connectivity errors and are retried by the execution engine.
    pub timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
        }
    }
}

/// One entry of the cluster topology query: a slot range and the endpoints
/// serving it, master first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    /// Slot range, inclusive on both ends
    pub range: SlotRange,
    /// Master endpoint owning the range
    pub master: Endpoint,
    /// Replica endpoints (not routed to by this layer)
    pub replicas: Vec<Endpoint>,
}

/// Opens connections to individual cluster members.
pub trait Connector: Send + Sync {
    /// The connection type produced.
    type Conn: Connection;

    /// Open a connection to `endpoint`. Unreachable endpoints fail with a
    /// connectivity error.
    fn connect(&self, endpoint: &Endpoint, options: &ConnectionOptions) -> Result<Self::Conn>;
}

/// A logical connection to a single store instance.
pub trait Connection: Send {
    /// Execute a named command with positional arguments.
    fn execute(&mut self, command: &str, args: &[String]) -> Result<Value>;

    /// Query the authoritative slot-to-endpoint map from this instance.
    ///
    /// A standalone instance answers with the cluster-support-disabled error,
    /// which discovery turns into single-node fallback.
    fn topology(&mut self) -> Result<Vec<SlotAssignment>>;

    /// Prime this connection for one redirected command after an `ASK`.
    fn asking(&mut self) -> Result<()> {
        self.execute("asking", &[]).map(|_| ())
    }

    /// Close the connection. Called on reconnect only; dropped connections
    /// may also close implicitly.
    fn close(&mut self);
}
