//! Cluster-aware client routing for slot-sharded key-value stores
//!
//! Routes commands to the shard that owns their key, keeps an
//! eventually-consistent view of slot ownership discovered from the cluster
//! itself, and transparently recovers from stale views (redirects) and
//! briefly unreachable shards. Multi-shard commands are supported through
//! scatter-gather (`keys`) and a distributed cursor (`scan`).
//!
//! The wire protocol is not part of this crate: supply a [`Connector`] that
//! opens a [`Connection`] per endpoint, and the client does the rest.
//!
//! ```no_run
//! use redroute::{ClusterClient, ClusterConfig, Endpoint};
//! # use redroute::{Connection, ConnectionOptions, Connector, Result, SlotAssignment, Value};
//! # struct NullConn;
//! # impl Connection for NullConn {
//! #     fn execute(&mut self, _: &str, _: &[String]) -> Result<Value> { Ok(Value::ok()) }
//! #     fn topology(&mut self) -> Result<Vec<SlotAssignment>> { Ok(Vec::new()) }
//! #     fn close(&mut self) {}
//! # }
//! # struct NullConnector;
//! # impl Connector for NullConnector {
//! #     type Conn = NullConn;
//! #     fn connect(&self, _: &Endpoint, _: &ConnectionOptions) -> Result<NullConn> { Ok(NullConn) }
//! # }
//! # fn main() -> redroute::Result<()> {
//! let seeds = vec![Endpoint::new("127.0.0.1", 7000)];
//! let client = ClusterClient::new(NullConnector, seeds, ClusterConfig::default())?;
//! client.set("user:1", "alice")?;
//! let value = client.get("user:1")?;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
mod discovery;
pub mod error;
pub mod node;
pub mod registry;
pub mod router;
pub mod value;

// Re-export commonly used types
pub use client::{ClusterClient, ClusterConfig, ScanOptions};
pub use connection::{Connection, ConnectionOptions, Connector, SlotAssignment};
pub use error::{ClusterError, Result};
pub use node::Node;
pub use registry::NodeRegistry;
pub use router::{policy_for, CommandPolicy};
pub use value::Value;

// Routing primitives from the core crate
pub use redroute_core::{same_slot, slot_for, Endpoint, Slot, SlotRange, HASH_SLOTS};
