//! Cluster client and execution engine
//!
//! Wraps one logical command execution in the retry/redirect state machine:
//! transient connectivity failures are retried against a random node up to a
//! configured budget, a temporary redirect (`ASK`) retargets a single attempt
//! at the endpoint the store named, and a permanent redirect (`MOVED`)
//! reloads the topology before retrying. Each logical call spends at most
//! one redirect-triggered retry; a second redirect is surfaced rather than
//! looped on.
//!
//! The engine runs synchronously on the calling thread. One client instance
//! may be shared across threads: topology reloads are serialized by a mutex,
//! routed execution takes only short registry read locks.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionOptions, Connector};
use crate::discovery;
use crate::error::{ClusterError, Result};
use crate::node::Node;
use crate::registry::NodeRegistry;
use crate::router::{self, CommandPolicy};
use crate::value::Value;
use redroute_core::{Endpoint, Slot};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Treat a standalone (non-clustered) seed as a configuration error
    /// instead of falling back to single-node mode.
    pub force_cluster: bool,
    /// How many times a connectivity-class failure is retried before the
    /// last error is surfaced. Redirects have their own one-shot budget.
    pub retry_count: u32,
    /// Options passed through to the transport.
    pub connection: ConnectionOptions,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            force_cluster: true,
            retry_count: 3,
            connection: ConnectionOptions::default(),
        }
    }
}

impl ClusterConfig {
    /// Set `force_cluster`.
    pub fn with_force_cluster(mut self, force_cluster: bool) -> Self {
        self.force_cluster = force_cluster;
        self
    }

    /// Set the connectivity retry budget.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the transport options.
    pub fn with_connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection = options;
        self
    }
}

/// Options for [`ClusterClient::scan`].
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Glob pattern forwarded to each node's scan.
    pub match_pattern: Option<String>,
    /// Per-step count hint forwarded to each node's scan.
    pub count: Option<u64>,
}

/// A cluster-aware client for a slot-sharded key-value store.
///
/// Generic over the [`Connector`] that supplies per-node transport; the
/// routing layer never touches sockets itself.
pub struct ClusterClient<K: Connector> {
    connector: K,
    config: ClusterConfig,
    registry: NodeRegistry<K::Conn>,
    /// Live seed list, grown with every endpoint discovery reports.
    seeds: Mutex<Vec<Endpoint>>,
    /// Construction-time seed list, restorable on demand.
    initial_seeds: Vec<Endpoint>,
    /// Serializes every topology reload sequence.
    topology_lock: Mutex<()>,
}

impl<K: Connector> std::fmt::Debug for ClusterClient<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("config", &self.config)
            .field("initial_seeds", &self.initial_seeds)
            .finish_non_exhaustive()
    }
}

impl<K: Connector> ClusterClient<K> {
    /// Create a client and perform initial topology discovery against
    /// `seeds`. A single-instance deployment passes one seed.
    pub fn new(connector: K, seeds: Vec<Endpoint>, config: ClusterConfig) -> Result<Self> {
        if seeds.is_empty() {
            return Err(ClusterError::InvalidConfig(
                "at least one seed endpoint is required".to_string(),
            ));
        }
        info!(seeds = seeds.len(), "initializing cluster client");

        let client = Self {
            connector,
            config,
            registry: NodeRegistry::new(),
            seeds: Mutex::new(seeds.clone()),
            initial_seeds: seeds,
            topology_lock: Mutex::new(()),
        };
        client.reload_topology()?;
        Ok(client)
    }

    /// Execute a named command with positional arguments, transparently
    /// handling redirects and transient connectivity failures.
    pub fn execute(&self, command: &str, args: Vec<String>) -> Result<Value> {
        let mut retries_left = self.config.retry_count;
        let mut redirected = false;
        let mut ask_target: Option<Endpoint> = None;
        let mut try_random = false;

        loop {
            match self.dispatch(command, &args, ask_target.take(), try_random) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_connectivity() => {
                    if retries_left == 0 {
                        error!(command, error = %err, "connectivity retries exhausted");
                        return Err(err);
                    }
                    retries_left -= 1;
                    // The targeted node may have just gone away; give a
                    // different one a chance to answer (or redirect us).
                    try_random = true;
                    warn!(command, error = %err, retries_left, "connectivity failure, retrying");
                }
                Err(err) if err.is_redirect() && redirected => {
                    // A second redirect within one logical call is a protocol
                    // anomaly (flapping or misbehaving cluster); surface it
                    // instead of chasing it.
                    warn!(command, error = %err, "second redirect in one call");
                    return Err(err.into_store_error());
                }
                Err(ClusterError::Ask { slot, endpoint }) => {
                    debug!(command, slot, endpoint = %endpoint, "ASK redirect");
                    redirected = true;
                    ask_target = Some(endpoint);
                }
                Err(ClusterError::Moved { slot, endpoint }) => {
                    debug!(command, slot, endpoint = %endpoint, "MOVED redirect, reloading topology");
                    redirected = true;
                    self.reload_topology()?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Scatter a glob enumeration to every node and concatenate the results
    /// in registry order. Per-node result order is whatever that node
    /// returned; there is no global sort.
    pub fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let reply = self.execute("keys", vec![pattern.to_string()])?;
        let items = reply
            .into_array()
            .ok_or_else(|| ClusterError::UnexpectedReply("keys reply is not an array".to_string()))?;
        items
            .into_iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ClusterError::UnexpectedReply("keys reply holds a non-string".to_string())
                })
            })
            .collect()
    }

    /// One step of cursor-based enumeration across the whole cluster.
    ///
    /// The returned cursor encodes both the per-node cursor and which node is
    /// being walked; pass it back verbatim. A cursor of 0 means the
    /// enumeration is complete. Outstanding cursors are invalidated by a
    /// topology reload mid-iteration.
    pub fn scan(&self, cursor: u64, options: &ScanOptions) -> Result<(u64, Vec<String>)> {
        let mut args = vec![cursor.to_string()];
        if let Some(pattern) = &options.match_pattern {
            args.push("match".to_string());
            args.push(pattern.clone());
        }
        if let Some(count) = options.count {
            args.push("count".to_string());
            args.push(count.to_string());
        }

        let reply = self.execute("scan", args)?;
        let (next, items) = parse_scan_reply(reply)?;
        let keys = items
            .into_iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ClusterError::UnexpectedReply("scan reply holds a non-string".to_string())
                })
            })
            .collect::<Result<Vec<String>>>()?;
        Ok((next, keys))
    }

    /// Close every connection, forget the registry, and rediscover. With
    /// `use_initial_hosts` the construction-time seed list replaces the grown
    /// one first, recovering from a seed list that drifted to all-stale
    /// entries.
    pub fn reconnect(&self, use_initial_hosts: bool) -> Result<()> {
        let _guard = self.topology_lock.lock();
        info!(use_initial_hosts, "reconnecting");

        if use_initial_hosts {
            *self.seeds.lock() = self.initial_seeds.clone();
        }
        for node in self.registry.all() {
            node.close();
        }
        self.registry.clear();
        self.reload_topology_locked()
    }

    /// Endpoints currently in the registry, in stable registry order.
    pub fn nodes(&self) -> Vec<Endpoint> {
        self.registry
            .all()
            .iter()
            .map(|n| n.endpoint().clone())
            .collect()
    }

    /// The endpoint currently believed to own `slot`, if any.
    pub fn slot_owner(&self, slot: Slot) -> Option<Endpoint> {
        self.registry.locate(slot).map(|n| n.endpoint().clone())
    }

    fn dispatch(
        &self,
        command: &str,
        args: &[String],
        ask_target: Option<Endpoint>,
        try_random: bool,
    ) -> Result<Value> {
        if let Some(endpoint) = ask_target {
            // One-shot: prime the redirect target, then run the command there.
            let node = self.registry.find_or_insert(endpoint);
            node.asking(&self.connector, &self.config.connection)?;
            return self.run(&node, command, args);
        }

        let policy = router::policy_for(command);
        match policy {
            CommandPolicy::Scatter => self.scatter(command, args),
            CommandPolicy::ScatterCursor => self.scan_step(command, args),
            CommandPolicy::Unsupported => {
                Err(ClusterError::CommandNotSupported(command.to_string()))
            }
            CommandPolicy::Random => {
                let node = self.random_node(command)?;
                self.run(&node, command, args)
            }
            CommandPolicy::Keyed | CommandPolicy::Script => {
                let node = if try_random {
                    self.random_node(command)?
                } else {
                    let slot = router::routing_slot(command, args, policy)?;
                    self.registry.locate(slot).ok_or_else(|| {
                        ClusterError::CommandNotSupported(format!(
                            "{command}: no known node serves slot {slot}"
                        ))
                    })?
                };
                self.run(&node, command, args)
            }
        }
    }

    fn run(&self, node: &Arc<Node<K::Conn>>, command: &str, args: &[String]) -> Result<Value> {
        node.execute(&self.connector, &self.config.connection, command, args)
    }

    fn random_node(&self, command: &str) -> Result<Arc<Node<K::Conn>>> {
        self.registry
            .random()
            .ok_or_else(|| ClusterError::CommandNotSupported(format!("{command}: no known nodes")))
    }

    fn scatter(&self, command: &str, args: &[String]) -> Result<Value> {
        let mut results = Vec::new();
        for node in self.registry.all() {
            let reply = self.run(&node, command, args)?;
            match reply {
                Value::Array(items) => results.extend(items),
                other => {
                    return Err(ClusterError::UnexpectedReply(format!(
                        "scatter reply from {} is not an array: {other:?}",
                        node.endpoint()
                    )))
                }
            }
        }
        Ok(Value::Array(results))
    }

    fn scan_step(&self, command: &str, args: &[String]) -> Result<Value> {
        let cursor_arg = args
            .first()
            .ok_or_else(|| ClusterError::InvalidCursor(String::new()))?;
        let cursor: u64 = cursor_arg
            .parse()
            .map_err(|_| ClusterError::InvalidCursor(cursor_arg.clone()))?;

        let nodes = self.registry.all();
        if nodes.is_empty() {
            return Err(ClusterError::CommandNotSupported(format!(
                "{command}: no known nodes"
            )));
        }
        let (node_cursor, node_index) = router::decode_cursor(cursor, nodes.len());
        let node = &nodes[node_index];

        let mut node_args = args.to_vec();
        node_args[0] = node_cursor.to_string();
        let reply = self.run(node, command, &node_args)?;

        let (reported, items) = parse_scan_reply(reply)?;
        let next = router::next_cursor(reported, node_index, nodes.len()).ok_or_else(|| {
            ClusterError::UnexpectedReply(format!(
                "scan cursor {reported} from {} does not fit the distributed cursor",
                node.endpoint()
            ))
        })?;
        Ok(Value::Array(vec![
            Value::bulk(next.to_string()),
            Value::Array(items),
        ]))
    }

    fn reload_topology(&self) -> Result<()> {
        let _guard = self.topology_lock.lock();
        self.reload_topology_locked()
    }

    /// Callers must hold `topology_lock`.
    fn reload_topology_locked(&self) -> Result<()> {
        let mut seeds = self.seeds.lock().clone();
        discovery::discover(
            &self.connector,
            &self.registry,
            &mut seeds,
            &self.config.connection,
            self.config.force_cluster,
        )?;
        *self.seeds.lock() = seeds;
        Ok(())
    }
}

/// Pull `(cursor, items)` out of a native scan reply.
fn parse_scan_reply(reply: Value) -> Result<(u64, Vec<Value>)> {
    let malformed = || ClusterError::UnexpectedReply("malformed scan reply".to_string());

    let mut parts = reply.into_array().ok_or_else(malformed)?.into_iter();
    let cursor = parts
        .next()
        .and_then(|v| v.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(malformed)?;
    let items = parts.next().and_then(Value::into_array).ok_or_else(malformed)?;
    Ok((cursor, items))
}

/// Convenience wrappers for the common command set; each forwards to
/// [`ClusterClient::execute`]. Multi-key variants are absent because
/// cross-slot multi-key commands are not routable.
impl<K: Connector> ClusterClient<K> {
    pub fn get(&self, key: &str) -> Result<Value> {
        self.execute("get", vec![key.to_string()])
    }

    pub fn set(&self, key: &str, value: &str) -> Result<Value> {
        self.execute("set", vec![key.to_string(), value.to_string()])
    }

    pub fn setex(&self, key: &str, seconds: u64, value: &str) -> Result<Value> {
        self.execute(
            "setex",
            vec![key.to_string(), seconds.to_string(), value.to_string()],
        )
    }

    pub fn setnx(&self, key: &str, value: &str) -> Result<Value> {
        self.execute("setnx", vec![key.to_string(), value.to_string()])
    }

    pub fn getset(&self, key: &str, value: &str) -> Result<Value> {
        self.execute("getset", vec![key.to_string(), value.to_string()])
    }

    pub fn del(&self, key: &str) -> Result<Value> {
        self.execute("del", vec![key.to_string()])
    }

    pub fn exists(&self, key: &str) -> Result<Value> {
        self.execute("exists", vec![key.to_string()])
    }

    pub fn expire(&self, key: &str, seconds: u64) -> Result<Value> {
        self.execute("expire", vec![key.to_string(), seconds.to_string()])
    }

    pub fn ttl(&self, key: &str) -> Result<Value> {
        self.execute("ttl", vec![key.to_string()])
    }

    pub fn key_type(&self, key: &str) -> Result<Value> {
        self.execute("type", vec![key.to_string()])
    }

    pub fn incr(&self, key: &str) -> Result<Value> {
        self.execute("incr", vec![key.to_string()])
    }

    pub fn incrby(&self, key: &str, delta: i64) -> Result<Value> {
        self.execute("incrby", vec![key.to_string(), delta.to_string()])
    }

    pub fn decr(&self, key: &str) -> Result<Value> {
        self.execute("decr", vec![key.to_string()])
    }

    pub fn decrby(&self, key: &str, delta: i64) -> Result<Value> {
        self.execute("decrby", vec![key.to_string(), delta.to_string()])
    }

    pub fn append(&self, key: &str, value: &str) -> Result<Value> {
        self.execute("append", vec![key.to_string(), value.to_string()])
    }

    pub fn strlen(&self, key: &str) -> Result<Value> {
        self.execute("strlen", vec![key.to_string()])
    }

    pub fn lpush(&self, key: &str, value: &str) -> Result<Value> {
        self.execute("lpush", vec![key.to_string(), value.to_string()])
    }

    pub fn rpush(&self, key: &str, value: &str) -> Result<Value> {
        self.execute("rpush", vec![key.to_string(), value.to_string()])
    }

    pub fn lpop(&self, key: &str) -> Result<Value> {
        self.execute("lpop", vec![key.to_string()])
    }

    pub fn rpop(&self, key: &str) -> Result<Value> {
        self.execute("rpop", vec![key.to_string()])
    }

    pub fn llen(&self, key: &str) -> Result<Value> {
        self.execute("llen", vec![key.to_string()])
    }

    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Value> {
        self.execute(
            "lrange",
            vec![key.to_string(), start.to_string(), stop.to_string()],
        )
    }

    pub fn sadd(&self, key: &str, member: &str) -> Result<Value> {
        self.execute("sadd", vec![key.to_string(), member.to_string()])
    }

    pub fn srem(&self, key: &str, member: &str) -> Result<Value> {
        self.execute("srem", vec![key.to_string(), member.to_string()])
    }

    pub fn scard(&self, key: &str) -> Result<Value> {
        self.execute("scard", vec![key.to_string()])
    }

    pub fn sismember(&self, key: &str, member: &str) -> Result<Value> {
        self.execute("sismember", vec![key.to_string(), member.to_string()])
    }

    pub fn smembers(&self, key: &str) -> Result<Value> {
        self.execute("smembers", vec![key.to_string()])
    }

    pub fn hset(&self, key: &str, field: &str, value: &str) -> Result<Value> {
        self.execute(
            "hset",
            vec![key.to_string(), field.to_string(), value.to_string()],
        )
    }

    pub fn hget(&self, key: &str, field: &str) -> Result<Value> {
        self.execute("hget", vec![key.to_string(), field.to_string()])
    }

    pub fn hdel(&self, key: &str, field: &str) -> Result<Value> {
        self.execute("hdel", vec![key.to_string(), field.to_string()])
    }

    pub fn hlen(&self, key: &str) -> Result<Value> {
        self.execute("hlen", vec![key.to_string()])
    }

    pub fn hgetall(&self, key: &str) -> Result<Value> {
        self.execute("hgetall", vec![key.to_string()])
    }

    pub fn hkeys(&self, key: &str) -> Result<Value> {
        self.execute("hkeys", vec![key.to_string()])
    }

    pub fn hvals(&self, key: &str) -> Result<Value> {
        self.execute("hvals", vec![key.to_string()])
    }

    pub fn zadd(&self, key: &str, score: f64, member: &str) -> Result<Value> {
        self.execute(
            "zadd",
            vec![key.to_string(), score.to_string(), member.to_string()],
        )
    }

    pub fn zrem(&self, key: &str, member: &str) -> Result<Value> {
        self.execute("zrem", vec![key.to_string(), member.to_string()])
    }

    pub fn zscore(&self, key: &str, member: &str) -> Result<Value> {
        self.execute("zscore", vec![key.to_string(), member.to_string()])
    }

    pub fn zcard(&self, key: &str) -> Result<Value> {
        self.execute("zcard", vec![key.to_string()])
    }

    pub fn publish(&self, channel: &str, message: &str) -> Result<Value> {
        self.execute("publish", vec![channel.to_string(), message.to_string()])
    }

    pub fn pfadd(&self, key: &str, element: &str) -> Result<Value> {
        self.execute("pfadd", vec![key.to_string(), element.to_string()])
    }

    /// Run a script whose keys must all map to one slot; hash tags can force
    /// co-location of otherwise-unrelated keys.
    pub fn eval(&self, script: &str, keys: &[&str], argv: &[&str]) -> Result<Value> {
        self.execute("eval", script_args(script, keys, argv))
    }

    /// Like [`Self::eval`] but referencing a script by digest.
    pub fn evalsha(&self, sha: &str, keys: &[&str], argv: &[&str]) -> Result<Value> {
        self.execute("evalsha", script_args(sha, keys, argv))
    }
}

fn script_args(body: &str, keys: &[&str], argv: &[&str]) -> Vec<String> {
    let mut args = Vec::with_capacity(2 + keys.len() + argv.len());
    args.push(body.to_string());
    args.push(keys.len().to_string());
    args.extend(keys.iter().map(|k| k.to_string()));
    args.extend(argv.iter().map(|a| a.to_string()));
    args
}
