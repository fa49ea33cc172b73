//! Scripted mock transport for cluster client tests
//!
//! A `MockBackend` holds the cluster's scripted behavior: the topology answer,
//! per-endpoint reply queues, reachability, and a full call log. Connections
//! fall back to `+OK` when nothing is scripted, so tests only script what
//! they assert on.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use redroute::{
    ClusterClient, ClusterConfig, ClusterError, Connection, ConnectionOptions, Connector, Endpoint,
    Result, SlotAssignment, SlotRange, Value,
};

/// One scripted reply.
pub enum Script {
    Value(Value),
    StoreError(String),
    Io(std::io::ErrorKind),
}

#[derive(Default)]
struct MockState {
    topology: Vec<SlotAssignment>,
    topology_errors: HashMap<Endpoint, String>,
    replies: HashMap<(Endpoint, String), VecDeque<Script>>,
    unreachable: HashSet<Endpoint>,
    calls: Vec<(Endpoint, String, Vec<String>)>,
    connects: Vec<Endpoint>,
    closes: Vec<Endpoint>,
}

/// Shared scripted cluster state.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        let _ = tracing_subscriber::fmt::try_init();
        Arc::new(Self::default())
    }

    pub fn connector(self: &Arc<Self>) -> MockConnector {
        MockConnector {
            backend: Arc::clone(self),
        }
    }

    /// Replace the topology every node reports.
    pub fn set_topology(&self, assignments: Vec<SlotAssignment>) {
        self.state.lock().topology = assignments;
    }

    /// Make `endpoint` answer the topology query with a store error.
    pub fn fail_topology(&self, endpoint: &Endpoint, message: &str) {
        self.state
            .lock()
            .topology_errors
            .insert(endpoint.clone(), message.to_string());
    }

    pub fn set_unreachable(&self, endpoint: &Endpoint) {
        self.state.lock().unreachable.insert(endpoint.clone());
    }

    pub fn set_reachable(&self, endpoint: &Endpoint) {
        self.state.lock().unreachable.remove(endpoint);
    }

    /// Queue a reply for the next `command` sent to `endpoint`.
    pub fn push_reply(&self, endpoint: &Endpoint, command: &str, reply: Script) {
        self.state
            .lock()
            .replies
            .entry((endpoint.clone(), command.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub fn push_value(&self, endpoint: &Endpoint, command: &str, value: Value) {
        self.push_reply(endpoint, command, Script::Value(value));
    }

    pub fn push_store_error(&self, endpoint: &Endpoint, command: &str, message: &str) {
        self.push_reply(endpoint, command, Script::StoreError(message.to_string()));
    }

    pub fn push_io_error(&self, endpoint: &Endpoint, command: &str, kind: std::io::ErrorKind) {
        self.push_reply(endpoint, command, Script::Io(kind));
    }

    /// Every command exchanged so far, in order.
    pub fn calls(&self) -> Vec<(Endpoint, String, Vec<String>)> {
        self.state.lock().calls.clone()
    }

    /// Calls of one command only, as `(endpoint, args)`.
    pub fn calls_of(&self, command: &str) -> Vec<(Endpoint, Vec<String>)> {
        self.calls()
            .into_iter()
            .filter(|(_, c, _)| c == command)
            .map(|(e, _, a)| (e, a))
            .collect()
    }

    pub fn closed_endpoints(&self) -> Vec<Endpoint> {
        self.state.lock().closes.clone()
    }

    fn connect(&self, endpoint: &Endpoint) -> Result<()> {
        let mut state = self.state.lock();
        if state.unreachable.contains(endpoint) {
            return Err(ClusterError::Connection(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("{endpoint} unreachable"),
            )));
        }
        state.connects.push(endpoint.clone());
        Ok(())
    }

    fn execute(&self, endpoint: &Endpoint, command: &str, args: &[String]) -> Result<Value> {
        let mut state = self.state.lock();
        state
            .calls
            .push((endpoint.clone(), command.to_string(), args.to_vec()));

        let scripted = state
            .replies
            .get_mut(&(endpoint.clone(), command.to_string()))
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(Script::Value(value)) => Ok(value),
            Some(Script::StoreError(message)) => Err(ClusterError::Store(message)),
            Some(Script::Io(kind)) => Err(ClusterError::Connection(std::io::Error::new(
                kind,
                format!("{endpoint} dropped"),
            ))),
            None => Ok(Value::ok()),
        }
    }

    fn topology(&self, endpoint: &Endpoint) -> Result<Vec<SlotAssignment>> {
        let state = self.state.lock();
        if let Some(message) = state.topology_errors.get(endpoint) {
            return Err(ClusterError::Store(message.clone()));
        }
        Ok(state.topology.clone())
    }
}

pub struct MockConnector {
    backend: Arc<MockBackend>,
}

impl Connector for MockConnector {
    type Conn = MockConnection;

    fn connect(&self, endpoint: &Endpoint, _options: &ConnectionOptions) -> Result<MockConnection> {
        self.backend.connect(endpoint)?;
        Ok(MockConnection {
            endpoint: endpoint.clone(),
            backend: Arc::clone(&self.backend),
        })
    }
}

pub struct MockConnection {
    endpoint: Endpoint,
    backend: Arc<MockBackend>,
}

impl Connection for MockConnection {
    fn execute(&mut self, command: &str, args: &[String]) -> Result<Value> {
        self.backend.execute(&self.endpoint, command, args)
    }

    fn topology(&mut self) -> Result<Vec<SlotAssignment>> {
        self.backend.topology(&self.endpoint)
    }

    fn close(&mut self) {
        self.backend.state.lock().closes.push(self.endpoint.clone());
    }
}

pub fn ep(port: u16) -> Endpoint {
    Endpoint::new("127.0.0.1", port)
}

pub fn assignment(start: u16, end: u16, master_port: u16) -> SlotAssignment {
    SlotAssignment {
        range: SlotRange::new(start, end),
        master: ep(master_port),
        replicas: Vec::new(),
    }
}

/// The four-way split used by most cluster tests.
pub fn four_node_topology() -> Vec<SlotAssignment> {
    vec![
        assignment(1000, 5460, 7003),
        assignment(0, 999, 7006),
        assignment(10923, 16383, 7002),
        assignment(5461, 10922, 7004),
    ]
}

/// Build a client against the scripted backend.
pub fn client(
    backend: &Arc<MockBackend>,
    seeds: Vec<Endpoint>,
    config: ClusterConfig,
) -> Result<ClusterClient<MockConnector>> {
    ClusterClient::new(backend.connector(), seeds, config)
}

/// A native scan reply: `[cursor, [keys...]]`.
pub fn scan_reply(cursor: &str, keys: &[&str]) -> Value {
    Value::array(vec![
        Value::bulk(cursor.to_string()),
        Value::array(keys.iter().map(|k| Value::bulk(k.to_string())).collect()),
    ])
}

/// A flat array of bulk strings.
pub fn string_array(items: &[&str]) -> Value {
    Value::array(items.iter().map(|k| Value::bulk(k.to_string())).collect())
}
