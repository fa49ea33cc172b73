//! Error taxonomy and store-error classification
//!
//! Every error response coming off the wire is classified exactly once, here,
//! into the variants the execution engine and discovery act on. Redirects
//! (`MOVED`/`ASK`) are signals handled inside the engine, not user-visible
//! failures, unless a redirect loop forces them back to the caller.

use redroute_core::{Endpoint, InvalidEndpoint, Slot};

/// Errors surfaced by the cluster client.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Transient connectivity failure (refused, timeout, permission denied).
    /// Retried up to the configured budget, then surfaced verbatim.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Permanent redirect: the slot has a new owner and our topology is stale.
    #[error("MOVED {slot} {endpoint}")]
    Moved { slot: Slot, endpoint: Endpoint },

    /// Temporary redirect: ask the named node for this one command.
    #[error("ASK {slot} {endpoint}")]
    Ask { slot: Slot, endpoint: Endpoint },

    /// The command has no deterministic routing target, or no known node owns
    /// the computed slot.
    #[error("command not supported: {0}")]
    CommandNotSupported(String),

    /// A multi-key scripting command was issued without any keys.
    #[error("keys must be specified for command {0}")]
    KeysNotSpecified(String),

    /// Scripting keys hash to different slots; cross-shard scripts are not
    /// supported by the store. Hash tags can force co-location.
    #[error("keys must map to the same hash slot: {0:?}")]
    KeysNotAtSameSlot(Vec<String>),

    /// The store reports clustering disabled while `force_cluster` is set.
    #[error("cluster support is disabled on the server")]
    ClusterSupportDisabled,

    /// Authentication failure during discovery; never retried on another seed.
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// A distributed-scan cursor that does not parse.
    #[error("invalid scan cursor: {0:?}")]
    InvalidCursor(String),

    /// The store answered with a reply shape this layer cannot interpret.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    /// Client misconfiguration detected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Any other error response from the store, surfaced verbatim.
    #[error("{0}")]
    Store(String),

    /// A redirect named an endpoint that does not parse.
    #[error(transparent)]
    InvalidEndpoint(#[from] InvalidEndpoint),
}

impl ClusterError {
    /// Whether this failure is in the transient connectivity class.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClusterError::Connection(_))
    }

    /// Whether this is an internal redirect signal.
    pub fn is_redirect(&self) -> bool {
        matches!(self, ClusterError::Moved { .. } | ClusterError::Ask { .. })
    }

    /// Demote a redirect back to the generic store error it arrived as.
    ///
    /// Used when a second redirect arrives after the engine has already spent
    /// its single redirect retry; looping again would chase a flapping
    /// cluster forever.
    pub(crate) fn into_store_error(self) -> ClusterError {
        match self {
            ClusterError::Moved { .. } | ClusterError::Ask { .. } => {
                ClusterError::Store(self.to_string())
            }
            other => other,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Classify a raw error string from the store.
///
/// Responses beginning with `MOVED` or `ASK` followed by `<slot> <host>:<port>`
/// are redirects; `NOAUTH` is an authentication failure; the standalone-mode
/// "cluster support disabled" response gets its own variant so discovery can
/// decide on single-node fallback. Everything else is a generic store error.
pub(crate) fn classify_store_error(message: &str) -> ClusterError {
    let mut tokens = message.split_whitespace();
    match tokens.next() {
        Some(code @ ("MOVED" | "ASK")) => match parse_redirect(tokens) {
            Some((slot, endpoint)) if code == "MOVED" => ClusterError::Moved { slot, endpoint },
            Some((slot, endpoint)) => ClusterError::Ask { slot, endpoint },
            None => ClusterError::Store(message.to_string()),
        },
        Some("NOAUTH") => ClusterError::AuthenticationRequired(message.to_string()),
        _ if message.ends_with("cluster support disabled") => ClusterError::ClusterSupportDisabled,
        _ => ClusterError::Store(message.to_string()),
    }
}

fn parse_redirect<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Option<(Slot, Endpoint)> {
    let slot = tokens.next()?.parse().ok()?;
    let endpoint = tokens.next()?.parse().ok()?;
    Some((slot, endpoint))
}
