//! Store reply values
//!
//! The transport hands replies back in this shape; errors travel on the `Err`
//! side as [`ClusterError`](crate::error::ClusterError), so there is no error
//! variant here.

use bytes::Bytes;

/// A reply from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Simple status string (`+OK`)
    Simple(Bytes),
    /// Integer reply
    Int(i64),
    /// Bulk string; `None` is the nil reply
    Bulk(Option<Bytes>),
    /// Array reply
    Array(Vec<Value>),
}

impl Value {
    /// The canonical `OK` status reply.
    pub fn ok() -> Self {
        Value::Simple(Bytes::from_static(b"OK"))
    }

    /// A bulk string reply.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Value::Bulk(Some(data.into()))
    }

    /// The nil reply.
    pub fn nil() -> Self {
        Value::Bulk(None)
    }

    /// An integer reply.
    pub fn int(n: i64) -> Self {
        Value::Int(n)
    }

    /// An array reply.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(items)
    }

    /// Raw bytes of a simple or bulk reply.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Simple(s) => Some(s),
            Value::Bulk(Some(b)) => Some(b),
            _ => None,
        }
    }

    /// UTF-8 view of a simple or bulk reply.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Integer reply, if that is what this is.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Array reply elements, if that is what this is.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Consume an array reply.
    pub fn into_array(self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::bulk(s.as_bytes().to_vec())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}
