use std::collections::HashMap;

/// The address of a queue within a transport. Opaque beyond equality/hashing/display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct QueueAddress(String);

impl QueueAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque message as seen by the coordinator's transport boundary: a payload plus
/// free-form headers. Serialization of the payload itself is entirely up to the caller.
#[derive(Debug, Clone)]
pub struct Message {
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl Message {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Correlates a `receive` with its eventual commit/abort. The in-memory transport never
/// aborts, so this is a thin marker today, but readers that talk to a transactional
/// transport thread it through `Transport::send`/`receive` unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionContext(u64);

impl TransactionContext {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Transport-reported properties, intentionally a loose bag since different transports
/// expose different things.
#[derive(Debug, Clone, Default)]
pub struct QueueProperties {
    pub approximate_depth: Option<u64>,
    pub extra: HashMap<String, String>,
}
