mod http;
mod local;

pub use http::HttpRelayClient;
pub use local::{LocalRelay, LocalRelayClient};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Delay between polls while a message has not been posted yet.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(200);

/// Error type for relay communication.
#[derive(Debug)]
pub enum TransportError {
    /// The underlying HTTP request failed.
    Request(reqwest::Error),
    /// The relay answered with a status that is neither 200 nor 404.
    Status(u16),
    /// A reply body could not be interpreted.
    BadReply(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Request(ref err) => write!(f, "Relay request failed: {}", err),
            Self::Status(status) => write!(f, "Unexpected relay status {}", status),
            Self::BadReply(ref reason) => write!(f, "Malformed relay reply: {}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err)
    }
}

/// Byte and wait-time counters of one relay client.
#[derive(Copy, Clone, Debug, Default)]
pub struct RelayStats {
    /// Payload bytes sent by this party, private sends and broadcasts alike.
    pub bytes_sent: u64,
    /// Payload bytes received by this party, triplet replies included.
    pub bytes_received: u64,
    /// Bytes served to this party by the parameter generator.
    pub bytes_from_tpg: u64,
    /// Wall time spent blocked on sends.
    pub time_sending: Duration,
    /// Wall time spent blocked on receives, polling included.
    pub time_retrieving: Duration,
    /// Round-trip time of triplet fetches.
    pub tpg_fetch_time: Duration,
}

/// Client side of the message relay.
///
/// Receives block until the message is available; a 404 from the relay means
/// "not posted yet", never an error, and an empty 200 body is a valid
/// message. The relay delivers FIFO per label but gives no ordering across
/// labels.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Send a point-to-point message to `receiver` under `label`.
    async fn send_private(
        &self,
        receiver: &str,
        label: &str,
        payload: Vec<u8>,
    ) -> Result<(), TransportError>;

    /// Receive the oldest undelivered private message posted for this party
    /// under `label`.
    async fn recv_private(&self, label: &str) -> Result<Vec<u8>, TransportError>;

    /// Broadcast a message under `label`.
    async fn publish(&self, label: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Read the message `sender` broadcast under `label`.
    async fn recv_public(&self, sender: &str, label: &str) -> Result<Vec<u8>, TransportError>;

    /// Fetch this party's Beaver triplet shares `[a, b, c]` for `op_id`.
    async fn fetch_triplet_shares(&self, op_id: &str) -> Result<[u64; 3], TransportError>;

    /// Snapshot of the traffic counters of this client.
    fn stats(&self) -> RelayStats;
}

/// Make an identifier or label safe for use in a URL path.
///
/// Percent-encoded slashes are indistinguishable from raw ones on the relay
/// side, so both collapse to `_`; `+` becomes `-`. Idempotent.
pub fn sanitize_url_param(raw: &str) -> String {
    raw.replace("%2F", "_")
        .replace("%2f", "_")
        .replace('/', "_")
        .replace('+', "-")
}
