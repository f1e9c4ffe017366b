use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::tpg::TrustedParamGenerator;
use crate::SmcField;

use super::{sanitize_url_param, RelayClient, RelayStats, TransportError};

/// Delay between polls against the in-process relay.
const LOCAL_POLL_DELAY: Duration = Duration::from_millis(1);

/// In-process relay for running every party inside one process.
///
/// Mirrors the delivery semantics of the HTTP broker: FIFO queues for private
/// messages keyed by (receiver, label), persistent broadcasts keyed by
/// (sender, label), and the embedded parameter generator behind the shares
/// endpoint.
pub struct LocalRelay<T: SmcField> {
    tpg: TrustedParamGenerator<T>,
    private: Mutex<HashMap<(String, String), VecDeque<Vec<u8>>>>,
    public: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl<T: SmcField> LocalRelay<T> {
    /// Create a relay around the given parameter generator.
    pub fn new(tpg: TrustedParamGenerator<T>) -> Arc<Self> {
        Arc::new(Self {
            tpg,
            private: Mutex::new(HashMap::new()),
            public: Mutex::new(HashMap::new()),
        })
    }

    /// Handle through which one party talks to this relay.
    pub fn client(self: &Arc<Self>, client_id: &str) -> LocalRelayClient<T> {
        LocalRelayClient {
            relay: Arc::clone(self),
            client_id: client_id.to_string(),
            stats: Mutex::new(RelayStats::default()),
        }
    }

    /// The embedded parameter generator.
    pub fn tpg(&self) -> &TrustedParamGenerator<T> {
        &self.tpg
    }
}

/// Per-party handle onto a [`LocalRelay`].
pub struct LocalRelayClient<T: SmcField> {
    relay: Arc<LocalRelay<T>>,
    client_id: String,
    stats: Mutex<RelayStats>,
}

#[async_trait]
impl<T: SmcField> RelayClient for LocalRelayClient<T> {
    async fn send_private(
        &self,
        receiver: &str,
        label: &str,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.stats.lock().unwrap().bytes_sent += payload.len() as u64;
        let key = (sanitize_url_param(receiver), sanitize_url_param(label));
        self.relay
            .private
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .push_back(payload);
        Ok(())
    }

    async fn recv_private(&self, label: &str) -> Result<Vec<u8>, TransportError> {
        let key = (
            sanitize_url_param(&self.client_id),
            sanitize_url_param(label),
        );
        let started = Instant::now();
        loop {
            let delivered = self
                .relay
                .private
                .lock()
                .unwrap()
                .get_mut(&key)
                .and_then(|queue| queue.pop_front());
            if let Some(payload) = delivered {
                let mut stats = self.stats.lock().unwrap();
                stats.bytes_received += payload.len() as u64;
                stats.time_retrieving += started.elapsed();
                return Ok(payload);
            }
            tokio::time::sleep(LOCAL_POLL_DELAY).await;
        }
    }

    async fn publish(&self, label: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.stats.lock().unwrap().bytes_sent += payload.len() as u64;
        let key = (
            sanitize_url_param(&self.client_id),
            sanitize_url_param(label),
        );
        self.relay.public.lock().unwrap().insert(key, payload);
        Ok(())
    }

    async fn recv_public(&self, sender: &str, label: &str) -> Result<Vec<u8>, TransportError> {
        let key = (sanitize_url_param(sender), sanitize_url_param(label));
        let started = Instant::now();
        loop {
            let published = self.relay.public.lock().unwrap().get(&key).cloned();
            if let Some(payload) = published {
                let mut stats = self.stats.lock().unwrap();
                stats.bytes_received += payload.len() as u64;
                stats.time_retrieving += started.elapsed();
                return Ok(payload);
            }
            tokio::time::sleep(LOCAL_POLL_DELAY).await;
        }
    }

    async fn fetch_triplet_shares(&self, op_id: &str) -> Result<[u64; 3], TransportError> {
        let started = Instant::now();
        let (a, b, c) = self
            .relay
            .tpg
            .triplet_shares(&self.client_id, op_id)
            .map_err(|err| TransportError::BadReply(err.to_string()))?;
        let reply = [a.0.truncated(), b.0.truncated(), c.0.truncated()];
        // The HTTP endpoint frames this as a JSON array of decimal integers;
        // mirror it so byte counters mean the same in both transports.
        let body = serde_json::to_vec(&reply)
            .map_err(|err| TransportError::BadReply(err.to_string()))?;
        let elapsed = started.elapsed();
        let mut stats = self.stats.lock().unwrap();
        stats.bytes_received += body.len() as u64;
        stats.bytes_from_tpg += body.len() as u64;
        stats.tpg_fetch_time += elapsed;
        stats.time_retrieving += elapsed;
        Ok(reply)
    }

    fn stats(&self) -> RelayStats {
        *self.stats.lock().unwrap()
    }
}
