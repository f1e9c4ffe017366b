use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use super::{sanitize_url_param, RelayClient, RelayStats, TransportError, DEFAULT_POLL_DELAY};

/// Relay client speaking the HTTP protocol of the message broker.
///
/// Each receive polls its URL until the relay stops answering 404; any other
/// non-200 status is fatal. Triplet shares come back as a JSON array of three
/// decimal integers, all other payloads are opaque bytes.
pub struct HttpRelayClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    poll_delay: Duration,
    stats: Mutex<RelayStats>,
}

impl HttpRelayClient {
    /// Create a client for the relay at `host:port`, acting as `client_id`.
    pub fn new(host: &str, port: u16, client_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("http://{host}:{port}"),
            client_id: sanitize_url_param(client_id),
            poll_delay: DEFAULT_POLL_DELAY,
            stats: Mutex::new(RelayStats::default()),
        }
    }

    /// Override the delay between polls.
    pub fn with_poll_delay(mut self, poll_delay: Duration) -> Self {
        self.poll_delay = poll_delay;
        self
    }

    async fn post(&self, url: String, payload: Vec<u8>) -> Result<(), TransportError> {
        debug!(%url, bytes = payload.len(), "POST");
        self.stats.lock().unwrap().bytes_sent += payload.len() as u64;
        let started = Instant::now();
        let response = self.http.post(&url).body(payload).send().await?;
        self.stats.lock().unwrap().time_sending += started.elapsed();
        match response.status().as_u16() {
            200 => Ok(()),
            status => Err(TransportError::Status(status)),
        }
    }

    /// Poll `url` until the relay answers 200.
    async fn poll(&self, url: String) -> Result<Vec<u8>, TransportError> {
        let started = Instant::now();
        loop {
            debug!(%url, "GET");
            let response = self.http.get(&url).send().await?;
            match response.status().as_u16() {
                200 => {
                    let body = response.bytes().await?;
                    let mut stats = self.stats.lock().unwrap();
                    stats.bytes_received += body.len() as u64;
                    stats.time_retrieving += started.elapsed();
                    return Ok(body.to_vec());
                }
                404 => tokio::time::sleep(self.poll_delay).await,
                status => return Err(TransportError::Status(status)),
            }
        }
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn send_private(
        &self,
        receiver: &str,
        label: &str,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        let url = format!(
            "{}/private/{}/{}/{}",
            self.base_url,
            self.client_id,
            sanitize_url_param(receiver),
            sanitize_url_param(label),
        );
        self.post(url, payload).await
    }

    async fn recv_private(&self, label: &str) -> Result<Vec<u8>, TransportError> {
        let url = format!(
            "{}/private/{}/{}",
            self.base_url,
            self.client_id,
            sanitize_url_param(label),
        );
        self.poll(url).await
    }

    async fn publish(&self, label: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let url = format!(
            "{}/public/{}/{}",
            self.base_url,
            self.client_id,
            sanitize_url_param(label),
        );
        self.post(url, payload).await
    }

    async fn recv_public(&self, sender: &str, label: &str) -> Result<Vec<u8>, TransportError> {
        let url = format!(
            "{}/public/{}/{}/{}",
            self.base_url,
            self.client_id,
            sanitize_url_param(sender),
            sanitize_url_param(label),
        );
        self.poll(url).await
    }

    async fn fetch_triplet_shares(&self, op_id: &str) -> Result<[u64; 3], TransportError> {
        let url = format!(
            "{}/shares/{}/{}",
            self.base_url,
            self.client_id,
            sanitize_url_param(op_id),
        );
        debug!(%url, "GET");
        let started = Instant::now();
        let response = self.http.get(&url).send().await?;
        if response.status().as_u16() != 200 {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        let body = response.bytes().await?;
        let elapsed = started.elapsed();
        {
            let mut stats = self.stats.lock().unwrap();
            stats.bytes_received += body.len() as u64;
            stats.bytes_from_tpg += body.len() as u64;
            stats.tpg_fetch_time += elapsed;
            stats.time_retrieving += elapsed;
        }
        serde_json::from_slice(&body).map_err(|err| TransportError::BadReply(err.to_string()))
    }

    fn stats(&self) -> RelayStats {
        *self.stats.lock().unwrap()
    }
}
