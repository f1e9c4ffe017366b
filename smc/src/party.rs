use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::{debug, info};

use crate::expr::{Expression, NodePath, SecretId};
use crate::relay::{HttpRelayClient, RelayClient, TransportError};
use crate::sharing::{reconstruct, share_secret, Share};
use crate::SmcField;

/// What the parties agreed to compute: an expression and the ordered list of
/// participants. The first participant is the leader, the only party that
/// injects public constants into the shared sum.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtocolSpec<T> {
    pub expr: Expression<T>,
    pub participant_ids: Vec<String>,
}

impl<T: SmcField> ProtocolSpec<T> {
    /// Create a protocol spec. Every party must construct an identical one.
    pub fn new(expr: Expression<T>, participant_ids: Vec<String>) -> Self {
        Self {
            expr,
            participant_ids,
        }
    }

    /// Hash commitment over the spec.
    ///
    /// Parties that disagree on the expression or the participant order
    /// cannot be detected in-protocol; comparing this digest out of band is
    /// the diagnostic for it.
    pub fn commitment(&self) -> String {
        let encoded = bincode::serialize(self).expect("protocol spec is serializable");
        let digest = Sha3_256::digest(&encoded);
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

/// Ways a party configuration can be rejected before the protocol starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The participant list is empty.
    NoParticipants,
    /// The same id appears twice in the participant list.
    DuplicateParticipant(String),
    /// This party does not appear in the participant list.
    NotAParticipant(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NoParticipants => write!(f, "Participant list is empty"),
            Self::DuplicateParticipant(ref id) => {
                write!(f, "Participant {} is listed twice", id)
            }
            Self::NotAParticipant(ref id) => {
                write!(f, "Party {} is not in the participant list", id)
            }
        }
    }
}

/// Error of one protocol run. Every variant is fatal; the protocol has no
/// retry layer.
#[derive(Debug)]
pub enum SmcError {
    Config(ConfigError),
    Transport(TransportError),
    /// A message could not be encoded or decoded as a share.
    Codec(bincode::Error),
    /// An input value lies outside `[0, P)`.
    ValueOutOfRange { secret: SecretId, value: u64 },
}

impl fmt::Display for SmcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Config(ref err) => err.fmt(f),
            Self::Transport(ref err) => err.fmt(f),
            Self::Codec(ref err) => write!(f, "Share codec failed: {}", err),
            Self::ValueOutOfRange { secret, value } => {
                write!(f, "Value {} of secret {} is not a field element", value, secret)
            }
        }
    }
}

impl std::error::Error for SmcError {}

impl From<ConfigError> for SmcError {
    fn from(err: ConfigError) -> Self {
        SmcError::Config(err)
    }
}

impl From<TransportError> for SmcError {
    fn from(err: TransportError) -> Self {
        SmcError::Transport(err)
    }
}

impl From<bincode::Error> for SmcError {
    fn from(err: bincode::Error) -> Self {
        SmcError::Codec(err)
    }
}

/// Measurements of one instrumented run.
///
/// Computation counters are corrected for the time spent blocked on the
/// relay, so they approximate pure local work.
#[derive(Copy, Clone, Debug, Default)]
pub struct RunMetrics {
    pub comp_time_sharing: Duration,
    pub comp_time_processing: Duration,
    pub comp_time_reconstruction: Duration,
    pub runtime_overall: Duration,
    pub bytes_sent_smc_party: u64,
    pub bytes_received_smc_party: u64,
    pub bytes_sent_ttp: u64,
    pub comp_cost_ttp: Duration,
}

/// One participant of an SMC run.
///
/// The run proceeds through its phases strictly in order: distribute shares
/// of the own inputs, evaluate the expression to a local share of the output,
/// publish that share, reconstruct the result from everyone's shares.
pub struct SmcParty<T: SmcField, C: RelayClient> {
    client_id: String,
    spec: ProtocolSpec<T>,
    inputs: BTreeMap<SecretId, u64>,
    relay: C,
    rng: StdRng,
    own_shares: HashMap<SecretId, Share<T>>,
    received_shares: HashMap<SecretId, Share<T>>,
}

impl<T: SmcField, C: RelayClient> SmcParty<T, C> {
    /// Create a party. `inputs` assigns values to the secrets this party
    /// owns; a party may well own none and still participate.
    pub fn new(
        client_id: impl Into<String>,
        relay: C,
        spec: ProtocolSpec<T>,
        inputs: BTreeMap<SecretId, u64>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            spec,
            inputs,
            relay,
            rng: StdRng::from_entropy(),
            own_shares: HashMap::new(),
            received_shares: HashMap::new(),
        }
    }

    /// Run the protocol to completion and return the reconstructed result.
    pub async fn run(self) -> Result<u64, SmcError> {
        self.run_instrumented().await.map(|(result, _)| result)
    }

    /// Run the protocol and report traffic and timing next to the result.
    pub async fn run_instrumented(mut self) -> Result<(u64, RunMetrics), SmcError> {
        let overall_started = Instant::now();
        self.validate()?;
        debug!(
            client_id = %self.client_id,
            commitment = %self.spec.commitment(),
            "starting protocol run"
        );

        let comp_time_sharing = self.distribute_input_shares().await?;

        let stats_before = self.relay.stats();
        let eval_started = Instant::now();
        let expr = self.spec.expr.clone();
        let local_share = self.eval(&expr, NodePath::root()).await?;
        let eval_elapsed = eval_started.elapsed();
        let stats_after = self.relay.stats();
        let eval_wait = (stats_after.time_sending - stats_before.time_sending)
            + (stats_after.time_retrieving - stats_before.time_retrieving);
        let comp_time_processing = eval_elapsed.saturating_sub(eval_wait);

        let label = format!("{}-res", self.client_id);
        self.relay
            .publish(&label, encode_share(&local_share)?)
            .await?;
        debug!(client_id = %self.client_id, "published local result share");

        let mut result_shares = vec![local_share];
        for peer in self.spec.participant_ids.clone() {
            if peer == self.client_id {
                continue;
            }
            let payload = self.relay.recv_public(&peer, &format!("{peer}-res")).await?;
            result_shares.push(decode_share(&payload)?);
        }

        let reconstruct_started = Instant::now();
        let result = reconstruct(result_shares).truncated();
        let comp_time_reconstruction = reconstruct_started.elapsed();

        let stats = self.relay.stats();
        let runtime_overall = overall_started
            .elapsed()
            .saturating_sub(stats.time_sending + stats.time_retrieving);
        info!(client_id = %self.client_id, result, "protocol run finished");

        Ok((
            result,
            RunMetrics {
                comp_time_sharing,
                comp_time_processing,
                comp_time_reconstruction,
                runtime_overall,
                bytes_sent_smc_party: stats.bytes_sent,
                bytes_received_smc_party: stats.bytes_received,
                bytes_sent_ttp: stats.bytes_from_tpg,
                comp_cost_ttp: stats.tpg_fetch_time,
            },
        ))
    }

    fn validate(&self) -> Result<(), SmcError> {
        let ids = &self.spec.participant_ids;
        if ids.is_empty() {
            return Err(ConfigError::NoParticipants.into());
        }
        for (index, id) in ids.iter().enumerate() {
            if ids[..index].contains(id) {
                return Err(ConfigError::DuplicateParticipant(id.clone()).into());
            }
        }
        if !ids.contains(&self.client_id) {
            return Err(ConfigError::NotAParticipant(self.client_id.clone()).into());
        }
        for (&secret, &value) in &self.inputs {
            if T::from(value).truncated() != value {
                return Err(SmcError::ValueOutOfRange { secret, value });
            }
        }
        Ok(())
    }

    /// Split every owned input into one share per participant; the share at
    /// index i goes to `participant_ids[i]`, our own index stays local.
    /// Returns the time spent in the sharing computation itself.
    async fn distribute_input_shares(&mut self) -> Result<Duration, SmcError> {
        let num_parties = self.spec.participant_ids.len();
        let my_index = self
            .spec
            .participant_ids
            .iter()
            .position(|id| *id == self.client_id)
            .expect("party id was validated against the participant list");

        let mut sharing_time = Duration::ZERO;
        for (&secret, &value) in &self.inputs {
            let started = Instant::now();
            let shares = share_secret(&mut self.rng, T::from(value), num_parties);
            sharing_time += started.elapsed();

            for (index, participant) in self.spec.participant_ids.iter().enumerate() {
                if index == my_index {
                    self.own_shares.insert(secret, shares[index]);
                } else {
                    self.relay
                        .send_private(participant, &secret.to_string(), encode_share(&shares[index])?)
                        .await?;
                }
            }
            debug!(client_id = %self.client_id, secret = %secret, "distributed input shares");
        }
        Ok(sharing_time)
    }

    /// True iff this party is the first participant.
    fn is_leader(&self) -> bool {
        self.spec.participant_ids[0] == self.client_id
    }

    /// Evaluate a subtree to this party's share of its value.
    ///
    /// Evaluation is strictly sequential in post-order; only the broadcasts
    /// inside a Beaver round are awaited concurrently.
    fn eval<'a>(
        &'a mut self,
        expr: &'a Expression<T>,
        path: NodePath,
    ) -> Pin<Box<dyn Future<Output = Result<Share<T>, SmcError>> + Send + 'a>> {
        Box::pin(async move {
            // A subtree without secrets evaluates to the same value at every
            // party. Only the leader contributes it to the shared sum, so the
            // contributions of all parties add up to exactly the value;
            // everyone else skips the subtree.
            if !expr.contains_secret() {
                if self.is_leader() {
                    return Ok(Share(public_value(expr)));
                }
                return Ok(Share::zero());
            }
            match expr {
                Expression::Secret(id) => self.secret_share(*id).await,
                Expression::Scalar(_) => unreachable!("scalar subtrees contain no secrets"),
                Expression::Add(lhs, rhs) => {
                    let left = self.eval(lhs, path.left()).await?;
                    let right = self.eval(rhs, path.right()).await?;
                    Ok(left + right)
                }
                Expression::Sub(lhs, rhs) => {
                    let left = self.eval(lhs, path.left()).await?;
                    let right = self.eval(rhs, path.right()).await?;
                    Ok(left - right)
                }
                Expression::Mul(lhs, rhs) => {
                    if !lhs.contains_secret() {
                        // A public multiplier scales the sharing locally, so
                        // every party applies the full cleartext value.
                        let share = self.eval(rhs, path.right()).await?;
                        Ok(share * public_value(lhs))
                    } else if !rhs.contains_secret() {
                        let share = self.eval(lhs, path.left()).await?;
                        Ok(share * public_value(rhs))
                    } else {
                        let x = self.eval(lhs, path.left()).await?;
                        let y = self.eval(rhs, path.right()).await?;
                        self.beaver_mul(x, y, &path).await
                    }
                }
            }
        })
    }

    /// Local share of a secret. Own secrets were assigned during input
    /// sharing; foreign ones arrive as private messages and are cached in
    /// case the expression references the same secret again.
    async fn secret_share(&mut self, id: SecretId) -> Result<Share<T>, SmcError> {
        if let Some(&share) = self.own_shares.get(&id) {
            return Ok(share);
        }
        if let Some(&share) = self.received_shares.get(&id) {
            return Ok(share);
        }
        let payload = self.relay.recv_private(&id.to_string()).await?;
        let share = decode_share(&payload)?;
        self.received_shares.insert(id, share);
        Ok(share)
    }

    /// Beaver multiplication of two secret-dependent sharings.
    async fn beaver_mul(
        &mut self,
        x: Share<T>,
        y: Share<T>,
        path: &NodePath,
    ) -> Result<Share<T>, SmcError> {
        let op_id = path.op_id();
        debug!(client_id = %self.client_id, op_id = %op_id, "beaver multiplication");

        let [a, b, c] = self.relay.fetch_triplet_shares(&op_id).await?;
        let (a, b, c) = (Share(T::from(a)), Share(T::from(b)), Share(T::from(c)));

        let x_masked = x - a;
        let y_masked = y - b;
        self.relay
            .publish(
                &format!("{}-{}-(x-a)", self.client_id, op_id),
                encode_share(&x_masked)?,
            )
            .await?;
        self.relay
            .publish(
                &format!("{}-{}-(y-b)", self.client_id, op_id),
                encode_share(&y_masked)?,
            )
            .await?;

        // Gather the peers' masked shares; their content does not depend on
        // arrival order, so the fetches may run concurrently.
        let relay = &self.relay;
        let op_id = &op_id;
        let client_id = &self.client_id;
        let gathered = futures::future::try_join_all(
            self.spec
                .participant_ids
                .iter()
                .filter(|id| *id != client_id)
                .map(|peer| async move {
                    let x_payload = relay
                        .recv_public(peer, &format!("{peer}-{op_id}-(x-a)"))
                        .await?;
                    let y_payload = relay
                        .recv_public(peer, &format!("{peer}-{op_id}-(y-b)"))
                        .await?;
                    Ok::<_, SmcError>((decode_share(&x_payload)?, decode_share(&y_payload)?))
                }),
        )
        .await?;

        let x_open = reconstruct(
            std::iter::once(x_masked).chain(gathered.iter().map(|&(x_peer, _)| x_peer)),
        );
        let y_open = reconstruct(
            std::iter::once(y_masked).chain(gathered.iter().map(|&(_, y_peer)| y_peer)),
        );

        // z_i = c_i + x_i (y - b) + y_i (x - a); the leader alone subtracts
        // the public (x - a)(y - b) term.
        let mut z = c + x * y_open + y * x_open;
        if self.is_leader() {
            z -= Share(x_open * y_open);
        }
        Ok(z)
    }
}

/// Execute one SMC run against the relay at `host:port`.
///
/// Library entry point for a party living in its own process; in-process
/// setups construct an [`SmcParty`] over a [`crate::relay::LocalRelay`]
/// client instead.
pub async fn run_party<T: SmcField>(
    client_id: &str,
    host: &str,
    port: u16,
    spec: ProtocolSpec<T>,
    inputs: BTreeMap<SecretId, u64>,
) -> Result<u64, SmcError> {
    let relay = HttpRelayClient::new(host, port, client_id);
    SmcParty::new(client_id, relay, spec, inputs).run().await
}

/// Value of a subtree that holds no secret leaves; identical at every party.
fn public_value<T: SmcField>(expr: &Expression<T>) -> T {
    expr.eval_cleartext(&BTreeMap::new())
        .expect("public subtree contains no secrets")
}

/// Wire encoding of a share.
fn encode_share<T: SmcField>(share: &Share<T>) -> Result<Vec<u8>, SmcError> {
    Ok(bincode::serialize(share)?)
}

/// Inverse of [`encode_share`]; bit-exact round-trip.
fn decode_share<T: SmcField>(payload: &[u8]) -> Result<Share<T>, SmcError> {
    Ok(bincode::deserialize(payload)?)
}
