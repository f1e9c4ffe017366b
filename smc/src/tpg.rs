use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use itertools::izip;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::sharing::{share_secret, Share};
use crate::SmcField;

/// Shares of one Beaver triplet destined for a single party.
pub type TripletShares<T> = (Share<T>, Share<T>, Share<T>);

/// Error raised by the parameter generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TpgError {
    /// The requesting client is not a registered participant.
    UnknownParticipant(String),
}

impl fmt::Display for TpgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UnknownParticipant(ref id) => write!(f, "Unknown participant {}", id),
        }
    }
}

impl std::error::Error for TpgError {}

/// Trusted generator of Beaver triplets.
///
/// Triplets are dealt lazily: the first request for an op-id draws `(a, b)`
/// uniformly, computes `c = ab`, splits every component into additive shares
/// and caches the per-party map. Later requests for the same op-id are served
/// from the cache, so all parties see one consistent triplet.
pub struct TrustedParamGenerator<T: SmcField> {
    participant_ids: Vec<String>,
    state: Mutex<TpgState<T>>,
}

struct TpgState<T> {
    rng: StdRng,
    triplets: HashMap<String, HashMap<String, TripletShares<T>>>,
}

impl<T: SmcField> TrustedParamGenerator<T> {
    /// Create a generator for the given participants.
    pub fn new(participant_ids: Vec<String>) -> Self {
        Self::with_rng(participant_ids, StdRng::from_entropy())
    }

    /// Deterministic generator for tests and benchmarks.
    pub fn with_seed(participant_ids: Vec<String>, seed: u64) -> Self {
        Self::with_rng(participant_ids, StdRng::seed_from_u64(seed))
    }

    fn with_rng(participant_ids: Vec<String>, rng: StdRng) -> Self {
        Self {
            participant_ids,
            state: Mutex::new(TpgState {
                rng,
                triplets: HashMap::new(),
            }),
        }
    }

    /// This client's shares of the triplet for `op_id`.
    ///
    /// The check-generate-insert sequence runs under one lock, so a triplet
    /// is dealt at most once per op-id no matter how many parties race on
    /// their first fetch.
    pub fn triplet_shares(
        &self,
        client_id: &str,
        op_id: &str,
    ) -> Result<TripletShares<T>, TpgError> {
        if !self.participant_ids.iter().any(|id| id == client_id) {
            return Err(TpgError::UnknownParticipant(client_id.to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let TpgState { rng, triplets } = &mut *state;
        let per_party = triplets.entry(op_id.to_string()).or_insert_with(|| {
            debug!(op_id, "dealing fresh beaver triplet");
            Self::deal(rng, &self.participant_ids)
        });
        Ok(per_party[client_id])
    }

    /// Number of distinct op-ids dealt so far.
    pub fn triplet_count(&self) -> usize {
        self.state.lock().unwrap().triplets.len()
    }

    fn deal(rng: &mut StdRng, participant_ids: &[String]) -> HashMap<String, TripletShares<T>> {
        let num_parties = participant_ids.len();
        let a = T::random(&mut *rng);
        let b = T::random(&mut *rng);
        let c = a * b;
        let a_shares = share_secret(rng, a, num_parties);
        let b_shares = share_secret(rng, b, num_parties);
        let c_shares = share_secret(rng, c, num_parties);
        izip!(participant_ids, a_shares, b_shares, c_shares)
            .map(|(id, a, b, c)| (id.clone(), (a, b, c)))
            .collect()
    }
}
