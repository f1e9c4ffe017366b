use std::collections::BTreeMap;

use argh::FromArgs;
use futures::future;
use smc::expr::{Expression, SecretId};
use smc::fields::Fp31;
use smc::party::{run_party, ProtocolSpec, SmcParty};
use smc::relay::LocalRelay;
use smc::tpg::TrustedParamGenerator;
use smc::SmcField;

/// Expression type of the scoring circuit.
type Expr = Expression<Fp31>;

/// The inventory has seven subscales; scores and weights line up index by
/// index.
const NUM_SUBSCALES: usize = 7;

/// Scaling factor applied to the weighted sum of subscale scores.
const SCALING_FACTOR: u64 = 3;

/// Corruptness index subtracted from the scaled score.
const CORRUPTNESS_INDEX: u64 = 50;

/// Party holding the subscale scores of the assessment.
const SCORES_PARTY: &str = "scores";

/// Party holding the (proprietary) subscale weights.
const WEIGHTS_PARTY: &str = "weights";

/// Jointly compute a weighted assessment score without revealing the raw
/// subscale scores or the weights to the other party.
#[derive(FromArgs, Debug)]
struct Options {
    /// relay address as host:port; if absent, both parties run in-process
    #[argh(option)]
    relay: Option<String>,

    /// party to run when joining an external relay ("scores" or "weights")
    #[argh(option)]
    id: Option<String>,

    /// comma-separated subscale scores
    #[argh(option, default = "String::from(\"2,0,1,2,4,2,3\")")]
    scores: String,

    /// comma-separated subscale weights
    #[argh(option, default = "String::from(\"2,3,4,9,5,6,10\")")]
    weights: String,
}

/// Secret ids must match across processes, so both input vectors use fixed
/// ids derived from the subscale index.
fn score_ids() -> Vec<SecretId> {
    (0..NUM_SUBSCALES)
        .map(|i| SecretId::from_raw(i as u128))
        .collect()
}

fn weight_ids() -> Vec<SecretId> {
    (0..NUM_SUBSCALES)
        .map(|i| SecretId::from_raw((NUM_SUBSCALES + i) as u128))
        .collect()
}

/// scaling * (score_1 * weight_1 + ... + score_7 * weight_7) - corruptness.
fn scoring_circuit() -> Expr {
    let weighted_sum = score_ids()
        .into_iter()
        .zip(weight_ids())
        .map(|(score, weight)| Expr::secret(score) * Expr::secret(weight))
        .reduce(|acc, term| acc + term)
        .expect("at least one subscale");
    Expr::scalar(SCALING_FACTOR) * weighted_sum - Expr::scalar(CORRUPTNESS_INDEX)
}

fn participant_ids() -> Vec<String> {
    vec![SCORES_PARTY.to_string(), WEIGHTS_PARTY.to_string()]
}

fn parse_values(raw: &str, what: &str) -> Vec<u64> {
    let values: Vec<u64> = raw
        .split(',')
        .map(|x| x.trim().parse())
        .collect::<Result<_, _>>()
        .unwrap_or_else(|_| panic!("Invalid {what} vector"));
    if values.len() != NUM_SUBSCALES {
        panic!("Expected {NUM_SUBSCALES} {what}, got {}", values.len());
    }
    values
}

fn inputs_for(ids: &[SecretId], values: &[u64]) -> BTreeMap<SecretId, u64> {
    ids.iter().copied().zip(values.iter().copied()).collect()
}

/// Both parties in one process, talking through the in-process relay.
async fn run_local(scores: Vec<u64>, weights: Vec<u64>) {
    let ids = participant_ids();
    let relay = LocalRelay::new(TrustedParamGenerator::<Fp31>::new(ids.clone()));
    let spec = ProtocolSpec::new(scoring_circuit(), ids);

    let scores_party = SmcParty::new(
        SCORES_PARTY,
        relay.client(SCORES_PARTY),
        spec.clone(),
        inputs_for(&score_ids(), &scores),
    );
    let weights_party = SmcParty::new(
        WEIGHTS_PARTY,
        relay.client(WEIGHTS_PARTY),
        spec,
        inputs_for(&weight_ids(), &weights),
    );

    let (scores_result, weights_result) =
        future::try_join(scores_party.run(), weights_party.run())
            .await
            .expect("Protocol run failed");
    assert_eq!(scores_result, weights_result);

    println!("Joint score: {scores_result}");

    let mut values = BTreeMap::new();
    for (id, &value) in score_ids().iter().zip(&scores) {
        values.insert(*id, Fp31::from(value));
    }
    for (id, &value) in weight_ids().iter().zip(&weights) {
        values.insert(*id, Fp31::from(value));
    }
    let expected = scoring_circuit()
        .eval_cleartext(&values)
        .expect("all secrets assigned")
        .truncated();
    println!("Cleartext check: {expected}");
}

/// One party in this process, the peer somewhere behind the relay.
async fn run_remote(relay: String, id: String, scores: Vec<u64>, weights: Vec<u64>) {
    let (host, port) = relay.rsplit_once(':').expect("Relay must be host:port");
    let port: u16 = port.parse().expect("Invalid relay port");

    let inputs = match id.as_str() {
        SCORES_PARTY => inputs_for(&score_ids(), &scores),
        WEIGHTS_PARTY => inputs_for(&weight_ids(), &weights),
        other => panic!("Unknown party {other}; expected {SCORES_PARTY} or {WEIGHTS_PARTY}"),
    };

    let spec = ProtocolSpec::new(scoring_circuit(), participant_ids());
    let result = run_party(&id, host, port, spec, inputs)
        .await
        .expect("Protocol run failed");
    println!("Joint score: {result}");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let options: Options = argh::from_env();

    let scores = parse_values(&options.scores, "scores");
    let weights = parse_values(&options.weights, "weights");

    match options.relay {
        Some(relay) => {
            let id = options.id.expect("--id is required when joining a relay");
            run_remote(relay, id, scores, weights).await;
        }
        None => run_local(scores, weights).await,
    }
}
