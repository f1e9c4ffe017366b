use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future;

use smc::expr::{Expression, SecretId};
use smc::fields::Fp31;
use smc::party::{ProtocolSpec, SmcParty};
use smc::relay::LocalRelay;
use smc::tpg::TrustedParamGenerator;
use smc::SmcField;

type Expr = Expression<Fp31>;

const PRIME: u64 = 1_753_388_297;

fn secret(raw: u128) -> Expr {
    Expr::secret(SecretId::from_raw(raw))
}

fn inputs(pairs: &[(u128, u64)]) -> BTreeMap<SecretId, u64> {
    pairs
        .iter()
        .map(|&(raw, value)| (SecretId::from_raw(raw), value))
        .collect()
}

/// Run one protocol instance with every party in the same process and assert
/// that all parties reconstruct `expected`. Returns the relay so tests can
/// inspect the parameter generator afterwards.
async fn run_all(
    expr: Expr,
    parties: Vec<(&str, BTreeMap<SecretId, u64>)>,
    expected: u64,
) -> Arc<LocalRelay<Fp31>> {
    let ids: Vec<String> = parties.iter().map(|(id, _)| id.to_string()).collect();
    let relay = LocalRelay::new(TrustedParamGenerator::with_seed(ids.clone(), 7));
    let spec = ProtocolSpec::new(expr, ids);

    let runs = parties.into_iter().map(|(id, values)| {
        SmcParty::new(id, relay.client(id), spec.clone(), values).run()
    });
    let results = future::try_join_all(runs).await.expect("protocol run failed");

    for result in results {
        assert_eq!(result, expected);
    }
    relay
}

/// Cleartext oracle for expected values that are awkward to write as
/// literals.
fn cleartext(expr: &Expr, pairs: &[(u128, u64)]) -> u64 {
    let values: BTreeMap<_, _> = pairs
        .iter()
        .map(|&(raw, value)| (SecretId::from_raw(raw), Fp31::from(value)))
        .collect();
    expr.eval_cleartext(&values)
        .expect("all secrets assigned")
        .truncated()
}

#[tokio::test]
async fn three_party_addition() {
    let expr = secret(1) + secret(2) + secret(3);
    run_all(
        expr,
        vec![
            ("alice", inputs(&[(1, 3)])),
            ("bob", inputs(&[(2, 14)])),
            ("charlie", inputs(&[(3, 2)])),
        ],
        19,
    )
    .await;
}

#[tokio::test]
async fn addition_and_subtraction_with_scalar() {
    let expr = (secret(1) + secret(2)) - Expr::scalar(5u64);
    run_all(
        expr,
        vec![("alice", inputs(&[(1, 10)])), ("bob", inputs(&[(2, 20)]))],
        25,
    )
    .await;
}

#[tokio::test]
async fn secret_times_secret_uses_one_triplet() {
    let expr = secret(1) * secret(2);
    let relay = run_all(
        expr,
        vec![("alice", inputs(&[(1, 7)])), ("bob", inputs(&[(2, 6)]))],
        42,
    )
    .await;
    assert_eq!(relay.tpg().triplet_count(), 1);
}

#[tokio::test]
async fn secret_times_scalar_never_contacts_the_tpg() {
    let expr = secret(1) * Expr::scalar(4u64);
    let relay = run_all(expr, vec![("alice", inputs(&[(1, 9)])), ("bob", inputs(&[]))], 36).await;
    assert_eq!(relay.tpg().triplet_count(), 0);
}

#[tokio::test]
async fn weighted_sum_of_scores() {
    let scores = [2u64, 0, 1, 2, 4, 2, 3];
    let weights = [2u64, 3, 4, 9, 5, 6, 10];

    let terms = (0..scores.len() as u128)
        .map(|i| secret(i) * secret(100 + i))
        .reduce(|acc, term| acc + term)
        .unwrap();
    let expr = Expr::scalar(3u64) * terms - Expr::scalar(50u64);

    let score_inputs: Vec<_> = scores
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as u128, v))
        .collect();
    let weight_inputs: Vec<_> = weights
        .iter()
        .enumerate()
        .map(|(i, &v)| (100 + i as u128, v))
        .collect();

    let expected = 3 * scores.iter().zip(&weights).map(|(s, w)| s * w).sum::<u64>() - 50;
    assert_eq!(
        expected,
        cleartext(
            &expr,
            &[score_inputs.clone(), weight_inputs.clone()].concat()
        )
    );

    let relay = run_all(
        expr,
        vec![
            ("scores", inputs(&score_inputs)),
            ("weights", inputs(&weight_inputs)),
        ],
        expected,
    )
    .await;
    // One triplet per secret-times-secret term.
    assert_eq!(relay.tpg().triplet_count(), scores.len());
}

#[tokio::test]
async fn scalar_subtree_inside_a_product() {
    // Only the leader contributes the +2; the outer *3 is a public-by-secret
    // multiplication applied by every party.
    let expr = Expr::scalar(3u64) * (secret(1) + Expr::scalar(2u64));
    let relay = run_all(expr, vec![("alice", inputs(&[(1, 4)])), ("bob", inputs(&[]))], 18).await;
    assert_eq!(relay.tpg().triplet_count(), 0);
}

#[tokio::test]
async fn bare_secret_expression() {
    run_all(secret(1), vec![("alice", inputs(&[(1, 12345)])), ("bob", inputs(&[]))], 12345).await;
}

#[tokio::test]
async fn bare_scalar_expression() {
    run_all(
        Expr::scalar(77u64),
        vec![("alice", inputs(&[])), ("bob", inputs(&[]))],
        77,
    )
    .await;
}

#[tokio::test]
async fn extreme_values_wrap_correctly() {
    let expr = secret(1) + secret(2);
    run_all(
        expr,
        vec![
            ("alice", inputs(&[(1, PRIME - 1)])),
            ("bob", inputs(&[(2, PRIME - 1)])),
        ],
        PRIME - 2,
    )
    .await;

    let expr = secret(1) * secret(2);
    run_all(
        expr,
        vec![
            ("alice", inputs(&[(1, PRIME - 1)])),
            ("bob", inputs(&[(2, PRIME - 1)])),
        ],
        1,
    )
    .await;

    let expr = secret(1) * secret(2);
    run_all(
        expr,
        vec![("alice", inputs(&[(1, 0)])), ("bob", inputs(&[(2, PRIME - 1)]))],
        0,
    )
    .await;
}

#[tokio::test]
async fn repeated_secret_in_one_expression() {
    // Bob receives the share of Alice's secret once and reuses it.
    let expr = secret(1) * secret(1);
    let relay = run_all(expr, vec![("alice", inputs(&[(1, 5)])), ("bob", inputs(&[]))], 25).await;
    assert_eq!(relay.tpg().triplet_count(), 1);
}

#[tokio::test]
async fn long_chain_of_scalar_multiplications() {
    let pairs = [(1u128, 3u64)];
    let mut expr = secret(1);
    for _ in 0..500 {
        expr = expr * Expr::scalar(2u64);
    }
    let expected = cleartext(&expr, &pairs);
    run_all(
        expr,
        vec![("alice", inputs(&pairs)), ("bob", inputs(&[]))],
        expected,
    )
    .await;
}

#[tokio::test]
async fn long_chain_of_beaver_multiplications() {
    let pairs = [(1u128, 3u64), (2u128, 2u64)];
    let mut expr = secret(1);
    for _ in 0..500 {
        expr = expr * secret(2);
    }
    let expected = cleartext(&expr, &pairs);
    let relay = run_all(
        expr,
        vec![("alice", inputs(&[(1, 3)])), ("bob", inputs(&[(2, 2)]))],
        expected,
    )
    .await;
    assert_eq!(relay.tpg().triplet_count(), 500);
}

#[tokio::test]
async fn parties_agree_for_every_shape_of_small_circuit() {
    let expr = (secret(1) - secret(2)) * (secret(1) + Expr::scalar(1u64)) + secret(3);
    let pairs = [(1u128, 11u64), (2, 4), (3, 1000)];
    let expected = cleartext(&expr, &pairs);
    run_all(
        expr,
        vec![
            ("alice", inputs(&[(1, 11)])),
            ("bob", inputs(&[(2, 4)])),
            ("charlie", inputs(&[(3, 1000)])),
        ],
        expected,
    )
    .await;
}
