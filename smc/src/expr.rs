use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// Globally unique tag of one private input.
///
/// Shares are routed by id equality alone, so two parties must never declare
/// the same id within a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecretId(u128);

impl SecretId {
    /// Draw a fresh random identifier.
    pub fn fresh() -> Self {
        SecretId(rand::random())
    }

    /// Identifier with a caller-chosen value, for setups where parties in
    /// separate processes must agree on ids ahead of time.
    pub fn from_raw(raw: u128) -> Self {
        SecretId(raw)
    }
}

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Arithmetic expression over private inputs and public constants.
///
/// Operator nodes own their children exclusively; trees are composed with the
/// usual `+`, `-` and `*` operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression<T> {
    Secret(SecretId),
    Scalar(T),
    Add(Box<Expression<T>>, Box<Expression<T>>),
    Sub(Box<Expression<T>>, Box<Expression<T>>),
    Mul(Box<Expression<T>>, Box<Expression<T>>),
}

impl<T: Copy> Expression<T> {
    /// Leaf referencing a private input.
    pub fn secret(id: SecretId) -> Self {
        Expression::Secret(id)
    }

    /// Leaf holding a public constant.
    pub fn scalar(value: impl Into<T>) -> Self {
        Expression::Scalar(value.into())
    }

    /// True iff any leaf of this subtree is a secret.
    ///
    /// Subtrees without secrets evaluate to the same value at every party and
    /// need no secret sharing.
    pub fn contains_secret(&self) -> bool {
        match self {
            Expression::Secret(_) => true,
            Expression::Scalar(_) => false,
            Expression::Add(lhs, rhs)
            | Expression::Sub(lhs, rhs)
            | Expression::Mul(lhs, rhs) => lhs.contains_secret() || rhs.contains_secret(),
        }
    }
}

impl<T: crate::SmcField> Expression<T> {
    /// Evaluate in cleartext, given values for all referenced secrets.
    ///
    /// Returns `None` when a secret has no entry in `values`.
    pub fn eval_cleartext(&self, values: &BTreeMap<SecretId, T>) -> Option<T> {
        match self {
            Expression::Secret(id) => values.get(id).copied(),
            Expression::Scalar(value) => Some(*value),
            Expression::Add(lhs, rhs) => {
                Some(lhs.eval_cleartext(values)? + rhs.eval_cleartext(values)?)
            }
            Expression::Sub(lhs, rhs) => {
                Some(lhs.eval_cleartext(values)? - rhs.eval_cleartext(values)?)
            }
            Expression::Mul(lhs, rhs) => {
                Some(lhs.eval_cleartext(values)? * rhs.eval_cleartext(values)?)
            }
        }
    }
}

impl<T> Add for Expression<T> {
    type Output = Expression<T>;
    fn add(self, rhs: Self) -> Self::Output {
        Expression::Add(Box::new(self), Box::new(rhs))
    }
}

impl<T> Sub for Expression<T> {
    type Output = Expression<T>;
    fn sub(self, rhs: Self) -> Self::Output {
        Expression::Sub(Box::new(self), Box::new(rhs))
    }
}

impl<T> Mul for Expression<T> {
    type Output = Expression<T>;
    fn mul(self, rhs: Self) -> Self::Output {
        Expression::Mul(Box::new(self), Box::new(rhs))
    }
}

/// Path from the root of the protocol expression to one of its nodes.
///
/// Every party walks the same tree, so the path identifies a node
/// consistently across parties. Each multiplication derives its Beaver op-id
/// from its own path and therefore consumes its own triplet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodePath(String);

impl NodePath {
    /// Path of the root node.
    pub fn root() -> Self {
        NodePath(String::new())
    }

    /// Path of the left child.
    pub fn left(&self) -> Self {
        let mut path = self.0.clone();
        path.push('0');
        NodePath(path)
    }

    /// Path of the right child.
    pub fn right(&self) -> Self {
        let mut path = self.0.clone();
        path.push('1');
        NodePath(path)
    }

    /// Stable URL-safe label for the operation at this path.
    pub fn op_id(&self) -> String {
        let digest = Sha3_256::digest(self.0.as_bytes());
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}
