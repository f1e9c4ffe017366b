pub mod expr;
pub mod fields;
pub mod party;
pub mod relay;
pub mod sharing;
pub mod tpg;

use serde::{de::DeserializeOwned, Serialize};

/// Prime field that can be used in SMC computation.
///
/// The protocol only needs field arithmetic, uniform sampling and a stable
/// byte encoding; everything else is provided by `ff::PrimeField`.
pub trait SmcField: ff::PrimeField + Serialize + DeserializeOwned + Send + Sync {
    /// Convert to u64 by truncating remaining bits.
    fn truncated(&self) -> u64;
}
