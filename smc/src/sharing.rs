use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::SmcField;

/// Additive share of a field element held by one party.
///
/// The shares of all parties sum (mod P) to the shared value. A share carries
/// no provenance; routing happens entirely through message labels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share<T>(pub T);

impl<T: SmcField> Share<T> {
    /// Sharing of zero.
    pub fn zero() -> Self {
        Share(T::ZERO)
    }
}

impl<T: SmcField> Add for Share<T> {
    type Output = Share<T>;
    fn add(self, rhs: Self) -> Self::Output {
        Share(self.0 + rhs.0)
    }
}

impl<T: SmcField> Sub for Share<T> {
    type Output = Share<T>;
    fn sub(self, rhs: Self) -> Self::Output {
        Share(self.0 - rhs.0)
    }
}

impl<T: SmcField> Neg for Share<T> {
    type Output = Share<T>;
    fn neg(self) -> Self::Output {
        Share(-self.0)
    }
}

impl<T: SmcField> Mul<T> for Share<T> {
    type Output = Share<T>;
    fn mul(self, rhs: T) -> Self::Output {
        Share(self.0 * rhs)
    }
}

impl<T: SmcField> AddAssign for Share<T> {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl<T: SmcField> SubAssign for Share<T> {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl<T: SmcField> MulAssign<T> for Share<T> {
    fn mul_assign(&mut self, rhs: T) {
        self.0 *= rhs;
    }
}

/// Split a value into `num_shares` additive shares.
///
/// The first `num_shares - 1` shares are drawn uniformly at random and the
/// last one completes the sum, so any strict subset of the result is
/// distributed independently of `value`.
pub fn share_secret<T: SmcField, R: Rng>(
    rng: &mut R,
    value: T,
    num_shares: usize,
) -> Vec<Share<T>> {
    assert!(num_shares >= 1, "cannot split a secret into zero shares");
    let mut shares: Vec<_> = (1..num_shares)
        .map(|_| Share(T::random(&mut *rng)))
        .collect();
    let sum = shares.iter().fold(T::ZERO, |acc, share| acc + share.0);
    shares.push(Share(value - sum));
    shares
}

/// Sum shares back into the value they encode.
///
/// Accepts any number of shares; the caller is responsible for supplying the
/// full set.
pub fn reconstruct<T: SmcField>(shares: impl IntoIterator<Item = Share<T>>) -> T {
    shares
        .into_iter()
        .fold(T::ZERO, |acc, share| acc + share.0)
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use crate::fields::Fp31;

    use super::{reconstruct, share_secret, Share};

    const PRIME: u64 = 1_753_388_297;

    #[test]
    fn sharing_reconstructs() {
        let mut rng = SmallRng::from_seed([1; 32]);
        for num_shares in [1, 2, 5, 16] {
            for value in [0, 1, 1337, PRIME - 1] {
                let shares = share_secret(&mut rng, Fp31::from(value), num_shares);
                assert_eq!(shares.len(), num_shares);
                assert_eq!(reconstruct(shares), Fp31::from(value));
            }
        }
    }

    #[test]
    fn sharing_is_linear() {
        let mut rng = SmallRng::from_seed([2; 32]);
        let x_shares = share_secret(&mut rng, Fp31::from(123), 4);
        let y_shares = share_secret(&mut rng, Fp31::from(456), 4);

        let sums: Vec<_> = x_shares
            .iter()
            .zip(&y_shares)
            .map(|(&x, &y)| x + y)
            .collect();
        assert_eq!(reconstruct(sums), Fp31::from(123 + 456));

        let scaled: Vec<_> = x_shares.iter().map(|&x| x * Fp31::from(7)).collect();
        assert_eq!(reconstruct(scaled), Fp31::from(7 * 123));
    }

    #[test]
    fn prefix_is_independent_of_secret() {
        // With identical randomness, only the completing share may depend on
        // the value being split.
        let shares_of_x = share_secret(&mut SmallRng::from_seed([3; 32]), Fp31::from(10), 5);
        let shares_of_y = share_secret(&mut SmallRng::from_seed([3; 32]), Fp31::from(99), 5);
        assert_eq!(shares_of_x[..4], shares_of_y[..4]);
        assert_ne!(shares_of_x[4], shares_of_y[4]);
    }

    #[test]
    fn share_operators_are_pointwise() {
        let x = Share(Fp31::from(PRIME - 1));
        let y = Share(Fp31::from(2));
        assert_eq!(x + y, Share(Fp31::from(1)));
        assert_eq!(y - x, Share(Fp31::from(3)));
        assert_eq!(-y, Share(Fp31::from(PRIME - 2)));
        assert_eq!(x * Fp31::from(2), Share(Fp31::from(PRIME - 2)));
    }
}
