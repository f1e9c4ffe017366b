mod prime31 {
    use ff::PrimeField;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::SmcField;

    /// Finite field mod 1753388297, the reference prime of the protocol.
    #[derive(PrimeField)]
    #[PrimeFieldModulus = "1753388297"]
    #[PrimeFieldGenerator = "3"]
    #[PrimeFieldReprEndianness = "little"]
    pub struct Fp31([u64; 1]);

    impl Serialize for Fp31 {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            self.to_repr().0.serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Fp31 {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let repr = Fp31Repr(Deserialize::deserialize(deserializer)?);
            Self::from_repr_vartime(repr)
                .ok_or_else(|| serde::de::Error::custom("Invalid field element"))
        }
    }

    impl SmcField for Fp31 {
        fn truncated(&self) -> u64 {
            // ff::PrimeField stores values in Montgomery form. Multiplying by
            // the element with raw representation [1] strips the constant.
            const R2_INV: Fp31 = Fp31([1]);
            (*self * R2_INV).0[0]
        }
    }

    #[cfg(test)]
    mod tests {
        use ff::Field;

        use crate::SmcField;

        use super::Fp31;

        const PRIME: u64 = 1_753_388_297;

        #[test]
        fn serialization() {
            let value = Fp31::from(1234567890);
            let encoded = bincode::serialize(&value).unwrap();
            let decoded = bincode::deserialize(&encoded).unwrap();
            assert_eq!(value, decoded);
        }

        #[test]
        fn truncation() {
            let int_value = 987654321;
            let field_value = Fp31::from(int_value);
            assert_eq!(field_value.truncated(), int_value);
        }

        #[test]
        fn arithmetic_wraps_at_modulus() {
            let max = Fp31::from(PRIME - 1);
            assert_eq!(max + Fp31::ONE, Fp31::ZERO);
            assert_eq!(-Fp31::ONE, max);
            // (P - 1)^2 = P^2 - 2P + 1 = 1 (mod P), which only holds if the
            // product is widened before reduction.
            assert_eq!(max * max, Fp31::ONE);
        }

        #[test]
        fn values_above_modulus_reduce() {
            assert_eq!(Fp31::from(PRIME), Fp31::ZERO);
            assert_eq!(Fp31::from(PRIME + 42), Fp31::from(42));
        }
    }
}

pub use prime31::{Fp31, Fp31Repr};
