use num_bigint_dig::{prime::probably_prime, BigUint, RandBigInt, RandPrime};
use num_traits::{One, Zero};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{decimal, CryptoError};

/// Smallest modulus we are willing to generate or accept.
pub const MIN_KEYBITS: usize = 16;

/// Miller-Rabin rounds used for every primality check.
const PRIMALITY_ROUNDS: usize = 20;

/// A prime-order subgroup of `Z_p*` where `p = 2q + 1` is a safe prime and
/// `g` generates the subgroup of quadratic residues, of order `q`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    #[serde(with = "decimal")]
    pub p: BigUint,
    #[serde(with = "decimal")]
    pub g: BigUint,
}

impl Group {
    /// Generate a fresh group with a `bits`-bit modulus.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        Self::generate_with(&mut rand::thread_rng(), bits)
    }

    pub fn generate_with<R: Rng>(rng: &mut R, bits: usize) -> Result<Self, CryptoError> {
        if bits < MIN_KEYBITS {
            return Err(CryptoError::KeyBitsTooSmall(bits));
        }
        let one = BigUint::one();
        let two = BigUint::from(2u32);

        // `gen_prime` sets the top bit, so `2q + 1` has exactly `bits` bits.
        let p = loop {
            let q = rng.gen_prime(bits - 1);
            let p: BigUint = (&q << 1usize) + &one;
            if p.bits() == bits && probably_prime(&p, PRIMALITY_ROUNDS) {
                break p;
            }
        };

        // Squaring lands in the order-q subgroup; only 1 must be avoided.
        let upper = &p - &one;
        let g = loop {
            let h = rng.gen_biguint_range(&two, &upper);
            let g = h.modpow(&two, &p);
            if !g.is_one() {
                break g;
            }
        };

        Ok(Self { p, g })
    }

    /// The order of the subgroup, `(p - 1) / 2`.
    pub fn q(&self) -> BigUint {
        (&self.p - BigUint::one()) >> 1usize
    }

    /// Check these are well-formed parameters of the expected size.
    pub fn validate(&self, bits: usize) -> Result<(), CryptoError> {
        if self.p.bits() != bits {
            return Err(CryptoError::GroupMismatch(format!(
                "expected a {bits}-bit modulus, got {} bits",
                self.p.bits()
            )));
        }
        if !probably_prime(&self.p, PRIMALITY_ROUNDS) {
            return Err(CryptoError::InvalidGroup("modulus is not prime".to_string()));
        }
        let q = self.q();
        if !probably_prime(&q, PRIMALITY_ROUNDS) {
            return Err(CryptoError::InvalidGroup(
                "modulus is not a safe prime".to_string(),
            ));
        }
        if self.g <= BigUint::one() || self.g >= self.p {
            return Err(CryptoError::InvalidGroup(
                "generator is out of range".to_string(),
            ));
        }
        if !self.g.modpow(&q, &self.p).is_one() {
            return Err(CryptoError::InvalidGroup(
                "generator does not have order q".to_string(),
            ));
        }
        Ok(())
    }

    /// Is `x` a member of the order-q subgroup?
    pub fn contains(&self, x: &BigUint) -> bool {
        !x.is_zero() && x < &self.p && x.modpow(&self.q(), &self.p).is_one()
    }

    /// `g^m mod p`.
    pub fn encode(&self, m: u64) -> BigUint {
        self.g.modpow(&BigUint::from(m), &self.p)
    }

    pub fn mul(&self, x: &BigUint, y: &BigUint) -> BigUint {
        (x * y) % &self.p
    }

    /// Multiplicative inverse modulo the (prime) modulus.
    pub fn inverse(&self, x: &BigUint) -> BigUint {
        let exp = &self.p - BigUint::from(2u32);
        x.modpow(&exp, &self.p)
    }

    /// A uniformly random exponent in `[1, q)`.
    pub fn random_exponent<R: Rng>(&self, rng: &mut R) -> BigUint {
        rng.gen_biguint_range(&BigUint::one(), &self.q())
    }
}
