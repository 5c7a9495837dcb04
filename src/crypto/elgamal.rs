use num_bigint_dig::BigUint;
use num_traits::One;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{decimal, CryptoError, Group};

/// One authority's private key share, `x`, in `[1, q)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShare {
    pub group: Group,
    #[serde(with = "decimal")]
    x: BigUint,
}

/// The public half of a [`KeyShare`], `y_i = g^x_i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicShare {
    #[serde(with = "decimal")]
    pub y: BigUint,
}

/// The joint public key of every authority of a voting, `y = Π y_i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub group: Group,
    #[serde(with = "decimal")]
    pub y: BigUint,
}

/// An ElGamal ciphertext `(a, b) = (g^r, y^r * g^m)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ciphertext {
    #[serde(with = "decimal")]
    pub a: BigUint,
    #[serde(with = "decimal")]
    pub b: BigUint,
}

/// One authority's contribution to opening a ciphertext, `a^x_i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartialDecryption(#[serde(with = "decimal")] pub BigUint);

impl KeyShare {
    pub fn generate(group: Group) -> Self {
        let x = group.random_exponent(&mut rand::thread_rng());
        Self { group, x }
    }

    pub fn public_share(&self) -> PublicShare {
        PublicShare {
            y: self.group.g.modpow(&self.x, &self.group.p),
        }
    }

    pub fn partial_decrypt(&self, ciphertext: &Ciphertext) -> Result<PartialDecryption, CryptoError> {
        if !ciphertext.is_valid(&self.group) {
            return Err(CryptoError::InvalidCiphertext);
        }
        Ok(PartialDecryption(
            ciphertext.a.modpow(&self.x, &self.group.p),
        ))
    }

    /// Decrypt to `g^m` when this share is the whole key.
    pub fn decrypt(&self, ciphertext: &Ciphertext) -> Result<BigUint, CryptoError> {
        let partial = self.partial_decrypt(ciphertext)?;
        Ok(combine_partials(&self.group, &[partial], ciphertext))
    }
}

impl PublicKey {
    /// Combine the public shares of every authority into the joint key.
    pub fn from_shares(group: Group, shares: &[PublicShare]) -> Self {
        let y = shares
            .iter()
            .fold(BigUint::one(), |acc, share| group.mul(&acc, &share.y));
        Self { group, y }
    }

    /// Encrypt `g^m` with a fresh ephemeral exponent.
    pub fn encrypt(&self, m: u64) -> Result<Ciphertext, CryptoError> {
        self.encrypt_with(&mut rand::thread_rng(), m)
    }

    pub fn encrypt_with<R: Rng>(&self, rng: &mut R, m: u64) -> Result<Ciphertext, CryptoError> {
        if BigUint::from(m) >= self.group.q() {
            return Err(CryptoError::PlaintextTooLarge(m));
        }
        let group = &self.group;
        let r = group.random_exponent(rng);
        let a = group.g.modpow(&r, &group.p);
        let b = group.mul(&self.y.modpow(&r, &group.p), &group.encode(m));
        Ok(Ciphertext { a, b })
    }
}

impl Ciphertext {
    /// The encryption of `g^0` with `r = 0`, neutral for [`Ciphertext::combine`].
    pub fn identity() -> Self {
        Self {
            a: BigUint::one(),
            b: BigUint::one(),
        }
    }

    /// Component-wise product. Decrypts to the sum of the encoded plaintexts.
    pub fn combine(&self, other: &Ciphertext, group: &Group) -> Ciphertext {
        Ciphertext {
            a: group.mul(&self.a, &other.a),
            b: group.mul(&self.b, &other.b),
        }
    }

    /// Are both components elements of the group?
    pub fn is_valid(&self, group: &Group) -> bool {
        group.contains(&self.a) && group.contains(&self.b)
    }
}

/// Recover `g^m` from the partial decryptions of every authority:
/// `g^m = b * (Π a^x_i)^-1`.
pub fn combine_partials(
    group: &Group,
    partials: &[PartialDecryption],
    ciphertext: &Ciphertext,
) -> BigUint {
    let s = partials
        .iter()
        .fold(BigUint::one(), |acc, partial| group.mul(&acc, &partial.0));
    group.mul(&ciphertext.b, &group.inverse(&s))
}

/// Find `m` in `[0, bound]` such that `g^m` equals `encoded`.
pub fn decode_count(group: &Group, encoded: &BigUint, bound: u64) -> Result<u64, CryptoError> {
    let mut acc = BigUint::one();
    for m in 0..=bound {
        if &acc == encoded {
            return Ok(m);
        }
        acc = group.mul(&acc, &group.g);
    }
    Err(CryptoError::CountOutOfRange(bound))
}
