//! Exponential ElGamal over safe-prime groups.
//!
//! Plaintexts are encoded as `g^m`, which turns the multiplicative
//! homomorphism of ElGamal into an additive one on `m`. Decryption is split
//! into per-authority partial decryptions so that no single party holding
//! one key share can open a ciphertext.

pub mod decimal;
mod elgamal;
pub mod group;

use thiserror::Error;

pub use elgamal::{
    combine_partials, decode_count, Ciphertext, KeyShare, PartialDecryption, PublicKey,
    PublicShare,
};
pub use group::Group;

/// Violations of the cryptographic invariants. None of these can be fixed by
/// retrying; they indicate misconfiguration or corrupted data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Key size of {0} bits is too small")]
    KeyBitsTooSmall(usize),
    #[error("Invalid group: {0}")]
    InvalidGroup(String),
    #[error("Mismatched group parameters: {0}")]
    GroupMismatch(String),
    #[error("Plaintext {0} does not fit in the group")]
    PlaintextTooLarge(u64),
    #[error("Ciphertext components are not group elements")]
    InvalidCiphertext,
    #[error("Decrypted count is not within the {0} ballots cast")]
    CountOutOfRange(u64),
    #[error("Voting {0} has no public key")]
    NoPublicKey(u32),
    #[error("Authority {url} refused: {message}")]
    Authority { url: String, message: String },
}
