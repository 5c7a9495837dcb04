//! Decryption authorities and the coordinator driving them.
//!
//! Every voting names a set of authorities. The coordinator collects one
//! public share from each to form the joint key, and later one partial
//! decryption from each to open the tallied ciphertexts. There is no
//! threshold: every authority must answer.

mod coordinator;
mod local;
mod remote;

use std::sync::Arc;

use thiserror::Error;

use crate::crypto::{Ciphertext, Group, PartialDecryption, PublicShare};
use crate::error::Result;
use crate::model::voting::{Auth, VotingId};

pub use coordinator::Coordinator;
pub use local::LocalAuthority;
pub use remote::{HttpDirectory, RemoteAuthority};

#[cfg(test)]
pub(crate) use coordinator::examples;

/// Transport-level failures talking to an authority. All of them leave the
/// voting untouched and can be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    #[error("Authority {url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },
    #[error("Authority {0} timed out")]
    Timeout(String),
    #[error("Authority {url} answered with status {status}")]
    Rejected { url: String, status: u16 },
    #[error("Authority {url} sent a malformed response: {reason}")]
    Malformed { url: String, reason: String },
    #[error("Authority {url} holds no key share for voting {voting}")]
    NoKeyShare { url: String, voting: VotingId },
}

/// One decryption authority, wherever it lives.
#[rocket::async_trait]
pub trait Authority: Send + Sync {
    fn url(&self) -> &str;

    /// This authority's public share for the voting, creating its private
    /// share on first request.
    async fn public_share(&self, voting: VotingId, group: &Group) -> Result<PublicShare>;

    /// One partial decryption per ciphertext, in order.
    async fn partial_decrypt(
        &self,
        voting: VotingId,
        ciphertexts: &[Ciphertext],
    ) -> Result<Vec<PartialDecryption>>;
}

/// Resolves the registered authorities of a voting to something callable.
pub trait AuthorityDirectory: Send + Sync {
    fn resolve(&self, auth: &Auth) -> Arc<dyn Authority>;
}
