//! Storage collaborators of the tally engine.
//!
//! The engine only relies on these traits. Two backends are provided: MongoDB
//! for deployments and an in-memory one for tests and throwaway nodes.

mod memory;
mod mongo;

use std::sync::Arc;

use mongodb::{error::Error as DbError, Database};

use crate::crypto::{Ciphertext, KeyShare};
use crate::error::Result;
use crate::model::{
    actor::VoterId,
    ballot::Ballot,
    census::CensusEntry,
    voting::{NewVoting, Voting, VotingId, VotingState},
};

pub use self::memory::{MemoryBallotStore, MemoryCensus, MemoryKeyShareStore, MemoryVotingStore};
pub use self::mongo::{MongoBallotStore, MongoCensus, MongoKeyShareStore, MongoVotingStore};

#[rocket::async_trait]
pub trait VotingStore: Send + Sync {
    /// Insert a new voting under the next free ID.
    async fn insert(&self, voting: NewVoting) -> Result<Voting>;

    async fn get(&self, id: VotingId) -> Result<Option<Voting>>;

    /// Replace the stored voting only if its state is still `expected`.
    /// Returns whether the write happened.
    async fn replace_if_state(&self, voting: &Voting, expected: VotingState) -> Result<bool>;
}

#[rocket::async_trait]
pub trait BallotStore: Send + Sync {
    /// Store a ballot. A later ballot from the same voter replaces the earlier one.
    async fn append(&self, ballot: Ballot) -> Result<()>;

    /// Every ciphertext cast for the given option.
    async fn list_ciphertexts(&self, voting: VotingId, option: u32) -> Result<Vec<Ciphertext>>;

    /// Number of ballots cast in the voting.
    async fn count(&self, voting: VotingId) -> Result<u64>;
}

/// Eligibility oracle. Populated by whoever manages the census.
#[rocket::async_trait]
pub trait Census: Send + Sync {
    async fn is_eligible(&self, voting: VotingId, voter: VoterId) -> Result<bool>;

    async fn add(&self, entry: CensusEntry) -> Result<()>;
}

/// Private key shares held by the local authority, one per voting.
#[rocket::async_trait]
pub trait KeyShareStore: Send + Sync {
    async fn get(&self, voting: VotingId) -> Result<Option<KeyShare>>;

    /// Store `share` unless the voting already has one. Returns whichever
    /// share ends up stored.
    async fn insert_if_absent(&self, voting: VotingId, share: KeyShare) -> Result<KeyShare>;
}

/// Every store the engine needs, as managed state.
#[derive(Clone)]
pub struct Stores {
    pub votings: Arc<dyn VotingStore>,
    pub ballots: Arc<dyn BallotStore>,
    pub census: Arc<dyn Census>,
    pub key_shares: Arc<dyn KeyShareStore>,
}

impl Stores {
    pub fn memory() -> Self {
        Self {
            votings: Arc::new(MemoryVotingStore::default()),
            ballots: Arc::new(MemoryBallotStore::default()),
            census: Arc::new(MemoryCensus::default()),
            key_shares: Arc::new(MemoryKeyShareStore::default()),
        }
    }

    /// Stores backed by the given database, creating indexes and counters as needed.
    pub async fn mongodb(db: &Database) -> Result<Self, DbError> {
        mongo::prepare(db).await?;
        Ok(Self {
            votings: Arc::new(MongoVotingStore::new(db)),
            ballots: Arc::new(MongoBallotStore::new(db)),
            census: Arc::new(MongoCensus::new(db)),
            key_shares: Arc::new(MongoKeyShareStore::new(db)),
        })
    }
}
