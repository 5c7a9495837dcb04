use mongodb::{
    bson::doc, error::Error as DbError, options::ReplaceOptions, Database,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::crypto::{Ciphertext, KeyShare};
use crate::error::{Error, Result};
use crate::model::{
    actor::VoterId,
    ballot::Ballot,
    census::CensusEntry,
    mongodb::{
        ensure_indexes_exist, ensure_voting_id_counter_exists, errors::is_duplicate_key_error,
        Coll, Counter, MongoCollection, VOTING_ID_COUNTER_ID,
    },
    voting::{NewVoting, Voting, VotingId, VotingState},
};

use super::{BallotStore, Census, KeyShareStore, VotingStore};

/// Create indexes and counters. Idempotent.
pub(super) async fn prepare(db: &Database) -> Result<(), DbError> {
    ensure_indexes_exist(db).await?;
    ensure_voting_id_counter_exists(&Coll::from_db(db)).await
}

pub struct MongoVotingStore {
    votings: Coll<Voting>,
    counters: Coll<Counter>,
}

impl MongoVotingStore {
    pub fn new(db: &Database) -> Self {
        Self {
            votings: Coll::from_db(db),
            counters: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl VotingStore for MongoVotingStore {
    async fn insert(&self, voting: NewVoting) -> Result<Voting> {
        let id = Counter::next(&self.counters, VOTING_ID_COUNTER_ID).await?;
        let voting = Voting::new(id, voting);
        self.votings.insert_one(&voting, None).await?;
        Ok(voting)
    }

    async fn get(&self, id: VotingId) -> Result<Option<Voting>> {
        Ok(self.votings.find_one(doc! { "id": id }, None).await?)
    }

    async fn replace_if_state(&self, voting: &Voting, expected: VotingState) -> Result<bool> {
        let filter = doc! {
            "id": voting.id,
            "state": expected,
        };
        let result = self.votings.replace_one(filter, voting, None).await?;
        Ok(result.matched_count == 1)
    }
}

pub struct MongoBallotStore {
    ballots: Coll<Ballot>,
}

impl MongoBallotStore {
    pub fn new(db: &Database) -> Self {
        Self {
            ballots: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl BallotStore for MongoBallotStore {
    async fn append(&self, ballot: Ballot) -> Result<()> {
        let filter = doc! {
            "voting_id": ballot.voting_id,
            "voter_id": ballot.voter_id,
        };
        let upsert = ReplaceOptions::builder().upsert(true).build();
        self.ballots.replace_one(filter, &ballot, upsert).await?;
        Ok(())
    }

    async fn list_ciphertexts(&self, voting: VotingId, option: u32) -> Result<Vec<Ciphertext>> {
        let ballots: Vec<Ballot> = self
            .ballots
            .find(doc! { "voting_id": voting }, None)
            .await?
            .try_collect()
            .await?;
        Ok(ballots
            .iter()
            .filter_map(|ballot| ballot.ciphertext(option).cloned())
            .collect())
    }

    async fn count(&self, voting: VotingId) -> Result<u64> {
        Ok(self
            .ballots
            .count_documents(doc! { "voting_id": voting }, None)
            .await?)
    }
}

pub struct MongoCensus {
    census: Coll<CensusEntry>,
}

impl MongoCensus {
    pub fn new(db: &Database) -> Self {
        Self {
            census: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl Census for MongoCensus {
    async fn is_eligible(&self, voting: VotingId, voter: VoterId) -> Result<bool> {
        let filter = doc! {
            "voting_id": voting,
            "voter_id": voter,
        };
        Ok(self.census.find_one(filter, None).await?.is_some())
    }

    async fn add(&self, entry: CensusEntry) -> Result<()> {
        let result = self.census.insert_one(entry, None).await;
        if is_duplicate_key_error(result.as_ref()) {
            return Ok(());
        }
        result?;
        Ok(())
    }
}

/// A key share as stored, keyed by its voting.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredKeyShare {
    #[serde(rename = "_id")]
    voting_id: VotingId,
    share: KeyShare,
}

impl MongoCollection for StoredKeyShare {
    const NAME: &'static str = "key_shares";
}

pub struct MongoKeyShareStore {
    shares: Coll<StoredKeyShare>,
}

impl MongoKeyShareStore {
    pub fn new(db: &Database) -> Self {
        Self {
            shares: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl KeyShareStore for MongoKeyShareStore {
    async fn get(&self, voting: VotingId) -> Result<Option<KeyShare>> {
        let stored = self.shares.find_one(doc! { "_id": voting }, None).await?;
        Ok(stored.map(|stored| stored.share))
    }

    async fn insert_if_absent(&self, voting: VotingId, share: KeyShare) -> Result<KeyShare> {
        let stored = StoredKeyShare {
            voting_id: voting,
            share,
        };
        let result = self.shares.insert_one(&stored, None).await;
        if is_duplicate_key_error(result.as_ref()) {
            // Lost a race with a concurrent request; the first share wins.
            return self
                .get(voting)
                .await?
                .ok_or_else(|| Error::not_found(format!("Key share for voting {voting}")));
        }
        result?;
        Ok(stored.share)
    }
}
