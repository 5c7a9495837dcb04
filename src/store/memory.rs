use std::collections::{BTreeMap, HashMap, HashSet};

use rocket::tokio::sync::RwLock;

use crate::crypto::{Ciphertext, KeyShare};
use crate::error::Result;
use crate::model::{
    actor::VoterId,
    ballot::Ballot,
    census::CensusEntry,
    voting::{NewVoting, Voting, VotingId, VotingState},
};

use super::{BallotStore, Census, KeyShareStore, VotingStore};

#[derive(Default)]
pub struct MemoryVotingStore {
    votings: RwLock<BTreeMap<VotingId, Voting>>,
}

#[rocket::async_trait]
impl VotingStore for MemoryVotingStore {
    async fn insert(&self, voting: NewVoting) -> Result<Voting> {
        let mut votings = self.votings.write().await;
        let id = votings.keys().next_back().map_or(1, |last| last + 1);
        let voting = Voting::new(id, voting);
        votings.insert(id, voting.clone());
        Ok(voting)
    }

    async fn get(&self, id: VotingId) -> Result<Option<Voting>> {
        Ok(self.votings.read().await.get(&id).cloned())
    }

    async fn replace_if_state(&self, voting: &Voting, expected: VotingState) -> Result<bool> {
        let mut votings = self.votings.write().await;
        match votings.get_mut(&voting.id) {
            Some(stored) if stored.state == expected => {
                *stored = voting.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryBallotStore {
    ballots: RwLock<HashMap<(VotingId, VoterId), Ballot>>,
}

#[rocket::async_trait]
impl BallotStore for MemoryBallotStore {
    async fn append(&self, ballot: Ballot) -> Result<()> {
        self.ballots
            .write()
            .await
            .insert((ballot.voting_id, ballot.voter_id), ballot);
        Ok(())
    }

    async fn list_ciphertexts(&self, voting: VotingId, option: u32) -> Result<Vec<Ciphertext>> {
        let ballots = self.ballots.read().await;
        Ok(ballots
            .values()
            .filter(|ballot| ballot.voting_id == voting)
            .filter_map(|ballot| ballot.ciphertext(option).cloned())
            .collect())
    }

    async fn count(&self, voting: VotingId) -> Result<u64> {
        let ballots = self.ballots.read().await;
        Ok(ballots.keys().filter(|(v, _)| *v == voting).count() as u64)
    }
}

#[derive(Default)]
pub struct MemoryCensus {
    entries: RwLock<HashSet<CensusEntry>>,
}

#[rocket::async_trait]
impl Census for MemoryCensus {
    async fn is_eligible(&self, voting: VotingId, voter: VoterId) -> Result<bool> {
        let entry = CensusEntry {
            voting_id: voting,
            voter_id: voter,
        };
        Ok(self.entries.read().await.contains(&entry))
    }

    async fn add(&self, entry: CensusEntry) -> Result<()> {
        self.entries.write().await.insert(entry);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKeyShareStore {
    shares: RwLock<HashMap<VotingId, KeyShare>>,
}

#[rocket::async_trait]
impl KeyShareStore for MemoryKeyShareStore {
    async fn get(&self, voting: VotingId) -> Result<Option<KeyShare>> {
        Ok(self.shares.read().await.get(&voting).cloned())
    }

    async fn insert_if_absent(&self, voting: VotingId, share: KeyShare) -> Result<KeyShare> {
        let mut shares = self.shares.write().await;
        Ok(shares.entry(voting).or_insert(share).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Group, PublicKey};
    use crate::model::ballot::EncryptedChoice;

    #[rocket::async_test]
    async fn voting_ids_increase() {
        let store = MemoryVotingStore::default();
        let first = store.insert(NewVoting::example()).await.unwrap();
        let second = store.insert(NewVoting::example()).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.get(2).await.unwrap(), Some(second));
        assert_eq!(store.get(3).await.unwrap(), None);
    }

    #[rocket::async_test]
    async fn replace_checks_state() {
        let store = MemoryVotingStore::default();
        let mut voting = store.insert(NewVoting::example()).await.unwrap();
        voting.state = VotingState::Started;
        assert!(!store
            .replace_if_state(&voting, VotingState::Stopped)
            .await
            .unwrap());
        assert!(store
            .replace_if_state(&voting, VotingState::NotStarted)
            .await
            .unwrap());
        let stored = store.get(voting.id).await.unwrap().unwrap();
        assert_eq!(stored.state, VotingState::Started);
    }

    #[rocket::async_test]
    async fn revoting_replaces_ballot() {
        let share = KeyShare::generate(Group::example());
        let key = PublicKey::from_shares(share.group.clone(), &[share.public_share()]);
        let ballot = |voter, m| {
            Ballot::new(
                1,
                voter,
                vec![EncryptedChoice {
                    number: 1,
                    ciphertext: key.encrypt(m).unwrap(),
                }],
            )
        };

        let store = MemoryBallotStore::default();
        store.append(ballot(10, 1)).await.unwrap();
        store.append(ballot(11, 1)).await.unwrap();
        store.append(ballot(10, 0)).await.unwrap();
        assert_eq!(store.count(1).await.unwrap(), 2);
        assert_eq!(store.count(2).await.unwrap(), 0);
        assert_eq!(store.list_ciphertexts(1, 1).await.unwrap().len(), 2);
        assert!(store.list_ciphertexts(1, 2).await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn first_key_share_wins() {
        let store = MemoryKeyShareStore::default();
        let first = KeyShare::generate(Group::example());
        let second = KeyShare::generate(Group::example());
        assert_eq!(store.insert_if_absent(4, first.clone()).await.unwrap(), first);
        assert_eq!(store.insert_if_absent(4, second).await.unwrap(), first);
        assert_eq!(store.get(4).await.unwrap(), Some(first));
    }

    #[rocket::async_test]
    async fn census() {
        let census = MemoryCensus::default();
        census
            .add(CensusEntry {
                voting_id: 1,
                voter_id: 5,
            })
            .await
            .unwrap();
        assert!(census.is_eligible(1, 5).await.unwrap());
        assert!(!census.is_eligible(2, 5).await.unwrap());
        assert!(!census.is_eligible(1, 6).await.unwrap());
    }
}
