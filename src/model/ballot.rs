use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::Ciphertext;
use crate::model::{actor::VoterId, voting::VotingId};

/// The encrypted choice for one option: `g^1` if chosen, `g^0` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedChoice {
    pub number: u32,
    pub ciphertext: Ciphertext,
}

/// A voter's ballot, holding one ciphertext per option of the question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub voting_id: VotingId,
    pub voter_id: VoterId,
    pub choices: Vec<EncryptedChoice>,
    pub cast_at: DateTime<Utc>,
}

impl Ballot {
    pub fn new(voting_id: VotingId, voter_id: VoterId, choices: Vec<EncryptedChoice>) -> Self {
        Self {
            voting_id,
            voter_id,
            choices,
            cast_at: Utc::now(),
        }
    }

    /// The ciphertext cast for the given option, if any.
    pub fn ciphertext(&self, number: u32) -> Option<&Ciphertext> {
        self.choices
            .iter()
            .find(|choice| choice.number == number)
            .map(|choice| &choice.ciphertext)
    }
}
