use serde::{Deserialize, Serialize};

use crate::model::{actor::VoterId, voting::VotingId};

/// A voter allowed to take part in a voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CensusEntry {
    pub voting_id: VotingId,
    pub voter_id: VoterId,
}
