use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::crypto::{Group, PublicKey};
use crate::error::{TransitionError, ValidationError};
use crate::model::{mongodb::serde_string_map, question::Question};

pub type VotingId = u32;

/// Lifecycle of a voting. Transitions are linear: no cycles, no skipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VotingState {
    NotStarted,
    Started,
    Stopped,
    Tallied,
}

impl From<VotingState> for Bson {
    fn from(state: VotingState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}

/// A lifecycle action requested by an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Tally,
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "tally" => Ok(Self::Tally),
            other => Err(ValidationError::MalformedAction(other.to_string())),
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Tally => "tally",
        };
        write!(f, "{name}")
    }
}

impl Action {
    /// Confirmation returned once the action has been carried out.
    pub fn confirmation(&self) -> &'static str {
        match self {
            Self::Start => "Voting started",
            Self::Stop => "Voting stopped",
            Self::Tally => "Voting tallied",
        }
    }
}

impl VotingState {
    /// The state reached by applying `action`, or why it cannot be applied.
    pub fn apply(self, action: Action) -> Result<VotingState, TransitionError> {
        use Action::*;
        use VotingState::*;

        match (self, action) {
            (NotStarted, Start) => Ok(Started),
            (NotStarted, Stop | Tally) => Err(TransitionError::NotStarted),
            (Started, Stop) => Ok(Stopped),
            (Started, Tally) => Err(TransitionError::NotStopped),
            (Stopped, Tally) => Ok(Tallied),
            (Started | Stopped | Tallied, Start) => Err(TransitionError::AlreadyStarted),
            (Stopped | Tallied, Stop) => Err(TransitionError::AlreadyStopped),
            (Tallied, Tally) => Err(TransitionError::AlreadyTallied),
        }
    }
}

/// A decryption authority taking part in a voting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    pub url: String,
    pub name: String,
    /// This node is the authority.
    #[serde(default)]
    pub me: bool,
}

/// Published result for one option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProc {
    pub number: u32,
    pub option: String,
    pub votes: u64,
}

/// A voting before it has been given an ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVoting {
    pub name: String,
    pub desc: Option<String>,
    pub question: Question,
    pub auths: Vec<Auth>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voting {
    pub id: VotingId,
    pub name: String,
    pub desc: Option<String>,
    pub question: Question,
    pub state: VotingState,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Generated once, before the key ceremony, so a failed ceremony can be
    /// retried against the same parameters.
    pub group: Option<Group>,
    pub pub_key: Option<PublicKey>,
    /// Raw decrypted count per option number.
    #[serde(with = "serde_string_map", default)]
    pub tally: BTreeMap<u32, u64>,
    #[serde(default)]
    pub postproc: Vec<PostProc>,
    pub auths: Vec<Auth>,
}

impl Voting {
    pub fn new(id: VotingId, voting: NewVoting) -> Self {
        Self {
            id,
            name: voting.name,
            desc: voting.desc,
            question: voting.question,
            state: VotingState::NotStarted,
            start_date: None,
            end_date: None,
            group: None,
            pub_key: None,
            tally: BTreeMap::new(),
            postproc: Vec::new(),
            auths: voting.auths,
        }
    }

    pub fn accepts_votes(&self) -> bool {
        self.state == VotingState::Started
    }
}

impl Display for Voting {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}


#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn state_table() {
        use Action::*;
        use TransitionError as E;
        use VotingState::*;

        let expected = [
            (NotStarted, [Ok(Started), Err(E::NotStarted), Err(E::NotStarted)]),
            (Started, [Err(E::AlreadyStarted), Ok(Stopped), Err(E::NotStopped)]),
            (Stopped, [Err(E::AlreadyStarted), Err(E::AlreadyStopped), Ok(Tallied)]),
            (Tallied, [Err(E::AlreadyStarted), Err(E::AlreadyStopped), Err(E::AlreadyTallied)]),
        ];
        for (state, outcomes) in expected {
            for (action, outcome) in [Start, Stop, Tally].into_iter().zip(outcomes) {
                assert_eq!(state.apply(action), outcome, "{state:?} + {action}");
            }
        }
    }

    #[test]
    fn transition_messages() {
        assert_eq!(TransitionError::NotStarted.to_string(), "Voting is not started");
        assert_eq!(TransitionError::AlreadyStarted.to_string(), "Voting already started");
        assert_eq!(TransitionError::NotStopped.to_string(), "Voting is not stopped");
        assert_eq!(TransitionError::AlreadyStopped.to_string(), "Voting already stopped");
        assert_eq!(TransitionError::AlreadyTallied.to_string(), "Voting already tallied");
    }

    #[test]
    fn parse_actions() {
        assert_eq!("start".parse(), Ok(Action::Start));
        assert_eq!("stop".parse(), Ok(Action::Stop));
        assert_eq!("tally".parse(), Ok(Action::Tally));
        assert_eq!(
            "bad".parse::<Action>(),
            Err(ValidationError::MalformedAction("bad".to_string()))
        );
        assert!("Start".parse::<Action>().is_err());
    }

    #[test]
    fn new_voting() {
        let voting = Voting::new(7, NewVoting::example());
        assert_eq!(voting.id, 7);
        assert_eq!(voting.state, VotingState::NotStarted);
        assert_eq!(voting.to_string(), "test voting");
        assert!(voting.start_date.is_none() && voting.end_date.is_none());
        assert!(voting.pub_key.is_none());
        assert!(!voting.accepts_votes());
    }

    #[test]
    fn tally_keys_serialise_as_strings() {
        let mut voting = Voting::new(1, NewVoting::example());
        voting.tally.insert(3, 12);
        let json = serde_json::to_value(&voting).unwrap();
        assert_eq!(json["tally"]["3"], 12);
        let back: Voting = serde_json::from_value(json).unwrap();
        assert_eq!(back, voting);

        let bson = mongodb::bson::to_document(&voting).unwrap();
        let back: Voting = mongodb::bson::from_document(bson).unwrap();
        assert_eq!(back.tally, voting.tally);
    }
}
