//! Request bodies accepted by the API.

use serde::{Deserialize, Serialize};

use crate::model::voting::VotingId;

/// A voting to create. `name` and `question` are required; they are
/// optional here so a missing field becomes a validation error rather than
/// a deserialisation failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingSpec {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub question: Option<String>,
    #[serde(default)]
    pub question_opt: Vec<String>,
    #[serde(default)]
    pub question_ord: Vec<String>,
    /// Defaults to this node as the only authority.
    pub auths: Option<Vec<AuthSpec>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSpec {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSpec {
    pub option: String,
    pub number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub option: String,
    pub number: Option<u32>,
    pub order_number: Option<u32>,
}

/// Body of a lifecycle request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: Option<String>,
}

/// A voter's choice, encrypted server-side under the voting's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub voting: VotingId,
    pub option: u32,
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use super::*;

    impl VotingSpec {
        pub fn example() -> Self {
            Self {
                name: Some("Example".to_string()),
                desc: Some("Description example".to_string()),
                question: Some("I want a ".to_string()),
                question_opt: vec!["cat".to_string(), "dog".to_string(), "horse".to_string()],
                question_ord: Vec::new(),
                auths: None,
            }
        }

        pub fn example_ordering() -> Self {
            Self {
                question_opt: Vec::new(),
                question_ord: vec!["cat".to_string(), "dog".to_string(), "horse".to_string()],
                ..Self::example()
            }
        }

        pub fn with_auths(self, urls: &[&str]) -> Self {
            let auths = urls
                .iter()
                .enumerate()
                .map(|(i, url)| AuthSpec {
                    url: url.to_string(),
                    name: format!("authority {i}"),
                })
                .collect();
            Self {
                auths: Some(auths),
                ..self
            }
        }
    }
}
