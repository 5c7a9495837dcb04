use std::fmt::Display;

use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::warn;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::config::Config;
use crate::error::{Error, Result};

pub type VoterId = u32;

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
    /// Another node's coordinator calling this node's authority.
    Authority = 2,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
                Self::Authority => "authority",
            }
        )
    }
}

/// Whoever is calling into the core, as vouched for by the login service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "uid")]
    pub id: VoterId,
    #[serde(rename = "rgt")]
    pub rights: Rights,
}

impl Actor {
    pub fn voter(id: VoterId) -> Self {
        Self {
            id,
            rights: Rights::Voter,
        }
    }

    pub fn admin(id: VoterId) -> Self {
        Self {
            id,
            rights: Rights::Admin,
        }
    }

    /// The coordinator of a node, as presented to other nodes' authorities.
    pub fn authority() -> Self {
        Self {
            id: 0,
            rights: Rights::Authority,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.rights == Rights::Admin
    }

    /// Fail with `Forbidden` unless this actor is an administrator.
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "User {} is not an administrator",
                self.id
            )))
        }
    }

    /// Fail with `Forbidden` unless this actor is a coordinator of the
    /// deployment. Nodes share the token secret.
    pub fn require_authority(&self) -> Result<()> {
        if self.rights == Rights::Authority {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "User {} ({}) may not act as a coordinator",
                self.id, self.rights
            )))
        }
    }

    /// Sign a bearer token for this actor. Tokens are normally issued by the
    /// login service; this is for tooling and tests.
    pub fn into_token(self, config: &Config, ttl: Duration) -> Result<String> {
        let claims = Claims {
            actor: self,
            expire_at: Utc::now() + ttl,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;
        Ok(token)
    }

    pub fn from_token(token: &str, config: &Config) -> Result<Self> {
        let actor = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.actor)?;
        Ok(actor)
    }
}

/// Token claims: the actor plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    actor: Actor,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Actor {
    type Error = Error;

    /// Read the actor from an `Authorization: Bearer <token>` header.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::Unauthorized("Token verification is not configured".to_string()),
                ))
            }
        };

        let token = match req
            .headers()
            .get_one("Authorization")
            .and_then(|header| header.strip_prefix("Bearer "))
        {
            Some(token) => token,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Missing bearer token".to_string()),
                ))
            }
        };

        match Self::from_token(token, config) {
            Ok(actor) => Outcome::Success(actor),
            Err(e) => {
                warn!("Rejected bearer token: {e}");
                Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Invalid bearer token".to_string()),
                ))
            }
        }
    }
}
