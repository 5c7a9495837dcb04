use std::sync::Arc;

use chrono::Duration;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};

use crate::config::Config;
use crate::crypto::{Ciphertext, CryptoError, Group, PartialDecryption, PublicShare};
use crate::error::{Error, Result};
use crate::model::{
    actor::Actor,
    voting::{Auth, VotingId},
};

use super::{Authority, AuthorityDirectory, AuthorityError, LocalAuthority};

/// How long the coordinator token sent with each request stays valid.
const TOKEN_TTL_MINUTES: i64 = 5;

/// An authority run by another node, reached over its `/mixnet` endpoints.
/// Requests carry a coordinator token signed with the shared secret.
pub struct RemoteAuthority {
    client: reqwest::Client,
    url: String,
    config: Arc<Config>,
}

impl RemoteAuthority {
    pub fn new(client: reqwest::Client, url: impl Into<String>, config: Arc<Config>) -> Self {
        Self {
            client,
            url: url.into(),
            config,
        }
    }

    fn endpoint(&self, voting: VotingId, operation: &str) -> String {
        format!(
            "{}/mixnet/{voting}/{operation}",
            self.url.trim_end_matches('/')
        )
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            AuthorityError::Timeout(self.url.clone()).into()
        } else {
            AuthorityError::Unreachable {
                url: self.url.clone(),
                reason: e.to_string(),
            }
            .into()
        }
    }

    /// POST `body` as JSON. A 422 is the authority refusing on cryptographic
    /// grounds; any other failure is a transport problem.
    async fn post<B, T>(&self, endpoint: String, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let token = Actor::authority()
            .into_token(&self.config, Duration::minutes(TOKEN_TTL_MINUTES))?;
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let message = response
                .json::<String>()
                .await
                .unwrap_or_else(|_| "no reason given".to_string());
            return Err(CryptoError::Authority {
                url: self.url.clone(),
                message,
            }
            .into());
        }
        if !status.is_success() {
            return Err(AuthorityError::Rejected {
                url: self.url.clone(),
                status: status.as_u16(),
            }
            .into());
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                Error::from(AuthorityError::Timeout(self.url.clone()))
            } else {
                Error::from(AuthorityError::Malformed {
                    url: self.url.clone(),
                    reason: e.to_string(),
                })
            }
        })
    }
}

#[rocket::async_trait]
impl Authority for RemoteAuthority {
    fn url(&self) -> &str {
        &self.url
    }

    async fn public_share(&self, voting: VotingId, group: &Group) -> Result<PublicShare> {
        self.post(self.endpoint(voting, "key"), group).await
    }

    async fn partial_decrypt(
        &self,
        voting: VotingId,
        ciphertexts: &[Ciphertext],
    ) -> Result<Vec<PartialDecryption>> {
        self.post(self.endpoint(voting, "decrypt"), ciphertexts)
            .await
    }
}

/// Resolves `me` to the local authority and everything else to HTTP.
pub struct HttpDirectory {
    local: Arc<LocalAuthority>,
    client: reqwest::Client,
    config: Arc<Config>,
}

impl HttpDirectory {
    pub fn new(local: Arc<LocalAuthority>, config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.authority_timeout())
            .build()?;
        Ok(Self {
            local,
            client,
            config: Arc::new(config.clone()),
        })
    }
}

impl AuthorityDirectory for HttpDirectory {
    fn resolve(&self, auth: &Auth) -> Arc<dyn Authority> {
        if auth.me || auth.url == self.local.url() {
            self.local.clone()
        } else {
            Arc::new(RemoteAuthority::new(
                self.client.clone(),
                auth.url.clone(),
                self.config.clone(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::group::examples::TEST_KEYBITS;
    use crate::store::MemoryKeyShareStore;

    fn directory() -> HttpDirectory {
        let local = Arc::new(LocalAuthority::new(
            "http://localhost:8000",
            TEST_KEYBITS,
            Arc::new(MemoryKeyShareStore::default()),
        ));
        HttpDirectory::new(local, &Config::example()).unwrap()
    }

    #[test]
    fn resolves_local_and_remote() {
        let directory = directory();
        let me = Auth {
            url: "http://localhost:8000".to_string(),
            name: "me".to_string(),
            me: false,
        };
        let other = Auth {
            url: "http://authority.example:8000/".to_string(),
            name: "other".to_string(),
            me: false,
        };
        assert_eq!(directory.resolve(&me).url(), "http://localhost:8000");
        assert_eq!(directory.resolve(&other).url(), other.url);

        let remote = RemoteAuthority::new(
            reqwest::Client::new(),
            other.url,
            Arc::new(Config::example()),
        );
        assert_eq!(
            remote.endpoint(4, "key"),
            "http://authority.example:8000/mixnet/4/key"
        );
    }

    #[rocket::async_test]
    async fn unreachable_authority_is_a_transport_failure() {
        // Nothing listens on port 1.
        let remote = RemoteAuthority::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1",
            Arc::new(Config::example()),
        );
        let err = remote
            .public_share(1, &Group::example())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Authority(AuthorityError::Unreachable { .. })
        ));
    }
}
