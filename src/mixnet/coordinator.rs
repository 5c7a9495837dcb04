use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use num_bigint_dig::BigUint;
use rocket::futures::future::try_join_all;
use rocket::tokio::time::timeout;

use crate::crypto::{
    combine_partials, Ciphertext, Group, PartialDecryption, PublicKey, PublicShare,
};
use crate::error::{Error, Result, ValidationError};
use crate::model::voting::{Auth, VotingId};

use super::{AuthorityDirectory, AuthorityError};

/// Drives the authorities of a voting through the key ceremony and the
/// joint decryption. Holds no per-voting state between calls.
pub struct Coordinator {
    directory: Arc<dyn AuthorityDirectory>,
    timeout: Duration,
}

impl Coordinator {
    pub fn new(directory: Arc<dyn AuthorityDirectory>, timeout: Duration) -> Self {
        Self { directory, timeout }
    }

    /// Collect a public share from every authority and combine them into the
    /// joint public key.
    pub async fn key_ceremony(
        &self,
        voting: VotingId,
        group: &Group,
        auths: &[Auth],
    ) -> Result<PublicKey> {
        if auths.is_empty() {
            return Err(ValidationError::NoAuthorities.into());
        }
        info!(
            "Key ceremony for voting {voting} with {} authorities",
            auths.len()
        );
        let requests = auths
            .iter()
            .map(|auth| self.request_share(voting, group, auth));
        let shares = try_join_all(requests).await.map_err(|e| {
            warn!("Key ceremony for voting {voting} failed: {e}");
            e
        })?;
        info!("Key ceremony for voting {voting} complete");
        Ok(PublicKey::from_shares(group.clone(), &shares))
    }

    /// Open each ciphertext with the partial decryptions of every authority,
    /// returning the encoded plaintexts `g^m` in order.
    pub async fn decrypt(
        &self,
        voting: VotingId,
        group: &Group,
        auths: &[Auth],
        ciphertexts: &[Ciphertext],
    ) -> Result<Vec<BigUint>> {
        if auths.is_empty() {
            return Err(ValidationError::NoAuthorities.into());
        }
        debug!(
            "Requesting {} partial decryptions from {} authorities for voting {voting}",
            ciphertexts.len(),
            auths.len()
        );
        let requests = auths
            .iter()
            .map(|auth| self.request_partials(voting, group, auth, ciphertexts));
        let per_authority = try_join_all(requests).await.map_err(|e| {
            warn!("Joint decryption for voting {voting} failed: {e}");
            e
        })?;

        let plaintexts = ciphertexts
            .iter()
            .enumerate()
            .map(|(i, ciphertext)| {
                let partials = per_authority
                    .iter()
                    .map(|partials| partials[i].clone())
                    .collect::<Vec<_>>();
                combine_partials(group, &partials, ciphertext)
            })
            .collect();
        Ok(plaintexts)
    }

    async fn request_share(&self, voting: VotingId, group: &Group, auth: &Auth) -> Result<PublicShare> {
        let authority = self.directory.resolve(auth);
        let share = self
            .bounded(authority.url(), authority.public_share(voting, group))
            .await?;
        if !group.contains(&share.y) {
            return Err(AuthorityError::Malformed {
                url: auth.url.clone(),
                reason: "public share is not a group element".to_string(),
            }
            .into());
        }
        Ok(share)
    }

    async fn request_partials(
        &self,
        voting: VotingId,
        group: &Group,
        auth: &Auth,
        ciphertexts: &[Ciphertext],
    ) -> Result<Vec<PartialDecryption>> {
        let authority = self.directory.resolve(auth);
        let partials = self
            .bounded(authority.url(), authority.partial_decrypt(voting, ciphertexts))
            .await?;
        if partials.len() != ciphertexts.len() {
            return Err(AuthorityError::Malformed {
                url: auth.url.clone(),
                reason: format!(
                    "expected {} partial decryptions, got {}",
                    ciphertexts.len(),
                    partials.len()
                ),
            }
            .into());
        }
        if partials.iter().any(|partial| !group.contains(&partial.0)) {
            return Err(AuthorityError::Malformed {
                url: auth.url.clone(),
                reason: "partial decryption is not a group element".to_string(),
            }
            .into());
        }
        Ok(partials)
    }

    /// Run an authority call, failing it once the timeout elapses.
    async fn bounded<T>(&self, url: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        match timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::from(AuthorityError::Timeout(url.to_string()))),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::examples::*;
    use super::*;
    use crate::crypto::{decode_count, group::examples::TEST_KEYBITS, CryptoError};

    const URLS: [&str; 3] = [
        "http://localhost:8000",
        "http://authority-a:8000",
        "http://authority-b:8000",
    ];

    fn setup() -> (Arc<FakeDirectory>, Coordinator) {
        let directory = Arc::new(FakeDirectory::new(&URLS, TEST_KEYBITS));
        let coordinator = Coordinator::new(directory.clone(), Duration::from_millis(200));
        (directory, coordinator)
    }

    #[rocket::async_test]
    async fn joint_key_and_decryption() {
        let (_, coordinator) = setup();
        let group = Group::example();
        let auths = auths(&URLS);
        let key = coordinator.key_ceremony(1, &group, &auths).await.unwrap();

        let ciphertexts = vec![
            (0..4)
                .map(|_| key.encrypt(1).unwrap())
                .fold(Ciphertext::identity(), |acc, c| acc.combine(&c, &group)),
            key.encrypt(0).unwrap(),
            Ciphertext::identity(),
        ];
        let plaintexts = coordinator
            .decrypt(1, &group, &auths, &ciphertexts)
            .await
            .unwrap();
        let counts = plaintexts
            .iter()
            .map(|encoded| decode_count(&group, encoded, 4).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(counts, vec![4, 0, 0]);
    }

    #[rocket::async_test]
    async fn missing_share_is_an_authority_failure() {
        let (_, coordinator) = setup();
        let group = Group::example();
        let auths = auths(&URLS);
        coordinator.key_ceremony(1, &group, &auths).await.unwrap();

        // No ceremony ran for voting 2.
        let err = coordinator
            .decrypt(2, &group, &auths, &[Ciphertext::identity()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Authority(AuthorityError::NoKeyShare { voting: 2, .. })
        ));
        assert_eq!(err.status(), rocket::http::Status::BadGateway);
    }

    #[rocket::async_test]
    async fn ceremony_needs_every_authority() {
        let (directory, coordinator) = setup();
        let group = Group::example();
        let auths = auths(&URLS);
        let flaky = directory.get(URLS[2]);

        flaky.set(Behaviour::Down);
        let err = coordinator.key_ceremony(1, &group, &auths).await.unwrap_err();
        assert!(matches!(err, Error::Authority(AuthorityError::Unreachable { .. })));

        flaky.set(Behaviour::Hanging);
        let err = coordinator.key_ceremony(1, &group, &auths).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            AuthorityError::Timeout(URLS[2].to_string()).to_string()
        );

        flaky.set(Behaviour::Garbage);
        let err = coordinator.key_ceremony(1, &group, &auths).await.unwrap_err();
        assert!(matches!(err, Error::Authority(AuthorityError::Malformed { .. })));

        flaky.set(Behaviour::Refusing);
        let err = coordinator.key_ceremony(1, &group, &auths).await.unwrap_err();
        assert!(matches!(err, Error::Crypto(CryptoError::Authority { .. })));

        // Unregistered authorities are down.
        let mut unknown = auths.clone();
        unknown.push(Auth {
            url: "http://nowhere:8000".to_string(),
            name: "nowhere".to_string(),
            me: false,
        });
        flaky.set(Behaviour::Honest);
        assert!(coordinator.key_ceremony(1, &group, &unknown).await.is_err());

        assert!(coordinator.key_ceremony(1, &group, &auths).await.is_ok());
    }

    #[rocket::async_test]
    async fn decryption_needs_every_authority() {
        let (directory, coordinator) = setup();
        let group = Group::example();
        let auths = auths(&URLS);
        let key = coordinator.key_ceremony(2, &group, &auths).await.unwrap();
        let ciphertexts = vec![key.encrypt(3).unwrap()];
        let flaky = directory.get(URLS[1]);

        flaky.set(Behaviour::Garbage);
        let err = coordinator
            .decrypt(2, &group, &auths, &ciphertexts)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authority(AuthorityError::Malformed { .. })));

        flaky.set(Behaviour::Hanging);
        let err = coordinator
            .decrypt(2, &group, &auths, &ciphertexts)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authority(AuthorityError::Timeout(_))));

        // Recovered.
        flaky.set(Behaviour::Honest);
        let plaintexts = coordinator
            .decrypt(2, &group, &auths, &ciphertexts)
            .await
            .unwrap();
        assert_eq!(decode_count(&group, &plaintexts[0], 3), Ok(3));
    }

    #[rocket::async_test]
    async fn no_authorities() {
        let (_, coordinator) = setup();
        let err = coordinator
            .key_ceremony(1, &Group::example(), &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::NoAuthorities)
        ));
    }
}
