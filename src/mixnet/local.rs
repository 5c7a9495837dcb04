use std::sync::Arc;

use log::{debug, info};

use crate::crypto::{Ciphertext, CryptoError, Group, KeyShare, PartialDecryption, PublicShare};
use crate::error::Result;
use crate::model::voting::VotingId;
use crate::store::KeyShareStore;

use super::{Authority, AuthorityError};

/// The authority run by this node, holding its private shares in a store.
pub struct LocalAuthority {
    url: String,
    keybits: usize,
    shares: Arc<dyn KeyShareStore>,
}

impl LocalAuthority {
    pub fn new(url: impl Into<String>, keybits: usize, shares: Arc<dyn KeyShareStore>) -> Self {
        Self {
            url: url.into(),
            keybits,
            shares,
        }
    }

    fn check_group(&self, voting: VotingId, share: &KeyShare, group: &Group) -> Result<()> {
        if share.group != *group {
            return Err(CryptoError::GroupMismatch(format!(
                "voting {voting} already has a key share for another group"
            ))
            .into());
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl Authority for LocalAuthority {
    fn url(&self) -> &str {
        &self.url
    }

    async fn public_share(&self, voting: VotingId, group: &Group) -> Result<PublicShare> {
        group.validate(self.keybits)?;

        if let Some(existing) = self.shares.get(voting).await? {
            self.check_group(voting, &existing, group)?;
            debug!("Reusing key share for voting {voting}");
            return Ok(existing.public_share());
        }

        let share = self
            .shares
            .insert_if_absent(voting, KeyShare::generate(group.clone()))
            .await?;
        self.check_group(voting, &share, group)?;
        info!("Created key share for voting {voting}");
        Ok(share.public_share())
    }

    async fn partial_decrypt(
        &self,
        voting: VotingId,
        ciphertexts: &[Ciphertext],
    ) -> Result<Vec<PartialDecryption>> {
        let share = self
            .shares
            .get(voting)
            .await?
            .ok_or_else(|| AuthorityError::NoKeyShare {
                url: self.url.clone(),
                voting,
            })?;
        let partials = ciphertexts
            .iter()
            .map(|ciphertext| share.partial_decrypt(ciphertext))
            .collect::<Result<Vec<_>, CryptoError>>()?;
        debug!(
            "Partially decrypted {} ciphertexts for voting {voting}",
            partials.len()
        );
        Ok(partials)
    }
}
