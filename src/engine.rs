//! The tally engine: voting lifecycle, ballot casting and the tally pipeline.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use rocket::http::Status;
use rocket::tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::crypto::{decode_count, Ciphertext, CryptoError, Group};
use crate::error::{Error, Result, ValidationError};
use crate::mixnet::{Coordinator, LocalAuthority};
use crate::model::{
    actor::{Actor, VoterId},
    ballot::{Ballot, EncryptedChoice},
    question::{Question, QuestionUpdate},
    spec::{AuthSpec, OptionSpec, OrderSpec, VotingSpec},
    voting::{Action, Auth, NewVoting, PostProc, Voting, VotingId, VotingState},
};
use crate::store::Stores;

/// Name given to this node when a voting is created without authorities.
const LOCAL_AUTHORITY_NAME: &str = "local authority";

/// Map from voting IDs to their locks.
type LockMap = HashMap<VotingId, Arc<RwLock<()>>>;

/// Outcome of a lifecycle request, as reported to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub message: String,
    pub status: Status,
}

pub struct Engine {
    stores: Stores,
    coordinator: Coordinator,
    local: Arc<LocalAuthority>,
    keybits: usize,
    base_url: String,
    /// Ballots hold a read guard while they check the state and are stored.
    /// Transitions and question edits hold the write guard.
    locks: Arc<Mutex<LockMap>>,
}

impl Engine {
    pub fn new(
        config: &Config,
        stores: Stores,
        coordinator: Coordinator,
        local: Arc<LocalAuthority>,
    ) -> Self {
        Self {
            stores,
            coordinator,
            local,
            keybits: config.keybits(),
            base_url: config.base_url().trim_end_matches('/').to_string(),
            locks: Default::default(),
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// The authority run by this node.
    pub fn local(&self) -> &Arc<LocalAuthority> {
        &self.local
    }

    async fn lock(&self, voting: VotingId) -> Arc<RwLock<()>> {
        self.locks.lock().await.entry(voting).or_default().clone()
    }

    /// Hand back a lock taken with [`Self::lock`]. Only locks that someone
    /// holds or waits on stay in the map.
    async fn unlock(&self, voting: VotingId, lock: Arc<RwLock<()>>) {
        let mut locks = self.locks.lock().await;
        // The map and `lock` are the only references left.
        let idle = Arc::strong_count(&lock) == 2
            && locks
                .get(&voting)
                .map_or(false, |held| Arc::ptr_eq(held, &lock));
        if idle {
            locks.remove(&voting);
        }
    }

    pub async fn create_voting(&self, actor: &Actor, spec: VotingSpec) -> Result<Voting> {
        actor.require_admin()?;
        let name = spec
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or(ValidationError::MissingField("name"))?;
        let desc = spec
            .question
            .filter(|desc| !desc.trim().is_empty())
            .ok_or(ValidationError::MissingField("question"))?;
        let question = Question::from_lists(desc, spec.question_opt, spec.question_ord)?;
        let auths = self.auths(spec.auths)?;

        let voting = self
            .stores
            .votings
            .insert(NewVoting {
                name,
                desc: spec.desc,
                question,
                auths,
            })
            .await?;
        info!(
            "Created voting {} ({}) with {} authorities",
            voting.id,
            voting,
            voting.auths.len()
        );
        Ok(voting)
    }

    /// Turn the requested authorities into registered ones, marking this node.
    fn auths(&self, specs: Option<Vec<AuthSpec>>) -> Result<Vec<Auth>, ValidationError> {
        let specs = match specs {
            Some(specs) => specs,
            None => {
                return Ok(vec![Auth {
                    url: self.base_url.clone(),
                    name: LOCAL_AUTHORITY_NAME.to_string(),
                    me: true,
                }])
            }
        };
        if specs.is_empty() {
            return Err(ValidationError::NoAuthorities);
        }

        let mut seen = HashSet::new();
        specs
            .into_iter()
            .map(|spec| {
                let url = spec.url.trim_end_matches('/').to_string();
                if !seen.insert(url.clone()) {
                    return Err(ValidationError::DuplicatedAuthority(url));
                }
                Ok(Auth {
                    me: url == self.base_url,
                    url,
                    name: spec.name,
                })
            })
            .collect()
    }

    pub async fn get_voting(&self, id: VotingId) -> Result<Voting> {
        self.stores
            .votings
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voting {id}")))
    }

    pub async fn add_option(&self, actor: &Actor, id: VotingId, spec: OptionSpec) -> Result<Voting> {
        self.edit_question(actor, id, |mut question| {
            question.add_option(spec.option, spec.number)?;
            Ok(question)
        })
        .await
    }

    pub async fn add_order(&self, actor: &Actor, id: VotingId, spec: OrderSpec) -> Result<Voting> {
        self.edit_question(actor, id, |mut question| {
            question.add_order(spec.option, spec.number, spec.order_number)?;
            Ok(question)
        })
        .await
    }

    pub async fn delete_option(&self, actor: &Actor, id: VotingId, number: u32) -> Result<Voting> {
        self.edit_question(actor, id, |mut question| {
            question.remove(number)?;
            Ok(question)
        })
        .await
    }

    /// Update the question and bring it back to a consistent shape: yes/no
    /// questions regain their two options, others lose the automatic ones.
    pub async fn save_question(
        &self,
        actor: &Actor,
        id: VotingId,
        update: QuestionUpdate,
    ) -> Result<Voting> {
        self.edit_question(actor, id, |question| question.apply(update).normalize())
            .await
    }

    async fn edit_question<F>(&self, actor: &Actor, id: VotingId, edit: F) -> Result<Voting>
    where
        F: FnOnce(Question) -> Result<Question, ValidationError> + Send,
    {
        actor.require_admin()?;
        let lock = self.lock(id).await;
        let result = {
            let _guard = lock.write().await;
            self.replace_question(id, edit).await
        };
        self.unlock(id, lock).await;
        result
    }

    async fn replace_question<F>(&self, id: VotingId, edit: F) -> Result<Voting>
    where
        F: FnOnce(Question) -> Result<Question, ValidationError> + Send,
    {
        let mut voting = self.get_voting(id).await?;
        if voting.state != VotingState::NotStarted {
            return Err(ValidationError::QuestionLocked.into());
        }
        voting.question = edit(voting.question.clone())?;
        if !self
            .stores
            .votings
            .replace_if_state(&voting, VotingState::NotStarted)
            .await?
        {
            return Err(ValidationError::QuestionLocked.into());
        }
        debug!("Updated question of voting {id}");
        Ok(voting)
    }

    /// Apply a lifecycle action given by name, reporting the outcome the way
    /// the client sees it.
    pub async fn apply_action(&self, id: VotingId, actor: &Actor, action: &str) -> ActionResponse {
        match self.apply(id, actor, action).await {
            Ok(action) => ActionResponse {
                message: action.confirmation().to_string(),
                status: Status::Ok,
            },
            Err(e) => {
                let status = e.status();
                if status.class().is_server_error() {
                    error!("Failed to apply `{action}` to voting {id}: {e}");
                } else {
                    warn!("Refused `{action}` on voting {id}: {e}");
                }
                ActionResponse {
                    message: e.message(),
                    status,
                }
            }
        }
    }

    /// Apply a lifecycle action. On any error the stored voting is unchanged,
    /// apart from a group generated ahead of a failed key ceremony.
    pub async fn apply(&self, id: VotingId, actor: &Actor, action: &str) -> Result<Action> {
        actor.require_admin()?;
        let action: Action = action.parse()?;

        let lock = self.lock(id).await;
        let result = {
            let _guard = lock.write().await;
            self.transition(id, action).await
        };
        self.unlock(id, lock).await;
        result
    }

    async fn transition(&self, id: VotingId, action: Action) -> Result<Action> {
        let voting = self.get_voting(id).await?;
        let previous = voting.state;
        let next = previous.apply(action)?;

        let mut voting = match action {
            Action::Start => self.start(voting).await?,
            Action::Stop => Voting {
                end_date: Some(Utc::now()),
                ..voting
            },
            Action::Tally => self.tally(voting).await?,
        };
        voting.state = next;

        if !self.stores.votings.replace_if_state(&voting, previous).await? {
            return Err(Error::Conflict(format!(
                "Voting {id} changed while applying `{action}`"
            )));
        }
        info!("Voting {id}: {previous:?} -> {next:?}");
        Ok(action)
    }

    /// Make sure the voting has a group and a joint key, then open it. The
    /// question is frozen in its normalised form.
    async fn start(&self, mut voting: Voting) -> Result<Voting> {
        if voting.auths.is_empty() {
            return Err(ValidationError::NoAuthorities.into());
        }
        // Option edits save without normalising.
        voting.question = voting.question.clone().normalize()?;

        if voting.pub_key.is_none() {
            let group = match voting.group.clone() {
                Some(group) => group,
                None => {
                    let group = self.generate_group().await?;
                    voting.group = Some(group.clone());
                    // Persist before the ceremony so a retry reuses it.
                    if !self
                        .stores
                        .votings
                        .replace_if_state(&voting, VotingState::NotStarted)
                        .await?
                    {
                        return Err(Error::Conflict(format!(
                            "Voting {} changed while starting",
                            voting.id
                        )));
                    }
                    group
                }
            };
            let key = self
                .coordinator
                .key_ceremony(voting.id, &group, &voting.auths)
                .await?;
            voting.pub_key = Some(key);
        }

        voting.start_date = Some(Utc::now());
        Ok(voting)
    }

    async fn generate_group(&self) -> Result<Group> {
        let bits = self.keybits;
        let group = rocket::tokio::task::spawn_blocking(move || Group::generate(bits))
            .await
            .map_err(|e| CryptoError::InvalidGroup(format!("group generation failed: {e}")))??;
        debug!("Generated {bits}-bit group");
        Ok(group)
    }

    /// Combine every ballot per option, have the authorities open the sums
    /// and publish the counts.
    async fn tally(&self, mut voting: Voting) -> Result<Voting> {
        let id = voting.id;
        let key = voting
            .pub_key
            .clone()
            .ok_or(CryptoError::NoPublicKey(id))?;
        let group = &key.group;
        let ballots = self.stores.ballots.count(id).await?;
        info!("Tallying voting {id}: {ballots} ballots");

        let choices = voting
            .question
            .choices()
            .into_iter()
            .map(|(number, option)| (number, option.to_string()))
            .collect::<Vec<_>>();

        let mut sums = Vec::with_capacity(choices.len());
        for (number, _) in &choices {
            let ciphertexts = self.stores.ballots.list_ciphertexts(id, *number).await?;
            if ciphertexts.iter().any(|c| !c.is_valid(group)) {
                return Err(CryptoError::InvalidCiphertext.into());
            }
            let sum = ciphertexts
                .iter()
                .fold(Ciphertext::identity(), |acc, c| acc.combine(c, group));
            sums.push(sum);
        }

        let encoded = if sums.is_empty() {
            Vec::new()
        } else {
            self.coordinator
                .decrypt(id, group, &voting.auths, &sums)
                .await?
        };

        let mut tally = BTreeMap::new();
        let mut postproc = Vec::with_capacity(choices.len());
        for ((number, option), encoded) in choices.into_iter().zip(encoded) {
            let votes = decode_count(group, &encoded, ballots)?;
            tally.insert(number, votes);
            postproc.push(PostProc {
                number,
                option,
                votes,
            });
        }
        info!("Tallied voting {id}: {tally:?}");

        voting.tally = tally;
        voting.postproc = postproc;
        Ok(voting)
    }

    /// Encrypt a ballot for `option` under the voting's key without storing it.
    pub async fn cast_vote(
        &self,
        id: VotingId,
        voter: VoterId,
        option: u32,
    ) -> Result<Vec<EncryptedChoice>> {
        let voting = self.get_voting(id).await?;
        let choices = self.encrypt_ballot(&voting, option)?;
        debug!("Encrypted ballot of voter {voter} for voting {id}");
        Ok(choices)
    }

    /// Encrypt and store a ballot. A later ballot from the same voter replaces
    /// the earlier one.
    pub async fn vote(
        &self,
        id: VotingId,
        voter: VoterId,
        option: u32,
    ) -> Result<Vec<EncryptedChoice>> {
        let lock = self.lock(id).await;
        let result = {
            let _guard = lock.read().await;
            self.store_ballot(id, voter, option).await
        };
        self.unlock(id, lock).await;
        result
    }

    async fn store_ballot(
        &self,
        id: VotingId,
        voter: VoterId,
        option: u32,
    ) -> Result<Vec<EncryptedChoice>> {
        let voting = self.get_voting(id).await?;
        let choices = self.encrypt_ballot(&voting, option).map_err(|e| {
            warn!("Rejected ballot of voter {voter} for voting {id}: {e}");
            e
        })?;
        self.stores
            .ballots
            .append(Ballot::new(id, voter, choices.clone()))
            .await?;
        debug!("Stored ballot of voter {voter} for voting {id}");
        Ok(choices)
    }

    /// One ciphertext per option: `g^1` for the chosen one, `g^0` elsewhere.
    fn encrypt_ballot(&self, voting: &Voting, option: u32) -> Result<Vec<EncryptedChoice>> {
        if !voting.accepts_votes() {
            return Err(ValidationError::NotAcceptingVotes.into());
        }
        if !voting.question.contains(option) {
            return Err(ValidationError::UnknownOption(option).into());
        }
        let key = voting
            .pub_key
            .as_ref()
            .ok_or(CryptoError::NoPublicKey(voting.id))?;
        voting
            .question
            .choices()
            .into_iter()
            .map(|(number, _)| {
                Ok(EncryptedChoice {
                    number,
                    ciphertext: key.encrypt(u64::from(number == option))?,
                })
            })
            .collect()
    }

    /// Published results of a tallied voting.
    pub async fn get_result(&self, id: VotingId) -> Result<Vec<PostProc>> {
        let voting = self.get_voting(id).await?;
        if voting.state != VotingState::Tallied {
            return Err(Error::not_found("Results not available"));
        }
        Ok(voting.postproc)
    }
}
