//! The local authority, served to the coordinators of other nodes. Both
//! routes only answer callers holding a coordinator token.

use log::warn;
use rocket::{
    http::Status, response::Responder, serde::json::Json, Request, Route, State,
};

use crate::{
    crypto::{Ciphertext, Group, PartialDecryption, PublicShare},
    engine::Engine,
    error::Error,
    mixnet::{Authority, AuthorityError},
    model::{actor::Actor, voting::VotingId},
};

pub fn routes() -> Vec<Route> {
    routes![public_share, partial_decrypt]
}

/// An authority error as seen by a remote coordinator. Cryptographic refusals
/// are answered with 422 so the caller can tell them from transport failures.
#[derive(Debug)]
pub struct Refusal(Error);

impl From<Error> for Refusal {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Refusal {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        match self.0 {
            Error::Crypto(e) => {
                warn!("Refused authority request: {e}");
                (Status::UnprocessableEntity, Json(e.to_string())).respond_to(req)
            }
            Error::Authority(e @ AuthorityError::NoKeyShare { .. }) => {
                warn!("Refused authority request: {e}");
                (Status::NotFound, Json(e.to_string())).respond_to(req)
            }
            other => other.respond_to(req),
        }
    }
}

#[post("/mixnet/<voting_id>/key", data = "<group>", format = "json")]
async fn public_share(
    voting_id: VotingId,
    group: Json<Group>,
    actor: Actor,
    engine: &State<Engine>,
) -> Result<Json<PublicShare>, Refusal> {
    actor.require_authority()?;
    let share = engine.local().public_share(voting_id, &group).await?;
    Ok(Json(share))
}

#[post("/mixnet/<voting_id>/decrypt", data = "<ciphertexts>", format = "json")]
async fn partial_decrypt(
    voting_id: VotingId,
    ciphertexts: Json<Vec<Ciphertext>>,
    actor: Actor,
    engine: &State<Engine>,
) -> Result<Json<Vec<PartialDecryption>>, Refusal> {
    actor.require_authority()?;
    let partials = engine
        .local()
        .partial_decrypt(voting_id, &ciphertexts)
        .await?;
    Ok(Json(partials))
}
