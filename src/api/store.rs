use log::warn;
use rocket::{serde::json::Json, Route, State};

use crate::{
    engine::Engine,
    error::{Error, Result},
    model::{actor::Actor, ballot::EncryptedChoice, spec::VoteRequest},
};

pub fn routes() -> Vec<Route> {
    routes![store_vote]
}

/// Cast the caller's ballot. Only voters in the census of the voting may vote.
#[post("/store", data = "<vote>", format = "json")]
async fn store_vote(
    actor: Actor,
    vote: Json<VoteRequest>,
    engine: &State<Engine>,
) -> Result<Json<Vec<EncryptedChoice>>> {
    let VoteRequest { voting, option } = vote.0;
    if !engine
        .stores()
        .census
        .is_eligible(voting, actor.id)
        .await?
    {
        warn!("User {} is not in the census of voting {voting}", actor.id);
        return Err(Error::Forbidden(format!(
            "User {} cannot vote in voting {voting}",
            actor.id
        )));
    }
    let choices = engine.vote(voting, actor.id, option).await?;
    Ok(Json(choices))
}
