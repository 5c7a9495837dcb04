use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    engine::Engine,
    error::Result,
    model::{
        actor::Actor,
        question::QuestionUpdate,
        spec::{ActionRequest, OptionSpec, OrderSpec, VotingSpec},
        voting::{PostProc, Voting, VotingId},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        create_voting,
        get_voting,
        update_voting,
        get_results,
        add_option,
        add_order,
        delete_option,
        save_question,
    ]
}

#[post("/voting", data = "<spec>", format = "json")]
async fn create_voting(
    actor: Actor,
    spec: Json<VotingSpec>,
    engine: &State<Engine>,
) -> Result<(Status, Json<Voting>)> {
    let voting = engine.create_voting(&actor, spec.0).await?;
    Ok((Status::Created, Json(voting)))
}

#[get("/voting/<voting_id>")]
async fn get_voting(voting_id: VotingId, engine: &State<Engine>) -> Result<Json<Voting>> {
    Ok(Json(engine.get_voting(voting_id).await?))
}

/// Start, stop or tally a voting. Always answers with a JSON string message.
#[put("/voting/<voting_id>", data = "<request>", format = "json")]
async fn update_voting(
    actor: Actor,
    voting_id: VotingId,
    request: Json<ActionRequest>,
    engine: &State<Engine>,
) -> (Status, Json<String>) {
    let action = request.0.action.unwrap_or_default();
    let response = engine.apply_action(voting_id, &actor, &action).await;
    (response.status, Json(response.message))
}

#[get("/voting/<voting_id>/results")]
async fn get_results(voting_id: VotingId, engine: &State<Engine>) -> Result<Json<Vec<PostProc>>> {
    Ok(Json(engine.get_result(voting_id).await?))
}

#[post("/voting/<voting_id>/options", data = "<spec>", format = "json")]
async fn add_option(
    actor: Actor,
    voting_id: VotingId,
    spec: Json<OptionSpec>,
    engine: &State<Engine>,
) -> Result<Json<Voting>> {
    Ok(Json(engine.add_option(&actor, voting_id, spec.0).await?))
}

#[post("/voting/<voting_id>/orders", data = "<spec>", format = "json")]
async fn add_order(
    actor: Actor,
    voting_id: VotingId,
    spec: Json<OrderSpec>,
    engine: &State<Engine>,
) -> Result<Json<Voting>> {
    Ok(Json(engine.add_order(&actor, voting_id, spec.0).await?))
}

#[delete("/voting/<voting_id>/options/<number>")]
async fn delete_option(
    actor: Actor,
    voting_id: VotingId,
    number: u32,
    engine: &State<Engine>,
) -> Result<Json<Voting>> {
    Ok(Json(engine.delete_option(&actor, voting_id, number).await?))
}

#[put("/voting/<voting_id>/question", data = "<update>", format = "json")]
async fn save_question(
    actor: Actor,
    voting_id: VotingId,
    update: Json<QuestionUpdate>,
    engine: &State<Engine>,
) -> Result<Json<Voting>> {
    Ok(Json(engine.save_question(&actor, voting_id, update.0).await?))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Header},
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json,
    };

    use super::*;
    use crate::config::Config;
    use crate::model::voting::VotingState;

    async fn create(client: &Client, config: &Config, spec: &VotingSpec) -> Voting {
        let response = client
            .post(uri!(create_voting))
            .header(ContentType::JSON)
            .header(Actor::admin(1).header(config))
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Created, response.status());
        response.into_json().await.unwrap()
    }

    async fn act<'c>(
        client: &'c Client,
        id: VotingId,
        auth: Header<'static>,
        body: &str,
    ) -> LocalResponse<'c> {
        client
            .put(uri!(update_voting(id)))
            .header(ContentType::JSON)
            .header(auth)
            .body(body.to_string())
            .dispatch()
            .await
    }

    async fn message(response: LocalResponse<'_>) -> String {
        response.into_json::<String>().await.unwrap()
    }

    #[backend_test]
    async fn create_and_describe(client: Client, config: Config) {
        let voting = create(&client, &config, &VotingSpec::example()).await;
        assert_eq!(voting.name, "Example");
        assert_eq!(voting.state, VotingState::NotStarted);
        assert_eq!(voting.question.choices().len(), 3);

        let response = client.get(uri!(get_voting(voting.id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let described: Voting = response.into_json().await.unwrap();
        assert_eq!(described, voting);

        let response = client.get(uri!(get_voting(voting.id + 1))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn bad_create(client: Client, config: Config) {
        // No token.
        let response = client
            .post(uri!(create_voting))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&VotingSpec::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        // Not an admin.
        let response = client
            .post(uri!(create_voting))
            .header(ContentType::JSON)
            .header(Actor::voter(5).header(&config))
            .body(serde_json::to_string(&VotingSpec::example()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());

        // Missing name.
        let spec = VotingSpec {
            name: None,
            ..VotingSpec::example()
        };
        let response = client
            .post(uri!(create_voting))
            .header(ContentType::JSON)
            .header(Actor::admin(1).header(&config))
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(message(response).await, "Field `name` is required");

        // Duplicated options.
        let spec = VotingSpec {
            question_opt: vec!["a".to_string(), "a".to_string()],
            ..VotingSpec::example()
        };
        let response = client
            .post(uri!(create_voting))
            .header(ContentType::JSON)
            .header(Actor::admin(1).header(&config))
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(
            message(response).await,
            "Duplicated option, please checkout question options"
        );
    }

    #[backend_test]
    async fn update_voting_lifecycle(client: Client, config: Config) {
        let id = create(&client, &config, &VotingSpec::example()).await.id;
        let admin = || Actor::admin(1).header(&config);

        let steps = [
            (r#"{"action": "stop"}"#, Status::BadRequest, "Voting is not started"),
            (r#"{"action": "tally"}"#, Status::BadRequest, "Voting is not started"),
            (r#"{"action": "start"}"#, Status::Ok, "Voting started"),
            (r#"{"action": "start"}"#, Status::BadRequest, "Voting already started"),
            (r#"{"action": "tally"}"#, Status::BadRequest, "Voting is not stopped"),
            (r#"{"action": "stop"}"#, Status::Ok, "Voting stopped"),
            (r#"{"action": "stop"}"#, Status::BadRequest, "Voting already stopped"),
            (r#"{"action": "tally"}"#, Status::Ok, "Voting tallied"),
            (r#"{"action": "tally"}"#, Status::BadRequest, "Voting already tallied"),
        ];
        for (body, status, expected) in steps {
            let response = act(&client, id, admin(), body).await;
            assert_eq!(status, response.status(), "{body}");
            assert_eq!(message(response).await, expected, "{body}");
        }
    }

    #[backend_test]
    async fn bad_update_voting(client: Client, config: Config) {
        let id = create(&client, &config, &VotingSpec::example()).await.id;

        let response = act(&client, id, Actor::admin(1).header(&config), "{}").await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(
            message(response).await,
            "Action not found, try with start, stop or tally"
        );

        let response = act(
            &client,
            id,
            Actor::admin(1).header(&config),
            r#"{"action": "restart"}"#,
        )
        .await;
        assert_eq!(Status::BadRequest, response.status());

        let response = act(
            &client,
            id,
            Actor::voter(2).header(&config),
            r#"{"action": "start"}"#,
        )
        .await;
        assert_eq!(Status::Forbidden, response.status());

        let other = Config::example_with_secret("someone else's secret");
        let response = act(
            &client,
            id,
            Actor::admin(1).header(&other),
            r#"{"action": "start"}"#,
        )
        .await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client.get(uri!(get_voting(id))).dispatch().await;
        let voting: Voting = response.into_json().await.unwrap();
        assert_eq!(voting.state, VotingState::NotStarted);
    }

    #[backend_test]
    async fn results_after_tally(client: Client, config: Config) {
        let id = create(&client, &config, &VotingSpec::example()).await.id;

        let response = client.get(uri!(get_results(id))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(message(response).await, "Results not available");

        for action in ["start", "stop", "tally"] {
            let body = format!(r#"{{"action": "{action}"}}"#);
            let response = act(&client, id, Actor::admin(1).header(&config), &body).await;
            assert_eq!(Status::Ok, response.status());
        }

        let response = client.get(uri!(get_results(id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let results: Vec<PostProc> = response.into_json().await.unwrap();
        let options = results
            .iter()
            .map(|r| (r.number, r.option.as_str(), r.votes))
            .collect::<Vec<_>>();
        assert_eq!(options, vec![(1, "cat", 0), (2, "dog", 0), (3, "horse", 0)]);
    }

    #[backend_test]
    async fn edit_question(client: Client, config: Config) {
        let id = create(&client, &config, &VotingSpec::example()).await.id;

        let response = client
            .post(uri!(add_option(id)))
            .header(ContentType::JSON)
            .header(Actor::admin(1).header(&config))
            .body(r#"{"option": "fish", "number": 10}"#)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let voting: Voting = response.into_json().await.unwrap();
        assert!(voting.question.contains(10));

        let response = client
            .post(uri!(add_order(id)))
            .header(ContentType::JSON)
            .header(Actor::admin(1).header(&config))
            .body(r#"{"option": "first"}"#)
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let response = client
            .delete(uri!(delete_option(id, 2)))
            .header(Actor::admin(1).header(&config))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let voting: Voting = response.into_json().await.unwrap();
        assert!(!voting.question.contains(2));

        let response = client
            .put(uri!(save_question(id)))
            .header(ContentType::JSON)
            .header(Actor::admin(1).header(&config))
            .body(r#"{"is_yes_no": true}"#)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let voting: Voting = response.into_json().await.unwrap();
        assert_eq!(voting.question.choices(), vec![(0, "YES"), (1, "NO")]);

        let response = act(
            &client,
            id,
            Actor::admin(1).header(&config),
            r#"{"action": "start"}"#,
        )
        .await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .delete(uri!(delete_option(id, 0)))
            .header(Actor::admin(1).header(&config))
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(
            message(response).await,
            "Question cannot be modified once the voting has started"
        );
    }
}
