use log::error;
use rocket::{http::Status, response::Responder, serde::json::Json, Request};
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::mixnet::AuthorityError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Authority(#[from] AuthorityError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) | Self::Transition(_) => Status::BadRequest,
            Self::Forbidden(_) => Status::Forbidden,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
            Self::Conflict(_) => Status::Conflict,
            Self::Authority(_) => Status::BadGateway,
            Self::Crypto(_) | Self::Db(_) | Self::Jwt(_) => Status::InternalServerError,
        }
    }

    /// The message shown to API clients.
    pub fn message(&self) -> String {
        match self {
            Self::Forbidden(msg)
            | Self::Unauthorized(msg)
            | Self::NotFound(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Db(_) | Self::Jwt(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.class().is_server_error() {
            error!("{self}");
        }
        (status, Json(self.message())).respond_to(req)
    }
}

/// Requests that are rejected without touching any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Duplicated option, please checkout question options")]
    DuplicatedOption(String),
    #[error("Duplicated order, please checkout question order")]
    DuplicatedOrder(String),
    #[error("Duplicated option number {0}")]
    DuplicatedNumber(u32),
    #[error("A question cannot mix options and orders")]
    MixedOptionKinds,
    #[error("Option {0} does not exist")]
    UnknownOption(u32),
    #[error("Action not found, try with start, stop or tally")]
    MalformedAction(String),
    #[error("Field `{0}` is required")]
    MissingField(&'static str),
    #[error("A voting needs at least one authority")]
    NoAuthorities,
    #[error("Duplicated authority {0}")]
    DuplicatedAuthority(String),
    #[error("Question cannot be modified once the voting has started")]
    QuestionLocked,
    #[error("Voting is not accepting votes")]
    NotAcceptingVotes,
}

/// Lifecycle actions that are invalid in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Voting is not started")]
    NotStarted,
    #[error("Voting already started")]
    AlreadyStarted,
    #[error("Voting is not stopped")]
    NotStopped,
    #[error("Voting already stopped")]
    AlreadyStopped,
    #[error("Voting already tallied")]
    AlreadyTallied,
}
