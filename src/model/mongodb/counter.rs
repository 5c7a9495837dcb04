use log::debug;
use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::{errors::is_duplicate_key_error, Coll};

/// ID of the counter handing out voting IDs.
pub const VOTING_ID_COUNTER_ID: &str = "voting_id";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

impl Counter {
    /// Create a new `Counter` with the given ID starting at the given value.
    pub fn new(id: impl Into<String>, start: u32) -> Self {
        Self {
            id: id.into(),
            next: start,
        }
    }

    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| Error::not_found(format!("Counter {id}")))?;
        Ok(counter.next)
    }
}

/// Ensure the voting ID counter exists, without resetting it.
pub async fn ensure_voting_id_counter_exists(counters: &Coll<Counter>) -> Result<(), DbError> {
    let result = counters
        .insert_one(Counter::new(VOTING_ID_COUNTER_ID, 1), None)
        .await;
    if is_duplicate_key_error(result.as_ref()) {
        debug!("Voting ID counter already exists");
        return Ok(());
    }
    result.map(|_| ())
}

#[cfg(test)]
mod tests {
    use mongodb::Database;

    use super::*;

    #[backend_test]
    async fn counter_increment(db: Database) {
        const START: u32 = 5;

        // Create a counter and insert it.
        let counters = Coll::<Counter>::from_db(&db);
        counters
            .insert_one(Counter::new("test", START), None)
            .await
            .unwrap();

        // Get the next value.
        let next = Counter::next(&counters, "test").await.unwrap();
        assert_eq!(next, START);

        // Check the counter was incremented.
        let counter = counters
            .find_one(doc! { "_id": "test" }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.next, START + 1);

        // Unknown counters are not created on the fly.
        assert!(Counter::next(&counters, "missing").await.is_err());
    }

    #[backend_test]
    async fn voting_id_counter_is_not_reset(db: Database) {
        // The server setup already created the counter.
        let counters = Coll::<Counter>::from_db(&db);
        assert_eq!(Counter::next(&counters, VOTING_ID_COUNTER_ID).await.unwrap(), 1);
        assert_eq!(Counter::next(&counters, VOTING_ID_COUNTER_ID).await.unwrap(), 2);

        ensure_voting_id_counter_exists(&counters).await.unwrap();
        assert_eq!(Counter::next(&counters, VOTING_ID_COUNTER_ID).await.unwrap(), 3);
    }
}
