use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::{ballot::Ballot, census::CensusEntry, voting::Voting};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Voting {
    const NAME: &'static str = "votings";
}

impl MongoCollection for Ballot {
    const NAME: &'static str = "ballots";
}

impl MongoCollection for CensusEntry {
    const NAME: &'static str = "census";
}

impl MongoCollection for Counter {
    const NAME: &'static str = "counters";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Voting collection.
    let voting_index = IndexModel::builder()
        .keys(doc! {"id": 1})
        .options(unique.clone())
        .build();
    Coll::<Voting>::from_db(db)
        .create_index(voting_index, None)
        .await?;

    // Ballot collection: one ballot per voter and voting.
    let ballot_index = IndexModel::builder()
        .keys(doc! {"voting_id": 1, "voter_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Ballot>::from_db(db)
        .create_index(ballot_index, None)
        .await?;

    // Census collection.
    let census_index = IndexModel::builder()
        .keys(doc! {"voting_id": 1, "voter_id": 1})
        .options(unique)
        .build();
    Coll::<CensusEntry>::from_db(db)
        .create_index(census_index, None)
        .await?;

    Ok(())
}
