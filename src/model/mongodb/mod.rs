mod bson;
mod collection;
mod counter;
pub mod errors;

pub use bson::serde_string_map;
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{ensure_voting_id_counter_exists, Counter, VOTING_ID_COUNTER_ID};
