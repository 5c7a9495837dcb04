pub mod actor;
pub mod ballot;
pub mod census;
pub mod mongodb;
pub mod question;
pub mod spec;
pub mod voting;
