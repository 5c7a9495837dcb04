//! Server error codes the mongodb crate has no constants for.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

/// A unique index rejected the write.
pub const DUPLICATE_KEY: i32 = 11000;

/// Whether the write failed on a unique index, e.g. a second insert of the
/// same counter or key share.
pub fn is_duplicate_key(err: &DbError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY
    )
}

/// [`is_duplicate_key`] for the result of a write.
pub fn is_duplicate_key_error<T>(result: Result<T, &DbError>) -> bool {
    result.err().map_or(false, is_duplicate_key)
}
