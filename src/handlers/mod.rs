// One controller module per entity. Every handler follows the same template:
// parse path id, resolve the caller from the token, enforce the operation's
// role/ownership rule, bind + validate the body, call the store, shape the
// response.

pub mod countermeasures;
pub mod projects;
pub mod risks;
pub mod users;

use crate::error::ApiError;

/// Parses a positive numeric id from a path segment.
pub(crate) fn parse_path_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::IdInPathWrongFormat),
    }
}
