//! HTTP route handlers.

pub mod deliveries;
pub mod orders;
pub mod products;
pub mod system;
pub mod users;
pub mod workflows;

use std::fmt::Display;
use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path identifier, rejecting malformed values with 400.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
