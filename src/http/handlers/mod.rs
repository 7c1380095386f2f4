//! Route handlers.
//!
//! Handlers receive already-gated requests: identity, loaded resources and
//! permissions are in request extensions by the time they run.

pub mod auth;
pub mod comments;
pub mod feed;
pub mod health;
pub mod posts;
pub mod users;

use crate::http::error::ApiError;

/// Character length of `value` must lie in `min..=max`.
pub(crate) fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len < min {
        if min == 1 {
            return Err(ApiError::BadRequest(format!("{field} is required")));
        }
        return Err(ApiError::BadRequest(format!(
            "{field} must be at least {min} characters"
        )));
    }
    if len > max {
        return Err(ApiError::BadRequest(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_len() {
        assert!(check_len("title", "hi", 1, 100).is_ok());
        assert!(check_len("title", "", 1, 100).is_err());
        assert!(check_len("username", "short", 8, 20).is_err());
        assert!(check_len("comment", &"é".repeat(100), 1, 100).is_ok());
        assert!(check_len("comment", &"x".repeat(101), 1, 100).is_err());
    }
}
