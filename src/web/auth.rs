use axum::http::StatusCode;
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;

use crate::web::{ApiError, AppState, json_error};

/// Tokens at or below this length are refused by the placeholder rule.
const PLACEHOLDER_MIN_TOKEN_LEN: usize = 10;

pub type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

/// How an admin request was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAuth {
    /// Matched the configured `ADMIN_API_TOKEN`.
    SharedToken,
    /// No token configured; accepted by length alone. Not real authentication.
    Placeholder,
}

/// Checks a bearer token against the configured admin credential.
///
/// SECURITY PLACEHOLDER: without a configured token any bearer longer than
/// ten characters is accepted. This stands in for the external JWT
/// verification service and must not be relied on in production.
pub fn authenticate_request(token: &str, configured: Option<&str>) -> Option<AdminAuth> {
    let token = token.trim();
    match configured {
        Some(expected) => constant_time_eq(token.as_bytes(), expected.as_bytes())
            .then_some(AdminAuth::SharedToken),
        None if token.len() > PLACEHOLDER_MIN_TOKEN_LEN => {
            warn!("accepted admin request via placeholder token rule");
            Some(AdminAuth::Placeholder)
        }
        None => None,
    }
}

pub fn require_admin(state: &AppState, bearer: &BearerHeader) -> Result<AdminAuth, ApiError> {
    let Some(TypedHeader(authorization)) = bearer else {
        return Err(unauthorized());
    };

    authenticate_request(authorization.token(), state.admin_token()).ok_or_else(unauthorized)
}

fn unauthorized() -> ApiError {
    json_error(StatusCode::UNAUTHORIZED, "Admin authentication required")
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
