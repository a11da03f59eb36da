//! Verified-admin capability extractor.
//!
//! The identity layer in front of this service authenticates the caller and
//! injects `x-user-id` / `x-user-role` headers. Every ledger action requires
//! the admin role; this extractor rejects anything else before dispatch. No
//! identity provider is consulted here.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

const USER_ID_HEADER: &str = "x-user-id";
const USER_ROLE_HEADER: &str = "x-user-role";
const ADMIN_ROLE: &str = "admin";

/// Proof that the upstream identity layer verified the caller as an admin.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Forbidden(anyhow::anyhow!(
                    "Missing {} header (set by the identity layer)",
                    USER_ID_HEADER
                ))
            })?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Forbidden(anyhow::anyhow!(
                    "Missing {} header (set by the identity layer)",
                    USER_ROLE_HEADER
                ))
            })?;

        if role != ADMIN_ROLE {
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Ledger operations require the admin role"
            )));
        }

        let span = tracing::Span::current();
        span.record("user_id", user_id);

        Ok(AdminContext {
            user_id: user_id.to_string(),
        })
    }
}
