use crate::error::ErrorResponse;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use tempo_core::models::User;
use uuid::Uuid;

/// Authenticated principal stored in request extensions by the auth
/// middleware. Carries only the user; organization context is resolved
/// separately, after authentication.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_superadmin(&self) -> bool {
        self.user.is_superadmin
    }
}

// Extract directly from request parts so handlers can take AuthUser as an
// argument without going through Extension.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing authentication context".to_string(),
                    details: None,
                    error_type: None,
                    code: "MISSING_AUTH_CONTEXT".to_string(),
                    recoverable: false,
                    suggested_action: Some("Check the access token".to_string()),
                }),
            )
        })
    }
}
