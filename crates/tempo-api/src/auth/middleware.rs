use crate::auth::models::AuthUser;
use crate::auth::token::{hash_access_token, ACCESS_TOKEN_PREFIX};
use crate::error::HttpAppError;
use crate::middleware::audit;
use crate::state::AppState;
use crate::utils::ip_extraction::extract_client_ip;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tempo_core::AppError;

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let trusted_proxy_count = std::env::var("TRUSTED_PROXY_COUNT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1);
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<std::net::SocketAddr>>()
        .map(|ci| ci.0);
    let client_ip = extract_client_ip(request.headers(), socket_addr.as_ref(), trusted_proxy_count);

    let auth_header = match request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
    {
        Some(h) => h,
        None => {
            audit::log_authentication_attempt(
                None,
                client_ip,
                false,
                Some("Missing authorization header".to_string()),
            );
            return HttpAppError(AppError::Unauthorized(
                "Missing authorization header".to_string(),
            ))
            .into_response();
        }
    };

    if !auth_header.starts_with("Bearer ") {
        audit::log_authentication_attempt(
            None,
            client_ip,
            false,
            Some("Invalid authorization header format".to_string()),
        );
        return HttpAppError(AppError::Unauthorized(
            "Invalid authorization header format".to_string(),
        ))
        .into_response();
    }

    let token = &auth_header[7..]; // Remove "Bearer " prefix

    if !token.starts_with(ACCESS_TOKEN_PREFIX) {
        audit::log_authentication_attempt(
            None,
            client_ip,
            false,
            Some("Invalid access token".to_string()),
        );
        return HttpAppError(AppError::Unauthorized(
            "Invalid access token".to_string(),
        ))
        .into_response();
    }

    let token_hash = hash_access_token(token);
    match state.access_tokens.find_user_by_token_hash(&token_hash).await {
        Ok(Some(user)) => {
            // Usage tracking happens off the request path.
            let access_tokens = state.access_tokens.clone();
            let hash_for_touch = token_hash.clone();
            tokio::spawn(async move {
                let _ = access_tokens.touch_last_used(&hash_for_touch).await;
            });

            audit::log_authentication_attempt(Some(user.id), client_ip, true, None);

            request.extensions_mut().insert(AuthUser { user });
            next.run(request).await
        }
        Ok(None) => {
            audit::log_authentication_attempt(
                None,
                client_ip,
                false,
                Some("Unknown or revoked access token".to_string()),
            );
            HttpAppError(AppError::Unauthorized(
                "Invalid access token".to_string(),
            ))
            .into_response()
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}
