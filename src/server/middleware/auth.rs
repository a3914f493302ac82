//! Admin authentication.
//!
//! A single admin principal authenticates with `Authorization: Bearer <key>`
//! against `server.auth.api_key`. Public share routes never pass through
//! this middleware.

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sharegate_common::Error;
use subtle::ConstantTimeEq;

use super::request_id::RequestId;
use crate::config::AuthConfig;
use crate::server::context::AppContext;
use crate::server::error::AppError;

/// Check a presented bearer token against the auth config.
pub fn check_admin(auth_config: &AuthConfig, bearer_token: Option<&str>) -> Result<(), Error> {
    if !auth_config.enabled {
        return Ok(());
    }

    match (bearer_token, auth_config.api_key.as_deref()) {
        (Some(token), Some(api_key)) if bool::from(token.as_bytes().ct_eq(api_key.as_bytes())) => {
            Ok(())
        }
        _ => Err(Error::Unauthorized),
    }
}

/// Middleware guarding the share management routes.
pub async fn admin_auth_middleware(
    State(ctx): State<AppContext>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request.headers().typed_get::<Authorization<Bearer>>();
    let bearer_token = bearer.as_ref().map(|b| b.token());

    if let Err(e) = check_admin(&ctx.config.server.auth, bearer_token) {
        tracing::warn!(
            path = %request.uri().path(),
            "Rejected admin request without a valid API key"
        );
        let mut err = AppError::new(e);
        if let Some(id) = request.extensions().get::<RequestId>() {
            err = err.with_request_id(id);
        }
        return Err(err);
    }

    Ok(next.run(request).await)
}

/// Generate a random API key
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn enabled(key: &str) -> AuthConfig {
        AuthConfig {
            enabled: true,
            api_key: Some(key.to_string()),
        }
    }

    #[test]
    fn test_disabled_admits_everything() {
        assert!(check_admin(&AuthConfig::default(), None).is_ok());
        assert!(check_admin(&AuthConfig::default(), Some("anything")).is_ok());
    }

    #[test]
    fn test_enabled_requires_matching_key() {
        let config = enabled("s3cret");
        assert!(check_admin(&config, Some("s3cret")).is_ok());
        assert_matches!(check_admin(&config, Some("s3cre")), Err(Error::Unauthorized));
        assert_matches!(check_admin(&config, Some("S3CRET")), Err(Error::Unauthorized));
        assert_matches!(check_admin(&config, Some("s3cret-and-more")), Err(Error::Unauthorized));
        assert_matches!(check_admin(&config, None), Err(Error::Unauthorized));
    }

    #[test]
    fn test_enabled_without_key_rejects() {
        let config = AuthConfig {
            enabled: true,
            api_key: None,
        };
        assert_matches!(check_admin(&config, Some("")), Err(Error::Unauthorized));
    }

    #[test]
    fn test_generate_api_key() {
        let key1 = generate_api_key();
        let key2 = generate_api_key();
        assert_eq!(key1.len(), 43);
        assert_ne!(key1, key2);
    }
}
