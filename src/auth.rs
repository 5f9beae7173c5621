// ABOUTME: Authentication relay and token validation against the external auth provider
// ABOUTME: Forwards signup/login/logout to the provider and validates HS256 JWTs locally
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! # Authentication
//!
//! The service issues no credentials of its own. Signup, login, and logout
//! are relayed to a GoTrue-style provider over HTTPS; tokens the provider
//! issues are validated locally with the shared HS256 secret, so request
//! authentication never needs a network round trip.

use crate::config::environment::AuthProviderConfig;
use crate::errors::AppError;
use crate::models::AuthenticatedUser;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const PROVIDER_NAME: &str = "auth provider";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// JWT claims issued by the auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID
    pub sub: String,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Role claims granted by the provider
    #[serde(default)]
    pub roles: Vec<String>,
    /// Single-role claim some providers use instead of `roles`
    #[serde(default)]
    pub role: Option<String>,
    /// Audience
    pub aud: String,
    /// Issued at (unix seconds)
    #[serde(default)]
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

impl Claims {
    fn into_user(self) -> Result<AuthenticatedUser, AppError> {
        let id = Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::auth_invalid("Token subject is not a valid user ID"))?;
        let mut roles = self.roles;
        if let Some(role) = self.role {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        Ok(AuthenticatedUser {
            id,
            email: self.email,
            display_name: self.name,
            roles,
        })
    }
}

/// Validates provider-issued JWTs with the shared secret
#[derive(Clone)]
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    /// Create a validator for the configured secret and audience
    #[must_use]
    pub fn new(config: &AuthProviderConfig) -> Self {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.set_audience(&[&config.audience]);
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Validate a bearer token and resolve the authenticated user
    pub fn validate(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::auth_expired(),
                _ => {
                    debug!(error = %e, "token validation failed");
                    AppError::auth_invalid("Invalid authentication token")
                }
            }
        })?;
        data.claims.into_user()
    }
}

/// Extract the bearer token from request headers.
///
/// Missing header maps to 401 `AUTH_REQUIRED`; a malformed one to
/// `AUTH_INVALID`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(AppError::auth_required)?;
    let value = header
        .to_str()
        .map_err(|_| AppError::auth_invalid("Authorization header is not valid UTF-8"))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::auth_invalid("Authorization header must be 'Bearer <token>'"))
}

/// Session payload returned by the provider on login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSession {
    /// Access token (JWT)
    pub access_token: String,
    /// Token type, always `bearer`
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Refresh token for renewing the session
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Provider's user object, passed through untouched
    #[serde(default)]
    pub user: serde_json::Value,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Provider's user object as returned from signup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderUser {
    /// User UUID
    pub id: Uuid,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// Whether the address still needs confirmation
    #[serde(default)]
    pub confirmation_sent_at: Option<String>,
    /// Arbitrary user metadata
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Error body shape used by GoTrue-style providers
#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ProviderError {
    fn into_message(self) -> String {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .unwrap_or_else(|| "Request rejected by auth provider".to_string())
    }
}

/// HTTP client relaying auth operations to the provider
#[derive(Clone)]
pub struct AuthProviderClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthProviderClient {
    /// Create a relay client for the configured provider
    pub fn new(config: &AuthProviderConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Register a new account with the provider
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<ProviderUser, AppError> {
        let mut body = serde_json::json!({
            "email": email,
            "password": password,
        });
        if let Some(name) = display_name {
            body["data"] = serde_json::json!({ "name": name });
        }

        let response = self
            .http
            .post(format!("{}/signup", self.base_url))
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        Self::read_json(response).await
    }

    /// Exchange email and password for a session
    pub async fn login(&self, email: &str, password: &str) -> Result<ProviderSession, AppError> {
        let response = self
            .http
            .post(format!("{}/token?grant_type=password", self.base_url))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .map_err(Self::transport_error)?;

        Self::read_json(response).await
    }

    /// Revoke the session behind an access token
    pub async fn logout(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::status_error(response).await)
        }
    }

    fn transport_error(error: reqwest::Error) -> AppError {
        warn!(error = %error, "auth provider unreachable");
        AppError::external_unavailable(PROVIDER_NAME).with_source(error)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        response.json().await.map_err(|e| {
            AppError::external_service(PROVIDER_NAME, "unexpected response body").with_source(e)
        })
    }

    /// Map a provider error response to the matching client-facing error
    async fn status_error(response: reqwest::Response) -> AppError {
        let status = response.status();
        let message = response
            .json::<ProviderError>()
            .await
            .map(ProviderError::into_message)
            .unwrap_or_else(|_| "Request rejected by auth provider".to_string());

        match status.as_u16() {
            400 | 422 => AppError::invalid_input(message),
            401 | 403 => AppError::auth_invalid(message),
            429 => AppError::external_service(PROVIDER_NAME, "rate limited, try again later"),
            500..=599 => {
                warn!(status = status.as_u16(), message = %message, "auth provider error");
                AppError::external_service(PROVIDER_NAME, message)
            }
            _ => AppError::external_service(PROVIDER_NAME, message),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn test_config() -> AuthProviderConfig {
        AuthProviderConfig {
            base_url: "http://localhost:9999/auth/v1".into(),
            api_key: "anon-key".into(),
            jwt_secret: SECRET.into(),
            audience: "authenticated".into(),
        }
    }

    fn mint(claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn valid_claims(sub: &str) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: sub.to_string(),
            email: Some("user@example.com".into()),
            name: Some("Test User".into()),
            roles: vec!["admin".into()],
            role: Some("authenticated".into()),
            aud: "authenticated".into(),
            iat: now,
            exp: now + 3600,
        }
    }

    #[test]
    fn test_validate_good_token() {
        let validator = TokenValidator::new(&test_config());
        let id = Uuid::new_v4();
        let user = validator.validate(&mint(&valid_claims(&id.to_string()))).unwrap();

        assert_eq!(user.id, id);
        assert_eq!(user.email.as_deref(), Some("user@example.com"));
        assert!(user.is_admin());
        // the single-role claim is merged in
        assert!(user.roles.iter().any(|r| r == "authenticated"));
    }

    #[test]
    fn test_expired_token_maps_to_auth_expired() {
        let validator = TokenValidator::new(&test_config());
        let mut claims = valid_claims(&Uuid::new_v4().to_string());
        claims.exp = chrono::Utc::now().timestamp() - 3600;

        let err = validator.validate(&mint(&claims)).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthExpired);
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let validator = TokenValidator::new(&test_config());
        let mut claims = valid_claims(&Uuid::new_v4().to_string());
        claims.aud = "something-else".into();

        let err = validator.validate(&mint(&claims)).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let validator = TokenValidator::new(&test_config());
        let err = validator.validate(&mint(&valid_claims("not-a-uuid"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthInvalid);
    }

    #[test]
    fn test_bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap_err().code, ErrorCode::AuthRequired);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers).unwrap_err().code, ErrorCode::AuthInvalid);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers).unwrap_err().code, ErrorCode::AuthInvalid);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }
}
