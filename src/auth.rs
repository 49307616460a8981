//! HTTP basic-auth owner resolution
//!
//! Verifies `Authorization: Basic ...` credentials against the configured
//! user table and resolves the caller to an owner id: the lower-hex SHA-256
//! of their email. Handlers never see the email itself.

use crate::api::ApiError;
use crate::config::AuthConfig;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Authenticated owner, attached to the request by [`require_auth`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl Owner {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Outcome of an authentication check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Credentials matched a configured user.
    Authenticated {
        /// Hashed owner id.
        owner_id: String,
    },
    /// Request failed authentication.
    Rejected {
        /// Human-readable reason for rejection (logged, not returned).
        reason: String,
    },
}

/// Stable owner id for an email address
pub fn hash_owner(email: &str) -> String {
    hex_encode(&Sha256::digest(normalize_email(email).as_bytes()))
}

/// Emails are compared and hashed without surrounding whitespace
fn normalize_email(email: &str) -> &str {
    email.trim()
}

/// Basic-auth verifier over a fixed user table
#[derive(Debug, Clone)]
pub struct BasicAuth {
    realm: String,
    /// email -> SHA-256 of password
    users: HashMap<String, [u8; 32]>,
}

impl BasicAuth {
    pub fn new(config: &AuthConfig) -> Self {
        let users = config
            .users
            .iter()
            .map(|u| {
                (
                    normalize_email(&u.email).to_string(),
                    password_digest(&u.password),
                )
            })
            .collect();
        Self {
            realm: config.realm.clone(),
            users,
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Verify the value of an `Authorization` header
    pub fn verify(&self, authorization: Option<&str>) -> AuthOutcome {
        let Some(value) = authorization else {
            return AuthOutcome::Rejected {
                reason: "missing authorization header".into(),
            };
        };
        let Some(encoded) = value
            .strip_prefix("Basic ")
            .or_else(|| value.strip_prefix("basic "))
        else {
            return AuthOutcome::Rejected {
                reason: "unsupported authorization scheme".into(),
            };
        };
        let decoded = match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(_) => {
                return AuthOutcome::Rejected {
                    reason: "invalid base64 credentials".into(),
                }
            }
        };
        let Ok(credentials) = String::from_utf8(decoded) else {
            return AuthOutcome::Rejected {
                reason: "credentials are not UTF-8".into(),
            };
        };
        let Some((email, password)) = credentials.split_once(':') else {
            return AuthOutcome::Rejected {
                reason: "malformed credentials".into(),
            };
        };

        match self.users.get(normalize_email(email)) {
            Some(expected) if *expected == password_digest(password) => {
                AuthOutcome::Authenticated {
                    owner_id: hash_owner(email),
                }
            }
            _ => AuthOutcome::Rejected {
                reason: "invalid email or password".into(),
            },
        }
    }
}

/// Middleware: reject unauthenticated requests, attach [`Owner`] otherwise
pub async fn require_auth(
    State(auth): State<Arc<BasicAuth>>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth.verify(authorization) {
        AuthOutcome::Authenticated { owner_id } => {
            request.extensions_mut().insert(Owner(owner_id));
            next.run(request).await
        }
        AuthOutcome::Rejected { reason } => {
            tracing::warn!(path = %request.uri().path(), "Authentication rejected: {}", reason);
            let mut response =
                ApiError::new(StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
            if let Ok(challenge) =
                HeaderValue::from_str(&format!("Basic realm=\"{}\"", auth.realm()))
            {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, challenge);
            }
            response
        }
    }
}

fn password_digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
