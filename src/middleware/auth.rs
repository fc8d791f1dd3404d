//! Authentication middleware
//!
//! Checks the caller's bearer credential against the configured proxy secret.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::{error::AppError, AppState};

/// Proof that a request passed the credential gate.
///
/// Produced by [`CredentialGate::verify`]. The gateway requires one before it
/// touches the registry or an upstream.
#[derive(Debug, Clone)]
pub struct Authenticated {
    /// Short fingerprint of the presented credential, for logs
    pub fingerprint: String,
}

/// Validates inbound credentials against a shared secret
#[derive(Clone)]
pub struct CredentialGate {
    secret_digest: Option<[u8; 32]>,
}

impl CredentialGate {
    /// An empty secret rejects every credential
    pub fn new(secret: &str) -> Self {
        Self {
            secret_digest: (!secret.is_empty()).then(|| digest(secret)),
        }
    }

    /// Check a raw `Authorization` header value
    pub fn verify(&self, auth_header: Option<&str>) -> Result<Authenticated, AppError> {
        let expected = self.secret_digest.as_ref().ok_or(AppError::Unauthorized)?;
        let token = auth_header
            .map(extract_bearer_token)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let presented = digest(token);
        if !constant_time_eq(&presented, expected) {
            return Err(AppError::Unauthorized);
        }

        Ok(Authenticated {
            fingerprint: hex::encode(&presented[..4]),
        })
    }
}

impl std::fmt::Debug for CredentialGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialGate")
            .field("configured", &self.secret_digest.is_some())
            .finish()
    }
}

/// Extract the token from an Authorization header.
///
/// Accepts `Bearer <token>` and a bare token.
pub fn extract_bearer_token(auth_header: &str) -> &str {
    let trimmed = auth_header.trim();
    match trimmed.strip_prefix("Bearer ") {
        Some(token) => token.trim(),
        None => trimmed,
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.finalize().into()
}

/// Fixed-length comparison without early exit
fn constant_time_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Authentication middleware
///
/// Rejects the request with 401 before any handler runs, or adds
/// [`Authenticated`] to request extensions.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let proof = match state.gate.verify(auth_header) {
        Ok(proof) => proof,
        Err(e) => {
            warn!(has_header = auth_header.is_some(), "Rejected request with invalid credential");
            return Err(e);
        }
    };

    debug!(fingerprint = %proof.fingerprint, "Caller authenticated");
    request.extensions_mut().insert(proof);

    Ok(next.run(request).await)
}
