use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

pub const SUPABASE_AUDIENCE: &str = "authenticated";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Verified caller, inserted into request extensions by [`crate::require_auth`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The raw bearer token, forwarded to PostgREST so row-level security
    /// applies.
    pub token: String,
    pub claims: Claims,
}

/// Verifies Supabase session tokens (HS256, signed with the project's JWT
/// secret).
#[derive(Clone)]
pub struct AuthState {
    key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl AuthState {
    pub fn new(jwt_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[SUPABASE_AUDIENCE]);

        Self {
            key: Arc::new(DecodingKey::from_secret(jwt_secret.as_bytes())),
            validation: Arc::new(validation),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

/// Shared secret for the worker and reclaim triggers.
#[derive(Clone)]
pub struct WorkerKey {
    key: Arc<str>,
}

impl WorkerKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self {
            key: Arc::from(key.as_ref()),
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.key.as_bytes();
        let candidate = candidate.as_bytes();
        if expected.is_empty() || expected.len() != candidate.len() {
            return false;
        }
        expected
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
