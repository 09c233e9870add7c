use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;

pub mod cookies;

/// Access/refresh credential pair as issued by the backend.
///
/// The refresh token is optional on the wire: the backend only includes one
/// when it rotates the credential, and callers must keep the old cookie
/// otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Claims carried by an AIMesh access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn has_any_role(&self, allowed: &[&str]) -> bool {
        self.roles.iter().any(|role| allowed.contains(&role.as_str()))
    }
}

/// Verifies access-token signatures against the configured public key.
///
/// The decoding key is parsed from PEM once, on the first verification, and
/// cached for the lifetime of the verifier. Key rotation is an explicit
/// lifecycle event: swap the PEM and call [`TokenVerifier::invalidate_key`],
/// nothing reloads implicitly.
pub struct TokenVerifier {
    public_key_pem: String,
    issuer: String,
    leeway_secs: u64,
    key: OnceCell<DecodingKey>,
}

impl TokenVerifier {
    pub fn new(auth: &AuthConfig) -> Self {
        Self::from_parts(
            auth.jwt_public_key.clone(),
            auth.jwt_issuer.clone(),
            auth.clock_leeway_secs,
        )
    }

    pub fn from_parts(public_key_pem: String, issuer: String, leeway_secs: u64) -> Self {
        Self {
            public_key_pem,
            issuer,
            leeway_secs,
            key: OnceCell::new(),
        }
    }

    fn decoding_key(&self) -> Option<&DecodingKey> {
        self.key
            .get_or_try_init(|| DecodingKey::from_rsa_pem(self.public_key_pem.as_bytes()))
            .map_err(|e| tracing::error!("invalid JWT public key: {}", e))
            .ok()
    }

    /// Verify a bearer token and return its claims.
    ///
    /// Every failure mode (malformed token, bad signature, expiry beyond the
    /// clock leeway, wrong issuer, missing key) collapses to `None` so callers
    /// have a single "unauthenticated" branch. This never panics or returns
    /// an error.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        let key = self.decoding_key()?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.leeway = self.leeway_secs;

        match decode::<Claims>(token, key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!("access token rejected: {}", e);
                None
            }
        }
    }

    /// Replace the verification key, e.g. after a signing-key rotation.
    /// The next call to [`TokenVerifier::verify`] re-parses the PEM.
    pub fn rotate_key(&mut self, public_key_pem: String) {
        self.public_key_pem = public_key_pem;
        self.invalidate_key();
    }

    /// Drop the cached decoding key without replacing the PEM.
    pub fn invalidate_key(&mut self) {
        self.key.take();
    }
}
