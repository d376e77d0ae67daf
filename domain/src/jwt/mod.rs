//! Issues and verifies the signed credentials clients present as bearer tokens.
//!
//! A credential is an HS256 JSON Web Token signed with the process-wide secret.
//! It carries the subject id, the subject's role at issuance, and its issue and
//! expiry times. There is no revocation: a credential stays valid until it
//! expires, whatever happens to the subject in the directory afterwards.
//!
//! # Example
//!
//! ```rust
//! use domain::jwt::CredentialCodec;
//! use domain::user::Role;
//! use std::time::Duration;
//!
//! let codec = CredentialCodec::new(b"secret", Duration::from_secs(60));
//! let subject_id = uuid::Uuid::new_v4();
//! let credential = codec.issue(subject_id, Role::User).unwrap();
//! let identity = codec.verify(&credential.token).unwrap();
//! assert_eq!(identity.subject_id, subject_id);
//! ```

use crate::auth::Identity;
use crate::error::Error;
use crate::user::Role;
use crate::Id;
use chrono::{DateTime, Utc};
use claims::CredentialClaims;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::Serialize;
use service::config::Config;
use std::time::Duration;
use utoipa::ToSchema;

pub(crate) mod claims;

// Only ever used when running in development without JWT_SECRET.
const DEVELOPMENT_SECRET: &str = "qroket-development-secret";

/// A freshly issued credential.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Credential {
    pub token: String,
    #[schema(value_type = String, format = Uuid)]
    pub subject_id: Id,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct CredentialCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: chrono::Duration,
}

impl CredentialCodec {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an explicit clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime: chrono::Duration::from_std(lifetime)
                .unwrap_or_else(|_| chrono::Duration::days(36_500)),
        }
    }

    /// Builds the codec from `JWT_SECRET`. Development falls back to a fixed
    /// secret; every other environment refuses to start without one.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret = match config.jwt_secret().filter(|secret| !secret.is_empty()) {
            Some(secret) => secret,
            None if config.is_development() => {
                warn!("JWT_SECRET is not set, signing credentials with the development secret");
                DEVELOPMENT_SECRET.to_string()
            }
            None => {
                error!("JWT_SECRET must be set outside of development");
                return Err(Error::config());
            }
        };

        Ok(Self::new(secret.as_bytes(), config.credential_lifetime()))
    }

    pub fn issue(&self, subject_id: Id, role: Role) -> Result<Credential, Error> {
        self.issue_at(subject_id, role, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject_id: Id,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<Credential, Error> {
        let expires_at = now.checked_add_signed(self.lifetime).ok_or_else(|| {
            error!("Credential lifetime {} overflows from {now}", self.lifetime);
            Error::config()
        })?;
        let claims = CredentialClaims {
            sub: subject_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                error!("Failed to sign credential for {subject_id}: {e}");
                Error::config().with_source(e)
            })?;

        debug!("Issued credential for {subject_id} ({role}), expires at {expires_at}");

        Ok(Credential {
            token,
            subject_id,
            role,
            issued_at: now,
            expires_at,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Identity, Error> {
        self.verify_at(token, Utc::now())
    }

    /// A credential is valid iff its signature verifies and `now < exp`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, Error> {
        let claims = decode::<CredentialClaims>(token, &self.decoding_key, &self.validation)?.claims;

        if claims.exp <= now.timestamp() {
            debug!("Rejected expired credential for {}", claims.sub);
            return Err(Error::unauthenticated());
        }

        let subject_id = claims
            .sub
            .parse::<Id>()
            .map_err(|e| Error::unauthenticated().with_source(e))?;

        Ok(Identity {
            subject_id,
            role: claims.role,
        })
    }
}
