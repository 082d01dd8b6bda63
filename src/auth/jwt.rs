use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{auth::claims::Claims, auth::error::AuthError, config::JwtConfig, state::AppState};

/// Why a presented token was rejected. Clients only ever see
/// `AuthError::Unauthenticated`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature, issuer or audience does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token could not be decoded")]
    Malformed,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64).saturating_mul(60)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, user_id: Uuid, now: OffsetDateTime) -> Result<String, AuthError> {
        let exp = TimeDuration::try_from(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| {
                AuthError::Internal(anyhow::anyhow!(
                    "token lifetime of {}s is out of range",
                    self.ttl.as_secs()
                ))
            })?;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(anyhow::Error::new(e).context("jwt encode")))?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// Valid while `now < exp`, with no leeway.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        // expiry is checked below against the caller's clock
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            let err = match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            };
            debug!(error = %e, reason = ?err, "jwt rejected");
            err
        })?;

        if now.unix_timestamp() >= data.claims.exp {
            debug!(user_id = %data.claims.sub, "jwt expired");
            return Err(TokenError::Expired);
        }
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 60 * 24 * 30,
        })
    }

    #[test]
    fn issue_and_verify_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id).expect("sign token");
        assert_eq!(keys.verify(&token), Ok(user_id));
    }

    #[test]
    fn token_valid_until_expiry_boundary() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let user_id = Uuid::new_v4();
        let issued = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let ttl = TimeDuration::seconds(keys.ttl().as_secs() as i64);
        let token = keys.issue_at(user_id, issued).unwrap();

        assert_eq!(keys.verify_at(&token, issued), Ok(user_id));
        assert_eq!(
            keys.verify_at(&token, issued + ttl - TimeDuration::seconds(1)),
            Ok(user_id)
        );
        assert_eq!(keys.verify_at(&token, issued + ttl), Err(TokenError::Expired));
        assert_eq!(
            keys.verify_at(&token, issued + ttl + TimeDuration::days(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn default_lifetime_is_thirty_days() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert_eq!(keys.ttl(), Duration::from_secs(30 * 24 * 60 * 60));
    }

    #[test]
    fn oversized_lifetime_fails_instead_of_overflowing() {
        let keys = JwtKeys::new(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 1_000_000_000_000,
        });
        let err = keys.issue(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));

        let keys = JwtKeys::new(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: i64::MAX,
        });
        assert!(keys.issue(Uuid::new_v4()).is_err());
    }

    #[test]
    fn verify_rejects_foreign_secret() {
        let ours = make_keys("our-secret", "iss", "aud");
        let theirs = make_keys("their-secret", "iss", "aud");
        let token = theirs.issue(Uuid::new_v4()).unwrap();
        assert_eq!(ours.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("same-secret", "good-iss", "good-aud");
        let bad_keys = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good_keys.issue(Uuid::new_v4()).unwrap();
        assert_eq!(bad_keys.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.issue(Uuid::new_v4()).unwrap();
        let other = keys.issue(Uuid::new_v4()).unwrap();
        // splice the payload of one token onto the signature of another
        let mut parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        parts[1] = other_parts[1];
        let forged = parts.join(".");
        assert_eq!(keys.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn verify_rejects_garbage() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert_eq!(keys.verify("not-a-jwt"), Err(TokenError::Malformed));
        assert_eq!(keys.verify(""), Err(TokenError::Malformed));
    }
}
