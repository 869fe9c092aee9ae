// Email-verification link tokens.
//
// The verification email carries a compact HS256 token signed with the
// redirect secret. Only HS256 is accepted; `exp` is enforced when the token
// carries one.

use std::collections::HashSet;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{keys, LiveSnapshot};

/// Identity-provider account the verification applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Claims carried by a verification link token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireClaims")]
pub struct VerificationClaims {
    pub sub: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Accepts the older flat `provider` claim alongside the nested `identity` object.
#[derive(Deserialize)]
struct WireClaims {
    sub: String,
    email: String,
    #[serde(default)]
    identity: Option<IdentityRef>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
}

impl From<WireClaims> for VerificationClaims {
    fn from(wire: WireClaims) -> Self {
        let identity = match (wire.identity, wire.provider) {
            (Some(identity), None) => Some(identity),
            (None, None) => None,
            (identity, Some(provider)) => {
                tracing::warn!(
                    "Verification token for '{}' uses deprecated flat 'provider' claim",
                    wire.sub
                );
                let mut identity = identity.unwrap_or(IdentityRef {
                    user_id: None,
                    provider: None,
                });
                identity.provider.get_or_insert(provider);
                Some(identity)
            }
        };

        Self {
            sub: wire.sub,
            email: wire.email,
            identity,
            iat: wire.iat,
            exp: wire.exp,
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenVerificationError {
    #[error("Missing secret key")]
    MissingSecret,

    #[error("Token is required")]
    EmptyToken,

    #[error("Token verification failed: token expired")]
    Expired,

    #[error("Token verification failed: {0}")]
    Invalid(String),
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // Links may be issued without exp; when present it is still checked.
    validation.required_spec_claims = HashSet::new();
    validation.validate_aud = false;
    validation
}

/// Verify a link token against the redirect secret held in live configuration.
pub fn verify_and_decode_token(
    token: &str,
    config: &LiveSnapshot,
) -> Result<VerificationClaims, TokenVerificationError> {
    let secret = config
        .get(keys::MY_REDIRECT_SECRET)
        .ok_or(TokenVerificationError::MissingSecret)?;
    verify_with_secret(token, secret)
}

pub fn verify_with_secret(
    token: &str,
    secret: &str,
) -> Result<VerificationClaims, TokenVerificationError> {
    if secret.is_empty() {
        return Err(TokenVerificationError::MissingSecret);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenVerificationError::EmptyToken);
    }

    let key = DecodingKey::from_secret(secret.as_bytes());
    decode::<VerificationClaims>(token, &key, &validation())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenVerificationError::Expired,
            _ => TokenVerificationError::Invalid(e.to_string()),
        })
}

/// Sign claims into a link token
pub fn issue_token(
    claims: &VerificationClaims,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Utc;
    use serde_json::json;

    const SECRET: &str = "redirect-secret";

    fn claims() -> VerificationClaims {
        VerificationClaims {
            sub: "auth0|abc123".to_string(),
            email: "worker@example.com".to_string(),
            identity: Some(IdentityRef {
                user_id: Some("abc123".to_string()),
                provider: Some("auth0".to_string()),
            }),
            iat: Some(Utc::now().timestamp()),
            exp: None,
        }
    }

    fn sign_raw(payload: serde_json::Value, secret: &str) -> String {
        let key = EncodingKey::from_secret(secret.as_bytes());
        encode(&Header::new(Algorithm::HS256), &payload, &key).unwrap()
    }

    #[test]
    fn round_trip_returns_embedded_claims() {
        let original = claims();
        let token = issue_token(&original, SECRET).unwrap();
        assert_eq!(verify_with_secret(&token, SECRET).unwrap(), original);
    }

    #[test]
    fn flat_claims_without_identity_round_trip() {
        let original = VerificationClaims {
            identity: None,
            iat: None,
            ..claims()
        };
        let token = issue_token(&original, SECRET).unwrap();
        assert_eq!(verify_with_secret(&token, SECRET).unwrap(), original);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(&claims(), "other-secret").unwrap();
        let err = verify_with_secret(&token, SECRET).unwrap_err();
        assert!(matches!(err, TokenVerificationError::Invalid(_)));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = issue_token(&claims(), SECRET).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD
            .encode(json!({"sub": "auth0|admin", "email": "admin@example.com"}).to_string());
        let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);

        assert!(matches!(
            verify_with_secret(&tampered, SECRET),
            Err(TokenVerificationError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        for token in ["not-a-token", "a.b", "a.b.c", "...."] {
            assert!(
                matches!(
                    verify_with_secret(token, SECRET),
                    Err(TokenVerificationError::Invalid(_))
                ),
                "accepted {:?}",
                token
            );
        }
        assert!(matches!(
            verify_with_secret("   ", SECRET),
            Err(TokenVerificationError::EmptyToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected_when_exp_present() {
        let expired = VerificationClaims {
            exp: Some(Utc::now().timestamp() - 3600),
            ..claims()
        };
        let token = issue_token(&expired, SECRET).unwrap();
        assert!(matches!(verify_with_secret(&token, SECRET), Err(TokenVerificationError::Expired)));

        let fresh = VerificationClaims {
            exp: Some(Utc::now().timestamp() + 3600),
            ..claims()
        };
        let token = issue_token(&fresh, SECRET).unwrap();
        assert_eq!(verify_with_secret(&token, SECRET).unwrap(), fresh);
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims(),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            verify_with_secret(&token, SECRET),
            Err(TokenVerificationError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn missing_secret_is_reported() {
        let token = issue_token(&claims(), SECRET).unwrap();
        assert!(matches!(
            verify_with_secret(&token, ""),
            Err(TokenVerificationError::MissingSecret)
        ));

        let snapshot = crate::config::LiveConfig::default().snapshot().await;
        assert!(matches!(
            verify_and_decode_token(&token, &snapshot),
            Err(TokenVerificationError::MissingSecret)
        ));
    }

    #[test]
    fn legacy_flat_provider_is_folded_into_identity() {
        let token = sign_raw(
            json!({
                "sub": "google-oauth2|42",
                "email": "a@example.com",
                "provider": "google-oauth2"
            }),
            SECRET,
        );
        let decoded = verify_with_secret(&token, SECRET).unwrap();
        assert_eq!(
            decoded.identity,
            Some(IdentityRef {
                user_id: None,
                provider: Some("google-oauth2".to_string()),
            })
        );
    }

    #[test]
    fn missing_required_claims_are_rejected() {
        let token = sign_raw(json!({"sub": "auth0|abc"}), SECRET);
        assert!(matches!(
            verify_with_secret(&token, SECRET),
            Err(TokenVerificationError::Invalid(_))
        ));
    }
}
