//! Bearer token encoding
//!
//! Tokens use the JWT compact layout: `header.payload.signature`, each
//! segment base64url without padding. Only HS256 is produced or accepted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use keygate_core::config::MIN_SECRET_BYTES;
use keygate_core::{KeygateError, Permission, Result, TokenConfig};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// Claims carried inside a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Account name
    pub name: String,
    /// Granted rank
    pub perm: Permission,
    /// Free-form metadata supplied at issue time
    #[serde(default)]
    pub ext: String,
    /// Unique token id
    pub jti: String,
    /// Issue time, Unix seconds
    pub iat: u64,
    /// Expiry, Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl TokenClaims {
    /// Whether the token has expired at `now` (Unix seconds)
    pub fn is_expired(&self, now: u64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }
}

/// Reasons a token fails to decode
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Wrong number of dot-separated segments
    #[error("token must have 3 segments, found {0}")]
    Segments(usize),

    /// A segment is not unpadded base64url
    #[error("token {segment} is not base64url: {message}")]
    Encoding {
        /// `header`, `payload` or `signature`
        segment: &'static str,
        /// Decoder message
        message: String,
    },

    /// A segment decoded but is not the expected JSON
    #[error("token {segment} is not valid json: {message}")]
    Json {
        /// `header` or `payload`
        segment: &'static str,
        /// Parser message
        message: String,
    },

    /// Header names an algorithm other than HS256
    #[error("unsupported token algorithm {0}")]
    Algorithm(String),

    /// Signature does not match the secret
    #[error("token signature mismatch")]
    Signature,
}

impl From<CodecError> for KeygateError {
    fn from(err: CodecError) -> Self {
        KeygateError::unauthenticated(err.to_string())
    }
}

/// Token signing capability
pub trait TokenCodec: Send + Sync {
    /// Sign `claims` into a bearer string
    fn encode(&self, claims: &TokenClaims) -> Result<String>;

    /// Check the signature of `token` and return its claims
    fn decode(&self, token: &str) -> std::result::Result<TokenClaims, CodecError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// HMAC-SHA256 codec
#[derive(Clone)]
pub struct HmacTokenCodec {
    secret: Vec<u8>,
}

impl fmt::Debug for HmacTokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacTokenCodec")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl HmacTokenCodec {
    /// Codec signing with `secret`
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Codec with a fresh random secret. Tokens do not survive a restart.
    pub fn random() -> Self {
        let mut secret = vec![0u8; MIN_SECRET_BYTES];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(secret)
    }

    /// Codec for the configured secret, or a random one when none is set
    pub fn from_config(config: &TokenConfig) -> Result<Self> {
        Ok(match config.secret_bytes()? {
            Some(secret) => Self::new(secret),
            None => {
                tracing::warn!("no token secret configured, generated a random one");
                Self::random()
            }
        })
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| KeygateError::internal(format!("hmac key rejected: {e}")))?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| KeygateError::serialization(format!("token encoding failed: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment(segment: &'static str, text: &str) -> std::result::Result<Vec<u8>, CodecError> {
    URL_SAFE_NO_PAD
        .decode(text)
        .map_err(|e| CodecError::Encoding {
            segment,
            message: e.to_string(),
        })
}

fn decode_json<T: for<'de> Deserialize<'de>>(
    segment: &'static str,
    text: &str,
) -> std::result::Result<T, CodecError> {
    let bytes = decode_segment(segment, text)?;
    serde_json::from_slice(&bytes).map_err(|e| CodecError::Json {
        segment,
        message: e.to_string(),
    })
}

impl TokenCodec for HmacTokenCodec {
    fn encode(&self, claims: &TokenClaims) -> Result<String> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };
        let signing_input = format!("{}.{}", encode_json(&header)?, encode_json(claims)?);
        let signature = self.mac(&signing_input)?.finalize().into_bytes();
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    fn decode(&self, token: &str) -> std::result::Result<TokenClaims, CodecError> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header_text, payload_text, signature_text] = segments.as_slice() else {
            return Err(CodecError::Segments(segments.len()));
        };

        let header: Header = decode_json("header", header_text)?;
        if header.alg != ALGORITHM {
            return Err(CodecError::Algorithm(header.alg));
        }

        let signature = decode_segment("signature", signature_text)?;
        self.mac(&format!("{header_text}.{payload_text}"))
            .map_err(|_| CodecError::Signature)?
            .verify_slice(&signature)
            .map_err(|_| CodecError::Signature)?;

        decode_json("payload", payload_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn claims() -> TokenClaims {
        TokenClaims {
            name: "bob".to_string(),
            perm: Permission::Write,
            ext: String::new(),
            jti: "0001".to_string(),
            iat: 1_700_000_000,
            exp: None,
        }
    }

    #[test]
    fn test_encode_decode() {
        let codec = HmacTokenCodec::new(vec![7u8; 32]);
        let token = codec.encode(&claims()).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(codec.decode(&token).unwrap(), claims());
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = HmacTokenCodec::new(vec![7u8; 32])
            .encode(&claims())
            .unwrap();
        let other = HmacTokenCodec::new(vec![8u8; 32]);
        assert_matches!(other.decode(&token), Err(CodecError::Signature));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let codec = HmacTokenCodec::new(vec![7u8; 32]);
        let token = codec.encode(&claims()).unwrap();

        let mut admin = claims();
        admin.perm = Permission::Admin;
        let forged_payload = encode_json(&admin).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_matches!(codec.decode(&forged), Err(CodecError::Signature));
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = HmacTokenCodec::random();
        assert_matches!(codec.decode(""), Err(CodecError::Segments(1)));
        assert_matches!(codec.decode("a.b"), Err(CodecError::Segments(2)));
        assert_matches!(
            codec.decode("!!.e30.e30"),
            Err(CodecError::Encoding { segment: "header", .. })
        );
        // `e30` is `{}`
        assert_matches!(
            codec.decode("e30.e30.e30"),
            Err(CodecError::Json { segment: "header", .. })
        );
    }

    #[test]
    fn test_foreign_algorithm_rejected() {
        let codec = HmacTokenCodec::random();
        let header = encode_json(&Header {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        })
        .unwrap();
        let token = format!("{header}.{}.", encode_json(&claims()).unwrap());
        assert_matches!(codec.decode(&token), Err(CodecError::Algorithm(alg)) if alg == "none");
    }

    #[test]
    fn test_expiry() {
        let mut c = claims();
        assert!(!c.is_expired(u64::MAX));
        c.exp = Some(100);
        assert!(!c.is_expired(99));
        assert!(c.is_expired(100));
    }

    #[test]
    fn test_codec_error_is_unauthenticated() {
        let err: KeygateError = CodecError::Signature.into();
        assert_matches!(err, KeygateError::Unauthenticated { .. });
    }

    #[test]
    fn test_debug_hides_secret() {
        let codec = HmacTokenCodec::new(b"super-secret-value-0123456789abcd".to_vec());
        assert!(!format!("{codec:?}").contains("super-secret"));
    }
}
