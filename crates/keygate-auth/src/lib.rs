//! # Keygate Auth
//!
//! Bearer tokens for Keygate: the [`TokenCodec`] signing capability and its
//! HMAC-SHA256 implementation, the [`TokenVerifier`] that turns a token into
//! a caller identity and permission set, the verification audit trail, and
//! the [`TokenService`] registry of issued tokens.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod audit;
pub mod codec;
pub mod tokens;
pub mod verifier;

pub use audit::{AuditSeverity, AuditSink, RecordingAuditSink, TracingAuditSink, VerifyAudit};
pub use codec::{CodecError, HmacTokenCodec, TokenClaims, TokenCodec};
pub use tokens::TokenService;
pub use verifier::{TokenVerifier, VerifiedCaller};
