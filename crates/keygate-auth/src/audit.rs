//! Verification audit trail
//!
//! Every call to [`TokenVerifier::verify`](crate::TokenVerifier::verify)
//! produces exactly one [`VerifyAudit`] record, success or failure.

use keygate_core::{KeygateError, RequestMeta};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Method name recorded for token verification
pub const VERIFY_METHOD: &str = "verify";

/// Tracing target of verification events
pub const VERIFY_TARGET: &str = "keygate::verify";

/// Level a record is reported at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditSeverity {
    /// Successful verification
    Trace,
    /// Rejected token
    Error,
}

/// One verification attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAudit {
    /// Audited method
    pub method: &'static str,
    /// Caller address
    pub ip: Option<String>,
    /// Tracing span of the request
    pub span_id: Option<String>,
    /// Forwarding host
    pub pre_host: Option<String>,
    /// Calling service
    pub svc_name: Option<String>,
    /// Time spent verifying
    pub elapsed_ms: u64,
    /// Verified account; absent on failure
    pub name: Option<String>,
    /// Rejection reason; absent on success
    pub error: Option<String>,
}

impl VerifyAudit {
    fn from_meta(meta: &RequestMeta, elapsed_ms: u64) -> Self {
        Self {
            method: VERIFY_METHOD,
            ip: meta.ip.clone(),
            span_id: meta.span_id.clone(),
            pre_host: meta.pre_host.clone(),
            svc_name: meta.svc_name.clone(),
            elapsed_ms,
            name: None,
            error: None,
        }
    }

    /// Record for a token that verified as `name`
    pub fn success(meta: &RequestMeta, elapsed_ms: u64, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::from_meta(meta, elapsed_ms)
        }
    }

    /// Record for a rejected token
    pub fn failure(meta: &RequestMeta, elapsed_ms: u64, error: &KeygateError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::from_meta(meta, elapsed_ms)
        }
    }

    /// `Error` for rejections, `Trace` otherwise
    pub fn severity(&self) -> AuditSeverity {
        if self.error.is_some() {
            AuditSeverity::Error
        } else {
            AuditSeverity::Trace
        }
    }
}

/// Destination for verification records
pub trait AuditSink: Send + Sync {
    /// Record one verification
    fn emit(&self, record: &VerifyAudit);
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn emit(&self, record: &VerifyAudit) {
        (**self).emit(record)
    }
}

/// Emits records as structured `tracing` events on `keygate::verify`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, record: &VerifyAudit) {
        match record.severity() {
            AuditSeverity::Error => tracing::error!(
                target: VERIFY_TARGET,
                method = record.method,
                ip = record.ip.as_deref(),
                span_id = record.span_id.as_deref(),
                pre_host = record.pre_host.as_deref(),
                svc_name = record.svc_name.as_deref(),
                elapsed_ms = record.elapsed_ms,
                error = record.error.as_deref(),
                "token rejected"
            ),
            AuditSeverity::Trace => tracing::trace!(
                target: VERIFY_TARGET,
                method = record.method,
                ip = record.ip.as_deref(),
                span_id = record.span_id.as_deref(),
                pre_host = record.pre_host.as_deref(),
                svc_name = record.svc_name.as_deref(),
                elapsed_ms = record.elapsed_ms,
                name = record.name.as_deref(),
                "token verified"
            ),
        }
    }
}

/// Keeps records in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingAuditSink {
    records: Arc<Mutex<Vec<VerifyAudit>>>,
}

impl RecordingAuditSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn records(&self) -> Vec<VerifyAudit> {
        self.records.lock().clone()
    }

    /// Most recent record
    pub fn last(&self) -> Option<VerifyAudit> {
        self.records.lock().last().cloned()
    }

    /// Drop everything recorded
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl AuditSink for RecordingAuditSink {
    fn emit(&self, record: &VerifyAudit) {
        self.records.lock().push(record.clone());
    }
}
