//! Per-request execution context
//!
//! A [`RequestContext`] is passed explicitly into every authorization-sensitive
//! call. Attaching a caller produces a derived copy; the context it was
//! derived from is never mutated.

use crate::{KeygateError, Permission, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Caller-supplied request metadata recorded by the verification audit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    /// Caller network origin
    pub ip: Option<String>,
    /// Trace/span identifier forwarded by the caller
    pub span_id: Option<String>,
    /// Upstream host the request passed through
    pub pre_host: Option<String>,
    /// Name of the calling service
    pub svc_name: Option<String>,
}

impl RequestMeta {
    /// Metadata carrying only the caller address
    pub fn from_ip(ip: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            ..Self::default()
        }
    }

    /// Set the span identifier
    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    /// Set the upstream host
    pub fn with_pre_host(mut self, pre_host: impl Into<String>) -> Self {
        self.pre_host = Some(pre_host.into());
        self
    }

    /// Set the calling service name
    pub fn with_svc_name(mut self, svc_name: impl Into<String>) -> Self {
        self.svc_name = Some(svc_name.into());
        self
    }
}

/// Immutable per-request context
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    meta: RequestMeta,
    identity: Option<Arc<str>>,
    permissions: Option<Arc<[Permission]>>,
}

impl RequestContext {
    /// Unauthenticated context for a request with the given metadata
    pub fn new(meta: RequestMeta) -> Self {
        Self {
            meta,
            identity: None,
            permissions: None,
        }
    }

    /// Context for trusted in-process operators, holding every permission
    pub fn local_admin() -> Self {
        Self::default()
            .with_identity("local")
            .with_permissions(Permission::Admin.expand())
    }

    /// Derive a context carrying `permissions`
    pub fn with_permissions(&self, permissions: impl Into<Arc<[Permission]>>) -> Self {
        Self {
            permissions: Some(permissions.into()),
            ..self.clone()
        }
    }

    /// Derive a context carrying the caller identity
    pub fn with_identity(&self, name: impl Into<Arc<str>>) -> Self {
        Self {
            identity: Some(name.into()),
            ..self.clone()
        }
    }

    /// Request metadata
    pub fn meta(&self) -> &RequestMeta {
        &self.meta
    }

    /// Caller identity, if authenticated
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Attached permission sequence; `None` means unauthenticated
    pub fn permissions(&self) -> Option<&[Permission]> {
        self.permissions.as_deref()
    }

    /// Whether the attached permissions include `permission`
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions()
            .is_some_and(|perms| perms.contains(&permission))
    }

    /// Require `permission`, distinguishing an unauthenticated caller from
    /// an authenticated one lacking the rank.
    pub fn require(&self, permission: Permission) -> Result<()> {
        match self.permissions() {
            None => Err(KeygateError::unauthenticated(
                "no permissions attached to request",
            )),
            Some(perms) if perms.contains(&permission) => Ok(()),
            Some(_) => Err(KeygateError::forbidden(format!(
                "{} lacks permission {permission}",
                self.identity().unwrap_or("caller")
            ))),
        }
    }
}
