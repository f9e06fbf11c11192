//! Identity extraction from inbound requests
//!
//! The guard never inspects credentials itself. Upstream authentication is
//! expected to leave an [`Identity`] in the request extensions; the default
//! extractors read it from there. Hosts with a different layout replace any
//! of the three extractors through a [`HookPatch`](crate::hooks::HookPatch).

use crate::error::{RbacError, RbacResult};
use crate::hooks::Hooks;
use async_trait::async_trait;
use axum::http::request::Parts;
use axum::http::{HeaderName, Method};
use rolegate_core::Identity;
use std::net::SocketAddr;

/// Reads one identifier (tenant, user or client) out of a request.
///
/// Returning `Ok(None)` means "not present"; an `Err` aborts the decision
/// and is handled as a denial under the current enforcement mode.
#[async_trait]
pub trait IdentityExtractor: Send + Sync {
    /// Extract the identifier
    async fn extract(&self, request: &Parts) -> RbacResult<Option<String>>;

    /// Name shown in hook diagnostics
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<F> IdentityExtractor for F
where
    F: Fn(&Parts) -> RbacResult<Option<String>> + Send + Sync,
{
    async fn extract(&self, request: &Parts) -> RbacResult<Option<String>> {
        self(request)
    }
}

/// Fix a synchronous closure's signature so it can serve as an extractor.
pub fn extractor_fn<F>(f: F) -> F
where
    F: Fn(&Parts) -> RbacResult<Option<String>> + Send + Sync + 'static,
{
    f
}

/// Which field of the [`Identity`] extension to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    /// `tenant_id`
    Tenant,
    /// `user_id`
    User,
    /// `client_id`
    Client,
}

/// Default extractor: reads a field of the [`Identity`] request extension.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionExtractor {
    field: IdentityField,
}

impl ExtensionExtractor {
    /// Reads `Identity::tenant_id`
    pub fn tenant() -> Self {
        Self {
            field: IdentityField::Tenant,
        }
    }

    /// Reads `Identity::user_id`
    pub fn user() -> Self {
        Self {
            field: IdentityField::User,
        }
    }

    /// Reads `Identity::client_id`
    pub fn client() -> Self {
        Self {
            field: IdentityField::Client,
        }
    }
}

#[async_trait]
impl IdentityExtractor for ExtensionExtractor {
    async fn extract(&self, request: &Parts) -> RbacResult<Option<String>> {
        let Some(identity) = request.extensions.get::<Identity>() else {
            return Ok(None);
        };
        Ok(match self.field {
            IdentityField::Tenant => identity.tenant_id.clone(),
            IdentityField::User => identity.user_id.clone(),
            IdentityField::Client => identity.client_id.clone(),
        })
    }

    fn name(&self) -> &'static str {
        match self.field {
            IdentityField::Tenant => "extension:tenant",
            IdentityField::User => "extension:user",
            IdentityField::Client => "extension:client",
        }
    }
}

/// Reads an identifier from a request header, e.g. `x-tenant-id`.
#[derive(Debug, Clone)]
pub struct HeaderExtractor {
    header: HeaderName,
}

impl HeaderExtractor {
    /// Extractor for `header`
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }

    /// Parse the header name, rejecting invalid names up front
    pub fn named(header: &str) -> RbacResult<Self> {
        let header = HeaderName::from_bytes(header.as_bytes()).map_err(|e| {
            RbacError::Configuration(format!("Invalid header name '{}': {}", header, e))
        })?;
        Ok(Self::new(header))
    }
}

#[async_trait]
impl IdentityExtractor for HeaderExtractor {
    async fn extract(&self, request: &Parts) -> RbacResult<Option<String>> {
        let Some(value) = request.headers.get(&self.header) else {
            return Ok(None);
        };
        let value = value.to_str().map_err(|_| {
            RbacError::IdentityResolution(format!("header '{}' is not valid UTF-8", self.header))
        })?;
        let value = value.trim();
        if value.is_empty() {
            Ok(None)
        } else {
            Ok(Some(value.to_string()))
        }
    }

    fn name(&self) -> &'static str {
        "header"
    }
}

/// Run the tenant, user and client extractors, in that order.
pub async fn resolve_identity(hooks: &Hooks, request: &Parts) -> RbacResult<Identity> {
    let tenant_id = hooks.tenant.extract(request).await?;
    let user_id = hooks.user.extract(request).await?;
    let client_id = hooks.client.extract(request).await?;

    Ok(Identity {
        tenant_id,
        user_id,
        client_id,
    })
}

/// Request line details carried into denial log entries
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// HTTP method
    pub method: Method,
    /// Request path without the query
    pub path: String,
    /// Remote address, when the server records it
    pub peer: Option<SocketAddr>,
}

impl RequestInfo {
    /// Collect request details from `request`
    pub fn from_parts(request: &Parts) -> Self {
        let peer = request
            .extensions
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map(|info| info.0);
        Self {
            method: request.method.clone(),
            path: request.uri.path().to_string(),
            peer,
        }
    }

    /// Peer address or `-` when the server was not built with connect info
    pub fn peer_label(&self) -> String {
        self.peer
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}
