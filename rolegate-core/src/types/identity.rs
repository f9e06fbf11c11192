//! Identity of the party behind a request

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifiers resolved for one request.
///
/// `tenant_id` scopes the lookup; it is never an actor on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Tenant the request runs under
    pub tenant_id: Option<String>,
    /// Authenticated user
    pub user_id: Option<String>,
    /// Authenticated API client
    pub client_id: Option<String>,
}

impl Identity {
    /// Identity with no identifiers at all
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Set the tenant
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Set the user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the client
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// The acting party: a user wins over a client, a client over nobody.
    pub fn actor(&self) -> Actor<'_> {
        if let Some(user) = &self.user_id {
            Actor::User(user)
        } else if let Some(client) = &self.client_id {
            Actor::Client(client)
        } else {
            Actor::Anonymous
        }
    }

    /// Tenant as a borrowed str
    pub fn tenant(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}

/// Diagnostic form used in log lines, e.g. `tenantid:t1 userid:u1`.
impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tenant) = &self.tenant_id {
            write!(f, "tenantid:{} ", tenant)?;
        }
        write!(f, "{}", self.actor())
    }
}

/// The party whose roles decide a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor<'a> {
    /// Roles come from the user's assignments
    User(&'a str),
    /// Roles come from the client's assignments
    Client(&'a str),
    /// Roles come from the anonymous default
    Anonymous,
}

impl Actor<'_> {
    /// Short kind label
    pub fn kind(&self) -> ActorKind {
        match self {
            Actor::User(_) => ActorKind::User,
            Actor::Client(_) => ActorKind::Client,
            Actor::Anonymous => ActorKind::Anonymous,
        }
    }
}

impl fmt::Display for Actor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::User(id) => write!(f, "userid:{}", id),
            Actor::Client(id) => write!(f, "clientid:{}", id),
            Actor::Anonymous => write!(f, "ANONYMOUS"),
        }
    }
}

/// Which lookup path an actor selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    /// Human user
    User,
    /// API client or service
    Client,
    /// No credentials
    Anonymous,
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorKind::User => write!(f, "user"),
            ActorKind::Client => write!(f, "client"),
            ActorKind::Anonymous => write!(f, "anonymous"),
        }
    }
}
