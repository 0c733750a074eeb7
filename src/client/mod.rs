//! Remote API collaborators.
//!
//! The provider does not ship REST clients. Each service is described by an
//! async trait returning typed wire structs, and a [`ClientFactory`] builds
//! the implementations from the resolved [`ProviderData`]. Wait handlers are
//! part of the same traits (`wait_*` methods): they block until the remote
//! operation reaches a terminal state or fail with [`ApiError::Timeout`].

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ProviderData;
use crate::error::ProviderError;

pub mod dsa;
pub mod iaas;
pub mod loadbalancer;
pub mod postgresflex;
pub mod scf;

pub use dsa::{DsaApi, MariaDbApi, RabbitMqApi};
pub use iaas::RoutingTableApi;
pub use loadbalancer::LoadBalancerApi;
pub use postgresflex::PostgresFlexApi;
pub use scf::ScfApi;

/// Timeout used for create and update wait handlers.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Timeout used for delete wait handlers.
pub const DELETE_WAIT_TIMEOUT: Duration = Duration::from_secs(45 * 60);

/// Errors returned by API collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The API answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// A wait handler gave up.
    #[error("{operation} did not finish within {after:?}")]
    Timeout {
        /// The awaited operation.
        operation: String,
        /// How long the handler waited.
        after: Duration,
    },

    /// The request never got an answer.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Build an HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// The HTTP status, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 404 Not Found or 410 Gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404) | Some(410))
    }

    /// 403 Forbidden.
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }
}

/// Address of a project in a region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectRef {
    /// Project id.
    pub project_id: String,
    /// Region.
    pub region: String,
}

impl ProjectRef {
    /// Build a project address.
    pub fn new(project_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: region.into(),
        }
    }

    /// Address of an instance in this project.
    pub fn instance(&self, instance_id: impl Into<String>) -> InstanceRef {
        InstanceRef {
            project: self.clone(),
            instance_id: instance_id.into(),
        }
    }
}

/// Address of a service instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    /// Owning project.
    pub project: ProjectRef,
    /// Instance id.
    pub instance_id: String,
}

/// Result of a collaborator call.
pub type ApiResult<T> = Result<T, ApiError>;

/// Builds API clients from provider settings.
///
/// Called once per resource or data source when the provider is configured.
pub trait ClientFactory: Send + Sync {
    /// IaaS routing table client.
    fn routing_tables(&self, data: &ProviderData) -> Result<Arc<dyn RoutingTableApi>, ProviderError>;

    /// PostgreSQL Flex client.
    fn postgres_flex(&self, data: &ProviderData) -> Result<Arc<dyn PostgresFlexApi>, ProviderError>;

    /// RabbitMQ client.
    fn rabbitmq(&self, data: &ProviderData) -> Result<Arc<RabbitMqApi>, ProviderError>;

    /// MariaDB client.
    fn mariadb(&self, data: &ProviderData) -> Result<Arc<MariaDbApi>, ProviderError>;

    /// Load Balancer client.
    fn load_balancer(&self, data: &ProviderData) -> Result<Arc<dyn LoadBalancerApi>, ProviderError>;

    /// Cloud Foundry client.
    fn scf(&self, data: &ProviderData) -> Result<Arc<dyn ScfApi>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_statuses() {
        assert!(ApiError::http(404, "").is_not_found());
        assert!(ApiError::http(410, "").is_not_found());
        assert!(!ApiError::http(403, "").is_not_found());
        assert!(ApiError::http(403, "").is_forbidden());
        assert!(!ApiError::Transport("reset".into()).is_not_found());
    }

    #[test]
    fn test_display() {
        let err = ApiError::Timeout {
            operation: "instance deletion".into(),
            after: DELETE_WAIT_TIMEOUT,
        };
        assert_eq!(err.to_string(), "instance deletion did not finish within 2700s");
    }
}
