//! Load Balancer observability credentials API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ApiResult, ProjectRef};

/// A stored observability credential. The password is never returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Reference used by load balancers to point at the credential.
    pub credentials_ref: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Username.
    pub username: Option<String>,
}

/// Envelope of credential responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialResponse {
    /// The credential.
    pub credential: Option<Credential>,
}

/// Body of a credential create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCredentialsPayload {
    /// Display name.
    pub display_name: String,
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Observability credentials of the Load Balancer service.
#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    /// Create a credential. `request_id` is sent as `X-Request-ID` so retries
    /// do not create duplicates.
    async fn create_credentials(
        &self,
        project: &ProjectRef,
        request_id: &str,
        payload: CreateCredentialsPayload,
    ) -> ApiResult<CredentialResponse>;

    /// Get a credential.
    async fn get_credentials(&self, project: &ProjectRef, credentials_ref: &str) -> ApiResult<CredentialResponse>;

    /// Delete a credential.
    async fn delete_credentials(&self, project: &ProjectRef, credentials_ref: &str) -> ApiResult<()>;
}
