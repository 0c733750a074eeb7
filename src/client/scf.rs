//! Cloud Foundry (SCF) organization manager API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ApiResult, ProjectRef};

/// The technical manager user of a Cloud Foundry organization.
///
/// The password is only part of the create response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgManager {
    /// User GUID.
    pub guid: Option<String>,
    /// Organization GUID.
    pub org_id: Option<String>,
    /// Platform id.
    pub platform_id: Option<String>,
    /// Project id.
    pub project_id: Option<String>,
    /// Region.
    pub region: Option<String>,
    /// Username.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Creation timestamp.
    pub created_at: Option<String>,
    /// Last update timestamp.
    pub updated_at: Option<String>,
}

/// Cloud Foundry organization managers.
#[async_trait]
pub trait ScfApi: Send + Sync {
    /// Create the manager of an organization.
    async fn create_org_manager(&self, project: &ProjectRef, org_id: &str) -> ApiResult<OrgManager>;

    /// Get the manager of an organization.
    async fn get_org_manager(&self, project: &ProjectRef, org_id: &str) -> ApiResult<OrgManager>;

    /// Delete the manager of an organization.
    async fn delete_org_manager(&self, project: &ProjectRef, org_id: &str) -> ApiResult<()>;
}
