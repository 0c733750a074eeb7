//! PostgreSQL Flex API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ApiResult, InstanceRef, ProjectRef};

/// Instance access control list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    /// Allowed CIDR ranges.
    pub items: Option<Vec<String>>,
}

/// Compute flavor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    /// Flavor id.
    pub id: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Number of CPUs.
    pub cpu: Option<i64>,
    /// Memory in GB.
    pub memory: Option<i64>,
}

/// Instance storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    /// Storage class.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Size in GB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

/// A PostgreSQL Flex instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Instance id.
    pub id: Option<String>,
    /// Name.
    pub name: Option<String>,
    /// Access control list.
    pub acl: Option<Acl>,
    /// Backup cron schedule.
    pub backup_schedule: Option<String>,
    /// Flavor.
    pub flavor: Option<Flavor>,
    /// Number of replicas.
    pub replicas: Option<i32>,
    /// Storage.
    pub storage: Option<Storage>,
    /// PostgreSQL version.
    pub version: Option<String>,
    /// Lifecycle status.
    pub status: Option<String>,
}

/// Envelope of a get-instance call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceResponse {
    /// The instance.
    pub item: Option<Instance>,
}

/// Body of an instance create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstancePayload {
    /// Name.
    pub name: String,
    /// Access control list.
    pub acl: Acl,
    /// Backup cron schedule.
    pub backup_schedule: String,
    /// Flavor id.
    pub flavor_id: String,
    /// Number of replicas.
    pub replicas: i32,
    /// Storage.
    pub storage: Storage,
    /// PostgreSQL version.
    pub version: String,
}

/// Response of an instance create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInstanceResponse {
    /// Id of the new instance.
    pub id: Option<String>,
}

/// Body of an instance partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialUpdateInstancePayload {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New access control list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<Acl>,
    /// New backup schedule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_schedule: Option<String>,
    /// New flavor id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor_id: Option<String>,
    /// New replica count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// New storage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<Storage>,
    /// New version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Available flavors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFlavorsResponse {
    /// The flavors.
    pub flavors: Option<Vec<Flavor>>,
}

/// A database inside an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    /// Database id.
    pub id: Option<String>,
    /// Database name.
    pub name: Option<String>,
    /// Free-form options; the owner is stored under `owner`.
    pub options: Option<BTreeMap<String, serde_json::Value>>,
}

impl Database {
    /// The owning role, if the API reported one.
    pub fn owner(&self) -> Option<&str> {
        self.options.as_ref()?.get("owner")?.as_str()
    }
}

/// One page of databases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDatabasesResponse {
    /// Databases on this page.
    pub databases: Option<Vec<Database>>,
    /// Total number of pages, when the API reports it.
    pub total_pages: Option<u32>,
}

/// Body of a database create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDatabasePayload {
    /// Database name.
    pub name: String,
    /// Options, carrying the owner.
    pub options: BTreeMap<String, String>,
}

/// Response of a database create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDatabaseResponse {
    /// Id of the new database.
    pub id: Option<String>,
}

/// A database user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: Option<String>,
    /// Login name.
    pub username: Option<String>,
    /// Granted roles.
    pub roles: Option<Vec<String>>,
    /// Password, only present in the create response.
    pub password: Option<String>,
    /// Host to connect to.
    pub host: Option<String>,
    /// Port to connect to.
    pub port: Option<i64>,
    /// Connection URI, only present in the create response.
    pub uri: Option<String>,
}

/// Envelope of user responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    /// The user.
    pub item: Option<User>,
}

/// Body of a user create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserPayload {
    /// Login name.
    pub username: String,
    /// Roles to grant.
    pub roles: Vec<String>,
}

/// Body of a user partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialUpdateUserPayload {
    /// New roles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

/// PostgreSQL Flex instances, databases and users.
#[async_trait]
pub trait PostgresFlexApi: Send + Sync {
    /// List flavors offered in a region.
    async fn list_flavors(&self, project: &ProjectRef) -> ApiResult<ListFlavorsResponse>;

    /// Create an instance.
    async fn create_instance(
        &self,
        project: &ProjectRef,
        payload: CreateInstancePayload,
    ) -> ApiResult<CreateInstanceResponse>;

    /// Get an instance.
    async fn get_instance(&self, instance: &InstanceRef) -> ApiResult<InstanceResponse>;

    /// Partially update an instance.
    async fn partial_update_instance(
        &self,
        instance: &InstanceRef,
        payload: PartialUpdateInstancePayload,
    ) -> ApiResult<()>;

    /// Delete an instance. It stays around in a deleted state until force-deleted.
    async fn delete_instance(&self, instance: &InstanceRef) -> ApiResult<()>;

    /// Remove a deleted instance for good.
    async fn force_delete_instance(&self, instance: &InstanceRef) -> ApiResult<()>;

    /// Wait until a created instance is ready.
    async fn wait_instance_created(&self, instance: &InstanceRef) -> ApiResult<InstanceResponse>;

    /// Wait until an updated instance is ready.
    async fn wait_instance_updated(&self, instance: &InstanceRef) -> ApiResult<InstanceResponse>;

    /// Wait until an instance reaches the deleted state.
    async fn wait_instance_deleted(&self, instance: &InstanceRef) -> ApiResult<()>;

    /// Wait until a force-deleted instance is gone.
    async fn wait_instance_force_deleted(&self, instance: &InstanceRef) -> ApiResult<()>;

    /// Create a database.
    async fn create_database(
        &self,
        instance: &InstanceRef,
        payload: CreateDatabasePayload,
    ) -> ApiResult<CreateDatabaseResponse>;

    /// List one page of databases (pages start at 1).
    async fn list_databases(&self, instance: &InstanceRef, page: u32) -> ApiResult<ListDatabasesResponse>;

    /// Delete a database.
    async fn delete_database(&self, instance: &InstanceRef, database_id: &str) -> ApiResult<()>;

    /// Create a user.
    async fn create_user(&self, instance: &InstanceRef, payload: CreateUserPayload) -> ApiResult<UserResponse>;

    /// Get a user.
    async fn get_user(&self, instance: &InstanceRef, user_id: &str) -> ApiResult<UserResponse>;

    /// Partially update a user.
    async fn partial_update_user(
        &self,
        instance: &InstanceRef,
        user_id: &str,
        payload: PartialUpdateUserPayload,
    ) -> ApiResult<()>;

    /// Delete a user.
    async fn delete_user(&self, instance: &InstanceRef, user_id: &str) -> ApiResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_database_owner() {
        let db: Database = serde_json::from_value(json!({
            "id": "d1",
            "name": "app",
            "options": {"owner": "admin", "encoding": "UTF8"}
        }))
        .unwrap();
        assert_eq!(db.owner(), Some("admin"));

        let db = Database::default();
        assert_eq!(db.owner(), None);
    }

    #[test]
    fn test_partial_update_omits_unset_fields() {
        let payload = PartialUpdateInstancePayload {
            replicas: Some(3),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&payload).unwrap(), json!({"replicas": 3}));
    }
}
