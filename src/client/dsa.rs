//! Data service (DSA) APIs: RabbitMQ and MariaDB.
//!
//! Both services share one API shape and differ only in the instance
//! parameters they accept, so a single trait with an associated parameter
//! type covers them.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ApiResult, InstanceRef, ProjectRef};

/// One plan of an offering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferingPlan {
    /// Plan id.
    pub id: Option<String>,
    /// Plan name, e.g. `stackit-rabbitmq-1.2.10-single`.
    pub name: Option<String>,
}

/// A service version and its plans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    /// Service name.
    pub name: Option<String>,
    /// Service version.
    pub version: Option<String>,
    /// Plans offered for this version.
    pub plans: Option<Vec<OfferingPlan>>,
}

/// Offerings available in a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOfferingsResponse {
    /// The offerings.
    pub offerings: Option<Vec<Offering>>,
}

/// A DSA instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsaInstance<P> {
    /// Instance id.
    pub instance_id: Option<String>,
    /// Name.
    pub name: Option<String>,
    /// Plan id.
    pub plan_id: Option<String>,
    /// Dashboard URL.
    pub dashboard_url: Option<String>,
    /// Cloud Foundry service instance GUID.
    pub cf_guid: Option<String>,
    /// Cloud Foundry space GUID.
    pub cf_space_guid: Option<String>,
    /// Cloud Foundry organization GUID.
    pub cf_organization_guid: Option<String>,
    /// Image URL.
    pub image_url: Option<String>,
    /// Service parameters.
    pub parameters: Option<P>,
}

/// Body of an instance create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDsaInstancePayload<P> {
    /// Name.
    pub instance_name: String,
    /// Plan id.
    pub plan_id: String,
    /// Service parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<P>,
}

/// Response of an instance create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDsaInstanceResponse {
    /// Id of the new instance.
    pub instance_id: Option<String>,
}

/// Body of an instance partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialUpdateDsaInstancePayload<P> {
    /// New plan id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    /// New parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<P>,
}

/// Parameters of a RabbitMQ instance.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RabbitmqParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_monitoring: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_disk_threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_frequency: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitoring_instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    /// Comma-separated CIDR ranges allowed to connect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sgw_acl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_ciphers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_protocols: Option<String>,
}

/// Parameters of a MariaDB instance.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MariadbParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_monitoring: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_disk_threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_frequency: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitoring_instance_id: Option<String>,
    /// Comma-separated CIDR ranges allowed to connect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sgw_acl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog: Option<Vec<String>>,
}

/// A data service API.
#[async_trait]
pub trait DsaApi: Send + Sync {
    /// Service-specific instance parameters.
    type Parameters: Debug + Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// List service versions and plans.
    async fn list_offerings(&self, project: &ProjectRef) -> ApiResult<ListOfferingsResponse>;

    /// Create an instance.
    async fn create_instance(
        &self,
        project: &ProjectRef,
        payload: CreateDsaInstancePayload<Self::Parameters>,
    ) -> ApiResult<CreateDsaInstanceResponse>;

    /// Get an instance.
    async fn get_instance(&self, instance: &InstanceRef) -> ApiResult<DsaInstance<Self::Parameters>>;

    /// Partially update an instance.
    async fn partial_update_instance(
        &self,
        instance: &InstanceRef,
        payload: PartialUpdateDsaInstancePayload<Self::Parameters>,
    ) -> ApiResult<()>;

    /// Delete an instance.
    async fn delete_instance(&self, instance: &InstanceRef) -> ApiResult<()>;

    /// Wait until a created instance is ready.
    async fn wait_instance_created(&self, instance: &InstanceRef) -> ApiResult<DsaInstance<Self::Parameters>>;

    /// Wait until an updated instance is ready.
    async fn wait_instance_updated(&self, instance: &InstanceRef) -> ApiResult<DsaInstance<Self::Parameters>>;

    /// Wait until an instance is gone.
    async fn wait_instance_deleted(&self, instance: &InstanceRef) -> ApiResult<()>;
}

/// The RabbitMQ API.
pub type RabbitMqApi = dyn DsaApi<Parameters = RabbitmqParameters>;

/// The MariaDB API.
pub type MariaDbApi = dyn DsaApi<Parameters = MariadbParameters>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instance_wire_shape() {
        let instance: DsaInstance<RabbitmqParameters> = serde_json::from_value(json!({
            "instanceId": "i1",
            "planId": "p1",
            "dashboardUrl": "https://dashboard",
            "parameters": {"sgw_acl": "10.0.0.0/8", "plugins": ["rabbitmq_shovel"]}
        }))
        .unwrap();

        assert_eq!(instance.instance_id.as_deref(), Some("i1"));
        let params = instance.parameters.unwrap();
        assert_eq!(params.sgw_acl.as_deref(), Some("10.0.0.0/8"));
        assert_eq!(params.plugins, Some(vec!["rabbitmq_shovel".to_string()]));
    }

    #[test]
    fn test_parameters_omit_unset() {
        let params = MariadbParameters {
            enable_monitoring: Some(true),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"enable_monitoring": true})
        );
    }
}
