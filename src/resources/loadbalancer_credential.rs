//! `stackit_loadbalancer_observability_credential` resource.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::client::loadbalancer::{CreateCredentialsPayload, CredentialResponse};
use crate::client::{ClientFactory, LoadBalancerApi, ProjectRef};
use crate::config::ProviderData;
use crate::error::ProviderError;
use crate::id::{self, ImportFormat};
use crate::resource::{ignore_not_found, read_or_gone, Configured, ManagedResource, ServiceContext};
use crate::schema::{Attribute, Schema};
use crate::value::Attr;

type LoadBalancerContext = ServiceContext<dyn LoadBalancerApi>;

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialModel {
    pub id: Attr<String>,
    pub project_id: Attr<String>,
    pub region: Attr<String>,
    pub credentials_ref: Attr<String>,
    pub display_name: Attr<String>,
    pub username: Attr<String>,
    pub password: Attr<String>,
}

impl CredentialModel {
    fn project(&self, region: String) -> Result<ProjectRef, ProviderError> {
        Ok(ProjectRef::new(self.project_id.require("project_id")?, region))
    }

    fn map_fields(&mut self, response: &CredentialResponse, region: &str) -> Result<(), ProviderError> {
        let credential = response
            .credential
            .as_ref()
            .ok_or_else(|| ProviderError::mapping("received credential is nil"))?;
        let credentials_ref = match (&credential.credentials_ref, self.credentials_ref.as_known()) {
            (Some(r), _) => r.clone(),
            (None, Some(r)) => r.clone(),
            (None, None) => return Err(ProviderError::mapping("credentials ref not present")),
        };
        let project_id = self.project_id.require("project_id")?;

        self.id = Attr::Known(id::encode(&[project_id.as_str(), region, credentials_ref.as_str()]));
        self.credentials_ref = Attr::Known(credentials_ref);
        self.region = Attr::known(region);
        self.display_name = Attr::from_wire(credential.display_name.clone());
        self.username = Attr::from_wire(credential.username.clone());
        Ok(())
    }
}

/// `stackit_loadbalancer_observability_credential` resource. Credentials
/// are immutable; every attribute change replaces them.
#[derive(Default)]
pub struct ObservabilityCredentialResource {
    ctx: Configured<LoadBalancerContext>,
}

#[async_trait]
impl ManagedResource for ObservabilityCredentialResource {
    type Model = CredentialModel;
    const TYPE_NAME: &'static str = "stackit_loadbalancer_observability_credential";
    const IMPORT: ImportFormat = ImportFormat::new(&["project_id", "region", "credentials_ref"]);

    fn schema() -> Schema {
        Schema::v0()
            .with_description("Load Balancer observability credential resource schema.")
            .with_attribute(
                "id",
                Attribute::computed_id()
                    .with_description("Terraform's internal resource ID. It is structured as \"`project_id`,`region`,`credentials_ref`\"."),
            )
            .with_attribute("project_id", Attribute::required_id())
            .with_attribute("region", Attribute::region())
            .with_attribute(
                "credentials_ref",
                Attribute::computed_id().with_description("The credentials reference is used by the Load Balancer to define which credential it will use."),
            )
            .with_attribute("display_name", Attribute::required_string().with_force_new())
            .with_attribute("username", Attribute::required_string().with_force_new())
            .with_attribute("password", Attribute::required_string().with_force_new().sensitive())
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        let client = clients.load_balancer(&data)?;
        self.ctx.set(ServiceContext::new(data, client), Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(project_id = %plan.project_id))]
    async fn create(&self, mut plan: CredentialModel) -> Result<CredentialModel, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&plan.region);
        let project = plan.project(region.clone())?;

        let payload = CreateCredentialsPayload {
            display_name: plan.display_name.require("display_name")?,
            username: plan.username.require("username")?,
            password: plan.password.require("password")?,
        };
        let request_id = Uuid::new_v4().to_string();
        let response = ctx
            .client
            .create_credentials(&project, &request_id, payload)
            .await
            .map_err(|e| ProviderError::api("Creating credential", e))?;

        plan.map_fields(&response, &region)?;
        info!(credentials_ref = %plan.credentials_ref, "Load Balancer observability credential created");
        Ok(plan)
    }

    #[instrument(skip_all, fields(project_id = %state.project_id, credentials_ref = %state.credentials_ref))]
    async fn read(&self, mut state: CredentialModel) -> Result<Option<CredentialModel>, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&state.region);
        let project = state.project(region.clone())?;
        let credentials_ref = state.credentials_ref.require("credentials_ref")?;

        let Some(response) = read_or_gone(
            ctx.client.get_credentials(&project, &credentials_ref).await,
            "Reading credential",
        )?
        else {
            return Ok(None);
        };
        state.map_fields(&response, &region)?;
        info!("Load Balancer observability credential read");
        Ok(Some(state))
    }

    async fn update(&self, _prior: CredentialModel, _plan: CredentialModel) -> Result<CredentialModel, ProviderError> {
        Err(ProviderError::Unimplemented(
            "Updating credential: credential can't be updated".into(),
        ))
    }

    #[instrument(skip_all, fields(project_id = %state.project_id, credentials_ref = %state.credentials_ref))]
    async fn delete(&self, state: CredentialModel) -> Result<(), ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let project = state.project(ctx.region(&state.region))?;
        let credentials_ref = state.credentials_ref.require("credentials_ref")?;

        ignore_not_found(
            ctx.client.delete_credentials(&project, &credentials_ref).await,
            "Deleting credential",
        )?;
        info!("Load Balancer observability credential deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::loadbalancer::Credential;

    #[test]
    fn test_map_fields_keeps_password() {
        let mut m = CredentialModel {
            project_id: Attr::known("p"),
            password: Attr::known("secret"),
            ..Default::default()
        };
        let response = CredentialResponse {
            credential: Some(Credential {
                credentials_ref: Some("credentials-abc".into()),
                display_name: Some("metrics".into()),
                username: Some("user".into()),
            }),
        };
        m.map_fields(&response, "eu01").unwrap();

        assert_eq!(m.id, Attr::known("p,eu01,credentials-abc"));
        assert_eq!(m.password, Attr::known("secret"));
        assert_eq!(m.display_name, Attr::known("metrics"));
    }

    #[test]
    fn test_map_fields_requires_credential() {
        let mut m = CredentialModel::default();
        assert!(m.map_fields(&CredentialResponse::default(), "eu01").is_err());
    }
}
