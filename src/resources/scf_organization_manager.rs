//! `stackit_scf_organization_manager` resource.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::client::scf::OrgManager;
use crate::client::{ClientFactory, ProjectRef, ScfApi};
use crate::config::ProviderData;
use crate::error::ProviderError;
use crate::id::{self, ImportFormat};
use crate::resource::{ignore_not_found, read_or_gone, Configured, ManagedResource, ServiceContext};
use crate::schema::{Attribute, Schema};
use crate::value::Attr;

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgManagerModel {
    pub id: Attr<String>,
    pub project_id: Attr<String>,
    pub region: Attr<String>,
    pub org_id: Attr<String>,
    pub user_id: Attr<String>,
    pub platform_id: Attr<String>,
    pub username: Attr<String>,
    pub password: Attr<String>,
    pub created_at: Attr<String>,
    pub updated_at: Attr<String>,
}

impl OrgManagerModel {
    fn map_fields(&mut self, manager: &OrgManager, region: &str) -> Result<(), ProviderError> {
        let user_id = manager
            .guid
            .clone()
            .ok_or_else(|| ProviderError::mapping("org manager guid not present"))?;
        let project_id = self.project_id.require("project_id")?;
        let org_id = self.org_id.require("org_id")?;

        self.id = Attr::Known(id::encode(&[
            project_id.as_str(),
            region,
            org_id.as_str(),
            user_id.as_str(),
        ]));
        self.user_id = Attr::Known(user_id);
        self.region = Attr::known(region);
        self.platform_id = Attr::from_wire(manager.platform_id.clone());
        self.username = Attr::from_wire(manager.username.clone());
        self.created_at = Attr::from_wire(manager.created_at.clone());
        self.updated_at = Attr::from_wire(manager.updated_at.clone());
        Ok(())
    }

    /// Map the create response, the only one that carries the password.
    fn map_fields_create(&mut self, manager: &OrgManager, region: &str) -> Result<(), ProviderError> {
        let password = manager
            .password
            .clone()
            .ok_or_else(|| ProviderError::mapping("org manager password not present"))?;
        self.map_fields(manager, region)?;
        self.password = Attr::Known(password);
        Ok(())
    }
}

/// `stackit_scf_organization_manager` resource.
#[derive(Default)]
pub struct OrgManagerResource {
    ctx: Configured<ServiceContext<dyn ScfApi>>,
}

#[async_trait]
impl ManagedResource for OrgManagerResource {
    type Model = OrgManagerModel;
    const TYPE_NAME: &'static str = "stackit_scf_organization_manager";
    const IMPORT: ImportFormat = ImportFormat::new(&["project_id", "region", "org_id", "user_id"]);

    fn schema() -> Schema {
        Schema::v0()
            .with_description("STACKIT Cloud Foundry organization manager resource schema.")
            .with_attribute(
                "id",
                Attribute::computed_id().with_description(
                    "Terraform's internal resource ID. It is structured as \
                     \"`project_id`,`region`,`org_id`,`user_id`\".",
                ),
            )
            .with_attribute("project_id", Attribute::required_id())
            .with_attribute("region", Attribute::region())
            .with_attribute("org_id", Attribute::required_id().with_description("The ID of the Cloud Foundry Organization."))
            .with_attribute("user_id", Attribute::computed_id())
            .with_attribute("platform_id", Attribute::computed_string().use_state_for_unknown())
            .with_attribute("username", Attribute::computed_string().use_state_for_unknown())
            .with_attribute("password", Attribute::computed_string().sensitive().use_state_for_unknown())
            .with_attribute("created_at", Attribute::computed_string().use_state_for_unknown())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        let client = clients.scf(&data)?;
        self.ctx.set(ServiceContext::new(data, client), Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(project_id = %plan.project_id, org_id = %plan.org_id))]
    async fn create(&self, mut plan: OrgManagerModel) -> Result<OrgManagerModel, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&plan.region);
        let project = ProjectRef::new(plan.project_id.require("project_id")?, region.clone());
        let org_id = plan.org_id.require("org_id")?;

        let manager = ctx
            .client
            .create_org_manager(&project, &org_id)
            .await
            .map_err(|e| ProviderError::api("Creating organization manager", e))?;
        plan.map_fields_create(&manager, &region)?;
        info!(user_id = %plan.user_id, "SCF organization manager created");
        Ok(plan)
    }

    #[instrument(skip_all, fields(project_id = %state.project_id, org_id = %state.org_id))]
    async fn read(&self, mut state: OrgManagerModel) -> Result<Option<OrgManagerModel>, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&state.region);
        let project = ProjectRef::new(state.project_id.require("project_id")?, region.clone());
        let org_id = state.org_id.require("org_id")?;

        let Some(manager) = read_or_gone(
            ctx.client.get_org_manager(&project, &org_id).await,
            "Reading organization manager",
        )?
        else {
            return Ok(None);
        };
        state.map_fields(&manager, &region)?;
        info!("SCF organization manager read");
        Ok(Some(state))
    }

    async fn update(&self, _prior: OrgManagerModel, _plan: OrgManagerModel) -> Result<OrgManagerModel, ProviderError> {
        Err(ProviderError::Unimplemented(
            "Updating organization manager: organization manager can't be updated".into(),
        ))
    }

    #[instrument(skip_all, fields(project_id = %state.project_id, org_id = %state.org_id))]
    async fn delete(&self, state: OrgManagerModel) -> Result<(), ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let project = ProjectRef::new(state.project_id.require("project_id")?, ctx.region(&state.region));
        let org_id = state.org_id.require("org_id")?;

        ignore_not_found(
            ctx.client.delete_org_manager(&project, &org_id).await,
            "Deleting organization manager",
        )?;
        info!("SCF organization manager deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_survives_reads() {
        let mut m = OrgManagerModel {
            project_id: Attr::known("p"),
            org_id: Attr::known("org"),
            ..Default::default()
        };
        let created = OrgManager {
            guid: Some("u1".into()),
            username: Some("manager".into()),
            password: Some("secret".into()),
            ..Default::default()
        };
        m.map_fields_create(&created, "eu01").unwrap();
        assert_eq!(m.id, Attr::known("p,eu01,org,u1"));

        let read = OrgManager {
            password: None,
            ..created
        };
        m.map_fields(&read, "eu01").unwrap();
        assert_eq!(m.password, Attr::known("secret"));
    }

    #[test]
    fn test_create_without_password_fails() {
        let mut m = OrgManagerModel {
            project_id: Attr::known("p"),
            org_id: Attr::known("org"),
            password: Attr::Unknown,
            ..Default::default()
        };
        let created = OrgManager {
            guid: Some("u1".into()),
            username: Some("manager".into()),
            ..Default::default()
        };
        let err = m.map_fields_create(&created, "eu01").unwrap_err();
        assert!(matches!(err, ProviderError::Mapping(_)));
        assert!(err.to_string().contains("password"));
    }
}
