//! Instances of the data services (RabbitMQ, MariaDB).
//!
//! Both services share the instance lifecycle and differ in their parameter
//! objects. A [`DsaService`] describes one service; [`DsaInstanceResource`]
//! and [`DsaInstanceDataSource`] implement the lifecycle once for all of them.
//!
//! Users pick a service `version` and a `plan_name`; the API only knows plan
//! ids, so creation and updates resolve the id from the offerings list and
//! reads map it back.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::client::dsa::{
    CreateDsaInstancePayload, DsaApi, DsaInstance, Offering, PartialUpdateDsaInstancePayload,
};
use crate::client::{ClientFactory, InstanceRef, ProjectRef};
use crate::config::ProviderData;
use crate::error::ProviderError;
use crate::id::{self, ImportFormat};
use crate::resource::{
    data_source_error, ignore_not_found, read_or_gone, Configured, ManagedDataSource, ManagedResource,
    ServiceContext,
};
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::value::{warn_missing, Attr};

/// One data service.
pub trait DsaService: Send + Sync + 'static {
    /// Wire parameters.
    type Parameters: Debug + Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Parameters as they appear in state.
    type ParametersModel: Debug + Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Resource and data source type name.
    const TYPE_NAME: &'static str;

    /// Human-readable service name for descriptions and logs.
    const DISPLAY_NAME: &'static str;

    /// Build the service client.
    fn client(
        clients: &dyn ClientFactory,
        data: &ProviderData,
    ) -> Result<Arc<dyn DsaApi<Parameters = Self::Parameters>>, ProviderError>;

    /// Attributes of the `parameters` block.
    fn parameters_block(configurable: bool) -> Block;

    /// Parameters for a payload. Unset attributes are omitted.
    fn parameters_to_wire(model: &Self::ParametersModel) -> Self::Parameters;

    /// Parameters from an API response.
    fn parameters_from_wire(wire: &Self::Parameters) -> Self::ParametersModel;
}

type DsaContext<S> = ServiceContext<dyn DsaApi<Parameters = <S as DsaService>::Parameters>>;

/// State of a data service instance.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(serialize = "M: Serialize", deserialize = "M: DeserializeOwned + Default"))]
pub struct DsaInstanceModel<M> {
    pub id: Attr<String>,
    pub instance_id: Attr<String>,
    pub project_id: Attr<String>,
    pub region: Attr<String>,
    pub name: Attr<String>,
    pub version: Attr<String>,
    pub plan_name: Attr<String>,
    pub plan_id: Attr<String>,
    pub parameters: Attr<M>,
    pub cf_guid: Attr<String>,
    pub cf_space_guid: Attr<String>,
    pub cf_organization_guid: Attr<String>,
    pub dashboard_url: Attr<String>,
    pub image_url: Attr<String>,
}

impl<M> DsaInstanceModel<M> {
    fn instance(&self, region: String) -> Result<InstanceRef, ProviderError> {
        let project = ProjectRef::new(self.project_id.require("project_id")?, region);
        Ok(project.instance(self.instance_id.require("instance_id")?))
    }
}

fn map_fields<S: DsaService>(
    model: &mut DsaInstanceModel<S::ParametersModel>,
    instance: &DsaInstance<S::Parameters>,
    region: &str,
) -> Result<(), ProviderError> {
    let instance_id = match (&instance.instance_id, model.instance_id.as_known()) {
        (Some(id), _) => id.clone(),
        (None, Some(id)) => id.clone(),
        (None, None) => return Err(ProviderError::mapping("instance id not present")),
    };
    let project_id = model.project_id.require("project_id")?;

    model.id = Attr::Known(id::encode(&[project_id.as_str(), region, instance_id.as_str()]));
    model.instance_id = Attr::Known(instance_id);
    model.region = Attr::known(region);
    model.name = Attr::from_wire(instance.name.clone());
    model.plan_id = Attr::from_wire(instance.plan_id.clone());
    model.cf_guid = Attr::from_wire(instance.cf_guid.clone());
    model.cf_space_guid = Attr::from_wire(instance.cf_space_guid.clone());
    model.cf_organization_guid = Attr::from_wire(instance.cf_organization_guid.clone());
    model.image_url = Attr::from_wire(instance.image_url.clone());
    model.dashboard_url = Attr::from_wire(instance.dashboard_url.clone());
    if model.dashboard_url.is_null() {
        warn_missing(S::TYPE_NAME, "dashboard_url");
    }
    model.parameters = Attr::from_wire(instance.parameters.as_ref().map(S::parameters_from_wire));
    Ok(())
}

/// Resolve `version` and `plan_name` to a plan id.
fn find_plan_id(offerings: &[Offering], version: &str, plan_name: &str) -> Result<String, ProviderError> {
    let mut available = Vec::new();
    for offering in offerings {
        let offering_version = offering.version.as_deref().unwrap_or_default();
        for plan in offering.plans.iter().flatten() {
            let name = plan.name.as_deref().unwrap_or_default();
            if offering_version == version && name == plan_name {
                return plan
                    .id
                    .clone()
                    .ok_or_else(|| ProviderError::mapping("plan id not present"));
            }
            available.push(format!("- version {:?}, plan_name {:?}", offering_version, name));
        }
    }
    Err(ProviderError::Validation(format!(
        "couldn't find plan_name {:?} for version {:?}, available options are:\n{}",
        plan_name,
        version,
        available.join("\n")
    )))
}

/// Map a plan id back to its version and plan name.
fn find_plan_name(offerings: &[Offering], plan_id: &str) -> Option<(String, String)> {
    offerings.iter().find_map(|offering| {
        offering
            .plans
            .iter()
            .flatten()
            .find(|plan| plan.id.as_deref() == Some(plan_id))
            .map(|plan| {
                (
                    offering.version.clone().unwrap_or_default(),
                    plan.name.clone().unwrap_or_default(),
                )
            })
    })
}

async fn list_offerings<P>(client: &dyn DsaApi<Parameters = P>, project: &ProjectRef) -> Result<Vec<Offering>, ProviderError>
where
    P: Debug + Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    Ok(client
        .list_offerings(project)
        .await
        .map_err(|e| ProviderError::api("Getting offerings", e))?
        .offerings
        .unwrap_or_default())
}

async fn resolve_plan_id<S: DsaService>(
    ctx: &DsaContext<S>,
    model: &DsaInstanceModel<S::ParametersModel>,
    project: &ProjectRef,
) -> Result<String, ProviderError> {
    let version = model.version.require("version")?;
    let plan_name = model.plan_name.require("plan_name")?;
    let offerings = list_offerings(ctx.client.as_ref(), project).await?;
    find_plan_id(&offerings, &version, &plan_name)
}

/// Fill `version` and `plan_name` from the instance's plan id.
async fn load_plan_name<S: DsaService>(
    ctx: &DsaContext<S>,
    model: &mut DsaInstanceModel<S::ParametersModel>,
    project: &ProjectRef,
) -> Result<(), ProviderError> {
    let Some(plan_id) = model.plan_id.as_known() else {
        return Ok(());
    };
    let offerings = list_offerings(ctx.client.as_ref(), project).await?;
    match find_plan_name(&offerings, plan_id) {
        Some((version, plan_name)) => {
            model.version = Attr::Known(version);
            model.plan_name = Attr::Known(plan_name);
        },
        None => warn!(plan_id = %plan_id, "no offering matches the instance's plan id"),
    }
    Ok(())
}

fn configure_dsa<S: DsaService>(
    slot: &Configured<DsaContext<S>>,
    data: Arc<ProviderData>,
    clients: &dyn ClientFactory,
) -> Result<(), ProviderError> {
    let client = S::client(clients, &data)?;
    slot.set(ServiceContext::new(data, client), S::TYPE_NAME)
}

fn shared_attributes(schema: Schema) -> Schema {
    schema
        .with_attribute(
            "id",
            Attribute::computed_id()
                .with_description("Terraform's internal resource ID. It is structured as \"`project_id`,`region`,`instance_id`\"."),
        )
        .with_attribute("project_id", Attribute::required_id())
        .with_attribute("region", Attribute::region())
        .with_attribute("plan_id", Attribute::computed_string())
        .with_attribute("cf_guid", Attribute::computed_string().use_state_for_unknown())
        .with_attribute("cf_space_guid", Attribute::computed_string().use_state_for_unknown())
        .with_attribute("cf_organization_guid", Attribute::computed_string().use_state_for_unknown())
        .with_attribute("dashboard_url", Attribute::computed_string().use_state_for_unknown())
        .with_attribute("image_url", Attribute::computed_string().use_state_for_unknown())
}

/// A data service instance resource.
pub struct DsaInstanceResource<S: DsaService> {
    ctx: Configured<DsaContext<S>>,
}

impl<S: DsaService> Default for DsaInstanceResource<S> {
    fn default() -> Self {
        Self {
            ctx: Configured::default(),
        }
    }
}

#[async_trait]
impl<S: DsaService> ManagedResource for DsaInstanceResource<S> {
    type Model = DsaInstanceModel<S::ParametersModel>;
    const TYPE_NAME: &'static str = S::TYPE_NAME;
    const IMPORT: ImportFormat = ImportFormat::new(&["project_id", "region", "instance_id"]);

    fn schema() -> Schema {
        shared_attributes(Schema::v0())
            .with_description(format!("{} instance resource schema.", S::DISPLAY_NAME))
            .with_attribute("instance_id", Attribute::computed_id())
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("version", Attribute::required_string())
            .with_attribute("plan_name", Attribute::required_string())
            .with_block("parameters", NestedBlock::single(S::parameters_block(true)).computed())
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_dsa::<S>(&self.ctx, data, clients)
    }

    #[instrument(skip_all, fields(service = S::DISPLAY_NAME, project_id = %plan.project_id))]
    async fn create(&self, mut plan: Self::Model) -> Result<Self::Model, ProviderError> {
        let ctx = self.ctx.get(S::TYPE_NAME)?;
        let region = ctx.region(&plan.region);
        let project = ProjectRef::new(plan.project_id.require("project_id")?, region.clone());

        let payload = CreateDsaInstancePayload {
            instance_name: plan.name.require("name")?,
            plan_id: resolve_plan_id::<S>(ctx, &plan, &project).await?,
            parameters: plan.parameters.as_known().map(S::parameters_to_wire),
        };
        let created = ctx
            .client
            .create_instance(&project, payload)
            .await
            .map_err(|e| ProviderError::api("Creating instance", e))?;
        let instance_id = created
            .instance_id
            .ok_or_else(|| ProviderError::mapping("instance id not present in create response"))?;

        let instance = project.instance(instance_id.as_str());
        let remote = ctx
            .client
            .wait_instance_created(&instance)
            .await
            .map_err(|e| ProviderError::api("Waiting for instance creation", e))?;

        plan.instance_id = Attr::Known(instance_id);
        map_fields::<S>(&mut plan, &remote, &region)?;
        info!(instance_id = %plan.instance_id, "{} instance created", S::DISPLAY_NAME);
        Ok(plan)
    }

    #[instrument(skip_all, fields(service = S::DISPLAY_NAME, instance_id = %state.instance_id))]
    async fn read(&self, mut state: Self::Model) -> Result<Option<Self::Model>, ProviderError> {
        let ctx = self.ctx.get(S::TYPE_NAME)?;
        let region = ctx.region(&state.region);
        let instance = state.instance(region.clone())?;

        let Some(remote) = read_or_gone(ctx.client.get_instance(&instance).await, "Reading instance")? else {
            return Ok(None);
        };
        map_fields::<S>(&mut state, &remote, &region)?;
        load_plan_name::<S>(ctx, &mut state, &instance.project).await?;
        info!("{} instance read", S::DISPLAY_NAME);
        Ok(Some(state))
    }

    #[instrument(skip_all, fields(service = S::DISPLAY_NAME, instance_id = %prior.instance_id))]
    async fn update(&self, prior: Self::Model, mut plan: Self::Model) -> Result<Self::Model, ProviderError> {
        let ctx = self.ctx.get(S::TYPE_NAME)?;
        let region = ctx.region(&prior.region);
        let instance = prior.instance(region.clone())?;

        let plan_changed = plan.version.changed_from(&prior.version).is_some()
            || plan.plan_name.changed_from(&prior.plan_name).is_some();
        let plan_id = if plan_changed {
            Some(resolve_plan_id::<S>(ctx, &plan, &instance.project).await?)
        } else {
            None
        };
        let payload = PartialUpdateDsaInstancePayload {
            plan_id,
            parameters: plan.parameters.changed_from(&prior.parameters).as_ref().map(S::parameters_to_wire),
        };
        ctx.client
            .partial_update_instance(&instance, payload)
            .await
            .map_err(|e| ProviderError::api("Updating instance", e))?;
        let remote = ctx
            .client
            .wait_instance_updated(&instance)
            .await
            .map_err(|e| ProviderError::api("Waiting for instance update", e))?;

        plan.instance_id = prior.instance_id.clone();
        map_fields::<S>(&mut plan, &remote, &region)?;
        info!("{} instance updated", S::DISPLAY_NAME);
        Ok(plan)
    }

    #[instrument(skip_all, fields(service = S::DISPLAY_NAME, instance_id = %state.instance_id))]
    async fn delete(&self, state: Self::Model) -> Result<(), ProviderError> {
        let ctx = self.ctx.get(S::TYPE_NAME)?;
        let instance = state.instance(ctx.region(&state.region))?;

        match ctx.client.delete_instance(&instance).await {
            Err(e) if e.is_not_found() => {
                warn!("{} instance already gone", S::DISPLAY_NAME);
                return Ok(());
            },
            result => result.map_err(|e| ProviderError::api("Deleting instance", e))?,
        }
        ignore_not_found(
            ctx.client.wait_instance_deleted(&instance).await,
            "Waiting for instance deletion",
        )?;
        info!("{} instance deleted", S::DISPLAY_NAME);
        Ok(())
    }
}

/// A data service instance data source.
pub struct DsaInstanceDataSource<S: DsaService> {
    ctx: Configured<DsaContext<S>>,
}

impl<S: DsaService> Default for DsaInstanceDataSource<S> {
    fn default() -> Self {
        Self {
            ctx: Configured::default(),
        }
    }
}

#[async_trait]
impl<S: DsaService> ManagedDataSource for DsaInstanceDataSource<S> {
    type Model = DsaInstanceModel<S::ParametersModel>;
    const TYPE_NAME: &'static str = S::TYPE_NAME;

    fn schema() -> Schema {
        shared_attributes(Schema::v0())
            .with_description(format!("{} instance data source schema.", S::DISPLAY_NAME))
            .with_attribute("instance_id", Attribute::required_id())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("version", Attribute::computed_string())
            .with_attribute("plan_name", Attribute::computed_string())
            .with_block("parameters", NestedBlock::single(S::parameters_block(false)).computed())
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_dsa::<S>(&self.ctx, data, clients)
    }

    #[instrument(skip_all, fields(service = S::DISPLAY_NAME, instance_id = %config.instance_id))]
    async fn read(&self, mut config: Self::Model) -> Result<Self::Model, ProviderError> {
        let ctx = self.ctx.get(S::TYPE_NAME)?;
        let region = ctx.region(&config.region);
        let instance = config.instance(region.clone())?;

        let remote = ctx
            .client
            .get_instance(&instance)
            .await
            .map_err(|e| data_source_error(&format!("instance {:?}", instance.instance_id), e))?;
        map_fields::<S>(&mut config, &remote, &region)?;
        load_plan_name::<S>(ctx, &mut config, &instance.project).await?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::dsa::OfferingPlan;

    fn offerings() -> Vec<Offering> {
        vec![
            Offering {
                name: Some("rabbitmq".into()),
                version: Some("3.13".into()),
                plans: Some(vec![
                    OfferingPlan {
                        id: Some("plan-single".into()),
                        name: Some("stackit-rabbitmq-1.2.10-single".into()),
                    },
                    OfferingPlan {
                        id: Some("plan-replica".into()),
                        name: Some("stackit-rabbitmq-2.4.10-replica".into()),
                    },
                ]),
            },
            Offering {
                name: Some("rabbitmq".into()),
                version: Some("4.0".into()),
                plans: Some(vec![OfferingPlan {
                    id: Some("plan-4-single".into()),
                    name: Some("stackit-rabbitmq-1.2.10-single".into()),
                }]),
            },
        ]
    }

    #[test]
    fn test_find_plan_id() {
        let id = find_plan_id(&offerings(), "4.0", "stackit-rabbitmq-1.2.10-single").unwrap();
        assert_eq!(id, "plan-4-single");

        let err = find_plan_id(&offerings(), "4.0", "stackit-rabbitmq-2.4.10-replica").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("available options"));
        assert!(message.contains("plan-replica") || message.contains("2.4.10-replica"));
    }

    #[test]
    fn test_find_plan_name() {
        assert_eq!(
            find_plan_name(&offerings(), "plan-replica"),
            Some(("3.13".to_string(), "stackit-rabbitmq-2.4.10-replica".to_string()))
        );
        assert_eq!(find_plan_name(&offerings(), "missing"), None);
    }
}
