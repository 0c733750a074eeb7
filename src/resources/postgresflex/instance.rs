//! `stackit_postgresflex_instance` resource and data source.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{configure_postgres, instance, project, PostgresContext};
use crate::client::postgresflex::{
    Acl, CreateInstancePayload, Flavor, Instance, InstanceResponse, PartialUpdateInstancePayload, Storage,
};
use crate::client::{ClientFactory, PostgresFlexApi, ProjectRef};
use crate::config::ProviderData;
use crate::error::ProviderError;
use crate::id::{self, ImportFormat};
use crate::resource::{data_source_error, read_or_gone, Configured, ManagedDataSource, ManagedResource};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::value::Attr;

/// Compute flavor of an instance. `cpu` and `ram` select it; `id` and
/// `description` are filled from the flavor list.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlavorModel {
    pub id: Attr<String>,
    pub description: Attr<String>,
    pub cpu: Attr<i64>,
    pub ram: Attr<i64>,
}

impl From<&Flavor> for FlavorModel {
    fn from(flavor: &Flavor) -> Self {
        Self {
            id: Attr::from_wire(flavor.id.clone()),
            description: Attr::from_wire(flavor.description.clone()),
            cpu: Attr::from_wire(flavor.cpu),
            ram: Attr::from_wire(flavor.memory),
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageModel {
    pub class: Attr<String>,
    pub size: Attr<i64>,
}

impl StorageModel {
    fn to_wire(&self) -> Storage {
        Storage {
            class: self.class.to_wire(),
            size: self.size.to_wire(),
        }
    }
}

/// State of a Postgres Flex instance.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceModel {
    pub id: Attr<String>,
    pub instance_id: Attr<String>,
    pub project_id: Attr<String>,
    pub region: Attr<String>,
    pub name: Attr<String>,
    pub acl: Attr<Vec<String>>,
    pub backup_schedule: Attr<String>,
    pub flavor: Attr<FlavorModel>,
    pub replicas: Attr<i64>,
    pub storage: Attr<StorageModel>,
    pub version: Attr<String>,
}

impl InstanceModel {
    fn map_fields(&mut self, response: &InstanceResponse, region: &str) -> Result<(), ProviderError> {
        let instance: &Instance = response
            .item
            .as_ref()
            .ok_or_else(|| ProviderError::mapping("received instance is nil"))?;
        let instance_id = match (&instance.id, self.instance_id.as_known()) {
            (Some(id), _) => id.clone(),
            (None, Some(id)) => id.clone(),
            (None, None) => return Err(ProviderError::mapping("instance id not present")),
        };
        let project_id = self.project_id.require("project_id")?;

        self.id = Attr::Known(id::encode(&[project_id.as_str(), region, instance_id.as_str()]));
        self.instance_id = Attr::Known(instance_id);
        self.region = Attr::known(region);
        self.name = Attr::from_wire(instance.name.clone());
        self.acl = Attr::from_wire(instance.acl.as_ref().and_then(|acl| acl.items.clone()));
        self.backup_schedule = Attr::from_wire(instance.backup_schedule.clone());
        self.flavor = Attr::from_wire(instance.flavor.as_ref().map(FlavorModel::from));
        self.replicas = Attr::from_wire(instance.replicas.map(i64::from));
        self.storage = Attr::from_wire(instance.storage.as_ref().map(|s| StorageModel {
            class: Attr::from_wire(s.class.clone()),
            size: Attr::from_wire(s.size),
        }));
        self.version = Attr::from_wire(instance.version.clone());
        Ok(())
    }

    fn to_create_payload(&self, flavor_id: String) -> Result<CreateInstancePayload, ProviderError> {
        let replicas = self
            .replicas
            .narrow::<i32>("replicas")?
            .ok_or_else(|| ProviderError::Validation("attribute \"replicas\" must be set".into()))?;
        Ok(CreateInstancePayload {
            name: self.name.require("name")?,
            acl: Acl {
                items: Some(self.acl.require("acl")?),
            },
            backup_schedule: self.backup_schedule.require("backup_schedule")?,
            flavor_id,
            replicas,
            storage: self.storage.require("storage")?.to_wire(),
            version: self.version.require("version")?,
        })
    }

    /// Only fields that are known and differ from `prior` are sent.
    fn to_update_payload(
        &self,
        prior: &InstanceModel,
        flavor_id: Option<String>,
    ) -> Result<PartialUpdateInstancePayload, ProviderError> {
        let replicas = if self.replicas.changed_from(&prior.replicas).is_some() {
            self.replicas.narrow::<i32>("replicas")?
        } else {
            None
        };
        Ok(PartialUpdateInstancePayload {
            name: self.name.changed_from(&prior.name),
            acl: self.acl.changed_from(&prior.acl).map(|items| Acl { items: Some(items) }),
            backup_schedule: self.backup_schedule.changed_from(&prior.backup_schedule),
            flavor_id,
            replicas,
            storage: self.storage.changed_from(&prior.storage).map(|s| s.to_wire()),
            version: self.version.changed_from(&prior.version),
        })
    }
}

/// Find the flavor with the requested cpu and ram.
async fn resolve_flavor(
    client: &dyn PostgresFlexApi,
    project: &ProjectRef,
    flavor: &FlavorModel,
) -> Result<Flavor, ProviderError> {
    let cpu = flavor.cpu.require("flavor.cpu")?;
    let ram = flavor.ram.require("flavor.ram")?;
    let flavors = client
        .list_flavors(project)
        .await
        .map_err(|e| ProviderError::api("Listing flavors", e))?
        .flavors
        .unwrap_or_default();

    if let Some(found) = flavors.iter().find(|f| f.cpu == Some(cpu) && f.memory == Some(ram)) {
        if found.id.is_none() {
            return Err(ProviderError::mapping("flavor id not present"));
        }
        return Ok(found.clone());
    }
    let available = flavors
        .iter()
        .filter_map(|f| Some(format!("- cpu={} ram={}", f.cpu?, f.memory?)))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ProviderError::Validation(format!(
        "couldn't find flavor with cpu={} ram={}, available specs are:\n{}",
        cpu, ram, available
    )))
}

fn flavor_block(configurable: bool) -> NestedBlock {
    let sizing = if configurable {
        Attribute::required_int64
    } else {
        Attribute::computed_int64
    };
    let block = Block::new()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("description", Attribute::computed_string())
        .with_attribute("cpu", sizing())
        .with_attribute("ram", sizing().with_description("Memory in GB."));
    if configurable {
        NestedBlock::single(block).required()
    } else {
        NestedBlock::single(block).computed()
    }
}

fn storage_block(configurable: bool) -> NestedBlock {
    let block = if configurable {
        Block::new()
            .with_attribute("class", Attribute::required_string().with_force_new())
            .with_attribute("size", Attribute::required_int64())
    } else {
        Block::new()
            .with_attribute("class", Attribute::computed_string())
            .with_attribute("size", Attribute::computed_int64())
    };
    if configurable {
        NestedBlock::single(block).required()
    } else {
        NestedBlock::single(block).computed()
    }
}

fn shared_attributes(schema: Schema) -> Schema {
    schema
        .with_attribute(
            "id",
            Attribute::computed_id()
                .with_description("Terraform's internal resource ID. It is structured as \"`project_id`,`region`,`instance_id`\"."),
        )
        .with_attribute(
            "project_id",
            Attribute::required_id().with_description("STACKIT project ID to which the instance is associated."),
        )
        .with_attribute("region", Attribute::region())
}

/// `stackit_postgresflex_instance` resource.
#[derive(Default)]
pub struct InstanceResource {
    ctx: Configured<PostgresContext>,
}

#[async_trait]
impl ManagedResource for InstanceResource {
    type Model = InstanceModel;
    const TYPE_NAME: &'static str = "stackit_postgresflex_instance";
    const IMPORT: ImportFormat = ImportFormat::new(&["project_id", "region", "instance_id"]);

    fn schema() -> Schema {
        shared_attributes(Schema::v0())
            .with_description("Postgres Flex instance resource schema.")
            .with_attribute("instance_id", Attribute::computed_id())
            .with_attribute("name", Attribute::required_string().with_description("Instance name."))
            .with_attribute(
                "acl",
                Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::required())
                    .with_description("The Access Control List (ACL) for the PostgresFlex instance."),
            )
            .with_attribute("backup_schedule", Attribute::required_string())
            .with_attribute("replicas", Attribute::required_int64())
            .with_attribute("version", Attribute::required_string())
            .with_block("flavor", flavor_block(true))
            .with_block("storage", storage_block(true))
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_postgres(&self.ctx, data, clients, Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(project_id = %plan.project_id))]
    async fn create(&self, mut plan: InstanceModel) -> Result<InstanceModel, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&plan.region);
        let project = project(&plan.project_id, region.clone())?;

        let flavor = resolve_flavor(ctx.client.as_ref(), &project, &plan.flavor.require("flavor")?).await?;
        let payload = plan.to_create_payload(flavor.id.unwrap_or_default())?;
        let created = ctx
            .client
            .create_instance(&project, payload)
            .await
            .map_err(|e| ProviderError::api("Creating instance", e))?;
        let instance_id = created
            .id
            .ok_or_else(|| ProviderError::mapping("instance id not present in create response"))?;

        let instance = project.instance(instance_id.as_str());
        let response = ctx
            .client
            .wait_instance_created(&instance)
            .await
            .map_err(|e| ProviderError::api("Waiting for instance creation", e))?;

        plan.instance_id = Attr::Known(instance_id);
        plan.map_fields(&response, &region)?;
        info!(instance_id = %plan.instance_id, "Postgres Flex instance created");
        Ok(plan)
    }

    #[instrument(skip_all, fields(project_id = %state.project_id, instance_id = %state.instance_id))]
    async fn read(&self, mut state: InstanceModel) -> Result<Option<InstanceModel>, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&state.region);
        let instance = instance(&state.project_id, &state.instance_id, region.clone())?;

        let Some(response) = read_or_gone(ctx.client.get_instance(&instance).await, "Reading instance")? else {
            return Ok(None);
        };
        state.map_fields(&response, &region)?;
        info!("Postgres Flex instance read");
        Ok(Some(state))
    }

    #[instrument(skip_all, fields(project_id = %prior.project_id, instance_id = %prior.instance_id))]
    async fn update(&self, prior: InstanceModel, mut plan: InstanceModel) -> Result<InstanceModel, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&prior.region);
        let instance = instance(&prior.project_id, &prior.instance_id, region.clone())?;

        let sizing = |m: &InstanceModel| m.flavor.as_known().map(|f| (f.cpu.clone(), f.ram.clone()));
        let flavor_id = match plan.flavor.as_known() {
            Some(flavor) if sizing(&plan) != sizing(&prior) => {
                resolve_flavor(ctx.client.as_ref(), &instance.project, flavor).await?.id
            },
            _ => None,
        };
        let payload = plan.to_update_payload(&prior, flavor_id)?;
        ctx.client
            .partial_update_instance(&instance, payload)
            .await
            .map_err(|e| ProviderError::api("Updating instance", e))?;
        let response = ctx
            .client
            .wait_instance_updated(&instance)
            .await
            .map_err(|e| ProviderError::api("Waiting for instance update", e))?;

        plan.instance_id = prior.instance_id.clone();
        plan.map_fields(&response, &region)?;
        info!("Postgres Flex instance updated");
        Ok(plan)
    }

    #[instrument(skip_all, fields(project_id = %state.project_id, instance_id = %state.instance_id))]
    async fn delete(&self, state: InstanceModel) -> Result<(), ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let instance = instance(&state.project_id, &state.instance_id, ctx.region(&state.region))?;

        match ctx.client.delete_instance(&instance).await {
            Err(e) if e.is_not_found() => {
                warn!("Postgres Flex instance already gone");
                return Ok(());
            },
            result => result.map_err(|e| ProviderError::api("Deleting instance", e))?,
        }
        ctx.client
            .wait_instance_deleted(&instance)
            .await
            .map_err(|e| ProviderError::api("Waiting for instance deletion", e))?;

        // a deleted instance lingers until it is force-deleted
        match ctx.client.force_delete_instance(&instance).await {
            Err(e) if e.is_not_found() => {},
            result => result.map_err(|e| ProviderError::api("Force deleting instance", e))?,
        }
        ctx.client
            .wait_instance_force_deleted(&instance)
            .await
            .map_err(|e| ProviderError::api("Waiting for instance force deletion", e))?;

        info!("Postgres Flex instance deleted");
        Ok(())
    }
}

/// `stackit_postgresflex_instance` data source.
#[derive(Default)]
pub struct InstanceDataSource {
    ctx: Configured<PostgresContext>,
}

#[async_trait]
impl ManagedDataSource for InstanceDataSource {
    type Model = InstanceModel;
    const TYPE_NAME: &'static str = "stackit_postgresflex_instance";

    fn schema() -> Schema {
        shared_attributes(Schema::v0())
            .with_description("Postgres Flex instance data source schema.")
            .with_attribute("instance_id", Attribute::required_id())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute(
                "acl",
                Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::computed()),
            )
            .with_attribute("backup_schedule", Attribute::computed_string())
            .with_attribute("replicas", Attribute::computed_int64())
            .with_attribute("version", Attribute::computed_string())
            .with_block("flavor", flavor_block(false))
            .with_block("storage", storage_block(false))
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_postgres(&self.ctx, data, clients, Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(project_id = %config.project_id, instance_id = %config.instance_id))]
    async fn read(&self, mut config: InstanceModel) -> Result<InstanceModel, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&config.region);
        let instance = instance(&config.project_id, &config.instance_id, region.clone())?;

        let response = ctx
            .client
            .get_instance(&instance)
            .await
            .map_err(|e| data_source_error(&format!("instance {:?}", instance.instance_id), e))?;
        config.map_fields(&response, &region)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned() -> InstanceModel {
        InstanceModel {
            project_id: Attr::known("p"),
            name: Attr::known("pg"),
            acl: Attr::Known(vec!["10.0.0.0/8".into()]),
            backup_schedule: Attr::known("0 0 * * *"),
            flavor: Attr::Known(FlavorModel {
                cpu: Attr::Known(2),
                ram: Attr::Known(4),
                ..Default::default()
            }),
            replicas: Attr::Known(1),
            storage: Attr::Known(StorageModel {
                class: Attr::known("premium-perf2-stackit"),
                size: Attr::Known(5),
            }),
            version: Attr::known("16"),
            ..Default::default()
        }
    }

    fn response() -> InstanceResponse {
        InstanceResponse {
            item: Some(Instance {
                id: Some("i1".into()),
                name: Some("pg".into()),
                acl: Some(Acl {
                    items: Some(vec!["10.0.0.0/8".into()]),
                }),
                backup_schedule: Some("0 0 * * *".into()),
                flavor: Some(Flavor {
                    id: Some("2.4".into()),
                    description: Some("small".into()),
                    cpu: Some(2),
                    memory: Some(4),
                }),
                replicas: Some(1),
                storage: Some(Storage {
                    class: Some("premium-perf2-stackit".into()),
                    size: Some(5),
                }),
                version: Some("16".into()),
                status: Some("Ready".into()),
            }),
        }
    }

    #[test]
    fn test_map_fields() {
        let mut m = planned();
        m.map_fields(&response(), "eu01").unwrap();

        assert_eq!(m.id, Attr::known("p,eu01,i1"));
        assert_eq!(m.instance_id, Attr::known("i1"));
        let flavor = m.flavor.as_known().unwrap();
        assert_eq!(flavor.id, Attr::known("2.4"));
        assert_eq!(flavor.ram, Attr::Known(4));
        assert_eq!(m.replicas, Attr::Known(1));
    }

    #[test]
    fn test_map_fields_rejects_empty_response() {
        let mut m = planned();
        let before = m.clone();
        let err = m.map_fields(&InstanceResponse::default(), "eu01").unwrap_err();
        assert!(matches!(err, ProviderError::Mapping(_)));
        assert_eq!(m, before);
    }

    #[test]
    fn test_create_payload_narrows_replicas() {
        let payload = planned().to_create_payload("2.4".into()).unwrap();
        assert_eq!(payload.replicas, 1);
        assert_eq!(payload.flavor_id, "2.4");
        assert_eq!(payload.storage.size, Some(5));

        let mut m = planned();
        m.replicas = Attr::Known(i64::from(i32::MAX) + 1);
        assert!(matches!(m.to_create_payload("2.4".into()), Err(ProviderError::Validation(_))));
    }

    #[test]
    fn test_update_payload_only_sends_changes() {
        let prior = planned();
        let mut plan = planned();
        plan.replicas = Attr::Known(3);
        plan.name = Attr::Unknown;

        let payload = plan.to_update_payload(&prior, None).unwrap();
        assert_eq!(
            payload,
            PartialUpdateInstancePayload {
                replicas: Some(3),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_schema_blocks() {
        let schema = InstanceResource::schema();
        assert!(schema.block.blocks["flavor"].min_items == 1);
        assert!(schema.block.blocks["storage"].block.attributes["class"].force_new);
        assert!(schema.block.blocks.contains_key("storage"));
    }
}
