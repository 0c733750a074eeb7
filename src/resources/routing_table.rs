//! `stackit_routing_table` resource and data source.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::client::iaas::{
    AddRoutingTablePayload, NetworkAreaRef, RoutingTable, UpdateRoutingTablePayload,
};
use crate::client::{ClientFactory, RoutingTableApi};
use crate::config::{ProviderData, ROUTING_TABLES_EXPERIMENT};
use crate::error::ProviderError;
use crate::id::{self, ImportFormat};
use crate::patch::{self, Labels};
use crate::resource::{
    data_source_error, ignore_not_found, read_or_gone, Configured, ManagedDataSource, ManagedResource,
    ServiceContext,
};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::value::Attr;

pub(crate) type RoutingContext = ServiceContext<dyn RoutingTableApi>;

/// Fill a routing slot from provider settings.
pub(crate) fn configure_routing(
    slot: &Configured<RoutingContext>,
    data: Arc<ProviderData>,
    clients: &dyn ClientFactory,
    type_name: &str,
) -> Result<(), ProviderError> {
    let client = clients.routing_tables(&data)?;
    slot.set(ServiceContext::new(data, client), type_name)
}

/// The configured routing context. Routing tables are experimental, so every
/// operation checks the experiment first.
pub(crate) fn routing_context<'a>(
    slot: &'a Configured<RoutingContext>,
    type_name: &str,
) -> Result<&'a RoutingContext, ProviderError> {
    let ctx = slot.get(type_name)?;
    ctx.data.require_experiment(ROUTING_TABLES_EXPERIMENT, type_name)?;
    Ok(ctx)
}

/// Address the network area named by the model's path segments.
pub(crate) fn network_area(
    organization_id: &Attr<String>,
    network_area_id: &Attr<String>,
    region: String,
) -> Result<NetworkAreaRef, ProviderError> {
    Ok(NetworkAreaRef {
        organization_id: organization_id.require("organization_id")?,
        network_area_id: network_area_id.require("network_area_id")?,
        region,
    })
}

/// State of a routing table.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingTableModel {
    pub id: Attr<String>,
    pub organization_id: Attr<String>,
    pub network_area_id: Attr<String>,
    pub routing_table_id: Attr<String>,
    pub region: Attr<String>,
    pub name: Attr<String>,
    pub description: Attr<String>,
    pub labels: Attr<Labels>,
    pub system_routes: Attr<bool>,
    pub default: Attr<bool>,
    pub created_at: Attr<String>,
    pub updated_at: Attr<String>,
}

impl RoutingTableModel {
    /// Overwrite the model from an API response.
    fn map_fields(&mut self, table: &RoutingTable, region: &str) -> Result<(), ProviderError> {
        let routing_table_id = match (&table.id, self.routing_table_id.as_known()) {
            (Some(id), _) => id.clone(),
            (None, Some(id)) => id.clone(),
            (None, None) => return Err(ProviderError::mapping("routing table id not present")),
        };
        let organization_id = self.organization_id.require("organization_id")?;
        let network_area_id = self.network_area_id.require("network_area_id")?;

        self.id = Attr::Known(id::encode(&[
            organization_id.as_str(),
            region,
            network_area_id.as_str(),
            routing_table_id.as_str(),
        ]));
        self.routing_table_id = Attr::Known(routing_table_id);
        self.region = Attr::known(region);
        self.name = Attr::from_wire(table.name.clone());
        self.description = Attr::from_wire(table.description.clone());
        self.labels = patch::labels_from_wire(table.labels.as_ref(), &self.labels);
        self.system_routes = Attr::from_wire(table.system_routes);
        self.default = Attr::from_wire(table.default);
        self.created_at = Attr::from_wire(table.created_at.clone());
        self.updated_at = Attr::from_wire(table.updated_at.clone());
        Ok(())
    }
}

fn shared_attributes(schema: Schema) -> Schema {
    schema
        .with_attribute(
            "id",
            Attribute::computed_id().with_description(
                "Terraform's internal resource ID. It is structured as \
                 \"`organization_id`,`region`,`network_area_id`,`routing_table_id`\".",
            ),
        )
        .with_attribute(
            "organization_id",
            Attribute::required_id().with_description("STACKIT organization ID to which the routing table is associated."),
        )
        .with_attribute(
            "network_area_id",
            Attribute::required_id().with_description("The network area ID to which the routing table is associated."),
        )
        .with_attribute("region", Attribute::region())
        .with_attribute("default", Attribute::computed_bool().use_state_for_unknown())
        .with_attribute("created_at", Attribute::computed_string().use_state_for_unknown())
        .with_attribute("updated_at", Attribute::computed_string())
}

/// `stackit_routing_table` resource.
#[derive(Default)]
pub struct RoutingTableResource {
    ctx: Configured<RoutingContext>,
}

#[async_trait]
impl ManagedResource for RoutingTableResource {
    type Model = RoutingTableModel;
    const TYPE_NAME: &'static str = "stackit_routing_table";
    const IMPORT: ImportFormat =
        ImportFormat::new(&["organization_id", "region", "network_area_id", "routing_table_id"]);

    fn schema() -> Schema {
        shared_attributes(Schema::v0())
            .with_description("Routing table resource schema. Must have the `region` specified in the provider configuration.")
            .with_attribute("routing_table_id", Attribute::computed_id())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("labels", Attribute::optional_string_map())
            .with_attribute(
                "system_routes",
                Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                    .with_force_new()
                    .use_state_for_unknown()
                    .with_description("Whether the system routes are installed into the routing table."),
            )
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_routing(&self.ctx, data, clients, Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(organization_id = %plan.organization_id, network_area_id = %plan.network_area_id))]
    async fn create(&self, mut plan: RoutingTableModel) -> Result<RoutingTableModel, ProviderError> {
        let ctx = routing_context(&self.ctx, Self::TYPE_NAME)?;
        let region = ctx.region(&plan.region);
        let area = network_area(&plan.organization_id, &plan.network_area_id, region.clone())?;

        let payload = AddRoutingTablePayload {
            name: plan.name.require("name")?,
            description: plan.description.to_wire(),
            labels: plan.labels.to_wire(),
            system_routes: plan.system_routes.to_wire(),
        };
        let table = ctx
            .client
            .add_routing_table(&area, payload)
            .await
            .map_err(|e| ProviderError::api("Creating routing table", e))?;

        plan.map_fields(&table, &region)?;
        info!(routing_table_id = %plan.routing_table_id, "Routing table created");
        Ok(plan)
    }

    #[instrument(skip_all, fields(routing_table_id = %state.routing_table_id))]
    async fn read(&self, mut state: RoutingTableModel) -> Result<Option<RoutingTableModel>, ProviderError> {
        let ctx = routing_context(&self.ctx, Self::TYPE_NAME)?;
        let region = ctx.region(&state.region);
        let table = network_area(&state.organization_id, &state.network_area_id, region.clone())?
            .table(state.routing_table_id.require("routing_table_id")?);

        let Some(remote) = read_or_gone(ctx.client.get_routing_table(&table).await, "Reading routing table")? else {
            return Ok(None);
        };
        state.map_fields(&remote, &region)?;
        info!("Routing table read");
        Ok(Some(state))
    }

    #[instrument(skip_all, fields(routing_table_id = %prior.routing_table_id))]
    async fn update(
        &self,
        prior: RoutingTableModel,
        mut plan: RoutingTableModel,
    ) -> Result<RoutingTableModel, ProviderError> {
        let ctx = routing_context(&self.ctx, Self::TYPE_NAME)?;
        let region = ctx.region(&prior.region);
        let table = network_area(&prior.organization_id, &prior.network_area_id, region.clone())?
            .table(prior.routing_table_id.require("routing_table_id")?);
        plan.routing_table_id = prior.routing_table_id.clone();

        let payload = UpdateRoutingTablePayload {
            name: plan.name.changed_from(&prior.name),
            description: plan.description.changed_from(&prior.description),
            labels: patch::compute_update(&prior.labels, &plan.labels),
        };
        let remote = ctx
            .client
            .update_routing_table(&table, payload)
            .await
            .map_err(|e| ProviderError::api("Updating routing table", e))?;

        plan.map_fields(&remote, &region)?;
        info!("Routing table updated");
        Ok(plan)
    }

    #[instrument(skip_all, fields(routing_table_id = %state.routing_table_id))]
    async fn delete(&self, state: RoutingTableModel) -> Result<(), ProviderError> {
        let ctx = routing_context(&self.ctx, Self::TYPE_NAME)?;
        let table = network_area(&state.organization_id, &state.network_area_id, ctx.region(&state.region))?
            .table(state.routing_table_id.require("routing_table_id")?);

        ignore_not_found(ctx.client.delete_routing_table(&table).await, "Deleting routing table")?;
        info!("Routing table deleted");
        Ok(())
    }
}

/// `stackit_routing_table` data source.
#[derive(Default)]
pub struct RoutingTableDataSource {
    ctx: Configured<RoutingContext>,
}

#[async_trait]
impl ManagedDataSource for RoutingTableDataSource {
    type Model = RoutingTableModel;
    const TYPE_NAME: &'static str = "stackit_routing_table";

    fn schema() -> Schema {
        shared_attributes(Schema::v0())
            .with_description("Routing table datasource schema.")
            .with_attribute("routing_table_id", Attribute::required_id().with_description("The routing table ID."))
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("labels", Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::computed()))
            .with_attribute("system_routes", Attribute::computed_bool())
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_routing(&self.ctx, data, clients, Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(routing_table_id = %config.routing_table_id))]
    async fn read(&self, mut config: RoutingTableModel) -> Result<RoutingTableModel, ProviderError> {
        let ctx = routing_context(&self.ctx, Self::TYPE_NAME)?;
        let region = ctx.region(&config.region);
        let routing_table_id = config.routing_table_id.require("routing_table_id")?;
        let table = network_area(&config.organization_id, &config.network_area_id, region.clone())?
            .table(routing_table_id.as_str());

        let remote = ctx
            .client
            .get_routing_table(&table)
            .await
            .map_err(|e| data_source_error(&format!("routing table {:?}", routing_table_id), e))?;
        config.map_fields(&remote, &region)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> RoutingTableModel {
        RoutingTableModel {
            organization_id: Attr::known("org"),
            network_area_id: Attr::known("area"),
            ..Default::default()
        }
    }

    #[test]
    fn test_map_fields() {
        let mut m = model();
        let table = RoutingTable {
            id: Some("rt".into()),
            name: Some("main".into()),
            system_routes: Some(true),
            ..Default::default()
        };
        m.map_fields(&table, "eu01").unwrap();

        assert_eq!(m.id, Attr::known("org,eu01,area,rt"));
        assert_eq!(m.routing_table_id, Attr::known("rt"));
        assert_eq!(m.name, Attr::known("main"));
        assert_eq!(m.description, Attr::Null);
        assert_eq!(m.labels, Attr::Null);
        assert_eq!(m.system_routes, Attr::Known(true));
    }

    #[test]
    fn test_map_fields_falls_back_to_state_id() {
        let mut m = model();
        m.routing_table_id = Attr::known("rt");
        m.map_fields(&RoutingTable::default(), "eu02").unwrap();
        assert_eq!(m.id, Attr::known("org,eu02,area,rt"));

        let mut m = model();
        assert!(m.map_fields(&RoutingTable::default(), "eu01").is_err());
    }

    #[test]
    fn test_schema_marks_identifiers() {
        let schema = RoutingTableResource::schema();
        assert!(schema.is_regional());
        assert!(schema.block.attributes["organization_id"].force_new);
        assert!(!schema.block.attributes["name"].force_new);
    }
}
