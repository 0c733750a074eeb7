//! `stackit_routing_table_route` resource, its data source and the
//! `stackit_routing_table_routes` list data source.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::routing_table::{configure_routing, network_area, routing_context, RoutingContext};
use crate::client::iaas::{AddRoutesPayload, Route, RoutingTableRef, UpdateRoutePayload};
use crate::client::ClientFactory;
use crate::config::ProviderData;
use crate::error::ProviderError;
use crate::id::{self, ImportFormat};
use crate::patch::{self, Labels};
use crate::resource::{
    data_source_error, ignore_not_found, read_or_gone, Configured, ManagedDataSource, ManagedResource,
};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::union::{self, Destination, NextHop, TypedValue};
use crate::value::Attr;

const DESTINATION_TYPES: &[&str] = &["cidrv4", "cidrv6"];
const NEXT_HOP_TYPES: &[&str] = &["blackhole", "internet", "ipv4", "ipv6"];

/// State of a route.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteModel {
    pub id: Attr<String>,
    pub organization_id: Attr<String>,
    pub network_area_id: Attr<String>,
    pub routing_table_id: Attr<String>,
    pub route_id: Attr<String>,
    pub region: Attr<String>,
    pub destination: Attr<TypedValue>,
    pub next_hop: Attr<TypedValue>,
    pub labels: Attr<Labels>,
    pub created_at: Attr<String>,
    pub updated_at: Attr<String>,
}

impl RouteModel {
    fn map_fields(&mut self, route: &Route, region: &str) -> Result<(), ProviderError> {
        let route_id = route
            .id
            .clone()
            .or_else(|| self.route_id.to_wire())
            .ok_or_else(|| ProviderError::mapping("route id not present"))?;
        let destination = union::from_wire::<Destination>(route.destination.as_ref())?;
        let next_hop = union::from_wire::<NextHop>(route.nexthop.as_ref())?;
        let organization_id = self.organization_id.require("organization_id")?;
        let network_area_id = self.network_area_id.require("network_area_id")?;
        let routing_table_id = self.routing_table_id.require("routing_table_id")?;

        self.id = Attr::Known(id::encode(&[
            organization_id.as_str(),
            region,
            network_area_id.as_str(),
            routing_table_id.as_str(),
            route_id.as_str(),
        ]));
        self.route_id = Attr::Known(route_id);
        self.region = Attr::known(region);
        self.destination = union::to_model(destination.as_ref());
        self.next_hop = union::to_model(next_hop.as_ref());
        self.labels = patch::labels_from_wire(route.labels.as_ref(), &self.labels);
        self.created_at = Attr::from_wire(route.created_at.clone());
        self.updated_at = Attr::from_wire(route.updated_at.clone());
        Ok(())
    }
}

/// One entry of a route list.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteEntryModel {
    pub route_id: Attr<String>,
    pub destination: Attr<TypedValue>,
    pub next_hop: Attr<TypedValue>,
    pub labels: Attr<Labels>,
    pub created_at: Attr<String>,
    pub updated_at: Attr<String>,
}

impl RouteEntryModel {
    fn from_wire(route: &Route) -> Result<Self, ProviderError> {
        let route_id = route
            .id
            .clone()
            .ok_or_else(|| ProviderError::mapping("route id not present"))?;
        let destination = union::from_wire::<Destination>(route.destination.as_ref())?;
        let next_hop = union::from_wire::<NextHop>(route.nexthop.as_ref())?;
        Ok(Self {
            route_id: Attr::Known(route_id),
            destination: union::to_model(destination.as_ref()),
            next_hop: union::to_model(next_hop.as_ref()),
            labels: patch::labels_from_wire(route.labels.as_ref(), &Attr::Null),
            created_at: Attr::from_wire(route.created_at.clone()),
            updated_at: Attr::from_wire(route.updated_at.clone()),
        })
    }
}

fn path_attributes(schema: Schema) -> Schema {
    schema
        .with_attribute(
            "organization_id",
            Attribute::required_id().with_description("STACKIT organization ID to which the routing table is associated."),
        )
        .with_attribute(
            "network_area_id",
            Attribute::required_id().with_description("The network area ID to which the routing table is associated."),
        )
        .with_attribute(
            "routing_table_id",
            Attribute::required_id().with_description("The routing tables ID."),
        )
        .with_attribute("region", Attribute::region())
}

fn computed_union(kinds: &[&str], description: &str) -> NestedBlock {
    let block = Block::new()
        .with_description(description)
        .with_attribute("type", Attribute::computed_string().one_of(kinds))
        .with_attribute("value", Attribute::computed_string());
    NestedBlock::single(block).computed()
}

fn route_entry_block() -> Block {
    Block::new()
        .with_attribute("route_id", Attribute::computed_id())
        .with_attribute(
            "labels",
            Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::computed()),
        )
        .with_attribute("created_at", Attribute::computed_string())
        .with_attribute("updated_at", Attribute::computed_string())
        .with_block("destination", computed_union(DESTINATION_TYPES, "Destination of the route."))
        .with_block("next_hop", computed_union(NEXT_HOP_TYPES, "Next hop destination."))
}

/// `stackit_routing_table_route` resource.
#[derive(Default)]
pub struct RouteResource {
    ctx: Configured<RoutingContext>,
}

impl RouteResource {
    fn table(
        &self,
        ctx: &RoutingContext,
        model: &RouteModel,
    ) -> Result<(RoutingTableRef, String), ProviderError> {
        let region = ctx.region(&model.region);
        let table = network_area(&model.organization_id, &model.network_area_id, region.clone())?
            .table(model.routing_table_id.require("routing_table_id")?);
        Ok((table, region))
    }
}

#[async_trait]
impl ManagedResource for RouteResource {
    type Model = RouteModel;
    const TYPE_NAME: &'static str = "stackit_routing_table_route";
    const IMPORT: ImportFormat = ImportFormat::new(&[
        "organization_id",
        "region",
        "network_area_id",
        "routing_table_id",
        "route_id",
    ]);

    fn schema() -> Schema {
        path_attributes(Schema::v0())
            .with_description("Routing table route resource schema. Must have the `region` specified in the provider configuration.")
            .with_attribute(
                "id",
                Attribute::computed_id().with_description(
                    "Terraform's internal resource ID. It is structured as \
                     \"`organization_id`,`region`,`network_area_id`,`routing_table_id`,`route_id`\".",
                ),
            )
            .with_attribute("route_id", Attribute::computed_id())
            .with_attribute("labels", Attribute::optional_string_map())
            .with_attribute("created_at", Attribute::computed_string().use_state_for_unknown())
            .with_attribute("updated_at", Attribute::computed_string())
            .with_block(
                "destination",
                NestedBlock::single(Block::typed_value(DESTINATION_TYPES).with_description("Destination of the route."))
                    .required()
                    .with_force_new(),
            )
            .with_block(
                "next_hop",
                NestedBlock::single(Block::typed_value(NEXT_HOP_TYPES).with_description("Next hop destination."))
                    .required()
                    .with_force_new(),
            )
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_routing(&self.ctx, data, clients, Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(routing_table_id = %plan.routing_table_id))]
    async fn create(&self, mut plan: RouteModel) -> Result<RouteModel, ProviderError> {
        let ctx = routing_context(&self.ctx, Self::TYPE_NAME)?;
        let (table, region) = self.table(ctx, &plan)?;

        let destination = union::from_model::<Destination>(&plan.destination)?
            .ok_or_else(|| ProviderError::Validation("destination must be set".into()))?;
        let next_hop = union::from_model::<NextHop>(&plan.next_hop)?
            .ok_or_else(|| ProviderError::Validation("next_hop must be set".into()))?;

        let payload = AddRoutesPayload {
            items: vec![Route {
                destination: Some(union::to_wire(&destination)),
                nexthop: Some(union::to_wire(&next_hop)),
                labels: plan.labels.to_wire(),
                ..Default::default()
            }],
        };
        let routes = ctx
            .client
            .add_routes(&table, payload)
            .await
            .map_err(|e| ProviderError::api("Creating route", e))?;
        let route = union::single_item(routes.items, "route")?;

        plan.map_fields(&route, &region)?;
        info!(route_id = %plan.route_id, "Routing table route created");
        Ok(plan)
    }

    #[instrument(skip_all, fields(route_id = %state.route_id))]
    async fn read(&self, mut state: RouteModel) -> Result<Option<RouteModel>, ProviderError> {
        let ctx = routing_context(&self.ctx, Self::TYPE_NAME)?;
        let (table, region) = self.table(ctx, &state)?;
        let route_id = state.route_id.require("route_id")?;

        let Some(route) = read_or_gone(ctx.client.get_route(&table, &route_id).await, "Reading route")? else {
            return Ok(None);
        };
        state.map_fields(&route, &region)?;
        info!("Routing table route read");
        Ok(Some(state))
    }

    #[instrument(skip_all, fields(route_id = %prior.route_id))]
    async fn update(&self, prior: RouteModel, mut plan: RouteModel) -> Result<RouteModel, ProviderError> {
        let ctx = routing_context(&self.ctx, Self::TYPE_NAME)?;
        let (table, region) = self.table(ctx, &prior)?;
        let route_id = prior.route_id.require("route_id")?;
        plan.route_id = prior.route_id.clone();

        let payload = UpdateRoutePayload {
            labels: patch::compute_update(&prior.labels, &plan.labels),
        };
        let route = ctx
            .client
            .update_route(&table, &route_id, payload)
            .await
            .map_err(|e| ProviderError::api("Updating route", e))?;

        plan.map_fields(&route, &region)?;
        info!("Routing table route updated");
        Ok(plan)
    }

    #[instrument(skip_all, fields(route_id = %state.route_id))]
    async fn delete(&self, state: RouteModel) -> Result<(), ProviderError> {
        let ctx = routing_context(&self.ctx, Self::TYPE_NAME)?;
        let (table, _) = self.table(ctx, &state)?;
        let route_id = state.route_id.require("route_id")?;

        ignore_not_found(ctx.client.delete_route(&table, &route_id).await, "Deleting route")?;
        info!("Routing table route deleted");
        Ok(())
    }
}

/// `stackit_routing_table_route` data source.
#[derive(Default)]
pub struct RouteDataSource {
    ctx: Configured<RoutingContext>,
}

#[async_trait]
impl ManagedDataSource for RouteDataSource {
    type Model = RouteModel;
    const TYPE_NAME: &'static str = "stackit_routing_table_route";

    fn schema() -> Schema {
        path_attributes(Schema::v0())
            .with_description("Routing table route datasource schema.")
            .with_attribute("id", Attribute::computed_id())
            .with_attribute("route_id", Attribute::required_id().with_description("Route ID."))
            .with_attribute(
                "labels",
                Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::computed()),
            )
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
            .with_block("destination", computed_union(DESTINATION_TYPES, "Destination of the route."))
            .with_block("next_hop", computed_union(NEXT_HOP_TYPES, "Next hop destination."))
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_routing(&self.ctx, data, clients, Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(route_id = %config.route_id))]
    async fn read(&self, mut config: RouteModel) -> Result<RouteModel, ProviderError> {
        let ctx = routing_context(&self.ctx, Self::TYPE_NAME)?;
        let region = ctx.region(&config.region);
        let table = network_area(&config.organization_id, &config.network_area_id, region.clone())?
            .table(config.routing_table_id.require("routing_table_id")?);
        let route_id = config.route_id.require("route_id")?;

        let route = ctx
            .client
            .get_route(&table, &route_id)
            .await
            .map_err(|e| data_source_error(&format!("route {:?}", route_id), e))?;
        config.map_fields(&route, &region)?;
        Ok(config)
    }
}

/// State of the routes list data source.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesModel {
    pub id: Attr<String>,
    pub organization_id: Attr<String>,
    pub network_area_id: Attr<String>,
    pub routing_table_id: Attr<String>,
    pub region: Attr<String>,
    pub routes: Attr<Vec<RouteEntryModel>>,
}

/// `stackit_routing_table_routes` data source.
#[derive(Default)]
pub struct RoutesDataSource {
    ctx: Configured<RoutingContext>,
}

#[async_trait]
impl ManagedDataSource for RoutesDataSource {
    type Model = RoutesModel;
    const TYPE_NAME: &'static str = "stackit_routing_table_routes";

    fn schema() -> Schema {
        path_attributes(Schema::v0())
            .with_description("Routing table routes datasource schema. Lists every route of a routing table.")
            .with_attribute("id", Attribute::computed_id())
            .with_block("routes", NestedBlock::list(route_entry_block()).computed())
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_routing(&self.ctx, data, clients, Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(routing_table_id = %config.routing_table_id))]
    async fn read(&self, mut config: RoutesModel) -> Result<RoutesModel, ProviderError> {
        let ctx = routing_context(&self.ctx, Self::TYPE_NAME)?;
        let region = ctx.region(&config.region);
        let routing_table_id = config.routing_table_id.require("routing_table_id")?;
        let area = network_area(&config.organization_id, &config.network_area_id, region.clone())?;
        let table = area.table(routing_table_id.as_str());

        let list = ctx
            .client
            .list_routes(&table)
            .await
            .map_err(|e| data_source_error(&format!("routes of routing table {:?}", routing_table_id), e))?;
        let routes = list
            .items
            .unwrap_or_default()
            .iter()
            .map(RouteEntryModel::from_wire)
            .collect::<Result<Vec<_>, _>>()?;

        config.id = Attr::Known(id::encode(&[
            area.organization_id.as_str(),
            region.as_str(),
            area.network_area_id.as_str(),
            routing_table_id.as_str(),
        ]));
        config.region = Attr::Known(region);
        config.routes = Attr::Known(routes);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::union::TaggedObject;

    fn tagged(kind: &str, value: Option<&str>) -> TaggedObject {
        TaggedObject {
            kind: Some(kind.to_string()),
            value: value.map(str::to_string),
        }
    }

    fn model() -> RouteModel {
        RouteModel {
            organization_id: Attr::known("org"),
            network_area_id: Attr::known("area"),
            routing_table_id: Attr::known("rt"),
            ..Default::default()
        }
    }

    #[test]
    fn test_map_fields() {
        let mut m = model();
        let route = Route {
            id: Some("r1".into()),
            destination: Some(tagged("cidrv4", Some("10.0.0.0/24"))),
            nexthop: Some(tagged("internet", None)),
            ..Default::default()
        };
        m.map_fields(&route, "eu01").unwrap();

        assert_eq!(m.id, Attr::known("org,eu01,area,rt,r1"));
        assert_eq!(m.destination, Attr::Known(TypedValue::new("cidrv4", Some("10.0.0.0/24"))));
        assert_eq!(m.next_hop, Attr::Known(TypedValue::new("internet", None)));
    }

    #[test]
    fn test_map_fields_rejects_empty_union_without_touching_state() {
        let mut m = model();
        let before = m.clone();
        let route = Route {
            id: Some("r1".into()),
            destination: Some(tagged("cidrv4", Some("10.0.0.0/24"))),
            nexthop: Some(TaggedObject::default()),
            ..Default::default()
        };
        assert!(m.map_fields(&route, "eu01").is_err());
        assert_eq!(m, before);
    }

    #[test]
    fn test_route_entry() {
        let entry = RouteEntryModel::from_wire(&Route {
            id: Some("r2".into()),
            destination: Some(tagged("cidrv6", Some("2001:db8::/32"))),
            nexthop: Some(tagged("ipv6", Some("2001:db8::1"))),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(entry.route_id, Attr::known("r2"));
        assert_eq!(entry.labels, Attr::Null);

        assert!(RouteEntryModel::from_wire(&Route::default()).is_err());
    }

    #[test]
    fn test_unions_force_replacement() {
        let schema = RouteResource::schema();
        assert!(schema.block.blocks["destination"].force_new);
        assert!(schema.block.blocks["next_hop"].force_new);
        assert!(!schema.block.attributes["labels"].force_new);
    }
}
