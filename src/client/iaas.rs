//! IaaS routing table API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::patch::{Labels, MergePatch};
use crate::union::TaggedObject;

/// Address of a network area in a region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkAreaRef {
    /// Organization id.
    pub organization_id: String,
    /// Network area id.
    pub network_area_id: String,
    /// Region.
    pub region: String,
}

impl NetworkAreaRef {
    /// Address of one routing table in this area.
    pub fn table(&self, routing_table_id: impl Into<String>) -> RoutingTableRef {
        RoutingTableRef {
            area: self.clone(),
            routing_table_id: routing_table_id.into(),
        }
    }
}

/// Address of a routing table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingTableRef {
    /// The network area holding the table.
    pub area: NetworkAreaRef,
    /// Routing table id.
    pub routing_table_id: String,
}

/// A routing table as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingTable {
    /// Routing table id.
    pub id: Option<String>,
    /// Name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Labels.
    pub labels: Option<Labels>,
    /// Whether this is the area's default table.
    pub default: Option<bool>,
    /// Whether system routes are installed.
    pub system_routes: Option<bool>,
    /// Creation timestamp.
    pub created_at: Option<String>,
    /// Last update timestamp.
    pub updated_at: Option<String>,
}

/// Body of a routing table create call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRoutingTablePayload {
    /// Name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    /// Whether system routes are installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_routes: Option<bool>,
}

/// Body of a routing table partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoutingTablePayload {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Label changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<MergePatch>,
}

/// A route as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Route id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Destination union.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<TaggedObject>,
    /// Next-hop union.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nexthop: Option<TaggedObject>,
    /// Labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    /// Creation timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last update timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Body of a route create call. The API takes a list even for one route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRoutesPayload {
    /// Routes to add.
    pub items: Vec<Route>,
}

/// A list of routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteList {
    /// The routes.
    pub items: Option<Vec<Route>>,
}

/// Body of a route partial update. Only labels can change in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRoutePayload {
    /// Label changes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<MergePatch>,
}

/// Routing tables and routes of network areas.
#[async_trait]
pub trait RoutingTableApi: Send + Sync {
    /// Create a routing table.
    async fn add_routing_table(
        &self,
        area: &NetworkAreaRef,
        payload: AddRoutingTablePayload,
    ) -> ApiResult<RoutingTable>;

    /// Get a routing table.
    async fn get_routing_table(&self, table: &RoutingTableRef) -> ApiResult<RoutingTable>;

    /// Update a routing table.
    async fn update_routing_table(
        &self,
        table: &RoutingTableRef,
        payload: UpdateRoutingTablePayload,
    ) -> ApiResult<RoutingTable>;

    /// Delete a routing table.
    async fn delete_routing_table(&self, table: &RoutingTableRef) -> ApiResult<()>;

    /// Add routes to a routing table.
    async fn add_routes(&self, table: &RoutingTableRef, payload: AddRoutesPayload) -> ApiResult<RouteList>;

    /// List the routes of a routing table.
    async fn list_routes(&self, table: &RoutingTableRef) -> ApiResult<RouteList>;

    /// Get one route.
    async fn get_route(&self, table: &RoutingTableRef, route_id: &str) -> ApiResult<Route>;

    /// Update a route.
    async fn update_route(
        &self,
        table: &RoutingTableRef,
        route_id: &str,
        payload: UpdateRoutePayload,
    ) -> ApiResult<Route>;

    /// Delete a route.
    async fn delete_route(&self, table: &RoutingTableRef, route_id: &str) -> ApiResult<()>;
}
