//! In-memory API collaborators.
//!
//! [`FakeStackit`] stands in for the IaaS, PostgreSQL Flex, Load Balancer and
//! Cloud Foundry APIs, [`FakeDsa`] for a data service. Both keep their state
//! behind a mutex, record every call by operation name and can be told to
//! fail an operation with a given [`ApiError`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::client::dsa::{
    CreateDsaInstancePayload, CreateDsaInstanceResponse, DsaApi, DsaInstance, ListOfferingsResponse,
    MariadbParameters, Offering, PartialUpdateDsaInstancePayload, RabbitmqParameters,
};
use crate::client::iaas::{
    AddRoutesPayload, AddRoutingTablePayload, NetworkAreaRef, Route, RouteList, RoutingTable, RoutingTableRef,
    UpdateRoutePayload, UpdateRoutingTablePayload,
};
use crate::client::loadbalancer::{CreateCredentialsPayload, Credential, CredentialResponse};
use crate::client::postgresflex::{
    Acl, CreateDatabasePayload, CreateDatabaseResponse, CreateInstancePayload, CreateInstanceResponse,
    CreateUserPayload, Database, Flavor, Instance, InstanceResponse, ListDatabasesResponse,
    ListFlavorsResponse, PartialUpdateInstancePayload, PartialUpdateUserPayload, User, UserResponse,
};
use crate::client::scf::OrgManager;
use crate::client::{
    ApiError, ApiResult, ClientFactory, InstanceRef, LoadBalancerApi, MariaDbApi, PostgresFlexApi, ProjectRef,
    RabbitMqApi, RoutingTableApi, ScfApi, DEFAULT_WAIT_TIMEOUT,
};
use crate::config::ProviderData;
use crate::error::ProviderError;

/// Timestamp stamped on everything the fakes create.
pub const FAKE_TIMESTAMP: &str = "2025-01-01T00:00:00Z";

/// Password handed out by the fakes on create.
pub const FAKE_PASSWORD: &str = "fake-password";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(what: &str) -> ApiError {
    ApiError::http(404, format!("{} not found", what))
}

/// Call log and failure injection shared by the fakes.
#[derive(Debug, Default)]
struct Calls {
    log: Vec<String>,
    failures: HashMap<String, ApiError>,
    next_id: u64,
}

impl Calls {
    fn record(&mut self, operation: &str) -> ApiResult<()> {
        self.log.push(operation.to_string());
        match self.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

#[derive(Debug, Default)]
struct StackitState {
    calls: Calls,
    routing_tables: HashMap<RoutingTableRef, RoutingTable>,
    routes: HashMap<RoutingTableRef, BTreeMap<String, Route>>,
    add_routes_response: Option<RouteList>,
    flavors: Vec<Flavor>,
    instances: HashMap<InstanceRef, Instance>,
    deleted_instances: HashSet<InstanceRef>,
    instance_updates: Vec<PartialUpdateInstancePayload>,
    databases: HashMap<InstanceRef, Vec<Database>>,
    database_page_size: Option<usize>,
    users: HashMap<(InstanceRef, String), User>,
    credentials: HashMap<(ProjectRef, String), Credential>,
    request_ids: Vec<String>,
    org_managers: HashMap<(ProjectRef, String), OrgManager>,
}

impl StackitState {
    fn begin(&mut self, operation: &str) -> ApiResult<&mut Self> {
        self.calls.record(operation)?;
        Ok(self)
    }

    fn live_instance(&self, instance: &InstanceRef) -> ApiResult<&Instance> {
        if self.deleted_instances.contains(instance) {
            return Err(not_found("instance"));
        }
        self.instances.get(instance).ok_or_else(|| not_found("instance"))
    }

    fn flavor(&self, flavor_id: &str) -> Flavor {
        self.flavors
            .iter()
            .find(|f| f.id.as_deref() == Some(flavor_id))
            .cloned()
            .unwrap_or_else(|| Flavor {
                id: Some(flavor_id.to_string()),
                ..Default::default()
            })
    }
}

/// In-memory IaaS, PostgreSQL Flex, Load Balancer and Cloud Foundry APIs.
#[derive(Debug, Default)]
pub struct FakeStackit {
    state: Mutex<StackitState>,
}

impl FakeStackit {
    /// An empty fake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `operation` fail with `err`.
    pub fn fail(&self, operation: &str, err: ApiError) {
        lock(&self.state).calls.failures.insert(operation.to_string(), err);
    }

    /// Stop failing calls.
    pub fn clear_failures(&self) {
        lock(&self.state).calls.failures.clear();
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.log.clone()
    }

    /// Number of calls of `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.state).calls.log.iter().filter(|c| *c == operation).count()
    }

    /// Flavors returned by `list_flavors`.
    pub fn set_flavors(&self, flavors: Vec<Flavor>) {
        lock(&self.state).flavors = flavors;
    }

    /// Return `response` from the next `add_routes` call instead of the
    /// stored routes.
    pub fn set_add_routes_response(&self, response: RouteList) {
        lock(&self.state).add_routes_response = Some(response);
    }

    /// Store a routing table as-is.
    pub fn insert_routing_table(&self, table: RoutingTableRef, routing_table: RoutingTable) {
        lock(&self.state).routing_tables.insert(table, routing_table);
    }

    /// Store a route as-is. The route must carry an id.
    pub fn insert_route(&self, table: &RoutingTableRef, route: Route) {
        let id = route.id.clone().unwrap_or_default();
        lock(&self.state).routes.entry(table.clone()).or_default().insert(id, route);
    }

    /// A stored routing table.
    pub fn routing_table(&self, table: &RoutingTableRef) -> Option<RoutingTable> {
        lock(&self.state).routing_tables.get(table).cloned()
    }

    /// Stored routes of a routing table.
    pub fn routes(&self, table: &RoutingTableRef) -> Vec<Route> {
        lock(&self.state)
            .routes
            .get(table)
            .map(|routes| routes.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Store an instance as-is.
    pub fn insert_instance(&self, instance: InstanceRef, item: Instance) {
        let mut state = lock(&self.state);
        state.deleted_instances.remove(&instance);
        state.instances.insert(instance, item);
    }

    /// A stored instance, including deleted ones.
    pub fn instance(&self, instance: &InstanceRef) -> Option<Instance> {
        lock(&self.state).instances.get(instance).cloned()
    }

    /// Store a database of an instance.
    pub fn insert_database(&self, instance: &InstanceRef, database: Database) {
        lock(&self.state).databases.entry(instance.clone()).or_default().push(database);
    }

    /// Databases per `list_databases` page. Unset means one page.
    pub fn set_database_page_size(&self, size: usize) {
        lock(&self.state).database_page_size = Some(size.max(1));
    }

    /// Stored databases of an instance.
    pub fn databases(&self, instance: &InstanceRef) -> Vec<Database> {
        lock(&self.state).databases.get(instance).cloned().unwrap_or_default()
    }

    /// A stored user.
    pub fn user(&self, instance: &InstanceRef, user_id: &str) -> Option<User> {
        lock(&self.state).users.get(&(instance.clone(), user_id.to_string())).cloned()
    }

    /// Bodies of postgres instance partial updates, oldest first.
    pub fn instance_updates(&self) -> Vec<PartialUpdateInstancePayload> {
        lock(&self.state).instance_updates.clone()
    }

    /// Request ids sent with credential creates.
    pub fn request_ids(&self) -> Vec<String> {
        lock(&self.state).request_ids.clone()
    }

    /// Number of stored credentials.
    pub fn credential_count(&self) -> usize {
        lock(&self.state).credentials.len()
    }
}

#[async_trait]
impl RoutingTableApi for FakeStackit {
    async fn add_routing_table(&self, area: &NetworkAreaRef, payload: AddRoutingTablePayload) -> ApiResult<RoutingTable> {
        let mut guard = lock(&self.state);
        let state = guard.begin("add_routing_table")?;
        let id = state.calls.next_id("rt");
        let table = RoutingTable {
            id: Some(id.clone()),
            name: Some(payload.name),
            description: payload.description,
            labels: payload.labels,
            default: Some(false),
            system_routes: Some(payload.system_routes.unwrap_or(true)),
            created_at: Some(FAKE_TIMESTAMP.into()),
            updated_at: Some(FAKE_TIMESTAMP.into()),
        };
        state.routing_tables.insert(area.table(id), table.clone());
        Ok(table)
    }

    async fn get_routing_table(&self, table: &RoutingTableRef) -> ApiResult<RoutingTable> {
        let mut guard = lock(&self.state);
        let state = guard.begin("get_routing_table")?;
        state.routing_tables.get(table).cloned().ok_or_else(|| not_found("routing table"))
    }

    async fn update_routing_table(
        &self,
        table: &RoutingTableRef,
        payload: UpdateRoutingTablePayload,
    ) -> ApiResult<RoutingTable> {
        let mut guard = lock(&self.state);
        let state = guard.begin("update_routing_table")?;
        let stored = state.routing_tables.get_mut(table).ok_or_else(|| not_found("routing table"))?;
        if let Some(name) = payload.name {
            stored.name = Some(name);
        }
        if let Some(description) = payload.description {
            stored.description = Some(description);
        }
        if let Some(patch) = payload.labels {
            stored.labels = Some(patch.apply(&stored.labels.clone().unwrap_or_default()));
        }
        Ok(stored.clone())
    }

    async fn delete_routing_table(&self, table: &RoutingTableRef) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("delete_routing_table")?;
        state.routes.remove(table);
        state.routing_tables.remove(table).map(|_| ()).ok_or_else(|| not_found("routing table"))
    }

    async fn add_routes(&self, table: &RoutingTableRef, payload: AddRoutesPayload) -> ApiResult<RouteList> {
        let mut guard = lock(&self.state);
        let state = guard.begin("add_routes")?;
        if let Some(response) = state.add_routes_response.take() {
            return Ok(response);
        }
        if !state.routing_tables.contains_key(table) {
            return Err(not_found("routing table"));
        }
        let mut created = Vec::with_capacity(payload.items.len());
        for item in payload.items {
            let id = state.calls.next_id("route");
            let route = Route {
                id: Some(id.clone()),
                created_at: Some(FAKE_TIMESTAMP.into()),
                updated_at: Some(FAKE_TIMESTAMP.into()),
                ..item
            };
            state.routes.entry(table.clone()).or_default().insert(id, route.clone());
            created.push(route);
        }
        Ok(RouteList { items: Some(created) })
    }

    async fn list_routes(&self, table: &RoutingTableRef) -> ApiResult<RouteList> {
        let mut guard = lock(&self.state);
        let state = guard.begin("list_routes")?;
        if !state.routing_tables.contains_key(table) {
            return Err(not_found("routing table"));
        }
        let items = state
            .routes
            .get(table)
            .map(|routes| routes.values().cloned().collect())
            .unwrap_or_default();
        Ok(RouteList { items: Some(items) })
    }

    async fn get_route(&self, table: &RoutingTableRef, route_id: &str) -> ApiResult<Route> {
        let mut guard = lock(&self.state);
        let state = guard.begin("get_route")?;
        state
            .routes
            .get(table)
            .and_then(|routes| routes.get(route_id))
            .cloned()
            .ok_or_else(|| not_found("route"))
    }

    async fn update_route(&self, table: &RoutingTableRef, route_id: &str, payload: UpdateRoutePayload) -> ApiResult<Route> {
        let mut guard = lock(&self.state);
        let state = guard.begin("update_route")?;
        let route = state
            .routes
            .get_mut(table)
            .and_then(|routes| routes.get_mut(route_id))
            .ok_or_else(|| not_found("route"))?;
        if let Some(patch) = payload.labels {
            route.labels = Some(patch.apply(&route.labels.clone().unwrap_or_default()));
        }
        Ok(route.clone())
    }

    async fn delete_route(&self, table: &RoutingTableRef, route_id: &str) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("delete_route")?;
        state
            .routes
            .get_mut(table)
            .and_then(|routes| routes.remove(route_id))
            .map(|_| ())
            .ok_or_else(|| not_found("route"))
    }
}

#[async_trait]
impl PostgresFlexApi for FakeStackit {
    async fn list_flavors(&self, _project: &ProjectRef) -> ApiResult<ListFlavorsResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("list_flavors")?;
        Ok(ListFlavorsResponse {
            flavors: Some(state.flavors.clone()),
        })
    }

    async fn create_instance(&self, project: &ProjectRef, payload: CreateInstancePayload) -> ApiResult<CreateInstanceResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("create_instance")?;
        let id = state.calls.next_id("pg");
        let instance = Instance {
            id: Some(id.clone()),
            name: Some(payload.name),
            acl: Some(payload.acl),
            backup_schedule: Some(payload.backup_schedule),
            flavor: Some(state.flavor(&payload.flavor_id)),
            replicas: Some(payload.replicas),
            storage: Some(payload.storage),
            version: Some(payload.version),
            status: Some("Ready".into()),
        };
        state.instances.insert(project.instance(id.clone()), instance);
        Ok(CreateInstanceResponse { id: Some(id) })
    }

    async fn get_instance(&self, instance: &InstanceRef) -> ApiResult<InstanceResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("get_instance")?;
        let item = state.live_instance(instance)?.clone();
        Ok(InstanceResponse { item: Some(item) })
    }

    async fn partial_update_instance(&self, instance: &InstanceRef, payload: PartialUpdateInstancePayload) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("partial_update_instance")?;
        state.live_instance(instance)?;
        state.instance_updates.push(payload.clone());
        let flavor = payload.flavor_id.as_deref().map(|id| state.flavor(id));
        let Some(stored) = state.instances.get_mut(instance) else {
            return Err(not_found("instance"));
        };
        if let Some(name) = payload.name {
            stored.name = Some(name);
        }
        if let Some(acl) = payload.acl {
            stored.acl = Some(acl);
        }
        if let Some(schedule) = payload.backup_schedule {
            stored.backup_schedule = Some(schedule);
        }
        if flavor.is_some() {
            stored.flavor = flavor;
        }
        if let Some(replicas) = payload.replicas {
            stored.replicas = Some(replicas);
        }
        if let Some(storage) = payload.storage {
            stored.storage = Some(storage);
        }
        if let Some(version) = payload.version {
            stored.version = Some(version);
        }
        Ok(())
    }

    async fn delete_instance(&self, instance: &InstanceRef) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("delete_instance")?;
        state.live_instance(instance)?;
        state.deleted_instances.insert(instance.clone());
        Ok(())
    }

    async fn force_delete_instance(&self, instance: &InstanceRef) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("force_delete_instance")?;
        state.deleted_instances.remove(instance);
        state.databases.remove(instance);
        state.users.retain(|(i, _), _| i != instance);
        state.instances.remove(instance).map(|_| ()).ok_or_else(|| not_found("instance"))
    }

    async fn wait_instance_created(&self, instance: &InstanceRef) -> ApiResult<InstanceResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("wait_instance_created")?;
        let item = state.live_instance(instance)?.clone();
        Ok(InstanceResponse { item: Some(item) })
    }

    async fn wait_instance_updated(&self, instance: &InstanceRef) -> ApiResult<InstanceResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("wait_instance_updated")?;
        let item = state.live_instance(instance)?.clone();
        Ok(InstanceResponse { item: Some(item) })
    }

    async fn wait_instance_deleted(&self, instance: &InstanceRef) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("wait_instance_deleted")?;
        if state.instances.contains_key(instance) && !state.deleted_instances.contains(instance) {
            return Err(ApiError::Timeout {
                operation: "instance deletion".into(),
                after: DEFAULT_WAIT_TIMEOUT,
            });
        }
        Ok(())
    }

    async fn wait_instance_force_deleted(&self, instance: &InstanceRef) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("wait_instance_force_deleted")?;
        if state.instances.contains_key(instance) {
            return Err(ApiError::Timeout {
                operation: "instance force deletion".into(),
                after: DEFAULT_WAIT_TIMEOUT,
            });
        }
        Ok(())
    }

    async fn create_database(&self, instance: &InstanceRef, payload: CreateDatabasePayload) -> ApiResult<CreateDatabaseResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("create_database")?;
        state.live_instance(instance)?;
        let id = state.calls.next_id("db");
        let options = payload
            .options
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        state.databases.entry(instance.clone()).or_default().push(Database {
            id: Some(id.clone()),
            name: Some(payload.name),
            options: Some(options),
        });
        Ok(CreateDatabaseResponse { id: Some(id) })
    }

    async fn list_databases(&self, instance: &InstanceRef, page: u32) -> ApiResult<ListDatabasesResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("list_databases")?;
        state.live_instance(instance)?;
        let all = state.databases.get(instance).cloned().unwrap_or_default();
        let size = state.database_page_size.unwrap_or(all.len().max(1));
        let total_pages = all.len().div_ceil(size).max(1);
        let start = (page.max(1) as usize - 1) * size;
        let databases = all.into_iter().skip(start).take(size).collect();
        Ok(ListDatabasesResponse {
            databases: Some(databases),
            total_pages: u32::try_from(total_pages).ok(),
        })
    }

    async fn delete_database(&self, instance: &InstanceRef, database_id: &str) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("delete_database")?;
        let databases = state.databases.get_mut(instance).ok_or_else(|| not_found("database"))?;
        let before = databases.len();
        databases.retain(|d| d.id.as_deref() != Some(database_id));
        if databases.len() == before {
            return Err(not_found("database"));
        }
        Ok(())
    }

    async fn create_user(&self, instance: &InstanceRef, payload: CreateUserPayload) -> ApiResult<UserResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("create_user")?;
        state.live_instance(instance)?;
        let id = state.calls.next_id("user");
        let stored = User {
            id: Some(id.clone()),
            username: Some(payload.username.clone()),
            roles: Some(payload.roles),
            password: None,
            host: Some("postgres.fake".into()),
            port: Some(5432),
            uri: None,
        };
        state.users.insert((instance.clone(), id), stored.clone());
        Ok(UserResponse {
            item: Some(User {
                password: Some(FAKE_PASSWORD.into()),
                uri: Some(format!(
                    "postgresql://{}:{}@postgres.fake:5432/default",
                    payload.username, FAKE_PASSWORD
                )),
                ..stored
            }),
        })
    }

    async fn get_user(&self, instance: &InstanceRef, user_id: &str) -> ApiResult<UserResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("get_user")?;
        let user = state
            .users
            .get(&(instance.clone(), user_id.to_string()))
            .cloned()
            .ok_or_else(|| not_found("user"))?;
        Ok(UserResponse { item: Some(user) })
    }

    async fn partial_update_user(&self, instance: &InstanceRef, user_id: &str, payload: PartialUpdateUserPayload) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("partial_update_user")?;
        let user = state
            .users
            .get_mut(&(instance.clone(), user_id.to_string()))
            .ok_or_else(|| not_found("user"))?;
        if let Some(roles) = payload.roles {
            user.roles = Some(roles);
        }
        Ok(())
    }

    async fn delete_user(&self, instance: &InstanceRef, user_id: &str) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("delete_user")?;
        state
            .users
            .remove(&(instance.clone(), user_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found("user"))
    }
}

#[async_trait]
impl LoadBalancerApi for FakeStackit {
    async fn create_credentials(
        &self,
        project: &ProjectRef,
        request_id: &str,
        payload: CreateCredentialsPayload,
    ) -> ApiResult<CredentialResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("create_credentials")?;
        state.request_ids.push(request_id.to_string());
        let credentials_ref = state.calls.next_id("credentials");
        let credential = Credential {
            credentials_ref: Some(credentials_ref.clone()),
            display_name: Some(payload.display_name),
            username: Some(payload.username),
        };
        state.credentials.insert((project.clone(), credentials_ref), credential.clone());
        Ok(CredentialResponse {
            credential: Some(credential),
        })
    }

    async fn get_credentials(&self, project: &ProjectRef, credentials_ref: &str) -> ApiResult<CredentialResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("get_credentials")?;
        let credential = state
            .credentials
            .get(&(project.clone(), credentials_ref.to_string()))
            .cloned()
            .ok_or_else(|| not_found("credential"))?;
        Ok(CredentialResponse {
            credential: Some(credential),
        })
    }

    async fn delete_credentials(&self, project: &ProjectRef, credentials_ref: &str) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("delete_credentials")?;
        state
            .credentials
            .remove(&(project.clone(), credentials_ref.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found("credential"))
    }
}

#[async_trait]
impl ScfApi for FakeStackit {
    async fn create_org_manager(&self, project: &ProjectRef, org_id: &str) -> ApiResult<OrgManager> {
        let mut guard = lock(&self.state);
        let state = guard.begin("create_org_manager")?;
        let key = (project.clone(), org_id.to_string());
        if state.org_managers.contains_key(&key) {
            return Err(ApiError::http(409, "organization already has a manager"));
        }
        let guid = state.calls.next_id("manager");
        let manager = OrgManager {
            guid: Some(guid),
            org_id: Some(org_id.to_string()),
            platform_id: Some("cf-platform".into()),
            project_id: Some(project.project_id.clone()),
            region: Some(project.region.clone()),
            username: Some(format!("manager-{}", org_id)),
            password: None,
            created_at: Some(FAKE_TIMESTAMP.into()),
            updated_at: Some(FAKE_TIMESTAMP.into()),
        };
        state.org_managers.insert(key, manager.clone());
        Ok(OrgManager {
            password: Some(FAKE_PASSWORD.into()),
            ..manager
        })
    }

    async fn get_org_manager(&self, project: &ProjectRef, org_id: &str) -> ApiResult<OrgManager> {
        let mut guard = lock(&self.state);
        let state = guard.begin("get_org_manager")?;
        state
            .org_managers
            .get(&(project.clone(), org_id.to_string()))
            .cloned()
            .ok_or_else(|| not_found("organization manager"))
    }

    async fn delete_org_manager(&self, project: &ProjectRef, org_id: &str) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("delete_org_manager")?;
        state
            .org_managers
            .remove(&(project.clone(), org_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found("organization manager"))
    }
}

#[derive(Debug)]
struct DsaState<P> {
    calls: Calls,
    offerings: Vec<Offering>,
    instances: HashMap<InstanceRef, DsaInstance<P>>,
    dashboard_urls: bool,
}

impl<P> Default for DsaState<P> {
    fn default() -> Self {
        Self {
            calls: Calls::default(),
            offerings: Vec::new(),
            instances: HashMap::new(),
            dashboard_urls: true,
        }
    }
}

impl<P: Clone> DsaState<P> {
    fn begin(&mut self, operation: &str) -> ApiResult<&mut Self> {
        self.calls.record(operation)?;
        Ok(self)
    }

    fn instance(&self, instance: &InstanceRef) -> ApiResult<DsaInstance<P>> {
        self.instances.get(instance).cloned().ok_or_else(|| not_found("instance"))
    }
}

/// In-memory data service API.
#[derive(Debug)]
pub struct FakeDsa<P> {
    state: Mutex<DsaState<P>>,
}

impl<P> Default for FakeDsa<P> {
    fn default() -> Self {
        Self {
            state: Mutex::new(DsaState::default()),
        }
    }
}

impl<P: Clone> FakeDsa<P> {
    /// Offerings returned by `list_offerings`.
    pub fn set_offerings(&self, offerings: Vec<Offering>) {
        lock(&self.state).offerings = offerings;
    }

    /// Whether instances report a dashboard URL.
    pub fn set_dashboard_urls(&self, enabled: bool) {
        lock(&self.state).dashboard_urls = enabled;
    }

    /// Make every call of `operation` fail with `err`.
    pub fn fail(&self, operation: &str, err: ApiError) {
        lock(&self.state).calls.failures.insert(operation.to_string(), err);
    }

    /// Operation names in call order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.log.clone()
    }

    /// A stored instance.
    pub fn instance(&self, instance: &InstanceRef) -> Option<DsaInstance<P>> {
        lock(&self.state).instances.get(instance).cloned()
    }
}

#[async_trait]
impl<P> DsaApi for FakeDsa<P>
where
    P: std::fmt::Debug
        + Clone
        + Default
        + PartialEq
        + serde::Serialize
        + serde::de::DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    type Parameters = P;

    async fn list_offerings(&self, _project: &ProjectRef) -> ApiResult<ListOfferingsResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("list_offerings")?;
        Ok(ListOfferingsResponse {
            offerings: Some(state.offerings.clone()),
        })
    }

    async fn create_instance(
        &self,
        project: &ProjectRef,
        payload: CreateDsaInstancePayload<P>,
    ) -> ApiResult<CreateDsaInstanceResponse> {
        let mut guard = lock(&self.state);
        let state = guard.begin("create_instance")?;
        let id = state.calls.next_id("dsa");
        let instance = DsaInstance {
            instance_id: Some(id.clone()),
            name: Some(payload.instance_name),
            plan_id: Some(payload.plan_id),
            dashboard_url: state
                .dashboard_urls
                .then(|| format!("https://dashboard.fake/{}", id)),
            cf_guid: Some(format!("cf-{}", id)),
            cf_space_guid: Some("cf-space".into()),
            cf_organization_guid: Some("cf-org".into()),
            image_url: Some(format!("https://image.fake/{}", id)),
            parameters: Some(payload.parameters.unwrap_or_default()),
        };
        state.instances.insert(project.instance(id.clone()), instance);
        Ok(CreateDsaInstanceResponse { instance_id: Some(id) })
    }

    async fn get_instance(&self, instance: &InstanceRef) -> ApiResult<DsaInstance<P>> {
        let mut guard = lock(&self.state);
        guard.begin("get_instance")?.instance(instance)
    }

    async fn partial_update_instance(
        &self,
        instance: &InstanceRef,
        payload: PartialUpdateDsaInstancePayload<P>,
    ) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("partial_update_instance")?;
        let stored = state.instances.get_mut(instance).ok_or_else(|| not_found("instance"))?;
        if let Some(plan_id) = payload.plan_id {
            stored.plan_id = Some(plan_id);
        }
        if let Some(parameters) = payload.parameters {
            stored.parameters = Some(parameters);
        }
        Ok(())
    }

    async fn delete_instance(&self, instance: &InstanceRef) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("delete_instance")?;
        state.instances.remove(instance).map(|_| ()).ok_or_else(|| not_found("instance"))
    }

    async fn wait_instance_created(&self, instance: &InstanceRef) -> ApiResult<DsaInstance<P>> {
        let mut guard = lock(&self.state);
        guard.begin("wait_instance_created")?.instance(instance)
    }

    async fn wait_instance_updated(&self, instance: &InstanceRef) -> ApiResult<DsaInstance<P>> {
        let mut guard = lock(&self.state);
        guard.begin("wait_instance_updated")?.instance(instance)
    }

    async fn wait_instance_deleted(&self, instance: &InstanceRef) -> ApiResult<()> {
        let mut guard = lock(&self.state);
        let state = guard.begin("wait_instance_deleted")?;
        if state.instances.contains_key(instance) {
            return Err(ApiError::Timeout {
                operation: "instance deletion".into(),
                after: DEFAULT_WAIT_TIMEOUT,
            });
        }
        Ok(())
    }
}

/// A [`ClientFactory`] handing out shared fakes.
///
/// Clones share state, so a test can keep one handle and give another to the
/// provider.
#[derive(Debug, Clone, Default)]
pub struct FakeClientFactory {
    /// IaaS, PostgreSQL Flex, Load Balancer and Cloud Foundry.
    pub stackit: Arc<FakeStackit>,
    /// RabbitMQ.
    pub rabbitmq: Arc<FakeDsa<RabbitmqParameters>>,
    /// MariaDB.
    pub mariadb: Arc<FakeDsa<MariadbParameters>>,
}

impl ClientFactory for FakeClientFactory {
    fn routing_tables(&self, _data: &ProviderData) -> Result<Arc<dyn RoutingTableApi>, ProviderError> {
        Ok(self.stackit.clone())
    }

    fn postgres_flex(&self, _data: &ProviderData) -> Result<Arc<dyn PostgresFlexApi>, ProviderError> {
        Ok(self.stackit.clone())
    }

    fn rabbitmq(&self, _data: &ProviderData) -> Result<Arc<RabbitMqApi>, ProviderError> {
        Ok(self.rabbitmq.clone())
    }

    fn mariadb(&self, _data: &ProviderData) -> Result<Arc<MariaDbApi>, ProviderError> {
        Ok(self.mariadb.clone())
    }

    fn load_balancer(&self, _data: &ProviderData) -> Result<Arc<dyn LoadBalancerApi>, ProviderError> {
        Ok(self.stackit.clone())
    }

    fn scf(&self, _data: &ProviderData) -> Result<Arc<dyn ScfApi>, ProviderError> {
        Ok(self.stackit.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> InstanceRef {
        ProjectRef::new("p", "eu01").instance("i")
    }

    #[tokio::test]
    async fn test_database_pages() {
        let fake = FakeStackit::new();
        fake.insert_instance(instance(), Instance::default());
        fake.set_database_page_size(2);
        for name in ["a", "b", "c"] {
            fake.insert_database(
                &instance(),
                Database {
                    name: Some(name.into()),
                    ..Default::default()
                },
            );
        }

        let first = fake.list_databases(&instance(), 1).await.unwrap();
        assert_eq!(first.databases.unwrap().len(), 2);
        assert_eq!(first.total_pages, Some(2));
        let second = fake.list_databases(&instance(), 2).await.unwrap();
        assert_eq!(second.databases.unwrap().len(), 1);
        let third = fake.list_databases(&instance(), 3).await.unwrap();
        assert!(third.databases.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let fake = FakeStackit::new();
        fake.fail("get_instance", ApiError::http(403, "forbidden"));
        let err = fake.get_instance(&instance()).await.unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(fake.call_count("get_instance"), 1);

        fake.clear_failures();
        assert!(fake.get_instance(&instance()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_deleted_instance_is_gone_until_force_deleted() {
        let fake = FakeStackit::new();
        fake.insert_instance(instance(), Instance::default());
        fake.delete_instance(&instance()).await.unwrap();

        assert!(fake.get_instance(&instance()).await.unwrap_err().is_not_found());
        assert!(fake.wait_instance_force_deleted(&instance()).await.is_err());
        fake.force_delete_instance(&instance()).await.unwrap();
        fake.wait_instance_force_deleted(&instance()).await.unwrap();
    }
}
