//! The STACKIT provider.
//!
//! [`StackitProvider`] dispatches every host call through a [`Registry`]
//! built once at construction: resource-type name to [`Resource`],
//! data-source name to [`DataSource`].

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::client::ClientFactory;
use crate::config::{ProviderConfig, ProviderData};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::resource::{DataSource, DataSourceAdapter, ManagedDataSource, ManagedResource, Resource, ResourceAdapter};
use crate::resources::postgresflex::{
    DatabaseDataSource, DatabaseResource, InstanceDataSource, InstanceResource, UserDataSource, UserResource,
};
use crate::resources::{
    MariaDbInstanceDataSource, MariaDbInstanceResource, ObservabilityCredentialResource, OrgManagerResource,
    RabbitMqInstanceDataSource, RabbitMqInstanceResource, RouteDataSource, RouteResource, RoutesDataSource,
    RoutingTableDataSource, RoutingTableResource,
};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// Resource and data source implementations by type name.
#[derive(Default)]
pub struct Registry {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every STACKIT resource and data source.
    pub fn stackit() -> Self {
        Self::new()
            .with_resource(RoutingTableResource::default())
            .with_resource(RouteResource::default())
            .with_resource(InstanceResource::default())
            .with_resource(DatabaseResource::default())
            .with_resource(UserResource::default())
            .with_resource(RabbitMqInstanceResource::default())
            .with_resource(MariaDbInstanceResource::default())
            .with_resource(ObservabilityCredentialResource::default())
            .with_resource(OrgManagerResource::default())
            .with_data_source(RoutingTableDataSource::default())
            .with_data_source(RouteDataSource::default())
            .with_data_source(RoutesDataSource::default())
            .with_data_source(InstanceDataSource::default())
            .with_data_source(DatabaseDataSource::default())
            .with_data_source(UserDataSource::default())
            .with_data_source(RabbitMqInstanceDataSource::default())
            .with_data_source(MariaDbInstanceDataSource::default())
    }

    /// Register a resource under its type name.
    pub fn with_resource<R: ManagedResource>(mut self, resource: R) -> Self {
        self.resources.insert(R::TYPE_NAME, Arc::new(ResourceAdapter(resource)));
        self
    }

    /// Register a data source under its type name.
    pub fn with_data_source<D: ManagedDataSource>(mut self, data_source: D) -> Self {
        self.data_sources.insert(D::TYPE_NAME, Arc::new(DataSourceAdapter(data_source)));
        self
    }

    /// Look up a resource.
    pub fn resource(&self, type_name: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// Look up a data source.
    pub fn data_source(&self, type_name: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(format!("data source {}", type_name)))
    }

    /// Registered resources.
    pub fn resources(&self) -> impl Iterator<Item = &Arc<dyn Resource>> {
        self.resources.values()
    }

    /// Registered data sources.
    pub fn data_sources(&self) -> impl Iterator<Item = &Arc<dyn DataSource>> {
        self.data_sources.values()
    }
}

type EnvLookup = fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// The STACKIT provider.
pub struct StackitProvider {
    registry: Registry,
    clients: Arc<dyn ClientFactory>,
    data: OnceLock<Arc<ProviderData>>,
    env: EnvLookup,
}

impl StackitProvider {
    /// A provider with every STACKIT resource, building API clients with
    /// `clients`.
    pub fn new(clients: impl ClientFactory + 'static) -> Self {
        Self::with_registry(Registry::stackit(), clients)
    }

    /// A provider with a custom registry.
    pub fn with_registry(registry: Registry, clients: impl ClientFactory + 'static) -> Self {
        Self {
            registry,
            clients: Arc::new(clients),
            data: OnceLock::new(),
            env: process_env,
        }
    }

    /// Resolve unset settings from `env` instead of the process environment.
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    /// The registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolved provider settings.
    pub fn provider_data(&self) -> Result<&Arc<ProviderData>, ProviderError> {
        self.data
            .get()
            .ok_or_else(|| ProviderError::FailedPrecondition("provider is not configured".into()))
    }
}

#[async_trait]
impl ProviderService for StackitProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        for resource in self.registry.resources() {
            schema = schema.with_resource(resource.type_name(), resource.schema());
        }
        for data_source in self.registry.data_sources() {
            schema = schema.with_data_source(data_source.type_name(), data_source.schema());
        }
        schema
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&ProviderConfig::schema(), &config);
        if let Err(e) = ProviderConfig::from_value(config) {
            diagnostics.push(Diagnostic::error("Invalid provider configuration").with_detail(e.message()));
        }
        Ok(diagnostics)
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let data = Arc::new(ProviderConfig::from_value(config)?.resolve_with(self.env)?);
        self.data
            .set(Arc::clone(&data))
            .map_err(|_| ProviderError::FailedPrecondition("provider is already configured".into()))?;

        for resource in self.registry.resources() {
            resource.configure(Arc::clone(&data), self.clients.as_ref())?;
        }
        for data_source in self.registry.data_sources() {
            data_source.configure(Arc::clone(&data), self.clients.as_ref())?;
        }
        info!(default_region = %data.default_region, "Provider configured");
        Ok(vec![])
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.registry.resource(resource_type)?;
        Ok(validate(&resource.schema(), &config))
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let current = self.registry.resource(resource_type)?.schema().version;
        if u64::try_from(version).ok() != Some(current) {
            return Err(ProviderError::InvalidRequest(format!(
                "cannot upgrade {} state from schema version {} to {}",
                resource_type, version, current
            )));
        }
        Ok(state)
    }

    #[instrument(skip(self, prior_state, proposed_state, config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.registry.resource(resource_type)?;
        let data = self.provider_data()?;
        let plan = plan_resource(
            &resource.schema(),
            prior_state.as_ref(),
            &proposed_state,
            &config,
            &data.default_region,
        )?;
        debug!(changes = plan.changes.len(), requires_replace = plan.requires_replace, "Planned");
        Ok(plan)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.registry.resource(resource_type)?.create(planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError> {
        let state = self.registry.resource(resource_type)?.read(current_state).await?;
        if state.is_none() {
            warn!("Resource is gone, removing it from state");
        }
        Ok(state)
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.registry
            .resource(resource_type)?
            .update(prior_state, planned_state)
            .await
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.registry.resource(resource_type)?.delete(current_state).await
    }

    #[instrument(skip(self))]
    async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        let state = self.registry.resource(resource_type)?.import(id)?;
        info!("Resource imported");
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.registry.data_source(data_source_type)?;
        Ok(validate(&data_source.schema(), &config))
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.registry.data_source(data_source_type)?.read(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClientFactory;
    use serde_json::json;

    fn provider() -> StackitProvider {
        StackitProvider::new(FakeClientFactory::default()).with_env(|_| None)
    }

    #[test]
    fn test_registry_has_every_type() {
        let metadata = provider().metadata();
        assert_eq!(metadata.resources.len(), 9);
        assert_eq!(metadata.data_sources.len(), 8);
        assert!(metadata
            .data_sources
            .contains(&"stackit_routing_table_routes".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let err = provider().create("stackit_nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_import_seeds_path_segments() {
        let imported = provider()
            .import_resource("stackit_postgresflex_database", "p,eu01,i,d")
            .await
            .unwrap();
        let state = &imported[0].state;
        assert_eq!(state["project_id"], "p");
        assert_eq!(state["region"], "eu01");
        assert_eq!(state["instance_id"], "i");
        assert_eq!(state["database_id"], "d");
        assert_eq!(state["id"], "p,eu01,i,d");
        assert!(state["name"].is_null());
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_id() {
        let err = provider()
            .import_resource("stackit_routing_table_route", "org,eu01,area,table")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("organization_id"));
    }

    #[tokio::test]
    async fn test_configure_once() {
        let provider = provider();
        provider.configure(json!({"service_account_token": "t"})).await.unwrap();
        assert_eq!(provider.provider_data().unwrap().default_region, "eu01");

        let err = provider.configure(json!({"service_account_token": "t"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_configure_requires_credentials() {
        let provider = provider();
        let err = provider.configure(json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(provider.provider_data().is_err());
    }

    #[tokio::test]
    async fn test_plan_requires_configuration() {
        let config = json!({"project_id": "p", "instance_id": "i", "name": "db", "owner": "o"});
        let err = provider()
            .plan("stackit_postgresflex_database", None, config.clone(), config)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_upgrade_state_version_check() {
        let provider = provider();
        let state = json!({"id": "x"});
        let upgraded = provider
            .upgrade_resource_state("stackit_routing_table", 0, state.clone())
            .await
            .unwrap();
        assert_eq!(upgraded, state);
        assert!(provider
            .upgrade_resource_state("stackit_routing_table", 3, state)
            .await
            .is_err());
    }
}
