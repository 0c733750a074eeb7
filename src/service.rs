//! The host-facing provider API.
//!
//! The wire protocol is left to the embedding host; it talks to the provider
//! through [`ProviderService`] using plain Rust and JSON types.

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};

/// Operations a Terraform host drives against the provider.
///
/// Only `configure` and the managed-resource lifecycle are mandatory; the
/// remaining hooks default to "nothing to report".
///
/// All state crosses this trait as JSON objects keyed by attribute name.
/// Unknown values are carried as [`UNKNOWN`](crate::value::UNKNOWN).
///
/// # Example
///
/// ```ignore
/// use stackit_provider::{ProviderService, StackitProvider};
/// use stackit_provider::testing::FakeClientFactory;
///
/// let provider = StackitProvider::new(FakeClientFactory::default());
/// provider.configure(serde_json::json!({"service_account_token": "t"})).await?;
///
/// let config = serde_json::json!({"project_id": "p", "org_id": "org"});
/// let plan = provider
///     .plan("stackit_scf_organization_manager", None, config.clone(), config)
///     .await?;
/// let state = provider
///     .create("stackit_scf_organization_manager", plan.planned_state)
///     .await?;
/// let refreshed = provider.read("stackit_scf_organization_manager", state).await?;
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Provider, resource and data source schemas.
    fn schema(&self) -> ProviderSchema;

    /// Registered resource and data source type names, derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
        }
    }

    /// Check the provider block before [`configure`](Self::configure) runs.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(Vec::new())
    }

    /// Resolve credentials, region and experiments and build the API clients.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release anything held by the provider before the host exits.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Check a resource block against its schema.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(Vec::new())
    }

    /// Migrate state written by an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Compute the planned state.
    ///
    /// # Arguments
    ///
    /// * `resource_type` - The registered type name, e.g. `stackit_postgresflex_instance`
    /// * `prior_state` - The state from the last apply, `None` on create
    /// * `proposed_state` - Configuration merged with prior state; null plans a deletion
    /// * `config` - The raw configuration, used to tell unset attributes apart
    ///
    /// # Returns
    ///
    /// The planned state with unknown placeholders, the attribute changes and
    /// whether the change needs destroy-and-recreate.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create the remote object and return the applied state.
    ///
    /// Every unknown in `planned_state` is resolved in the result. Known
    /// planned values come back unchanged.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh state from the API.
    ///
    /// `None` tells the host the remote object no longer exists and the
    /// resource should be removed from state.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError>;

    /// Apply an in-place update.
    ///
    /// # Arguments
    ///
    /// * `resource_type` - The registered type name
    /// * `prior_state` - The state before the update
    /// * `planned_state` - The result of [`plan`](Self::plan) for this change
    ///
    /// Updates that the remote API cannot express fail with
    /// [`ProviderError::Unimplemented`]; their attributes are force-new, so a
    /// plan replaces instead.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object. Already-gone objects are not an error.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Turn a comma-joined import id into a state skeleton.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let imported = provider
    ///     .import_resource("stackit_postgresflex_database", "p,eu01,pg-1,db-0")
    ///     .await?;
    /// assert_eq!(imported[0].state["database_id"], "db-0");
    /// ```
    async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for {resource_type}"
        )))
    }

    /// Check a data source block against its schema.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(Vec::new())
    }

    /// Look up an existing object by its identifiers.
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let _ = config;
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}
