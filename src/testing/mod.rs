//! Test harness and in-memory API fakes.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way the Terraform
//! host does, without a plugin process. The [`fakes`] module holds
//! in-memory implementations of every API collaborator.
//!
//! # Example
//!
//! ```ignore
//! use serde_json::json;
//! use stackit_provider::testing::{FakeClientFactory, ProviderTester};
//!
//! #[tokio::test]
//! async fn test_create_routing_table() {
//!     let tester = ProviderTester::stackit(FakeClientFactory::default());
//!     tester.configure_with(&["routing-tables"]).await.unwrap();
//!
//!     let state = tester
//!         .lifecycle_create(
//!             "stackit_routing_table",
//!             json!({"organization_id": "o", "network_area_id": "a", "name": "rt"}),
//!         )
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state["name"], "rt");
//! }
//! ```

pub mod fakes;

pub use fakes::{FakeClientFactory, FakeDsa, FakeStackit};

use serde_json::{json, Value};
use thiserror::Error;

use crate::error::ProviderError;
use crate::plan::first_divergence;
use crate::provider::StackitProvider;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::PlanResult;

/// A test harness for provider implementations.
///
/// Wraps a [`ProviderService`] and exposes the host's calls with plain JSON
/// in and out.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl ProviderTester<StackitProvider> {
    /// The STACKIT provider wired to `clients`, isolated from the process
    /// environment.
    pub fn stackit(clients: FakeClientFactory) -> Self {
        Self::new(StackitProvider::new(clients).with_env(|_| None))
    }

    /// Configure with a static token and the given experiments.
    pub async fn configure_with(&self, experiments: &[&str]) -> Result<(), TestError> {
        self.configure(json!({
            "service_account_token": "test-token",
            "experiments": experiments,
        }))
        .await
    }
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap a provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate provider configuration. Error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(&self, resource_type: &str, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_resource_config(resource_type, config).await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a create. The configuration doubles as the proposed state.
    pub async fn plan_create(&self, resource_type: &str, config: Value) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, config.clone(), config).await
    }

    /// Plan an update from `prior_state` to `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan a deletion.
    pub async fn plan_delete(&self, resource_type: &str, prior_state: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a resource from a planned state.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a resource. `None` means the resource is gone.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update a resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior_state, planned_state).await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import a resource and return the seeded state.
    pub async fn import(&self, resource_type: &str, id: &str) -> Result<Value, ProviderError> {
        let mut imported = self.provider.import_resource(resource_type, id).await?;
        match imported.len() {
            1 => Ok(imported.remove(0).state),
            n => Err(ProviderError::InvalidRequest(format!(
                "import of {} returned {} resources",
                resource_type, n
            ))),
        }
    }

    /// Read a data source.
    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    /// Plan, create, then read back. A created state that contradicts a
    /// known planned value is an error.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state.clone()).await?;
        conforms(resource_type, &plan.planned_state, &created)?;
        self.read_existing(resource_type, created).await
    }

    /// Plan, update in place, then read back. A plan that needs replacement
    /// is an error, as is an updated state that contradicts a known planned
    /// value.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_update(resource_type, prior_state.clone(), config).await?;
        if plan.requires_replace {
            return Err(ProviderError::InvalidRequest(format!(
                "{} update requires replacement",
                resource_type
            )));
        }
        let updated = self.update(resource_type, prior_state, plan.planned_state.clone()).await?;
        conforms(resource_type, &plan.planned_state, &updated)?;
        self.read_existing(resource_type, updated).await
    }

    /// Plan a deletion, then delete.
    pub async fn lifecycle_delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone()).await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update, delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self.lifecycle_update(resource_type, created, updated_config).await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }

    async fn read_existing(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        self.read(resource_type, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("{} vanished right after apply", resource_type)))
    }
}

fn conforms(resource_type: &str, planned: &Value, applied: &Value) -> Result<(), ProviderError> {
    match first_divergence(planned, applied) {
        None => Ok(()),
        Some(path) => Err(ProviderError::mapping(format!(
            "{} produced an inconsistent result: {} differs from the planned value",
            resource_type, path
        ))),
    }
}

/// Failure of a harness call.
#[derive(Debug, Error)]
pub enum TestError {
    /// The call returned error diagnostics.
    #[error("operation failed with diagnostics: {}", summaries(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// The call failed outright.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

fn summaries(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let mut line = d.summary.clone();
            if let Some(detail) = &d.detail {
                line.push_str(": ");
                line.push_str(detail);
            }
            if let Some(attribute) = &d.attribute {
                line.push_str(&format!(" (at {})", attribute));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that a plan creates without replacement.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "expected changes for create, got none");
    assert!(!plan.requires_replace, "expected create, not replace");
}

/// Assert that a plan changes nothing.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "expected no changes, got {:?}",
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires replacement.
///
/// # Panics
///
/// Panics if it does not.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(plan.requires_replace, "expected plan to require replacement");
}

/// Assert that a plan updates in place.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(!plan.requires_replace, "expected in-place update, plan requires replacement");
}

/// Assert that a plan changes the attribute at `path`.
///
/// # Panics
///
/// Panics if there is no change for `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.change(path).is_some(),
        "expected a change of '{}', changed: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that an error carries `substring` in its message.
///
/// # Panics
///
/// Panics if the message does not contain `substring`.
pub fn assert_error_contains(err: &ProviderError, substring: &str) {
    let message = err.to_string();
    assert!(
        message.contains(substring),
        "expected an error containing '{}', got '{}'",
        substring,
        message
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTING_TABLE: &str = "stackit_routing_table";

    fn table_config(name: &str) -> Value {
        json!({"organization_id": "org", "network_area_id": "area", "name": name})
    }

    #[tokio::test]
    async fn test_tester_lists_types() {
        let tester = ProviderTester::stackit(FakeClientFactory::default());
        assert!(tester.resource_types().contains(&ROUTING_TABLE.to_string()));
        assert!(tester
            .data_source_types()
            .contains(&"stackit_postgresflex_database".to_string()));
        assert!(tester.schema().resources.contains_key("stackit_mariadb_instance"));
    }

    #[tokio::test]
    async fn test_tester_rejects_bad_provider_config() {
        let tester = ProviderTester::stackit(FakeClientFactory::default());
        let err = tester
            .validate_provider_config(json!({"experiments": "routing-tables"}))
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Diagnostics(_)));
    }

    #[tokio::test]
    async fn test_tester_plan_create() {
        let tester = ProviderTester::stackit(FakeClientFactory::default());
        tester.configure_with(&["routing-tables"]).await.unwrap();

        let plan = tester.plan_create(ROUTING_TABLE, table_config("rt")).await.unwrap();
        assert_plan_creates(&plan);
        assert_eq!(plan.planned_state["region"], "eu01");
        assert_eq!(plan.planned_state["id"], crate::value::UNKNOWN);
    }

    #[tokio::test]
    async fn test_tester_lifecycle_crud() {
        let clients = FakeClientFactory::default();
        let tester = ProviderTester::stackit(clients.clone());
        tester.configure_with(&["routing-tables"]).await.unwrap();

        let created = tester.lifecycle_create(ROUTING_TABLE, table_config("first")).await.unwrap();
        assert_eq!(created["name"], "first");
        assert_eq!(created["system_routes"], true);

        let plan = tester
            .plan_update(ROUTING_TABLE, created.clone(), table_config("second"))
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "name");

        let updated = tester
            .lifecycle_crud(ROUTING_TABLE, table_config("a"), table_config("b"))
            .await
            .unwrap();
        assert_eq!(updated["name"], "b");
        assert_eq!(clients.stackit.call_count("delete_routing_table"), 1);
    }

    #[tokio::test]
    async fn test_tester_import() {
        let tester = ProviderTester::stackit(FakeClientFactory::default());
        let state = tester.import(ROUTING_TABLE, "org,eu01,area,rt-1").await.unwrap();
        assert_eq!(state["routing_table_id"], "rt-1");
        assert_eq!(state["region"], "eu01");
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("First error").with_attribute("field1"),
            Diagnostic::error("Second error").with_detail("More info"),
        ]);

        let display = err.to_string();
        assert!(display.contains("First error (at field1)"));
        assert!(display.contains("Second error: More info"));
    }

    #[test]
    fn test_assert_error_contains() {
        let err = ProviderError::Validation("flavor not found".into());
        assert_error_contains(&err, "flavor");
    }
}
