//! Resource and data source lifecycle.
//!
//! The host drives resources through the object-safe [`Resource`] and
//! [`DataSource`] traits, which speak JSON state documents. Implementations
//! are written against the typed [`ManagedResource`] and
//! [`ManagedDataSource`] traits instead; [`ResourceAdapter`] and
//! [`DataSourceAdapter`] bridge the two, so decoding, encoding and import
//! are handled once for every resource type.

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::client::{ApiError, ApiResult, ClientFactory};
use crate::config::ProviderData;
use crate::error::ProviderError;
use crate::id::ImportFormat;
use crate::region::effective_region;
use crate::schema::Schema;
use crate::value::Attr;

/// A resource as seen by the provider.
#[async_trait]
pub trait Resource: Send + Sync {
    /// The resource type name, e.g. `stackit_routing_table`.
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Build the API client from provider settings.
    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError>;

    /// Create the remote object and return the new state.
    async fn create(&self, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state. `None` means the remote object is gone.
    async fn read(&self, state: Value) -> Result<Option<Value>, ProviderError>;

    /// Apply planned changes and return the new state.
    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, state: Value) -> Result<(), ProviderError>;

    /// Seed state from an operator-supplied id.
    fn import(&self, id: &str) -> Result<Value, ProviderError>;
}

/// A data source as seen by the provider.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The data source type name.
    fn type_name(&self) -> &'static str;

    /// The data source schema.
    fn schema(&self) -> Schema;

    /// Build the API client from provider settings.
    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError>;

    /// Look up the remote object described by `config`.
    async fn read(&self, config: Value) -> Result<Value, ProviderError>;
}

/// A resource with a typed state model.
#[async_trait]
pub trait ManagedResource: Send + Sync + 'static {
    /// The flat state model.
    type Model: Serialize + DeserializeOwned + Default + Send + Sync;

    /// The resource type name.
    const TYPE_NAME: &'static str;

    /// Path-segment attributes in id order.
    const IMPORT: ImportFormat;

    /// The resource schema.
    fn schema() -> Schema;

    /// Build the API client from provider settings.
    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError>;

    /// Create the remote object.
    async fn create(&self, plan: Self::Model) -> Result<Self::Model, ProviderError>;

    /// Refresh state; `None` removes the resource from state.
    async fn read(&self, state: Self::Model) -> Result<Option<Self::Model>, ProviderError>;

    /// Apply planned changes.
    async fn update(&self, prior: Self::Model, plan: Self::Model) -> Result<Self::Model, ProviderError>;

    /// Delete the remote object. Already-deleted objects are not an error.
    async fn delete(&self, state: Self::Model) -> Result<(), ProviderError>;
}

/// A data source with a typed model.
#[async_trait]
pub trait ManagedDataSource: Send + Sync + 'static {
    /// The flat model, used for both configuration and result.
    type Model: Serialize + DeserializeOwned + Default + Send + Sync;

    /// The data source type name.
    const TYPE_NAME: &'static str;

    /// The data source schema.
    fn schema() -> Schema;

    /// Build the API client from provider settings.
    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError>;

    /// Look up the remote object.
    async fn read(&self, config: Self::Model) -> Result<Self::Model, ProviderError>;
}

/// Exposes a [`ManagedResource`] as a [`Resource`].
pub struct ResourceAdapter<R>(pub R);

#[async_trait]
impl<R: ManagedResource> Resource for ResourceAdapter<R> {
    fn type_name(&self) -> &'static str {
        R::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        R::schema()
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        self.0.configure(data, clients)
    }

    async fn create(&self, planned: Value) -> Result<Value, ProviderError> {
        let plan = decode_state::<R::Model>(R::TYPE_NAME, planned)?;
        let state = self.0.create(plan).await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn read(&self, state: Value) -> Result<Option<Value>, ProviderError> {
        let state = decode_state::<R::Model>(R::TYPE_NAME, state)?;
        match self.0.read(state).await? {
            Some(state) => Ok(Some(serde_json::to_value(state)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let prior = decode_state::<R::Model>(R::TYPE_NAME, prior)?;
        let plan = decode_state::<R::Model>(R::TYPE_NAME, planned)?;
        let state = self.0.update(prior, plan).await?;
        Ok(serde_json::to_value(state)?)
    }

    async fn delete(&self, state: Value) -> Result<(), ProviderError> {
        let state = decode_state::<R::Model>(R::TYPE_NAME, state)?;
        self.0.delete(state).await
    }

    fn import(&self, id: &str) -> Result<Value, ProviderError> {
        let mut object = Map::new();
        for (field, value) in R::IMPORT.parse(id)? {
            object.insert(field.to_string(), Value::String(value));
        }
        object.insert("id".to_string(), Value::String(id.to_string()));

        // Round-trip through the model so the imported state has every
        // attribute, all but the path segments null.
        let model = decode_state::<R::Model>(R::TYPE_NAME, Value::Object(object))?;
        Ok(serde_json::to_value(model)?)
    }
}

/// Exposes a [`ManagedDataSource`] as a [`DataSource`].
pub struct DataSourceAdapter<D>(pub D);

#[async_trait]
impl<D: ManagedDataSource> DataSource for DataSourceAdapter<D> {
    fn type_name(&self) -> &'static str {
        D::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        D::schema()
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        self.0.configure(data, clients)
    }

    async fn read(&self, config: Value) -> Result<Value, ProviderError> {
        let config = decode_state::<D::Model>(D::TYPE_NAME, config)?;
        let state = self.0.read(config).await?;
        Ok(serde_json::to_value(state)?)
    }
}

fn decode_state<M: DeserializeOwned>(type_name: &str, value: Value) -> Result<M, ProviderError> {
    let value = if value.is_null() {
        Value::Object(Map::new())
    } else {
        value
    };
    serde_json::from_value(value).map_err(|e| {
        ProviderError::InvalidRequest(format!("invalid {} state: {}", type_name, e))
    })
}

/// Provider settings plus the API client of one resource or data source.
pub struct ServiceContext<C: ?Sized> {
    /// Resolved provider settings.
    pub data: Arc<ProviderData>,
    /// The API client.
    pub client: Arc<C>,
}

impl<C: ?Sized> ServiceContext<C> {
    /// Bundle settings and client.
    pub fn new(data: Arc<ProviderData>, client: Arc<C>) -> Self {
        Self { data, client }
    }

    /// The effective region for a `region` attribute.
    pub fn region(&self, explicit: &Attr<String>) -> String {
        effective_region(explicit, &self.data.default_region)
    }
}

impl<C: ?Sized> fmt::Debug for ServiceContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("default_region", &self.data.default_region)
            .finish_non_exhaustive()
    }
}

/// Configuration slot of a resource: empty until the provider is
/// configured, then fixed for the rest of the process.
#[derive(Debug)]
pub struct Configured<T> {
    cell: OnceLock<T>,
}

impl<T> Default for Configured<T> {
    fn default() -> Self {
        Self { cell: OnceLock::new() }
    }
}

impl<T> Configured<T> {
    /// Fill the slot. A second call fails.
    pub fn set(&self, value: T, type_name: &str) -> Result<(), ProviderError> {
        self.cell.set(value).map_err(|_| {
            ProviderError::FailedPrecondition(format!("{} is already configured", type_name))
        })
    }

    /// The configured value.
    pub fn get(&self, type_name: &str) -> Result<&T, ProviderError> {
        self.cell.get().ok_or_else(|| {
            ProviderError::FailedPrecondition(format!(
                "{} used before the provider was configured",
                type_name
            ))
        })
    }

    /// Whether the slot is filled.
    pub fn is_configured(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Outcome of a resource read: a 404/410 means the object is gone.
pub fn read_or_gone<T>(result: ApiResult<T>, context: &str) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => {
            warn!(context, "remote object not found, removing it from state");
            Ok(None)
        },
        Err(err) => Err(ProviderError::api(context, err)),
    }
}

/// Outcome of a delete: an object that is already gone counts as deleted.
pub fn ignore_not_found(result: ApiResult<()>, context: &str) -> Result<(), ProviderError> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(ProviderError::api(context, err)),
        Ok(()) => Ok(()),
    }
}

/// Classify a failed data source lookup. Data sources never drop state, so
/// not-found is an error, and 403 gets its own message since it can hide a
/// missing object.
pub fn data_source_error(what: &str, err: ApiError) -> ProviderError {
    if err.is_not_found() {
        return ProviderError::NotFound(format!("{} not found", what));
    }
    if err.is_forbidden() {
        return ProviderError::PermissionDenied(format!(
            "{} not found or forbidden access: {}",
            what, err
        ));
    }
    ProviderError::api(format!("Reading {}", what), err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct WidgetModel {
        id: Attr<String>,
        project_id: Attr<String>,
        widget_id: Attr<String>,
        size: Attr<i64>,
    }

    #[derive(Default)]
    struct Widget {
        configured: Configured<Arc<ProviderData>>,
    }

    #[async_trait]
    impl ManagedResource for Widget {
        type Model = WidgetModel;
        const TYPE_NAME: &'static str = "test_widget";
        const IMPORT: ImportFormat = ImportFormat::new(&["project_id", "widget_id"]);

        fn schema() -> Schema {
            Schema::v0()
                .with_attribute("id", Attribute::computed_id())
                .with_attribute("project_id", Attribute::required_id())
                .with_attribute("widget_id", Attribute::computed_id())
                .with_attribute("size", Attribute::optional_int64())
        }

        fn configure(&self, data: Arc<ProviderData>, _clients: &dyn ClientFactory) -> Result<(), ProviderError> {
            self.configured.set(data, Self::TYPE_NAME)
        }

        async fn create(&self, mut plan: WidgetModel) -> Result<WidgetModel, ProviderError> {
            self.configured.get(Self::TYPE_NAME)?;
            plan.widget_id = Attr::known("w1");
            Ok(plan)
        }

        async fn read(&self, state: WidgetModel) -> Result<Option<WidgetModel>, ProviderError> {
            Ok(Some(state).filter(|s| s.widget_id.is_known()))
        }

        async fn update(&self, _prior: WidgetModel, plan: WidgetModel) -> Result<WidgetModel, ProviderError> {
            Ok(plan)
        }

        async fn delete(&self, _state: WidgetModel) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[test]
    fn test_import_seeds_path_segments() {
        let adapter = ResourceAdapter(Widget::default());
        let state = adapter.import("p1,w9").unwrap();
        assert_eq!(
            state,
            json!({"id": "p1,w9", "project_id": "p1", "widget_id": "w9", "size": null})
        );

        let err = adapter.import("p1").unwrap_err();
        assert!(err.to_string().contains("[project_id],[widget_id]"));
    }

    #[tokio::test]
    async fn test_unconfigured_resource_fails() {
        let adapter = ResourceAdapter(Widget::default());
        let err = adapter.create(json!({"project_id": "p1"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_read_none_and_bad_state() {
        let adapter = ResourceAdapter(Widget::default());
        assert_eq!(adapter.read(json!({"project_id": "p1"})).await.unwrap(), None);

        let err = adapter.read(json!({"size": "big"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[test]
    fn test_configured_once() {
        let slot: Configured<u8> = Configured::default();
        assert!(slot.get("x").is_err());
        slot.set(1, "x").unwrap();
        assert_eq!(*slot.get("x").unwrap(), 1);
        assert!(slot.set(2, "x").is_err());
        assert!(slot.is_configured());
    }

    #[test]
    fn test_read_and_delete_policies() {
        assert_eq!(read_or_gone(Ok(5), "Reading").unwrap(), Some(5));
        assert_eq!(read_or_gone::<i32>(Err(ApiError::http(410, "")), "Reading").unwrap(), None);
        let err = read_or_gone::<i32>(Err(ApiError::http(403, "")), "Reading").unwrap_err();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));

        assert!(ignore_not_found(Err(ApiError::http(404, "")), "Deleting").is_ok());
        assert!(ignore_not_found(Err(ApiError::http(500, "")), "Deleting").is_err());
    }

    #[test]
    fn test_data_source_error() {
        let err = data_source_error("routing table", ApiError::http(404, ""));
        assert!(matches!(err, ProviderError::NotFound(_)));

        let err = data_source_error("routing table", ApiError::http(403, "denied"));
        assert!(err.to_string().contains("not found or forbidden access"));
    }
}
