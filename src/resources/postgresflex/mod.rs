//! PostgreSQL Flex instances, databases and users.

use std::sync::Arc;

use crate::client::postgresflex::Database;
use crate::client::{ApiResult, ClientFactory, InstanceRef, PostgresFlexApi, ProjectRef};
use crate::config::ProviderData;
use crate::error::ProviderError;
use crate::resource::{Configured, ServiceContext};
use crate::value::Attr;

pub mod database;
pub mod instance;
pub mod user;

pub use database::{DatabaseDataSource, DatabaseResource};
pub use instance::{InstanceDataSource, InstanceResource};
pub use user::{UserDataSource, UserResource};

pub(crate) type PostgresContext = ServiceContext<dyn PostgresFlexApi>;

pub(crate) fn configure_postgres(
    slot: &Configured<PostgresContext>,
    data: Arc<ProviderData>,
    clients: &dyn ClientFactory,
    type_name: &str,
) -> Result<(), ProviderError> {
    let client = clients.postgres_flex(&data)?;
    slot.set(ServiceContext::new(data, client), type_name)
}

pub(crate) fn project(project_id: &Attr<String>, region: String) -> Result<ProjectRef, ProviderError> {
    Ok(ProjectRef::new(project_id.require("project_id")?, region))
}

pub(crate) fn instance(
    project_id: &Attr<String>,
    instance_id: &Attr<String>,
    region: String,
) -> Result<InstanceRef, ProviderError> {
    Ok(project(project_id, region)?.instance(instance_id.require("instance_id")?))
}

/// Find a database by walking every page of the database list.
///
/// Returns `None` only once all pages are exhausted.
pub async fn find_database<F>(
    client: &dyn PostgresFlexApi,
    instance: &InstanceRef,
    mut matches: F,
) -> ApiResult<Option<Database>>
where
    F: FnMut(&Database) -> bool + Send,
{
    let mut page = 1;
    loop {
        let response = client.list_databases(instance, page).await?;
        let databases = response.databases.unwrap_or_default();
        if databases.is_empty() {
            return Ok(None);
        }
        if let Some(found) = databases.into_iter().find(|db| matches(db)) {
            return Ok(Some(found));
        }
        if response.total_pages.is_some_and(|total| page >= total) {
            return Ok(None);
        }
        page += 1;
    }
}

/// Find a database by id.
pub async fn database_by_id(
    client: &dyn PostgresFlexApi,
    instance: &InstanceRef,
    database_id: &str,
) -> ApiResult<Option<Database>> {
    find_database(client, instance, |db| db.id.as_deref() == Some(database_id)).await
}

/// Find a database by name.
pub async fn database_by_name(
    client: &dyn PostgresFlexApi,
    instance: &InstanceRef,
    name: &str,
) -> ApiResult<Option<Database>> {
    find_database(client, instance, |db| db.name.as_deref() == Some(name)).await
}
