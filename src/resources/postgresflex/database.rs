//! `stackit_postgresflex_database` resource and data source.
//!
//! The API has no get-database call, so lookups page through the database
//! list. Databases cannot be changed in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{configure_postgres, database_by_id, database_by_name, instance, PostgresContext};
use crate::client::postgresflex::{CreateDatabasePayload, Database};
use crate::client::ClientFactory;
use crate::config::ProviderData;
use crate::error::ProviderError;
use crate::id::{self, ImportFormat};
use crate::resource::{data_source_error, ignore_not_found, Configured, ManagedDataSource, ManagedResource};
use crate::schema::{Attribute, AttributeFlags, AttributeType, AttributeValidator, Schema};
use crate::value::Attr;

/// State of a Postgres Flex database.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseModel {
    pub id: Attr<String>,
    pub database_id: Attr<String>,
    pub instance_id: Attr<String>,
    pub project_id: Attr<String>,
    pub region: Attr<String>,
    pub name: Attr<String>,
    pub owner: Attr<String>,
}

impl DatabaseModel {
    fn map_fields(&mut self, database: &Database, region: &str) -> Result<(), ProviderError> {
        let database_id = match (&database.id, self.database_id.as_known()) {
            (Some(id), _) => id.clone(),
            (None, Some(id)) => id.clone(),
            (None, None) => return Err(ProviderError::mapping("database id not present")),
        };
        let project_id = self.project_id.require("project_id")?;
        let instance_id = self.instance_id.require("instance_id")?;

        self.id = Attr::Known(id::encode(&[
            project_id.as_str(),
            region,
            instance_id.as_str(),
            database_id.as_str(),
        ]));
        self.database_id = Attr::Known(database_id);
        self.region = Attr::known(region);
        self.name = Attr::from_wire(database.name.clone());
        self.owner = Attr::from_wire(database.owner().map(str::to_string));
        Ok(())
    }

    fn to_create_payload(&self) -> Result<CreateDatabasePayload, ProviderError> {
        let mut options = BTreeMap::new();
        options.insert("owner".to_string(), self.owner.require("owner")?);
        Ok(CreateDatabasePayload {
            name: self.name.require("name")?,
            options,
        })
    }
}

fn shared_attributes(schema: Schema) -> Schema {
    schema
        .with_attribute(
            "id",
            Attribute::computed_id().with_description(
                "Terraform's internal resource ID. It is structured as \
                 \"`project_id`,`region`,`instance_id`,`database_id`\".",
            ),
        )
        .with_attribute("project_id", Attribute::required_id())
        .with_attribute("instance_id", Attribute::required_id())
        .with_attribute("region", Attribute::region())
}

/// `stackit_postgresflex_database` resource.
#[derive(Default)]
pub struct DatabaseResource {
    ctx: Configured<PostgresContext>,
}

#[async_trait]
impl ManagedResource for DatabaseResource {
    type Model = DatabaseModel;
    const TYPE_NAME: &'static str = "stackit_postgresflex_database";
    const IMPORT: ImportFormat = ImportFormat::new(&["project_id", "region", "instance_id", "database_id"]);

    fn schema() -> Schema {
        shared_attributes(Schema::v0())
            .with_description("Postgres Flex database resource schema.")
            .with_attribute("database_id", Attribute::computed_id())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(AttributeValidator::NonEmpty),
            )
            .with_attribute(
                "owner",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Username of the database owner."),
            )
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_postgres(&self.ctx, data, clients, Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(project_id = %plan.project_id, instance_id = %plan.instance_id))]
    async fn create(&self, mut plan: DatabaseModel) -> Result<DatabaseModel, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&plan.region);
        let instance = instance(&plan.project_id, &plan.instance_id, region.clone())?;

        let created = ctx
            .client
            .create_database(&instance, plan.to_create_payload()?)
            .await
            .map_err(|e| ProviderError::api("Creating database", e))?;
        let database_id = created
            .id
            .ok_or_else(|| ProviderError::mapping("database id not present in create response"))?;

        let database = database_by_id(ctx.client.as_ref(), &instance, &database_id)
            .await
            .map_err(|e| ProviderError::api("Getting database details after creation", e))?
            .ok_or_else(|| ProviderError::NotFound(format!("database {:?} not found after creation", database_id)))?;

        plan.map_fields(&database, &region)?;
        info!(database_id = %plan.database_id, "Postgres Flex database created");
        Ok(plan)
    }

    #[instrument(skip_all, fields(instance_id = %state.instance_id, database_id = %state.database_id))]
    async fn read(&self, mut state: DatabaseModel) -> Result<Option<DatabaseModel>, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&state.region);
        let instance = instance(&state.project_id, &state.instance_id, region.clone())?;
        let database_id = state.database_id.require("database_id")?;

        let found = match database_by_id(ctx.client.as_ref(), &instance, &database_id).await {
            Ok(found) => found,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(ProviderError::api("Reading database", e)),
        };
        let Some(database) = found else {
            warn!("Reading database: remote object not found, removing from state");
            return Ok(None);
        };
        state.map_fields(&database, &region)?;
        info!("Postgres Flex database read");
        Ok(Some(state))
    }

    async fn update(&self, _prior: DatabaseModel, _plan: DatabaseModel) -> Result<DatabaseModel, ProviderError> {
        Err(ProviderError::Unimplemented(
            "Updating database: database can't be updated".into(),
        ))
    }

    #[instrument(skip_all, fields(instance_id = %state.instance_id, database_id = %state.database_id))]
    async fn delete(&self, state: DatabaseModel) -> Result<(), ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let instance = instance(&state.project_id, &state.instance_id, ctx.region(&state.region))?;
        let database_id = state.database_id.require("database_id")?;

        ignore_not_found(
            ctx.client.delete_database(&instance, &database_id).await,
            "Deleting database",
        )?;
        info!("Postgres Flex database deleted");
        Ok(())
    }
}

/// `stackit_postgresflex_database` data source, looked up by id or by name.
#[derive(Default)]
pub struct DatabaseDataSource {
    ctx: Configured<PostgresContext>,
}

#[async_trait]
impl ManagedDataSource for DatabaseDataSource {
    type Model = DatabaseModel;
    const TYPE_NAME: &'static str = "stackit_postgresflex_database";

    fn schema() -> Schema {
        let lookup = || Attribute::new(AttributeType::String, AttributeFlags::optional_computed());
        shared_attributes(Schema::v0())
            .with_description("Postgres Flex database data source schema. Either `database_id` or `name` must be set.")
            .with_attribute("database_id", lookup().with_validator(AttributeValidator::NoSeparator))
            .with_attribute("name", lookup())
            .with_attribute("owner", Attribute::computed_string())
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_postgres(&self.ctx, data, clients, Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(instance_id = %config.instance_id))]
    async fn read(&self, mut config: DatabaseModel) -> Result<DatabaseModel, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&config.region);
        let instance = instance(&config.project_id, &config.instance_id, region.clone())?;

        let (what, result) = match (config.database_id.as_str(), config.name.as_str()) {
            (Some(database_id), _) => (
                format!("database with id {:?}", database_id),
                database_by_id(ctx.client.as_ref(), &instance, database_id).await,
            ),
            (None, Some(name)) => (
                format!("database with name {:?}", name),
                database_by_name(ctx.client.as_ref(), &instance, name).await,
            ),
            (None, None) => {
                return Err(ProviderError::Validation(
                    "either \"database_id\" or \"name\" must be set".into(),
                ))
            },
        };
        let database = result
            .map_err(|e| data_source_error(&what, e))?
            .ok_or_else(|| ProviderError::NotFound(format!("{} not found", what)))?;

        config.map_fields(&database, &region)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> DatabaseModel {
        DatabaseModel {
            project_id: Attr::known("p"),
            instance_id: Attr::known("i"),
            name: Attr::known("app"),
            owner: Attr::known("admin"),
            ..Default::default()
        }
    }

    #[test]
    fn test_owner_travels_in_options() {
        let payload = model().to_create_payload().unwrap();
        assert_eq!(payload.options.get("owner").map(String::as_str), Some("admin"));

        let mut m = model();
        m.owner = Attr::Null;
        assert!(m.to_create_payload().is_err());
    }

    #[test]
    fn test_map_fields() {
        let database: Database = serde_json::from_value(json!({
            "id": "d1", "name": "app", "options": {"owner": "root"}
        }))
        .unwrap();
        let mut m = model();
        m.map_fields(&database, "eu01").unwrap();

        assert_eq!(m.id, Attr::known("p,eu01,i,d1"));
        assert_eq!(m.database_id, Attr::known("d1"));
        assert_eq!(m.owner, Attr::known("root"));
    }

    #[tokio::test]
    async fn test_update_is_rejected() {
        let err = DatabaseResource::default().update(model(), model()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unimplemented(_)));
    }
}
