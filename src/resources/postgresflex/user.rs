//! `stackit_postgresflex_user` resource and data source.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{configure_postgres, instance, PostgresContext};
use crate::client::postgresflex::{CreateUserPayload, PartialUpdateUserPayload, User, UserResponse};
use crate::client::ClientFactory;
use crate::config::ProviderData;
use crate::error::ProviderError;
use crate::id::{self, ImportFormat};
use crate::resource::{data_source_error, ignore_not_found, read_or_gone, Configured, ManagedDataSource, ManagedResource};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::value::{warn_missing, Attr};

const ROLES: &[&str] = &["login", "createdb"];

/// State of a Postgres Flex user. `password` and `uri` are only ever
/// returned by the create call and are carried over from state afterwards.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserModel {
    pub id: Attr<String>,
    pub user_id: Attr<String>,
    pub instance_id: Attr<String>,
    pub project_id: Attr<String>,
    pub region: Attr<String>,
    pub username: Attr<String>,
    pub roles: Attr<Vec<String>>,
    #[serde(skip_serializing_if = "Attr::is_null")]
    pub password: Attr<String>,
    pub host: Attr<String>,
    pub port: Attr<i64>,
    #[serde(skip_serializing_if = "Attr::is_null")]
    pub uri: Attr<String>,
}

impl UserModel {
    fn map_fields(&mut self, response: &UserResponse, region: &str) -> Result<(), ProviderError> {
        let user: &User = response
            .item
            .as_ref()
            .ok_or_else(|| ProviderError::mapping("received user is nil"))?;
        let user_id = match (&user.id, self.user_id.as_known()) {
            (Some(id), _) => id.clone(),
            (None, Some(id)) => id.clone(),
            (None, None) => return Err(ProviderError::mapping("user id not present")),
        };
        let project_id = self.project_id.require("project_id")?;
        let instance_id = self.instance_id.require("instance_id")?;

        self.id = Attr::Known(id::encode(&[
            project_id.as_str(),
            region,
            instance_id.as_str(),
            user_id.as_str(),
        ]));
        self.user_id = Attr::Known(user_id);
        self.region = Attr::known(region);
        self.username = Attr::from_wire(user.username.clone());
        self.roles = Attr::from_wire(user.roles.clone());
        self.host = Attr::from_wire(user.host.clone());
        self.port = Attr::from_wire(user.port);
        Ok(())
    }

    /// Map the create response, which additionally carries the credentials.
    fn map_fields_create(&mut self, response: &UserResponse, region: &str) -> Result<(), ProviderError> {
        let user = response
            .item
            .as_ref()
            .ok_or_else(|| ProviderError::mapping("received user is nil"))?;
        let password = user
            .password
            .clone()
            .ok_or_else(|| ProviderError::mapping("user password not present"))?;

        self.map_fields(response, region)?;
        self.password = Attr::Known(password);
        self.uri = Attr::from_wire(user.uri.clone());
        if self.uri.is_null() {
            warn_missing(UserResource::TYPE_NAME, "uri");
        }
        Ok(())
    }
}

fn roles_attribute(flags: AttributeFlags) -> Attribute {
    Attribute::new(AttributeType::set(AttributeType::String), flags)
        .with_description(format!("Database access levels for the user. Supported values are: {}.", ROLES.join(", ")))
}

fn shared_attributes(schema: Schema) -> Schema {
    schema
        .with_attribute(
            "id",
            Attribute::computed_id().with_description(
                "Terraform's internal resource ID. It is structured as \
                 \"`project_id`,`region`,`instance_id`,`user_id`\".",
            ),
        )
        .with_attribute("project_id", Attribute::required_id())
        .with_attribute("instance_id", Attribute::required_id())
        .with_attribute("region", Attribute::region())
        .with_attribute("host", Attribute::computed_string().use_state_for_unknown())
        .with_attribute("port", Attribute::computed_int64().use_state_for_unknown())
}

/// `stackit_postgresflex_user` resource.
#[derive(Default)]
pub struct UserResource {
    ctx: Configured<PostgresContext>,
}

#[async_trait]
impl ManagedResource for UserResource {
    type Model = UserModel;
    const TYPE_NAME: &'static str = "stackit_postgresflex_user";
    const IMPORT: ImportFormat = ImportFormat::new(&["project_id", "region", "instance_id", "user_id"]);

    fn schema() -> Schema {
        shared_attributes(Schema::v0())
            .with_description("Postgres Flex user resource schema.")
            .with_attribute("user_id", Attribute::computed_id())
            .with_attribute("username", Attribute::required_string().with_force_new())
            .with_attribute("roles", roles_attribute(AttributeFlags::required()))
            .with_attribute("password", Attribute::computed_string().sensitive().use_state_for_unknown())
            .with_attribute("uri", Attribute::computed_string().sensitive().use_state_for_unknown())
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_postgres(&self.ctx, data, clients, Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(instance_id = %plan.instance_id, username = %plan.username))]
    async fn create(&self, mut plan: UserModel) -> Result<UserModel, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&plan.region);
        let instance = instance(&plan.project_id, &plan.instance_id, region.clone())?;

        let payload = CreateUserPayload {
            username: plan.username.require("username")?,
            roles: plan.roles.require("roles")?,
        };
        let response = ctx
            .client
            .create_user(&instance, payload)
            .await
            .map_err(|e| ProviderError::api("Creating user", e))?;

        plan.map_fields_create(&response, &region)?;
        info!(user_id = %plan.user_id, "Postgres Flex user created");
        Ok(plan)
    }

    #[instrument(skip_all, fields(instance_id = %state.instance_id, user_id = %state.user_id))]
    async fn read(&self, mut state: UserModel) -> Result<Option<UserModel>, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&state.region);
        let instance = instance(&state.project_id, &state.instance_id, region.clone())?;
        let user_id = state.user_id.require("user_id")?;

        let Some(response) = read_or_gone(ctx.client.get_user(&instance, &user_id).await, "Reading user")? else {
            return Ok(None);
        };
        state.map_fields(&response, &region)?;
        info!("Postgres Flex user read");
        Ok(Some(state))
    }

    #[instrument(skip_all, fields(instance_id = %prior.instance_id, user_id = %prior.user_id))]
    async fn update(&self, prior: UserModel, mut plan: UserModel) -> Result<UserModel, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&prior.region);
        let instance = instance(&prior.project_id, &prior.instance_id, region.clone())?;
        let user_id = prior.user_id.require("user_id")?;

        let payload = PartialUpdateUserPayload {
            roles: plan.roles.changed_from(&prior.roles),
        };
        ctx.client
            .partial_update_user(&instance, &user_id, payload)
            .await
            .map_err(|e| ProviderError::api("Updating user", e))?;
        let response = ctx
            .client
            .get_user(&instance, &user_id)
            .await
            .map_err(|e| ProviderError::api("Reading user after update", e))?;

        plan.user_id = prior.user_id.clone();
        plan.password = prior.password.clone();
        plan.uri = prior.uri.clone();
        plan.map_fields(&response, &region)?;
        info!("Postgres Flex user updated");
        Ok(plan)
    }

    #[instrument(skip_all, fields(instance_id = %state.instance_id, user_id = %state.user_id))]
    async fn delete(&self, state: UserModel) -> Result<(), ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let instance = instance(&state.project_id, &state.instance_id, ctx.region(&state.region))?;
        let user_id = state.user_id.require("user_id")?;

        ignore_not_found(ctx.client.delete_user(&instance, &user_id).await, "Deleting user")?;
        info!("Postgres Flex user deleted");
        Ok(())
    }
}

/// `stackit_postgresflex_user` data source. Credentials are never exposed.
#[derive(Default)]
pub struct UserDataSource {
    ctx: Configured<PostgresContext>,
}

#[async_trait]
impl ManagedDataSource for UserDataSource {
    type Model = UserModel;
    const TYPE_NAME: &'static str = "stackit_postgresflex_user";

    fn schema() -> Schema {
        shared_attributes(Schema::v0())
            .with_description("Postgres Flex user data source schema.")
            .with_attribute("user_id", Attribute::required_id())
            .with_attribute("username", Attribute::computed_string())
            .with_attribute("roles", roles_attribute(AttributeFlags::computed()))
    }

    fn configure(&self, data: Arc<ProviderData>, clients: &dyn ClientFactory) -> Result<(), ProviderError> {
        configure_postgres(&self.ctx, data, clients, Self::TYPE_NAME)
    }

    #[instrument(skip_all, fields(instance_id = %config.instance_id, user_id = %config.user_id))]
    async fn read(&self, mut config: UserModel) -> Result<UserModel, ProviderError> {
        let ctx = self.ctx.get(Self::TYPE_NAME)?;
        let region = ctx.region(&config.region);
        let instance = instance(&config.project_id, &config.instance_id, region.clone())?;
        let user_id = config.user_id.require("user_id")?;

        let response = ctx
            .client
            .get_user(&instance, &user_id)
            .await
            .map_err(|e| data_source_error(&format!("user {:?}", user_id), e))?;
        config.map_fields(&response, &region)?;
        config.password = Attr::Null;
        config.uri = Attr::Null;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> UserModel {
        UserModel {
            project_id: Attr::known("p"),
            instance_id: Attr::known("i"),
            username: Attr::known("app"),
            roles: Attr::Known(vec!["login".into()]),
            ..Default::default()
        }
    }

    fn created(password: Option<&str>, uri: Option<&str>) -> UserResponse {
        UserResponse {
            item: Some(User {
                id: Some("u1".into()),
                username: Some("app".into()),
                roles: Some(vec!["login".into()]),
                password: password.map(str::to_string),
                host: Some("pg.example".into()),
                port: Some(5432),
                uri: uri.map(str::to_string),
            }),
        }
    }

    #[test]
    fn test_create_keeps_credentials() {
        let mut m = model();
        m.map_fields_create(&created(Some("secret"), Some("postgresql://app@pg")), "eu01")
            .unwrap();
        assert_eq!(m.id, Attr::known("p,eu01,i,u1"));
        assert_eq!(m.password, Attr::known("secret"));
        assert_eq!(m.uri, Attr::known("postgresql://app@pg"));
        assert_eq!(m.port, Attr::Known(5432));
    }

    #[test]
    fn test_create_tolerates_missing_uri() {
        let mut m = model();
        m.map_fields_create(&created(Some("secret"), None), "eu01").unwrap();
        assert_eq!(m.uri, Attr::Null);
    }

    #[test]
    fn test_create_requires_password() {
        let mut m = model();
        let err = m.map_fields_create(&created(None, None), "eu01").unwrap_err();
        assert!(matches!(err, ProviderError::Mapping(_)));
        assert_eq!(m.user_id, Attr::Null);
    }

    #[test]
    fn test_read_preserves_password() {
        let mut m = model();
        m.user_id = Attr::known("u1");
        m.password = Attr::known("secret");
        m.map_fields(&created(None, None), "eu01").unwrap();
        assert_eq!(m.password, Attr::known("secret"));
    }
}
