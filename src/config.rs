//! Provider configuration.
//!
//! The provider block is deserialized into [`ProviderConfig`], completed from
//! the environment and resolved once into an immutable [`ProviderData`] that
//! every resource receives as an `Arc`.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema};

/// Region used when neither configuration nor environment names one.
pub const DEFAULT_REGION: &str = "eu01";

/// Experiment gating routing tables and routes.
pub const ROUTING_TABLES_EXPERIMENT: &str = "routing-tables";

/// All experiments this provider knows about.
pub const AVAILABLE_EXPERIMENTS: &[&str] = &[ROUTING_TABLES_EXPERIMENT];

const ENV_REGION: &str = "STACKIT_REGION";
const ENV_TOKEN: &str = "STACKIT_SERVICE_ACCOUNT_TOKEN";
const ENV_KEY_PATH: &str = "STACKIT_SERVICE_ACCOUNT_KEY_PATH";

/// Remote services with their own endpoint override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
    /// IaaS (network areas, routing tables).
    Iaas,
    /// PostgreSQL Flex.
    PostgresFlex,
    /// RabbitMQ.
    RabbitMq,
    /// MariaDB.
    MariaDb,
    /// Load Balancer.
    LoadBalancer,
    /// Cloud Foundry.
    Scf,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Iaas => "iaas",
            Self::PostgresFlex => "postgresflex",
            Self::RabbitMq => "rabbitmq",
            Self::MariaDb => "mariadb",
            Self::LoadBalancer => "loadbalancer",
            Self::Scf => "scf",
        };
        f.write_str(name)
    }
}

/// The raw provider block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Region used by resources that leave `region` unset.
    pub default_region: Option<String>,
    /// Long-lived service account access token.
    pub service_account_token: Option<String>,
    /// Path to a service account key file.
    pub service_account_key_path: Option<String>,
    /// Opt-in experimental features.
    pub experiments: Vec<String>,
    /// Custom IaaS endpoint.
    pub iaas_custom_endpoint: Option<String>,
    /// Custom PostgreSQL Flex endpoint.
    pub postgresflex_custom_endpoint: Option<String>,
    /// Custom RabbitMQ endpoint.
    pub rabbitmq_custom_endpoint: Option<String>,
    /// Custom MariaDB endpoint.
    pub mariadb_custom_endpoint: Option<String>,
    /// Custom Load Balancer endpoint.
    pub loadbalancer_custom_endpoint: Option<String>,
    /// Custom Cloud Foundry endpoint.
    pub scf_custom_endpoint: Option<String>,
    /// Custom token endpoint for key-flow authentication.
    pub token_custom_endpoint: Option<String>,
}

impl ProviderConfig {
    /// Schema of the provider block.
    pub fn schema() -> Schema {
        let endpoint = |service: &str| {
            Attribute::optional_string()
                .with_description(format!("Custom endpoint for the {} service", service))
        };
        Schema::v0()
            .with_attribute(
                "default_region",
                Attribute::optional_string()
                    .with_description("Region used by resources that do not set one"),
            )
            .with_attribute(
                "service_account_token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("Service account access token"),
            )
            .with_attribute(
                "service_account_key_path",
                Attribute::optional_string().with_description("Path to a service account key"),
            )
            .with_attribute(
                "experiments",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    crate::schema::AttributeFlags::optional(),
                )
                .with_description("Experimental features to enable"),
            )
            .with_attribute("iaas_custom_endpoint", endpoint("IaaS"))
            .with_attribute("postgresflex_custom_endpoint", endpoint("PostgreSQL Flex"))
            .with_attribute("rabbitmq_custom_endpoint", endpoint("RabbitMQ"))
            .with_attribute("mariadb_custom_endpoint", endpoint("MariaDB"))
            .with_attribute("loadbalancer_custom_endpoint", endpoint("Load Balancer"))
            .with_attribute("scf_custom_endpoint", endpoint("Cloud Foundry"))
            .with_attribute("token_custom_endpoint", endpoint("token"))
    }

    /// Parse the provider block.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
            .map_err(|e| ProviderError::Configuration(format!("invalid provider block: {}", e)))
    }

    /// Resolve against the process environment.
    pub fn resolve(self) -> Result<ProviderData, ProviderError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup.
    pub fn resolve_with<F>(self, env: F) -> Result<ProviderData, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());

        let default_region = non_empty(self.default_region)
            .or_else(|| non_empty(env(ENV_REGION)))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let credentials = match (
            non_empty(self.service_account_token).or_else(|| non_empty(env(ENV_TOKEN))),
            non_empty(self.service_account_key_path).or_else(|| non_empty(env(ENV_KEY_PATH))),
        ) {
            (_, Some(path)) => Credentials::KeyPath(path),
            (Some(token), None) => Credentials::Token(token),
            (None, None) => {
                return Err(ProviderError::Configuration(format!(
                    "no credentials found: set service_account_key_path or service_account_token, \
                     or the {} / {} environment variables",
                    ENV_KEY_PATH, ENV_TOKEN
                )))
            },
        };

        let mut experiments = BTreeSet::new();
        for experiment in self.experiments {
            let experiment = experiment.to_lowercase();
            if !AVAILABLE_EXPERIMENTS.contains(&experiment.as_str()) {
                return Err(ProviderError::Configuration(format!(
                    "unknown experiment {:?}, available experiments: {}",
                    experiment,
                    AVAILABLE_EXPERIMENTS.join(", ")
                )));
            }
            experiments.insert(experiment);
        }

        let mut endpoints = Vec::new();
        for (service, endpoint) in [
            (Service::Iaas, self.iaas_custom_endpoint),
            (Service::PostgresFlex, self.postgresflex_custom_endpoint),
            (Service::RabbitMq, self.rabbitmq_custom_endpoint),
            (Service::MariaDb, self.mariadb_custom_endpoint),
            (Service::LoadBalancer, self.loadbalancer_custom_endpoint),
            (Service::Scf, self.scf_custom_endpoint),
        ] {
            if let Some(endpoint) = non_empty(endpoint) {
                endpoints.push((service, endpoint));
            }
        }

        Ok(ProviderData {
            default_region,
            credentials,
            experiments,
            endpoints,
            token_endpoint: non_empty(self.token_custom_endpoint),
        })
    }
}

/// How the provider authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A static access token.
    Token(String),
    /// A service account key file.
    KeyPath(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::KeyPath(path) => f.debug_tuple("KeyPath").field(path).finish(),
        }
    }
}

/// Resolved, immutable provider-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderData {
    /// Region used when a resource leaves `region` unset.
    pub default_region: String,
    /// Authentication material.
    pub credentials: Credentials,
    experiments: BTreeSet<String>,
    endpoints: Vec<(Service, String)>,
    token_endpoint: Option<String>,
}

impl ProviderData {
    /// Settings for tests and embedders that bring their own transport.
    pub fn new(default_region: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            default_region: default_region.into(),
            credentials,
            experiments: BTreeSet::new(),
            endpoints: Vec::new(),
            token_endpoint: None,
        }
    }

    /// Enable an experiment.
    pub fn with_experiment(mut self, experiment: &str) -> Self {
        self.experiments.insert(experiment.to_string());
        self
    }

    /// Override the endpoint of a service.
    pub fn with_endpoint(mut self, service: Service, endpoint: impl Into<String>) -> Self {
        self.endpoints.retain(|(s, _)| *s != service);
        self.endpoints.push((service, endpoint.into()));
        self
    }

    /// Custom endpoint for a service, if configured.
    pub fn endpoint(&self, service: Service) -> Option<&str> {
        self.endpoints
            .iter()
            .find(|(s, _)| *s == service)
            .map(|(_, e)| e.as_str())
    }

    /// Custom token endpoint, if configured.
    pub fn token_endpoint(&self) -> Option<&str> {
        self.token_endpoint.as_deref()
    }

    /// Whether an experiment is enabled.
    pub fn experiment_enabled(&self, experiment: &str) -> bool {
        self.experiments.contains(experiment)
    }

    /// Fail unless an experiment is enabled.
    pub fn require_experiment(&self, experiment: &str, type_name: &str) -> Result<(), ProviderError> {
        if self.experiment_enabled(experiment) {
            return Ok(());
        }
        Err(ProviderError::Configuration(format!(
            "{} is part of the {:?} experiment, which is currently disabled by default. \
             Enable it by adding {:?} to the provider's experiments list",
            type_name, experiment, experiment
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_and_env_fallback() {
        let config = ProviderConfig::from_value(json!({"service_account_token": "t"})).unwrap();
        let data = config.clone().resolve_with(no_env).unwrap();
        assert_eq!(data.default_region, DEFAULT_REGION);
        assert_eq!(data.credentials, Credentials::Token("t".to_string()));

        let data = config
            .resolve_with(|k| (k == ENV_REGION).then(|| "eu02".to_string()))
            .unwrap();
        assert_eq!(data.default_region, "eu02");
    }

    #[test]
    fn test_explicit_region_wins_over_env() {
        let config = ProviderConfig::from_value(json!({
            "default_region": "eu01",
            "service_account_key_path": "/tmp/key.json"
        }))
        .unwrap();
        let data = config
            .resolve_with(|k| (k == ENV_REGION).then(|| "eu02".to_string()))
            .unwrap();
        assert_eq!(data.default_region, "eu01");
        assert_eq!(data.credentials, Credentials::KeyPath("/tmp/key.json".to_string()));
    }

    #[test]
    fn test_missing_credentials() {
        let err = ProviderConfig::default().resolve_with(no_env).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_experiments() {
        let config = ProviderConfig::from_value(json!({
            "service_account_token": "t",
            "experiments": ["Routing-Tables"]
        }))
        .unwrap();
        let data = config.resolve_with(no_env).unwrap();
        assert!(data.experiment_enabled(ROUTING_TABLES_EXPERIMENT));
        assert!(data
            .require_experiment(ROUTING_TABLES_EXPERIMENT, "stackit_routing_table")
            .is_ok());

        let config = ProviderConfig::from_value(json!({
            "service_account_token": "t",
            "experiments": ["time-travel"]
        }))
        .unwrap();
        assert!(config.resolve_with(no_env).is_err());
    }

    #[test]
    fn test_endpoints() {
        let config = ProviderConfig::from_value(json!({
            "service_account_token": "t",
            "postgresflex_custom_endpoint": "https://pg.example",
            "iaas_custom_endpoint": ""
        }))
        .unwrap();
        let data = config.resolve_with(no_env).unwrap();
        assert_eq!(data.endpoint(Service::PostgresFlex), Some("https://pg.example"));
        assert_eq!(data.endpoint(Service::Iaas), None);
    }

    #[test]
    fn test_token_is_redacted() {
        let creds = Credentials::Token("secret".to_string());
        assert!(!format!("{:?}", creds).contains("secret"));
    }

    #[test]
    fn test_invalid_block() {
        let err = ProviderConfig::from_value(json!({"experiments": "not-a-list"})).unwrap_err();
        assert!(err.to_string().contains("invalid provider block"));
    }
}
