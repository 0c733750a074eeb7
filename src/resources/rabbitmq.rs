//! `stackit_rabbitmq_instance` resource and data source.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::dsa::{DsaInstanceDataSource, DsaInstanceResource, DsaService};
use crate::client::dsa::{DsaApi, RabbitmqParameters};
use crate::client::ClientFactory;
use crate::config::ProviderData;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block};
use crate::value::Attr;

/// RabbitMQ instance parameters.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RabbitmqParametersModel {
    pub consumer_timeout: Attr<i64>,
    pub enable_monitoring: Attr<bool>,
    pub graphite: Attr<String>,
    pub max_disk_threshold: Attr<i64>,
    pub metrics_frequency: Attr<i64>,
    pub metrics_prefix: Attr<String>,
    pub monitoring_instance_id: Attr<String>,
    pub plugins: Attr<Vec<String>>,
    pub roles: Attr<Vec<String>>,
    pub sgw_acl: Attr<String>,
    pub syslog: Attr<Vec<String>>,
    pub tls_ciphers: Attr<Vec<String>>,
    pub tls_protocols: Attr<String>,
}

/// The RabbitMQ data service.
pub struct RabbitMq;

impl DsaService for RabbitMq {
    type Parameters = RabbitmqParameters;
    type ParametersModel = RabbitmqParametersModel;
    const TYPE_NAME: &'static str = "stackit_rabbitmq_instance";
    const DISPLAY_NAME: &'static str = "RabbitMQ";

    fn client(
        clients: &dyn ClientFactory,
        data: &ProviderData,
    ) -> Result<Arc<dyn DsaApi<Parameters = RabbitmqParameters>>, ProviderError> {
        clients.rabbitmq(data)
    }

    fn parameters_block(configurable: bool) -> Block {
        let flags = if configurable {
            AttributeFlags::optional_computed()
        } else {
            AttributeFlags::computed()
        };
        let string = || Attribute::new(AttributeType::String, flags);
        let int = || Attribute::new(AttributeType::Int64, flags);
        let list = || Attribute::new(AttributeType::list(AttributeType::String), flags);

        Block::new()
            .with_attribute("consumer_timeout", int().with_description("The timeout in milliseconds for the consumer."))
            .with_attribute("enable_monitoring", Attribute::new(AttributeType::Bool, flags))
            .with_attribute("graphite", string().with_description("Graphite server URL (host and port)."))
            .with_attribute("max_disk_threshold", int())
            .with_attribute("metrics_frequency", int())
            .with_attribute("metrics_prefix", string())
            .with_attribute("monitoring_instance_id", string())
            .with_attribute("plugins", list().with_description("List of plugins to install."))
            .with_attribute("roles", list())
            .with_attribute("sgw_acl", string().with_description("Comma separated list of IP networks in CIDR notation which are allowed to access this instance."))
            .with_attribute("syslog", list())
            .with_attribute("tls_ciphers", list())
            .with_attribute("tls_protocols", string().one_of(&["tlsv1.2", "tlsv1.3"]))
    }

    fn parameters_to_wire(model: &RabbitmqParametersModel) -> RabbitmqParameters {
        RabbitmqParameters {
            consumer_timeout: model.consumer_timeout.to_wire(),
            enable_monitoring: model.enable_monitoring.to_wire(),
            graphite: model.graphite.to_wire(),
            max_disk_threshold: model.max_disk_threshold.to_wire(),
            metrics_frequency: model.metrics_frequency.to_wire(),
            metrics_prefix: model.metrics_prefix.to_wire(),
            monitoring_instance_id: model.monitoring_instance_id.to_wire(),
            plugins: model.plugins.to_wire(),
            roles: model.roles.to_wire(),
            sgw_acl: model.sgw_acl.to_wire(),
            syslog: model.syslog.to_wire(),
            tls_ciphers: model.tls_ciphers.to_wire(),
            tls_protocols: model.tls_protocols.to_wire(),
        }
    }

    fn parameters_from_wire(wire: &RabbitmqParameters) -> RabbitmqParametersModel {
        RabbitmqParametersModel {
            consumer_timeout: Attr::from_wire(wire.consumer_timeout),
            enable_monitoring: Attr::from_wire(wire.enable_monitoring),
            graphite: Attr::from_wire(wire.graphite.clone()),
            max_disk_threshold: Attr::from_wire(wire.max_disk_threshold),
            metrics_frequency: Attr::from_wire(wire.metrics_frequency),
            metrics_prefix: Attr::from_wire(wire.metrics_prefix.clone()),
            monitoring_instance_id: Attr::from_wire(wire.monitoring_instance_id.clone()),
            plugins: Attr::from_wire(wire.plugins.clone()),
            roles: Attr::from_wire(wire.roles.clone()),
            sgw_acl: Attr::from_wire(wire.sgw_acl.clone()),
            syslog: Attr::from_wire(wire.syslog.clone()),
            tls_ciphers: Attr::from_wire(wire.tls_ciphers.clone()),
            tls_protocols: Attr::from_wire(wire.tls_protocols.clone()),
        }
    }
}

/// `stackit_rabbitmq_instance` resource.
pub type RabbitMqInstanceResource = DsaInstanceResource<RabbitMq>;

/// `stackit_rabbitmq_instance` data source.
pub type RabbitMqInstanceDataSource = DsaInstanceDataSource<RabbitMq>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ManagedResource;
    use serde_json::json;

    #[test]
    fn test_parameters_skip_unknown_values() {
        let model = RabbitmqParametersModel {
            sgw_acl: Attr::known("10.0.0.0/8"),
            plugins: Attr::Unknown,
            consumer_timeout: Attr::Known(1_800_000),
            ..Default::default()
        };
        let wire = RabbitMq::parameters_to_wire(&model);
        assert_eq!(
            serde_json::to_value(&wire).unwrap(),
            json!({"sgw_acl": "10.0.0.0/8", "consumer_timeout": 1_800_000})
        );
    }

    #[test]
    fn test_schema() {
        let schema = RabbitMqInstanceResource::schema();
        assert!(schema.is_regional());
        assert!(schema.block.blocks["parameters"].block.attributes.contains_key("tls_protocols"));
    }
}
