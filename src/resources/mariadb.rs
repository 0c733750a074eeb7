//! `stackit_mariadb_instance` resource and data source.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::dsa::{DsaInstanceDataSource, DsaInstanceResource, DsaService};
use crate::client::dsa::{DsaApi, MariadbParameters};
use crate::client::ClientFactory;
use crate::config::ProviderData;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block};
use crate::value::Attr;

/// MariaDB instance parameters.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MariadbParametersModel {
    pub enable_monitoring: Attr<bool>,
    pub graphite: Attr<String>,
    pub max_disk_threshold: Attr<i64>,
    pub metrics_frequency: Attr<i64>,
    pub metrics_prefix: Attr<String>,
    pub monitoring_instance_id: Attr<String>,
    pub sgw_acl: Attr<String>,
    pub syslog: Attr<Vec<String>>,
}

/// The MariaDB data service.
pub struct MariaDb;

impl DsaService for MariaDb {
    type Parameters = MariadbParameters;
    type ParametersModel = MariadbParametersModel;
    const TYPE_NAME: &'static str = "stackit_mariadb_instance";
    const DISPLAY_NAME: &'static str = "MariaDB";

    fn client(
        clients: &dyn ClientFactory,
        data: &ProviderData,
    ) -> Result<Arc<dyn DsaApi<Parameters = MariadbParameters>>, ProviderError> {
        clients.mariadb(data)
    }

    fn parameters_block(configurable: bool) -> Block {
        let flags = if configurable {
            AttributeFlags::optional_computed()
        } else {
            AttributeFlags::computed()
        };
        let string = || Attribute::new(AttributeType::String, flags);
        let int = || Attribute::new(AttributeType::Int64, flags);

        Block::new()
            .with_attribute("enable_monitoring", Attribute::new(AttributeType::Bool, flags))
            .with_attribute("graphite", string())
            .with_attribute(
                "max_disk_threshold",
                int().with_description("The maximum disk threshold in MB. If the disk usage exceeds this threshold, the instance will be stopped."),
            )
            .with_attribute("metrics_frequency", int())
            .with_attribute("metrics_prefix", string())
            .with_attribute("monitoring_instance_id", string())
            .with_attribute("sgw_acl", string())
            .with_attribute("syslog", Attribute::new(AttributeType::list(AttributeType::String), flags))
    }

    fn parameters_to_wire(model: &MariadbParametersModel) -> MariadbParameters {
        MariadbParameters {
            enable_monitoring: model.enable_monitoring.to_wire(),
            graphite: model.graphite.to_wire(),
            max_disk_threshold: model.max_disk_threshold.to_wire(),
            metrics_frequency: model.metrics_frequency.to_wire(),
            metrics_prefix: model.metrics_prefix.to_wire(),
            monitoring_instance_id: model.monitoring_instance_id.to_wire(),
            sgw_acl: model.sgw_acl.to_wire(),
            syslog: model.syslog.to_wire(),
        }
    }

    fn parameters_from_wire(wire: &MariadbParameters) -> MariadbParametersModel {
        MariadbParametersModel {
            enable_monitoring: Attr::from_wire(wire.enable_monitoring),
            graphite: Attr::from_wire(wire.graphite.clone()),
            max_disk_threshold: Attr::from_wire(wire.max_disk_threshold),
            metrics_frequency: Attr::from_wire(wire.metrics_frequency),
            metrics_prefix: Attr::from_wire(wire.metrics_prefix.clone()),
            monitoring_instance_id: Attr::from_wire(wire.monitoring_instance_id.clone()),
            sgw_acl: Attr::from_wire(wire.sgw_acl.clone()),
            syslog: Attr::from_wire(wire.syslog.clone()),
        }
    }
}

/// `stackit_mariadb_instance` resource.
pub type MariaDbInstanceResource = DsaInstanceResource<MariaDb>;

/// `stackit_mariadb_instance` data source.
pub type MariaDbInstanceDataSource = DsaInstanceDataSource<MariaDb>;
