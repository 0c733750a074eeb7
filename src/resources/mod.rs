//! STACKIT resources and data sources.

pub mod dsa;
pub mod loadbalancer_credential;
pub mod mariadb;
pub mod postgresflex;
pub mod rabbitmq;
pub mod routing_table;
pub mod routing_table_route;
pub mod scf_organization_manager;

pub use loadbalancer_credential::ObservabilityCredentialResource;
pub use mariadb::{MariaDbInstanceDataSource, MariaDbInstanceResource};
pub use rabbitmq::{RabbitMqInstanceDataSource, RabbitMqInstanceResource};
pub use routing_table::{RoutingTableDataSource, RoutingTableResource};
pub use routing_table_route::{RouteDataSource, RouteResource, RoutesDataSource};
pub use scf_organization_manager::OrgManagerResource;
