//! STACKIT Provider
//!
//! Resource implementations and shared building blocks for a Terraform
//! provider managing STACKIT cloud infrastructure.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Provider configuration**: Region, credentials, experiments and custom endpoints
//! - **Schema types**: Types for describing provider, resource, and data source schemas
//! - **Three-state values**: [`Attr`] distinguishes null, unknown and known attributes
//! - **Shared helpers**: Composite ids, tagged unions, label merge-patches and region planning
//! - **Resources**: Routing tables, routes, PostgreSQL Flex, RabbitMQ, MariaDB,
//!   Load Balancer credentials and Cloud Foundry organization managers
//! - **ProviderService trait**: The host-facing surface of [`StackitProvider`]
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! The provider never talks HTTP itself. Every remote service is an async
//! trait in [`client`], built by a [`ClientFactory`] when the provider is
//! configured.
//!
//! # Quick Start
//!
//! ```ignore
//! use serde_json::json;
//! use stackit_provider::{init_logging, ProviderService, StackitProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     let provider = StackitProvider::new(MyClients::default());
//!     provider
//!         .configure(json!({
//!             "default_region": "eu01",
//!             "service_account_key_path": "sa.json",
//!             "experiments": ["routing-tables"],
//!         }))
//!         .await?;
//!
//!     let state = provider
//!         .create("stackit_routing_table", json!({
//!             "organization_id": "org",
//!             "network_area_id": "area",
//!             "name": "main",
//!         }))
//!         .await?;
//!     println!("{}", state["id"]);
//!     Ok(())
//! }
//! ```
//!
//! # Resource Identity
//!
//! Every resource id is its path segments joined with `,`, for example
//! `organization_id,region,network_area_id,routing_table_id,route_id`.
//! Imports accept the same format.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod logging;
pub mod patch;
pub mod plan;
pub mod provider;
pub mod region;
pub mod resource;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod union;
pub mod validation;
pub mod value;

// Re-export main types at crate root
pub use client::{ApiError, ApiResult, ClientFactory};
pub use config::{ProviderConfig, ProviderData};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{Registry, StackitProvider};
pub use resource::{DataSource, ManagedDataSource, ManagedResource, Resource};
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};
pub use value::Attr;

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
