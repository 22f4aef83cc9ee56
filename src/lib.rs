//! DuploCloud Provider
//!
//! An infrastructure provider for the DuploCloud control plane. It manages
//! tenant docker credentials, Duplo services and AWS load balancer target
//! groups, and reads tenant credentials, KMS keys, native hosts, target
//! groups and plan KMS keys.
//!
//! # Overview
//!
//! The crate is layered:
//!
//! - **Client**: [`client::Client`] speaks the control plane's REST API with
//!   `reqwest`. Handlers only see the [`client::DuploApi`] trait.
//! - **Handlers**: each resource implements [`resources::ResourceHandler`]
//!   and each data source [`data_sources::DataSourceHandler`]. They convert
//!   between JSON state and the control plane's wire types.
//! - **Provider**: [`DuploProvider`] implements [`ProviderService`], the
//!   contract the host drives. It validates, plans and dispatches by type
//!   name.
//!
//! # Quick Start
//!
//! ```ignore
//! use duplocloud_provider::{DuploProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     duplocloud_provider::init_logging();
//!
//!     let provider = DuploProvider::new();
//!     provider
//!         .configure(json!({
//!             "duplo_host": "https://duplo.example.com",
//!             "duplo_token": std::env::var("DUPLO_TOKEN")?,
//!         }))
//!         .await?;
//!
//!     let keys = provider
//!         .read_data_source(
//!             "duplocloud_tenant_aws_kms_keys",
//!             json!({"tenant_id": "2f0e4b1c-7d3a-4c5e-9f61-0a8b2c3d4e5f"}),
//!         )
//!         .await?;
//!     println!("{}", keys["keys"]);
//!     Ok(())
//! }
//! ```
//!
//! # Resources
//!
//! - `duplocloud_docker_credentials`
//! - `duplocloud_duplo_service`
//! - `duplocloud_aws_lb_target_group`
//!
//! # Data Sources
//!
//! - `duplocloud_tenant_aws_credentials`
//! - `duplocloud_tenant_aws_kms_key` and `duplocloud_tenant_aws_kms_keys`
//! - `duplocloud_native_hosts`
//! - `duplocloud_aws_lb_target_groups`
//! - `duplocloud_plan_kms_v2` and `duplocloud_plan_kms_key_v2`

#![warn(missing_docs)]
#![warn(clippy::all)]

#[allow(missing_docs)]
pub mod client;
pub mod config;
pub mod context;
pub mod data_sources;
pub mod docker_config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod state;
pub mod testing;
pub mod types;
pub mod validation;
pub mod wait;

// Re-export main types at crate root
pub use client::{Client, ClientError, DuploApi};
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::DuploProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use state::ResourceData;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
