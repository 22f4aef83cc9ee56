//! Managed resources.
//!
//! Each resource pairs a [`Schema`] with create/read/update/delete handlers
//! that call the control plane and flatten its answers into state.

mod docker_credentials;
mod duplo_service;
mod target_group;

use std::sync::Arc;

use serde_json::Value;

use crate::context::HandlerContext;
use crate::schema::Schema;
use crate::state::ResourceData;
use crate::ProviderError;

pub use docker_credentials::DockerCredentials;
pub use duplo_service::DuploService;
pub use target_group::AwsLbTargetGroup;

/// One resource type.
#[async_trait::async_trait]
pub trait ResourceHandler: Send + Sync {
    /// The type name users write, e.g. `duplocloud_duplo_service`.
    fn type_name(&self) -> &'static str;

    /// The resource's schema.
    fn schema(&self) -> Schema;

    /// Create the resource and return its state as read back.
    async fn create(&self, ctx: &HandlerContext, planned: ResourceData) -> Result<ResourceData, ProviderError>;

    /// Read current state. `None` means the resource is gone.
    async fn read(&self, ctx: &HandlerContext, state: ResourceData) -> Result<Option<ResourceData>, ProviderError>;

    /// Apply in-place changes and return the state as read back.
    async fn update(
        &self,
        ctx: &HandlerContext,
        prior: ResourceData,
        planned: ResourceData,
    ) -> Result<ResourceData, ProviderError>;

    /// Delete the resource. Deleting something already gone succeeds.
    async fn delete(&self, ctx: &HandlerContext, state: ResourceData) -> Result<(), ProviderError>;

    /// Rewrite configured values into the form kept in state.
    fn normalize(&self, planned: &mut ResourceData) -> Result<(), ProviderError> {
        let _ = planned;
        Ok(())
    }

    /// Whether a difference in `key` should be ignored when planning.
    fn suppress_diff(&self, key: &str, old: &Value, new: &Value, planned: &ResourceData) -> bool {
        let _ = (key, old, new, planned);
        false
    }

    /// Whether the resource can be imported by ID.
    fn importable(&self) -> bool {
        true
    }
}

/// Every resource the provider manages.
pub fn all() -> Vec<Arc<dyn ResourceHandler>> {
    vec![
        Arc::new(DockerCredentials),
        Arc::new(DuploService),
        Arc::new(AwsLbTargetGroup),
    ]
}

/// The shared `tenant_id` attribute of tenant-scoped resources.
pub(crate) fn tenant_id_attribute(what: &str) -> crate::schema::Attribute {
    crate::schema::Attribute::required_string()
        .with_description(format!("The GUID of the tenant that the {} will be created in.", what))
        .with_force_new()
        .with_validator(crate::schema::ValueValidator::Uuid)
}
