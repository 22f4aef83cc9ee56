//! Read-only data sources.

mod native_hosts;
mod plan_kms;
mod tenant_aws_credentials;
mod tenant_aws_kms_key;
mod tenant_lb_target_groups;

use std::sync::Arc;

use crate::context::HandlerContext;
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;
use crate::ProviderError;

pub use native_hosts::NativeHosts;
pub use plan_kms::{PlanKms, PlanKmsList};
pub use tenant_aws_credentials::TenantAwsCredentials;
pub use tenant_aws_kms_key::{TenantAwsKmsKey, TenantAwsKmsKeys};
pub use tenant_lb_target_groups::TenantLbTargetGroups;

/// One data source type.
#[async_trait::async_trait]
pub trait DataSourceHandler: Send + Sync {
    /// The type name users write, e.g. `duplocloud_native_hosts`.
    fn type_name(&self) -> &'static str;

    /// The data source's schema.
    fn schema(&self) -> Schema;

    /// Look up the data and return `config` with the computed values filled in.
    async fn read(&self, ctx: &HandlerContext, config: ResourceData) -> Result<ResourceData, ProviderError>;
}

/// Every data source the provider offers.
pub fn all() -> Vec<Arc<dyn DataSourceHandler>> {
    vec![
        Arc::new(TenantAwsCredentials),
        Arc::new(TenantAwsKmsKey),
        Arc::new(TenantAwsKmsKeys),
        Arc::new(NativeHosts),
        Arc::new(TenantLbTargetGroups),
        Arc::new(PlanKms),
        Arc::new(PlanKmsList),
    ]
}

fn tenant_id_input() -> Attribute {
    Attribute::required_string()
        .with_validator(crate::schema::ValueValidator::Uuid)
}
