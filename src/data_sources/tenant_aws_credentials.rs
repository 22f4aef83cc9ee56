use std::time::{SystemTime, UNIX_EPOCH};

use tracing::trace;

use crate::context::HandlerContext;
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;
use crate::ProviderError;

use super::{tenant_id_input, DataSourceHandler};

/// `duplocloud_tenant_aws_credentials`: just-in-time AWS credentials for a tenant.
pub struct TenantAwsCredentials;

#[async_trait::async_trait]
impl DataSourceHandler for TenantAwsCredentials {
    fn type_name(&self) -> &'static str {
        "duplocloud_tenant_aws_credentials"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(
                "`duplocloud_tenant_aws_credentials` retrieves just-in-time AWS credentials for a tenant.",
            )
            .with_attribute("tenant_id", tenant_id_input())
            .with_attribute("console_url", Attribute::computed_string().sensitive())
            .with_attribute("access_key_id", Attribute::computed_string().sensitive())
            .with_attribute("secret_access_key", Attribute::computed_string().sensitive())
            .with_attribute("session_token", Attribute::computed_string().sensitive())
            .with_attribute("region", Attribute::computed_string())
    }

    async fn read(&self, ctx: &HandlerContext, config: ResourceData) -> Result<ResourceData, ProviderError> {
        let tenant_id = config.required_str("tenant_id")?.to_string();
        trace!(tenant_id = %tenant_id, "tenant aws credentials read: start");

        let creds = ctx
            .api()
            .tenant_get_aws_credentials(&tenant_id)
            .await
            .map_err(|err| {
                ProviderError::api_context(
                    format!("failed to read AWS credentials from tenant '{}'", tenant_id),
                    err,
                )
            })?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut state = config;
        state.set_id(format!("{}-{}", tenant_id, now));
        state.set("console_url", &creds.console_url)?;
        state.set("access_key_id", &creds.access_key_id)?;
        state.set("secret_access_key", &creds.secret_access_key)?;
        state.set("session_token", &creds.session_token)?;
        state.set("region", &creds.region)?;
        trace!(tenant_id = %tenant_id, "tenant aws credentials read: end");
        Ok(state)
    }
}
