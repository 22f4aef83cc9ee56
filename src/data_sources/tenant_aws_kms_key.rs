use serde_json::{json, Value};
use tracing::trace;

use crate::client::tenant::DuploAwsKmsKey;
use crate::context::HandlerContext;
use crate::schema::{Attribute, Block, Schema};
use crate::state::ResourceData;
use crate::ProviderError;

use super::{tenant_id_input, DataSourceHandler};

/// `duplocloud_tenant_aws_kms_key`: one KMS key usable by a tenant.
///
/// Without a `key_name` this is the tenant's own key.
pub struct TenantAwsKmsKey;

/// `duplocloud_tenant_aws_kms_keys`: every KMS key usable by a tenant.
pub struct TenantAwsKmsKeys;

fn key_block() -> Block {
    Block::new()
        .with_attribute("key_id", Attribute::computed_string())
        .with_attribute("key_name", Attribute::computed_string())
        .with_attribute("key_arn", Attribute::computed_string())
}

fn flatten_key(key: &DuploAwsKmsKey) -> Value {
    json!({
        "key_id": key.key_id,
        "key_name": key.key_name,
        "key_arn": key.key_arn,
    })
}

#[async_trait::async_trait]
impl DataSourceHandler for TenantAwsKmsKey {
    fn type_name(&self) -> &'static str {
        "duplocloud_tenant_aws_kms_key"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("tenant_id", tenant_id_input())
            .with_attribute("key_name", Attribute::optional_computed_string())
            .with_attribute("key_id", Attribute::computed_string())
            .with_attribute("key_arn", Attribute::computed_string())
    }

    async fn read(&self, ctx: &HandlerContext, config: ResourceData) -> Result<ResourceData, ProviderError> {
        let tenant_id = config.required_str("tenant_id")?.to_string();
        let key_name = config.get_str("key_name").to_string();
        trace!(tenant_id = %tenant_id, key_name = %key_name, "tenant kms key read: start");

        let key = if key_name.is_empty() {
            ctx.api().tenant_get_tenant_kms_key(&tenant_id).await?
        } else {
            ctx.api()
                .tenant_get_kms_key_by_name(&tenant_id, &key_name)
                .await?
                .ok_or_else(|| {
                    ProviderError::NotFound(format!(
                        "tenant {} has no usable KMS key named '{}'",
                        tenant_id, key_name
                    ))
                })?
        };

        let mut state = config;
        state.set_id(format!("{}/{}", tenant_id, key.key_id));
        state.set("key_id", &key.key_id)?;
        state.set("key_name", &key.key_name)?;
        state.set("key_arn", &key.key_arn)?;
        trace!(tenant_id = %tenant_id, "tenant kms key read: end");
        Ok(state)
    }
}

#[async_trait::async_trait]
impl DataSourceHandler for TenantAwsKmsKeys {
    fn type_name(&self) -> &'static str {
        "duplocloud_tenant_aws_kms_keys"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("tenant_id", tenant_id_input())
            .with_attribute(
                "selectable",
                Attribute::optional_bool().with_default(json!(true)),
            )
            .with_attribute("keys", Attribute::computed_list_of(&key_block()))
    }

    async fn read(&self, ctx: &HandlerContext, config: ResourceData) -> Result<ResourceData, ProviderError> {
        let tenant_id = config.required_str("tenant_id")?.to_string();
        let selectable = config
            .get("selectable")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        trace!(tenant_id = %tenant_id, selectable, "tenant kms keys read: start");

        let keys: Vec<Value> = ctx
            .api()
            .tenant_get_all_kms_keys(&tenant_id)
            .await?
            .iter()
            .filter(|key| !selectable || !key.key_id.is_empty())
            .map(flatten_key)
            .collect();

        let mut state = config;
        state.set_id(tenant_id.as_str());
        state.set("selectable", selectable)?;
        state.set("keys", keys)?;
        trace!(tenant_id = %tenant_id, "tenant kms keys read: end");
        Ok(state)
    }
}
