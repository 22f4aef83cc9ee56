//! KMS keys registered on an infrastructure plan.
//!
//! Older control planes lack the v3 plan KMS endpoints, so a 404 or 500 from
//! them falls back to searching the plan's own `KmsKeyInfos`.

use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::client::plan::DuploPlanKmsKeyInfo;
use crate::context::HandlerContext;
use crate::schema::{Attribute, Block, Schema};
use crate::state::ResourceData;
use crate::ProviderError;

use super::DataSourceHandler;

/// `duplocloud_plan_kms_v2`: one KMS key of a plan, by name.
pub struct PlanKms;

/// `duplocloud_plan_kms_key_v2`: every KMS key of a plan.
pub struct PlanKmsList;

fn plan_id_input() -> Attribute {
    Attribute::required_string().with_description("The plan ID")
}

fn kms_block() -> Block {
    Block::new()
        .with_attribute("name", Attribute::computed_string())
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("arn", Attribute::computed_string())
}

fn flatten_kms(key: &DuploPlanKmsKeyInfo) -> Value {
    json!({"name": key.key_name, "id": key.key_id, "arn": key.key_arn})
}

async fn plan_kms_infos(
    ctx: &HandlerContext,
    plan_id: &str,
) -> Result<Option<Vec<DuploPlanKmsKeyInfo>>, ProviderError> {
    let plan = ctx.api().plan_get(plan_id).await.map_err(|err| {
        ProviderError::api_context("failed to read plan kms info", err)
    })?;
    match plan {
        Some(plan) => Ok(plan.kms_key_infos),
        None => Err(ProviderError::NotFound(format!("failed to read plan: {}", plan_id))),
    }
}

/// Look up one KMS key of a plan.
async fn get_plan_kms(
    ctx: &HandlerContext,
    plan_id: &str,
    name: &str,
) -> Result<DuploPlanKmsKeyInfo, ProviderError> {
    match ctx.api().plan_get_kms_key(plan_id, name).await {
        Ok(key) => return Ok(key),
        Err(err) if err.possible_missing_api() => {
            debug!(plan_id = %plan_id, name = %name, error = %err, "plan kms key: using fallback");
        },
        Err(err) => {
            return Err(ProviderError::api_context(
                format!("failed to retrieve plan kms key for '{}/{}'", plan_id, name),
                err,
            ))
        },
    }

    plan_kms_infos(ctx, plan_id)
        .await?
        .into_iter()
        .flatten()
        .find(|key| key.key_name == name)
        .ok_or_else(|| {
            ProviderError::NotFound(format!(
                "failed to retrieve plan kms key for '{}/{}'",
                plan_id, name
            ))
        })
}

/// List the KMS keys of a plan.
async fn get_plan_kms_keys(
    ctx: &HandlerContext,
    plan_id: &str,
) -> Result<Vec<DuploPlanKmsKeyInfo>, ProviderError> {
    match ctx.api().plan_kms_get_list(plan_id).await {
        Ok(keys) => return Ok(keys),
        Err(err) if err.possible_missing_api() => {
            debug!(plan_id = %plan_id, error = %err, "plan kms keys: using fallback");
        },
        Err(err) => {
            return Err(ProviderError::api_context(
                format!("failed to retrieve plan kms keys for '{}'", plan_id),
                err,
            ))
        },
    }

    Ok(plan_kms_infos(ctx, plan_id).await?.unwrap_or_default())
}

#[async_trait::async_trait]
impl DataSourceHandler for PlanKms {
    fn type_name(&self) -> &'static str {
        "duplocloud_plan_kms_v2"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("`duplocloud_plan_kms` retrieves details of a specific kms for a given plan.")
            .with_attribute("plan_id", plan_id_input())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("key_id", Attribute::computed_string())
            .with_attribute("arn", Attribute::computed_string())
    }

    async fn read(&self, ctx: &HandlerContext, config: ResourceData) -> Result<ResourceData, ProviderError> {
        let plan_id = config.required_str("plan_id")?.to_string();
        let name = config.required_str("name")?.to_string();
        trace!(plan_id = %plan_id, name = %name, "plan kms read: start");

        let key = get_plan_kms(ctx, &plan_id, &name).await?;

        let mut state = config;
        state.set_id(format!("{}/kms/{}", plan_id, key.key_name));
        state.set("name", &key.key_name)?;
        state.set("key_id", &key.key_id)?;
        state.set("arn", &key.key_arn)?;
        trace!(plan_id = %plan_id, "plan kms read: end");
        Ok(state)
    }
}

#[async_trait::async_trait]
impl DataSourceHandler for PlanKmsList {
    fn type_name(&self) -> &'static str {
        "duplocloud_plan_kms_key_v2"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("`duplocloud_plan_kms_key` retrieves a list of kms keys for a given plan.")
            .with_attribute("plan_id", plan_id_input())
            .with_attribute(
                "kms_keys",
                Attribute::computed_list_of(&kms_block())
                    .with_description("The list of kms keys for this plan."),
            )
    }

    async fn read(&self, ctx: &HandlerContext, config: ResourceData) -> Result<ResourceData, ProviderError> {
        let plan_id = config.required_str("plan_id")?.to_string();
        trace!(plan_id = %plan_id, "plan kms list read: start");

        let keys: Vec<Value> = get_plan_kms_keys(ctx, &plan_id)
            .await?
            .iter()
            .map(flatten_kms)
            .collect();

        let mut state = config;
        state.set_id(format!("{}/kms", plan_id));
        state.set("kms_keys", keys)?;
        trace!(plan_id = %plan_id, "plan kms list read: end");
        Ok(state)
    }
}
