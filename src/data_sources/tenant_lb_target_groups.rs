use serde_json::{json, Value};
use tracing::trace;

use crate::client::target_group::DuploAwsLbTargetGroup;
use crate::client::types::DuploStringValue;
use crate::context::HandlerContext;
use crate::schema::{Attribute, Block, Schema};
use crate::state::ResourceData;
use crate::ProviderError;

use super::{tenant_id_input, DataSourceHandler};

/// `duplocloud_aws_lb_target_groups`: the load balancer target groups
/// of a tenant.
pub struct TenantLbTargetGroups;

fn target_group_block() -> Block {
    let matcher = Block::new()
        .with_attribute("grpc_code", Attribute::computed_string())
        .with_attribute("http_code", Attribute::computed_string());
    let health_check = Block::new()
        .with_attribute("enabled", Attribute::computed_bool())
        .with_attribute("path", Attribute::computed_string())
        .with_attribute("port", Attribute::computed_string())
        .with_attribute("protocol", Attribute::computed_string())
        .with_attribute("interval", Attribute::computed_int64())
        .with_attribute("timeout", Attribute::computed_int64())
        .with_attribute("healthy_threshold", Attribute::computed_int64())
        .with_attribute("unhealthy_threshold", Attribute::computed_int64())
        .with_attribute("matcher", Attribute::computed_list_of(&matcher));

    Block::new()
        .with_attribute("tenant_id", Attribute::computed_string())
        .with_attribute("arn", Attribute::computed_string())
        .with_attribute("name", Attribute::computed_string())
        .with_attribute("protocol", Attribute::computed_string())
        .with_attribute("protocol_version", Attribute::computed_string())
        .with_attribute("target_type", Attribute::computed_string())
        .with_attribute("load_balancer_arns", Attribute::computed_string_list())
        .with_attribute("vpc_id", Attribute::computed_string())
        .with_attribute("health_check", Attribute::computed_list_of(&health_check))
}

fn string_value(v: Option<&DuploStringValue>) -> &str {
    v.map(|v| v.value.as_str()).unwrap_or_default()
}

fn flatten_target_group(tenant_id: &str, tg: &DuploAwsLbTargetGroup) -> Value {
    // Always a list of one, empty when the control plane has no matcher.
    let matcher = match &tg.health_matcher {
        Some(m) => json!([{"grpc_code": m.grpc_code, "http_code": m.http_code}]),
        None => json!([{}]),
    };

    json!({
        "tenant_id": tenant_id,
        "arn": tg.target_group_arn,
        "name": tg.target_group_name,
        "protocol": string_value(tg.protocol.as_ref()),
        "protocol_version": tg.protocol_version,
        "target_type": string_value(tg.target_type.as_ref()),
        "load_balancer_arns": tg.load_balancer_arns,
        "vpc_id": tg.vpc_id,
        "health_check": [{
            "enabled": tg.health_check_enabled,
            "path": tg.health_check_path,
            "port": "",
            "protocol": string_value(tg.health_check_protocol.as_ref()),
            "interval": tg.health_check_interval_seconds,
            "timeout": tg.health_check_timeout_seconds,
            "healthy_threshold": tg.healthy_threshold,
            "unhealthy_threshold": tg.unhealthy_threshold,
            "matcher": matcher,
        }],
    })
}

#[async_trait::async_trait]
impl DataSourceHandler for TenantLbTargetGroups {
    fn type_name(&self) -> &'static str {
        "duplocloud_aws_lb_target_groups"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("tenant_id", tenant_id_input())
            .with_attribute(
                "target_groups",
                Attribute::computed_list_of(&target_group_block()),
            )
    }

    async fn read(&self, ctx: &HandlerContext, config: ResourceData) -> Result<ResourceData, ProviderError> {
        let tenant_id = config.required_str("tenant_id")?.to_string();
        trace!(tenant_id = %tenant_id, "tenant lb target groups read: start");

        let target_groups: Vec<Value> = ctx
            .api()
            .tenant_list_lb_target_groups(&tenant_id)
            .await?
            .iter()
            .map(|tg| flatten_target_group(&tenant_id, tg))
            .collect();

        let mut state = config;
        state.set_id(tenant_id.as_str());
        state.set("target_groups", target_groups)?;
        trace!(tenant_id = %tenant_id, "tenant lb target groups read: end");
        Ok(state)
    }
}
