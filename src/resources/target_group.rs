use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::client::target_group::{DuploTargetGroup, DuploTargetGroupMatcher, DuploTargetGroupUpdateReq};
use crate::client::types::DuploStringValue;
use crate::context::HandlerContext;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, ValueValidator};
use crate::state::ResourceData;
use crate::wait::wait_until_present;
use crate::ProviderError;

use super::{tenant_id_attribute, ResourceHandler};

/// `duplocloud_aws_lb_target_group`: a load balancer target group.
///
/// Only the health check can change in place; everything else that matters
/// forces a new target group.
pub struct AwsLbTargetGroup;

const LAMBDA: &str = "lambda";

fn parse_target_group_id(id: &str) -> Result<(&str, &str), ProviderError> {
    match id.split_once('/') {
        Some((tenant_id, name)) => Ok((tenant_id, name)),
        None => Err(ProviderError::InvalidId(id.to_string())),
    }
}

fn is_http(protocol: &str) -> bool {
    matches!(protocol, "HTTP" | "HTTPS")
}

fn optional_computed_int64() -> Attribute {
    Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())
}

fn health_check_block() -> Block {
    Block::new()
        .with_attribute(
            "enabled",
            Attribute::optional_bool()
                .with_description("Whether health checks are enabled.")
                .with_default(json!(true)),
        )
        .with_attribute(
            "healthy_threshold",
            Attribute::optional_int64()
                .with_description(
                    "Number of consecutive health checks successes required before \
                     considering an unhealthy target healthy.",
                )
                .with_default(json!(3))
                .with_validator(ValueValidator::IntBetween(2, 10)),
        )
        .with_attribute(
            "interval",
            Attribute::optional_int64()
                .with_description(
                    "Approximate amount of time, in seconds, between health checks of an individual target. \
                     Minimum value 5 seconds, Maximum value 300 seconds. For lambda target groups, \
                     it needs to be greater as the `timeout` of the underlying `lambda`.",
                )
                .with_default(json!(30)),
        )
        .with_attribute(
            "matcher",
            Attribute::optional_computed_string().with_description(
                "Response codes to use when checking for a healthy responses from a target. \
                 You can specify multiple values (for example, \"200,202\" for HTTP(s) or \"0,12\" for GRPC) \
                 or a range of values (for example, \"200-299\" or \"0-99\"). Required for HTTP/HTTPS/GRPC ALB. \
                 Only applies to Application Load Balancers (i.e., HTTP/HTTPS/GRPC) \
                 not Network Load Balancers (i.e., TCP).",
            ),
        )
        .with_attribute(
            "path",
            Attribute::optional_computed_string().with_description(
                "Destination for the health check request. Required for HTTP/HTTPS ALB and HTTP NLB. \
                 Only applies to HTTP/HTTPS.",
            ),
        )
        .with_attribute(
            "port",
            Attribute::optional_string()
                .with_description("Port to use to connect with the target. Valid values are either ports 1-65535, or traffic-port.")
                .with_default(json!("traffic-port"))
                .with_validator(ValueValidator::TargetGroupHealthCheckPort),
        )
        .with_attribute(
            "protocol",
            Attribute::optional_string()
                .with_description(
                    "Protocol to use to connect with the target. Not applicable when target_type is lambda.",
                )
                .with_default(json!("HTTP"))
                .with_validator(ValueValidator::one_of_ignore_case(&["HTTP", "HTTPS", "TCP"])),
        )
        .with_attribute(
            "timeout",
            optional_computed_int64()
                .with_description("Amount of time, in seconds, during which no response means a failed health check.")
                .with_validator(ValueValidator::IntBetween(2, 120)),
        )
        .with_attribute(
            "unhealthy_threshold",
            Attribute::optional_int64()
                .with_description(
                    "Number of consecutive health check failures required before considering the target unhealthy.",
                )
                .with_default(json!(3))
                .with_validator(ValueValidator::IntBetween(2, 10)),
        )
        .with_description("Health Check configuration block.")
}

/// The single configured health check, if any.
fn configured_health_check(data: &ResourceData) -> Option<ResourceData> {
    match data.get_list("health_check") {
        [item] => Some(ResourceData::from_value(item.clone())),
        _ => None,
    }
}

fn matcher_for(protocol_version: &str, code: &str) -> DuploTargetGroupMatcher {
    if protocol_version == "GRPC" {
        DuploTargetGroupMatcher {
            grpc_code: code.to_string(),
            ..Default::default()
        }
    } else {
        DuploTargetGroupMatcher {
            http_code: code.to_string(),
            ..Default::default()
        }
    }
}

fn expand_create(planned: &ResourceData) -> Result<DuploTargetGroup, ProviderError> {
    let target_type = planned.get_str("target_type");
    let mut params = DuploTargetGroup {
        name: planned.get_str("name").to_string(),
        target_type: Some(DuploStringValue::new(target_type)),
        ..Default::default()
    };

    if target_type != LAMBDA {
        for field in ["port", "protocol", "vpc_id"] {
            if planned.get_ok(field).is_none() {
                return Err(ProviderError::Validation(format!(
                    "{} should be set when target type is {}",
                    field, target_type
                )));
            }
        }
        let protocol = planned.get_str("protocol");
        params.port = planned.get_i64("port");
        params.protocol = Some(DuploStringValue::new(protocol));
        if is_http(protocol) {
            params.protocol_version = planned.get_str("protocol_version").to_string();
        }
        params.vpc_id = planned.get_str("vpc_id").to_string();
        if target_type == "ip" {
            if let Some(Value::String(ip_type)) = planned.get_ok("ip_address_type") {
                params.ip_address_type = Some(DuploStringValue::new(ip_type.as_str()));
            }
        }
        // Non-lambda target groups always run health checks.
        params.health_check_enabled = true;
    }

    if let Some(hc) = configured_health_check(planned) {
        params.health_check_enabled = hc.get_bool("enabled");
        params.health_check_interval_seconds = hc.get_i64("interval");
        params.healthy_threshold_count = hc.get_i64("healthy_threshold");
        params.unhealthy_threshold_count = hc.get_i64("unhealthy_threshold");
        params.health_check_timeout_seconds = hc.get_i64("timeout");

        let hc_protocol = hc.get_str("protocol");
        if hc_protocol != "TCP" {
            params.health_check_path = hc.get_str("path").to_string();
            let matcher = hc.get_str("matcher");
            if !matcher.is_empty() {
                params.matcher = Some(matcher_for(planned.get_str("protocol_version"), matcher));
            }
        }
        if target_type != LAMBDA {
            params.health_check_port = hc.get_str("port").to_string();
            params.health_check_protocol = Some(DuploStringValue::new(hc_protocol));
        }
    }
    Ok(params)
}

fn expand_update(planned: &ResourceData, hc: &ResourceData) -> DuploTargetGroupUpdateReq {
    let mut params = DuploTargetGroupUpdateReq {
        target_group_arn: planned.get_str("arn").to_string(),
        health_check_enabled: hc.get_bool("enabled"),
        healthy_threshold_count: hc.get_i64("healthy_threshold"),
        unhealthy_threshold_count: hc.get_i64("unhealthy_threshold"),
        health_check_timeout_seconds: hc.get_i64("timeout"),
        ..Default::default()
    };

    let hc_protocol = hc.get_str("protocol");
    if hc_protocol != "TCP" {
        params.matcher = Some(matcher_for(planned.get_str("protocol_version"), hc.get_str("matcher")));
        params.health_check_path = hc.get_str("path").to_string();
        params.health_check_interval_seconds = hc.get_i64("interval");
    }
    if planned.get_str("target_type") != LAMBDA {
        params.health_check_port = hc.get_str("port").to_string();
        params.health_check_protocol = Some(DuploStringValue::new(hc_protocol));
    }
    params
}

fn string_value(v: &Option<DuploStringValue>) -> &str {
    v.as_ref().map(|v| v.value.as_str()).unwrap_or("")
}

fn flatten_health_check(tg: &DuploTargetGroup) -> Value {
    let matcher = tg
        .matcher
        .as_ref()
        .map(|m| if m.grpc_code.is_empty() { &m.http_code } else { &m.grpc_code })
        .map(String::as_str)
        .unwrap_or("");
    json!([{
        "enabled": tg.health_check_enabled,
        "healthy_threshold": tg.healthy_threshold_count,
        "interval": tg.health_check_interval_seconds,
        "port": tg.health_check_port,
        "protocol": string_value(&tg.health_check_protocol),
        "timeout": tg.health_check_timeout_seconds,
        "unhealthy_threshold": tg.unhealthy_threshold_count,
        "path": tg.health_check_path,
        "matcher": matcher,
    }])
}

fn flatten(state: &mut ResourceData, tenant_id: &str, tg: &DuploTargetGroup) -> Result<(), ProviderError> {
    let target_type = string_value(&tg.target_type);
    state.set("tenant_id", tenant_id)?;
    state.set("arn", &tg.target_group_arn)?;
    state.set("name", &tg.target_group_name)?;
    state.set("target_type", target_type)?;
    state.set("health_check", flatten_health_check(tg))?;

    if target_type != LAMBDA {
        state.set("vpc_id", &tg.vpc_id)?;
        state.set("port", tg.port)?;
        state.set("protocol", string_value(&tg.protocol))?;
    }
    if let Some(ip_type) = tg.ip_address_type.as_ref().filter(|v| !v.value.is_empty()) {
        state.set("ip_address_type", &ip_type.value)?;
    }
    if is_http(state.get_str("protocol")) {
        state.set("protocol_version", &tg.protocol_version)?;
    }
    Ok(())
}

/// Compare health checks, ignoring the fields a lambda target never uses.
fn same_lambda_health_check(old: &Value, new: &Value) -> bool {
    let strip = |v: &Value| -> Vec<Map<String, Value>> {
        v.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|m| {
                        let mut m = m.clone();
                        m.remove("port");
                        m.remove("protocol");
                        m
                    })
                    .collect()
            })
            .unwrap_or_default()
    };
    strip(old) == strip(new)
}

#[async_trait::async_trait]
impl ResourceHandler for AwsLbTargetGroup {
    fn type_name(&self) -> &'static str {
        "duplocloud_aws_lb_target_group"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("`duplocloud_aws_lb_target_group` manages a target group in a Duplo tenant.")
            .with_attribute("tenant_id", tenant_id_attribute("target group"))
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Name of the target group.")
                    .with_force_new(),
            )
            .with_attribute(
                "target_type",
                Attribute::required_string()
                    .with_description(
                        "Type of target that you must specify when registering targets with this target group.",
                    )
                    .with_force_new()
                    .with_validator(ValueValidator::one_of(&["instance", "ip", "lambda", "alb"])),
            )
            .with_attribute(
                "protocol",
                Attribute::optional_string()
                    .with_description(
                        "Protocol to use to connect with the target. Not applicable when `target_type` is `lambda`.",
                    )
                    .with_force_new()
                    .with_default(json!("HTTP"))
                    .with_validator(ValueValidator::one_of(&["HTTP", "HTTPS", "TCP", "TCP_UDP", "TLS", "UDP"])),
            )
            .with_attribute(
                "port",
                optional_computed_int64()
                    .with_description("Port to use to connect with the target. Valid values are either ports 1-65535."),
            )
            .with_attribute(
                "vpc_id",
                Attribute::optional_computed_string()
                    .with_description(
                        "Identifier of the VPC in which to create the target group. \
                         Required when `target_type` is `instance`, `ip` or `alb`. \
                         Does not apply when `target_type` is `lambda`.",
                    )
                    .with_force_new(),
            )
            .with_attribute(
                "ip_address_type",
                Attribute::optional_computed_string()
                    .with_description(
                        "The type of IP addresses used by the target group, only supported when \
                         target type is set to `ip`. Possible values are `ipv4` or `ipv6`",
                    )
                    .with_force_new()
                    .with_validator(ValueValidator::one_of(&["ipv4", "ipv6"])),
            )
            .with_attribute(
                "protocol_version",
                Attribute::optional_computed_string()
                    .with_description(
                        "Only applicable when protocol is `HTTP` or `HTTPS`. The protocol version. \
                         Specify GRPC to send requests to targets using gRPC. \
                         Specify HTTP2 to send requests to targets using HTTP/2. \
                         The default is HTTP1, which sends requests to targets using HTTP/1.1",
                    )
                    .with_validator(ValueValidator::one_of_ignore_case(&["GRPC", "HTTP1", "HTTP2"])),
            )
            .with_block("health_check", NestedBlock::list(health_check_block()).with_max_items(1))
            .with_attribute(
                "arn",
                Attribute::computed_string().with_description("ARN of the Target Group."),
            )
    }

    async fn create(&self, ctx: &HandlerContext, planned: ResourceData) -> Result<ResourceData, ProviderError> {
        let tenant_id = planned.required_str("tenant_id")?.to_string();
        let name = planned.required_str("name")?.to_string();
        trace!(tenant_id = %tenant_id, name = %name, "target group create: start");

        let params = expand_create(&planned)?;
        let api = ctx.api();
        api.target_group_create(&tenant_id, &params).await?;

        let id = format!("{}/{}", tenant_id, name);
        let (t, n) = (tenant_id.as_str(), name.as_str());
        wait_until_present("target group", &id, ctx.wait_timeout(), ctx.poll_interval(), move || async move {
            api.target_group_get(t, n)
                .await
                .map(|tg| tg.filter(|tg| !tg.target_group_name.is_empty()))
        })
        .await?;

        let mut state = planned;
        state.set_id(id.as_str());
        let state = self
            .read(ctx, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("target group '{}' missing after create", id)))?;
        trace!(tenant_id = %tenant_id, name = %name, "target group create: end");
        Ok(state)
    }

    async fn read(&self, ctx: &HandlerContext, state: ResourceData) -> Result<Option<ResourceData>, ProviderError> {
        let id = state.id().to_string();
        let (tenant_id, name) = parse_target_group_id(&id)?;
        trace!(tenant_id, name, "target group read: start");

        let tg = match ctx.api().target_group_get(tenant_id, name).await {
            Ok(tg) => tg,
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                return Err(ProviderError::api_context(
                    format!("Unable to retrieve tenant {} target group {} ", tenant_id, name),
                    err,
                ))
            },
        };
        let Some(tg) = tg.filter(|tg| !tg.target_group_name.is_empty()) else {
            debug!(tenant_id, name, "target group is gone");
            return Ok(None);
        };

        let mut state = state;
        flatten(&mut state, tenant_id, &tg)?;
        trace!(tenant_id, name, "target group read: end");
        Ok(Some(state))
    }

    async fn update(
        &self,
        ctx: &HandlerContext,
        prior: ResourceData,
        planned: ResourceData,
    ) -> Result<ResourceData, ProviderError> {
        let id = prior.id().to_string();
        let (tenant_id, name) = parse_target_group_id(&id)?;
        trace!(tenant_id, name, "target group update: start");

        if planned.has_change(&prior, "health_check") {
            if let Some(hc) = configured_health_check(&planned) {
                let params = expand_update(&planned, &hc);
                ctx.api().target_group_update(tenant_id, name, &params).await?;
            }
        }

        let mut state = planned;
        state.set_id(id.as_str());
        let state = self
            .read(ctx, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("target group '{}' missing after update", id)))?;
        trace!(tenant_id, name, "target group update: end");
        Ok(state)
    }

    async fn delete(&self, ctx: &HandlerContext, state: ResourceData) -> Result<(), ProviderError> {
        let (tenant_id, name) = parse_target_group_id(state.id())?;
        trace!(tenant_id, name, "target group delete: start");

        let api = ctx.api();
        let existing = match api.target_group_get(tenant_id, name).await {
            Ok(tg) => tg,
            Err(err) if err.is_not_found() => None,
            Err(err) => {
                return Err(ProviderError::api_context(
                    format!("Unable to retrieve tenant {} target group {} ", tenant_id, name),
                    err,
                ))
            },
        };
        if existing.is_some_and(|tg| !tg.target_group_name.is_empty()) {
            match api.target_group_delete(tenant_id, name).await {
                Ok(()) => {},
                Err(err) if err.is_not_found() => {},
                Err(err) => {
                    return Err(ProviderError::api_context(
                        format!("Unable to delete tenant {} target group {} ", tenant_id, name),
                        err,
                    ))
                },
            }
        }

        trace!(tenant_id, name, "target group delete: end");
        Ok(())
    }

    fn normalize(&self, planned: &mut ResourceData) -> Result<(), ProviderError> {
        if let Some(Value::String(version)) = planned.get("protocol_version") {
            let upper = version.to_uppercase();
            planned.set("protocol_version", upper)?;
        }
        if let Some(Value::Array(items)) = planned.get("health_check") {
            let mut items = items.clone();
            for item in items.iter_mut() {
                if let Some(Value::String(protocol)) = item.get_mut("protocol") {
                    *protocol = protocol.to_uppercase();
                }
            }
            planned.set("health_check", items)?;
        }
        Ok(())
    }

    fn suppress_diff(&self, key: &str, old: &Value, new: &Value, planned: &ResourceData) -> bool {
        let lambda = planned.get_str("target_type") == LAMBDA;
        match key {
            "protocol_version" => lambda || !is_http(planned.get_str("protocol")),
            "health_check" => lambda && same_lambda_health_check(old, new),
            _ => false,
        }
    }
}
