use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::client::replication_controller::{
    DuploReplicationController, DuploReplicationControllerCreateRequest,
    DuploReplicationControllerDeleteRequest, DuploReplicationControllerUpdateRequest,
};
use crate::client::types::key_values_to_state;
use crate::context::HandlerContext;
use crate::docker_config::{normalize_other_docker_config, other_docker_configs_equivalent};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Schema};
use crate::state::ResourceData;
use crate::wait::wait_until_missing;
use crate::ProviderError;

use super::{tenant_id_attribute, ResourceHandler};

/// `duplocloud_duplo_service`: a container-based service.
pub struct DuploService;

/// Build the ID of a service.
fn service_id(tenant_id: &str, name: &str) -> String {
    format!("v2/subscriptions/{}/ReplicationControllerApiV2/{}", tenant_id, name)
}

/// Split a service ID into tenant and name.
fn parse_service_id(id: &str) -> Result<(&str, &str), ProviderError> {
    let parts: Vec<&str> = id.splitn(5, '/').collect();
    match parts.as_slice() {
        [_, _, tenant_id, _, name] if !tenant_id.is_empty() && !name.is_empty() => Ok((*tenant_id, *name)),
        _ => Err(ProviderError::InvalidId(id.to_string())),
    }
}

fn expand_hpa_specs(encoded: &str) -> Result<Option<BTreeMap<String, Value>>, ProviderError> {
    if encoded.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(encoded)
        .map(Some)
        .map_err(|err| ProviderError::Validation(format!("hpa_specs is not a JSON object: {}", err)))
}

fn json_equivalent(old: &str, new: &str) -> bool {
    match (serde_json::from_str::<Value>(old), serde_json::from_str::<Value>(new)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn key_value_block() -> Block {
    Block::new()
        .with_attribute("key", Attribute::computed_string())
        .with_attribute("value", Attribute::computed_string())
}

fn optional_computed_bool() -> Attribute {
    Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
}

fn flatten(state: &mut ResourceData, tenant_id: &str, rc: &DuploReplicationController) -> Result<(), ProviderError> {
    state.set("tenant_id", tenant_id)?;
    state.set("name", &rc.name)?;
    state.set("lb_synced_deployment", rc.is_lb_synced_deployment)?;
    state.set("any_host_allowed", rc.is_any_host_allowed)?;
    state.set("replica_collocation_allowed", rc.is_replica_collocation_allowed)?;
    state.set(
        "cloud_creds_from_k8s_service_account",
        rc.is_cloud_creds_from_k8s_service_account,
    )?;
    state.set("is_daemonset", rc.is_daemonset)?;
    state.set("force_stateful_set", rc.force_stateful_set)?;
    state.set("replicas_matching_asg_name", &rc.replicas_matching_asg_name)?;
    state.set("replicas", rc.replicas)?;
    state.set("index", rc.index)?;
    state.set("tags", key_values_to_state(rc.tags.as_deref()))?;
    state.set("fqdn", &rc.fqdn)?;
    state.set("fqdn_ex", &rc.fqdn_ex)?;
    state.set("parent_domain", &rc.parent_domain)?;
    let domain = if rc.fqdn_ex.is_empty() { &rc.fqdn } else { &rc.fqdn_ex };
    state.set("domain", domain)?;

    if let Some(specs) = rc.hpa_specs.as_ref().filter(|s| !s.is_empty()) {
        let encoded = serde_json::to_string(specs)?;
        if !json_equivalent(state.get_str("hpa_specs"), &encoded) {
            state.set("hpa_specs", encoded)?;
        }
    }

    let Some(template) = &rc.template else {
        return Ok(());
    };
    state.set("volumes", &template.volumes)?;
    state.set("agent_platform", template.agent_platform)?;
    state.set("cloud", template.cloud)?;
    state.set("other_docker_host_config", &template.other_docker_host_config)?;
    state.set(
        "other_docker_config",
        normalize_other_docker_config(&template.other_docker_config),
    )?;
    state.set("allocation_tags", &template.allocation_tags)?;
    state.set("extra_config", &template.extra_config)?;
    if let Some(commands) = template.commands.as_ref().filter(|c| !c.is_empty()) {
        let configured: Option<Vec<String>> = serde_json::from_str(state.get_str("commands")).ok();
        if configured.as_ref() != Some(commands) {
            state.set("commands", serde_json::to_string(commands)?)?;
        }
    }
    if let Some(container) = template.containers.as_ref().and_then(|c| c.first()) {
        state.set("docker_image", &container.image)?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl ResourceHandler for DuploService {
    fn type_name(&self) -> &'static str {
        "duplocloud_duplo_service"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(
                "`duplocloud_duplo_service` manages a container-based service in Duplo.\n\n\
                 NOTE: For Amazon ECS services, see the `duplocloud_ecs_service` resource.",
            )
            .with_attribute("tenant_id", tenant_id_attribute("service"))
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("The name of the service to create.")
                    .with_force_new(),
            )
            .with_attribute("other_docker_host_config", Attribute::optional_string())
            .with_attribute("other_docker_config", Attribute::optional_computed_string())
            .with_attribute("extra_config", Attribute::optional_string())
            .with_attribute("hpa_specs", Attribute::optional_computed_string())
            .with_attribute("allocation_tags", Attribute::optional_string())
            .with_attribute("volumes", Attribute::optional_string())
            .with_attribute("commands", Attribute::optional_string())
            .with_attribute(
                "cloud",
                Attribute::optional_int64()
                    .with_description("The numeric ID of the cloud provider to launch the service in.")
                    .with_default(json!(0)),
            )
            .with_attribute(
                "agent_platform",
                Attribute::optional_int64()
                    .with_description(
                        "The numeric ID of the container agent to use for deployment.\n\
                         Should be one of:\n\n   \
                         - `0` : Duplo Native container agent\n   \
                         - `7` : EKS linux container agent\n",
                    )
                    .with_default(json!(0)),
            )
            .with_attribute(
                "replicas",
                Attribute::optional_int64()
                    .with_description("The number of container replicas to deploy.")
                    .with_default(json!(1))
                    .conflicts_with("replicas_matching_asg_name"),
            )
            .with_attribute(
                "replicas_matching_asg_name",
                Attribute::optional_string().conflicts_with("replicas"),
            )
            .with_attribute(
                "docker_image",
                Attribute::required_string()
                    .with_description("The docker image to use for the launched container(s)."),
            )
            .with_attribute("tags", Attribute::computed_list_of(&key_value_block()))
            .with_attribute(
                "lb_synced_deployment",
                Attribute::optional_bool().with_default(json!(false)),
            )
            .with_attribute(
                "any_host_allowed",
                Attribute::optional_bool()
                    .with_description(
                        "Whether or not the service can run on hosts in other tenants \
                         (within the the same plan as the current tenant).",
                    )
                    .with_default(json!(false)),
            )
            .with_attribute(
                "replica_collocation_allowed",
                optional_computed_bool().with_description(
                    "Allow replica collocation for the service. \
                     If this is set then 2 replicas can be on the same host.",
                ),
            )
            .with_attribute(
                "cloud_creds_from_k8s_service_account",
                Attribute::optional_bool()
                    .with_description(
                        "Whether or not the service gets it's cloud credentials from Kubernetes service account.",
                    )
                    .with_default(json!(false)),
            )
            .with_attribute(
                "force_stateful_set",
                Attribute::optional_bool()
                    .with_description("Whether or not to force a StatefulSet to be created.")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "is_daemonset",
                Attribute::optional_bool()
                    .with_description("Whether or not to enable DaemonSet.")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "index",
                Attribute::computed_int64().with_description("The index of the service."),
            )
            .with_attribute("fqdn", Attribute::computed_string())
            .with_attribute("fqdn_ex", Attribute::computed_string())
            .with_attribute("parent_domain", Attribute::computed_string())
            .with_attribute("domain", Attribute::computed_string())
    }

    async fn create(&self, ctx: &HandlerContext, planned: ResourceData) -> Result<ResourceData, ProviderError> {
        let tenant_id = planned.required_str("tenant_id")?.to_string();
        let name = planned.required_str("name")?.to_string();
        trace!(tenant_id = %tenant_id, name = %name, "duplo service create: start");

        let rq = DuploReplicationControllerCreateRequest {
            name: name.clone(),
            other_docker_host_config: planned.get_str("other_docker_host_config").to_string(),
            other_docker_config: planned.get_str("other_docker_config").to_string(),
            allocation_tags: planned.get_str("allocation_tags").to_string(),
            extra_config: planned.get_str("extra_config").to_string(),
            commands: planned.get_str("commands").to_string(),
            volumes: planned.get_str("volumes").to_string(),
            agent_platform: planned.get_i64("agent_platform"),
            image: planned.get_str("docker_image").to_string(),
            replicas_matching_asg_name: planned.get_str("replicas_matching_asg_name").to_string(),
            cloud: planned.get_i64("cloud"),
            replicas: planned.get_i64("replicas"),
            is_lb_synced_deployment: planned.get_bool("lb_synced_deployment"),
            is_any_host_allowed: planned.get_bool("any_host_allowed"),
            is_replica_collocation_allowed: planned.get_bool("replica_collocation_allowed"),
            is_daemonset: planned.get_bool("is_daemonset"),
            force_stateful_set: planned.get_bool("force_stateful_set"),
            is_cloud_creds_from_k8s_service_account: planned.get_bool("cloud_creds_from_k8s_service_account"),
            hpa_specs: expand_hpa_specs(planned.get_str("hpa_specs"))?,
            ..Default::default()
        };

        let id = service_id(&tenant_id, &name);
        ctx.api()
            .replication_controller_create(&tenant_id, &rq)
            .await
            .map_err(|err| ProviderError::api_context(format!("Error applying Duplo service '{}'", id), err))?;

        let mut state = planned;
        state.set_id(id.as_str());
        let state = self
            .read(ctx, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("duplo service '{}' missing after create", id)))?;
        trace!(tenant_id = %tenant_id, name = %name, "duplo service create: end");
        Ok(state)
    }

    async fn read(&self, ctx: &HandlerContext, state: ResourceData) -> Result<Option<ResourceData>, ProviderError> {
        let id = state.id().to_string();
        let (tenant_id, name) = parse_service_id(&id)?;
        trace!(tenant_id, name, "duplo service read: start");

        let Some(rc) = ctx.api().replication_controller_get(tenant_id, name).await? else {
            debug!(tenant_id, name, "duplo service is gone");
            return Ok(None);
        };

        let mut state = state;
        flatten(&mut state, tenant_id, &rc)?;
        trace!(tenant_id, name, "duplo service read: end");
        Ok(Some(state))
    }

    async fn update(
        &self,
        ctx: &HandlerContext,
        prior: ResourceData,
        planned: ResourceData,
    ) -> Result<ResourceData, ProviderError> {
        let id = prior.id().to_string();
        let (tenant_id, name) = parse_service_id(&id)?;
        trace!(tenant_id, name, "duplo service update: start");

        let rq = DuploReplicationControllerUpdateRequest {
            name: name.to_string(),
            other_docker_host_config: planned.get_str("other_docker_host_config").to_string(),
            other_docker_config: planned.get_str("other_docker_config").to_string(),
            allocation_tags: planned.get_str("allocation_tags").to_string(),
            extra_config: planned.get_str("extra_config").to_string(),
            volumes: planned.get_str("volumes").to_string(),
            agent_platform: planned.get_i64("agent_platform"),
            image: planned.get_str("docker_image").to_string(),
            replicas_matching_asg_name: planned.get_str("replicas_matching_asg_name").to_string(),
            replicas: planned.get_i64("replicas"),
            is_lb_synced_deployment: planned.get_bool("lb_synced_deployment"),
            is_any_host_allowed: planned.get_bool("any_host_allowed"),
            is_replica_collocation_allowed: planned.get_bool("replica_collocation_allowed"),
            is_daemonset: planned.get_bool("is_daemonset"),
            force_stateful_set: planned.get_bool("force_stateful_set"),
            is_cloud_creds_from_k8s_service_account: planned.get_bool("cloud_creds_from_k8s_service_account"),
            hpa_specs: expand_hpa_specs(planned.get_str("hpa_specs"))?,
        };

        ctx.api()
            .replication_controller_update(tenant_id, &rq)
            .await
            .map_err(|err| ProviderError::api_context(format!("Error applying Duplo service '{}'", id), err))?;

        let mut state = planned;
        state.set_id(id.as_str());
        let state = self
            .read(ctx, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("duplo service '{}' missing after update", id)))?;
        trace!(tenant_id, name, "duplo service update: end");
        Ok(state)
    }

    async fn delete(&self, ctx: &HandlerContext, state: ResourceData) -> Result<(), ProviderError> {
        let id = state.id();
        let (tenant_id, name) = parse_service_id(id)?;
        trace!(tenant_id, name, "duplo service delete: start");

        let api = ctx.api();
        if api.replication_controller_get(tenant_id, name).await?.is_none() {
            debug!(tenant_id, name, "duplo service already gone");
            return Ok(());
        }

        let rq = DuploReplicationControllerDeleteRequest {
            name: name.to_string(),
            agent_platform: state.get_i64("agent_platform"),
            image: state.get_str("docker_image").to_string(),
            ..Default::default()
        };
        api.replication_controller_delete(tenant_id, &rq)
            .await
            .map_err(|err| ProviderError::api_context(format!("Error deleting Duplo service '{}'", id), err))?;

        wait_until_missing(
            "duplo service",
            id,
            ctx.wait_timeout(),
            ctx.poll_interval(),
            || api.replication_controller_get(tenant_id, name),
        )
        .await?;

        trace!(tenant_id, name, "duplo service delete: end");
        Ok(())
    }

    fn normalize(&self, planned: &mut ResourceData) -> Result<(), ProviderError> {
        if let Some(Value::String(config)) = planned.get("other_docker_config") {
            let normalized = normalize_other_docker_config(config);
            planned.set("other_docker_config", normalized)?;
        }
        Ok(())
    }

    fn suppress_diff(&self, key: &str, old: &Value, new: &Value, _planned: &ResourceData) -> bool {
        let (Some(old), Some(new)) = (old.as_str(), new.as_str()) else {
            return false;
        };
        match key {
            "other_docker_config" => other_docker_configs_equivalent(old, new),
            "hpa_specs" => json_equivalent(old, new),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeDuploApi;
    use crate::plan::plan_resource;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    const TENANT: &str = "2f0e4b1c-7d3a-4c5e-9f61-0a8b2c3d4e5f";

    fn setup() -> (Arc<FakeDuploApi>, HandlerContext) {
        let api = Arc::new(FakeDuploApi::new());
        let ctx = HandlerContext::new(api.clone()).with_poll_interval(Duration::from_millis(1));
        (api, ctx)
    }

    fn planned() -> ResourceData {
        let mut data = ResourceData::from_value(json!({
            "tenant_id": TENANT,
            "name": "web",
            "docker_image": "nginx:1.25",
            "other_docker_config": r#"{"Env":[{"Name":"B","Value":"2"},{"Name":"A","Value":"1"}]}"#,
            "hpa_specs": r#"{"minReplicas": 1, "maxReplicas": 3}"#,
            "commands": r#"["nginx", "-g", "daemon off;"]"#
        }));
        data.apply_defaults(&DuploService.schema().block);
        assert_ok!(DuploService.normalize(&mut data));
        data
    }

    #[test]
    fn test_parse_service_id() {
        let id = service_id(TENANT, "web");
        assert_eq!(assert_ok!(parse_service_id(&id)), (TENANT, "web"));
        assert!(matches!(
            assert_err!(parse_service_id("t1/web")),
            ProviderError::InvalidId(_)
        ));
        assert_err!(parse_service_id("v2/subscriptions//ReplicationControllerApiV2/web"));
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let (api, ctx) = setup();

        let state = assert_ok!(DuploService.create(&ctx, planned()).await);

        assert_eq!(state.id(), service_id(TENANT, "web"));
        assert_eq!(state.get_str("docker_image"), "nginx:1.25");
        assert_eq!(state.get_i64("replicas"), 1);
        assert_eq!(state.get_str("domain"), "web.apps.example.com");
        assert_eq!(
            state.get_str("other_docker_config"),
            r#"{"Env":[{"Name":"A","Value":"1"},{"Name":"B","Value":"2"}]}"#
        );
        // Configured spelling survives when it means the same thing.
        assert_eq!(state.get_str("hpa_specs"), r#"{"minReplicas": 1, "maxReplicas": 3}"#);
        assert_eq!(state.get_str("commands"), r#"["nginx", "-g", "daemon off;"]"#);
        assert_eq!(state.get("tags"), Some(&json!([])));

        let rc = api.service(TENANT, "web").unwrap();
        assert_eq!(rc.hpa_specs.unwrap()["maxReplicas"], json!(3));
    }

    #[tokio::test]
    async fn test_create_error_names_the_service() {
        let (api, ctx) = setup();
        api.fail_with("replication_controller_create", 400);

        let err = assert_err!(DuploService.create(&ctx, planned()).await);
        assert!(err
            .message()
            .starts_with(&format!("Error applying Duplo service '{}': ", service_id(TENANT, "web"))));
    }

    #[tokio::test]
    async fn test_invalid_hpa_specs_is_rejected() {
        let (api, ctx) = setup();
        let mut data = planned();
        assert_ok!(data.set("hpa_specs", "{not json"));

        let err = assert_err!(DuploService.create(&ctx, data).await);
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_gone_service() {
        let (_api, ctx) = setup();
        let state = ResourceData::from_value(json!({"id": service_id(TENANT, "web")}));
        assert!(assert_ok!(DuploService.read(&ctx, state).await).is_none());
    }

    #[tokio::test]
    async fn test_domain_prefers_fqdn_ex() {
        let (api, ctx) = setup();
        api.add_service(
            TENANT,
            DuploReplicationController {
                name: "api".into(),
                fqdn: "api.internal".into(),
                fqdn_ex: "api.example.com".into(),
                ..Default::default()
            },
        );

        let state = ResourceData::from_value(json!({"id": service_id(TENANT, "api")}));
        let state = assert_ok!(DuploService.read(&ctx, state).await).unwrap();
        assert_eq!(state.get_str("domain"), "api.example.com");
        assert_eq!(state.get_str("tenant_id"), TENANT);
    }

    #[tokio::test]
    async fn test_update_changes_replicas() {
        let (api, ctx) = setup();
        let prior = assert_ok!(DuploService.create(&ctx, planned()).await);
        let mut next = prior.clone();
        assert_ok!(next.set("replicas", 4));
        assert_ok!(next.set("docker_image", "nginx:1.26"));

        let state = assert_ok!(DuploService.update(&ctx, prior, next).await);

        assert_eq!(state.get_i64("replicas"), 4);
        assert_eq!(state.get_str("docker_image"), "nginx:1.26");
        assert!(api.calls().contains(&"replication_controller_update".to_string()));
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let (api, ctx) = setup();
        let state = assert_ok!(DuploService.create(&ctx, planned()).await);
        api.set_delete_lag(2);

        assert_ok!(DuploService.delete(&ctx, state).await);

        assert!(api.service(TENANT, "web").is_none());
        let lists = api
            .calls()
            .iter()
            .filter(|c| *c == "replication_controller_list")
            .count();
        assert!(lists >= 4, "expected polling, saw {} lists", lists);
    }

    #[tokio::test]
    async fn test_delete_of_missing_service_is_a_no_op() {
        let (api, ctx) = setup();
        let state = ResourceData::from_value(json!({"id": service_id(TENANT, "web")}));

        assert_ok!(DuploService.delete(&ctx, state).await);
        assert!(!api.calls().contains(&"replication_controller_delete".to_string()));
    }

    #[tokio::test]
    async fn test_delete_times_out() {
        let (api, ctx) = setup();
        let state = assert_ok!(DuploService.create(&ctx, planned()).await);
        api.set_delete_lag(usize::MAX);
        let ctx = ctx.with_wait_timeout(Duration::from_millis(20));

        let err = assert_err!(DuploService.delete(&ctx, state).await);
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[test]
    fn test_reordered_env_plans_no_change() {
        let prior = json!({
            "id": service_id(TENANT, "web"),
            "tenant_id": TENANT,
            "name": "web",
            "docker_image": "nginx:1.25",
            "other_docker_config": r#"{"Env":[{"Name":"A","Value":"1"},{"Name":"B","Value":"2"}]}"#,
            "replicas": 1, "cloud": 0, "agent_platform": 0,
            "lb_synced_deployment": false, "any_host_allowed": false,
            "cloud_creds_from_k8s_service_account": false,
            "force_stateful_set": false, "is_daemonset": false
        });
        let proposed = json!({
            "tenant_id": TENANT,
            "name": "web",
            "docker_image": "nginx:1.25",
            "other_docker_config": r#"{"env":[{"name":"B","value":"2"},{"Name":"A","Value":"1"}],"HostNetwork":null}"#
        });

        let plan = assert_ok!(plan_resource(&DuploService, Some(prior), proposed));
        assert!(plan.is_no_op(), "unexpected changes: {:?}", plan.changes);
    }

    #[test]
    fn test_new_image_plans_in_place_update() {
        let prior = json!({
            "id": service_id(TENANT, "web"), "tenant_id": TENANT, "name": "web",
            "docker_image": "nginx:1.25", "replicas": 1
        });
        let proposed = json!({"tenant_id": TENANT, "name": "web", "docker_image": "nginx:1.26", "replicas": 1});

        let plan = assert_ok!(plan_resource(&DuploService, Some(prior), proposed));
        assert!(!plan.requires_replace);
        assert!(plan.changes.iter().any(|c| c.path == "docker_image"));
    }
}
