//! An in-memory control plane for handler tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::native_host::{DuploMinion, DuploNativeHost, NativeHostApi};
use super::plan::{DuploPlan, DuploPlanKmsKeyInfo, PlanApi};
use super::replication_controller::{
    DuploPodContainer, DuploPodTemplate, DuploReplicationController,
    DuploReplicationControllerCreateRequest, DuploReplicationControllerDeleteRequest,
    DuploReplicationControllerUpdateRequest, ReplicationControllerApi,
};
use super::target_group::{
    DuploAwsLbTargetGroup, DuploTargetGroup, DuploTargetGroupUpdateReq, TargetGroupApi,
};
use super::tenant::{DuploAwsCredentials, DuploAwsKmsKey, DuploDockerCredentials, TenantApi};
use super::ClientError;

#[derive(Default)]
struct State {
    docker_credentials: HashMap<String, DuploDockerCredentials>,
    aws_credentials: HashMap<String, DuploAwsCredentials>,
    tenant_kms_keys: HashMap<String, DuploAwsKmsKey>,
    plan_kms_keys: HashMap<String, Vec<DuploAwsKmsKey>>,
    native_hosts: HashMap<String, Vec<DuploNativeHost>>,
    minions: HashMap<String, Vec<DuploMinion>>,
    target_groups: HashMap<(String, String), DuploTargetGroup>,
    lb_target_groups: HashMap<String, Vec<DuploAwsLbTargetGroup>>,
    services: HashMap<String, Vec<DuploReplicationController>>,
    deleting: HashMap<(String, String), usize>,
    delete_lag: usize,
    plans: Vec<DuploPlan>,
    plan_kms_v3: HashMap<String, Vec<DuploPlanKmsKeyInfo>>,
    failures: HashMap<&'static str, u16>,
    calls: Vec<String>,
}

/// A fake [`DuploApi`](super::DuploApi) backed by hash maps.
///
/// Every method records its name in [`FakeDuploApi::calls`] and fails with
/// the status registered through [`FakeDuploApi::fail_with`], if any. The
/// v3 plan KMS endpoints answer 404 for plans that were never given keys
/// through [`FakeDuploApi::set_plan_kms_keys_v3`], like an older control
/// plane would.
#[derive(Default)]
pub struct FakeDuploApi {
    state: Mutex<State>,
}

impl FakeDuploApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().expect("fake state poisoned");
        f(&mut state)
    }

    fn enter(&self, op: &'static str, path: &str) -> Result<(), ClientError> {
        self.with_state(|s| {
            s.calls.push(op.to_string());
            match s.failures.get(op) {
                Some(status) => Err(ClientError::from_response(
                    format!("https://fake.duplocloud.net/{}", path),
                    &format!("/{}", path),
                    *status,
                    Some("application/json"),
                    &format!(r#"{{"Message":"{} failed"}}"#, op),
                )),
                None => Ok(()),
            }
        })
    }

    /// Make every call to `op` fail with `status`.
    pub fn fail_with(&self, op: &'static str, status: u16) {
        self.with_state(|s| {
            s.failures.insert(op, status);
        });
    }

    /// Names of the methods called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.with_state(|s| s.calls.clone())
    }

    /// Keep deleted services visible for this many further listings.
    pub fn set_delete_lag(&self, polls: usize) {
        self.with_state(|s| s.delete_lag = polls);
    }

    pub fn kms_key(name: &str, id: &str) -> DuploAwsKmsKey {
        let arn = format!("arn:aws:kms:us-west-2:000000000000:key/{}", id);
        DuploAwsKmsKey {
            arn: arn.clone(),
            key_name: name.to_string(),
            key_id: id.to_string(),
            key_arn: arn,
            description: name.to_string(),
        }
    }

    pub fn set_tenant_kms_key(&self, tenant_id: &str, key: DuploAwsKmsKey) {
        self.with_state(|s| {
            s.tenant_kms_keys.insert(tenant_id.to_string(), key);
        });
    }

    pub fn set_plan_kms_keys(&self, tenant_id: &str, keys: Vec<DuploAwsKmsKey>) {
        self.with_state(|s| {
            s.plan_kms_keys.insert(tenant_id.to_string(), keys);
        });
    }

    pub fn set_docker_credentials(&self, tenant_id: &str, creds: DuploDockerCredentials) {
        self.with_state(|s| {
            s.docker_credentials.insert(tenant_id.to_string(), creds);
        });
    }

    pub fn docker_credentials(&self, tenant_id: &str) -> Option<DuploDockerCredentials> {
        self.with_state(|s| s.docker_credentials.get(tenant_id).cloned())
    }

    pub fn set_aws_credentials(&self, tenant_id: &str, creds: DuploAwsCredentials) {
        self.with_state(|s| {
            s.aws_credentials.insert(tenant_id.to_string(), creds);
        });
    }

    pub fn add_native_host(&self, tenant_id: &str, host: DuploNativeHost) {
        self.with_state(|s| {
            s.native_hosts
                .entry(tenant_id.to_string())
                .or_default()
                .push(host);
        });
    }

    pub fn add_minion(&self, tenant_id: &str, minion: DuploMinion) {
        self.with_state(|s| {
            s.minions.entry(tenant_id.to_string()).or_default().push(minion);
        });
    }

    pub fn add_lb_target_group(&self, tenant_id: &str, tg: DuploAwsLbTargetGroup) {
        self.with_state(|s| {
            s.lb_target_groups
                .entry(tenant_id.to_string())
                .or_default()
                .push(tg);
        });
    }

    pub fn target_group(&self, tenant_id: &str, name: &str) -> Option<DuploTargetGroup> {
        self.with_state(|s| {
            s.target_groups
                .get(&(tenant_id.to_string(), name.to_string()))
                .cloned()
        })
    }

    pub fn add_service(&self, tenant_id: &str, rc: DuploReplicationController) {
        self.with_state(|s| {
            s.services.entry(tenant_id.to_string()).or_default().push(rc);
        });
    }

    pub fn service(&self, tenant_id: &str, name: &str) -> Option<DuploReplicationController> {
        self.with_state(|s| {
            s.services
                .get(tenant_id)
                .and_then(|list| list.iter().find(|rc| rc.name == name).cloned())
        })
    }

    pub fn add_plan(&self, plan: DuploPlan) {
        self.with_state(|s| s.plans.push(plan));
    }

    pub fn set_plan_kms_keys_v3(&self, plan_id: &str, keys: Vec<DuploPlanKmsKeyInfo>) {
        self.with_state(|s| {
            s.plan_kms_v3.insert(plan_id.to_string(), keys);
        });
    }

    fn not_found(path: &str) -> ClientError {
        ClientError::from_response(
            format!("https://fake.duplocloud.net/{}", path),
            &format!("/{}", path),
            404,
            None,
            "Not Found",
        )
    }
}

#[async_trait]
impl TenantApi for FakeDuploApi {
    async fn tenant_get_docker_credentials(
        &self,
        tenant_id: &str,
    ) -> Result<Option<DuploDockerCredentials>, ClientError> {
        self.enter("tenant_get_docker_credentials", tenant_id)?;
        Ok(self
            .docker_credentials(tenant_id)
            .filter(|c| !c.username.is_empty()))
    }

    async fn tenant_update_docker_credentials(
        &self,
        tenant_id: &str,
        creds: &DuploDockerCredentials,
    ) -> Result<(), ClientError> {
        self.enter("tenant_update_docker_credentials", tenant_id)?;
        self.set_docker_credentials(tenant_id, creds.clone());
        Ok(())
    }

    async fn tenant_get_aws_credentials(
        &self,
        tenant_id: &str,
    ) -> Result<DuploAwsCredentials, ClientError> {
        let path = format!("subscriptions/{}/GetAwsConsoleTokenUrl", tenant_id);
        self.enter("tenant_get_aws_credentials", &path)?;
        self.with_state(|s| s.aws_credentials.get(tenant_id).cloned())
            .ok_or_else(|| Self::not_found(&path))
    }

    async fn tenant_get_tenant_kms_key(
        &self,
        tenant_id: &str,
    ) -> Result<DuploAwsKmsKey, ClientError> {
        self.enter("tenant_get_tenant_kms_key", tenant_id)?;
        Ok(self
            .with_state(|s| s.tenant_kms_keys.get(tenant_id).cloned())
            .unwrap_or_default())
    }

    async fn tenant_get_plan_kms_keys(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploAwsKmsKey>, ClientError> {
        self.enter("tenant_get_plan_kms_keys", tenant_id)?;
        Ok(self
            .with_state(|s| s.plan_kms_keys.get(tenant_id).cloned())
            .unwrap_or_default())
    }
}

#[async_trait]
impl NativeHostApi for FakeDuploApi {
    async fn native_host_get_list(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploNativeHost>, ClientError> {
        self.enter("native_host_get_list", tenant_id)?;
        Ok(self
            .with_state(|s| s.native_hosts.get(tenant_id).cloned())
            .unwrap_or_default())
    }

    async fn native_host_get_minions(&self, tenant_id: &str) -> Result<Vec<DuploMinion>, ClientError> {
        self.enter("native_host_get_minions", tenant_id)?;
        Ok(self
            .with_state(|s| s.minions.get(tenant_id).cloned())
            .unwrap_or_default())
    }
}

#[async_trait]
impl TargetGroupApi for FakeDuploApi {
    async fn target_group_create(
        &self,
        tenant_id: &str,
        rq: &DuploTargetGroup,
    ) -> Result<(), ClientError> {
        self.enter("target_group_create", tenant_id)?;
        let mut tg = rq.clone();
        tg.target_group_name = rq.name.clone();
        tg.target_group_arn = format!(
            "arn:aws:elasticloadbalancing:us-west-2:000000000000:targetgroup/{}/0123456789abcdef",
            rq.name
        );
        self.with_state(|s| {
            s.target_groups
                .insert((tenant_id.to_string(), rq.name.clone()), tg);
        });
        Ok(())
    }

    async fn target_group_update(
        &self,
        tenant_id: &str,
        name: &str,
        rq: &DuploTargetGroupUpdateReq,
    ) -> Result<(), ClientError> {
        let path = format!("v3/subscriptions/{}/aws/lbTargetGroup", tenant_id);
        self.enter("target_group_update", &path)?;
        self.with_state(|s| {
            let tg = s
                .target_groups
                .get_mut(&(tenant_id.to_string(), name.to_string()))
                .ok_or_else(|| Self::not_found(&path))?;
            tg.health_check_enabled = rq.health_check_enabled;
            tg.health_check_interval_seconds = rq.health_check_interval_seconds;
            tg.health_check_path = rq.health_check_path.clone();
            tg.health_check_port = rq.health_check_port.clone();
            tg.health_check_protocol = rq.health_check_protocol.clone();
            tg.health_check_timeout_seconds = rq.health_check_timeout_seconds;
            tg.healthy_threshold_count = rq.healthy_threshold_count;
            tg.unhealthy_threshold_count = rq.unhealthy_threshold_count;
            tg.matcher = rq.matcher.clone();
            Ok(())
        })
    }

    async fn target_group_get(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<DuploTargetGroup>, ClientError> {
        let path = format!("v3/subscriptions/{}/aws/lbTargetGroup/{}", tenant_id, name);
        match self.enter("target_group_get", &path) {
            Err(err) if err.is_not_found() => return Ok(None),
            other => other?,
        }
        Ok(self.target_group(tenant_id, name))
    }

    async fn target_group_delete(&self, tenant_id: &str, name: &str) -> Result<(), ClientError> {
        let path = format!("v3/subscriptions/{}/aws/lbTargetGroup/{}", tenant_id, name);
        self.enter("target_group_delete", &path)?;
        self.with_state(|s| {
            s.target_groups
                .remove(&(tenant_id.to_string(), name.to_string()))
                .map(|_| ())
                .ok_or_else(|| Self::not_found(&path))
        })
    }

    async fn tenant_list_lb_target_groups(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploAwsLbTargetGroup>, ClientError> {
        self.enter("tenant_list_lb_target_groups", tenant_id)?;
        Ok(self
            .with_state(|s| s.lb_target_groups.get(tenant_id).cloned())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ReplicationControllerApi for FakeDuploApi {
    async fn replication_controller_list(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploReplicationController>, ClientError> {
        self.enter("replication_controller_list", tenant_id)?;
        Ok(self.with_state(|s| {
            let tenant = tenant_id.to_string();
            let mut finished = Vec::new();
            for ((t, name), remaining) in s.deleting.iter_mut() {
                if *t != tenant {
                    continue;
                }
                if *remaining == 0 {
                    finished.push(name.clone());
                } else {
                    *remaining -= 1;
                }
            }
            for name in finished {
                s.deleting.remove(&(tenant.clone(), name.clone()));
                if let Some(list) = s.services.get_mut(&tenant) {
                    list.retain(|rc| rc.name != name);
                }
            }
            s.services.get(&tenant).cloned().unwrap_or_default()
        }))
    }

    async fn replication_controller_create(
        &self,
        tenant_id: &str,
        rq: &DuploReplicationControllerCreateRequest,
    ) -> Result<(), ClientError> {
        self.enter("replication_controller_create", tenant_id)?;
        let commands = if rq.commands.is_empty() {
            None
        } else {
            serde_json::from_str(&rq.commands).ok()
        };
        let rc = DuploReplicationController {
            name: rq.name.clone(),
            replicas: rq.replicas,
            replicas_matching_asg_name: rq.replicas_matching_asg_name.clone(),
            fqdn: format!("{}.apps.example.com", rq.name),
            force_stateful_set: rq.force_stateful_set,
            is_daemonset: rq.is_daemonset,
            is_lb_synced_deployment: rq.is_lb_synced_deployment,
            is_replica_collocation_allowed: rq.is_replica_collocation_allowed,
            is_any_host_allowed: rq.is_any_host_allowed,
            is_cloud_creds_from_k8s_service_account: rq.is_cloud_creds_from_k8s_service_account,
            volumes: rq.volumes.clone(),
            hpa_specs: rq.hpa_specs.clone(),
            template: Some(DuploPodTemplate {
                name: rq.name.clone(),
                containers: Some(vec![DuploPodContainer {
                    name: rq.name.clone(),
                    image: rq.image.clone(),
                    ..Default::default()
                }]),
                agent_platform: rq.agent_platform,
                cloud: rq.cloud,
                volumes: rq.volumes.clone(),
                commands,
                extra_config: rq.extra_config.clone(),
                other_docker_config: rq.other_docker_config.clone(),
                other_docker_host_config: rq.other_docker_host_config.clone(),
                allocation_tags: rq.allocation_tags.clone(),
            }),
            ..Default::default()
        };
        self.add_service(tenant_id, rc);
        Ok(())
    }

    async fn replication_controller_update(
        &self,
        tenant_id: &str,
        rq: &DuploReplicationControllerUpdateRequest,
    ) -> Result<(), ClientError> {
        let path = format!("subscriptions/{}/ReplicationControllerChangeAll", tenant_id);
        self.enter("replication_controller_update", &path)?;
        self.with_state(|s| {
            let rc = s
                .services
                .get_mut(tenant_id)
                .and_then(|list| list.iter_mut().find(|rc| rc.name == rq.name))
                .ok_or_else(|| Self::not_found(&path))?;
            rc.replicas = rq.replicas;
            rc.replicas_matching_asg_name = rq.replicas_matching_asg_name.clone();
            rc.is_daemonset = rq.is_daemonset;
            rc.is_lb_synced_deployment = rq.is_lb_synced_deployment;
            rc.is_any_host_allowed = rq.is_any_host_allowed;
            rc.hpa_specs = rq.hpa_specs.clone();
            let template = rc.template.get_or_insert_with(Default::default);
            template.agent_platform = rq.agent_platform;
            template.other_docker_config = rq.other_docker_config.clone();
            template.other_docker_host_config = rq.other_docker_host_config.clone();
            template.extra_config = rq.extra_config.clone();
            template.allocation_tags = rq.allocation_tags.clone();
            template.volumes = rq.volumes.clone();
            template.containers = Some(vec![DuploPodContainer {
                name: rq.name.clone(),
                image: rq.image.clone(),
                ..Default::default()
            }]);
            Ok(())
        })
    }

    async fn replication_controller_delete(
        &self,
        tenant_id: &str,
        rq: &DuploReplicationControllerDeleteRequest,
    ) -> Result<(), ClientError> {
        self.enter("replication_controller_delete", tenant_id)?;
        let rq = super::replication_controller::prepare_delete(tenant_id, rq);
        self.with_state(|s| {
            let lag = s.delete_lag;
            s.deleting.insert((tenant_id.to_string(), rq.name), lag);
        });
        Ok(())
    }
}

#[async_trait]
impl PlanApi for FakeDuploApi {
    async fn plan_get_list(&self) -> Result<Vec<DuploPlan>, ClientError> {
        self.enter("plan_get_list", "adminproxy/GetPlans")?;
        Ok(self.with_state(|s| s.plans.clone()))
    }

    async fn plan_kms_get_list(
        &self,
        plan_id: &str,
    ) -> Result<Vec<DuploPlanKmsKeyInfo>, ClientError> {
        let path = format!("v3/admin/plans/{}/kmsKeys", plan_id);
        self.enter("plan_kms_get_list", &path)?;
        self.with_state(|s| s.plan_kms_v3.get(plan_id).cloned())
            .ok_or_else(|| Self::not_found(&path))
    }

    async fn plan_get_kms_key(
        &self,
        plan_id: &str,
        name: &str,
    ) -> Result<DuploPlanKmsKeyInfo, ClientError> {
        let path = format!("v3/admin/plans/{}/kmsKeys/{}", plan_id, name);
        self.enter("plan_get_kms_key", &path)?;
        self.with_state(|s| {
            s.plan_kms_v3
                .get(plan_id)
                .and_then(|keys| keys.iter().find(|k| k.key_name == name).cloned())
        })
        .ok_or_else(|| Self::not_found(&path))
    }
}
