//! Replication controllers: the control plane's name for a Duplo service.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::DuploKeyStringValue;
use super::{Client, ClientError};

/// A service as listed by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploReplicationController {
    pub name: String,
    pub replicas: i64,
    pub replicas_matching_asg_name: String,
    pub dns_prfx: String,
    pub fqdn: String,
    pub fqdn_ex: String,
    pub parent_domain: String,
    pub force_stateful_set: bool,
    pub is_daemonset: bool,
    pub is_unique_k8s_node_required: bool,
    pub should_spread_across_zones: bool,
    #[serde(rename = "IsLBSyncedDeployment")]
    pub is_lb_synced_deployment: bool,
    pub is_replica_collocation_allowed: bool,
    pub is_any_host_allowed: bool,
    pub is_cloud_creds_from_k8s_service_account: bool,
    pub volumes: String,
    pub template: Option<DuploPodTemplate>,
    pub tags: Option<Vec<DuploKeyStringValue>>,
    #[serde(rename = "HPASpecs")]
    pub hpa_specs: Option<BTreeMap<String, Value>>,
    pub index: i64,
}

/// The pod template behind a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploPodTemplate {
    pub name: String,
    pub containers: Option<Vec<DuploPodContainer>>,
    pub agent_platform: i64,
    pub cloud: i64,
    pub volumes: String,
    pub commands: Option<Vec<String>>,
    pub extra_config: String,
    pub other_docker_config: String,
    pub other_docker_host_config: String,
    pub allocation_tags: String,
}

/// A container within a pod template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploPodContainer {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub docker_id: String,
}

/// Request body for creating a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploReplicationControllerCreateRequest {
    pub tenant_id: String,
    pub name: String,
    #[serde(rename = "DockerImage")]
    pub image: String,
    pub network_id: String,
    pub cloud: i64,
    pub agent_platform: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub replicas: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub replicas_matching_asg_name: String,
    #[serde(skip_serializing_if = "is_false")]
    pub force_stateful_set: bool,
    pub is_daemonset: bool,
    #[serde(rename = "IsLBSyncedDeployment")]
    pub is_lb_synced_deployment: bool,
    pub is_replica_collocation_allowed: bool,
    pub is_any_host_allowed: bool,
    pub is_cloud_creds_from_k8s_service_account: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub allocation_tags: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub volumes: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub extra_config: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub other_docker_config: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub other_docker_host_config: String,
    #[serde(rename = "HPASpecs", skip_serializing_if = "Option::is_none")]
    pub hpa_specs: Option<BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub commands: String,
}

/// Request body for changing a service in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploReplicationControllerUpdateRequest {
    pub name: String,
    pub image: String,
    pub agent_platform: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub replicas: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub replicas_matching_asg_name: String,
    #[serde(skip_serializing_if = "is_false")]
    pub force_stateful_set: bool,
    pub is_daemonset: bool,
    #[serde(rename = "IsLBSyncedDeployment")]
    pub is_lb_synced_deployment: bool,
    pub is_replica_collocation_allowed: bool,
    pub is_any_host_allowed: bool,
    pub is_cloud_creds_from_k8s_service_account: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub allocation_tags: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub volumes: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub extra_config: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub other_docker_config: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub other_docker_host_config: String,
    #[serde(rename = "HPASpecs", skip_serializing_if = "Option::is_none")]
    pub hpa_specs: Option<BTreeMap<String, Value>>,
}

/// Request body for deleting a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploReplicationControllerDeleteRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tenant_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub network_id: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub agent_platform: i64,
    #[serde(rename = "DockerImage", skip_serializing_if = "String::is_empty")]
    pub image: String,
    pub state: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

const DEFAULT_NETWORK: &str = "default";

/// Service APIs.
#[async_trait]
pub trait ReplicationControllerApi: Send + Sync {
    /// List every service in a tenant.
    async fn replication_controller_list(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploReplicationController>, ClientError>;

    /// Create a service.
    async fn replication_controller_create(
        &self,
        tenant_id: &str,
        rq: &DuploReplicationControllerCreateRequest,
    ) -> Result<(), ClientError>;

    /// Change an existing service.
    async fn replication_controller_update(
        &self,
        tenant_id: &str,
        rq: &DuploReplicationControllerUpdateRequest,
    ) -> Result<(), ClientError>;

    /// Request deletion of a service.
    async fn replication_controller_delete(
        &self,
        tenant_id: &str,
        rq: &DuploReplicationControllerDeleteRequest,
    ) -> Result<(), ClientError>;

    /// Find a service by name, `None` when the tenant has no such service.
    async fn replication_controller_get(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<Option<DuploReplicationController>, ClientError> {
        let all = self.replication_controller_list(tenant_id).await?;
        Ok(all.into_iter().find(|rc| rc.name == name))
    }
}

#[async_trait]
impl ReplicationControllerApi for Client {
    async fn replication_controller_list(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploReplicationController>, ClientError> {
        let list: Option<Vec<DuploReplicationController>> = self
            .get_api(
                &format!("ReplicationControllerList({})", tenant_id),
                &format!("subscriptions/{}/GetReplicationControllers", tenant_id),
            )
            .await?;
        list.ok_or_else(|| ClientError::new("replication controller list is nil"))
    }

    async fn replication_controller_create(
        &self,
        tenant_id: &str,
        rq: &DuploReplicationControllerCreateRequest,
    ) -> Result<(), ClientError> {
        let mut rq = rq.clone();
        if rq.network_id.is_empty() {
            rq.network_id = DEFAULT_NETWORK.to_string();
        }
        self.post_api_nil(
            &format!("ReplicationControllerCreate({}, {})", tenant_id, rq.name),
            &format!("subscriptions/{}/ReplicationControllerUpdate", tenant_id),
            &rq,
        )
        .await
    }

    async fn replication_controller_update(
        &self,
        tenant_id: &str,
        rq: &DuploReplicationControllerUpdateRequest,
    ) -> Result<(), ClientError> {
        self.post_api_nil(
            &format!("ReplicationControllerUpdate({}, {})", tenant_id, rq.name),
            &format!("subscriptions/{}/ReplicationControllerChangeAll", tenant_id),
            rq,
        )
        .await
    }

    async fn replication_controller_delete(
        &self,
        tenant_id: &str,
        rq: &DuploReplicationControllerDeleteRequest,
    ) -> Result<(), ClientError> {
        let rq = prepare_delete(tenant_id, rq);
        self.post_api_nil(
            &format!("ReplicationControllerDelete({}, {})", tenant_id, rq.name),
            &format!("subscriptions/{}/ReplicationControllerUpdate", tenant_id),
            &rq,
        )
        .await
    }
}

/// Fill in the fields every delete request carries.
pub(crate) fn prepare_delete(
    tenant_id: &str,
    rq: &DuploReplicationControllerDeleteRequest,
) -> DuploReplicationControllerDeleteRequest {
    let mut rq = rq.clone();
    rq.tenant_id = tenant_id.to_string();
    rq.state = "delete".to_string();
    if rq.network_id.is_empty() {
        rq.network_id = DEFAULT_NETWORK.to_string();
    }
    rq
}
