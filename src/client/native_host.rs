//! Native (VM) hosts running in a tenant.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::DuploKeyStringValue;
use super::{Client, ClientError};

/// A native host as returned by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploNativeHost {
    pub instance_id: String,
    pub user_account: String,
    pub tenant_id: String,
    pub friendly_name: String,
    pub capacity: String,
    pub zone: i64,
    pub is_minion: bool,
    pub image_id: String,
    pub base64_user_data: String,
    pub prepend_user_data: bool,
    pub agent_platform: i64,
    pub is_ebs_optimized: bool,
    pub allocated_public_ip: bool,
    pub cloud: i64,
    pub key_pair_type: i64,
    pub encrypt_disk: bool,
    pub status: String,
    pub identity_role: String,
    pub private_ip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_interfaces: Option<Vec<DuploNativeHostNetworkInterface>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<DuploNativeHostVolume>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<Vec<DuploKeyStringValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<DuploKeyStringValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minion_tags: Option<Vec<DuploKeyStringValue>>,
}

/// A network interface attached to a native host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploNativeHostNetworkInterface {
    pub network_interface_id: String,
    pub subnet_id: String,
    #[serde(rename = "AssociatePublicIpAddress")]
    pub associate_public_ip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
    pub device_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<Vec<DuploKeyStringValue>>,
}

/// A block device attached to a native host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploNativeHostVolume {
    pub iops: i64,
    pub name: String,
    pub size: i64,
    pub volume_id: String,
    pub volume_type: String,
}

/// A kubernetes taint on a minion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploMinionTaint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

/// A host registered with the tenant's container agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuploMinion {
    pub name: String,
    pub instance_id: String,
    pub direct_address: String,
    pub agent_platform: i64,
    pub cloud: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<DuploMinionTaint>,
}

/// Native host APIs.
#[async_trait]
pub trait NativeHostApi: Send + Sync {
    /// List every native host in a tenant.
    async fn native_host_get_list(&self, tenant_id: &str)
        -> Result<Vec<DuploNativeHost>, ClientError>;

    /// List the minions of a tenant.
    async fn native_host_get_minions(&self, tenant_id: &str) -> Result<Vec<DuploMinion>, ClientError>;

    /// The minion backing a host, `None` when the host never registered.
    async fn native_host_get_minion(
        &self,
        tenant_id: &str,
        instance_id: &str,
    ) -> Result<Option<DuploMinion>, ClientError> {
        let all = self.native_host_get_minions(tenant_id).await?;
        Ok(all.into_iter().find(|m| m.instance_id == instance_id))
    }
}

#[async_trait]
impl NativeHostApi for Client {
    async fn native_host_get_list(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<DuploNativeHost>, ClientError> {
        let list: Option<Vec<DuploNativeHost>> = self
            .get_api(
                &format!("NativeHostGetList({})", tenant_id),
                &format!("v2/subscriptions/{}/NativeHostV2", tenant_id),
            )
            .await?;
        Ok(list.unwrap_or_default())
    }

    async fn native_host_get_minions(&self, tenant_id: &str) -> Result<Vec<DuploMinion>, ClientError> {
        let list: Option<Vec<DuploMinion>> = self
            .get_api(
                &format!("GetMinions({})", tenant_id),
                &format!("subscriptions/{}/GetMinions", tenant_id),
            )
            .await?;
        Ok(list.unwrap_or_default())
    }
}
