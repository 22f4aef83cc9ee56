use serde_json::{json, Map, Value};
use tracing::{trace, warn};

use crate::client::native_host::{DuploMinionTaint, DuploNativeHost, DuploNativeHostNetworkInterface};
use crate::client::types::key_values_to_state;
use crate::context::HandlerContext;
use crate::schema::{Attribute, Block, Schema};
use crate::state::ResourceData;
use crate::ProviderError;

use super::{tenant_id_input, DataSourceHandler};

/// `duplocloud_native_hosts`: every native host in a tenant.
pub struct NativeHosts;

fn key_value_list() -> Attribute {
    let kv = Block::new()
        .with_attribute("key", Attribute::computed_string())
        .with_attribute("value", Attribute::computed_string());
    Attribute::computed_list_of(&kv)
}

fn host_block() -> Block {
    let volume = Block::new()
        .with_attribute("iops", Attribute::computed_int64())
        .with_attribute("name", Attribute::computed_string())
        .with_attribute("size", Attribute::computed_int64())
        .with_attribute("volume_id", Attribute::computed_string())
        .with_attribute("volume_type", Attribute::computed_string());
    let network_interface = Block::new()
        .with_attribute("network_interface_id", Attribute::computed_string())
        .with_attribute("subnet_id", Attribute::computed_string())
        .with_attribute("associate_public_ip", Attribute::computed_bool())
        .with_attribute("groups", Attribute::computed_string_list())
        .with_attribute("device_index", Attribute::computed_int64())
        .with_attribute("metadata", key_value_list());

    let mut host = Block::new();
    for name in [
        "instance_id",
        "user_account",
        "tenant_id",
        "friendly_name",
        "capacity",
        "image_id",
        "base64_user_data",
        "status",
        "identity_role",
        "private_ip_address",
    ] {
        host = host.with_attribute(name, Attribute::computed_string());
    }
    for name in ["zone", "agent_platform", "cloud", "keypair_type"] {
        host = host.with_attribute(name, Attribute::computed_int64());
    }
    for name in [
        "is_minion",
        "prepend_user_data",
        "is_ebs_optimized",
        "allocated_public_ip",
        "encrypt_disk",
    ] {
        host = host.with_attribute(name, Attribute::computed_bool());
    }
    let taint = Block::new()
        .with_attribute("key", Attribute::computed_string())
        .with_attribute("value", Attribute::computed_string())
        .with_attribute("effect", Attribute::computed_string());
    host.with_attribute("metadata", key_value_list())
        .with_attribute("tags", key_value_list())
        .with_attribute("minion_tags", key_value_list())
        .with_attribute("volume", Attribute::computed_list_of(&volume))
        .with_attribute(
            "network_interface",
            Attribute::computed_list_of(&network_interface),
        )
        .with_attribute("taints", Attribute::computed_list_of(&taint))
}

fn flatten_network_interface(nic: &DuploNativeHostNetworkInterface) -> Value {
    let mut m = Map::new();
    m.insert("associate_public_ip".into(), json!(nic.associate_public_ip));
    m.insert("metadata".into(), key_values_to_state(nic.meta_data.as_deref()));
    if !nic.network_interface_id.is_empty() {
        m.insert("network_interface_id".into(), json!(nic.network_interface_id));
    }
    if !nic.subnet_id.is_empty() {
        m.insert("subnet_id".into(), json!(nic.subnet_id));
    }
    if let Some(groups) = &nic.groups {
        m.insert("groups".into(), json!(groups));
    }
    if nic.device_index > 0 {
        m.insert("device_index".into(), json!(nic.device_index));
    }
    Value::Object(m)
}

fn flatten_host(host: &DuploNativeHost) -> Value {
    let volumes: Vec<Value> = host
        .volumes
        .iter()
        .flatten()
        .map(|v| {
            json!({
                "iops": v.iops,
                "name": v.name,
                "size": v.size,
                "volume_id": v.volume_id,
                "volume_type": v.volume_type,
            })
        })
        .collect();
    let nics: Vec<Value> = host
        .network_interfaces
        .iter()
        .flatten()
        .map(flatten_network_interface)
        .collect();

    json!({
        "instance_id": host.instance_id,
        "user_account": host.user_account,
        "tenant_id": host.tenant_id,
        "friendly_name": host.friendly_name,
        "capacity": host.capacity,
        "zone": host.zone,
        "is_minion": host.is_minion,
        "image_id": host.image_id,
        "base64_user_data": host.base64_user_data,
        "prepend_user_data": host.prepend_user_data,
        "agent_platform": host.agent_platform,
        "is_ebs_optimized": host.is_ebs_optimized,
        "allocated_public_ip": host.allocated_public_ip,
        "cloud": host.cloud,
        "keypair_type": host.key_pair_type,
        "encrypt_disk": host.encrypt_disk,
        "status": host.status,
        "identity_role": host.identity_role,
        "private_ip_address": host.private_ip_address,
        "metadata": key_values_to_state(host.meta_data.as_deref()),
        "tags": key_values_to_state(host.tags.as_deref()),
        "minion_tags": key_values_to_state(host.minion_tags.as_deref()),
        "volume": volumes,
        "network_interface": nics,
    })
}

fn flatten_taints(taints: &[DuploMinionTaint]) -> Value {
    taints
        .iter()
        .map(|t| json!({"key": t.key, "value": t.value, "effect": t.effect}))
        .collect()
}

/// The taints of a minion host, `None` when there are none to report.
///
/// A failed lookup only costs the taints, so it is logged and skipped.
async fn minion_taints(ctx: &HandlerContext, host: &DuploNativeHost) -> Option<Value> {
    if !host.is_minion {
        return None;
    }
    match ctx
        .api()
        .native_host_get_minion(&host.tenant_id, &host.instance_id)
        .await
    {
        Ok(Some(minion)) if !minion.taints.is_empty() => Some(flatten_taints(&minion.taints)),
        Ok(_) => None,
        Err(err) => {
            warn!(instance_id = %host.instance_id, error = %err, "native hosts: minion lookup failed");
            None
        },
    }
}

#[async_trait::async_trait]
impl DataSourceHandler for NativeHosts {
    fn type_name(&self) -> &'static str {
        "duplocloud_native_hosts"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("`duplocloud_native_hosts` lists native hosts in a Duplo tenant.")
            .with_attribute(
                "tenant_id",
                tenant_id_input().with_description("The GUID of the tenant in which to list the hosts."),
            )
            .with_attribute(
                "hosts",
                Attribute::computed_list_of(&host_block()).with_description("The list of native hosts."),
            )
    }

    async fn read(&self, ctx: &HandlerContext, config: ResourceData) -> Result<ResourceData, ProviderError> {
        let tenant_id = config.required_str("tenant_id")?.to_string();
        trace!(tenant_id = %tenant_id, "native hosts read: start");

        let list = ctx.api().native_host_get_list(&tenant_id).await?;
        let mut hosts = Vec::with_capacity(list.len());
        for host in &list {
            let mut flat = flatten_host(host);
            if let Some(taints) = minion_taints(ctx, host).await {
                flat["taints"] = taints;
            }
            hosts.push(flat);
        }

        let mut state = config;
        state.set_id(tenant_id.as_str());
        state.set("hosts", &hosts)?;
        trace!(tenant_id = %tenant_id, count = hosts.len(), "native hosts read: end");
        Ok(state)
    }
}
